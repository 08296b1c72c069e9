//! # Sideload - normalize nested record graphs
//!
//! Takes typed records that nest other records under has-many and
//! belongs-to relationships, and produces a flat, side-loaded document in
//! which every record appears once under its type and every relationship is
//! expressed as ids on both sides.
//!
//! ## Modules
//!
//! - **schema**: the registry of types, properties and associations
//! - **naming**: pluralization and camel-casing of keys
//! - **normalize**: the store, ingestion, inverse resolution and assembly
//!
//! ## Quick Start
//!
//! ```rust
//! use sideload::{Registry, Serializer};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let registry = Registry::from_value(json!({
//!     "Author": {
//!         "properties": ["name"],
//!         "associations": [{"kind": "hasMany", "name": "books", "model": "Book"}]
//!     },
//!     "Book": {
//!         "properties": ["title"],
//!         "associations": [{"kind": "belongsTo", "name": "author", "model": "Author"}]
//!     }
//! }))?;
//!
//! let mut serializer = Serializer::new(registry)?;
//! serializer.ingest(json!({"type": "Book", "id": 1, "title": "Dune", "authorId": 2}))?;
//! serializer.ingest(json!({"type": "Author", "id": 2, "name": "Frank Herbert"}))?;
//!
//! let document = serializer.serialize();
//! assert_eq!(document["authors"][0]["books"], json!([1]));
//! assert_eq!(document["books"][0]["authorId"], 2);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::BufRead;

pub mod error;
pub mod naming;
pub mod normalize;
pub mod schema;

pub use error::Error;
pub use naming::{EnglishInflector, Inflector};
pub use normalize::{Document, Record, RecordId, RecordKey, Serializer, SerializerConfig, Store};
pub use schema::{AssociationDescriptor, AssociationKind, ModelDescription, Registry};

/// Ingest a JSON stream: a single value, or one value per line when
/// `ndjson` is set. Returns the number of top-level records ingested.
pub fn sideload_json<R: BufRead>(
    reader: R,
    serializer: &mut Serializer,
    ndjson: bool,
) -> Result<usize> {
    if !ndjson {
        let value: Value = serde_json::from_reader(reader).context("Failed to parse JSON")?;
        return serializer
            .ingest(value)
            .context("Failed to ingest records");
    }

    let mut total = 0;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("Failed to parse JSON on line {}", idx + 1))?;
        total += serializer
            .ingest(value)
            .with_context(|| format!("Failed to ingest line {}", idx + 1))?;
    }
    Ok(total)
}
