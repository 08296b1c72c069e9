//! Normalization - fold nested record graphs into a side-loaded document
//!
//! Records are ingested into a [`Store`] holding one record per (type, id).
//! Serializing resolves the inverse side of every declared relationship and
//! assembles the store into collections keyed by pluralized, camelized type
//! names.
//!
//! ## Phases
//!
//! - **ingest**: validate incoming records against the registry, then merge
//!   them (and everything nested under them) into the store
//! - **resolve**: fill in inverse has-many arrays and foreign keys
//! - **assemble**: group by type and de-duplicate every array field

pub mod assemble;
pub mod ingest;
pub mod resolve;
pub mod serializer;
pub mod store;
pub mod types;

pub use assemble::{assemble, Document};
pub use ingest::{ingest, IngestPlanner, Merger, PlannedRecord};
pub use resolve::resolve;
pub use serializer::Serializer;
pub use store::{Store, TypeTable};
pub use types::{Record, RecordId, RecordKey, SerializerConfig};
