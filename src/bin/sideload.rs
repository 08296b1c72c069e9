//! sideload: Flatten nested records into a side-loaded JSON document
//!
//! Usage:
//!   # Read records from a file, print the document
//!   sideload --schema registry.json records.json
//!
//!   # Read from stdin
//!   echo '{"type": "Book", "id": 1, "authorId": 2}' | sideload --schema registry.json
//!
//!   # One record (or array of records) per line
//!   sideload --schema registry.json --ndjson records.jsonl --compact
//!
//!   # Inspect the normalized store instead of the document
//!   sideload --schema registry.json --dump-store records.json

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use sideload::{sideload_json, Registry, Serializer, SerializerConfig};
use std::fs::File;
use std::io::{BufReader, Read};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sideload")]
#[command(about = "Flatten nested records into a side-loaded JSON document", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Registry describing every type, its properties and associations
    #[arg(long, short = 's', value_name = "SCHEMA")]
    schema: String,

    /// Process newline-delimited JSON (one record or array per line)
    #[arg(long)]
    ndjson: bool,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,

    /// Skip attributes the registry does not declare instead of failing
    #[arg(long)]
    lenient: bool,

    /// Maximum nesting depth of one record (default: 64)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Suffix for belongs-to foreign key fields (default: "Id")
    #[arg(long)]
    foreign_key_suffix: Option<String>,

    /// Print the resolved store keyed by type and id instead of the document
    #[arg(long)]
    dump_store: bool,

    /// Log progress to stderr (-v for debug, -vv for trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let registry = Registry::from_reader(BufReader::new(
        File::open(&args.schema).with_context(|| format!("Failed to open schema: {}", args.schema))?,
    ))
    .with_context(|| format!("Failed to load schema: {}", args.schema))?;

    // Build config
    let mut config = SerializerConfig {
        strict: !args.lenient,
        ..SerializerConfig::default()
    };
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if let Some(suffix) = args.foreign_key_suffix {
        config.foreign_key_suffix = suffix;
    }

    let mut serializer = Serializer::with_config(registry, config)?;

    let mut content = Vec::new();
    match &args.input {
        Some(path) => {
            File::open(path)
                .with_context(|| format!("Failed to open input: {}", path))?
                .read_to_end(&mut content)?;
        }
        None => {
            std::io::stdin().read_to_end(&mut content)?;
        }
    }

    let count = ingest_content(&mut serializer, content, args.ndjson)?;
    if count == 0 {
        warn!("no records found in input");
    }
    debug!(records = count, stored = serializer.store().len(), "input ingested");

    let document = serializer.serialize();
    let output = if args.dump_store {
        serde_json::to_value(serializer.store())?
    } else {
        Value::Object(document)
    };

    let rendered = if args.compact {
        serde_json::to_string(&output)?
    } else {
        serde_json::to_string_pretty(&output)?
    };
    println!("{}", rendered);

    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("sideload=debug"),
        _ => EnvFilter::new("sideload=trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Parse the whole input with simd-json, falling back to one JSON value per
/// line when that fails or `--ndjson` is set.
fn ingest_content(serializer: &mut Serializer, mut content: Vec<u8>, ndjson: bool) -> Result<usize> {
    if !ndjson {
        let fallback = content.clone();
        match simd_json::serde::from_slice::<Value>(&mut content) {
            Ok(value) => {
                return serializer.ingest(value).context("Failed to ingest records");
            }
            Err(err) => {
                debug!(error = %err, "input is not a single JSON document, reading as NDJSON");
                content = fallback;
            }
        }
    }

    sideload_json(content.as_slice(), serializer, true)
}
