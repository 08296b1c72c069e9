use crate::error::{Error, Result};
use crate::naming::{EnglishInflector, Inflector};
use crate::normalize::assemble::{assemble, Document};
use crate::normalize::ingest::ingest;
use crate::normalize::resolve::resolve;
use crate::normalize::store::Store;
use crate::normalize::types::SerializerConfig;
use crate::schema::Registry;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// One normalization session: a registry, a naming scheme and the store
/// accumulated from every ingested record since the last [`Serializer::init`].
///
/// Independent sessions are independent values; nothing is shared between
/// them.
pub struct Serializer {
    registry: Registry,
    naming: Box<dyn Inflector>,
    config: SerializerConfig,
    store: Store,
}

impl Serializer {
    /// Create a session with the default configuration and English naming.
    pub fn new(registry: Registry) -> Result<Self> {
        Self::with_config(registry, SerializerConfig::default())
    }

    pub fn with_config(registry: Registry, config: SerializerConfig) -> Result<Self> {
        Self::with_inflector(registry, config, Box::new(EnglishInflector::new()))
    }

    pub fn with_inflector(
        registry: Registry,
        config: SerializerConfig,
        naming: Box<dyn Inflector>,
    ) -> Result<Self> {
        check_registry(&registry, naming.as_ref())?;
        Ok(Serializer {
            registry,
            naming,
            config,
            store: Store::new(),
        })
    }

    /// Discard every ingested record. When `registry` is given, the session
    /// binds to it from now on. An invalid registry leaves the session as is.
    pub fn init(&mut self, registry: Option<Registry>) -> Result<()> {
        if let Some(registry) = registry {
            check_registry(&registry, self.naming.as_ref())?;
            self.registry = registry;
        }
        self.store = Store::new();
        debug!("store reset");
        Ok(())
    }

    /// Fold a record, or an array of records, into the store. Returns the
    /// number of top-level records. On error the store is unchanged.
    pub fn ingest(&mut self, input: Value) -> Result<usize> {
        ingest(
            &mut self.store,
            &self.registry,
            self.naming.as_ref(),
            &self.config,
            input,
        )
    }

    /// Ingest each value in turn, stopping at the first error.
    pub fn ingest_all<I>(&mut self, inputs: I) -> Result<usize>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut total = 0;
        for input in inputs {
            total += self.ingest(input)?;
        }
        Ok(total)
    }

    /// Resolve inverse relationships in place, then assemble the
    /// side-loaded document.
    pub fn serialize(&mut self) -> Document {
        resolve(
            &mut self.store,
            &self.registry,
            self.naming.as_ref(),
            &self.config,
        );
        assemble(&self.store, self.naming.as_ref())
    }

    /// The raw store, for diagnostics.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }
}

impl fmt::Debug for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serializer")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Association targets must be declared, and no two types may share an
/// output collection.
fn check_registry(registry: &Registry, naming: &dyn Inflector) -> Result<()> {
    registry.validate()?;

    let mut seen: HashMap<String, &str> = HashMap::new();
    for (name, _) in registry.models() {
        let key = naming.collection_key(name);
        if let Some(first) = seen.insert(key.clone(), name) {
            return Err(Error::CollectionCollision {
                key,
                first: first.to_string(),
                second: name.to_string(),
            });
        }
    }
    Ok(())
}
