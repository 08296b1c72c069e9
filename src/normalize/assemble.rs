use crate::naming::Inflector;
use crate::normalize::store::Store;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::trace;

/// Side-loaded output: collection key -> array of flat records
pub type Document = Map<String, Value>;

/// Group the store into collections keyed by `camelize(pluralize(type))`.
///
/// Every array-valued field of every record is de-duplicated, keeping the
/// first occurrence of each element. The store itself is not modified.
pub fn assemble(store: &Store, naming: &dyn Inflector) -> Document {
    let mut document = Map::new();

    for table in store.tables() {
        let key = naming.collection_key(table.model());
        trace!(collection = %key, model = table.model(), records = table.len(), "assembling");

        let records = table.records().map(|record| {
            let mut json = record.to_json();
            unique_arrays(&mut json);
            Value::Object(json)
        });

        if let Value::Array(items) = document
            .entry(key)
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            items.extend(records);
        }
    }

    document
}

/// De-duplicate every array value in `object`, preserving first-seen order.
pub fn unique_arrays(object: &mut Map<String, Value>) {
    for value in object.values_mut() {
        if let Value::Array(items) = value {
            let mut seen = HashSet::with_capacity(items.len());
            items.retain(|item| seen.insert(item.to_string()));
        }
    }
}
