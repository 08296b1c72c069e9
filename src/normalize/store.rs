use crate::normalize::types::{Record, RecordId, RecordKey};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashMap;

/// All records of one type, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    model: String,
    records: Vec<Record>,
    index: HashMap<RecordId, usize>,
}

impl TypeTable {
    fn new(model: String) -> Self {
        TypeTable {
            model,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.index.get(id).map(|&slot| &self.records[slot])
    }

    pub fn get_mut(&mut self, id: &RecordId) -> Option<&mut Record> {
        match self.index.get(id) {
            Some(&slot) => Some(&mut self.records[slot]),
            None => None,
        }
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.index.contains_key(id)
    }
}

/// Canonical per-type, per-id record map.
///
/// Holds at most one [`Record`] per (type, id); records are never removed.
#[derive(Debug, Clone, Default)]
pub struct Store {
    tables: Vec<TypeTable>,
    index: HashMap<String, usize>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all types
    pub fn len(&self) -> usize {
        self.tables.iter().map(TypeTable::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(TypeTable::is_empty)
    }

    /// Type names in first-seen order
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(TypeTable::model)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TypeTable> {
        self.tables.iter()
    }

    pub fn table(&self, model: &str) -> Option<&TypeTable> {
        self.index.get(model).map(|&slot| &self.tables[slot])
    }

    pub fn contains_type(&self, model: &str) -> bool {
        self.index.contains_key(model)
    }

    pub fn get(&self, model: &str, id: &RecordId) -> Option<&Record> {
        self.table(model)?.get(id)
    }

    pub fn get_mut(&mut self, model: &str, id: &RecordId) -> Option<&mut Record> {
        let slot = *self.index.get(model)?;
        self.tables[slot].get_mut(id)
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.get(&key.model, &key.id).is_some()
    }

    /// Locate the record for `key`, creating it with `seed` if absent.
    /// The flag is true when the record was created.
    pub fn ensure<F>(&mut self, key: &RecordKey, seed: F) -> (&mut Record, bool)
    where
        F: FnOnce() -> Record,
    {
        let table_slot = match self.index.get(&key.model).copied() {
            Some(slot) => slot,
            None => {
                self.index.insert(key.model.clone(), self.tables.len());
                self.tables.push(TypeTable::new(key.model.clone()));
                self.tables.len() - 1
            }
        };

        let table = &mut self.tables[table_slot];
        match table.index.get(&key.id).copied() {
            Some(slot) => (&mut table.records[slot], false),
            None => {
                let record = seed();
                debug_assert_eq!(record.key(), *key);
                table.index.insert(key.id.clone(), table.records.len());
                table.records.push(record);
                let last = table.records.len() - 1;
                (&mut table.records[last], true)
            }
        }
    }
}

impl Serialize for Store {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.tables.len()))?;
        for table in &self.tables {
            map.serialize_entry(table.model(), &TableById(table))?;
        }
        map.end()
    }
}

struct TableById<'a>(&'a TypeTable);

impl Serialize for TableById<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for record in self.0.records() {
            map.serialize_entry(&record.id.to_string(), record)?;
        }
        map.end()
    }
}
