use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of a record within its type.
///
/// Integer-valued strings are normalized to integers so `"7"` and `7` name
/// the same record. Surrounding whitespace never takes part in an id.
/// Unsigned ids beyond `i64::MAX` are kept as their decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Str(String),
}

impl RecordId {
    /// Interpret a JSON value as an id. Returns `None` for anything that is
    /// not an integer, an integral float or a non-empty string.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Some(RecordId::Int(i));
                }
                if let Some(u) = n.as_u64() {
                    return Some(RecordId::Str(u.to_string()));
                }
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    Some(RecordId::Int(f as i64))
                } else {
                    None
                }
            }
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                match trimmed.parse::<i64>() {
                    Ok(i) => Some(RecordId::Int(i)),
                    Err(_) => Some(RecordId::Str(trimmed.to_string())),
                }
            }
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(i) => Value::from(*i),
            RecordId::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(i) => write!(f, "{}", i),
            RecordId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Int(id)
    }
}

impl From<i32> for RecordId {
    fn from(id: i32) -> Self {
        RecordId::Int(i64::from(id))
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId::from_value(&Value::String(id.to_string()))
            .unwrap_or_else(|| RecordId::Str(id.to_string()))
    }
}

/// (type, id) pair identifying a record in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub model: String,
    pub id: RecordId,
}

impl RecordKey {
    pub fn new(model: impl Into<String>, id: impl Into<RecordId>) -> Self {
        RecordKey {
            model: model.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.model, self.id)
    }
}

/// Canonical state of one record in the store
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// The record's type name, e.g. "Book"
    pub model: String,

    pub id: RecordId,

    /// Scalar properties and belongs-to foreign keys
    pub fields: Map<String, Value>,

    /// Has-many id arrays, in the order their fields were first seeded
    links: Vec<(String, Vec<RecordId>)>,
}

impl Record {
    pub fn new(model: impl Into<String>, id: RecordId) -> Self {
        Record {
            model: model.into(),
            id,
            fields: Map::new(),
            links: Vec::new(),
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.model.clone(), self.id.clone())
    }

    /// Seed an empty has-many array unless one exists.
    pub fn seed_link(&mut self, field: &str) {
        self.link_mut(field);
    }

    pub fn link(&self, field: &str) -> Option<&[RecordId]> {
        self.links
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, ids)| ids.as_slice())
    }

    pub fn links(&self) -> impl Iterator<Item = (&str, &[RecordId])> {
        self.links
            .iter()
            .map(|(name, ids)| (name.as_str(), ids.as_slice()))
    }

    fn link_mut(&mut self, field: &str) -> &mut Vec<RecordId> {
        let slot = match self.links.iter().position(|(name, _)| name == field) {
            Some(slot) => slot,
            None => {
                self.links.push((field.to_string(), Vec::new()));
                self.links.len() - 1
            }
        };
        &mut self.links[slot].1
    }

    /// Append without checking for duplicates.
    pub fn push_link(&mut self, field: &str, id: RecordId) {
        self.link_mut(field).push(id);
    }

    /// Append unless already listed. Returns whether the id was added.
    pub fn push_link_unique(&mut self, field: &str, id: RecordId) -> bool {
        let ids = self.link_mut(field);
        if ids.contains(&id) {
            return false;
        }
        ids.push(id);
        true
    }

    pub fn lists(&self, field: &str, id: &RecordId) -> bool {
        self.link(field).is_some_and(|ids| ids.contains(id))
    }

    /// Foreign key held in `field`, if it holds a usable id.
    pub fn foreign_key(&self, field: &str) -> Option<RecordId> {
        self.fields.get(field).and_then(RecordId::from_value)
    }

    pub fn set_foreign_key(&mut self, field: &str, id: Option<&RecordId>) {
        let value = id.map(RecordId::to_value).unwrap_or(Value::Null);
        self.fields.insert(field.to_string(), value);
    }

    /// Flat JSON form: `id`, `type`, scalar fields, then has-many arrays.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert("id".to_string(), self.id.to_value());
        out.insert("type".to_string(), Value::String(self.model.clone()));
        for (key, value) in &self.fields {
            out.insert(key.clone(), value.clone());
        }
        for (key, ids) in &self.links {
            out.insert(
                key.clone(),
                Value::Array(ids.iter().map(RecordId::to_value).collect()),
            );
        }
        out
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let json = self.to_json();
        let mut map = serializer.serialize_map(Some(json.len()))?;
        for (key, value) in &json {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Configuration for ingestion and field naming
#[derive(Debug, Clone)]
pub struct SerializerConfig {
    /// Reject attributes the registry does not declare. When off they are
    /// skipped and logged.
    pub strict: bool,

    /// Maximum nesting depth of one ingested tree (0 = only the root)
    pub max_depth: usize,

    /// Appended to the camelized relation name to form foreign key fields
    pub foreign_key_suffix: String,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        SerializerConfig {
            strict: true,
            max_depth: 64,
            foreign_key_suffix: String::from("Id"),
        }
    }
}
