//! Ingestion of nested records into the store
//!
//! An ingest call runs in two phases. [`IngestPlanner`] walks the input,
//! reading only the fields the registry declares for each record's type,
//! and produces a tree of [`PlannedRecord`]s. Every contract violation is
//! reported here, before the store is touched. [`Merger`] then folds the
//! planned tree into the store; merging cannot fail.

use crate::error::{Error, Result};
use crate::naming::Inflector;
use crate::normalize::store::Store;
use crate::normalize::types::{Record, RecordId, RecordKey, SerializerConfig};
use crate::schema::{AssociationDescriptor, Registry};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, trace};

/// A validated incoming record and everything nested under it
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRecord {
    pub key: RecordKey,

    /// Declared properties present in the snapshot, in declaration order
    pub scalars: Vec<(String, Value)>,

    /// Belongs-to updates keyed by foreign key field
    pub foreign_keys: Vec<(String, ForeignKey)>,

    /// Has-many members keyed by array field
    pub has_many: Vec<(String, Vec<Link>)>,
}

impl PlannedRecord {
    /// Whether merging would do more than link the record by id
    pub fn carries_content(&self) -> bool {
        !(self.scalars.is_empty() && self.foreign_keys.is_empty() && self.has_many.is_empty())
    }

    /// Names of the fields this snapshot would write
    pub fn content_fields(&self) -> Vec<&str> {
        self.scalars
            .iter()
            .map(|(field, _)| field.as_str())
            .chain(self.foreign_keys.iter().map(|(field, _)| field.as_str()))
            .chain(self.has_many.iter().map(|(field, _)| field.as_str()))
            .collect()
    }
}

/// How a belongs-to was supplied
#[derive(Debug, Clone, PartialEq)]
pub enum ForeignKey {
    Nested(Box<PlannedRecord>),
    Id(RecordId),
    Clear,
}

/// One member of a has-many array
#[derive(Debug, Clone, PartialEq)]
pub enum Link {
    Nested(PlannedRecord),
    /// Bare id; the target record is created empty if unknown
    Ref(RecordKey),
}

/// Where a nested record sits in its parent
struct Origin<'a> {
    model: &'a str,
    field: &'a str,
    target: &'a str,
}

/// Validates raw input against the registry
pub struct IngestPlanner<'a> {
    registry: &'a Registry,
    naming: &'a dyn Inflector,
    config: &'a SerializerConfig,
}

impl<'a> IngestPlanner<'a> {
    pub fn new(
        registry: &'a Registry,
        naming: &'a dyn Inflector,
        config: &'a SerializerConfig,
    ) -> Self {
        IngestPlanner {
            registry,
            naming,
            config,
        }
    }

    /// Plan one record or an array of records.
    pub fn plan(&self, input: Value) -> Result<Vec<PlannedRecord>> {
        match input {
            Value::Null => Err(Error::InvalidInput("no record given".to_string())),
            Value::Object(obj) => Ok(vec![self.plan_record(obj, None, "$", 0)?]),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| match item {
                    Value::Object(obj) => self.plan_record(obj, None, &format!("$[{}]", idx), 0),
                    other => Err(Error::InvalidInput(format!(
                        "element $[{}] is {}, not a record",
                        idx,
                        json_kind(&other)
                    ))),
                })
                .collect(),
            other => Err(Error::InvalidInput(format!(
                "expected a record or an array of records, got {}",
                json_kind(&other)
            ))),
        }
    }

    fn plan_record(
        &self,
        mut obj: Map<String, Value>,
        origin: Option<Origin<'_>>,
        path: &str,
        depth: usize,
    ) -> Result<PlannedRecord> {
        if depth > self.config.max_depth {
            return Err(Error::DepthExceeded {
                path: path.to_string(),
                max_depth: self.config.max_depth,
            });
        }

        let model = match (obj.remove("type"), &origin) {
            (Some(Value::String(name)), _) => name,
            (None | Some(Value::Null), Some(origin)) => origin.target.to_string(),
            _ => {
                return Err(Error::MissingIdentity {
                    path: path.to_string(),
                    missing: "type",
                })
            }
        };

        if let Some(origin) = &origin {
            if origin.target != model {
                return Err(Error::TypeConflict {
                    model: origin.model.to_string(),
                    field: origin.field.to_string(),
                    expected: origin.target.to_string(),
                    found: model,
                });
            }
        }

        let description = self.registry.require(&model)?;

        let id = obj
            .remove("id")
            .as_ref()
            .and_then(RecordId::from_value)
            .ok_or_else(|| Error::MissingIdentity {
                path: path.to_string(),
                missing: "id",
            })?;
        let key = RecordKey::new(model.clone(), id);

        // Associations first, so a foreign key also listed as a property is
        // normalized like any other belongs-to.
        let mut foreign_keys = Vec::new();
        for association in description.belongs_to_associations() {
            if let Some(planned) = self.plan_belongs_to(&mut obj, &model, association, path, depth)? {
                foreign_keys.push(planned);
            }
        }

        let mut has_many = Vec::new();
        for association in description.has_many_associations() {
            let field = self.naming.has_many_field(&association.name);
            match obj.remove(&field) {
                None | Some(Value::Null) => {}
                Some(Value::Array(items)) => {
                    let links = items
                        .into_iter()
                        .enumerate()
                        .map(|(idx, item)| {
                            let item_path = format!("{}.{}[{}]", path, field, idx);
                            self.plan_link(item, &model, &field, association, &item_path, depth)
                        })
                        .collect::<Result<Vec<_>>>()?;
                    has_many.push((field, links));
                }
                Some(_) => {
                    return Err(Error::FieldShape {
                        model,
                        field,
                        expected: "an array of records or ids",
                    })
                }
            }
        }

        let mut scalars = Vec::new();
        for property in &description.properties {
            if property == "id" || property == "type" {
                continue;
            }
            if let Some(value) = obj.remove(property) {
                scalars.push((property.clone(), value));
            }
        }

        if let Some(field) = obj.keys().next() {
            if self.config.strict {
                return Err(Error::UndeclaredField {
                    model,
                    field: field.clone(),
                });
            }
            debug!(
                record = %key,
                skipped = ?obj.keys().collect::<Vec<_>>(),
                "ignoring undeclared attributes"
            );
        }

        Ok(PlannedRecord {
            key,
            scalars,
            foreign_keys,
            has_many,
        })
    }

    /// A belongs-to may arrive as its foreign key field (`authorId: 2`), or
    /// under the relation name as a nested record or a bare id. The relation
    /// name wins when both are present.
    fn plan_belongs_to(
        &self,
        obj: &mut Map<String, Value>,
        model: &str,
        association: &AssociationDescriptor,
        path: &str,
        depth: usize,
    ) -> Result<Option<(String, ForeignKey)>> {
        let fk_field = self
            .naming
            .foreign_key_field(&association.name, &self.config.foreign_key_suffix);
        let relation_field = self.naming.camelize(&association.name);

        let mut planned = match obj.remove(&fk_field) {
            Some(value) => Some(plan_foreign_key(value, model, &fk_field)?),
            None => None,
        };

        if relation_field != fk_field {
            if let Some(value) = obj.remove(&relation_field) {
                planned = Some(match value {
                    Value::Object(nested) => {
                        let origin = Origin {
                            model,
                            field: &relation_field,
                            target: &association.model,
                        };
                        let nested_path = format!("{}.{}", path, relation_field);
                        let record = self.plan_record(nested, Some(origin), &nested_path, depth + 1)?;
                        ForeignKey::Nested(Box::new(record))
                    }
                    other => plan_foreign_key(other, model, &relation_field)?,
                });
            }
        }

        Ok(planned.map(|fk| (fk_field, fk)))
    }

    fn plan_link(
        &self,
        item: Value,
        model: &str,
        field: &str,
        association: &AssociationDescriptor,
        path: &str,
        depth: usize,
    ) -> Result<Link> {
        match item {
            Value::Object(nested) => {
                let origin = Origin {
                    model,
                    field,
                    target: &association.model,
                };
                Ok(Link::Nested(self.plan_record(nested, Some(origin), path, depth + 1)?))
            }
            other => RecordId::from_value(&other)
                .map(|id| Link::Ref(RecordKey::new(association.model.clone(), id)))
                .ok_or_else(|| Error::FieldShape {
                    model: model.to_string(),
                    field: field.to_string(),
                    expected: "an array of records or ids",
                }),
        }
    }
}

fn plan_foreign_key(value: Value, model: &str, field: &str) -> Result<ForeignKey> {
    if value.is_null() {
        return Ok(ForeignKey::Clear);
    }
    RecordId::from_value(&value)
        .map(ForeignKey::Id)
        .ok_or_else(|| Error::FieldShape {
            model: model.to_string(),
            field: field.to_string(),
            expected: "a record, an id or null",
        })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Folds planned records into the store.
///
/// Tracks the identities on the current nesting path: a record that shows
/// up again beneath itself has its scalars updated, but its nested records
/// are only linked by id, never expanded again.
pub struct Merger<'a> {
    store: &'a mut Store,
    registry: &'a Registry,
    naming: &'a dyn Inflector,
    on_path: HashSet<RecordKey>,
}

impl<'a> Merger<'a> {
    pub fn new(store: &'a mut Store, registry: &'a Registry, naming: &'a dyn Inflector) -> Self {
        Merger {
            store,
            registry,
            naming,
            on_path: HashSet::new(),
        }
    }

    /// Merge one planned record and its subtree. Returns the record's id.
    pub fn merge(&mut self, planned: PlannedRecord) -> RecordId {
        let PlannedRecord {
            key,
            scalars,
            foreign_keys,
            has_many,
        } = planned;

        let record = self.slot(&key);
        for (field, value) in scalars {
            record.fields.insert(field, value);
        }

        let expand = self.on_path.insert(key.clone());
        if !expand {
            trace!(record = %key, "already on the nesting path, linking without expanding");
        }

        for (field, fk) in foreign_keys {
            let target = match fk {
                ForeignKey::Nested(nested) => Some(self.merge_child(*nested, expand)),
                ForeignKey::Id(id) => Some(id),
                ForeignKey::Clear => None,
            };
            self.slot(&key).set_foreign_key(&field, target.as_ref());
        }

        for (field, links) in has_many {
            let mut ids = Vec::with_capacity(links.len());
            for link in links {
                let id = match link {
                    Link::Nested(nested) => self.merge_child(nested, expand),
                    Link::Ref(target) => {
                        self.slot(&target);
                        target.id
                    }
                };
                ids.push(id);
            }
            let record = self.slot(&key);
            for id in ids {
                record.push_link(&field, id);
            }
        }

        if expand {
            self.on_path.remove(&key);
        }
        key.id
    }

    fn merge_child(&mut self, child: PlannedRecord, expand: bool) -> RecordId {
        if expand {
            return self.merge(child);
        }
        if child.carries_content() {
            debug!(
                record = %child.key,
                skipped = ?child.content_fields(),
                "record nested beneath its own occurrence, attributes not merged"
            );
        }
        self.slot(&child.key);
        child.key.id
    }

    /// Locate or create the record for `key`. New records get every
    /// declared has-many array seeded empty.
    fn slot(&mut self, key: &RecordKey) -> &mut Record {
        let registry = self.registry;
        let naming = self.naming;
        let (record, created) = self.store.ensure(key, || {
            let mut record = Record::new(key.model.clone(), key.id.clone());
            if let Some(description) = registry.describe(&key.model) {
                for association in description.has_many_associations() {
                    record.seed_link(&naming.has_many_field(&association.name));
                }
            }
            record
        });
        if created {
            trace!(record = %key, "created record");
        }
        record
    }
}

/// Validate `input` and fold it into `store`. Returns the number of
/// top-level records ingested. The store is untouched on error.
pub fn ingest(
    store: &mut Store,
    registry: &Registry,
    naming: &dyn Inflector,
    config: &SerializerConfig,
    input: Value,
) -> Result<usize> {
    let planned = IngestPlanner::new(registry, naming, config).plan(input)?;
    let count = planned.len();

    let mut merger = Merger::new(store, registry, naming);
    for record in planned {
        merger.merge(record);
    }

    debug!(records = count, stored = store.len(), "ingested");
    Ok(count)
}
