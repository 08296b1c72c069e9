use crate::error::{Error, Result};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;

/// Direction of an association as declared on one side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssociationKind {
    HasMany,
    BelongsTo,
}

/// One declared association of a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationDescriptor {
    pub kind: AssociationKind,

    /// Relation name, e.g. "author" or "books"
    pub name: String,

    /// Target type name
    pub model: String,

    /// Join qualifier for many-to-many associations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub through: Option<String>,
}

impl AssociationDescriptor {
    pub fn is_has_many(&self) -> bool {
        self.kind == AssociationKind::HasMany
    }

    pub fn is_belongs_to(&self) -> bool {
        self.kind == AssociationKind::BelongsTo
    }
}

/// Scalar properties and associations of one type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    #[serde(default)]
    pub properties: Vec<String>,

    #[serde(default)]
    pub associations: Vec<AssociationDescriptor>,
}

impl ModelDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.properties.push(name.into());
        self
    }

    pub fn has_many(self, name: impl Into<String>, model: impl Into<String>) -> Self {
        self.association(AssociationKind::HasMany, name.into(), model.into(), None)
    }

    pub fn has_many_through(
        self,
        name: impl Into<String>,
        model: impl Into<String>,
        through: impl Into<String>,
    ) -> Self {
        self.association(
            AssociationKind::HasMany,
            name.into(),
            model.into(),
            Some(through.into()),
        )
    }

    pub fn belongs_to(self, name: impl Into<String>, model: impl Into<String>) -> Self {
        self.association(AssociationKind::BelongsTo, name.into(), model.into(), None)
    }

    fn association(
        mut self,
        kind: AssociationKind,
        name: String,
        model: String,
        through: Option<String>,
    ) -> Self {
        self.associations.push(AssociationDescriptor {
            kind,
            name,
            model,
            through,
        });
        self
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p == name)
    }

    pub fn has_many_associations(&self) -> impl Iterator<Item = &AssociationDescriptor> {
        self.associations.iter().filter(|a| a.is_has_many())
    }

    pub fn belongs_to_associations(&self) -> impl Iterator<Item = &AssociationDescriptor> {
        self.associations.iter().filter(|a| a.is_belongs_to())
    }
}

/// Type definitions and association metadata, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    models: Vec<(String, ModelDescription)>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the description of `name`.
    pub fn with_model(mut self, name: impl Into<String>, description: ModelDescription) -> Self {
        self.insert(name.into(), description);
        self
    }

    pub fn insert(&mut self, name: String, description: ModelDescription) {
        match self.index.get(&name).copied() {
            Some(slot) => self.models[slot].1 = description,
            None => {
                self.index.insert(name.clone(), self.models.len());
                self.models.push((name, description));
            }
        }
    }

    /// Load a registry from a JSON object keyed by type name.
    ///
    /// ```json
    /// {
    ///   "Author": {
    ///     "properties": ["name"],
    ///     "associations": [{"kind": "hasMany", "name": "books", "model": "Book"}]
    ///   },
    ///   "Book": {
    ///     "properties": ["title"],
    ///     "associations": [{"kind": "belongsTo", "name": "author", "model": "Author"}]
    ///   }
    /// }
    /// ```
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(models) = value else {
            return Err(Error::Schema(serde_json::Error::custom(
                "registry document must be a JSON object keyed by type name",
            )));
        };

        let mut registry = Registry::new();
        for (name, description) in models {
            let description: ModelDescription = serde_json::from_value(description)?;
            registry.insert(name, description);
        }
        registry.validate()?;
        Ok(registry)
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(source)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_value(serde_json::from_reader(reader)?)
    }

    /// Check that every association targets a declared type.
    pub fn validate(&self) -> Result<()> {
        for (name, description) in &self.models {
            for association in &description.associations {
                if !self.index.contains_key(&association.model) {
                    return Err(Error::UnknownTarget {
                        model: name.clone(),
                        association: association.name.clone(),
                        target: association.model.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn describe(&self, name: &str) -> Option<&ModelDescription> {
        self.index.get(name).map(|&slot| &self.models[slot].1)
    }

    /// Like [`Registry::describe`], failing with `UnknownType`.
    pub fn require(&self, name: &str) -> Result<&ModelDescription> {
        self.describe(name)
            .ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Models in declaration order.
    pub fn models(&self) -> impl Iterator<Item = (&str, &ModelDescription)> {
        self.models.iter().map(|(name, desc)| (name.as_str(), desc))
    }

    /// The has-many on `association.model` pointing back at `from_type`
    /// with the same `through` qualifier.
    pub fn inverse_has_many(
        &self,
        association: &AssociationDescriptor,
        from_type: &str,
    ) -> Option<&AssociationDescriptor> {
        self.inverse(association, from_type, AssociationKind::HasMany)
    }

    /// The belongs-to on `association.model` pointing back at `from_type`.
    pub fn inverse_belongs_to(
        &self,
        association: &AssociationDescriptor,
        from_type: &str,
    ) -> Option<&AssociationDescriptor> {
        self.inverse(association, from_type, AssociationKind::BelongsTo)
    }

    /// Whether `association` and its inverse of `kind` are the only
    /// associations linking the two types in their directions.
    pub fn has_unique_inverse(
        &self,
        association: &AssociationDescriptor,
        from_type: &str,
        kind: AssociationKind,
    ) -> bool {
        self.inverse_pairing(association, from_type, kind)
            .is_some_and(|(siblings, candidates)| siblings.len() == 1 && candidates.len() == 1)
    }

    /// When both sides declare the same number of associations towards
    /// each other, they pair up by declaration position. Otherwise the last
    /// candidate on the target wins.
    fn inverse(
        &self,
        association: &AssociationDescriptor,
        from_type: &str,
        kind: AssociationKind,
    ) -> Option<&AssociationDescriptor> {
        let (siblings, candidates) = self.inverse_pairing(association, from_type, kind)?;
        match siblings.iter().position(|sibling| *sibling == association) {
            Some(slot) if siblings.len() == candidates.len() => candidates.get(slot).copied(),
            _ => candidates.last().copied(),
        }
    }

    /// Associations of `from_type` that could share an inverse with
    /// `association`, and the inverse candidates of `kind` on its target.
    fn inverse_pairing(
        &self,
        association: &AssociationDescriptor,
        from_type: &str,
        kind: AssociationKind,
    ) -> Option<(Vec<&AssociationDescriptor>, Vec<&AssociationDescriptor>)> {
        let siblings = self
            .describe(from_type)?
            .associations
            .iter()
            .filter(|sibling| {
                sibling.kind == association.kind
                    && sibling.model == association.model
                    && sibling.through == association.through
            })
            .collect();
        let candidates = self
            .describe(&association.model)?
            .associations
            .iter()
            .filter(|candidate| {
                candidate.kind == kind
                    && candidate.model == from_type
                    && (kind == AssociationKind::BelongsTo
                        || candidate.through == association.through)
            })
            .collect();
        Some((siblings, candidates))
    }
}
