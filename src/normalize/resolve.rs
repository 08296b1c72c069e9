//! Inverse relationship resolution
//!
//! Runs over the fully ingested store. For every type present, in registry
//! declaration order, and every association whose target type is present,
//! the inverse descriptor is looked up on the target and the missing side
//! of the link is filled in:
//!
//! - belongs-to: the child's id is appended to the parent's inverse array.
//! - has-many with an inverse belongs-to: records pointing back via their
//!   foreign key are appended. Listed records with no foreign key get one,
//!   but only when no other association links the two types.
//! - has-many with an inverse has-many: records listing the owner are
//!   appended. With a `through` qualifier the owner's own list is also
//!   mirrored onto the targets.
//!
//! Each association is a single pass. Its edits are computed from the store
//! as it stands, then applied. No fixed point is sought.

use crate::naming::Inflector;
use crate::normalize::store::Store;
use crate::normalize::types::{RecordId, SerializerConfig};
use crate::schema::{AssociationDescriptor, AssociationKind, Registry};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
enum Edit {
    /// Append `target` to the has-many array `field` unless listed
    Link {
        model: String,
        id: RecordId,
        field: String,
        target: RecordId,
    },
    /// Set the foreign key `field` unless it already holds an id
    ForeignKey {
        model: String,
        id: RecordId,
        field: String,
        target: RecordId,
    },
}

/// Read-only view used to compute the edits of one association
struct EditPlanner<'a> {
    store: &'a Store,
    registry: &'a Registry,
    naming: &'a dyn Inflector,
    config: &'a SerializerConfig,
}

impl EditPlanner<'_> {
    fn foreign_key_field(&self, association: &AssociationDescriptor) -> String {
        self.naming
            .foreign_key_field(&association.name, &self.config.foreign_key_suffix)
    }

    fn belongs_to(&self, model: &str, association: &AssociationDescriptor) -> Vec<Edit> {
        let Some(inverse) = self.registry.inverse_has_many(association, model) else {
            debug!(
                model,
                relation = %association.name,
                target = %association.model,
                "no inverse has-many, leaving belongs-to one-sided"
            );
            return Vec::new();
        };
        let (Some(children), Some(parents)) = (
            self.store.table(model),
            self.store.table(&association.model),
        ) else {
            return Vec::new();
        };

        let fk_field = self.foreign_key_field(association);
        let inverse_field = self.naming.has_many_field(&inverse.name);

        children
            .records()
            .filter_map(|child| {
                let parent_id = child.foreign_key(&fk_field)?;
                if !parents.contains(&parent_id) {
                    return None;
                }
                Some(Edit::Link {
                    model: association.model.clone(),
                    id: parent_id,
                    field: inverse_field.clone(),
                    target: child.id.clone(),
                })
            })
            .collect()
    }

    fn has_many(&self, model: &str, association: &AssociationDescriptor) -> Vec<Edit> {
        let (Some(owners), Some(targets)) = (
            self.store.table(model),
            self.store.table(&association.model),
        ) else {
            return Vec::new();
        };

        let field = self.naming.has_many_field(&association.name);
        let mut edits = Vec::new();
        let mut inferred = false;

        if association.through.is_none() {
            if let Some(inverse) = self.registry.inverse_belongs_to(association, model) {
                inferred = true;
                let inverse_fk = self.foreign_key_field(inverse);
                let backfill = self
                    .registry
                    .has_unique_inverse(association, model, AssociationKind::BelongsTo);

                for owner in owners.records() {
                    for target in targets.records() {
                        if target.foreign_key(&inverse_fk).as_ref() == Some(&owner.id) {
                            edits.push(Edit::Link {
                                model: model.to_string(),
                                id: owner.id.clone(),
                                field: field.clone(),
                                target: target.id.clone(),
                            });
                        }
                    }

                    if !backfill {
                        continue;
                    }
                    for listed in owner.link(&field).unwrap_or_default() {
                        let unset = targets
                            .get(listed)
                            .is_some_and(|target| target.foreign_key(&inverse_fk).is_none());
                        if unset {
                            edits.push(Edit::ForeignKey {
                                model: association.model.clone(),
                                id: listed.clone(),
                                field: inverse_fk.clone(),
                                target: owner.id.clone(),
                            });
                        }
                    }
                }
            }
        }

        if let Some(inverse) = self.registry.inverse_has_many(association, model) {
            inferred = true;
            let inverse_field = self.naming.has_many_field(&inverse.name);

            for owner in owners.records() {
                for target in targets.records() {
                    if target.lists(&inverse_field, &owner.id) {
                        edits.push(Edit::Link {
                            model: model.to_string(),
                            id: owner.id.clone(),
                            field: field.clone(),
                            target: target.id.clone(),
                        });
                    }
                }

                if association.through.is_some() {
                    for listed in owner.link(&field).unwrap_or_default() {
                        if targets.contains(listed) {
                            edits.push(Edit::Link {
                                model: association.model.clone(),
                                id: listed.clone(),
                                field: inverse_field.clone(),
                                target: owner.id.clone(),
                            });
                        }
                    }
                }
            }
        }

        if !inferred {
            debug!(
                model,
                relation = %association.name,
                target = %association.model,
                "no inverse association, leaving has-many one-sided"
            );
        }

        edits
    }
}

fn apply(store: &mut Store, edits: Vec<Edit>) -> usize {
    let mut applied = 0;
    for edit in edits {
        match edit {
            Edit::Link {
                model,
                id,
                field,
                target,
            } => {
                if let Some(record) = store.get_mut(&model, &id) {
                    if record.push_link_unique(&field, target) {
                        applied += 1;
                    }
                }
            }
            Edit::ForeignKey {
                model,
                id,
                field,
                target,
            } => {
                if let Some(record) = store.get_mut(&model, &id) {
                    if record.foreign_key(&field).is_none() {
                        record.set_foreign_key(&field, Some(&target));
                        applied += 1;
                    }
                }
            }
        }
    }
    applied
}

/// Fill in the inverse side of every declared relationship in `store`.
/// Returns the number of ids written.
pub fn resolve(
    store: &mut Store,
    registry: &Registry,
    naming: &dyn Inflector,
    config: &SerializerConfig,
) -> usize {
    let mut applied = 0;

    for (model, description) in registry.models() {
        if !store.contains_type(model) {
            continue;
        }
        for association in &description.associations {
            if !store.contains_type(&association.model) {
                continue;
            }
            let edits = {
                let planner = EditPlanner {
                    store: &*store,
                    registry,
                    naming,
                    config,
                };
                match association.kind {
                    AssociationKind::BelongsTo => planner.belongs_to(model, association),
                    AssociationKind::HasMany => planner.has_many(model, association),
                }
            };
            applied += apply(store, edits);
        }
    }

    debug!(applied, "resolved relationships");
    applied
}
