//! Schema registry
//!
//! Declares, per type, its scalar properties and its has-many and
//! belongs-to associations. The normalizer only ever reads fields declared
//! here.

pub mod registry;

pub use registry::{AssociationDescriptor, AssociationKind, ModelDescription, Registry};
