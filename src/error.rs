use thiserror::Error;

/// Errors raised while loading a registry or ingesting records.
#[derive(Debug, Error)]
pub enum Error {
    /// `ingest` was handed nothing to ingest.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A record names a type the registry does not describe.
    #[error("type `{0}` is not declared in the registry")]
    UnknownType(String),

    /// An association points at a type the registry does not describe.
    #[error("association `{model}.{association}` targets undeclared type `{target}`")]
    UnknownTarget {
        model: String,
        association: String,
        target: String,
    },

    /// Strict mode only: an attribute not declared for the record's type.
    #[error("field `{field}` is not declared on type `{model}`")]
    UndeclaredField { model: String, field: String },

    /// A declared field carries a value of the wrong shape.
    #[error("field `{model}.{field}` expected {expected}")]
    FieldShape {
        model: String,
        field: String,
        expected: &'static str,
    },

    /// A nested record states a type other than its association's target.
    #[error("field `{model}.{field}` holds a `{found}` record, expected `{expected}`")]
    TypeConflict {
        model: String,
        field: String,
        expected: String,
        found: String,
    },

    /// Two types map onto the same output collection key.
    #[error("types `{first}` and `{second}` both serialize as `{key}`")]
    CollectionCollision {
        key: String,
        first: String,
        second: String,
    },

    /// A record without a usable type or id.
    #[error("record at `{path}` has no usable {missing}")]
    MissingIdentity { path: String, missing: &'static str },

    /// Nesting deeper than the configured limit.
    #[error("record at `{path}` exceeds the maximum nesting depth of {max_depth}")]
    DepthExceeded { path: String, max_depth: usize },

    /// The registry document could not be read.
    #[error("schema error: {0}")]
    Schema(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
