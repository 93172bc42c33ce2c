use common::FieldError;
use thiserror::Error;

/// Errors that can occur when interacting with a projection store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An update targeted a projection that is not stored.
    #[error("Projection not found in {collection}: {identity}")]
    NotFound {
        collection: &'static str,
        identity: String,
    },

    /// The projection type declares no identity fields, so it cannot be
    /// updated in place.
    #[error("Projection type {collection} has no identity fields")]
    MissingIdentity { collection: &'static str },

    /// A filter or identity referenced a field the projection type does not have.
    #[error("Unknown field {field} on {collection}")]
    UnknownField {
        collection: &'static str,
        field: String,
    },

    /// A field value could not be converted.
    #[error("Field error: {0}")]
    Field(#[from] FieldError),

    /// A backend-specific failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Result type for projection store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
