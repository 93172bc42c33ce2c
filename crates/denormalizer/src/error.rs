//! Denormalizer error types.

use common::{FieldError, FieldType};
use projection_store::StoreError;
use thiserror::Error;

use crate::rule::Action;

/// Errors that can occur while registering or applying denormalization rules.
#[derive(Debug, Error)]
pub enum DenormalizerError {
    /// An event was handled with no rule registered for its type.
    #[error("No rule registered for event {event}")]
    NoRuleRegistered { event: &'static str },

    /// A second rule was registered for the same event/projection pair.
    #[error("A rule mapping {event} to {projection} is already registered")]
    DuplicateRuleRegistration {
        event: &'static str,
        projection: &'static str,
    },

    /// An update rule's key matched more than one projection.
    #[error("Update of {projection} for event {event} matched {matches} projections")]
    AmbiguousUpdateTarget {
        event: &'static str,
        projection: &'static str,
        matches: usize,
    },

    /// A strict update rule's key matched no projection.
    #[error("No {projection} matched {filter} for event {event}")]
    ProjectionNotFound {
        event: &'static str,
        projection: &'static str,
        filter: String,
    },

    /// A rule referenced a field the record type does not have.
    #[error("Unknown field {field} on {record}")]
    UnknownField {
        record: &'static str,
        field: &'static str,
    },

    /// Two same-name fields have types that cannot be mapped.
    #[error("Field {field} cannot be mapped from {from} to {to}")]
    IncompatibleFieldTypes {
        field: &'static str,
        from: FieldType,
        to: FieldType,
    },

    /// An update or remove rule declared no key fields.
    #[error("{action} rule for {projection} requires at least one key field")]
    MissingKey {
        action: Action,
        projection: &'static str,
    },

    /// A rule combined options that do not fit its action.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// A field value could not be converted while mapping.
    #[error("Field error: {0}")]
    Field(#[from] FieldError),

    /// The projection store failed.
    #[error("Projection store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for denormalizer operations.
pub type Result<T> = std::result::Result<T, DenormalizerError>;
