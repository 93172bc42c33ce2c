//! Shared building blocks for the denormalization workspace.
//!
//! - [`FieldType`] and [`FieldValue`] describe scalar record fields
//! - [`Record`] exposes a type's fields as static reader/writer pairs
//! - [`impl_record!`] derives [`Record`] for plain structs

pub mod record;
pub mod types;

pub use record::{Field, FieldDef, Record, field_type_of};
pub use types::{FieldError, FieldType, FieldValue};
