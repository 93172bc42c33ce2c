//! Projection store boundary for the denormalizer.
//!
//! - [`ProjectionStore`] trait with `read`, `insert`, `update` and `remove`
//! - [`Filter`] and [`FilterValue`] for addressing stored projections
//! - [`Projection`] trait for read-model records
//! - [`InMemoryProjectionStore`] with an operation journal for tests

pub mod error;
pub mod filter;
pub mod memory;
pub mod projection;
pub mod store;

pub use error::{Result, StoreError};
pub use filter::{Filter, FilterValue};
pub use memory::{InMemoryProjectionStore, StoreOperation};
pub use projection::Projection;
pub use store::{ProjectionStore, ProjectionStoreExt};
