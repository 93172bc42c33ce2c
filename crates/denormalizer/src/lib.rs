//! Declarative event-to-projection denormalization.
//!
//! This crate turns events into projection store operations:
//! - [`Rule`] declarations built with [`RuleBuilder`] (`add_new`, `update`,
//!   `remove`, auto-mapping and explicit field steps)
//! - [`RuleRegistry`] holding one compiled rule per event/projection pair
//! - [`Denormalizer`] dispatching events onto the registered rules
//! - [`DenormalizerConfig`] and [`telemetry::init_tracing`] for the ambient setup

pub mod config;
pub mod denormalizer;
pub mod error;
pub mod mapping;
pub mod registry;
pub mod rule;
pub mod telemetry;

pub use config::DenormalizerConfig;
pub use denormalizer::{Applied, Denormalizer};
pub use error::{DenormalizerError, Result};
pub use mapping::MappingPlan;
pub use registry::RuleRegistry;
pub use rule::{Action, MissingProjectionPolicy, Outcome, Rule, RuleBuilder};
