//! Event dispatch onto registered rules.

use std::any::TypeId;

use common::Record;
use projection_store::{Projection, ProjectionStore};

use crate::config::DenormalizerConfig;
use crate::registry::RuleRegistry;
use crate::rule::{Action, Outcome, RuleBuilder};
use crate::{DenormalizerError, Result};

/// What one rule did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub projection: &'static str,
    pub action: Action,
    pub outcome: Outcome,
}

/// Applies events to projections through a store of type `S`.
///
/// Rules are registered up front; afterwards the denormalizer is only read,
/// so it can be shared behind an `Arc` and used from several tasks at once.
pub struct Denormalizer<S: ProjectionStore> {
    registry: RuleRegistry<S>,
    config: DenormalizerConfig,
}

impl<S: ProjectionStore> Denormalizer<S> {
    /// Creates a denormalizer with no rules.
    pub fn new(config: DenormalizerConfig) -> Self {
        Self {
            registry: RuleRegistry::new(),
            config,
        }
    }

    /// Compiles and registers a rule. See [`RuleRegistry::register`].
    pub fn register<E: Record, P: Projection>(
        &mut self,
        builder: RuleBuilder<E, P>,
    ) -> Result<()> {
        self.registry.register(builder)
    }

    pub fn registry(&self) -> &RuleRegistry<S> {
        &self.registry
    }

    pub fn config(&self) -> &DenormalizerConfig {
        &self.config
    }

    /// Applies every rule registered for `E` to `event`, in registration
    /// order.
    ///
    /// Each rule issues its own store operations; the first failing rule
    /// stops dispatch and its error is returned. Operations already issued by
    /// earlier rules are not undone.
    #[tracing::instrument(skip(self, event, store), fields(event = E::NAME))]
    pub async fn handle<E: Record>(&self, event: &E, store: &S) -> Result<Vec<Applied>> {
        let rules = self.registry.rules_for(TypeId::of::<E>());
        if rules.is_empty() {
            metrics::counter!("denormalizer_unhandled_events", "event" => E::NAME).increment(1);
            tracing::warn!("no rule registered");
            return Err(DenormalizerError::NoRuleRegistered { event: E::NAME });
        }

        let mut applied = Vec::with_capacity(rules.len());
        for registered in rules {
            let rule = &registered.rule;
            let outcome = rule
                .dispatch(event, store, self.config.missing_projection)
                .await?;
            metrics::counter!(
                "denormalizer_events_handled",
                "event" => E::NAME,
                "action" => rule.action().as_str()
            )
            .increment(1);
            applied.push(Applied {
                projection: rule.projection(),
                action: rule.action(),
                outcome,
            });
        }

        tracing::debug!(rules = applied.len(), "event handled");
        Ok(applied)
    }
}

impl<S: ProjectionStore> Default for Denormalizer<S> {
    fn default() -> Self {
        Self::new(DenormalizerConfig::default())
    }
}
