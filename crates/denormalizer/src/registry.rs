//! Rule registry keyed by event type.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use async_trait::async_trait;
use common::Record;
use projection_store::{Projection, ProjectionStore};

use crate::rule::{Action, MissingProjectionPolicy, Outcome, Rule, RuleBuilder};
use crate::{DenormalizerError, Result};

/// A compiled rule with its event and projection types erased.
#[async_trait]
pub(crate) trait Dispatch<S>: Send + Sync {
    fn projection(&self) -> &'static str;

    fn action(&self) -> Action;

    async fn dispatch(
        &self,
        event: &(dyn Any + Send + Sync),
        store: &S,
        default_policy: MissingProjectionPolicy,
    ) -> Result<Outcome>;
}

#[async_trait]
impl<E, P, S> Dispatch<S> for Rule<E, P>
where
    E: Record,
    P: Projection,
    S: ProjectionStore,
{
    fn projection(&self) -> &'static str {
        P::NAME
    }

    fn action(&self) -> Action {
        Rule::action(self)
    }

    async fn dispatch(
        &self,
        event: &(dyn Any + Send + Sync),
        store: &S,
        default_policy: MissingProjectionPolicy,
    ) -> Result<Outcome> {
        let event = event
            .downcast_ref::<E>()
            .ok_or(DenormalizerError::NoRuleRegistered { event: E::NAME })?;
        self.execute(event, store, default_policy).await
    }
}

pub(crate) struct RegisteredRule<S> {
    projection_type: TypeId,
    pub(crate) rule: Box<dyn Dispatch<S>>,
}

/// Rules registered for a store type `S`, keyed by event type.
///
/// Each (event type, projection type) pair holds at most one rule. Rules
/// for the same event type keep their registration order.
pub struct RuleRegistry<S> {
    rules: HashMap<TypeId, Vec<RegisteredRule<S>>>,
}

impl<S: ProjectionStore> RuleRegistry<S> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Compiles `builder` and registers the resulting rule.
    ///
    /// Fails with [`DenormalizerError::DuplicateRuleRegistration`] when the
    /// pair already has a rule, and with the builder's own error when the
    /// declaration is invalid. A failed registration leaves the registry
    /// unchanged.
    pub fn register<E: Record, P: Projection>(
        &mut self,
        builder: RuleBuilder<E, P>,
    ) -> Result<()> {
        if self.contains::<E, P>() {
            return Err(DenormalizerError::DuplicateRuleRegistration {
                event: E::NAME,
                projection: P::NAME,
            });
        }

        let rule = builder.build()?;
        tracing::debug!(
            event = E::NAME,
            projection = P::NAME,
            action = %rule.action(),
            "registered rule"
        );
        self.rules
            .entry(TypeId::of::<E>())
            .or_default()
            .push(RegisteredRule {
                projection_type: TypeId::of::<P>(),
                rule: Box::new(rule),
            });
        Ok(())
    }

    /// Returns true if a rule maps `E` onto `P`.
    pub fn contains<E: Record, P: Projection>(&self) -> bool {
        self.rules.get(&TypeId::of::<E>()).is_some_and(|rules| {
            rules
                .iter()
                .any(|registered| registered.projection_type == TypeId::of::<P>())
        })
    }

    /// Returns the projections `E` is mapped onto, with their actions, in
    /// registration order.
    pub fn targets_of<E: Record>(&self) -> Vec<(&'static str, Action)> {
        self.rules_for(TypeId::of::<E>())
            .iter()
            .map(|registered| (registered.rule.projection(), registered.rule.action()))
            .collect()
    }

    pub(crate) fn rules_for(&self, event_type: TypeId) -> &[RegisteredRule<S>] {
        self.rules.get(&event_type).map_or(&[], Vec::as_slice)
    }

    /// Total number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: ProjectionStore> Default for RuleRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::impl_record;
    use projection_store::InMemoryProjectionStore;

    #[derive(Debug, Default)]
    struct MemberJoined {
        member_id: u32,
        name: String,
    }

    impl_record!(MemberJoined { member_id, name });

    #[derive(Debug, Default, Clone)]
    struct MemberView {
        member_id: u32,
        name: String,
    }

    impl_record!(MemberView { member_id, name });

    impl Projection for MemberView {
        const COLLECTION: &'static str = "members";
        const IDENTITY: &'static [&'static str] = &["member_id"];
    }

    #[derive(Debug, Default, Clone)]
    struct MemberCount {
        name: String,
    }

    impl_record!(MemberCount { name });

    impl Projection for MemberCount {
        const COLLECTION: &'static str = "member_counts";
    }

    type Registry = RuleRegistry<InMemoryProjectionStore>;

    #[test]
    fn registers_one_rule_per_pair() {
        let mut registry = Registry::new();
        registry
            .register(Rule::<MemberJoined, MemberView>::add_new().auto_map())
            .unwrap();

        let err = registry
            .register(Rule::<MemberJoined, MemberView>::update().key("member_id"))
            .unwrap_err();
        assert!(matches!(
            err,
            DenormalizerError::DuplicateRuleRegistration {
                event: "MemberJoined",
                projection: "MemberView",
            }
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn one_event_may_feed_several_projections() {
        let mut registry = Registry::new();
        registry
            .register(Rule::<MemberJoined, MemberView>::add_new().auto_map())
            .unwrap();
        registry
            .register(Rule::<MemberJoined, MemberCount>::add_new().auto_map())
            .unwrap();

        assert_eq!(
            registry.targets_of::<MemberJoined>(),
            vec![
                ("MemberView", Action::AddNew),
                ("MemberCount", Action::AddNew)
            ]
        );
        assert!(registry.contains::<MemberJoined, MemberCount>());
    }

    #[test]
    fn invalid_rule_leaves_registry_unchanged() {
        let mut registry = Registry::new();
        let err = registry
            .register(Rule::<MemberJoined, MemberView>::remove())
            .unwrap_err();

        assert!(matches!(err, DenormalizerError::MissingKey { .. }));
        assert!(registry.is_empty());
        assert!(registry.rules.is_empty());
        assert!(!registry.contains::<MemberJoined, MemberView>());
        assert!(registry.targets_of::<MemberJoined>().is_empty());
    }
}
