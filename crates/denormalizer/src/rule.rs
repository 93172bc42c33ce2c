//! Declarative denormalization rules.
//!
//! A rule is declared with a fluent [`RuleBuilder`] and compiled into an
//! immutable [`Rule`] when it is registered:
//!
//! ```ignore
//! Rule::<OrderPlaced, OrderView>::add_new().auto_map();
//! Rule::<OrderRenamed, OrderView>::update().key("order_id").map("name", "new_name");
//! Rule::<OrderDeleted, OrderView>::remove().key("order_id");
//! ```

use std::marker::PhantomData;

use common::{FieldDef, FieldValue, Record};
use projection_store::{Filter, FilterValue, Projection, ProjectionStore};
use serde::{Deserialize, Serialize};

use crate::mapping::{MappingPlan, MappingStep};
use crate::{DenormalizerError, Result};

/// What a rule does with the projection an event addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Allocate a new projection, map fields onto it and insert it.
    AddNew,
    /// Read the projection matching the key, map fields onto it and update it.
    Update,
    /// Remove every projection matching the key.
    Remove,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::AddNew => "add_new",
            Action::Update => "update",
            Action::Remove => "remove",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an update rule treats a key that matches no projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingProjectionPolicy {
    /// Skip the event; no update is issued.
    #[default]
    Ignore,
    /// Fail with [`DenormalizerError::ProjectionNotFound`].
    Fail,
}

/// Result of applying one rule to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Inserted,
    Updated,
    Removed,
    /// An update rule found nothing to update under the ignore policy.
    Skipped,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Inserted => "inserted",
            Outcome::Updated => "updated",
            Outcome::Removed => "removed",
            Outcome::Skipped => "skipped",
        }
    }
}

/// Fluent declaration of a rule mapping events `E` onto projections `P`.
///
/// Nothing is validated until [`RuleBuilder::build`], which the registry
/// calls on registration.
#[derive(Debug)]
#[must_use = "a rule builder does nothing until it is registered"]
pub struct RuleBuilder<E, P> {
    action: Action,
    auto_map: bool,
    steps: Vec<MappingStep>,
    ignored: Vec<&'static str>,
    keys: Vec<(&'static str, &'static str)>,
    missing: Option<MissingProjectionPolicy>,
    _types: PhantomData<fn() -> (E, P)>,
}

impl<E: Record, P: Projection> RuleBuilder<E, P> {
    fn new(action: Action) -> Self {
        Self {
            action,
            auto_map: false,
            steps: Vec::new(),
            ignored: Vec::new(),
            keys: Vec::new(),
            missing: None,
            _types: PhantomData,
        }
    }

    /// Copies every event field onto the projection field of the same name.
    pub fn auto_map(mut self) -> Self {
        self.auto_map = true;
        self
    }

    /// Copies event field `source` onto projection field `target`.
    pub fn map(mut self, target: &'static str, source: &'static str) -> Self {
        self.steps.push(MappingStep::Map { target, source });
        self
    }

    /// Assigns a constant to projection field `target`.
    pub fn set(mut self, target: &'static str, value: impl Into<FieldValue>) -> Self {
        self.steps.push(MappingStep::Set {
            target,
            value: value.into(),
        });
        self
    }

    /// Adds one to integer field `target`.
    pub fn increment(mut self, target: &'static str) -> Self {
        self.steps.push(MappingStep::Add { target, delta: 1 });
        self
    }

    /// Subtracts one from integer field `target`.
    pub fn decrement(mut self, target: &'static str) -> Self {
        self.steps.push(MappingStep::Add { target, delta: -1 });
        self
    }

    /// Excludes projection field `target` from auto-mapping.
    pub fn ignore(mut self, target: &'static str) -> Self {
        self.ignored.push(target);
        self
    }

    /// Keys the rule on a field both types name `field`.
    pub fn key(self, field: &'static str) -> Self {
        self.key_from(field, field)
    }

    /// Keys the rule on projection field `projection_field`, matched against
    /// the value of event field `event_field`.
    pub fn key_from(mut self, projection_field: &'static str, event_field: &'static str) -> Self {
        self.keys.push((projection_field, event_field));
        self
    }

    /// Fails the event when the update key matches nothing.
    pub fn fail_if_missing(mut self) -> Self {
        self.missing = Some(MissingProjectionPolicy::Fail);
        self
    }

    /// Skips the event when the update key matches nothing.
    pub fn ignore_if_missing(mut self) -> Self {
        self.missing = Some(MissingProjectionPolicy::Ignore);
        self
    }

    /// Validates the declaration and resolves it into a [`Rule`].
    pub fn build(self) -> Result<Rule<E, P>> {
        match self.action {
            Action::AddNew if !self.keys.is_empty() => {
                return Err(DenormalizerError::InvalidRule(format!(
                    "add_new rule for {} cannot declare key fields",
                    P::NAME
                )));
            }
            Action::Update | Action::Remove if self.keys.is_empty() => {
                return Err(DenormalizerError::MissingKey {
                    action: self.action,
                    projection: P::NAME,
                });
            }
            _ => {}
        }
        if self.missing.is_some() && self.action != Action::Update {
            return Err(DenormalizerError::InvalidRule(format!(
                "{} rule for {} has no missing-projection policy",
                self.action,
                P::NAME
            )));
        }

        let plan = if self.action == Action::Remove {
            if self.auto_map || !self.steps.is_empty() || !self.ignored.is_empty() {
                return Err(DenormalizerError::InvalidRule(format!(
                    "remove rule for {} cannot map fields",
                    P::NAME
                )));
            }
            MappingPlan::empty()
        } else {
            MappingPlan::compile(self.auto_map, &self.steps, &self.ignored)?
        };

        let keys = self
            .keys
            .iter()
            .map(|&(projection_field, event_field)| {
                KeyBinding::resolve(projection_field, event_field)
            })
            .collect::<Result<Vec<_>>>()?;

        if self.action == Action::Update {
            // The store locates the record to overwrite by identity, so an
            // identity field may only be rewritten with its own key value.
            for target in plan.target_fields() {
                if !P::IDENTITY.contains(&target) {
                    continue;
                }
                let keyed = self.keys.iter().any(|&(projection_field, event_field)| {
                    projection_field == target && plan.copy_source(target) == Some(event_field)
                });
                if !keyed {
                    return Err(DenormalizerError::InvalidRule(format!(
                        "update rule for {} rewrites identity field {}; key on it or ignore it",
                        P::NAME,
                        target
                    )));
                }
            }
        }

        Ok(Rule {
            action: self.action,
            plan,
            keys,
            missing: self.missing,
        })
    }
}

struct KeyBinding<E, P> {
    event: FieldDef<E>,
    projection: FieldDef<P>,
}

impl<E: Record, P: Record> KeyBinding<E, P> {
    fn resolve(projection_field: &'static str, event_field: &'static str) -> Result<Self> {
        let projection = P::field(projection_field).ok_or(DenormalizerError::UnknownField {
            record: P::NAME,
            field: projection_field,
        })?;
        let event = E::field(event_field).ok_or(DenormalizerError::UnknownField {
            record: E::NAME,
            field: event_field,
        })?;
        if !event.ty().widens_to(projection.ty()) {
            return Err(DenormalizerError::IncompatibleFieldTypes {
                field: projection_field,
                from: event.ty(),
                to: projection.ty(),
            });
        }
        Ok(Self { event, projection })
    }

    fn filter_value(&self, event: &E) -> Result<FilterValue> {
        let value = self.event.read(event).coerce(self.projection.ty())?;
        Ok(FilterValue::new(self.projection.name(), value))
    }
}

/// A compiled, immutable rule mapping events `E` onto projections `P`.
pub struct Rule<E, P> {
    action: Action,
    plan: MappingPlan<E, P>,
    keys: Vec<KeyBinding<E, P>>,
    missing: Option<MissingProjectionPolicy>,
}

impl<E: Record, P: Projection> Rule<E, P> {
    /// Starts a rule that inserts a new projection per event.
    pub fn add_new() -> RuleBuilder<E, P> {
        RuleBuilder::new(Action::AddNew)
    }

    /// Starts a rule that updates the projection matching the event's key.
    pub fn update() -> RuleBuilder<E, P> {
        RuleBuilder::new(Action::Update)
    }

    /// Starts a rule that removes the projections matching the event's key.
    pub fn remove() -> RuleBuilder<E, P> {
        RuleBuilder::new(Action::Remove)
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// Projection fields this rule writes.
    pub fn mapped_fields(&self) -> Vec<&'static str> {
        self.plan.target_fields()
    }

    /// The rule's own missing-projection policy, if it overrides the default.
    pub fn missing_policy(&self) -> Option<MissingProjectionPolicy> {
        self.missing
    }

    /// Builds the filter addressing the projection `event` targets.
    ///
    /// Key values are widened to the projection field types.
    pub fn key_filter(&self, event: &E) -> Result<Filter> {
        let mut filter = Filter::new();
        for key in &self.keys {
            filter.push(key.filter_value(event)?);
        }
        Ok(filter)
    }

    /// Applies the rule's field mapping to `projection`.
    pub fn apply(&self, event: &E, projection: &mut P) -> Result<()> {
        self.plan.apply(event, projection)
    }

    /// Runs the rule against `store`: one insert, one read followed by at
    /// most one update, or one remove.
    pub async fn execute<S: ProjectionStore>(
        &self,
        event: &E,
        store: &S,
        default_policy: MissingProjectionPolicy,
    ) -> Result<Outcome> {
        match self.action {
            Action::AddNew => {
                let mut projection = P::default();
                self.apply(event, &mut projection)?;
                store.insert(projection).await?;
                tracing::debug!(projection = P::NAME, "inserted projection");
                Ok(Outcome::Inserted)
            }
            Action::Update => {
                let filter = self.key_filter(event)?;
                let mut matches = store.read::<P>(&filter).await?;
                if matches.len() > 1 {
                    tracing::warn!(
                        projection = P::NAME,
                        %filter,
                        matches = matches.len(),
                        "ambiguous update target"
                    );
                    return Err(DenormalizerError::AmbiguousUpdateTarget {
                        event: E::NAME,
                        projection: P::NAME,
                        matches: matches.len(),
                    });
                }
                let Some(mut projection) = matches.pop() else {
                    metrics::counter!("denormalizer_missing_projections", "projection" => P::NAME)
                        .increment(1);
                    return match self.missing.unwrap_or(default_policy) {
                        MissingProjectionPolicy::Ignore => {
                            tracing::debug!(projection = P::NAME, %filter, "no projection to update");
                            Ok(Outcome::Skipped)
                        }
                        MissingProjectionPolicy::Fail => {
                            tracing::warn!(projection = P::NAME, %filter, "no projection to update");
                            Err(DenormalizerError::ProjectionNotFound {
                                event: E::NAME,
                                projection: P::NAME,
                                filter: filter.to_string(),
                            })
                        }
                    };
                };
                self.apply(event, &mut projection)?;
                store.update(projection).await?;
                tracing::debug!(projection = P::NAME, %filter, "updated projection");
                Ok(Outcome::Updated)
            }
            Action::Remove => {
                let filter = self.key_filter(event)?;
                store.remove::<P>(&filter).await?;
                tracing::debug!(projection = P::NAME, %filter, "removed projections");
                Ok(Outcome::Removed)
            }
        }
    }
}

impl<E, P> std::fmt::Debug for Rule<E, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("action", &self.action)
            .field("plan", &self.plan)
            .field(
                "keys",
                &self
                    .keys
                    .iter()
                    .map(|k| k.projection.name())
                    .collect::<Vec<_>>(),
            )
            .field("missing", &self.missing)
            .finish()
    }
}
