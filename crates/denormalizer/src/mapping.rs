//! Field mapping plans compiled from rule declarations.
//!
//! A plan is resolved once, when a rule is registered: every field name is
//! looked up and every type pairing is checked up front. Applying a plan is
//! then a walk over static reader/writer pairs.

use common::{FieldDef, FieldError, FieldValue, Record};

use crate::{DenormalizerError, Result};

/// One mapping instruction as declared on a rule builder.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MappingStep {
    /// Copy `source` from the event into `target` on the projection.
    Map {
        target: &'static str,
        source: &'static str,
    },
    /// Assign a constant.
    Set {
        target: &'static str,
        value: FieldValue,
    },
    /// Add `delta` to an integer field.
    Add { target: &'static str, delta: i128 },
}

impl MappingStep {
    fn target(&self) -> &'static str {
        match self {
            MappingStep::Map { target, .. }
            | MappingStep::Set { target, .. }
            | MappingStep::Add { target, .. } => *target,
        }
    }
}

enum Binding<E, P> {
    Copy {
        source: FieldDef<E>,
        target: FieldDef<P>,
    },
    Constant {
        target: FieldDef<P>,
        value: FieldValue,
    },
    Add {
        target: FieldDef<P>,
        delta: i128,
    },
}

impl<E, P> Binding<E, P> {
    fn target(&self) -> &FieldDef<P> {
        match self {
            Binding::Copy { target, .. }
            | Binding::Constant { target, .. }
            | Binding::Add { target, .. } => target,
        }
    }

    fn apply(&self, event: &E, projection: &mut P) -> std::result::Result<(), FieldError> {
        match self {
            Binding::Copy { source, target } => target.write(projection, source.read(event)),
            Binding::Constant { target, value } => target.write(projection, value.clone()),
            Binding::Add { target, delta } => {
                let current = target.read(projection);
                let current = current.as_integer().ok_or(FieldError::TypeMismatch {
                    expected: target.ty(),
                    actual: current.field_type(),
                })?;
                let next = current + delta;
                target.write(projection, FieldValue::from_integer(next, target.ty())?)
            }
        }
    }
}

/// Resolved field bindings from an event type `E` onto a projection type `P`.
pub struct MappingPlan<E, P> {
    bindings: Vec<Binding<E, P>>,
}

impl<E: Record, P: Record> MappingPlan<E, P> {
    /// A plan that changes nothing.
    pub(crate) fn empty() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Resolves `steps`, preceded by the auto-mapped fields when `auto_map`
    /// is set.
    ///
    /// AutoMap pairs every projection field with the event field of the same
    /// name, skipping `ignored` fields and fields an explicit step targets.
    /// Same-name fields whose types do not widen fail the whole plan.
    pub(crate) fn compile(
        auto_map: bool,
        steps: &[MappingStep],
        ignored: &[&'static str],
    ) -> Result<Self> {
        let event_fields = E::fields();
        let projection_fields = P::fields();

        let find_event = |name: &'static str| {
            event_fields
                .iter()
                .copied()
                .find(|def| def.name() == name)
                .ok_or(DenormalizerError::UnknownField {
                    record: E::NAME,
                    field: name,
                })
        };
        let find_projection = |name: &'static str| {
            projection_fields
                .iter()
                .copied()
                .find(|def| def.name() == name)
                .ok_or(DenormalizerError::UnknownField {
                    record: P::NAME,
                    field: name,
                })
        };

        for name in ignored {
            find_projection(*name)?;
        }

        let mut explicit: Vec<Binding<E, P>> = Vec::with_capacity(steps.len());
        for step in steps {
            let target = find_projection(step.target())?;
            if explicit.iter().any(|b| b.target().name() == target.name()) {
                return Err(DenormalizerError::InvalidRule(format!(
                    "{}.{} is assigned more than once",
                    P::NAME,
                    target.name()
                )));
            }

            let binding = match step {
                MappingStep::Map { source, .. } => {
                    let source = find_event(*source)?;
                    check_widens(target.name(), &source, &target)?;
                    Binding::Copy { source, target }
                }
                MappingStep::Set { value, .. } => {
                    if !value.field_type().widens_to(target.ty()) {
                        return Err(DenormalizerError::IncompatibleFieldTypes {
                            field: target.name(),
                            from: value.field_type(),
                            to: target.ty(),
                        });
                    }
                    Binding::Constant {
                        target,
                        value: value.clone().coerce(target.ty())?,
                    }
                }
                MappingStep::Add { delta, .. } => {
                    if !target.ty().is_integer() {
                        return Err(DenormalizerError::InvalidRule(format!(
                            "{}.{} is {}, counters need an integer field",
                            P::NAME,
                            target.name(),
                            target.ty()
                        )));
                    }
                    Binding::Add {
                        target,
                        delta: *delta,
                    }
                }
            };
            explicit.push(binding);
        }

        let mut bindings = Vec::with_capacity(projection_fields.len() + explicit.len());
        if auto_map {
            for target in &projection_fields {
                if ignored.contains(&target.name())
                    || explicit.iter().any(|b| b.target().name() == target.name())
                {
                    continue;
                }
                let Some(source) = event_fields.iter().find(|def| def.name() == target.name())
                else {
                    continue;
                };
                check_widens(target.name(), source, target)?;
                bindings.push(Binding::Copy {
                    source: *source,
                    target: *target,
                });
            }
        }
        bindings.extend(explicit);

        Ok(Self { bindings })
    }

    /// Applies every binding to `projection`, in plan order.
    pub fn apply(&self, event: &E, projection: &mut P) -> Result<()> {
        for binding in &self.bindings {
            binding.apply(event, projection)?;
        }
        Ok(())
    }

    /// Names of the projection fields this plan writes, in plan order.
    pub fn target_fields(&self) -> Vec<&'static str> {
        self.bindings.iter().map(|b| b.target().name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The event field copied into `target`, if `target` is a plain copy.
    pub(crate) fn copy_source(&self, target: &str) -> Option<&'static str> {
        self.bindings.iter().find_map(|binding| match binding {
            Binding::Copy { source, target: t } if t.name() == target => Some(source.name()),
            _ => None,
        })
    }
}

impl<E, P> std::fmt::Debug for MappingPlan<E, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.bindings.iter().map(|b| b.target().name()))
            .finish()
    }
}

fn check_widens<E, P>(
    field: &'static str,
    source: &FieldDef<E>,
    target: &FieldDef<P>,
) -> Result<()> {
    if source.ty().widens_to(target.ty()) {
        Ok(())
    } else {
        Err(DenormalizerError::IncompatibleFieldTypes {
            field,
            from: source.ty(),
            to: target.ty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{FieldType, impl_record};

    #[derive(Debug, Default)]
    struct PriceChanged {
        sku: String,
        price: i32,
        discount: i16,
        note: String,
    }

    impl_record!(PriceChanged {
        sku,
        price,
        discount,
        note
    });

    #[derive(Debug, Default, PartialEq)]
    struct PriceView {
        sku: String,
        price: i64,
        discount: i64,
        label: String,
        changes: u32,
    }

    impl_record!(PriceView {
        sku,
        price,
        discount,
        label,
        changes
    });

    #[derive(Debug, Default)]
    struct BadPriceView {
        price: String,
    }

    impl_record!(BadPriceView { price });

    fn event() -> PriceChanged {
        PriceChanged {
            sku: "A-1".into(),
            price: 1999,
            discount: -5,
            note: "summer".into(),
        }
    }

    #[test]
    fn auto_map_copies_same_named_fields_with_widening() {
        let plan = MappingPlan::<PriceChanged, PriceView>::compile(true, &[], &[]).unwrap();
        let mut view = PriceView::default();
        plan.apply(&event(), &mut view).unwrap();

        assert_eq!(plan.target_fields(), vec!["sku", "price", "discount"]);
        assert_eq!(view.sku, "A-1");
        assert_eq!(view.price, 1999);
        assert_eq!(view.discount, -5);
        assert_eq!(view.label, "");
    }

    #[test]
    fn explicit_steps_follow_auto_mapped_fields() {
        let steps = [
            MappingStep::Map {
                target: "label",
                source: "note",
            },
            MappingStep::Add {
                target: "changes",
                delta: 1,
            },
        ];
        let plan = MappingPlan::<PriceChanged, PriceView>::compile(true, &steps, &[]).unwrap();
        let mut view = PriceView {
            changes: 4,
            ..Default::default()
        };
        plan.apply(&event(), &mut view).unwrap();

        assert_eq!(view.label, "summer");
        assert_eq!(view.changes, 5);
    }

    #[test]
    fn explicit_step_overrides_auto_map() {
        let steps = [MappingStep::Set {
            target: "price",
            value: FieldValue::I32(0),
        }];
        let plan = MappingPlan::<PriceChanged, PriceView>::compile(true, &steps, &[]).unwrap();
        let mut view = PriceView::default();
        plan.apply(&event(), &mut view).unwrap();

        assert_eq!(view.price, 0);
        assert_eq!(plan.target_fields(), vec!["sku", "discount", "price"]);
    }

    #[test]
    fn ignored_fields_are_left_untouched() {
        let plan =
            MappingPlan::<PriceChanged, PriceView>::compile(true, &[], &["discount"]).unwrap();
        let mut view = PriceView {
            discount: 3,
            ..Default::default()
        };
        plan.apply(&event(), &mut view).unwrap();

        assert_eq!(view.discount, 3);
        assert_eq!(view.price, 1999);
    }

    #[test]
    fn auto_map_rejects_incompatible_same_named_fields() {
        let err = MappingPlan::<PriceChanged, BadPriceView>::compile(true, &[], &[]).unwrap_err();
        assert!(matches!(
            err,
            DenormalizerError::IncompatibleFieldTypes {
                field: "price",
                from: FieldType::I32,
                to: FieldType::String,
            }
        ));
    }

    #[test]
    fn unknown_fields_fail_compilation() {
        let steps = [MappingStep::Map {
            target: "label",
            source: "missing",
        }];
        let err = MappingPlan::<PriceChanged, PriceView>::compile(false, &steps, &[]).unwrap_err();
        assert!(matches!(
            err,
            DenormalizerError::UnknownField {
                record: "PriceChanged",
                field: "missing",
            }
        ));

        let err =
            MappingPlan::<PriceChanged, PriceView>::compile(false, &[], &["Label"]).unwrap_err();
        assert!(matches!(err, DenormalizerError::UnknownField { .. }));
    }

    #[test]
    fn counters_require_integer_fields() {
        let steps = [MappingStep::Add {
            target: "label",
            delta: 1,
        }];
        let err = MappingPlan::<PriceChanged, PriceView>::compile(false, &steps, &[]).unwrap_err();
        assert!(matches!(err, DenormalizerError::InvalidRule(_)));
    }

    #[test]
    fn decrement_below_unsigned_zero_fails() {
        let steps = [MappingStep::Add {
            target: "changes",
            delta: -1,
        }];
        let plan = MappingPlan::<PriceChanged, PriceView>::compile(false, &steps, &[]).unwrap();
        let mut view = PriceView::default();
        let err = plan.apply(&event(), &mut view).unwrap_err();

        assert!(matches!(
            err,
            DenormalizerError::Field(FieldError::OutOfRange { .. })
        ));
        assert_eq!(view.changes, 0);
    }

    #[test]
    fn duplicate_targets_are_rejected() {
        let steps = [
            MappingStep::Map {
                target: "label",
                source: "note",
            },
            MappingStep::Set {
                target: "label",
                value: FieldValue::from("x"),
            },
        ];
        let err = MappingPlan::<PriceChanged, PriceView>::compile(false, &steps, &[]).unwrap_err();
        assert!(matches!(err, DenormalizerError::InvalidRule(_)));
    }

    #[test]
    fn copy_source_names_only_copied_fields() {
        let steps = [
            MappingStep::Map {
                target: "label",
                source: "note",
            },
            MappingStep::Add {
                target: "changes",
                delta: 1,
            },
        ];
        let plan = MappingPlan::<PriceChanged, PriceView>::compile(true, &steps, &[]).unwrap();

        assert_eq!(plan.copy_source("label"), Some("note"));
        assert_eq!(plan.copy_source("sku"), Some("sku"));
        assert_eq!(plan.copy_source("changes"), None);
    }

    #[test]
    fn empty_plan_writes_nothing() {
        let plan = MappingPlan::<PriceChanged, PriceView>::empty();
        let mut view = PriceView::default();
        plan.apply(&event(), &mut view).unwrap();
        assert!(plan.is_empty());
        assert_eq!(view, PriceView::default());
    }
}
