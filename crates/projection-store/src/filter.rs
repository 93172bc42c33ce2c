use common::{FieldDef, FieldValue, Record};
use serde::{Deserialize, Serialize};

use crate::{Result, StoreError};

/// A single `field == value` predicate used to address projections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterValue {
    /// Name of the projection field.
    pub field: String,

    /// Value the field must equal.
    pub value: FieldValue,
}

impl FilterValue {
    pub fn new(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for FilterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.field, self.value)
    }
}

/// An ordered sequence of filter values; a projection matches when every
/// value matches.
///
/// An empty filter matches every projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    values: Vec<FilterValue>,
}

impl Filter {
    /// Creates a new empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter with a single predicate.
    pub fn by(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new().and(field, value)
    }

    /// Appends a predicate.
    pub fn and(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.values.push(FilterValue::new(field, value));
        self
    }

    /// Appends an already-built filter value.
    pub fn push(&mut self, value: FilterValue) {
        self.values.push(value);
    }

    pub fn values(&self) -> &[FilterValue] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Checks `record` against every predicate.
    ///
    /// Filter values are widened to the field's type before comparison, so a
    /// 16-bit key matches a 64-bit projection field holding the same number.
    pub fn matches<P: Record>(&self, record: &P, fields: &[FieldDef<P>]) -> Result<bool> {
        for predicate in &self.values {
            let def = fields
                .iter()
                .find(|def| def.name() == predicate.field)
                .ok_or_else(|| StoreError::UnknownField {
                    collection: P::NAME,
                    field: predicate.field.clone(),
                })?;

            let expected = match predicate.value.clone().coerce(def.ty()) {
                Ok(value) => value,
                Err(_) => return Ok(false),
            };
            if def.read(record) != expected {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl FromIterator<FilterValue> for Filter {
    fn from_iter<I: IntoIterator<Item = FilterValue>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Filter {
    type Item = &'a FilterValue;
    type IntoIter = std::slice::Iter<'a, FilterValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.values.is_empty() {
            return f.write_str("*");
        }
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(" and ")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}
