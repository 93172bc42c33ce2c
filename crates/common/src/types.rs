use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The declared type of a record field.
///
/// Field types drive mapping-plan validation: a value may only flow into a
/// field of the same type, or into a wider integer field that can hold every
/// value of the source type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Uuid,
    Timestamp,
}

impl FieldType {
    /// Returns `(signed, bits)` for integer types.
    fn integer_layout(self) -> Option<(bool, u32)> {
        match self {
            FieldType::I8 => Some((true, 8)),
            FieldType::I16 => Some((true, 16)),
            FieldType::I32 => Some((true, 32)),
            FieldType::I64 => Some((true, 64)),
            FieldType::U8 => Some((false, 8)),
            FieldType::U16 => Some((false, 16)),
            FieldType::U32 => Some((false, 32)),
            FieldType::U64 => Some((false, 64)),
            _ => None,
        }
    }

    /// Returns true for signed and unsigned integer types.
    pub fn is_integer(self) -> bool {
        self.integer_layout().is_some()
    }

    /// Returns true if every value of `self` can be stored in `target`
    /// without loss.
    ///
    /// Identical types always widen. Integers widen to strictly larger
    /// integers of the same signedness, and unsigned integers widen to
    /// strictly larger signed integers. No other conversion is allowed.
    pub fn widens_to(self, target: FieldType) -> bool {
        if self == target {
            return true;
        }
        match (self.integer_layout(), target.integer_layout()) {
            (Some((false, from_bits)), Some((_, to_bits))) => to_bits > from_bits,
            (Some((true, from_bits)), Some((true, to_bits))) => to_bits > from_bits,
            _ => false,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::Bool => "bool",
            FieldType::I8 => "i8",
            FieldType::I16 => "i16",
            FieldType::I32 => "i32",
            FieldType::I64 => "i64",
            FieldType::U8 => "u8",
            FieldType::U16 => "u16",
            FieldType::U32 => "u32",
            FieldType::U64 => "u64",
            FieldType::F32 => "f32",
            FieldType::F64 => "f64",
            FieldType::String => "string",
            FieldType::Uuid => "uuid",
            FieldType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// Errors raised when a field value cannot be stored in a field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The value's type does not widen to the field's type.
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: FieldType,
        actual: FieldType,
    },

    /// The value could not be represented in the target integer type.
    #[error("Value {value} out of range for {target}")]
    OutOfRange { value: i128, target: FieldType },
}

/// A single scalar field value read from, or written to, a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Returns the type of this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::I8(_) => FieldType::I8,
            FieldValue::I16(_) => FieldType::I16,
            FieldValue::I32(_) => FieldType::I32,
            FieldValue::I64(_) => FieldType::I64,
            FieldValue::U8(_) => FieldType::U8,
            FieldValue::U16(_) => FieldType::U16,
            FieldValue::U32(_) => FieldType::U32,
            FieldValue::U64(_) => FieldType::U64,
            FieldValue::F32(_) => FieldType::F32,
            FieldValue::F64(_) => FieldType::F64,
            FieldValue::String(_) => FieldType::String,
            FieldValue::Uuid(_) => FieldType::Uuid,
            FieldValue::Timestamp(_) => FieldType::Timestamp,
        }
    }

    /// Returns the value as an `i128` if it is an integer.
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            FieldValue::I8(v) => Some(v.into()),
            FieldValue::I16(v) => Some(v.into()),
            FieldValue::I32(v) => Some(v.into()),
            FieldValue::I64(v) => Some(v.into()),
            FieldValue::U8(v) => Some(v.into()),
            FieldValue::U16(v) => Some(v.into()),
            FieldValue::U32(v) => Some(v.into()),
            FieldValue::U64(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Builds an integer value of the given type.
    pub fn from_integer(value: i128, target: FieldType) -> Result<Self, FieldError> {
        let out_of_range = || FieldError::OutOfRange { value, target };
        let converted = match target {
            FieldType::I8 => i8::try_from(value).map(FieldValue::I8).ok(),
            FieldType::I16 => i16::try_from(value).map(FieldValue::I16).ok(),
            FieldType::I32 => i32::try_from(value).map(FieldValue::I32).ok(),
            FieldType::I64 => i64::try_from(value).map(FieldValue::I64).ok(),
            FieldType::U8 => u8::try_from(value).map(FieldValue::U8).ok(),
            FieldType::U16 => u16::try_from(value).map(FieldValue::U16).ok(),
            FieldType::U32 => u32::try_from(value).map(FieldValue::U32).ok(),
            FieldType::U64 => u64::try_from(value).map(FieldValue::U64).ok(),
            other => {
                return Err(FieldError::TypeMismatch {
                    expected: other,
                    actual: FieldType::I64,
                });
            }
        };
        converted.ok_or_else(out_of_range)
    }

    /// Converts this value to `target`, applying lossless integer widening.
    pub fn coerce(self, target: FieldType) -> Result<Self, FieldError> {
        let actual = self.field_type();
        if actual == target {
            return Ok(self);
        }
        if !actual.widens_to(target) {
            return Err(FieldError::TypeMismatch {
                expected: target,
                actual,
            });
        }
        match self.as_integer() {
            Some(value) => Self::from_integer(value, target),
            None => Err(FieldError::TypeMismatch {
                expected: target,
                actual,
            }),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::I8(v) => write!(f, "{v}"),
            FieldValue::I16(v) => write!(f, "{v}"),
            FieldValue::I32(v) => write!(f, "{v}"),
            FieldValue::I64(v) => write!(f, "{v}"),
            FieldValue::U8(v) => write!(f, "{v}"),
            FieldValue::U16(v) => write!(f, "{v}"),
            FieldValue::U32(v) => write!(f, "{v}"),
            FieldValue::U64(v) => write!(f, "{v}"),
            FieldValue::F32(v) => write!(f, "{v}"),
            FieldValue::F64(v) => write!(f, "{v}"),
            FieldValue::String(v) => write!(f, "{v:?}"),
            FieldValue::Uuid(v) => write!(f, "{v}"),
            FieldValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}
