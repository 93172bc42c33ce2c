//! Static field access for events and projections.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{FieldError, FieldType, FieldValue};

/// A Rust type that can be stored in a record field.
pub trait Field: Sized {
    /// The declared type of fields holding this Rust type.
    const TYPE: FieldType;

    /// Reads the field into a [`FieldValue`].
    fn to_value(&self) -> FieldValue;

    /// Converts a value into this type, widening integers where allowed.
    fn from_value(value: FieldValue) -> Result<Self, FieldError>;
}

macro_rules! impl_copy_field {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Field for $ty {
                const TYPE: FieldType = FieldType::$variant;

                fn to_value(&self) -> FieldValue {
                    FieldValue::$variant(*self)
                }

                fn from_value(value: FieldValue) -> Result<Self, FieldError> {
                    match value.coerce(Self::TYPE)? {
                        FieldValue::$variant(v) => Ok(v),
                        other => Err(FieldError::TypeMismatch {
                            expected: Self::TYPE,
                            actual: other.field_type(),
                        }),
                    }
                }
            }
        )*
    };
}

impl_copy_field! {
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
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
}

impl Field for String {
    const TYPE: FieldType = FieldType::String;

    fn to_value(&self) -> FieldValue {
        FieldValue::String(self.clone())
    }

    fn from_value(value: FieldValue) -> Result<Self, FieldError> {
        match value {
            FieldValue::String(v) => Ok(v),
            other => Err(FieldError::TypeMismatch {
                expected: FieldType::String,
                actual: other.field_type(),
            }),
        }
    }
}

/// Reader and writer for one named field of a record type `R`.
///
/// Both accessors are plain function pointers, so a list of field
/// definitions can be resolved once and reused for every record.
pub struct FieldDef<R> {
    name: &'static str,
    ty: FieldType,
    read: fn(&R) -> FieldValue,
    write: fn(&mut R, FieldValue) -> Result<(), FieldError>,
}

impl<R> FieldDef<R> {
    pub fn new(
        name: &'static str,
        ty: FieldType,
        read: fn(&R) -> FieldValue,
        write: fn(&mut R, FieldValue) -> Result<(), FieldError>,
    ) -> Self {
        Self {
            name,
            ty,
            read,
            write,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ty(&self) -> FieldType {
        self.ty
    }

    /// Reads this field from `record`.
    pub fn read(&self, record: &R) -> FieldValue {
        (self.read)(record)
    }

    /// Writes `value` into this field of `record`.
    pub fn write(&self, record: &mut R, value: FieldValue) -> Result<(), FieldError> {
        (self.write)(record, value)
    }
}

impl<R> Clone for FieldDef<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for FieldDef<R> {}

impl<R> std::fmt::Debug for FieldDef<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish()
    }
}

/// A type whose named fields can be read and written without reflection.
///
/// Usually implemented with [`impl_record!`](crate::impl_record).
pub trait Record: Send + Sync + 'static {
    /// Type name used in errors and logs.
    const NAME: &'static str;

    /// All fields of this record, in declaration order.
    fn fields() -> Vec<FieldDef<Self>>
    where
        Self: Sized;

    /// Looks up a field by exact, case-sensitive name.
    fn field(name: &str) -> Option<FieldDef<Self>>
    where
        Self: Sized,
    {
        Self::fields().into_iter().find(|def| def.name() == name)
    }

    /// Reads a field by name.
    fn value_of(&self, name: &str) -> Option<FieldValue>
    where
        Self: Sized,
    {
        Self::field(name).map(|def| def.read(self))
    }
}

/// Returns the [`FieldType`] of the field selected by `accessor`.
///
/// Used by [`impl_record!`](crate::impl_record) to infer field types from
/// the struct definition.
pub fn field_type_of<R, T: Field>(_accessor: fn(&R) -> &T) -> FieldType {
    T::TYPE
}

/// Implements [`Record`] for a struct with named fields.
///
/// ```ignore
/// struct OrderPlaced { order_id: Uuid, quantity: i16 }
/// impl_record!(OrderPlaced { order_id, quantity });
/// ```
#[macro_export]
macro_rules! impl_record {
    ($ty:ident { $($field:ident),+ $(,)? }) => {
        impl $crate::Record for $ty {
            const NAME: &'static str = stringify!($ty);

            fn fields() -> Vec<$crate::FieldDef<Self>> {
                vec![$(
                    $crate::FieldDef::new(
                        stringify!($field),
                        $crate::field_type_of(|record: &$ty| &record.$field),
                        |record: &$ty| $crate::Field::to_value(&record.$field),
                        |record: &mut $ty, value| {
                            record.$field = $crate::Field::from_value(value)?;
                            Ok(())
                        },
                    )
                ),+]
            }
        }
    };
}
