use common::Record;

use crate::{Filter, FilterValue, Result, StoreError};

/// A denormalized read-model record kept in a projection store.
///
/// New projections start from [`Default`]; denormalizers fill them in from
/// event fields.
pub trait Projection: Record + Default + Clone {
    /// Storage collection name (a table, a key prefix, ...).
    const COLLECTION: &'static str;

    /// Names of the fields that identify a stored projection.
    ///
    /// Stores use them to locate the record an update overwrites. An empty
    /// list means the projection can be inserted and removed by filter, but
    /// not updated in place.
    const IDENTITY: &'static [&'static str] = &[];

    /// Builds the identity filter of this projection.
    ///
    /// Fails with [`StoreError::UnknownField`] when an identity name is not a
    /// field of the record.
    fn identity(&self) -> Result<Filter> {
        Self::IDENTITY
            .iter()
            .map(|name| {
                self.value_of(name)
                    .map(|value| FilterValue::new(*name, value))
                    .ok_or_else(|| StoreError::UnknownField {
                        collection: Self::COLLECTION,
                        field: name.to_string(),
                    })
            })
            .collect()
    }
}
