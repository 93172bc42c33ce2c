use async_trait::async_trait;

use crate::{Filter, Projection, Result};

/// Core trait for projection store implementations.
///
/// A projection store persists denormalized read models and addresses them
/// with ordered [`Filter`]s. Uniqueness is the store's own concern: callers
/// never rely on a store to deduplicate inserts.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait ProjectionStore: Send + Sync {
    /// Returns every projection matching `filter`, in no particular order.
    ///
    /// Zero matches is not an error.
    async fn read<P: Projection>(&self, filter: &Filter) -> Result<Vec<P>>;

    /// Persists a new projection.
    async fn insert<P: Projection>(&self, projection: P) -> Result<()>;

    /// Overwrites the stored projection with the same identity.
    ///
    /// What happens when no such projection exists is store-specific.
    async fn update<P: Projection>(&self, projection: P) -> Result<()>;

    /// Deletes every projection matching `filter`.
    ///
    /// Zero matches is not an error.
    async fn remove<P: Projection>(&self, filter: &Filter) -> Result<()>;
}

/// Extension trait providing convenience methods for projection stores.
#[async_trait]
pub trait ProjectionStoreExt: ProjectionStore {
    /// Returns the single projection matching `filter`, or `None` when
    /// nothing or more than one projection matches.
    async fn read_single<P: Projection>(&self, filter: &Filter) -> Result<Option<P>> {
        let mut matches = self.read::<P>(filter).await?;
        if matches.len() == 1 {
            Ok(matches.pop())
        } else {
            Ok(None)
        }
    }

    /// Checks if any projection matches `filter`.
    async fn exists<P: Projection>(&self, filter: &Filter) -> Result<bool> {
        Ok(!self.read::<P>(filter).await?.is_empty())
    }
}

// Blanket implementation for all ProjectionStore implementations
impl<T: ProjectionStore + ?Sized> ProjectionStoreExt for T {}
