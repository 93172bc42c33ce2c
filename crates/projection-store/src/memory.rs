use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{FieldValue, Record};
use tokio::sync::RwLock;

use crate::{Filter, Projection, ProjectionStore, Result, StoreError};

/// A call received by an [`InMemoryProjectionStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOperation {
    Read {
        collection: &'static str,
        filter: Filter,
        matched: usize,
    },
    Insert {
        collection: &'static str,
        fields: Vec<(&'static str, FieldValue)>,
    },
    Update {
        collection: &'static str,
        fields: Vec<(&'static str, FieldValue)>,
        updated: bool,
    },
    Remove {
        collection: &'static str,
        filter: Filter,
        removed: usize,
    },
}

impl StoreOperation {
    /// Returns the operation name ("read", "insert", "update", "remove").
    pub fn kind(&self) -> &'static str {
        match self {
            StoreOperation::Read { .. } => "read",
            StoreOperation::Insert { .. } => "insert",
            StoreOperation::Update { .. } => "update",
            StoreOperation::Remove { .. } => "remove",
        }
    }
}

type Collection = Vec<Box<dyn Any + Send + Sync>>;

#[derive(Default)]
struct MemoryState {
    collections: HashMap<TypeId, Collection>,
    journal: Vec<StoreOperation>,
}

/// In-memory projection store implementation for testing.
///
/// Projections are kept as typed values, one collection per projection
/// type. Every call is appended to a journal so callers can assert the
/// exact sequence of operations a denormalizer issued.
#[derive(Clone, Default)]
pub struct InMemoryProjectionStore {
    state: Arc<RwLock<MemoryState>>,
}

fn snapshot<P: Record>(projection: &P) -> Vec<(&'static str, FieldValue)> {
    P::fields()
        .iter()
        .map(|def| (def.name(), def.read(projection)))
        .collect()
}

impl InMemoryProjectionStore {
    /// Creates a new empty in-memory projection store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored projection of type `P`, in insertion order.
    pub async fn all<P: Projection>(&self) -> Vec<P> {
        let state = self.state.read().await;
        state
            .collections
            .get(&TypeId::of::<P>())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.downcast_ref::<P>())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the number of stored projections of type `P`.
    pub async fn count<P: Projection>(&self) -> usize {
        let state = self.state.read().await;
        state
            .collections
            .get(&TypeId::of::<P>())
            .map_or(0, Vec::len)
    }

    /// Returns every operation received so far, oldest first.
    pub async fn operations(&self) -> Vec<StoreOperation> {
        self.state.read().await.journal.clone()
    }

    /// Clears the operation journal, keeping stored projections.
    pub async fn clear_operations(&self) {
        self.state.write().await.journal.clear();
    }

    /// Clears all projections and the journal.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.collections.clear();
        state.journal.clear();
    }
}

#[async_trait]
impl ProjectionStore for InMemoryProjectionStore {
    async fn read<P: Projection>(&self, filter: &Filter) -> Result<Vec<P>> {
        let fields = P::fields();
        let mut state = self.state.write().await;

        let mut matches = Vec::new();
        if let Some(items) = state.collections.get(&TypeId::of::<P>()) {
            for item in items.iter().filter_map(|item| item.downcast_ref::<P>()) {
                if filter.matches(item, &fields)? {
                    matches.push(item.clone());
                }
            }
        }

        state.journal.push(StoreOperation::Read {
            collection: P::COLLECTION,
            filter: filter.clone(),
            matched: matches.len(),
        });
        tracing::trace!(collection = P::COLLECTION, %filter, matched = matches.len(), "read");

        Ok(matches)
    }

    async fn insert<P: Projection>(&self, projection: P) -> Result<()> {
        let mut state = self.state.write().await;

        state.journal.push(StoreOperation::Insert {
            collection: P::COLLECTION,
            fields: snapshot(&projection),
        });
        state
            .collections
            .entry(TypeId::of::<P>())
            .or_default()
            .push(Box::new(projection));

        Ok(())
    }

    async fn update<P: Projection>(&self, projection: P) -> Result<()> {
        if P::IDENTITY.is_empty() {
            return Err(StoreError::MissingIdentity {
                collection: P::COLLECTION,
            });
        }

        let fields = P::fields();
        let identity = projection.identity()?;
        let recorded = snapshot(&projection);
        let mut state = self.state.write().await;

        let items = state.collections.entry(TypeId::of::<P>()).or_default();
        let mut target = None;
        for (index, item) in items.iter().enumerate() {
            let Some(stored) = item.downcast_ref::<P>() else {
                continue;
            };
            if identity.matches(stored, &fields)? {
                target = Some(index);
                break;
            }
        }
        if let Some(index) = target {
            items[index] = Box::new(projection);
        }

        state.journal.push(StoreOperation::Update {
            collection: P::COLLECTION,
            fields: recorded,
            updated: target.is_some(),
        });

        match target {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                collection: P::COLLECTION,
                identity: identity.to_string(),
            }),
        }
    }

    async fn remove<P: Projection>(&self, filter: &Filter) -> Result<()> {
        let fields = P::fields();
        let mut state = self.state.write().await;

        let mut removed = 0;
        if let Some(items) = state.collections.get_mut(&TypeId::of::<P>()) {
            // Match first: a filter error must leave the collection intact.
            let mut matched = Vec::with_capacity(items.len());
            for item in items.iter() {
                matched.push(match item.downcast_ref::<P>() {
                    Some(projection) => filter.matches(projection, &fields)?,
                    None => false,
                });
            }
            removed = matched.iter().filter(|m| **m).count();
            let mut flags = matched.into_iter();
            items.retain(|_| !flags.next().unwrap_or(false));
        }

        state.journal.push(StoreOperation::Remove {
            collection: P::COLLECTION,
            filter: filter.clone(),
            removed,
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProjectionStoreExt;
    use common::impl_record;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct BalanceView {
        account: i64,
        balance: i64,
    }

    impl_record!(BalanceView { account, balance });

    impl Projection for BalanceView {
        const COLLECTION: &'static str = "balances";
        const IDENTITY: &'static [&'static str] = &["account"];
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct AuditLine {
        account: i64,
    }

    impl_record!(AuditLine { account });

    impl Projection for AuditLine {
        const COLLECTION: &'static str = "audit_lines";
    }

    fn balance(account: i64, balance: i64) -> BalanceView {
        BalanceView { account, balance }
    }

    #[tokio::test]
    async fn insert_and_read() {
        let store = InMemoryProjectionStore::new();
        store.insert(balance(1, 10)).await.unwrap();
        store.insert(balance(2, 20)).await.unwrap();

        let found: Vec<BalanceView> = store.read(&Filter::by("account", 2i64)).await.unwrap();
        assert_eq!(found, vec![balance(2, 20)]);
        assert_eq!(store.count::<BalanceView>().await, 2);
    }

    #[tokio::test]
    async fn insert_does_not_deduplicate() {
        let store = InMemoryProjectionStore::new();
        store.insert(balance(1, 10)).await.unwrap();
        store.insert(balance(1, 10)).await.unwrap();

        assert_eq!(store.count::<BalanceView>().await, 2);
    }

    #[tokio::test]
    async fn read_with_no_matches_is_empty() {
        let store = InMemoryProjectionStore::new();
        let found: Vec<BalanceView> = store.read(&Filter::by("account", 9i64)).await.unwrap();
        assert!(found.is_empty());
        assert!(!store.exists::<BalanceView>(&Filter::new()).await.unwrap());
    }

    #[tokio::test]
    async fn update_overwrites_by_identity() {
        let store = InMemoryProjectionStore::new();
        store.insert(balance(1, 10)).await.unwrap();
        store.insert(balance(2, 20)).await.unwrap();

        store.update(balance(2, 25)).await.unwrap();

        assert_eq!(store.all::<BalanceView>().await, vec![balance(1, 10), balance(2, 25)]);
    }

    #[tokio::test]
    async fn update_of_missing_projection_fails() {
        let store = InMemoryProjectionStore::new();
        let err = store.update(balance(3, 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(
            store.operations().await,
            vec![StoreOperation::Update {
                collection: "balances",
                fields: vec![("account", FieldValue::I64(3)), ("balance", FieldValue::I64(0))],
                updated: false,
            }]
        );
    }

    #[tokio::test]
    async fn update_without_identity_fails() {
        let store = InMemoryProjectionStore::new();
        store.insert(AuditLine { account: 1 }).await.unwrap();

        let err = store.update(AuditLine { account: 1 }).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingIdentity { .. }));
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct MisspelledView {
        id: i64,
        name: String,
    }

    impl_record!(MisspelledView { id, name });

    impl Projection for MisspelledView {
        const COLLECTION: &'static str = "misspelled";
        const IDENTITY: &'static [&'static str] = &["Id"];
    }

    #[tokio::test]
    async fn update_with_unknown_identity_field_fails() {
        let store = InMemoryProjectionStore::new();
        let stored = vec![
            MisspelledView {
                id: 1,
                name: "a".into(),
            },
            MisspelledView {
                id: 2,
                name: "b".into(),
            },
        ];
        for view in &stored {
            store.insert(view.clone()).await.unwrap();
        }

        let err = store
            .update(MisspelledView {
                id: 2,
                name: "B".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::UnknownField { ref field, .. } if field == "Id"));
        assert_eq!(store.all::<MisspelledView>().await, stored);
    }

    #[tokio::test]
    async fn remove_deletes_all_matches() {
        let store = InMemoryProjectionStore::new();
        store.insert(balance(1, 10)).await.unwrap();
        store.insert(balance(1, 11)).await.unwrap();
        store.insert(balance(2, 20)).await.unwrap();

        store
            .remove::<BalanceView>(&Filter::by("account", 1i64))
            .await
            .unwrap();

        assert_eq!(store.all::<BalanceView>().await, vec![balance(2, 20)]);
        let ops = store.operations().await;
        assert_eq!(
            ops.last(),
            Some(&StoreOperation::Remove {
                collection: "balances",
                filter: Filter::by("account", 1i64),
                removed: 2,
            })
        );
    }

    #[tokio::test]
    async fn remove_with_no_matches_succeeds() {
        let store = InMemoryProjectionStore::new();
        store
            .remove::<BalanceView>(&Filter::by("account", 1i64))
            .await
            .unwrap();
        assert_eq!(store.operations().await.len(), 1);
    }

    #[tokio::test]
    async fn collections_are_separated_by_type() {
        let store = InMemoryProjectionStore::new();
        store.insert(balance(1, 10)).await.unwrap();
        store.insert(AuditLine { account: 1 }).await.unwrap();

        assert_eq!(store.count::<BalanceView>().await, 1);
        assert_eq!(store.count::<AuditLine>().await, 1);
    }

    #[tokio::test]
    async fn journal_records_calls_in_order() {
        let store = InMemoryProjectionStore::new();
        store.insert(balance(1, 10)).await.unwrap();
        let _: Vec<BalanceView> = store.read(&Filter::by("account", 1i64)).await.unwrap();
        store.update(balance(1, 12)).await.unwrap();

        let kinds: Vec<_> = store.operations().await.iter().map(|op| op.kind()).collect();
        assert_eq!(kinds, vec!["insert", "read", "update"]);

        store.clear_operations().await;
        assert!(store.operations().await.is_empty());
        assert_eq!(store.count::<BalanceView>().await, 1);

        store.clear().await;
        assert_eq!(store.count::<BalanceView>().await, 0);
    }
}
