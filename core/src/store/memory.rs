//! In-memory store bindings.
//!
//! Reference implementations of the store capabilities. They define the
//! semantics the Postgres bindings must agree with, and double as test
//! fixtures throughout the workspace.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::query::HistoryQuery;
use super::{HistoryStore, OrderStore, SaveResult};
use crate::continuation::SortDirection;
use crate::error::StoreError;
use crate::model::{ActivityRecord, Address, CanonicalOrder, LogStatus, OrderHash};

/// In-memory history store.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    records: RwLock<Vec<ActivityRecord>>,
}

impl MemoryHistoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn find(&self, query: &HistoryQuery) -> Result<Vec<ActivityRecord>, StoreError> {
        let records = self.records.read().await;
        let mut matched: Vec<ActivityRecord> = records
            .iter()
            .filter(|r| query.predicate.matches(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| match query.direction {
            SortDirection::EarliestFirst => (a.date, &a.id).cmp(&(b.date, &b.id)),
            SortDirection::LatestFirst => (b.date, &b.id).cmp(&(a.date, &a.id)),
        });
        matched.truncate(query.limit);
        Ok(matched)
    }

    async fn save(&self, record: ActivityRecord) -> Result<SaveResult, StoreError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == record.id) {
            return Ok(SaveResult::Duplicate);
        }
        records.push(record);
        Ok(SaveResult::Inserted)
    }

    async fn mark_reverted(&self, id: &str) -> Result<Option<ActivityRecord>, StoreError> {
        let mut records = self.records.write().await;
        for record in records.iter_mut() {
            if record.id == id {
                if record.status == LogStatus::Confirmed {
                    record.status = LogStatus::Reverted;
                }
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-memory canonical order store with optimistic concurrency.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<OrderHash, CanonicalOrder>>,
}

impl MemoryOrderStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored aggregates.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns true if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find_by_hash(&self, hash: &OrderHash) -> Result<Option<CanonicalOrder>, StoreError> {
        Ok(self.orders.read().await.get(hash).cloned())
    }

    async fn save(&self, order: CanonicalOrder) -> Result<CanonicalOrder, StoreError> {
        let mut orders = self.orders.write().await;
        if let Some(existing) = orders.get(&order.hash) {
            if existing.version != order.version {
                return Err(StoreError::VersionConflict(order.hash.to_string()));
            }
        } else if order.version != 0 {
            return Err(StoreError::VersionConflict(order.hash.to_string()));
        }
        let mut stored = order;
        stored.version += 1;
        orders.insert(stored.hash, stored.clone());
        Ok(stored)
    }

    async fn find_by_maker_and_nonce_below(
        &self,
        maker: Address,
        min_nonce: u64,
    ) -> Result<Vec<CanonicalOrder>, StoreError> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .filter(|o| o.maker == maker && o.nonce < min_nonce)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::model::{
        ActivityKind, Asset, AssetType, BlockOrdering, OrderStatus, OrderVersion, Platform,
        TokenId,
    };
    use crate::store::query::{Field, IndexHint, Predicate, Value};

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    fn record(id: &str, millis: i64) -> ActivityRecord {
        ActivityRecord {
            id: id.to_string(),
            kind: ActivityKind::Transfer,
            token: addr(9),
            token_id: TokenId(1),
            from: addr(1),
            owner: addr(2),
            value: 1,
            date: Utc.timestamp_millis_opt(millis).single().expect("ts"),
            status: LogStatus::Confirmed,
            tx_hash: format!("0x{id}"),
            block: BlockOrdering {
                block_number: 1,
                log_index: 0,
                minor_log_index: 0,
            },
            order_hash: None,
        }
    }

    fn confirmed_query(direction: SortDirection, limit: usize) -> HistoryQuery {
        HistoryQuery {
            predicate: Predicate::Eq(Field::Status, Value::Status(LogStatus::Confirmed)),
            direction,
            hint: IndexHint::KindDate,
            limit,
        }
    }

    fn order(maker: u8, nonce: u64) -> CanonicalOrder {
        let maker = addr(maker);
        let make_type = AssetType::Erc721 {
            token: addr(9),
            token_id: TokenId(u128::from(nonce) + 1),
        };
        let version = OrderVersion {
            hash: OrderVersion::derive_hash(
                maker,
                &make_type,
                &AssetType::Eth,
                nonce,
                Platform::Looksrare,
            ),
            maker,
            make: Asset {
                asset_type: make_type,
                value: 1,
            },
            take: Asset {
                asset_type: AssetType::Eth,
                value: 100,
            },
            salt: nonce,
            nonce,
            start: None,
            end: None,
            platform: Platform::Looksrare,
            signature: None,
            created_at: Utc::now(),
        };
        CanonicalOrder::from_version(version, Utc::now())
    }

    #[tokio::test]
    async fn test_history_save_duplicate_is_noop() {
        let store = MemoryHistoryStore::new();
        assert_eq!(
            store.save(record("a", 1)).await.expect("save"),
            SaveResult::Inserted
        );
        assert_eq!(
            store.save(record("a", 1)).await.expect("save"),
            SaveResult::Duplicate
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_history_find_ordering_and_limit() {
        let store = MemoryHistoryStore::new();
        for (id, ts) in [("a", 100), ("b", 300), ("c", 200)] {
            store.save(record(id, ts)).await.expect("save");
        }
        let latest = store
            .find(&confirmed_query(SortDirection::LatestFirst, 2))
            .await
            .expect("find");
        let ids: Vec<_> = latest.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        let earliest = store
            .find(&confirmed_query(SortDirection::EarliestFirst, 10))
            .await
            .expect("find");
        let ids: Vec<_> = earliest.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[tokio::test]
    async fn test_history_tie_break_on_id() {
        let store = MemoryHistoryStore::new();
        for id in ["b", "a", "c"] {
            store.save(record(id, 100)).await.expect("save");
        }
        let latest = store
            .find(&confirmed_query(SortDirection::LatestFirst, 10))
            .await
            .expect("find");
        let ids: Vec<_> = latest.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_history_mark_reverted() {
        let store = MemoryHistoryStore::new();
        store.save(record("a", 1)).await.expect("save");
        let updated = store.mark_reverted("a").await.expect("mark");
        assert_eq!(updated.map(|r| r.status), Some(LogStatus::Reverted));
        assert!(store.mark_reverted("missing").await.expect("mark").is_none());
    }

    #[tokio::test]
    async fn test_order_save_and_find() {
        let store = MemoryOrderStore::new();
        let o = order(1, 0);
        let stored = store.save(o.clone()).await.expect("save");
        assert_eq!(stored.version, 1);
        let found = store.find_by_hash(&o.hash).await.expect("find");
        assert_eq!(found.map(|f| f.version), Some(1));
    }

    #[tokio::test]
    async fn test_order_save_version_conflict() {
        let store = MemoryOrderStore::new();
        let o = order(1, 0);
        let stored = store.save(o.clone()).await.expect("save");

        // A stale writer with the original version loses.
        let result = store.save(o).await;
        assert!(matches!(result, Err(StoreError::VersionConflict(_))));

        // The fresh copy wins.
        let mut fresh = stored;
        fresh.status = OrderStatus::Cancelled;
        assert!(store.save(fresh).await.is_ok());
    }

    #[tokio::test]
    async fn test_order_insert_requires_version_zero() {
        let store = MemoryOrderStore::new();
        let mut o = order(1, 0);
        o.version = 3;
        assert!(matches!(
            store.save(o).await,
            Err(StoreError::VersionConflict(_))
        ));
    }

    #[tokio::test]
    async fn test_find_by_maker_and_nonce_below() {
        let store = MemoryOrderStore::new();
        for nonce in 0..4 {
            store.save(order(1, nonce)).await.expect("save");
        }
        store.save(order(2, 0)).await.expect("save");

        let hits = store
            .find_by_maker_and_nonce_below(addr(1), 2)
            .await
            .expect("find");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|o| o.maker == addr(1) && o.nonce < 2));
    }
}
