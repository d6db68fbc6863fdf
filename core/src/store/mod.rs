//! Store capabilities consumed by the core.
//!
//! The core never implements storage; it shapes queries and interprets
//! idempotency outcomes. Two bindings are provided per capability: an
//! in-memory store (reference semantics, also the test double) and a
//! Postgres store over sqlx.
//!
//! # Components
//!
//! - [`query`]: the declarative query shapes (predicate, hint, sort)
//! - [`memory`]: in-memory bindings
//! - [`postgres`]: sqlx/Postgres bindings

pub mod memory;
pub mod postgres;
pub mod query;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{ActivityRecord, Address, CanonicalOrder, OrderHash};
use query::HistoryQuery;

/// Outcome of an idempotent insert.
///
/// A duplicate key is a value, not an exception: re-ingesting a record
/// that already exists is the expected no-op path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// The record was newly inserted.
    Inserted,
    /// A record with the same id already existed; nothing was written.
    Duplicate,
}

impl SaveResult {
    /// Returns true if the record was newly inserted.
    #[must_use]
    pub const fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Append-only, range-queryable, index-hintable activity history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Runs a shaped query, returning records ordered by (date, id) in
    /// the query's direction, at most `limit` rows.
    async fn find(&self, query: &HistoryQuery) -> Result<Vec<ActivityRecord>, StoreError>;

    /// Inserts a record; duplicate ids are swallowed as
    /// [`SaveResult::Duplicate`].
    async fn save(&self, record: ActivityRecord) -> Result<SaveResult, StoreError>;

    /// Applies the single legal mutation, Confirmed → Reverted.
    /// Returns the updated record, or None when the id is unknown.
    ///
    /// When the reverted record backs an order event, the caller
    /// follows up with [`crate::reconcile::Reconciler::rebuild`] over
    /// the order's surviving events.
    async fn mark_reverted(&self, id: &str) -> Result<Option<ActivityRecord>, StoreError>;

    /// Provisions the indexes behind every [`query::IndexHint`].
    async fn ensure_indexes(&self) -> Result<(), StoreError>;
}

/// Canonical order aggregate store with optimistic concurrency.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Looks an aggregate up by canonical hash.
    async fn find_by_hash(&self, hash: &OrderHash) -> Result<Option<CanonicalOrder>, StoreError>;

    /// Saves an aggregate, expecting `order.version` to match the
    /// stored version (0 for inserts). Returns the stored aggregate
    /// with its version bumped.
    ///
    /// # Errors
    ///
    /// [`StoreError::VersionConflict`] when a concurrent writer won.
    async fn save(&self, order: CanonicalOrder) -> Result<CanonicalOrder, StoreError>;

    /// Returns every order of the maker with nonce strictly below the
    /// given minimum. Feeds the nonce-cascade cancellation.
    async fn find_by_maker_and_nonce_below(
        &self,
        maker: Address,
        min_nonce: u64,
    ) -> Result<Vec<CanonicalOrder>, StoreError>;
}
