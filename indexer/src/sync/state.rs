//! Persisted sync cursors.
//!
//! One record per (venue, feed), owned exclusively by its syncer and
//! written only after a fully merged run, so a crash can at worst cause
//! re-processing, never a gap.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use curio_core::StoreError;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;

use crate::venue::{Feed, Venue};

/// Sync cursor for one (venue, feed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueSyncState {
    /// Venue the cursor belongs to.
    pub venue: Venue,
    /// Feed the cursor belongs to.
    pub feed: Feed,
    /// Everything at or before this timestamp has been merged.
    pub primary_after: DateTime<Utc>,
    /// Native page cursor carried across runs while mid-walk.
    pub next_page_token: Option<String>,
    /// Newest timestamp seen during an unfinished walk.
    pub max_seen_primary: Option<DateTime<Utc>>,
    /// Timestamp of the last completed run.
    pub last_run_at: Option<DateTime<Utc>>,
}

impl VenueSyncState {
    /// Creates a fresh cursor starting at the given watermark.
    #[must_use]
    pub const fn new(venue: Venue, feed: Feed, primary_after: DateTime<Utc>) -> Self {
        Self {
            venue,
            feed,
            primary_after,
            next_page_token: None,
            max_seen_primary: None,
            last_run_at: None,
        }
    }
}

/// Persistence for sync cursors.
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    /// Loads the cursor for one (venue, feed), if any.
    async fn load(&self, venue: Venue, feed: Feed)
        -> Result<Option<VenueSyncState>, StoreError>;

    /// Persists a cursor, replacing any previous one.
    async fn save(&self, state: VenueSyncState) -> Result<(), StoreError>;
}

/// In-memory cursor store, used in tests and single-process setups.
#[derive(Debug, Default)]
pub struct MemorySyncStateStore {
    states: RwLock<HashMap<(Venue, Feed), VenueSyncState>>,
}

impl MemorySyncStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncStateStore for MemorySyncStateStore {
    async fn load(
        &self,
        venue: Venue,
        feed: Feed,
    ) -> Result<Option<VenueSyncState>, StoreError> {
        Ok(self.states.read().await.get(&(venue, feed)).cloned())
    }

    async fn save(&self, state: VenueSyncState) -> Result<(), StoreError> {
        self.states
            .write()
            .await
            .insert((state.venue, state.feed), state);
        Ok(())
    }
}

/// Postgres-backed cursor store.
#[derive(Debug, Clone)]
pub struct PgSyncStateStore {
    pool: PgPool,
}

impl PgSyncStateStore {
    /// Creates a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Provisions the cursor table.
    ///
    /// # Errors
    ///
    /// Returns a backend error when DDL fails.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS venue_sync_state (
                venue TEXT NOT NULL,
                feed TEXT NOT NULL,
                primary_after TIMESTAMPTZ NOT NULL,
                next_page_token TEXT,
                max_seen_primary TIMESTAMPTZ,
                last_run_at TIMESTAMPTZ,
                PRIMARY KEY (venue, feed)
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SyncStateStore for PgSyncStateStore {
    async fn load(
        &self,
        venue: Venue,
        feed: Feed,
    ) -> Result<Option<VenueSyncState>, StoreError> {
        let row = sqlx::query(
            "SELECT primary_after, next_page_token, max_seen_primary, last_run_at \
             FROM venue_sync_state WHERE venue = $1 AND feed = $2",
        )
        .bind(venue.as_str())
        .bind(feed.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(VenueSyncState {
                venue,
                feed,
                primary_after: row.try_get::<DateTime<Utc>, _>("primary_after")?,
                next_page_token: row.try_get("next_page_token")?,
                max_seen_primary: row.try_get::<Option<DateTime<Utc>>, _>("max_seen_primary")?,
                last_run_at: row.try_get::<Option<DateTime<Utc>>, _>("last_run_at")?,
            })
        })
        .transpose()
    }

    async fn save(&self, state: VenueSyncState) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO venue_sync_state \
             (venue, feed, primary_after, next_page_token, max_seen_primary, last_run_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (venue, feed) DO UPDATE SET \
             primary_after = EXCLUDED.primary_after, \
             next_page_token = EXCLUDED.next_page_token, \
             max_seen_primary = EXCLUDED.max_seen_primary, \
             last_run_at = EXCLUDED.last_run_at",
        )
        .bind(state.venue.as_str())
        .bind(state.feed.as_str())
        .bind(state.primary_after)
        .bind(state.next_page_token)
        .bind(state.max_seen_primary)
        .bind(state.last_run_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
