//! Curio indexer - venue feed synchronization and ingestion.
//!
//! Pulls order and event feeds from external marketplaces, converts
//! them into canonical versions and events, and drives them through
//! the `curio-core` reconciler. One cursor per (venue, feed) makes
//! ingestion incremental and crash-safe.
//!
//! # Components
//!
//! - [`venue`] — Feed access: trait, HTTP client, native types, adapters
//! - [`sync`] — Cursor syncer, prober, scheduler, persisted state
//! - [`config`] — Validated sync configuration
//! - [`metrics`] — Atomic sync counters

pub mod config;
pub mod metrics;
pub mod sync;
pub mod venue;

pub use config::{ConfigError, SyncConfig};
pub use metrics::{MetricsSnapshot, SyncMetrics};
pub use sync::{
    Liveness, MemorySyncStateStore, OrderProber, PgSyncStateStore, SyncError, SyncOutcome,
    SyncScheduler, SyncStateStore, SyncTask, VenueSyncState, VenueSyncer,
};
pub use venue::{Feed, OrdersRequest, Pagination, Venue, VenueApi, VenueError, VenuePage};
