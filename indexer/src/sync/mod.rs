//! Venue synchronization.
//!
//! # Components
//!
//! - [`state`]: persisted per-(venue, feed) cursors
//! - [`syncer`]: the incremental feed walker
//! - [`prober`]: depth-bounded order liveness checks
//! - [`worker`]: the bounded periodic scheduler

pub mod prober;
pub mod state;
pub mod syncer;
pub mod worker;

pub use prober::{Liveness, OrderProber};
pub use state::{MemorySyncStateStore, PgSyncStateStore, SyncStateStore, VenueSyncState};
pub use syncer::{SyncError, SyncOutcome, SyncPhase, VenueSyncer};
pub use worker::{SyncScheduler, SyncTask};
