//! Sync scheduling.
//!
//! Drives one periodic sync task per (venue, feed) on a
//! semaphore-bounded pool, so a stalled venue cannot starve its
//! siblings. Task errors are isolated; shutdown is cooperative and
//! observed between runs and between pages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::syncer::VenueSyncer;
use crate::config::SyncConfig;
use crate::venue::Feed;

/// One scheduled (venue, feed) sync.
pub struct SyncTask {
    /// The syncer driving the venue.
    pub syncer: Arc<VenueSyncer>,
    /// The feed to walk.
    pub feed: Feed,
}

/// Periodic scheduler over a bounded worker pool.
pub struct SyncScheduler {
    tasks: Vec<SyncTask>,
    semaphore: Arc<Semaphore>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl SyncScheduler {
    /// Creates a scheduler for the given tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(tasks: Vec<SyncTask>, config: &SyncConfig) -> Result<Self, crate::config::ConfigError> {
        config.validate()?;
        Ok(Self {
            tasks,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_syncs)),
            shutdown: Arc::new(AtomicBool::new(false)),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }

    /// Returns the cooperative shutdown flag shared with every task.
    #[must_use]
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Requests a cooperative stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        info!("sync scheduler stop requested");
    }

    /// Spawns every task loop and returns their handles.
    ///
    /// Each loop runs until the shutdown flag is set, sleeping the poll
    /// interval between runs. A failed run is logged and the loop keeps
    /// going; the persisted cursor makes the next run safe.
    #[must_use]
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let Self {
            tasks,
            semaphore,
            shutdown,
            poll_interval,
        } = self;

        tasks
            .into_iter()
            .map(|task| {
                let semaphore = Arc::clone(&semaphore);
                let shutdown = Arc::clone(&shutdown);
                tokio::spawn(async move {
                    while !shutdown.load(Ordering::Relaxed) {
                        let Ok(permit) = semaphore.acquire().await else {
                            // Semaphore closed: treat as shutdown.
                            break;
                        };
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(err) = task.syncer.run_once(task.feed, &shutdown).await {
                            warn!(
                                feed = task.feed.as_str(),
                                error = %err,
                                "sync task failed, will retry next interval"
                            );
                        }
                        drop(permit);
                        tokio::time::sleep(poll_interval).await;
                    }
                    info!(feed = task.feed.as_str(), "sync task stopped");
                })
            })
            .collect()
    }
}
