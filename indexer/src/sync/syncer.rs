//! Venue cursor syncer.
//!
//! Walks one venue feed newest-first and merges everything newer than
//! the persisted watermark into the reconciler. The cursor advances in
//! two modes: a walk that reaches known territory (or an empty page)
//! is exhausted and promotes the newest seen timestamp to the new
//! watermark; a walk cut short by the page-depth bound carries the
//! venue's native page cursor instead, so the next run resumes
//! mid-walk without re-fetching.
//!
//! State is persisted only after a fully merged run. A fetch failure
//! aborts the run with the stored cursor untouched; re-processing is
//! harmless because reconciliation is idempotent by canonical hash.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use curio_core::reconcile::{OrderEvent, Reconciler};
use curio_core::{CoreError, StoreError};
use tracing::{debug, info, warn};

use super::state::{SyncStateStore, VenueSyncState};
use crate::config::SyncConfig;
use crate::metrics::SyncMetrics;
use crate::venue::adapter::{EventAdapter, OrderAdapter};
use crate::venue::{EventsRequest, Feed, OrdersRequest, Pagination, VenueApi, VenueError};

/// Phase of a sync run, logged per transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Waiting for the next run.
    Idle,
    /// Fetching a feed page.
    Fetching,
    /// Converting and reconciling a fetched page.
    Merging,
    /// Writing the advanced cursor.
    Persisting,
    /// The walk reached known territory.
    Exhausted,
}

/// Sync run errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A venue fetch failed beyond retry.
    #[error(transparent)]
    Venue(#[from] VenueError),

    /// Reconciliation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The cursor store failed.
    #[error(transparent)]
    State(#[from] StoreError),
}

/// Summary of one completed sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Pages fetched.
    pub pages: usize,
    /// Records merged into the reconciler.
    pub reconciled: usize,
    /// Records skipped as already known.
    pub skipped: usize,
    /// Whether the walk reached known territory.
    pub exhausted: bool,
    /// Watermark after the run.
    pub primary_after: DateTime<Utc>,
}

/// Incremental syncer for one venue.
pub struct VenueSyncer {
    api: Arc<dyn VenueApi>,
    reconciler: Arc<Reconciler>,
    states: Arc<dyn SyncStateStore>,
    metrics: Arc<SyncMetrics>,
    config: SyncConfig,
}

impl VenueSyncer {
    /// Creates a syncer for the venue behind `api`.
    #[must_use]
    pub fn new(
        api: Arc<dyn VenueApi>,
        reconciler: Arc<Reconciler>,
        states: Arc<dyn SyncStateStore>,
        metrics: Arc<SyncMetrics>,
        config: SyncConfig,
    ) -> Self {
        Self {
            api,
            reconciler,
            states,
            metrics,
            config,
        }
    }

    /// Runs one sync pass over the given feed.
    ///
    /// # Errors
    ///
    /// Aborts without persisting on fetch, reconciliation, or cursor
    /// store failure.
    pub async fn run_once(
        &self,
        feed: Feed,
        shutdown: &AtomicBool,
    ) -> Result<SyncOutcome, SyncError> {
        let started = Instant::now();
        let result = match feed {
            Feed::Orders => self.run_orders(shutdown).await,
            Feed::Events => self.run_events(shutdown).await,
        };
        match &result {
            Ok(outcome) => {
                self.metrics.record_run(started.elapsed());
                info!(
                    venue = self.api.venue().as_str(),
                    feed = feed.as_str(),
                    pages = outcome.pages,
                    reconciled = outcome.reconciled,
                    skipped = outcome.skipped,
                    exhausted = outcome.exhausted,
                    "sync run complete"
                );
            }
            Err(err) => {
                self.metrics.record_failed_run();
                warn!(
                    venue = self.api.venue().as_str(),
                    feed = feed.as_str(),
                    error = %err,
                    "sync run aborted, cursor untouched"
                );
            }
        }
        result
    }

    async fn run_orders(&self, shutdown: &AtomicBool) -> Result<SyncOutcome, SyncError> {
        let venue = self.api.venue();
        let adapter = OrderAdapter::new(venue);
        let mut run = self.start_run(Feed::Orders).await?;

        while run.wants_page(shutdown, self.config.max_page_depth) {
            self.log_phase(Feed::Orders, SyncPhase::Fetching);
            let page = self
                .api
                .list_orders(&OrdersRequest {
                    pagination: Pagination {
                        first: self.config.page_size,
                        cursor: run.cursor.clone(),
                    },
                    ..OrdersRequest::default()
                })
                .await?;
            self.metrics.record_page(page.data.len() as u64);
            if page.data.is_empty() {
                run.exhausted = true;
                break;
            }

            self.log_phase(Feed::Orders, SyncPhase::Merging);
            let oldest = page.data.last().map(|o| o.created_at);
            let last_native_id = page.data.last().map(|o| o.native_id.clone());
            for order in &page.data {
                if order.created_at <= run.state.primary_after {
                    run.skipped += 1;
                    self.metrics.record_skipped();
                    continue;
                }
                run.observe(order.created_at);
                match adapter.convert(order) {
                    Some(version) => {
                        let changed = self.reconciler.apply(OrderEvent::Upsert(version)).await?;
                        if changed.is_empty() {
                            run.skipped += 1;
                            self.metrics.record_skipped();
                        } else {
                            run.reconciled += 1;
                            self.metrics.record_reconciled();
                        }
                    }
                    None => self.metrics.record_unsupported(),
                }
            }

            if run.advance_cursor(oldest, page.next_cursor.or(last_native_id)) {
                break;
            }
        }

        self.finish_run(Feed::Orders, run).await
    }

    async fn run_events(&self, shutdown: &AtomicBool) -> Result<SyncOutcome, SyncError> {
        let venue = self.api.venue();
        let adapter = EventAdapter::new(venue);
        let mut run = self.start_run(Feed::Events).await?;

        while run.wants_page(shutdown, self.config.max_page_depth) {
            self.log_phase(Feed::Events, SyncPhase::Fetching);
            let page = self
                .api
                .list_events(&EventsRequest {
                    kind: None,
                    pagination: Pagination {
                        first: self.config.page_size,
                        cursor: run.cursor.clone(),
                    },
                })
                .await?;
            self.metrics.record_page(page.data.len() as u64);
            if page.data.is_empty() {
                run.exhausted = true;
                break;
            }

            self.log_phase(Feed::Events, SyncPhase::Merging);
            let oldest = page.data.last().map(|e| e.created_at);
            let last_native_id = page.data.last().map(|e| e.native_id.clone());
            for event in &page.data {
                if event.created_at <= run.state.primary_after {
                    run.skipped += 1;
                    self.metrics.record_skipped();
                    continue;
                }
                run.observe(event.created_at);
                match adapter.convert(event) {
                    Some(converted) => {
                        let changed = self.reconciler.apply(converted).await?;
                        if changed.is_empty() {
                            run.skipped += 1;
                            self.metrics.record_skipped();
                        } else {
                            run.reconciled += 1;
                            self.metrics.record_reconciled();
                        }
                    }
                    None => self.metrics.record_unsupported(),
                }
            }

            if run.advance_cursor(oldest, page.next_cursor.or(last_native_id)) {
                break;
            }
        }

        self.finish_run(Feed::Events, run).await
    }

    async fn start_run(&self, feed: Feed) -> Result<RunState, SyncError> {
        let venue = self.api.venue();
        let state = match self.states.load(venue, feed).await? {
            Some(state) => state,
            None => {
                let start = Utc::now()
                    - Duration::seconds(i64::try_from(self.config.lookback_secs).unwrap_or(0));
                debug!(
                    venue = venue.as_str(),
                    feed = feed.as_str(),
                    watermark = %start,
                    "initializing sync cursor"
                );
                VenueSyncState::new(venue, feed, start)
            }
        };
        Ok(RunState {
            cursor: state.next_page_token.clone(),
            max_seen: state.max_seen_primary,
            state,
            pages: 0,
            reconciled: 0,
            skipped: 0,
            exhausted: false,
        })
    }

    async fn finish_run(&self, feed: Feed, mut run: RunState) -> Result<SyncOutcome, SyncError> {
        if run.exhausted {
            self.log_phase(feed, SyncPhase::Exhausted);
            if let Some(max_seen) = run.max_seen {
                run.state.primary_after = max_seen;
            }
            run.state.next_page_token = None;
            run.state.max_seen_primary = None;
        } else {
            run.state.next_page_token = run.cursor.clone();
            run.state.max_seen_primary = run.max_seen;
        }
        run.state.last_run_at = Some(Utc::now());

        self.log_phase(feed, SyncPhase::Persisting);
        self.states.save(run.state.clone()).await?;
        self.log_phase(feed, SyncPhase::Idle);

        Ok(SyncOutcome {
            pages: run.pages,
            reconciled: run.reconciled,
            skipped: run.skipped,
            exhausted: run.exhausted,
            primary_after: run.state.primary_after,
        })
    }

    fn log_phase(&self, feed: Feed, phase: SyncPhase) {
        debug!(
            venue = self.api.venue().as_str(),
            feed = feed.as_str(),
            phase = ?phase,
            "sync phase"
        );
    }
}

/// Mutable bookkeeping of one run.
struct RunState {
    state: VenueSyncState,
    cursor: Option<String>,
    max_seen: Option<DateTime<Utc>>,
    pages: usize,
    reconciled: usize,
    skipped: usize,
    exhausted: bool,
}

impl RunState {
    /// Cancellation and depth checkpoint, taken between pages.
    fn wants_page(&mut self, shutdown: &AtomicBool, max_depth: usize) -> bool {
        if shutdown.load(Ordering::Relaxed) || self.pages >= max_depth {
            return false;
        }
        self.pages += 1;
        true
    }

    fn observe(&mut self, ts: DateTime<Utc>) {
        if self.max_seen.is_none_or(|m| ts > m) {
            self.max_seen = Some(ts);
        }
    }

    /// Advances the native cursor; returns true when the walk is done.
    fn advance_cursor(
        &mut self,
        oldest: Option<DateTime<Utc>>,
        next_cursor: Option<String>,
    ) -> bool {
        if oldest.is_some_and(|o| o <= self.state.primary_after) {
            self.exhausted = true;
            return true;
        }
        match next_cursor {
            Some(cursor) => {
                self.cursor = Some(cursor);
                false
            }
            None => {
                self.exhausted = true;
                true
            }
        }
    }
}
