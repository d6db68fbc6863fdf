//! Active-order liveness probing.
//!
//! Confirms whether a canonical order is still present in its venue's
//! feed by paging the feed filtered down to the order's item and side.
//! The walk is depth-bounded; an exhausted walk is inconclusive and
//! callers fail open, treating the order as still active.

use std::sync::Arc;

use curio_core::CanonicalOrder;
use tracing::debug;

use crate::config::SyncConfig;
use crate::metrics::SyncMetrics;
use crate::venue::adapter::OrderAdapter;
use crate::venue::types::OrderSide;
use crate::venue::{OrdersRequest, Pagination, VenueApi, VenueError};

/// Probe verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// The order is present in the venue feed.
    Active,
    /// The feed was searched to its end without a match.
    NotFound,
    /// The depth bound was hit with pages still full; no verdict.
    Inconclusive,
}

/// Depth-bounded venue feed prober.
pub struct OrderProber {
    api: Arc<dyn VenueApi>,
    metrics: Arc<SyncMetrics>,
    config: SyncConfig,
}

impl OrderProber {
    /// Creates a prober for the venue behind `api`.
    #[must_use]
    pub fn new(api: Arc<dyn VenueApi>, metrics: Arc<SyncMetrics>, config: SyncConfig) -> Self {
        Self {
            api,
            metrics,
            config,
        }
    }

    /// Probes the venue feed for the given order.
    ///
    /// # Errors
    ///
    /// Returns [`VenueError`] when a page fetch fails beyond retry.
    pub async fn probe(&self, order: &CanonicalOrder) -> Result<Liveness, VenueError> {
        self.metrics.record_probe();
        let adapter = OrderAdapter::new(self.api.venue());

        let nft = order.nft();
        let request_base = OrdersRequest {
            collection: nft
                .and_then(|a| a.asset_type.token())
                .map(|t| t.to_string()),
            token_id: nft
                .and_then(|a| a.asset_type.token_id())
                .map(|t| t.to_string()),
            side: Some(if order.is_sell() {
                OrderSide::Sell
            } else {
                OrderSide::Buy
            }),
            pagination: Pagination::default(),
        };

        let mut cursor: Option<String> = None;
        for depth in 0..self.config.probe_max_depth {
            let page = self
                .api
                .list_orders(&OrdersRequest {
                    pagination: Pagination {
                        first: self.config.page_size,
                        cursor: cursor.clone(),
                    },
                    ..request_base.clone()
                })
                .await?;

            let found = page
                .data
                .iter()
                .filter_map(|native| adapter.convert(native))
                .any(|version| version.hash == order.hash);
            if found {
                debug!(hash = %order.hash, depth, "probe hit");
                return Ok(Liveness::Active);
            }

            if page.data.len() < self.config.page_size || page.next_cursor.is_none() {
                debug!(hash = %order.hash, depth, "probe reached feed end");
                return Ok(Liveness::NotFound);
            }
            cursor = page.next_cursor;
        }

        debug!(hash = %order.hash, "probe depth exhausted");
        Ok(Liveness::Inconclusive)
    }
}
