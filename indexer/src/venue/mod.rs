//! Venue feed access.
//!
//! A venue is any marketplace exposing a paginated, timestamp-ordered
//! order/event feed. The syncer and prober consume venues through
//! [`VenueApi`]; [`http::HttpVenueClient`] is the production binding.
//!
//! # Components
//!
//! - [`types`]: native feed record shapes
//! - [`adapter`]: native record → canonical conversion
//! - [`http`]: reqwest-backed venue client with retry

pub mod adapter;
pub mod http;
pub mod types;

#[cfg(test)]
pub mod testutil;

use async_trait::async_trait;
use curio_core::Platform;
use serde::{Deserialize, Serialize};

use types::{OrderSide, VenueEvent, VenueEventKind, VenueOrder};

/// A supported external venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    /// OpenSea / Seaport.
    Opensea,
    /// LooksRare.
    Looksrare,
    /// X2Y2.
    X2y2,
}

impl Venue {
    /// Returns a stable lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Opensea => "opensea",
            Self::Looksrare => "looksrare",
            Self::X2y2 => "x2y2",
        }
    }

    /// Canonical platform tag for orders sourced from this venue.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        match self {
            Self::Opensea => Platform::Opensea,
            Self::Looksrare => Platform::Looksrare,
            Self::X2y2 => Platform::X2y2,
        }
    }
}

/// A venue feed kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    /// The order feed.
    Orders,
    /// The event feed.
    Events,
}

impl Feed {
    /// Returns a stable lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Events => "events",
        }
    }
}

/// Paging parameters for one feed request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pagination {
    /// Requested page size.
    pub first: usize,
    /// Opaque native cursor from a previous page.
    pub cursor: Option<String>,
}

/// One page of native records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenuePage<T> {
    /// Records, newest first.
    pub data: Vec<T>,
    /// Cursor resuming after the last record; absent on the final page.
    pub next_cursor: Option<String>,
}

impl<T> VenuePage<T> {
    /// An empty final page.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            data: Vec::new(),
            next_cursor: None,
        }
    }
}

/// Parameters for an order feed request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrdersRequest {
    /// Restrict to one collection contract, hex.
    pub collection: Option<String>,
    /// Restrict to one token id, decimal.
    pub token_id: Option<String>,
    /// Restrict to one order side.
    pub side: Option<OrderSide>,
    /// Paging parameters.
    pub pagination: Pagination,
}

/// Parameters for an event feed request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventsRequest {
    /// Restrict to one event kind.
    pub kind: Option<VenueEventKind>,
    /// Paging parameters.
    pub pagination: Pagination,
}

/// Venue fetch errors.
#[derive(Debug, thiserror::Error)]
pub enum VenueError {
    /// Transport-level failure.
    #[error("venue request failed: {0}")]
    Http(String),

    /// Rate limited (429).
    #[error("venue rate limited, retry after {retry_after:?} seconds")]
    RateLimited {
        /// Retry-After header value, seconds.
        retry_after: Option<u64>,
    },

    /// Response body could not be decoded.
    #[error("venue response deserialization failed: {0}")]
    Deserialization(String),

    /// The venue returned a non-success status.
    #[error("venue API error [{status}]: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Request timed out.
    #[error("venue request timeout")]
    Timeout,
}

/// Paginated, timestamp-ordered access to one venue's feeds.
#[async_trait]
pub trait VenueApi: Send + Sync {
    /// The venue behind this client.
    fn venue(&self) -> Venue;

    /// Fetches one page of the order feed, newest first.
    async fn list_orders(&self, request: &OrdersRequest)
        -> Result<VenuePage<VenueOrder>, VenueError>;

    /// Fetches one page of the event feed, newest first.
    async fn list_events(&self, request: &EventsRequest)
        -> Result<VenuePage<VenueEvent>, VenueError>;
}
