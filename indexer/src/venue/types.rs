//! Native venue feed records.
//!
//! Wire shapes shared by every venue client. Venues differ in envelope
//! and naming; their HTTP clients normalize into these records before
//! the adapters see them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structural kind of a native order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VenueOrderKind {
    /// One collection, one token id.
    SingleItem,
    /// Several items sold together.
    Bundle,
    /// An offer on any token of a collection.
    CollectionOffer,
}

/// Requested or native order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderSide {
    /// Maker sells the NFT.
    Sell,
    /// Maker bids on the NFT.
    Buy,
}

/// One native order as a venue feed reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueOrder {
    /// Venue-assigned id; also the native paging cursor.
    pub native_id: String,
    /// Structural kind.
    pub kind: VenueOrderKind,
    /// Order side.
    pub side: OrderSide,
    /// Maker address, hex.
    pub maker: String,
    /// Collection contract, hex.
    pub collection: String,
    /// Token id, decimal. Absent on collection-wide offers.
    pub token_id: Option<String>,
    /// NFT amount, decimal.
    pub amount: String,
    /// Price in wei, decimal.
    pub price: String,
    /// Payment token contract; absent means native currency.
    pub currency: Option<String>,
    /// Maker nonce, decimal.
    pub nonce: String,
    /// Validity window start, unix seconds.
    pub start_time: Option<i64>,
    /// Validity window end, unix seconds.
    pub end_time: Option<i64>,
    /// Maker signature, hex.
    pub signature: Option<String>,
    /// Creation timestamp at the venue.
    pub created_at: DateTime<Utc>,
}

/// Kind of a native venue event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VenueEventKind {
    /// A listing was cancelled.
    CancelList,
    /// An offer was cancelled.
    CancelOffer,
    /// The maker invalidated every order below a nonce.
    CancelAll,
    /// An order was (partially) filled.
    Sale,
}

/// One native event as a venue feed reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueEvent {
    /// Venue-assigned id; also the native paging cursor.
    pub native_id: String,
    /// Event kind.
    pub kind: VenueEventKind,
    /// The order the event concerns, embedded by most feeds.
    pub order: Option<VenueOrder>,
    /// Maker address, hex. Set on cancel-all events.
    pub maker: Option<String>,
    /// New minimum nonce, decimal. Set on cancel-all events.
    pub min_nonce: Option<String>,
    /// Cumulative fill in take units, decimal. Set on sale events.
    pub fill: Option<String>,
    /// Event timestamp at the venue.
    pub created_at: DateTime<Utc>,
}
