//! Append-only activity history records.
//!
//! A record is immutable once written except for the single
//! Confirmed → Reverted transition. Identity derives from the on-chain
//! position (tx hash, log index, minor log index) unless an external id
//! was assigned, which makes re-ingestion idempotent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::{Address, OrderHash, TokenId};

/// Stored activity kind.
///
/// Mint and burn are not stored kinds: they are classifications of
/// [`ActivityKind::Transfer`] via the zero-address sentinel, see
/// [`TransferClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Token moved between accounts (covers mint and burn).
    Transfer,
    /// Sell order listed.
    List,
    /// Bid placed.
    Bid,
    /// Orders matched (sale).
    Match,
    /// Order cancelled on-chain.
    Cancel,
}

impl ActivityKind {
    /// Returns a stable lowercase name, used as the stored discriminant.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::List => "list",
            Self::Bid => "bid",
            Self::Match => "match",
            Self::Cancel => "cancel",
        }
    }
}

/// Confirmation status of a history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    /// Seen but not yet confirmed.
    Pending,
    /// Confirmed on chain.
    Confirmed,
    /// Dropped in a reorg. Triggers aggregate replay.
    Reverted,
}

impl LogStatus {
    /// Returns a stable lowercase name, used as the stored discriminant.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Reverted => "reverted",
        }
    }
}

/// Sentinel-address classification of a transfer-shaped record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferClass {
    /// `from` is the zero address.
    Mint,
    /// `owner` is the zero address.
    Burn,
    /// Neither side is the zero address.
    Transfer,
}

/// Classifies a transfer by its sentinel addresses.
///
/// This is the single source of truth for the mint/burn/transfer
/// partition; every filter scope reuses it. Every (from, owner) pair
/// lands in exactly one class; the degenerate zero → zero case counts as
/// a mint.
#[must_use]
pub fn classify_transfer(from: Address, owner: Address) -> TransferClass {
    if from.is_zero() {
        TransferClass::Mint
    } else if owner.is_zero() {
        TransferClass::Burn
    } else {
        TransferClass::Transfer
    }
}

/// Position of a log within its block, ordering records deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockOrdering {
    /// Block number.
    pub block_number: u64,
    /// Log index within the block.
    pub log_index: u32,
    /// Sub-index for logs expanded into multiple records.
    pub minor_log_index: u32,
}

/// One append-only activity history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Record id. Derived from the block position unless externally
    /// assigned; uniqueness makes duplicate ingestion a no-op.
    pub id: String,

    /// Stored activity kind.
    pub kind: ActivityKind,

    /// Collection contract.
    pub token: Address,

    /// Token id within the collection.
    pub token_id: TokenId,

    /// Sending side (maker for order kinds).
    pub from: Address,

    /// Receiving side / new owner.
    pub owner: Address,

    /// Transferred amount (1 for ERC-721).
    pub value: u128,

    /// Event timestamp; primary pagination key.
    pub date: DateTime<Utc>,

    /// Confirmation status.
    pub status: LogStatus,

    /// Transaction hash.
    pub tx_hash: String,

    /// Block position.
    pub block: BlockOrdering,

    /// Canonical order hash, for order-shaped kinds.
    pub order_hash: Option<OrderHash>,
}

impl ActivityRecord {
    /// Derives the record id from its on-chain position.
    #[must_use]
    pub fn derive_id(tx_hash: &str, log_index: u32, minor_log_index: u32) -> String {
        format!("{tx_hash}:{log_index}:{minor_log_index}")
    }

    /// Classifies a transfer-shaped record. Meaningless for order kinds.
    #[must_use]
    pub fn transfer_class(&self) -> TransferClass {
        classify_transfer(self.from, self.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    #[test]
    fn test_classify_transfer_partition() {
        // Every (from, owner) combination lands in exactly one class.
        let cases = [
            (Address::ZERO, addr(1), TransferClass::Mint),
            (addr(1), Address::ZERO, TransferClass::Burn),
            (addr(1), addr(2), TransferClass::Transfer),
            (Address::ZERO, Address::ZERO, TransferClass::Mint),
        ];
        for (from, owner, expected) in cases {
            assert_eq!(classify_transfer(from, owner), expected);
        }
    }

    #[test]
    fn test_derive_id() {
        assert_eq!(ActivityRecord::derive_id("0xdead", 3, 1), "0xdead:3:1");
    }

    #[test]
    fn test_block_ordering_total_order() {
        let a = BlockOrdering {
            block_number: 1,
            log_index: 5,
            minor_log_index: 0,
        };
        let b = BlockOrdering {
            block_number: 1,
            log_index: 5,
            minor_log_index: 1,
        };
        let c = BlockOrdering {
            block_number: 2,
            log_index: 0,
            minor_log_index: 0,
        };
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_kind_as_str() {
        assert_eq!(ActivityKind::Transfer.as_str(), "transfer");
        assert_eq!(ActivityKind::Match.as_str(), "match");
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(LogStatus::Confirmed.as_str(), "confirmed");
        assert_eq!(LogStatus::Reverted.as_str(), "reverted");
    }
}
