//! Core data model.
//!
//! # Components
//!
//! - [`address`]: addresses, order hashes, token ids
//! - [`history`]: append-only activity records and the sentinel
//!   mint/burn/transfer classification
//! - [`order`]: canonical orders, order versions, assets

pub mod address;
pub mod history;
pub mod order;

pub use address::{Address, OrderHash, TokenId};
pub use history::{
    classify_transfer, ActivityKind, ActivityRecord, BlockOrdering, LogStatus, TransferClass,
};
pub use order::{Asset, AssetType, CanonicalOrder, OrderStatus, OrderVersion, Platform};
