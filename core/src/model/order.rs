//! Canonical orders and order versions.
//!
//! A [`CanonicalOrder`] is the origin-independent aggregate the
//! reconciler maintains. An [`OrderVersion`] is one observed snapshot of
//! an order, produced by a venue adapter or the on-chain scanner. Both
//! are identified by the canonical hash derived from the order's
//! immutable fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::address::{Address, OrderHash, TokenId};

/// Asset class of one order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AssetType {
    /// Native currency.
    Eth,
    /// Fungible token.
    Erc20 {
        /// Token contract.
        token: Address,
    },
    /// Non-fungible token.
    Erc721 {
        /// Collection contract.
        token: Address,
        /// Token id.
        token_id: TokenId,
    },
    /// Semi-fungible token.
    Erc1155 {
        /// Collection contract.
        token: Address,
        /// Token id.
        token_id: TokenId,
    },
}

impl AssetType {
    /// Returns true for NFT-shaped asset types.
    #[must_use]
    pub const fn is_nft(&self) -> bool {
        matches!(self, Self::Erc721 { .. } | Self::Erc1155 { .. })
    }

    /// Returns the collection contract for NFT-shaped types.
    #[must_use]
    pub const fn token(&self) -> Option<Address> {
        match self {
            Self::Eth => None,
            Self::Erc20 { token } | Self::Erc721 { token, .. } | Self::Erc1155 { token, .. } => {
                Some(*token)
            }
        }
    }

    /// Returns the token id for NFT-shaped types.
    #[must_use]
    pub const fn token_id(&self) -> Option<TokenId> {
        match self {
            Self::Erc721 { token_id, .. } | Self::Erc1155 { token_id, .. } => Some(*token_id),
            _ => None,
        }
    }

    /// Feeds the type into a hash digest.
    fn hash_into(&self, hasher: &mut Sha256) {
        match self {
            Self::Eth => hasher.update(b"eth"),
            Self::Erc20 { token } => {
                hasher.update(b"erc20");
                hasher.update(token.as_bytes());
            }
            Self::Erc721 { token, token_id } => {
                hasher.update(b"erc721");
                hasher.update(token.as_bytes());
                hasher.update(token_id.0.to_be_bytes());
            }
            Self::Erc1155 { token, token_id } => {
                hasher.update(b"erc1155");
                hasher.update(token.as_bytes());
                hasher.update(token_id.0.to_be_bytes());
            }
        }
    }
}

/// One side of an order: an asset type and a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset class.
    pub asset_type: AssetType,
    /// Amount in the asset's base unit (wei-scale for currencies).
    pub value: u128,
}

/// Origin platform of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Observed directly from on-chain logs.
    Chain,
    /// OpenSea / Seaport feed.
    Opensea,
    /// LooksRare feed.
    Looksrare,
    /// X2Y2 feed.
    X2y2,
}

impl Platform {
    /// Returns a stable lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chain => "chain",
            Self::Opensea => "opensea",
            Self::Looksrare => "looksrare",
            Self::X2y2 => "x2y2",
        }
    }
}

/// Status of a canonical order aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Live and fillable.
    Active,
    /// Known but not currently fillable.
    Inactive,
    /// Start time not yet reached.
    NotStarted,
    /// End time passed without a full fill.
    Ended,
    /// Cancelled. Terminal.
    Cancelled,
    /// Fully filled. Terminal.
    Filled,
}

impl OrderStatus {
    /// Returns true for terminal states that later events never leave.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Filled)
    }
}

/// One observed snapshot of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderVersion {
    /// Canonical hash.
    pub hash: OrderHash,
    /// Maker address.
    pub maker: Address,
    /// What the maker gives.
    pub make: Asset,
    /// What the maker wants.
    pub take: Asset,
    /// Maker-chosen salt.
    pub salt: u64,
    /// Maker nonce; orders below a maker's minimum nonce are cancelled.
    pub nonce: u64,
    /// Validity window start.
    pub start: Option<DateTime<Utc>>,
    /// Validity window end.
    pub end: Option<DateTime<Utc>>,
    /// Origin platform.
    pub platform: Platform,
    /// Maker signature, hex-encoded.
    pub signature: Option<String>,
    /// Creation timestamp at the origin.
    pub created_at: DateTime<Utc>,
}

impl OrderVersion {
    /// Derives the canonical hash from the order's immutable fields.
    ///
    /// hash = sha256(maker, make asset type, take asset type, salt,
    /// platform tag); equal inputs from different feeds collapse onto
    /// the same aggregate.
    #[must_use]
    pub fn derive_hash(
        maker: Address,
        make_type: &AssetType,
        take_type: &AssetType,
        salt: u64,
        platform: Platform,
    ) -> OrderHash {
        let mut hasher = Sha256::new();
        hasher.update(maker.as_bytes());
        make_type.hash_into(&mut hasher);
        take_type.hash_into(&mut hasher);
        hasher.update(salt.to_be_bytes());
        hasher.update(platform.as_str().as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        OrderHash::new(bytes)
    }

    /// Returns the NFT side of the order, if any.
    #[must_use]
    pub const fn nft(&self) -> Option<&Asset> {
        if self.make.asset_type.is_nft() {
            Some(&self.make)
        } else if self.take.asset_type.is_nft() {
            Some(&self.take)
        } else {
            None
        }
    }

    /// Returns true if the maker is selling the NFT side.
    #[must_use]
    pub const fn is_sell(&self) -> bool {
        self.make.asset_type.is_nft()
    }
}

/// The canonical order aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalOrder {
    /// Canonical hash.
    pub hash: OrderHash,
    /// Maker address.
    pub maker: Address,
    /// What the maker gives.
    pub make: Asset,
    /// What the maker wants.
    pub take: Asset,
    /// Maker-chosen salt.
    pub salt: u64,
    /// Maker nonce.
    pub nonce: u64,
    /// Accumulated fill, counted in take units.
    pub fill: u128,
    /// Aggregate status.
    pub status: OrderStatus,
    /// Validity window start.
    pub start: Option<DateTime<Utc>>,
    /// Validity window end.
    pub end: Option<DateTime<Utc>>,
    /// Origin platform.
    pub platform: Platform,
    /// Maker signature, hex-encoded.
    pub signature: Option<String>,
    /// First observation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub last_update_at: DateTime<Utc>,
    /// Optimistic-concurrency version, bumped on every save.
    pub version: u64,
}

impl CanonicalOrder {
    /// Creates a fresh aggregate from its first observed version.
    #[must_use]
    pub fn from_version(version: OrderVersion, now: DateTime<Utc>) -> Self {
        let status = initial_status(&version, now);
        Self {
            hash: version.hash,
            maker: version.maker,
            make: version.make,
            take: version.take,
            salt: version.salt,
            nonce: version.nonce,
            fill: 0,
            status,
            start: version.start,
            end: version.end,
            platform: version.platform,
            signature: version.signature,
            created_at: version.created_at,
            last_update_at: now,
            version: 0,
        }
    }

    /// Returns true if the aggregate is fully filled.
    #[must_use]
    pub fn is_fully_filled(&self) -> bool {
        self.fill >= self.take.value
    }

    /// Returns the NFT side of the order, if any.
    #[must_use]
    pub const fn nft(&self) -> Option<&Asset> {
        if self.make.asset_type.is_nft() {
            Some(&self.make)
        } else if self.take.asset_type.is_nft() {
            Some(&self.take)
        } else {
            None
        }
    }

    /// Returns true if the maker is selling the NFT side.
    #[must_use]
    pub const fn is_sell(&self) -> bool {
        self.make.asset_type.is_nft()
    }
}

/// Computes the status of a freshly observed order.
fn initial_status(version: &OrderVersion, now: DateTime<Utc>) -> OrderStatus {
    if let Some(start) = version.start {
        if now < start {
            return OrderStatus::NotStarted;
        }
    }
    if let Some(end) = version.end {
        if now > end {
            return OrderStatus::Ended;
        }
    }
    OrderStatus::Active
}
