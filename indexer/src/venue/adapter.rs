//! Native record conversion.
//!
//! Pure, deterministic mapping from venue feed records to canonical
//! order versions and events. Unsupported records convert to None;
//! rejection is an expected outcome counted by the caller, never an
//! error.

use chrono::{DateTime, TimeZone, Utc};
use curio_core::reconcile::OrderEvent;
use curio_core::{Address, Asset, AssetType, OrderVersion, TokenId};

use super::types::{OrderSide, VenueEvent, VenueEventKind, VenueOrder, VenueOrderKind};
use super::Venue;

/// Converts native orders from one venue into canonical versions.
#[derive(Debug, Clone, Copy)]
pub struct OrderAdapter {
    venue: Venue,
}

impl OrderAdapter {
    /// Creates an adapter for the given venue.
    #[must_use]
    pub const fn new(venue: Venue) -> Self {
        Self { venue }
    }

    /// Converts one native order.
    ///
    /// Returns None for bundles, collection-wide offers, missing token
    /// ids or signatures, malformed fields, and nonces above the
    /// supported range.
    #[must_use]
    pub fn convert(&self, order: &VenueOrder) -> Option<OrderVersion> {
        if order.kind != VenueOrderKind::SingleItem {
            return None;
        }
        let signature = order.signature.clone()?;
        let token_id = TokenId::parse(order.token_id.as_deref()?).ok()?;

        let maker = Address::from_hex(&order.maker).ok()?;
        let collection = Address::from_hex(&order.collection).ok()?;
        let amount: u128 = order.amount.parse().ok()?;
        let price: u128 = order.price.parse().ok()?;
        let nonce: u64 = order.nonce.parse().ok()?;

        let nft_type = if amount == 1 {
            AssetType::Erc721 {
                token: collection,
                token_id,
            }
        } else {
            AssetType::Erc1155 {
                token: collection,
                token_id,
            }
        };
        let currency_type = match &order.currency {
            Some(token) => AssetType::Erc20 {
                token: Address::from_hex(token).ok()?,
            },
            None => AssetType::Eth,
        };

        let (make, take) = match order.side {
            OrderSide::Sell => (
                Asset {
                    asset_type: nft_type,
                    value: amount,
                },
                Asset {
                    asset_type: currency_type,
                    value: price,
                },
            ),
            OrderSide::Buy => (
                Asset {
                    asset_type: currency_type,
                    value: price,
                },
                Asset {
                    asset_type: nft_type,
                    value: amount,
                },
            ),
        };

        let platform = self.venue.platform();
        Some(OrderVersion {
            hash: OrderVersion::derive_hash(
                maker,
                &make.asset_type,
                &take.asset_type,
                nonce,
                platform,
            ),
            maker,
            make,
            take,
            salt: nonce,
            nonce,
            start: order.start_time.and_then(unix_time),
            end: order.end_time.and_then(unix_time),
            platform,
            signature: Some(signature),
            created_at: order.created_at,
        })
    }
}

/// Converts native events from one venue into canonical order events.
#[derive(Debug, Clone, Copy)]
pub struct EventAdapter {
    orders: OrderAdapter,
}

impl EventAdapter {
    /// Creates an adapter for the given venue.
    #[must_use]
    pub const fn new(venue: Venue) -> Self {
        Self {
            orders: OrderAdapter::new(venue),
        }
    }

    /// Converts one native event.
    ///
    /// Returns None when the event's order cannot be converted or the
    /// event is missing the fields its kind requires.
    #[must_use]
    pub fn convert(&self, event: &VenueEvent) -> Option<OrderEvent> {
        match event.kind {
            VenueEventKind::Sale => {
                let version = self.orders.convert(event.order.as_ref()?)?;
                let fill: u128 = event.fill.as_deref()?.parse().ok()?;
                Some(OrderEvent::Fill {
                    hash: version.hash,
                    fill,
                    date: event.created_at,
                })
            }
            VenueEventKind::CancelList | VenueEventKind::CancelOffer => {
                let version = self.orders.convert(event.order.as_ref()?)?;
                Some(OrderEvent::Cancel {
                    hash: version.hash,
                    date: event.created_at,
                })
            }
            VenueEventKind::CancelAll => {
                let maker = Address::from_hex(event.maker.as_deref()?).ok()?;
                let min_nonce: u64 = event.min_nonce.as_deref()?.parse().ok()?;
                Some(OrderEvent::NonceBump {
                    maker,
                    min_nonce,
                    date: event.created_at,
                })
            }
        }
    }
}

fn unix_time(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
