//! Order reconciliation.
//!
//! Events from venue feeds and the chain converge on one canonical
//! aggregate per order hash. The reconciler serializes writers per hash
//! with an async lock, saves through optimistic versioning, and retries
//! a lost race once against a fresh read before giving up.
//!
//! The transition function is pure and shared with [`replay`], so a
//! re-fold of an order's full event history must land on the same
//! state the incremental path produced.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{CoreError, StoreError};
use crate::model::{Address, CanonicalOrder, OrderHash, OrderStatus, OrderVersion};
use crate::store::OrderStore;

/// An observed order event.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    /// A full order snapshot from a feed or the chain.
    Upsert(OrderVersion),
    /// Cumulative fill observed for an order, in take units.
    Fill {
        /// Canonical hash.
        hash: OrderHash,
        /// Total fill observed so far, not a delta.
        fill: u128,
        /// Observation timestamp.
        date: DateTime<Utc>,
    },
    /// Explicit cancellation.
    Cancel {
        /// Canonical hash.
        hash: OrderHash,
        /// Observation timestamp.
        date: DateTime<Utc>,
    },
    /// Maker raised their minimum nonce; all orders below it die.
    NonceBump {
        /// Maker address.
        maker: Address,
        /// New minimum valid nonce.
        min_nonce: u64,
        /// Observation timestamp.
        date: DateTime<Utc>,
    },
}

/// Serialized, versioned application of order events.
pub struct Reconciler {
    store: Arc<dyn OrderStore>,
    locks: Mutex<HashMap<OrderHash, Arc<Mutex<()>>>>,
}

impl Reconciler {
    /// Creates a reconciler over an order store.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Applies one event, returning the aggregates it changed.
    ///
    /// # Errors
    ///
    /// [`CoreError::ReconciliationConflict`] when a save lost a version
    /// race twice, [`CoreError::Store`] on backend failure.
    pub async fn apply(&self, event: OrderEvent) -> Result<Vec<CanonicalOrder>, CoreError> {
        match &event {
            OrderEvent::Upsert(version) => {
                let hash = version.hash;
                Ok(self.update(hash, &event).await?.into_iter().collect())
            }
            OrderEvent::Fill { hash, .. } | OrderEvent::Cancel { hash, .. } => {
                Ok(self.update(*hash, &event).await?.into_iter().collect())
            }
            OrderEvent::NonceBump {
                maker, min_nonce, ..
            } => {
                let victims = self
                    .store
                    .find_by_maker_and_nonce_below(*maker, *min_nonce)
                    .await?;
                debug!(
                    maker = %maker,
                    min_nonce,
                    victims = victims.len(),
                    "nonce bump cascade"
                );
                let mut changed = Vec::new();
                for victim in victims {
                    if let Some(updated) = self.update(victim.hash, &event).await? {
                        changed.push(updated);
                    }
                }
                Ok(changed)
            }
        }
    }

    /// Rebuilds one aggregate from its surviving event history.
    ///
    /// Used after a revert: the events that remain confirmed are
    /// replayed from scratch and the result overwrites the live
    /// aggregate, carrying the stored version so the optimistic save
    /// goes through. Returns None without writing when no surviving
    /// event produces a state.
    ///
    /// # Errors
    ///
    /// [`CoreError::ReconciliationConflict`] when the save lost a
    /// version race twice, [`CoreError::InconsistentAggregate`] when an
    /// intermediate replay state is invalid.
    pub async fn rebuild(
        &self,
        hash: OrderHash,
        events: &[OrderEvent],
        now: DateTime<Utc>,
    ) -> Result<Option<CanonicalOrder>, CoreError> {
        let lock = self.lock_for(hash).await;
        let result = {
            let _guard = lock.lock().await;
            self.rebuild_under_lock(hash, events, now).await
        };
        self.prune_lock(hash, lock).await;
        result
    }

    async fn rebuild_under_lock(
        &self,
        hash: OrderHash,
        events: &[OrderEvent],
        now: DateTime<Utc>,
    ) -> Result<Option<CanonicalOrder>, CoreError> {
        for attempt in 0..2 {
            let existing = self.store.find_by_hash(&hash).await?;
            let Some(mut rebuilt) = replay(events, now)? else {
                debug!(hash = %hash, "no surviving events, aggregate left untouched");
                return Ok(None);
            };
            rebuilt.version = existing.as_ref().map_or(0, |e| e.version);
            if existing.as_ref() == Some(&rebuilt) {
                // Replay landed on the stored state; nothing to write.
                return Ok(existing);
            }
            match self.store.save(rebuilt).await {
                Ok(stored) => return Ok(Some(stored)),
                Err(StoreError::VersionConflict(_)) if attempt == 0 => {
                    warn!(hash = %hash, "version conflict during rebuild, retrying");
                }
                Err(StoreError::VersionConflict(_)) => {
                    return Err(CoreError::ReconciliationConflict(hash.to_string()));
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(CoreError::ReconciliationConflict(hash.to_string()))
    }

    /// Updates one aggregate under its hash lock, retrying a lost
    /// version race once against a fresh read.
    async fn update(
        &self,
        hash: OrderHash,
        event: &OrderEvent,
    ) -> Result<Option<CanonicalOrder>, CoreError> {
        let lock = self.lock_for(hash).await;
        let result = {
            let _guard = lock.lock().await;
            self.update_under_lock(hash, event).await
        };
        self.prune_lock(hash, lock).await;
        result
    }

    async fn update_under_lock(
        &self,
        hash: OrderHash,
        event: &OrderEvent,
    ) -> Result<Option<CanonicalOrder>, CoreError> {
        let now = Utc::now();
        for attempt in 0..2 {
            let existing = self.store.find_by_hash(&hash).await?;
            let Some(next) = transition(existing, event, now) else {
                return Ok(None);
            };
            check(&next)?;
            match self.store.save(next).await {
                Ok(stored) => return Ok(Some(stored)),
                Err(StoreError::VersionConflict(_)) if attempt == 0 => {
                    warn!(hash = %hash, "version conflict, retrying against fresh read");
                }
                Err(StoreError::VersionConflict(_)) => {
                    return Err(CoreError::ReconciliationConflict(hash.to_string()));
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(CoreError::ReconciliationConflict(hash.to_string()))
    }

    async fn lock_for(&self, hash: OrderHash) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(hash).or_default().clone()
    }

    /// Drops the caller's lock handle and removes the map entry once no
    /// other task holds it, so the map stays bounded by the number of
    /// in-flight updates rather than the number of hashes ever seen.
    async fn prune_lock(&self, hash: OrderHash, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        drop(lock);
        if locks.get(&hash).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&hash);
        }
    }

    #[cfg(test)]
    async fn lock_count(&self) -> usize {
        self.locks.lock().await.len()
    }
}

/// Replays an order's full event history into a fresh aggregate.
///
/// Uses the same transition function as the live path, so the result
/// must agree with incrementally reconciled state.
///
/// # Errors
///
/// [`CoreError::InconsistentAggregate`] when an intermediate state
/// violates an aggregate invariant.
pub fn replay(
    events: &[OrderEvent],
    now: DateTime<Utc>,
) -> Result<Option<CanonicalOrder>, CoreError> {
    let mut state: Option<CanonicalOrder> = None;
    for event in events {
        if let Some(next) = transition(state.clone(), event, now) {
            check(&next)?;
            state = Some(next);
        }
    }
    Ok(state)
}

/// The pure aggregate transition. Returns None when the event changes
/// nothing, so idempotent re-delivery never burns a version.
fn transition(
    existing: Option<CanonicalOrder>,
    event: &OrderEvent,
    now: DateTime<Utc>,
) -> Option<CanonicalOrder> {
    match (existing, event) {
        (None, OrderEvent::Upsert(version)) => {
            Some(CanonicalOrder::from_version(version.clone(), now))
        }
        (None, _) => {
            // Fills and cancels for unknown orders wait for the upsert.
            None
        }
        (Some(order), OrderEvent::Upsert(version)) => merge_snapshot(order, version, now),
        (Some(order), OrderEvent::Fill { fill, date, .. }) => apply_fill(order, *fill, *date),
        (Some(order), OrderEvent::Cancel { date, .. }) => apply_cancel(order, *date),
        (Some(order), OrderEvent::NonceBump {
            maker, min_nonce, ..
        }) => {
            if order.maker == *maker && order.nonce < *min_nonce {
                apply_cancel(order, now)
            } else {
                None
            }
        }
    }
}

/// Refreshes mutable snapshot fields on an existing aggregate.
///
/// Terminal states never reopen; re-delivery of an identical snapshot
/// is a no-op.
fn merge_snapshot(
    mut order: CanonicalOrder,
    version: &OrderVersion,
    now: DateTime<Utc>,
) -> Option<CanonicalOrder> {
    let mut changed = false;
    if order.signature.is_none() && version.signature.is_some() {
        order.signature.clone_from(&version.signature);
        changed = true;
    }
    if order.start != version.start || order.end != version.end {
        order.start = version.start;
        order.end = version.end;
        changed = true;
    }
    if !order.status.is_terminal() {
        let recomputed = window_status(&order, now);
        if order.status != recomputed {
            order.status = recomputed;
            changed = true;
        }
    }
    if !changed {
        return None;
    }
    order.last_update_at = now;
    Some(order)
}

/// Applies a cumulative fill observation.
fn apply_fill(
    mut order: CanonicalOrder,
    fill: u128,
    date: DateTime<Utc>,
) -> Option<CanonicalOrder> {
    if order.status == OrderStatus::Cancelled {
        // Late fills on a cancelled order are recorded upstream in the
        // activity history; the aggregate stays cancelled.
        warn!(hash = %order.hash, fill, "fill observed on cancelled order, ignoring");
        return None;
    }
    if fill <= order.fill {
        return None;
    }
    order.fill = fill;
    if order.is_fully_filled() {
        order.status = OrderStatus::Filled;
    }
    order.last_update_at = date;
    Some(order)
}

/// Applies a cancellation.
fn apply_cancel(mut order: CanonicalOrder, date: DateTime<Utc>) -> Option<CanonicalOrder> {
    if order.status.is_terminal() {
        return None;
    }
    order.status = OrderStatus::Cancelled;
    order.last_update_at = date;
    Some(order)
}

/// Validity-window status for a non-terminal aggregate.
fn window_status(order: &CanonicalOrder, now: DateTime<Utc>) -> OrderStatus {
    if order.is_fully_filled() {
        return OrderStatus::Filled;
    }
    if let Some(start) = order.start {
        if now < start {
            return OrderStatus::NotStarted;
        }
    }
    if let Some(end) = order.end {
        if now > end {
            return OrderStatus::Ended;
        }
    }
    OrderStatus::Active
}

/// Aggregate invariants checked before every save.
fn check(order: &CanonicalOrder) -> Result<(), CoreError> {
    if order.fill > order.take.value {
        return Err(CoreError::InconsistentAggregate {
            hash: order.hash.to_string(),
            reason: format!("fill {} exceeds take value {}", order.fill, order.take.value),
        });
    }
    if order.status == OrderStatus::Filled && !order.is_fully_filled() {
        return Err(CoreError::InconsistentAggregate {
            hash: order.hash.to_string(),
            reason: "status is filled below full fill".to_string(),
        });
    }
    Ok(())
}
