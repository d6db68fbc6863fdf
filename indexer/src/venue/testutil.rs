//! In-memory venue fixture for syncer and prober tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::types::{VenueEvent, VenueOrder};
use super::{EventsRequest, OrdersRequest, Venue, VenueApi, VenueError, VenuePage};

/// A scripted venue serving fixed records, newest first.
///
/// Cursors are plain offsets into the record list, which mimics the
/// native-id cursors real feeds hand out. Calls can be scripted to
/// fail, and new records can be injected between runs.
pub struct FixtureVenue {
    venue: Venue,
    orders: Mutex<Vec<VenueOrder>>,
    events: Mutex<Vec<VenueEvent>>,
    calls: AtomicUsize,
    fail_on_call: Mutex<Option<usize>>,
}

impl FixtureVenue {
    /// Creates a fixture with the given newest-first order list.
    pub fn new(venue: Venue, orders: Vec<VenueOrder>) -> Self {
        Self {
            venue,
            orders: Mutex::new(orders),
            events: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_on_call: Mutex::new(None),
        }
    }

    /// Replaces the event list.
    pub fn set_events(&self, events: Vec<VenueEvent>) {
        *self.events.lock().expect("events lock") = events;
    }

    /// Prepends records, as a venue would between runs.
    pub fn prepend_orders(&self, mut newer: Vec<VenueOrder>) {
        let mut orders = self.orders.lock().expect("orders lock");
        newer.extend(orders.drain(..));
        *orders = newer;
    }

    /// Makes the n-th fetch (1-based, counted across feeds) fail.
    pub fn fail_on_call(&self, n: usize) {
        *self.fail_on_call.lock().expect("fail lock") = Some(n);
    }

    /// Number of fetches served or failed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn check_failure(&self) -> Result<(), VenueError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        let fail_on = *self.fail_on_call.lock().expect("fail lock");
        if fail_on == Some(call) {
            return Err(VenueError::Http("scripted failure".to_string()));
        }
        Ok(())
    }

    fn page<T: Clone>(records: &[T], first: usize, cursor: Option<&str>) -> VenuePage<T> {
        let offset: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (offset + first).min(records.len());
        let data = records.get(offset..end).map(<[T]>::to_vec).unwrap_or_default();
        let next_cursor = (end < records.len()).then(|| end.to_string());
        VenuePage { data, next_cursor }
    }
}

#[async_trait]
impl VenueApi for FixtureVenue {
    fn venue(&self) -> Venue {
        self.venue
    }

    async fn list_orders(
        &self,
        request: &OrdersRequest,
    ) -> Result<VenuePage<VenueOrder>, VenueError> {
        self.check_failure()?;
        let orders = self.orders.lock().expect("orders lock");
        let filtered: Vec<VenueOrder> = orders
            .iter()
            .filter(|o| {
                request
                    .collection
                    .as_ref()
                    .is_none_or(|c| o.collection.eq_ignore_ascii_case(c))
                    && request
                        .token_id
                        .as_ref()
                        .is_none_or(|t| o.token_id.as_deref() == Some(t.as_str()))
                    && request.side.is_none_or(|s| o.side == s)
            })
            .cloned()
            .collect();
        Ok(Self::page(
            &filtered,
            request.pagination.first,
            request.pagination.cursor.as_deref(),
        ))
    }

    async fn list_events(
        &self,
        request: &EventsRequest,
    ) -> Result<VenuePage<VenueEvent>, VenueError> {
        self.check_failure()?;
        let events = self.events.lock().expect("events lock");
        let filtered: Vec<VenueEvent> = events
            .iter()
            .filter(|e| request.kind.is_none_or(|k| e.kind == k))
            .cloned()
            .collect();
        Ok(Self::page(
            &filtered,
            request.pagination.first,
            request.pagination.cursor.as_deref(),
        ))
    }
}
