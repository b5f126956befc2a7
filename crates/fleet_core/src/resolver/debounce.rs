//! Debounced, per-field location search.
//!
//! Each input field (pickup, destination, ...) has at most one pending query.
//! A new submission re-arms the field's quiet-period timer, so only the last
//! query typed within the window is ever dispatched. Results are accepted only
//! for the field's latest request; anything superseded in flight is dropped.
//!
//! The debouncer never reads the clock. The caller passes `now_ms` to
//! [`SearchDebouncer::submit`] and [`SearchDebouncer::due`] /
//! [`SearchDebouncer::poll`] from whatever timer it owns.

use std::collections::HashMap;

use tracing::debug;

use super::{normalize_query, Location, LocationResolver, ResolverConfig};
use crate::clock::TimerQueue;
use crate::error::ResolverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    Pickup,
    Destination,
    Other(u32),
}

/// Identity of one submission. Later submissions have larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The lookup will be dispatched once the field has been quiet long enough.
    Scheduled { request: RequestId, due_ms: u64 },
    /// The query is too short; the field has no suggestions and nothing is pending.
    Cleared,
}

/// A lookup handed out for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub field: FieldId,
    pub request: RequestId,
    pub query: String,
}

/// The accepted result of a dispatched lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub field: FieldId,
    pub request: RequestId,
    pub query: String,
    pub result: Result<Vec<Location>, ResolverError>,
}

#[derive(Debug)]
pub struct SearchDebouncer {
    timers: TimerQueue<FieldId>,
    latest: HashMap<FieldId, (RequestId, String)>,
    quiet_ms: u64,
    min_query_len: usize,
}

impl SearchDebouncer {
    pub fn new(quiet_ms: u64, min_query_len: usize) -> Self {
        Self {
            timers: TimerQueue::new(),
            latest: HashMap::new(),
            quiet_ms,
            min_query_len,
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(config.debounce_ms, config.min_query_len)
    }

    /// Record the field's new text and restart its quiet period.
    pub fn submit(&mut self, field: FieldId, query: &str, now_ms: u64) -> Submission {
        if normalize_query(query).chars().count() < self.min_query_len {
            self.cancel(field);
            return Submission::Cleared;
        }

        let due_ms = now_ms.saturating_add(self.quiet_ms);
        let request = RequestId(self.timers.arm(field, due_ms));
        self.latest.insert(field, (request, query.trim().to_string()));
        Submission::Scheduled { request, due_ms }
    }

    /// Lookups whose quiet period has elapsed. Each request is handed out once.
    pub fn due(&mut self, now_ms: u64) -> Vec<Dispatch> {
        self.timers
            .pop_due(now_ms)
            .into_iter()
            .filter_map(|(field, generation)| {
                let (request, query) = self.latest.get(&field)?;
                (request.0 == generation).then(|| Dispatch {
                    field,
                    request: *request,
                    query: query.clone(),
                })
            })
            .collect()
    }

    /// Accept a finished lookup if it is still the field's latest request.
    pub fn complete(
        &mut self,
        dispatch: &Dispatch,
        result: Result<Vec<Location>, ResolverError>,
    ) -> Option<SearchOutcome> {
        match self.latest.get(&dispatch.field) {
            Some((request, _)) if *request == dispatch.request => {
                self.latest.remove(&dispatch.field);
                Some(SearchOutcome {
                    field: dispatch.field,
                    request: dispatch.request,
                    query: dispatch.query.clone(),
                    result,
                })
            }
            _ => {
                debug!(
                    field = ?dispatch.field,
                    query = %dispatch.query,
                    "discarding superseded search result"
                );
                None
            }
        }
    }

    /// Dispatch everything due through `resolver` and return the accepted results.
    pub fn poll(&mut self, now_ms: u64, resolver: &LocationResolver) -> Vec<SearchOutcome> {
        self.due(now_ms)
            .into_iter()
            .filter_map(|dispatch| {
                debug!(field = ?dispatch.field, query = %dispatch.query, "debounce window elapsed");
                let result = resolver.resolve(&dispatch.query);
                self.complete(&dispatch, result)
            })
            .collect()
    }

    /// Drop the field's pending timer and any in-flight result.
    pub fn cancel(&mut self, field: FieldId) {
        self.timers.cancel(field);
        self.latest.remove(&field);
    }

    /// Tear down every field, e.g. when the consumer goes away.
    pub fn cancel_all(&mut self) {
        self.timers.cancel_all();
        self.latest.clear();
    }

    /// Earliest pending deadline, for callers that sleep until the next dispatch.
    pub fn next_due(&mut self) -> Option<u64> {
        self.timers.next_due()
    }

    pub fn is_pending(&self, field: FieldId) -> bool {
        self.timers.is_armed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_last_query_in_the_window_is_dispatched() {
        let mut debouncer = SearchDebouncer::new(300, 2);
        debouncer.submit(FieldId::Pickup, "Ma", 0);
        debouncer.submit(FieldId::Pickup, "Mum", 120);
        debouncer.submit(FieldId::Pickup, "Mumbai", 250);

        assert!(debouncer.due(549).is_empty());
        let dispatched = debouncer.due(550);
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].query, "Mumbai");
        assert!(debouncer.due(10_000).is_empty());
    }

    #[test]
    fn short_queries_clear_the_field() {
        let mut debouncer = SearchDebouncer::new(300, 2);
        debouncer.submit(FieldId::Destination, "Chennai", 0);
        assert_eq!(
            debouncer.submit(FieldId::Destination, "C", 100),
            Submission::Cleared
        );
        assert!(!debouncer.is_pending(FieldId::Destination));
        assert!(debouncer.due(1_000).is_empty());
    }

    #[test]
    fn fields_debounce_independently() {
        let mut debouncer = SearchDebouncer::new(300, 2);
        debouncer.submit(FieldId::Pickup, "Mumbai", 0);
        debouncer.submit(FieldId::Destination, "Chennai", 100);
        let first = debouncer.due(300);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].field, FieldId::Pickup);
        assert_eq!(debouncer.next_due(), Some(400));
    }

    #[test]
    fn superseded_in_flight_results_are_discarded() {
        let mut debouncer = SearchDebouncer::new(300, 2);
        debouncer.submit(FieldId::Pickup, "Kolkata", 0);
        let stale = debouncer.due(300).remove(0);

        debouncer.submit(FieldId::Pickup, "Kolkata Airport", 310);
        assert!(debouncer.complete(&stale, Ok(Vec::new())).is_none());

        let fresh = debouncer.due(610).remove(0);
        let outcome = debouncer.complete(&fresh, Ok(Vec::new())).expect("accepted");
        assert_eq!(outcome.query, "Kolkata Airport");
        // A result is accepted at most once.
        assert!(debouncer.complete(&fresh, Ok(Vec::new())).is_none());
    }

    #[test]
    fn cancel_all_drops_pending_and_in_flight() {
        let mut debouncer = SearchDebouncer::new(300, 2);
        debouncer.submit(FieldId::Pickup, "Hyderabad", 0);
        debouncer.submit(FieldId::Other(7), "Bangalore", 0);
        let in_flight = debouncer.due(300);
        debouncer.submit(FieldId::Destination, "Chennai", 300);
        debouncer.cancel_all();

        for dispatch in &in_flight {
            assert!(debouncer.complete(dispatch, Ok(Vec::new())).is_none());
        }
        assert!(debouncer.due(5_000).is_empty());
    }
}
