//! Shared fixtures for unit tests, integration tests and benches.
//!
//! Everything here works offline: gazetteers are in-memory and device
//! locators answer immediately.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::ResolverError;
use crate::geo::Coordinate;
use crate::resolver::{
    Gazetteer, GazetteerHit, LocationResolver, ResolverConfig, SearchRequest, StaticGazetteer,
};

/// Connaught Place, New Delhi.
pub const TEST_CENTER: (f64, f64) = (77.2167, 28.6315);

/// Chhatrapati Shivaji Maharaj International Airport, Mumbai.
pub const TEST_PICKUP: (f64, f64) = (72.8679, 19.0896);

/// Chennai Central railway station.
pub const TEST_DESTINATION: (f64, f64) = (80.2755, 13.0827);

/// Build a coordinate from a `(lon, lat)` fixture.
///
/// # Panics
///
/// Panics if the fixture is out of range (should never happen for the constants above).
pub fn coordinate(fixture: (f64, f64)) -> Coordinate {
    Coordinate::new(fixture.0, fixture.1).expect("fixture coordinate should be valid")
}

pub fn test_center() -> Coordinate {
    coordinate(TEST_CENTER)
}

/// Gazetteer wrapper that records every forward query it receives.
pub struct RecordingGazetteer<G = StaticGazetteer> {
    inner: G,
    searches: Mutex<Vec<String>>,
    reverses: AtomicUsize,
}

impl<G: Gazetteer> RecordingGazetteer<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            searches: Mutex::new(Vec::new()),
            reverses: AtomicUsize::new(0),
        }
    }

    /// Queries in dispatch order.
    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn search_count(&self) -> usize {
        self.searches.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn reverse_count(&self) -> usize {
        self.reverses.load(Ordering::SeqCst)
    }
}

impl RecordingGazetteer<StaticGazetteer> {
    pub fn india_popular() -> Arc<Self> {
        Arc::new(Self::new(StaticGazetteer::india_popular()))
    }
}

impl<G: Gazetteer> Gazetteer for RecordingGazetteer<G> {
    fn search(&self, request: &SearchRequest) -> Result<Vec<GazetteerHit>, ResolverError> {
        if let Ok(mut searches) = self.searches.lock() {
            searches.push(request.query.clone());
        }
        self.inner.search(request)
    }

    fn reverse(&self, coordinate: Coordinate) -> Result<Option<GazetteerHit>, ResolverError> {
        self.reverses.fetch_add(1, Ordering::SeqCst);
        self.inner.reverse(coordinate)
    }
}

/// Gazetteer that fails its first searches with scripted errors, then
/// delegates to the popular-places table.
pub struct ScriptedGazetteer {
    failures: Mutex<VecDeque<ResolverError>>,
    inner: StaticGazetteer,
    calls: AtomicUsize,
}

impl ScriptedGazetteer {
    pub fn failing_with(failures: impl IntoIterator<Item = ResolverError>) -> Arc<Self> {
        Arc::new(Self {
            failures: Mutex::new(failures.into_iter().collect()),
            inner: StaticGazetteer::india_popular(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Gazetteer for ScriptedGazetteer {
    fn search(&self, request: &SearchRequest) -> Result<Vec<GazetteerHit>, ResolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.failures.lock().ok().and_then(|mut f| f.pop_front());
        match scripted {
            Some(err) => Err(err),
            None => self.inner.search(request),
        }
    }

    fn reverse(&self, coordinate: Coordinate) -> Result<Option<GazetteerHit>, ResolverError> {
        self.inner.reverse(coordinate)
    }
}

/// Resolver over the popular-places table with default settings.
pub fn offline_resolver() -> LocationResolver {
    LocationResolver::new(
        Box::new(StaticGazetteer::india_popular()),
        ResolverConfig::default(),
    )
}

/// Resolver over any shared gazetteer, so the test keeps a handle for assertions.
pub fn resolver_over<G: Gazetteer + 'static>(gazetteer: Arc<G>) -> LocationResolver {
    LocationResolver::new(Box::new(gazetteer), ResolverConfig::default())
}
