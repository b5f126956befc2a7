//! Location resolution: free text to coordinates, plus the device's own position.
//!
//! [`LocationResolver`] wraps a pluggable [`Gazetteer`] (forward and reverse
//! geocoding) and an optional [`DeviceLocator`]. It enforces the minimum query
//! length, the geographic bias and result cap, and caches successful lookups by
//! normalized query for the lifetime of the resolver.
//!
//! Gazetteer implementations:
//!
//! - **`StaticGazetteer`**: in-memory table of well-known Indian places. Zero dependencies.
//! - **`NominatimGazetteer`** (feature `nominatim`): OpenStreetMap Nominatim over HTTP.
//!
//! Debouncing of keystroke-driven lookups lives in [`debounce`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ResolverError;
use crate::geo::{BoundingBox, Coordinate};

pub mod debounce;
pub mod device;
#[cfg(feature = "nominatim")]
pub mod nominatim;
pub mod static_gazetteer;

pub use debounce::{Dispatch, FieldId, RequestId, SearchDebouncer, SearchOutcome, Submission};
pub use device::{
    DeviceError, DeviceLocator, FailingLocator, FixedLocator, InFlightLocate, PositionOptions,
};
pub use static_gazetteer::StaticGazetteer;

/// India, as (min_lon, min_lat, max_lon, max_lat).
pub const INDIA_BOUNDS: (f64, f64, f64, f64) =
    (68.1766451354, 7.96553477623, 97.4025614766, 35.4940095078);

/// New Delhi, used when the device position is unavailable.
pub const DEFAULT_CENTER: (f64, f64) = (77.2090, 28.6139);

/// Where a [`Location`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocationSource {
    Resolved,
    CurrentDevice,
    Unresolved,
}

/// A named place. Immutable; a new query produces a new `Location`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub display_name: String,
    pub coordinate: Coordinate,
    pub source: LocationSource,
}

/// One gazetteer match, as returned by the external collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct GazetteerHit {
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address_components: BTreeMap<String, String>,
}

impl GazetteerHit {
    fn into_location(self, source: LocationSource) -> Result<Location, ResolverError> {
        let coordinate = Coordinate::new(self.longitude, self.latitude).map_err(|err| {
            ResolverError::Network(format!("malformed gazetteer coordinate: {err}"))
        })?;
        Ok(Location {
            display_name: self.display_name,
            coordinate,
            source,
        })
    }
}

/// Forward search request sent to a gazetteer.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub country_codes: String,
    pub limit: usize,
    pub viewbox: Option<BoundingBox>,
    /// Restrict results to `viewbox` instead of merely preferring it.
    pub bounded: bool,
}

/// Forward and reverse geocoding backend. Must be `Send + Sync` so one
/// resolver can serve concurrent readers.
pub trait Gazetteer: Send + Sync {
    fn search(&self, request: &SearchRequest) -> Result<Vec<GazetteerHit>, ResolverError>;

    /// Name the place at `coordinate`. `Ok(None)` when nothing is known there.
    fn reverse(&self, coordinate: Coordinate) -> Result<Option<GazetteerHit>, ResolverError>;
}

impl<G: Gazetteer + ?Sized> Gazetteer for Arc<G> {
    fn search(&self, request: &SearchRequest) -> Result<Vec<GazetteerHit>, ResolverError> {
        (**self).search(request)
    }

    fn reverse(&self, coordinate: Coordinate) -> Result<Option<GazetteerHit>, ResolverError> {
        (**self).reverse(coordinate)
    }
}

/// Resolver tuning. Durations are in milliseconds so the struct stays plain JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub min_query_len: usize,
    pub debounce_ms: u64,
    pub result_limit: usize,
    pub country_codes: String,
    /// (min_lon, min_lat, max_lon, max_lat)
    pub bias_bounds: Option<(f64, f64, f64, f64)>,
    pub bounded: bool,
    pub search_timeout_ms: u64,
    pub reverse_timeout_ms: u64,
    pub device_timeout_ms: u64,
    pub device_max_cache_age_ms: u64,
    pub device_high_accuracy: bool,
    /// (lon, lat) used when the device position cannot be obtained.
    pub fallback_center: (f64, f64),
    pub fallback_label: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_query_len: 2,
            debounce_ms: 300,
            result_limit: 5,
            country_codes: "in".to_string(),
            bias_bounds: Some(INDIA_BOUNDS),
            bounded: true,
            search_timeout_ms: 8_000,
            reverse_timeout_ms: 10_000,
            device_timeout_ms: 10_000,
            device_max_cache_age_ms: 60_000,
            device_high_accuracy: true,
            fallback_center: DEFAULT_CENTER,
            fallback_label: "Map center".to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit;
        self
    }

    pub fn with_device_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.device_timeout_ms = timeout_ms;
        self
    }

    /// Drop the geographic bias entirely.
    pub fn unbiased(mut self) -> Self {
        self.bias_bounds = None;
        self.bounded = false;
        self.country_codes.clear();
        self
    }

    pub fn bias_box(&self) -> Option<BoundingBox> {
        let (min_lon, min_lat, max_lon, max_lat) = self.bias_bounds?;
        BoundingBox::from_bounds(min_lon, min_lat, max_lon, max_lat).ok()
    }

    pub fn position_options(&self) -> PositionOptions {
        PositionOptions {
            high_accuracy: self.device_high_accuracy,
            timeout: Duration::from_millis(self.device_timeout_ms),
            max_cache_age: Duration::from_millis(self.device_max_cache_age_ms),
        }
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn reverse_timeout(&self) -> Duration {
        Duration::from_millis(self.reverse_timeout_ms)
    }
}

/// Lowercased, trimmed, whitespace-collapsed cache key.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fallback display name for a device fix that could not be reverse-geocoded.
pub fn current_location_label(coordinate: Coordinate) -> String {
    format!(
        "Current Location ({:.4}, {:.4})",
        coordinate.latitude(),
        coordinate.longitude()
    )
}

pub struct LocationResolver {
    gazetteer: Box<dyn Gazetteer>,
    locator: Option<Arc<dyn DeviceLocator>>,
    device_request: InFlightLocate,
    config: ResolverConfig,
    cache: RwLock<HashMap<String, Vec<Location>>>,
}

impl LocationResolver {
    pub fn new(gazetteer: Box<dyn Gazetteer>, config: ResolverConfig) -> Self {
        Self {
            gazetteer,
            locator: None,
            device_request: InFlightLocate::default(),
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_locator(mut self, locator: Arc<dyn DeviceLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Helper threads started for device position requests so far.
    pub fn device_requests_started(&self) -> usize {
        self.device_request.started()
    }

    /// Number of cached queries.
    pub fn cached_queries(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Resolve free text to at most `result_limit` locations.
    ///
    /// Queries shorter than `min_query_len`, and any query when `result_limit`
    /// is zero, return an empty result without a lookup. Zero matches is an
    /// empty `Ok`, not an error.
    pub fn resolve(&self, query: &str) -> Result<Vec<Location>, ResolverError> {
        let key = normalize_query(query);
        if key.chars().count() < self.config.min_query_len || self.config.result_limit == 0 {
            return Ok(Vec::new());
        }

        if let Some(hit) = self.cached(&key) {
            debug!(query = %key, "resolver cache hit");
            return Ok(hit);
        }

        let request = SearchRequest {
            query: query.trim().to_string(),
            country_codes: self.config.country_codes.clone(),
            limit: self.config.result_limit,
            viewbox: self.config.bias_box(),
            bounded: self.config.bounded,
        };
        debug!(query = %request.query, limit = request.limit, "dispatching gazetteer search");
        let hits = self.gazetteer.search(&request)?;

        let mut locations = Vec::with_capacity(hits.len().min(request.limit));
        for hit in hits {
            if locations.len() >= request.limit {
                break;
            }
            let location = hit.into_location(LocationSource::Resolved)?;
            let in_bounds = match (&request.viewbox, request.bounded) {
                (Some(bbox), true) => bbox.contains(location.coordinate),
                _ => true,
            };
            if in_bounds {
                locations.push(location);
            }
        }

        Ok(self.store(key, locations))
    }

    /// Name the place at `coordinate`.
    pub fn reverse(&self, coordinate: Coordinate) -> Result<Option<Location>, ResolverError> {
        match self.gazetteer.reverse(coordinate)? {
            Some(hit) => Ok(Some(Location {
                display_name: hit.display_name,
                coordinate,
                source: LocationSource::Resolved,
            })),
            None => Ok(None),
        }
    }

    /// Ask the device for its position and name it.
    ///
    /// The device call is bounded by `device_timeout_ms`. A locator that hangs
    /// keeps one request in flight; later calls wait on that request instead of
    /// starting another. If naming fails after a successful fix, the location
    /// keeps the fix and gets a coordinate label.
    pub fn resolve_current_device(&self) -> Result<Location, ResolverError> {
        let locator = self.locator.as_ref().ok_or(ResolverError::Unsupported)?;
        let coordinate = self
            .device_request
            .locate(locator, self.config.position_options())?;

        let display_name = match self.gazetteer.reverse(coordinate) {
            Ok(Some(hit)) => hit.display_name,
            Ok(None) => current_location_label(coordinate),
            Err(err) => {
                warn!(error = %err, "reverse lookup failed for device position");
                current_location_label(coordinate)
            }
        };

        Ok(Location {
            display_name,
            coordinate,
            source: LocationSource::CurrentDevice,
        })
    }

    /// [`resolve_current_device`](Self::resolve_current_device), degrading to the
    /// configured map centre instead of failing.
    pub fn resolve_current_device_or_center(&self) -> Location {
        match self.resolve_current_device() {
            Ok(location) => location,
            Err(err) => {
                warn!(error = %err, "device position unavailable, using map center");
                let (lon, lat) = self.config.fallback_center;
                let coordinate = Coordinate::new(lon, lat).unwrap_or_else(|_| {
                    Coordinate::clamped(DEFAULT_CENTER.0, DEFAULT_CENTER.1)
                });
                Location {
                    display_name: self.config.fallback_label.clone(),
                    coordinate,
                    source: LocationSource::Unresolved,
                }
            }
        }
    }

    fn cached(&self, key: &str) -> Option<Vec<Location>> {
        self.cache.read().ok()?.get(key).cloned()
    }

    /// First writer wins; a later duplicate returns the stored value.
    fn store(&self, key: String, locations: Vec<Location>) -> Vec<Location> {
        match self.cache.write() {
            Ok(mut cache) => cache.entry(key).or_insert(locations).clone(),
            Err(_) => locations,
        }
    }
}
