//! Renderable route geometry between two resolved points.
//!
//! Routes follow the great circle; there is no road network. Builders sit
//! behind [`RoutePlanner`] so the quote service can take either the plain
//! [`RouteBuilder`] or the LRU-backed [`CachedRouteBuilder`].

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::GeoMathError;
use crate::geo::{distance_km, interpolate_great_circle, BoundingBox, Coordinate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Points per route when the caller does not ask for a specific count.
    pub resolution: usize,
    /// Fraction of the route's span added on every side of the bounding box.
    pub padding_factor: f64,
    /// Minimum padding in degrees, so short trips still get some margin.
    pub min_padding_deg: f64,
    pub cache_capacity: usize,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            resolution: 100,
            padding_factor: 0.1,
            min_padding_deg: 0.005,
            cache_capacity: 256,
        }
    }
}

impl RouteConfig {
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

/// Ordered path from pickup to destination plus a padded box for map fitting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteGeometry {
    points: Vec<Coordinate>,
    bounding_box: BoundingBox,
}

impl RouteGeometry {
    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    pub fn start(&self) -> Option<Coordinate> {
        self.points.first().copied()
    }

    pub fn end(&self) -> Option<Coordinate> {
        self.points.last().copied()
    }

    /// Zero-length trips are a single point.
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 2
    }

    /// Sum of the leg lengths along the path.
    pub fn path_length_km(&self) -> f64 {
        self.points
            .windows(2)
            .map(|leg| distance_km(leg[0], leg[1]))
            .sum()
    }

    /// GeoJSON `Feature` with a `LineString` (or `Point` for a degenerate route).
    pub fn to_geojson(&self) -> Value {
        let coordinates: Vec<[f64; 2]> = self
            .points
            .iter()
            .map(|p| [p.longitude(), p.latitude()])
            .collect();
        let geometry = if self.is_degenerate() {
            json!({ "type": "Point", "coordinates": coordinates.first() })
        } else {
            json!({ "type": "LineString", "coordinates": coordinates })
        };
        let bbox = self.bounding_box;
        json!({
            "type": "Feature",
            "bbox": [
                bbox.south_west.longitude(),
                bbox.south_west.latitude(),
                bbox.north_east.longitude(),
                bbox.north_east.latitude(),
            ],
            "geometry": geometry,
            "properties": {
                "distanceKm": self.path_length_km(),
                "pointCount": self.points.len(),
            },
        })
    }
}

pub trait RoutePlanner: Send + Sync {
    fn build(
        &self,
        pickup: Coordinate,
        destination: Coordinate,
        resolution: usize,
    ) -> Result<RouteGeometry, GeoMathError>;

    fn default_resolution(&self) -> usize;
}

#[derive(Debug, Clone, Default)]
pub struct RouteBuilder {
    config: RouteConfig,
}

impl RouteBuilder {
    pub fn new(config: RouteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    fn fit(&self, points: Vec<Coordinate>) -> Result<RouteGeometry, GeoMathError> {
        let bounding_box = BoundingBox::enclosing(&points)
            .ok_or_else(|| GeoMathError::InvalidInput("route has no points".to_string()))?
            .padded(self.config.padding_factor, self.config.min_padding_deg);
        Ok(RouteGeometry {
            points,
            bounding_box,
        })
    }
}

impl RoutePlanner for RouteBuilder {
    fn build(
        &self,
        pickup: Coordinate,
        destination: Coordinate,
        resolution: usize,
    ) -> Result<RouteGeometry, GeoMathError> {
        if pickup == destination {
            return self.fit(vec![pickup]);
        }
        let points = interpolate_great_circle(pickup, destination, resolution)?;
        self.fit(points)
    }

    fn default_resolution(&self) -> usize {
        self.config.resolution
    }
}

type RouteKey = (u64, u64, u64, u64, usize);

/// Caches built routes by exact endpoints and resolution.
pub struct CachedRouteBuilder {
    inner: Box<dyn RoutePlanner>,
    cache: Mutex<LruCache<RouteKey, RouteGeometry>>,
}

impl CachedRouteBuilder {
    pub fn new(inner: Box<dyn RoutePlanner>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn from_config(config: RouteConfig) -> Self {
        let capacity = config.cache_capacity;
        Self::new(Box::new(RouteBuilder::new(config)), capacity)
    }

    pub fn cached_routes(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}

fn route_key(pickup: Coordinate, destination: Coordinate, resolution: usize) -> RouteKey {
    (
        pickup.longitude().to_bits(),
        pickup.latitude().to_bits(),
        destination.longitude().to_bits(),
        destination.latitude().to_bits(),
        resolution,
    )
}

impl RoutePlanner for CachedRouteBuilder {
    fn build(
        &self,
        pickup: Coordinate,
        destination: Coordinate,
        resolution: usize,
    ) -> Result<RouteGeometry, GeoMathError> {
        let key = route_key(pickup, destination, resolution);
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(route) = cache.get(&key) {
                debug!(resolution, "route cache hit");
                return Ok(route.clone());
            }
        }

        let route = self.inner.build(pickup, destination, resolution)?;
        // A poisoned cache only costs us the memo.
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, route.clone());
        }
        Ok(route)
    }

    fn default_resolution(&self) -> usize {
        self.inner.default_resolution()
    }
}
