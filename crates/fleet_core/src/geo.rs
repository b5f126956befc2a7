//! Geographic primitives: coordinates, Haversine distance, bearings and
//! great-circle interpolation.
//!
//! All functions are pure and allocation-free except [`interpolate_great_circle`],
//! which returns an owned path.

use serde::{Deserialize, Serialize};

use crate::error::GeoMathError;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Below this angular separation (radians) interpolation falls back to a
/// straight lon/lat blend; `sin(d)` is too small to divide by.
const MIN_SLERP_ANGLE_RAD: f64 = 1e-9;

/// A WGS-84 position in degrees. Longitude in [-180, 180], latitude in [-90, 90].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    longitude: f64,
    latitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    longitude: f64,
    latitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = GeoMathError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.longitude, raw.latitude)
    }
}

impl Coordinate {
    /// Validate and build a coordinate. NaN or out-of-range values are rejected.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, GeoMathError> {
        let valid = (-180.0..=180.0).contains(&longitude) && (-90.0..=90.0).contains(&latitude);
        if !valid {
            return Err(GeoMathError::InvalidCoordinate {
                longitude,
                latitude,
            });
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }

    /// Build from values produced by trigonometry, which can overshoot the
    /// valid range by an ulp.
    pub(crate) fn clamped(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude: longitude.clamp(-180.0, 180.0),
            latitude: latitude.clamp(-90.0, 90.0),
        }
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Haversine great-circle distance in kilometres.
///
/// Symmetric and exactly zero for identical inputs.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lon1) = (a.latitude.to_radians(), a.longitude.to_radians());
    let (lat2, lon2) = (b.latitude.to_radians(), b.longitude.to_radians());
    let sin_dlat = ((lat2 - lat1) * 0.5).sin();
    let sin_dlon = ((lon2 - lon1) * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Initial bearing from `from` towards `to`, in degrees clockwise from north [0, 360).
pub fn initial_bearing_deg(from: Coordinate, to: Coordinate) -> f64 {
    let (lat1, lat2) = (from.latitude.to_radians(), to.latitude.to_radians());
    let dlon = (to.longitude - from.longitude).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Point reached by travelling `distance_km` from `origin` along `bearing_deg`.
pub fn destination_point(origin: Coordinate, bearing_deg: f64, distance_km: f64) -> Coordinate {
    let delta = distance_km / EARTH_RADIUS_KM;
    let theta = bearing_deg.to_radians();
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    Coordinate::clamped(normalize_longitude(lon2.to_degrees()), lat2.to_degrees())
}

fn normalize_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 540.0) % 360.0 - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// `n` points evenly spaced along the shortest great-circle arc from `a` to `b`.
///
/// `points[0] == a` and `points[n - 1] == b` exactly. Fails for `n < 2`,
/// identical endpoints, and antipodal endpoints (no unique shortest arc).
pub fn interpolate_great_circle(
    a: Coordinate,
    b: Coordinate,
    n: usize,
) -> Result<Vec<Coordinate>, GeoMathError> {
    if n < 2 {
        return Err(GeoMathError::InvalidInput(format!(
            "interpolation needs at least 2 points, got {n}"
        )));
    }
    if a == b {
        return Err(GeoMathError::InvalidInput(
            "interpolation endpoints are identical".to_string(),
        ));
    }

    let angle = distance_km(a, b) / EARTH_RADIUS_KM;
    if (std::f64::consts::PI - angle).abs() < 1e-9 {
        return Err(GeoMathError::InvalidInput(
            "interpolation endpoints are antipodal".to_string(),
        ));
    }

    let mut points = Vec::with_capacity(n);
    points.push(a);
    let last = (n - 1) as f64;
    for i in 1..n - 1 {
        let fraction = i as f64 / last;
        let point = if angle < MIN_SLERP_ANGLE_RAD {
            Coordinate::clamped(
                a.longitude + (b.longitude - a.longitude) * fraction,
                a.latitude + (b.latitude - a.latitude) * fraction,
            )
        } else {
            slerp(a, b, angle, fraction)
        };
        points.push(point);
    }
    points.push(b);
    Ok(points)
}

fn slerp(a: Coordinate, b: Coordinate, angle: f64, fraction: f64) -> Coordinate {
    let (lat1, lon1) = (a.latitude.to_radians(), a.longitude.to_radians());
    let (lat2, lon2) = (b.latitude.to_radians(), b.longitude.to_radians());
    let sin_angle = angle.sin();
    let wa = ((1.0 - fraction) * angle).sin() / sin_angle;
    let wb = (fraction * angle).sin() / sin_angle;

    let x = wa * lat1.cos() * lon1.cos() + wb * lat2.cos() * lon2.cos();
    let y = wa * lat1.cos() * lon1.sin() + wb * lat2.cos() * lon2.sin();
    let z = wa * lat1.sin() + wb * lat2.sin();

    let lat = z.atan2((x * x + y * y).sqrt());
    let lon = y.atan2(x);
    Coordinate::clamped(lon.to_degrees(), lat.to_degrees())
}

/// Axis-aligned lon/lat box, used for search bias and map fitting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south_west: Coordinate,
    pub north_east: Coordinate,
}

impl BoundingBox {
    /// Box from `(min_lon, min_lat, max_lon, max_lat)` degrees.
    pub fn from_bounds(
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> Result<Self, GeoMathError> {
        Ok(Self {
            south_west: Coordinate::new(min_lon.min(max_lon), min_lat.min(max_lat))?,
            north_east: Coordinate::new(min_lon.max(max_lon), min_lat.max(max_lat))?,
        })
    }

    /// Smallest box containing every point. `None` for an empty slice.
    ///
    /// Points spread across the antimeridian give a wrapped box whose
    /// `south_west` longitude is greater than its `north_east` longitude.
    pub fn enclosing(points: &[Coordinate]) -> Option<Self> {
        let first = points.first()?;
        let (mut west, mut south) = (first.longitude, first.latitude);
        let (mut east, mut north) = (west, south);
        // Westmost point east of Greenwich and eastmost point west of it.
        let mut west_of_positive: Option<f64> = None;
        let mut east_of_negative: Option<f64> = None;
        for point in points {
            west = west.min(point.longitude);
            east = east.max(point.longitude);
            south = south.min(point.latitude);
            north = north.max(point.latitude);
            if point.longitude >= 0.0 {
                west_of_positive =
                    Some(west_of_positive.map_or(point.longitude, |w| w.min(point.longitude)));
            } else {
                east_of_negative =
                    Some(east_of_negative.map_or(point.longitude, |e| e.max(point.longitude)));
            }
        }
        if let (Some(wrapped_west), Some(wrapped_east)) = (west_of_positive, east_of_negative) {
            let wrapped_span = (180.0 - wrapped_west) + (wrapped_east + 180.0);
            if wrapped_span < east - west {
                west = wrapped_west;
                east = wrapped_east;
            }
        }
        Some(Self {
            south_west: Coordinate::clamped(west, south),
            north_east: Coordinate::clamped(east, north),
        })
    }

    /// True when the box wraps through longitude ±180.
    pub fn crosses_antimeridian(&self) -> bool {
        self.south_west.longitude > self.north_east.longitude
    }

    /// East-west extent in degrees, measured eastwards from the west edge.
    pub fn longitude_span(&self) -> f64 {
        let span = self.north_east.longitude - self.south_west.longitude;
        if self.crosses_antimeridian() {
            span + 360.0
        } else {
            span
        }
    }

    /// Grow each side by `factor` of the span, never by less than `min_pad_deg`.
    pub fn padded(&self, factor: f64, min_pad_deg: f64) -> Self {
        let pad_lon = (self.longitude_span() * factor).max(min_pad_deg);
        let pad_lat =
            ((self.north_east.latitude - self.south_west.latitude) * factor).max(min_pad_deg);
        let south = self.south_west.latitude - pad_lat;
        let north = self.north_east.latitude + pad_lat;
        if self.longitude_span() + 2.0 * pad_lon >= 360.0 {
            return Self {
                south_west: Coordinate::clamped(-180.0, south),
                north_east: Coordinate::clamped(180.0, north),
            };
        }
        let (mut west, mut east) = (
            self.south_west.longitude - pad_lon,
            self.north_east.longitude + pad_lon,
        );
        if west < -180.0 || east > 180.0 {
            west = normalize_longitude(west);
            east = normalize_longitude(east);
        }
        Self {
            south_west: Coordinate::clamped(west, south),
            north_east: Coordinate::clamped(east, north),
        }
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        let in_lon = if self.crosses_antimeridian() {
            point.longitude >= self.south_west.longitude
                || point.longitude <= self.north_east.longitude
        } else {
            (self.south_west.longitude..=self.north_east.longitude).contains(&point.longitude)
        };
        in_lon && (self.south_west.latitude..=self.north_east.latitude).contains(&point.latitude)
    }

    pub fn center(&self) -> Coordinate {
        let lon = self.south_west.longitude + self.longitude_span() * 0.5;
        Coordinate::clamped(
            normalize_longitude(lon),
            (self.south_west.latitude + self.north_east.latitude) * 0.5,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delhi() -> Coordinate {
        Coordinate::new(77.2090, 28.6139).expect("valid")
    }

    fn mumbai() -> Coordinate {
        Coordinate::new(72.8777, 19.0760).expect("valid")
    }

    #[test]
    fn rejects_out_of_range_and_nan() {
        assert!(Coordinate::new(181.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, -90.5).is_err());
        assert!(Coordinate::new(f64::NAN, 10.0).is_err());
        assert!(Coordinate::new(-180.0, 90.0).is_ok());
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let (a, b) = (delhi(), mumbai());
        assert_eq!(distance_km(a, b), distance_km(b, a));
        assert_eq!(distance_km(a, a), 0.0);
        // Delhi to Mumbai is roughly 1150 km as the crow flies.
        let d = distance_km(a, b);
        assert!((1100.0..1200.0).contains(&d), "got {d}");
    }

    #[test]
    fn destination_point_travels_requested_distance() {
        let origin = delhi();
        for bearing in [0.0, 45.0, 137.0, 270.0] {
            let moved = destination_point(origin, bearing, 2.5);
            assert!((distance_km(origin, moved) - 2.5).abs() < 1e-6);
        }
    }

    #[test]
    fn bearing_points_north_for_northern_target() {
        let south = Coordinate::new(77.0, 20.0).expect("valid");
        let north = Coordinate::new(77.0, 21.0).expect("valid");
        assert!(initial_bearing_deg(south, north).abs() < 1e-9);
        assert!((initial_bearing_deg(north, south) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn interpolation_keeps_exact_endpoints() {
        for n in [2, 3, 10, 100] {
            let path = interpolate_great_circle(delhi(), mumbai(), n).expect("path");
            assert_eq!(path.len(), n);
            assert_eq!(path[0], delhi());
            assert_eq!(path[n - 1], mumbai());
        }
    }

    #[test]
    fn interpolated_points_are_evenly_spaced() {
        let path = interpolate_great_circle(delhi(), mumbai(), 11).expect("path");
        let total = distance_km(delhi(), mumbai());
        for pair in path.windows(2) {
            assert!((distance_km(pair[0], pair[1]) - total / 10.0).abs() < 1e-3);
        }
    }

    #[test]
    fn interpolation_rejects_degenerate_requests() {
        assert!(matches!(
            interpolate_great_circle(delhi(), mumbai(), 1),
            Err(GeoMathError::InvalidInput(_))
        ));
        assert!(matches!(
            interpolate_great_circle(delhi(), delhi(), 10),
            Err(GeoMathError::InvalidInput(_))
        ));
        let a = Coordinate::new(0.0, 0.0).expect("valid");
        let b = Coordinate::new(180.0, 0.0).expect("valid");
        assert!(interpolate_great_circle(a, b, 5).is_err());
    }

    #[test]
    fn padded_box_contains_unpadded_corners() {
        let bbox = BoundingBox::enclosing(&[delhi(), mumbai()]).expect("bbox");
        let padded = bbox.padded(0.1, 0.005);
        assert!(padded.contains(delhi()));
        assert!(padded.contains(mumbai()));
        assert!(padded.south_west.longitude() < bbox.south_west.longitude());
    }

    #[test]
    fn triangle_inequality_holds_for_random_triples() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0x7121);
        let random_point = |rng: &mut StdRng| {
            Coordinate::new(rng.gen_range(-180.0..=180.0), rng.gen_range(-90.0..=90.0))
                .expect("valid")
        };
        let antipode_near = |rng: &mut StdRng, c: Coordinate| {
            let lat = -c.latitude() + rng.gen_range(-0.5..=0.5);
            let lon = c.longitude() + 180.0 + rng.gen_range(-0.5..=0.5);
            Coordinate::clamped(normalize_longitude(lon), lat)
        };
        let pole = |rng: &mut StdRng| {
            let lat = if rng.gen_bool(0.5) { 90.0 } else { -90.0 };
            Coordinate::new(rng.gen_range(-180.0..=180.0), lat).expect("valid")
        };

        for i in 0..4_000 {
            let (a, b, c) = match i % 4 {
                0 => (random_point(&mut rng), random_point(&mut rng), random_point(&mut rng)),
                1 => {
                    let a = random_point(&mut rng);
                    (a, random_point(&mut rng), antipode_near(&mut rng, a))
                }
                2 => (random_point(&mut rng), pole(&mut rng), random_point(&mut rng)),
                _ => {
                    let a = pole(&mut rng);
                    (a, random_point(&mut rng), antipode_near(&mut rng, a))
                }
            };
            let direct = distance_km(a, c);
            let via = distance_km(a, b) + distance_km(b, c);
            assert!(direct <= via + 1e-9, "{a} {b} {c}: {direct} > {via}");
        }
    }

    #[test]
    fn enclosing_wraps_across_the_antimeridian() {
        let fiji = Coordinate::new(178.4, -18.1).expect("valid");
        let samoa = Coordinate::new(-171.8, -13.8).expect("valid");
        let path = interpolate_great_circle(fiji, samoa, 20).expect("path");
        let bbox = BoundingBox::enclosing(&path).expect("bbox");
        assert!(bbox.crosses_antimeridian());
        assert!(bbox.longitude_span() < 15.0, "span {}", bbox.longitude_span());
        assert!(path.iter().all(|p| bbox.contains(*p)));
        assert!(!bbox.contains(Coordinate::new(0.0, -15.0).expect("valid")));

        let padded = bbox.padded(0.1, 0.005);
        assert!(padded.crosses_antimeridian());
        assert!(padded.contains(fiji) && padded.contains(samoa));
        assert!(padded.center().longitude().abs() > 170.0);
    }
}
