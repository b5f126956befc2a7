//! In-memory gazetteer backed by a fixed table of places.
//!
//! Used offline and as a deterministic stand-in for the HTTP gazetteer in tests.

use std::collections::BTreeMap;

use super::{Gazetteer, GazetteerHit, SearchRequest};
use crate::error::ResolverError;
use crate::geo::{distance_km, Coordinate};

/// Reverse lookups snap to the nearest entry within this distance.
const DEFAULT_REVERSE_RADIUS_KM: f64 = 5.0;

/// Popular pickup points and city centres: (name, city, lon, lat).
const INDIA_POPULAR: &[(&str, &str, f64, f64)] = &[
    ("Mumbai Airport, Mumbai", "Mumbai", 72.8679, 19.0896),
    ("Connaught Place, New Delhi", "New Delhi", 77.2167, 28.6315),
    ("Bangalore Airport, Bangalore", "Bangalore", 77.7066, 13.1986),
    ("Chennai Central, Chennai", "Chennai", 80.2755, 13.0827),
    ("Hyderabad Airport, Hyderabad", "Hyderabad", 78.4294, 17.2403),
    ("Kolkata Airport, Kolkata", "Kolkata", 88.4467, 22.6547),
    ("New Delhi", "New Delhi", 77.2090, 28.6139),
    ("Mumbai", "Mumbai", 72.8777, 19.0760),
    ("Bangalore", "Bangalore", 77.5946, 12.9716),
    ("Chennai", "Chennai", 80.2707, 13.0827),
    ("Hyderabad", "Hyderabad", 78.4867, 17.3850),
    ("Kolkata", "Kolkata", 88.3639, 22.5726),
];

#[derive(Debug, Clone, Default)]
pub struct StaticGazetteer {
    entries: Vec<GazetteerHit>,
    reverse_radius_km: f64,
}

impl StaticGazetteer {
    pub fn new(entries: Vec<GazetteerHit>) -> Self {
        Self {
            entries,
            reverse_radius_km: DEFAULT_REVERSE_RADIUS_KM,
        }
    }

    /// The quick-pick locations offered before the user types anything.
    pub fn india_popular() -> Self {
        let entries = INDIA_POPULAR
            .iter()
            .map(|&(name, city, lon, lat)| {
                let mut address_components = BTreeMap::new();
                address_components.insert("city".to_string(), city.to_string());
                address_components.insert("country".to_string(), "India".to_string());
                address_components.insert("country_code".to_string(), "in".to_string());
                GazetteerHit {
                    display_name: name.to_string(),
                    latitude: lat,
                    longitude: lon,
                    address_components,
                }
            })
            .collect();
        Self::new(entries)
    }

    pub fn with_entry(mut self, display_name: &str, longitude: f64, latitude: f64) -> Self {
        self.entries.push(GazetteerHit {
            display_name: display_name.to_string(),
            latitude,
            longitude,
            address_components: BTreeMap::new(),
        });
        self
    }

    pub fn with_reverse_radius_km(mut self, radius_km: f64) -> Self {
        self.reverse_radius_km = radius_km;
        self
    }

    pub fn display_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.display_name.as_str())
    }

    fn matches(entry: &GazetteerHit, tokens: &[String]) -> bool {
        let haystack = entry.display_name.to_lowercase();
        tokens.iter().all(|token| haystack.contains(token.as_str()))
    }
}

impl Gazetteer for StaticGazetteer {
    fn search(&self, request: &SearchRequest) -> Result<Vec<GazetteerHit>, ResolverError> {
        let tokens: Vec<String> = request
            .query
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .map(str::to_lowercase)
            .collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let hits = self
            .entries
            .iter()
            .filter(|entry| Self::matches(entry, &tokens))
            .filter(|entry| {
                request.country_codes.is_empty()
                    || entry
                        .address_components
                        .get("country_code")
                        .map_or(true, |code| {
                            request
                                .country_codes
                                .split(',')
                                .any(|wanted| wanted.trim().eq_ignore_ascii_case(code))
                        })
            })
            .take(request.limit)
            .cloned()
            .collect();
        Ok(hits)
    }

    fn reverse(&self, coordinate: Coordinate) -> Result<Option<GazetteerHit>, ResolverError> {
        let nearest = self
            .entries
            .iter()
            .filter_map(|entry| {
                let point = Coordinate::new(entry.longitude, entry.latitude).ok()?;
                Some((distance_km(point, coordinate), entry))
            })
            .filter(|(distance, _)| *distance <= self.reverse_radius_km)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, entry)| entry.clone());
        Ok(nearest)
    }
}
