//! OpenStreetMap Nominatim gazetteer over blocking HTTP.
//!
//! Forward search uses `/search` with the request's country and viewbox bias;
//! reverse uses `/reverse`. Every request carries a client-side timeout.
//! HTTP failures and malformed payloads surface as [`ResolverError::Network`],
//! elapsed timeouts as [`ResolverError::Timeout`].

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{blocking::Client, Url};
use serde::Deserialize;
use tracing::debug;

use super::{Gazetteer, GazetteerHit, ResolverConfig, SearchRequest};
use crate::error::ResolverError;
use crate::geo::Coordinate;

pub const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org";

const USER_AGENT: &str = concat!("fleet_core/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct NominatimGazetteer {
    client: Client,
    endpoint: String,
    reverse_timeout: Duration,
}

impl NominatimGazetteer {
    /// Client for `endpoint` (e.g. `https://nominatim.openstreetmap.org`).
    pub fn new(
        endpoint: &str,
        search_timeout: Duration,
        reverse_timeout: Duration,
    ) -> Result<Self, ResolverError> {
        let client = Client::builder()
            .timeout(search_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| ResolverError::Network(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            reverse_timeout,
        })
    }

    pub fn from_config(endpoint: &str, config: &ResolverConfig) -> Result<Self, ResolverError> {
        Self::new(endpoint, config.search_timeout(), config.reverse_timeout())
    }

    fn search_url(&self, request: &SearchRequest) -> Result<Url, ResolverError> {
        let mut url = Url::parse(&format!("{}/search", self.endpoint))
            .map_err(|err| ResolverError::Network(format!("failed to build search URL: {err}")))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", &request.query)
                .append_pair("format", "json")
                .append_pair("addressdetails", "1")
                .append_pair("limit", &request.limit.to_string());
            if !request.country_codes.is_empty() {
                query.append_pair("countrycodes", &request.country_codes);
            }
            if let Some(viewbox) = &request.viewbox {
                let encoded = format!(
                    "{},{},{},{}",
                    viewbox.south_west.longitude(),
                    viewbox.south_west.latitude(),
                    viewbox.north_east.longitude(),
                    viewbox.north_east.latitude()
                );
                query.append_pair("viewbox", &encoded);
                if request.bounded {
                    query.append_pair("bounded", "1");
                }
            }
        }
        Ok(url)
    }

    fn reverse_url(&self, coordinate: Coordinate) -> Result<Url, ResolverError> {
        let mut url = Url::parse(&format!("{}/reverse", self.endpoint))
            .map_err(|err| ResolverError::Network(format!("failed to build reverse URL: {err}")))?;
        url.query_pairs_mut()
            .append_pair("lat", &format!("{:.6}", coordinate.latitude()))
            .append_pair("lon", &format!("{:.6}", coordinate.longitude()))
            .append_pair("format", "json")
            .append_pair("addressdetails", "1");
        Ok(url)
    }
}

impl Gazetteer for NominatimGazetteer {
    fn search(&self, request: &SearchRequest) -> Result<Vec<GazetteerHit>, ResolverError> {
        let url = self.search_url(request)?;
        let response = self.client.get(url).send().map_err(http_error)?;
        if !response.status().is_success() {
            return Err(ResolverError::Network(format!(
                "gazetteer returned HTTP {}",
                response.status()
            )));
        }
        let places: Vec<NominatimPlace> = response.json().map_err(http_error)?;
        places.into_iter().map(NominatimPlace::into_hit).collect()
    }

    fn reverse(&self, coordinate: Coordinate) -> Result<Option<GazetteerHit>, ResolverError> {
        let url = self.reverse_url(coordinate)?;
        let response = self
            .client
            .get(url)
            .timeout(self.reverse_timeout)
            .send()
            .map_err(http_error)?;
        if !response.status().is_success() {
            return Err(ResolverError::Network(format!(
                "gazetteer returned HTTP {}",
                response.status()
            )));
        }
        let body: NominatimReverse = response.json().map_err(http_error)?;
        parse_reverse(body)
    }
}

fn http_error(err: reqwest::Error) -> ResolverError {
    if err.is_timeout() {
        ResolverError::Timeout
    } else {
        ResolverError::Network(err.to_string())
    }
}

/// Nominatim sends coordinates as strings.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    display_name: String,
    lat: String,
    lon: String,
    #[serde(default)]
    address: BTreeMap<String, String>,
}

impl NominatimPlace {
    fn into_hit(self) -> Result<GazetteerHit, ResolverError> {
        let latitude = parse_degrees(&self.lat)?;
        let longitude = parse_degrees(&self.lon)?;
        Ok(GazetteerHit {
            display_name: self.display_name,
            latitude,
            longitude,
            address_components: self.address,
        })
    }
}

/// `/reverse` answers either a place or `{"error": "..."}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NominatimReverse {
    Place(NominatimPlace),
    Missing { error: String },
}

fn parse_reverse(body: NominatimReverse) -> Result<Option<GazetteerHit>, ResolverError> {
    match body {
        NominatimReverse::Place(place) => place.into_hit().map(Some),
        NominatimReverse::Missing { error } => {
            debug!(%error, "reverse lookup found nothing");
            Ok(None)
        }
    }
}

fn parse_degrees(raw: &str) -> Result<f64, ResolverError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ResolverError::Network(format!("malformed coordinate `{raw}` in gazetteer payload")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::BoundingBox;

    fn gazetteer() -> NominatimGazetteer {
        NominatimGazetteer::new(
            "http://localhost:8088/",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .expect("client")
    }

    #[test]
    fn search_url_carries_bias_and_limit() {
        let request = SearchRequest {
            query: "Connaught Place".to_string(),
            country_codes: "in".to_string(),
            limit: 5,
            viewbox: Some(BoundingBox::from_bounds(68.0, 8.0, 97.0, 35.0).expect("bbox")),
            bounded: true,
        };
        let url = gazetteer().search_url(&request).expect("url");
        let pairs: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(url.path(), "/search");
        assert_eq!(pairs["q"], "Connaught Place");
        assert_eq!(pairs["countrycodes"], "in");
        assert_eq!(pairs["limit"], "5");
        assert_eq!(pairs["viewbox"], "68,8,97,35");
        assert_eq!(pairs["bounded"], "1");
    }

    #[test]
    fn parses_search_payload() {
        let body = r#"[{"place_id":1,"display_name":"Chennai Central, Chennai","lat":"13.0827","lon":"80.2755","type":"station","address":{"city":"Chennai","country_code":"in"}}]"#;
        let places: Vec<NominatimPlace> = serde_json::from_str(body).expect("json");
        let hits: Vec<GazetteerHit> = places
            .into_iter()
            .map(NominatimPlace::into_hit)
            .collect::<Result<_, _>>()
            .expect("hits");
        assert_eq!(hits[0].longitude, 80.2755);
        assert_eq!(hits[0].address_components["city"], "Chennai");
    }

    #[test]
    fn malformed_coordinates_are_network_errors() {
        let body = r#"[{"display_name":"Nowhere","lat":"north","lon":"80.0"}]"#;
        let places: Vec<NominatimPlace> = serde_json::from_str(body).expect("json");
        let result = places.into_iter().next().expect("place").into_hit();
        assert!(matches!(result, Err(ResolverError::Network(_))));
    }

    #[test]
    fn reverse_error_body_means_no_match() {
        let body: NominatimReverse =
            serde_json::from_str(r#"{"error":"Unable to geocode"}"#).expect("json");
        assert_eq!(parse_reverse(body), Ok(None));
    }
}
