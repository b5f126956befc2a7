//! Error taxonomy for the trip engine.
//!
//! Expected conditions (no matches, simulator not started) are explicit
//! variants or empty results; programmer errors such as NaN coordinates are
//! reported once and should be fixed at the call site rather than retried.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoMathError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("coordinate out of range: lon {longitude}, lat {latitude}")]
    InvalidCoordinate { longitude: f64, latitude: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    #[error("location lookup failed: {0}")]
    Network(String),

    #[error("location request timed out")]
    Timeout,

    #[error("location permission denied")]
    PermissionDenied,

    #[error("device geolocation is not supported")]
    Unsupported,
}

impl ResolverError {
    /// Only transport failures are worth asking again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolverError::Network(_))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulatorError {
    #[error("fleet simulator is not running")]
    NotRunning,

    #[error("invalid simulator parameters: {0}")]
    InvalidStart(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    #[error("modifier `{name}` has invalid value {value}")]
    InvalidModifier { name: String, value: f64 },

    #[error("vehicle multiplier must be finite and non-negative, got {0}")]
    InvalidMultiplier(f64),

    #[error("distance must be finite, got {0}")]
    InvalidDistance(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuoteError {
    #[error("pickup location could not be resolved")]
    UnresolvedPickup,

    #[error("destination could not be resolved")]
    UnresolvedDestination,

    #[error("invalid fare modifiers: {0}")]
    InvalidModifiers(#[from] PricingError),

    #[error("location lookup failed: {0}")]
    Lookup(#[from] ResolverError),

    #[error("route could not be built: {0}")]
    Route(#[from] GeoMathError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
