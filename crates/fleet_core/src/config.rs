//! Engine-wide configuration, loadable from a JSON file.
//!
//! Every section carries `#[serde(default)]`, so a file only needs the keys it
//! changes:
//!
//! ```json
//! { "pricing": { "per_km_rate": 14.0 }, "fleet": { "driver_count": 20 } }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fleet::FleetParams;
use crate::pricing::PricingConfig;
use crate::resolver::ResolverConfig;
use crate::route::RouteConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pricing: PricingConfig,
    pub fleet: FleetParams,
    pub resolver: ResolverConfig,
    pub route: RouteConfig,
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
