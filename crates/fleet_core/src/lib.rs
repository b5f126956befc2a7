//! Fleet simulation and trip-quoting engine.
//!
//! - [`geo`]: great-circle math on lon/lat coordinates.
//! - [`resolver`]: free text and device position to [`resolver::Location`]s, with
//!   debounced search and a process-lifetime cache.
//! - [`pricing`]: fares from distance, vehicle type and named modifiers.
//! - [`fleet`]: simulated drivers moving around a centre, ticked by the caller.
//! - [`route`]: renderable great-circle routes with a padded bounding box.
//! - [`quote`]: the orchestration layer composing all of the above.

pub mod clock;
pub mod config;
pub mod error;
pub mod fleet;
pub mod geo;
pub mod pricing;
pub mod quote;
pub mod resolver;
pub mod route;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use config::EngineConfig;
pub use error::{ConfigError, GeoMathError, PricingError, QuoteError, ResolverError, SimulatorError};
pub use geo::Coordinate;
