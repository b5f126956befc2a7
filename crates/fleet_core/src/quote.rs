//! Trip quoting: resolve both ends, measure, route and price.
//!
//! [`TripQuoteService`] is the only place that composes the resolver, the
//! fare estimator and the route planner. Pickup is resolved before the
//! destination and an unresolvable pickup fails before the destination is
//! looked up. A `Network` failure from the resolver is retried once.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{QuoteError, ResolverError};
use crate::fleet::FleetSnapshot;
use crate::geo::distance_km;
use crate::pricing::{
    travel_minutes, FareAdjustment, FareEstimator, FareModifiers, FareQuote, RouteVariant,
    VariantQuote, VehicleType,
};
use crate::resolver::{Gazetteer, Location, LocationResolver};
use crate::route::{CachedRouteBuilder, RouteGeometry, RoutePlanner};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripQuote {
    pub pickup: Location,
    pub destination: Location,
    pub vehicle_type: VehicleType,
    /// Great-circle distance between the two ends.
    pub distance_km: f64,
    pub duration_minutes: u32,
    pub fare: FareQuote,
    pub route: RouteGeometry,
    /// ETA of the nearest available matching driver, when a fleet was consulted.
    pub pickup_eta_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripVariants {
    pub pickup: Location,
    pub destination: Location,
    pub vehicle_type: VehicleType,
    pub distance_km: f64,
    pub route: RouteGeometry,
    pub variants: Vec<VariantQuote>,
}

pub struct TripQuoteService {
    resolver: LocationResolver,
    estimator: FareEstimator,
    routes: Box<dyn RoutePlanner>,
}

impl TripQuoteService {
    pub fn new(
        resolver: LocationResolver,
        estimator: FareEstimator,
        routes: Box<dyn RoutePlanner>,
    ) -> Self {
        Self {
            resolver,
            estimator,
            routes,
        }
    }

    /// Service over `gazetteer` with every other piece built from `config`.
    pub fn from_config(gazetteer: Box<dyn Gazetteer>, config: &EngineConfig) -> Self {
        Self::new(
            LocationResolver::new(gazetteer, config.resolver.clone()),
            FareEstimator::new(config.pricing.clone()),
            Box::new(CachedRouteBuilder::from_config(config.route.clone())),
        )
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    pub fn estimator(&self) -> &FareEstimator {
        &self.estimator
    }

    /// Quote a trip from free-text ends, validating raw modifiers first.
    pub fn quote(
        &self,
        pickup_text: &str,
        destination_text: &str,
        vehicle: VehicleType,
        modifiers: &BTreeMap<String, FareAdjustment>,
    ) -> Result<TripQuote, QuoteError> {
        let modifiers = FareModifiers::try_from(modifiers.clone())?;
        self.quote_with_modifiers(pickup_text, destination_text, vehicle, &modifiers)
    }

    pub fn quote_with_modifiers(
        &self,
        pickup_text: &str,
        destination_text: &str,
        vehicle: VehicleType,
        modifiers: &FareModifiers,
    ) -> Result<TripQuote, QuoteError> {
        let (pickup, destination) = self.resolve_pair(pickup_text, destination_text)?;
        let distance_km = distance_km(pickup.coordinate, destination.coordinate);
        let route = self.build_route(&pickup, &destination)?;
        let fare = self
            .estimator
            .estimate_for_vehicle(distance_km, vehicle, modifiers)?;

        debug!(
            pickup = %pickup.display_name,
            destination = %destination.display_name,
            distance_km,
            total = fare.total,
            "trip quoted"
        );
        Ok(TripQuote {
            pickup,
            destination,
            vehicle_type: vehicle,
            distance_km,
            duration_minutes: travel_minutes(distance_km, vehicle.typical_speed_kmh()),
            fare,
            route,
            pickup_eta_minutes: None,
        })
    }

    /// [`quote_with_modifiers`](Self::quote_with_modifiers) plus the pickup ETA of
    /// the nearest available driver of `vehicle` in `fleet`.
    pub fn quote_with_fleet(
        &self,
        pickup_text: &str,
        destination_text: &str,
        vehicle: VehicleType,
        modifiers: &FareModifiers,
        fleet: &FleetSnapshot,
    ) -> Result<TripQuote, QuoteError> {
        let mut quote =
            self.quote_with_modifiers(pickup_text, destination_text, vehicle, modifiers)?;
        quote.pickup_eta_minutes = fleet
            .nearest_available(quote.pickup.coordinate, Some(vehicle))
            .map(|driver| driver.eta_minutes);
        Ok(quote)
    }

    /// Price every [`RouteVariant`] for the same pair.
    pub fn quote_variants(
        &self,
        pickup_text: &str,
        destination_text: &str,
        vehicle: VehicleType,
        modifiers: &FareModifiers,
    ) -> Result<TripVariants, QuoteError> {
        let (pickup, destination) = self.resolve_pair(pickup_text, destination_text)?;
        let distance_km = distance_km(pickup.coordinate, destination.coordinate);
        let route = self.build_route(&pickup, &destination)?;
        let variants =
            self.estimator
                .estimate_variants(distance_km, vehicle, modifiers, &RouteVariant::ALL)?;
        Ok(TripVariants {
            pickup,
            destination,
            vehicle_type: vehicle,
            distance_km,
            route,
            variants,
        })
    }

    fn resolve_pair(
        &self,
        pickup_text: &str,
        destination_text: &str,
    ) -> Result<(Location, Location), QuoteError> {
        let pickup = self
            .resolve_first(pickup_text)?
            .ok_or(QuoteError::UnresolvedPickup)?;
        let destination = self
            .resolve_first(destination_text)?
            .ok_or(QuoteError::UnresolvedDestination)?;
        Ok((pickup, destination))
    }

    fn resolve_first(&self, query: &str) -> Result<Option<Location>, ResolverError> {
        let locations = match self.resolver.resolve(query) {
            Err(err) if err.is_retryable() => {
                warn!(error = %err, query, "location lookup failed, retrying once");
                self.resolver.resolve(query)?
            }
            other => other?,
        };
        Ok(locations.into_iter().next())
    }

    fn build_route(
        &self,
        pickup: &Location,
        destination: &Location,
    ) -> Result<RouteGeometry, QuoteError> {
        let resolution = self.routes.default_resolution();
        Ok(self
            .routes
            .build(pickup.coordinate, destination.coordinate, resolution)?)
    }
}
