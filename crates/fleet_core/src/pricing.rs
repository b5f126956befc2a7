//! Fare estimation: distance-based pricing with vehicle multipliers and named modifiers.
//!
//! Formula: `subtotal = (base_fare + distance_km * per_km_rate) * vehicle_multiplier`,
//! then modifiers are applied in a fixed order:
//!
//! 1. multiplicative factors ([`FareAdjustment::Factor`]), by name
//! 2. percentage surcharges/discounts ([`FareAdjustment::Percent`]), by name
//! 3. flat add-ons ([`FareAdjustment::Flat`]), by name
//!
//! Every step is rounded to the paisa before the next one runs, so the order
//! matters and is never left to map iteration. The total never drops below the
//! base fare, which keeps fares non-decreasing in distance for fixed inputs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PricingError;

/// Base fare in rupees.
pub const BASE_FARE: f64 = 40.0;

/// Per-kilometre rate in rupees.
pub const PER_KM_RATE: f64 = 12.0;

/// All quotes are denominated in Indian rupees.
pub const CURRENCY: &str = "INR";

/// Modifier name for the female-driver preference surcharge.
pub const FEMALE_DRIVER: &str = "femaleDriver";

/// Modifier name for the subscription discount.
pub const SUBSCRIPTION_DISCOUNT: &str = "subscriptionDiscount";

/// Breakdown key for the part of the total added to reach the base fare floor.
pub const MINIMUM_FARE_TOP_UP: &str = "minimumFareTopUp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Bike,
    Auto,
    Taxi,
    Suv,
    Premium,
}

impl VehicleType {
    pub const ALL: [VehicleType; 5] = [
        VehicleType::Bike,
        VehicleType::Auto,
        VehicleType::Taxi,
        VehicleType::Suv,
        VehicleType::Premium,
    ];

    /// Default fare multiplier relative to a standard taxi.
    pub fn fare_multiplier(self) -> f64 {
        match self {
            VehicleType::Bike => 0.5,
            VehicleType::Auto => 0.7,
            VehicleType::Taxi => 1.0,
            VehicleType::Premium => 1.3,
            VehicleType::Suv => 1.8,
        }
    }

    /// Typical city speed used for simulated drivers and ETA estimates.
    pub fn typical_speed_kmh(self) -> f64 {
        match self {
            VehicleType::Bike => 30.0,
            VehicleType::Auto => 25.0,
            VehicleType::Taxi => 35.0,
            VehicleType::Suv => 32.0,
            VehicleType::Premium => 35.0,
        }
    }

    /// Typical pickup ETA in minutes, inclusive, for a freshly placed driver.
    pub fn eta_range(self) -> (u32, u32) {
        match self {
            VehicleType::Bike => (2, 4),
            VehicleType::Auto => (2, 4),
            VehicleType::Taxi => (3, 5),
            VehicleType::Premium => (5, 8),
            VehicleType::Suv => (8, 12),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VehicleType::Bike => "Bike",
            VehicleType::Auto => "Auto Rickshaw",
            VehicleType::Taxi => "Taxi",
            VehicleType::Suv => "SUV",
            VehicleType::Premium => "Premium Cab",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleType::Bike => "bike",
            VehicleType::Auto => "auto",
            VehicleType::Taxi => "taxi",
            VehicleType::Suv => "suv",
            VehicleType::Premium => "premium",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VehicleType::ALL
            .into_iter()
            .find(|vehicle| vehicle.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown vehicle type `{s}`"))
    }
}

/// One named adjustment to a fare.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum FareAdjustment {
    /// Multiply the running total by this factor (>= 0).
    Factor(f64),
    /// Add this fraction of the running total; 0.15 is +15 %, -0.25 is -25 %.
    Percent(f64),
    /// Add a fixed amount in rupees.
    Flat(f64),
}

impl FareAdjustment {
    fn stage(&self) -> u8 {
        match self {
            FareAdjustment::Factor(_) => 0,
            FareAdjustment::Percent(_) => 1,
            FareAdjustment::Flat(_) => 2,
        }
    }

    fn value(&self) -> f64 {
        match *self {
            FareAdjustment::Factor(v) | FareAdjustment::Percent(v) | FareAdjustment::Flat(v) => v,
        }
    }

    fn is_valid(&self) -> bool {
        match *self {
            FareAdjustment::Factor(v) => v.is_finite() && v >= 0.0,
            FareAdjustment::Percent(v) => v.is_finite() && v >= -1.0,
            FareAdjustment::Flat(v) => v.is_finite(),
        }
    }

    fn apply(&self, subtotal: f64) -> f64 {
        match *self {
            FareAdjustment::Factor(v) => subtotal * v,
            FareAdjustment::Percent(v) => subtotal * (1.0 + v),
            FareAdjustment::Flat(v) => subtotal + v,
        }
    }
}

/// Validated set of named fare modifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, FareAdjustment>")]
pub struct FareModifiers(BTreeMap<String, FareAdjustment>);

impl FareModifiers {
    pub fn new() -> Self {
        Self::default()
    }

    /// +15 % on the vehicle-adjusted subtotal.
    pub fn female_driver() -> Self {
        let mut modifiers = Self::new();
        modifiers
            .0
            .insert(FEMALE_DRIVER.to_string(), FareAdjustment::Percent(0.15));
        modifiers
    }

    /// -25 % for subscribers.
    pub fn subscription_discount() -> Self {
        let mut modifiers = Self::new();
        modifiers.0.insert(
            SUBSCRIPTION_DISCOUNT.to_string(),
            FareAdjustment::Percent(-0.25),
        );
        modifiers
    }

    /// Add or replace a modifier, rejecting non-finite or out-of-range values.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        adjustment: FareAdjustment,
    ) -> Result<(), PricingError> {
        let name = name.into();
        if !adjustment.is_valid() {
            return Err(PricingError::InvalidModifier {
                name,
                value: adjustment.value(),
            });
        }
        self.0.insert(name, adjustment);
        Ok(())
    }

    pub fn with(
        mut self,
        name: impl Into<String>,
        adjustment: FareAdjustment,
    ) -> Result<Self, PricingError> {
        self.insert(name, adjustment)?;
        Ok(self)
    }

    pub fn merge(mut self, other: FareModifiers) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FareAdjustment> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Modifiers in application order: stage first, then name.
    fn in_application_order(&self) -> Vec<(&str, &FareAdjustment)> {
        let mut ordered: Vec<_> = self.0.iter().map(|(k, v)| (k.as_str(), v)).collect();
        ordered.sort_by_key(|(name, adjustment)| (adjustment.stage(), *name));
        ordered
    }
}

impl TryFrom<BTreeMap<String, FareAdjustment>> for FareModifiers {
    type Error = PricingError;

    fn try_from(map: BTreeMap<String, FareAdjustment>) -> Result<Self, Self::Error> {
        map.into_iter()
            .try_fold(FareModifiers::new(), |acc, (name, adjustment)| {
                acc.with(name, adjustment)
            })
    }
}

/// Pricing constants. Every quote from one estimator shares them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub base_fare: f64,
    pub per_km_rate: f64,
    /// Overrides for [`VehicleType::fare_multiplier`].
    pub vehicle_multipliers: BTreeMap<VehicleType, f64>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_fare: BASE_FARE,
            per_km_rate: PER_KM_RATE,
            vehicle_multipliers: BTreeMap::new(),
        }
    }
}

impl PricingConfig {
    pub fn with_base_fare(mut self, base_fare: f64) -> Self {
        self.base_fare = base_fare;
        self
    }

    pub fn with_per_km_rate(mut self, per_km_rate: f64) -> Self {
        self.per_km_rate = per_km_rate;
        self
    }

    pub fn with_vehicle_multiplier(mut self, vehicle: VehicleType, multiplier: f64) -> Self {
        self.vehicle_multipliers.insert(vehicle, multiplier);
        self
    }

    pub fn vehicle_multiplier(&self, vehicle: VehicleType) -> f64 {
        self.vehicle_multipliers
            .get(&vehicle)
            .copied()
            .unwrap_or_else(|| vehicle.fare_multiplier())
    }
}

/// Derived fare for one distance. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FareQuote {
    pub base_fare: f64,
    pub distance_km: f64,
    pub per_km_rate: f64,
    pub vehicle_multiplier: f64,
    pub surcharge_modifiers: FareModifiers,
    /// Amount contributed by each step, keyed by step name.
    pub breakdown: BTreeMap<String, f64>,
    pub total: f64,
}

/// Wire shape handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareQuoteExport {
    pub total: f64,
    pub currency: String,
    pub distance_km: f64,
    pub breakdown: BTreeMap<String, f64>,
}

impl FareQuote {
    pub fn to_export(&self) -> FareQuoteExport {
        FareQuoteExport {
            total: self.total,
            currency: CURRENCY.to_string(),
            distance_km: self.distance_km,
            breakdown: self.breakdown.clone(),
        }
    }
}

/// Alternative routes priced for the same pickup/destination pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteVariant {
    Fastest,
    Shortest,
    TollAvoiding,
}

impl RouteVariant {
    pub const ALL: [RouteVariant; 3] = [
        RouteVariant::Fastest,
        RouteVariant::Shortest,
        RouteVariant::TollAvoiding,
    ];

    /// Road distance relative to the great-circle distance.
    pub fn detour_factor(self) -> f64 {
        match self {
            RouteVariant::Fastest => 1.3,
            RouteVariant::Shortest => 1.15,
            RouteVariant::TollAvoiding => 1.4,
        }
    }

    /// Average speed along the variant's roads.
    pub fn average_speed_kmh(self) -> f64 {
        match self {
            RouteVariant::Fastest => 40.0,
            RouteVariant::Shortest => 28.0,
            RouteVariant::TollAvoiding => 32.0,
        }
    }
}

/// One priced route alternative.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantQuote {
    pub variant: RouteVariant,
    pub distance_km: f64,
    pub duration_minutes: u32,
    pub fare: FareQuote,
}

/// Round to the paisa.
pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Whole minutes to cover `distance_km` at `speed_kmh`, never less than one.
pub fn travel_minutes(distance_km: f64, speed_kmh: f64) -> u32 {
    if distance_km <= 0.0 || !distance_km.is_finite() {
        return 1;
    }
    let minutes = (distance_km / speed_kmh.max(1.0) * 60.0).ceil();
    (minutes as u32).max(1)
}

#[derive(Debug, Clone, Default)]
pub struct FareEstimator {
    config: PricingConfig,
}

impl FareEstimator {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Price a trip of `distance_km`.
    ///
    /// A non-positive distance is a zero-length trip and costs exactly the base fare,
    /// with no multiplier or modifiers applied.
    pub fn estimate(
        &self,
        distance_km: f64,
        vehicle_multiplier: f64,
        modifiers: &FareModifiers,
    ) -> Result<FareQuote, PricingError> {
        if distance_km.is_nan() || distance_km.is_infinite() {
            return Err(PricingError::InvalidDistance(distance_km));
        }
        if !vehicle_multiplier.is_finite() || vehicle_multiplier < 0.0 {
            return Err(PricingError::InvalidMultiplier(vehicle_multiplier));
        }

        let base_fare = self.config.base_fare;
        let mut breakdown = BTreeMap::new();
        breakdown.insert("baseFare".to_string(), round_money(base_fare));

        if distance_km <= 0.0 {
            return Ok(FareQuote {
                base_fare,
                distance_km: 0.0,
                per_km_rate: self.config.per_km_rate,
                vehicle_multiplier,
                surcharge_modifiers: modifiers.clone(),
                breakdown,
                total: round_money(base_fare),
            });
        }

        let distance_charge = round_money(distance_km * self.config.per_km_rate);
        breakdown.insert("distance".to_string(), distance_charge);
        let raw = round_money(base_fare + distance_charge);

        let mut total = round_money(raw * vehicle_multiplier);
        breakdown.insert("vehicleAdjustment".to_string(), round_money(total - raw));

        for (name, adjustment) in modifiers.in_application_order() {
            let next = round_money(adjustment.apply(total));
            breakdown.insert(name.to_string(), round_money(next - total));
            total = next;
        }

        if total < base_fare {
            breakdown.insert(
                MINIMUM_FARE_TOP_UP.to_string(),
                round_money(base_fare - total),
            );
            total = round_money(base_fare);
        }

        Ok(FareQuote {
            base_fare,
            distance_km,
            per_km_rate: self.config.per_km_rate,
            vehicle_multiplier,
            surcharge_modifiers: modifiers.clone(),
            breakdown,
            total,
        })
    }

    /// [`estimate`](Self::estimate) with the configured multiplier for `vehicle`.
    pub fn estimate_for_vehicle(
        &self,
        distance_km: f64,
        vehicle: VehicleType,
        modifiers: &FareModifiers,
    ) -> Result<FareQuote, PricingError> {
        self.estimate(distance_km, self.config.vehicle_multiplier(vehicle), modifiers)
    }

    /// Price every variant from one great-circle distance.
    pub fn estimate_variants(
        &self,
        great_circle_km: f64,
        vehicle: VehicleType,
        modifiers: &FareModifiers,
        variants: &[RouteVariant],
    ) -> Result<Vec<VariantQuote>, PricingError> {
        variants
            .iter()
            .map(|&variant| {
                let distance_km = great_circle_km.max(0.0) * variant.detour_factor();
                let fare = self.estimate_for_vehicle(distance_km, vehicle, modifiers)?;
                Ok(VariantQuote {
                    variant,
                    distance_km,
                    duration_minutes: travel_minutes(distance_km, variant.average_speed_kmh()),
                    fare,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> FareEstimator {
        FareEstimator::new(PricingConfig::default())
    }

    #[test]
    fn ten_km_at_standard_rates_costs_160() {
        let quote = estimator()
            .estimate(10.0, 1.0, &FareModifiers::new())
            .expect("quote");
        assert_eq!(quote.total, 160.0);
        assert_eq!(quote.breakdown["distance"], 120.0);
    }

    #[test]
    fn female_driver_surcharge_multiplies_vehicle_subtotal() {
        let quote = estimator()
            .estimate(10.0, 1.0, &FareModifiers::female_driver())
            .expect("quote");
        assert_eq!(quote.total, 184.0);
        assert_eq!(quote.breakdown[FEMALE_DRIVER], 24.0);
    }

    #[test]
    fn zero_distance_costs_base_fare() {
        let modifiers = FareModifiers::female_driver()
            .with("toll", FareAdjustment::Flat(50.0))
            .expect("valid");
        for distance in [0.0, -3.0] {
            let quote = estimator().estimate(distance, 1.8, &modifiers).expect("quote");
            assert_eq!(quote.total, BASE_FARE);
        }
    }

    #[test]
    fn modifiers_apply_factor_then_percent_then_flat() {
        let modifiers = FareModifiers::new()
            .with("aToll", FareAdjustment::Flat(10.0))
            .and_then(|m| m.with("night", FareAdjustment::Factor(2.0)))
            .and_then(|m| m.with(FEMALE_DRIVER, FareAdjustment::Percent(0.15)))
            .expect("valid");
        let quote = estimator().estimate(10.0, 1.0, &modifiers).expect("quote");
        // ((160 * 2) * 1.15) + 10
        assert_eq!(quote.total, 378.0);
    }

    #[test]
    fn fare_is_non_decreasing_in_distance() {
        let modifiers = FareModifiers::subscription_discount()
            .with("toll", FareAdjustment::Flat(-5.0))
            .expect("valid");
        for multiplier in [0.5, 0.7, 1.0, 1.8] {
            let mut previous = 0.0;
            for step in 0..400 {
                let distance = step as f64 * 0.137;
                let total = estimator()
                    .estimate(distance, multiplier, &modifiers)
                    .expect("quote")
                    .total;
                assert!(total >= previous, "{total} < {previous} at {distance} km");
                previous = total;
            }
        }
    }

    #[test]
    fn rejects_invalid_modifier_values() {
        assert!(FareModifiers::new()
            .with("bad", FareAdjustment::Percent(-1.5))
            .is_err());
        assert!(FareModifiers::new()
            .with("bad", FareAdjustment::Factor(f64::NAN))
            .is_err());
        assert!(estimator()
            .estimate(5.0, -1.0, &FareModifiers::new())
            .is_err());
    }

    #[test]
    fn vehicle_multiplier_overrides_take_precedence() {
        let config = PricingConfig::default().with_vehicle_multiplier(VehicleType::Auto, 0.9);
        assert_eq!(config.vehicle_multiplier(VehicleType::Auto), 0.9);
        assert_eq!(config.vehicle_multiplier(VehicleType::Suv), 1.8);
    }

    #[test]
    fn variants_share_constants_but_differ_in_distance() {
        let quotes = estimator()
            .estimate_variants(10.0, VehicleType::Taxi, &FareModifiers::new(), &RouteVariant::ALL)
            .expect("variants");
        assert_eq!(quotes.len(), 3);
        let shortest = quotes
            .iter()
            .find(|q| q.variant == RouteVariant::Shortest)
            .expect("shortest");
        for quote in &quotes {
            assert_eq!(quote.fare.base_fare, BASE_FARE);
            assert!(quote.fare.total >= shortest.fare.total);
            assert!(quote.duration_minutes >= 1);
        }
    }

    #[test]
    fn export_uses_rupees() {
        let export = estimator()
            .estimate(2.0, 1.0, &FareModifiers::new())
            .expect("quote")
            .to_export();
        assert_eq!(export.currency, "INR");
        assert_eq!(export.total, 64.0);
    }

    #[test]
    fn travel_minutes_is_at_least_one() {
        assert_eq!(travel_minutes(0.0, 30.0), 1);
        assert_eq!(travel_minutes(15.0, 30.0), 30);
    }
}
