//! Fleet simulation: a fixed population of drivers wandering around a centre point.
//!
//! The simulator is either **Stopped** or **Running**. [`FleetSimulator::start`]
//! places `count` drivers at a uniformly random bearing and a uniformly random
//! distance in `[0, radius_km]` from the centre. Each [`FleetSimulator::tick`]
//! may nudge a driver by a short random step, shifts its ETA by at most one
//! minute, and occasionally toggles availability. Drivers are never added or
//! removed between ticks.
//!
//! The simulator owns no timer. Callers tick it on their own cadence (see
//! [`crate::clock::TickCadence`]), and tests call `tick()` directly. All
//! randomness comes from the injected `Rng`, so a seeded generator gives a
//! reproducible run.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SimulatorError;
use crate::geo::{destination_point, distance_km, initial_bearing_deg, Coordinate};
use crate::pricing::{round_money, VehicleType, BASE_FARE};
use crate::resolver::DEFAULT_CENTER;

/// Parameters for populating and advancing a fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetParams {
    /// (lon, lat) of the fleet centre.
    pub center: (f64, f64),
    pub driver_count: usize,
    pub radius_km: f64,
    /// Probability that a given driver moves on a tick.
    pub move_probability: f64,
    /// Upper bound on one tick's displacement.
    pub max_step_km: f64,
    /// Probability that a driver's availability flips on a tick.
    pub availability_flip_probability: f64,
    /// Probability that a freshly placed driver starts available.
    pub initial_available_probability: f64,
    /// Overrides every vehicle's own [`VehicleType::eta_range`] when set.
    pub initial_eta_minutes: Option<(u32, u32)>,
    pub max_eta_minutes: u32,
    /// Cadence the caller is expected to tick at; caps the step by driver speed.
    pub tick_interval_ms: u64,
    /// Base fare used to derive each driver's quote base.
    pub base_fare: f64,
    pub seed: Option<u64>,
}

impl Default for FleetParams {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            driver_count: 8,
            radius_km: 3.0,
            move_probability: 0.5,
            max_step_km: 0.12,
            availability_flip_probability: 0.05,
            initial_available_probability: 0.7,
            initial_eta_minutes: None,
            max_eta_minutes: 20,
            tick_interval_ms: 5_000,
            base_fare: BASE_FARE,
            seed: None,
        }
    }
}

impl FleetParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_center(mut self, center: Coordinate) -> Self {
        self.center = (center.longitude(), center.latitude());
        self
    }

    pub fn with_driver_count(mut self, count: usize) -> Self {
        self.driver_count = count;
        self
    }

    pub fn with_radius_km(mut self, radius_km: f64) -> Self {
        self.radius_km = radius_km;
        self
    }

    pub fn with_move_probability(mut self, probability: f64) -> Self {
        self.move_probability = probability;
        self
    }

    pub fn with_availability_flip_probability(mut self, probability: f64) -> Self {
        self.availability_flip_probability = probability;
        self
    }

    pub fn with_initial_eta_minutes(mut self, low: u32, high: u32) -> Self {
        self.initial_eta_minutes = Some((low, high));
        self
    }

    pub fn with_tick_interval_ms(mut self, interval_ms: u64) -> Self {
        self.tick_interval_ms = interval_ms;
        self
    }

    pub fn center_coordinate(&self) -> Result<Coordinate, SimulatorError> {
        Coordinate::new(self.center.0, self.center.1)
            .map_err(|err| SimulatorError::InvalidStart(err.to_string()))
    }

    fn validate(&self) -> Result<(), SimulatorError> {
        let probability = |name: &str, p: f64| {
            if (0.0..=1.0).contains(&p) {
                Ok(())
            } else {
                Err(SimulatorError::InvalidStart(format!(
                    "{name} must be within [0, 1], got {p}"
                )))
            }
        };
        if !self.radius_km.is_finite() || self.radius_km < 0.0 {
            return Err(SimulatorError::InvalidStart(format!(
                "radius must be finite and non-negative, got {}",
                self.radius_km
            )));
        }
        if !self.max_step_km.is_finite() || self.max_step_km < 0.0 {
            return Err(SimulatorError::InvalidStart(format!(
                "max step must be finite and non-negative, got {}",
                self.max_step_km
            )));
        }
        probability("move probability", self.move_probability)?;
        probability("availability flip probability", self.availability_flip_probability)?;
        probability("initial availability", self.initial_available_probability)?;
        if let Some((low, high)) = self.initial_eta_minutes {
            if low == 0 || low > high {
                return Err(SimulatorError::InvalidStart(format!(
                    "initial ETA range {low}..={high} is empty or below one minute"
                )));
            }
        }
        Ok(())
    }
}

/// One simulated driver. Only the simulator mutates these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub vehicle_type: VehicleType,
    pub location: Coordinate,
    pub available: bool,
    pub rating: f64,
    pub eta_minutes: u32,
    pub speed_kmh: f64,
    pub fare_quote_base: f64,
}

/// Rendering-layer shape of one driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverExport {
    pub id: String,
    pub vehicle_type: VehicleType,
    pub lat: f64,
    pub lon: f64,
    pub available: bool,
    pub eta_minutes: u32,
    pub rating: f64,
}

impl From<&Driver> for DriverExport {
    fn from(driver: &Driver) -> Self {
        Self {
            id: driver.id.clone(),
            vehicle_type: driver.vehicle_type,
            lat: driver.location.latitude(),
            lon: driver.location.longitude(),
            available: driver.available,
            eta_minutes: driver.eta_minutes,
            rating: driver.rating,
        }
    }
}

/// Read-only copy of the fleet at one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetSnapshot {
    tick: u64,
    center: Option<Coordinate>,
    drivers: Vec<Driver>,
}

impl FleetSnapshot {
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn center(&self) -> Option<Coordinate> {
        self.center
    }

    pub fn drivers(&self) -> &[Driver] {
        &self.drivers
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn driver_ids(&self) -> BTreeSet<&str> {
        self.drivers.iter().map(|d| d.id.as_str()).collect()
    }

    pub fn available_count(&self) -> usize {
        self.drivers.iter().filter(|d| d.available).count()
    }

    /// Every driver, nearest to `point` first.
    pub fn nearby(&self, point: Coordinate) -> Vec<Driver> {
        let mut by_distance: Vec<(f64, &Driver)> = self
            .drivers
            .iter()
            .map(|driver| (distance_km(point, driver.location), driver))
            .collect();
        by_distance.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        by_distance.into_iter().map(|(_, d)| d.clone()).collect()
    }

    /// Closest available driver, optionally restricted to one vehicle type.
    pub fn nearest_available(
        &self,
        point: Coordinate,
        vehicle: Option<VehicleType>,
    ) -> Option<&Driver> {
        self.drivers
            .iter()
            .filter(|d| d.available && vehicle.map_or(true, |v| d.vehicle_type == v))
            .min_by(|a, b| {
                distance_km(point, a.location).total_cmp(&distance_km(point, b.location))
            })
    }

    pub fn to_export(&self) -> Vec<DriverExport> {
        self.drivers.iter().map(DriverExport::from).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FleetMode {
    Stopped,
    Running,
}

pub struct FleetSimulator<R: Rng = StdRng> {
    rng: R,
    params: FleetParams,
    mode: FleetMode,
    center: Option<Coordinate>,
    drivers: Vec<Driver>,
    tick: u64,
}

impl FleetSimulator<StdRng> {
    /// Simulator seeded from `params.seed`, or from entropy when unset.
    pub fn from_params(params: FleetParams) -> Self {
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(rng, params)
    }

    pub fn seeded(seed: u64) -> Self {
        Self::from_params(FleetParams::default().with_seed(seed))
    }
}

impl<R: Rng> FleetSimulator<R> {
    pub fn with_rng(rng: R, params: FleetParams) -> Self {
        Self {
            rng,
            params,
            mode: FleetMode::Stopped,
            center: None,
            drivers: Vec::new(),
            tick: 0,
        }
    }

    pub fn mode(&self) -> FleetMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.mode == FleetMode::Running
    }

    pub fn params(&self) -> &FleetParams {
        &self.params
    }

    /// Populate `count` drivers within `radius_km` of `center` and start running.
    ///
    /// Calling `start` while running discards the current fleet.
    pub fn start(
        &mut self,
        center: Coordinate,
        count: usize,
        radius_km: f64,
    ) -> Result<(), SimulatorError> {
        let params = FleetParams {
            driver_count: count,
            radius_km,
            ..self.params.clone()
        }
        .with_center(center);
        params.validate()?;
        self.params = params;

        self.center = Some(center);
        let drivers: Vec<Driver> = (0..count)
            .map(|index| self.spawn_driver(index, center))
            .collect();
        self.drivers = drivers;
        self.tick = 0;
        self.mode = FleetMode::Running;
        info!(
            drivers = count,
            radius_km,
            center = %center,
            "fleet simulation started"
        );
        Ok(())
    }

    /// [`start`](Self::start) with the centre, count and radius from the stored params.
    pub fn start_from_params(&mut self) -> Result<(), SimulatorError> {
        let center = self.params.center_coordinate()?;
        let (count, radius_km) = (self.params.driver_count, self.params.radius_km);
        self.start(center, count, radius_km)
    }

    /// Regenerate the same number of drivers around a new centre.
    pub fn recenter(&mut self, center: Coordinate) -> Result<(), SimulatorError> {
        if !self.is_running() {
            return Err(SimulatorError::NotRunning);
        }
        let (count, radius_km) = (self.drivers.len(), self.params.radius_km);
        info!(center = %center, "fleet recentered");
        self.start(center, count, radius_km)
    }

    /// Stop ticking. The last fleet stays readable through [`snapshot`](Self::snapshot).
    pub fn stop(&mut self) {
        if self.mode == FleetMode::Running {
            info!(ticks = self.tick, "fleet simulation stopped");
        }
        self.mode = FleetMode::Stopped;
    }

    /// Drop the fleet entirely.
    pub fn reset(&mut self) {
        self.stop();
        self.drivers.clear();
        self.center = None;
        self.tick = 0;
    }

    /// Advance every driver by one step and return the resulting fleet.
    pub fn tick(&mut self) -> Result<FleetSnapshot, SimulatorError> {
        if !self.is_running() {
            return Err(SimulatorError::NotRunning);
        }
        let Some(center) = self.center else {
            return Err(SimulatorError::NotRunning);
        };

        let mut drivers = std::mem::take(&mut self.drivers);
        for driver in &mut drivers {
            self.advance_driver(driver, center);
        }
        self.drivers = drivers;
        self.tick += 1;

        debug!(
            tick = self.tick,
            available = self.drivers.iter().filter(|d| d.available).count(),
            "fleet ticked"
        );
        Ok(self.snapshot())
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot {
            tick: self.tick,
            center: self.center,
            drivers: self.drivers.clone(),
        }
    }

    /// All current drivers sorted by ascending distance from `point`.
    pub fn nearby(&self, point: Coordinate) -> Vec<Driver> {
        self.snapshot().nearby(point)
    }

    fn spawn_driver(&mut self, index: usize, center: Coordinate) -> Driver {
        let bearing = self.rng.gen_range(0.0..360.0);
        let offset_km = self.rng.gen::<f64>() * self.params.radius_km;
        let location = destination_point(center, bearing, offset_km);

        let vehicle_type = VehicleType::ALL[self.rng.gen_range(0..VehicleType::ALL.len())];
        let available = self.rng.gen_bool(self.params.initial_available_probability);
        let rating = (40.0 + self.rng.gen_range(0.0..=10.0_f64)).round() / 10.0;
        let (eta_low, eta_high) = self
            .params
            .initial_eta_minutes
            .unwrap_or_else(|| vehicle_type.eta_range());
        let eta_minutes = self
            .rng
            .gen_range(eta_low..=eta_high)
            .min(self.params.max_eta_minutes.max(1));

        Driver {
            id: format!("driver-{index}"),
            name: format!("Driver {}", index + 1),
            vehicle_type,
            location,
            available,
            rating,
            eta_minutes,
            speed_kmh: vehicle_type.typical_speed_kmh(),
            fare_quote_base: round_money(self.params.base_fare * vehicle_type.fare_multiplier()),
        }
    }

    fn advance_driver(&mut self, driver: &mut Driver, center: Coordinate) {
        if self.rng.gen_bool(self.params.move_probability) {
            let step_km = self.rng.gen::<f64>() * self.step_cap_km(driver.speed_kmh);
            let mut bearing = self.rng.gen_range(0.0..360.0);
            let mut next = destination_point(driver.location, bearing, step_km);
            if distance_km(center, next) > self.params.radius_km {
                // Head back towards the centre instead of leaving the service area.
                bearing = initial_bearing_deg(driver.location, center);
                next = destination_point(driver.location, bearing, step_km);
            }
            driver.location = next;
        }

        let delta: i64 = self.rng.gen_range(-1..=1);
        let eta = (i64::from(driver.eta_minutes) + delta)
            .clamp(1, i64::from(self.params.max_eta_minutes.max(1)));
        driver.eta_minutes = eta as u32;

        if self.rng.gen_bool(self.params.availability_flip_probability) {
            driver.available = !driver.available;
        }
    }

    /// A driver cannot cover more ground in one tick than its speed allows.
    fn step_cap_km(&self, speed_kmh: f64) -> f64 {
        let hours = self.params.tick_interval_ms as f64 / 3_600_000.0;
        self.params.max_step_km.min(speed_kmh * hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delhi() -> Coordinate {
        Coordinate::new(77.2090, 28.6139).expect("valid")
    }

    fn running(count: usize, radius_km: f64) -> FleetSimulator {
        let mut sim = FleetSimulator::seeded(7);
        sim.start(delhi(), count, radius_km).expect("start");
        sim
    }

    #[test]
    fn start_places_every_driver_within_radius() {
        let sim = running(10, 3.0);
        let snapshot = sim.snapshot();
        assert_eq!(snapshot.len(), 10);
        for driver in snapshot.drivers() {
            assert!(distance_km(delhi(), driver.location) <= 3.0 + 1e-6);
            assert!((4.0..=5.0).contains(&driver.rating));
            assert!(driver.eta_minutes >= 1);
        }
    }

    #[test]
    fn tick_on_stopped_simulator_fails() {
        let mut sim = FleetSimulator::seeded(1);
        assert_eq!(sim.tick(), Err(SimulatorError::NotRunning));

        let mut sim = running(3, 1.0);
        sim.stop();
        assert_eq!(sim.tick(), Err(SimulatorError::NotRunning));
        sim.stop();
        assert_eq!(sim.mode(), FleetMode::Stopped);
    }

    #[test]
    fn ticks_keep_ids_and_bound_steps() {
        let mut sim = running(10, 3.0);
        let before = sim.snapshot();
        let ids: BTreeSet<String> = before.driver_ids().into_iter().map(String::from).collect();

        let mut previous = before;
        for _ in 0..50 {
            let next = sim.tick().expect("tick");
            let next_ids: BTreeSet<String> =
                next.driver_ids().into_iter().map(String::from).collect();
            assert_eq!(next_ids, ids);
            for (old, new) in previous.drivers().iter().zip(next.drivers()) {
                assert_eq!(old.id, new.id);
                assert!(distance_km(old.location, new.location) <= 0.12 + 1e-9);
                assert!(new.eta_minutes >= 1);
                assert!(new.eta_minutes.abs_diff(old.eta_minutes) <= 1);
            }
            previous = next;
        }
        assert_eq!(previous.tick(), 50);
    }

    #[test]
    fn same_seed_gives_same_run() {
        let mut a = running(6, 2.0);
        let mut b = running(6, 2.0);
        for _ in 0..5 {
            assert_eq!(a.tick().expect("tick"), b.tick().expect("tick"));
        }
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let mut sim = FleetSimulator::seeded(3);
        assert!(matches!(
            sim.start(delhi(), 5, f64::NAN),
            Err(SimulatorError::InvalidStart(_))
        ));
        assert!(matches!(
            sim.start(delhi(), 5, -1.0),
            Err(SimulatorError::InvalidStart(_))
        ));
        assert_eq!(sim.mode(), FleetMode::Stopped);
    }

    #[test]
    fn nearby_sorts_by_distance() {
        let sim = running(12, 3.0);
        let sorted = sim.nearby(delhi());
        assert_eq!(sorted.len(), 12);
        for pair in sorted.windows(2) {
            assert!(distance_km(delhi(), pair[0].location) <= distance_km(delhi(), pair[1].location));
        }
    }

    #[test]
    fn recenter_keeps_count_and_moves_fleet() {
        let mut sim = running(5, 1.0);
        let mumbai = Coordinate::new(72.8777, 19.0760).expect("valid");
        sim.recenter(mumbai).expect("recenter");
        let snapshot = sim.snapshot();
        assert_eq!(snapshot.len(), 5);
        assert!(snapshot
            .drivers()
            .iter()
            .all(|d| distance_km(mumbai, d.location) <= 1.0 + 1e-6));
    }

    #[test]
    fn export_has_stable_field_names() {
        let sim = running(1, 1.0);
        let json = serde_json::to_value(sim.snapshot().to_export()).expect("json");
        let record = &json[0];
        for field in ["id", "vehicleType", "lat", "lon", "available", "etaMinutes", "rating"] {
            assert!(!record[field].is_null(), "missing {field}");
        }
    }

    #[test]
    fn fresh_drivers_take_their_vehicle_eta_range() {
        let sim = running(40, 3.0);
        for driver in sim.snapshot().drivers() {
            let (low, high) = driver.vehicle_type.eta_range();
            assert!(
                (low..=high).contains(&driver.eta_minutes),
                "{:?} started at {} min",
                driver.vehicle_type,
                driver.eta_minutes
            );
        }

        let params = FleetParams::default()
            .with_seed(7)
            .with_driver_count(20)
            .with_initial_eta_minutes(6, 6);
        let mut sim = FleetSimulator::from_params(params);
        sim.start_from_params().expect("start");
        assert!(sim.snapshot().drivers().iter().all(|d| d.eta_minutes == 6));

        let invalid = FleetParams::default().with_initial_eta_minutes(0, 3);
        let mut sim = FleetSimulator::from_params(invalid);
        assert!(matches!(
            sim.start_from_params(),
            Err(SimulatorError::InvalidStart(_))
        ));
    }
}
