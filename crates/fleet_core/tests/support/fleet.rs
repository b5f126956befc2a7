use fleet_core::fleet::{FleetParams, FleetSimulator};
use fleet_core::geo::Coordinate;
use fleet_core::test_helpers::test_center;

/// Seed shared by every fleet test so runs are reproducible.
pub const FLEET_SEED: u64 = 20_240_501;

/// A running fleet of `count` drivers within `radius_km` of the test centre.
pub fn running_fleet(count: usize, radius_km: f64) -> FleetSimulator {
    running_fleet_with(FleetParams::default().with_seed(FLEET_SEED), count, radius_km)
}

pub fn running_fleet_with(params: FleetParams, count: usize, radius_km: f64) -> FleetSimulator {
    let mut sim = FleetSimulator::from_params(params);
    sim.start(test_center(), count, radius_km)
        .expect("fleet should start with valid parameters");
    sim
}

/// Every driver starts available and never moves or flips availability.
pub fn frozen_available_fleet(count: usize, radius_km: f64) -> FleetSimulator {
    let params = FleetParams {
        initial_available_probability: 1.0,
        ..FleetParams::default()
    }
    .with_seed(FLEET_SEED)
    .with_move_probability(0.0)
    .with_availability_flip_probability(0.0);
    running_fleet_with(params, count, radius_km)
}

pub fn center() -> Coordinate {
    test_center()
}
