//! Performance benchmarks for fleet_core using Criterion.rs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fleet_core::fleet::FleetSimulator;
use fleet_core::geo::distance_km;
use fleet_core::pricing::{FareEstimator, FareModifiers, PricingConfig, RouteVariant, VehicleType};
use fleet_core::route::{CachedRouteBuilder, RouteBuilder, RouteConfig, RoutePlanner};
use fleet_core::test_helpers::{coordinate, test_center, TEST_DESTINATION, TEST_PICKUP};

fn bench_fleet_tick(c: &mut Criterion) {
    let fleets = vec![("small", 10), ("medium", 100), ("large", 1_000)];

    let mut group = c.benchmark_group("fleet_tick");
    for (name, drivers) in fleets {
        group.bench_with_input(BenchmarkId::from_parameter(name), &drivers, |b, &drivers| {
            let mut sim = FleetSimulator::seeded(42);
            if sim.start(test_center(), drivers, 3.0).is_err() {
                return;
            }
            b.iter(|| black_box(sim.tick()));
        });
    }
    group.finish();
}

fn bench_route_building(c: &mut Criterion) {
    let (pickup, destination) = (coordinate(TEST_PICKUP), coordinate(TEST_DESTINATION));

    let mut group = c.benchmark_group("route_building");
    for resolution in [10usize, 100, 1_000] {
        group.bench_with_input(
            BenchmarkId::new("uncached", resolution),
            &resolution,
            |b, &resolution| {
                let builder = RouteBuilder::default();
                b.iter(|| black_box(builder.build(pickup, destination, resolution)));
            },
        );
    }
    group.bench_function("cached_100", |b| {
        let builder = CachedRouteBuilder::from_config(RouteConfig::default());
        b.iter(|| black_box(builder.build(pickup, destination, 100)));
    });
    group.finish();
}

fn bench_fare_variants(c: &mut Criterion) {
    let estimator = FareEstimator::new(PricingConfig::default());
    let modifiers = FareModifiers::female_driver().merge(FareModifiers::subscription_discount());
    let distance = distance_km(coordinate(TEST_PICKUP), coordinate(TEST_DESTINATION));

    c.bench_function("fare_variants", |b| {
        b.iter(|| {
            black_box(estimator.estimate_variants(
                distance,
                VehicleType::Premium,
                &modifiers,
                &RouteVariant::ALL,
            ))
        });
    });
}

criterion_group!(
    benches,
    bench_fleet_tick,
    bench_route_building,
    bench_fare_variants
);
criterion_main!(benches);
