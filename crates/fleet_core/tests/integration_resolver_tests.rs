mod support;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fleet_core::error::ResolverError;
use fleet_core::geo::Coordinate;
use fleet_core::resolver::{
    DeviceError, DeviceLocator, FailingLocator, FieldId, FixedLocator, LocationSource,
    PositionOptions, Submission, DEFAULT_CENTER,
};
use support::resolver::{debouncer, device_resolver, recording_resolver};

struct HangingLocator;

impl DeviceLocator for HangingLocator {
    fn current_position(&self, _options: &PositionOptions) -> Result<Coordinate, DeviceError> {
        thread::sleep(Duration::from_secs(5));
        Err(DeviceError::Timeout)
    }
}

#[test]
fn typing_within_the_window_dispatches_only_the_last_query() {
    let (gazetteer, resolver) = recording_resolver();
    let mut debouncer = debouncer();

    assert_eq!(debouncer.submit(FieldId::Pickup, "a", 0), Submission::Cleared);
    assert!(matches!(
        debouncer.submit(FieldId::Pickup, "ab", 150),
        Submission::Scheduled { due_ms: 450, .. }
    ));

    assert!(debouncer.poll(300, &resolver).is_empty());
    let outcomes = debouncer.poll(450, &resolver);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].query, "ab");
    assert!(debouncer.poll(5_000, &resolver).is_empty());
    assert_eq!(gazetteer.searches(), vec!["ab".to_string()]);
}

#[test]
fn rapid_retyping_restarts_the_quiet_period() {
    let (gazetteer, resolver) = recording_resolver();
    let mut debouncer = debouncer();
    for (at, text) in [(0, "Mu"), (200, "Mum"), (400, "Mumb"), (600, "Mumbai Airport")] {
        debouncer.submit(FieldId::Destination, text, at);
        assert!(debouncer.poll(at, &resolver).is_empty());
    }
    let outcomes = debouncer.poll(900, &resolver);
    assert_eq!(outcomes.len(), 1);
    let locations = outcomes[0].result.clone().expect("lookup");
    assert_eq!(locations[0].display_name, "Mumbai Airport, Mumbai");
    assert_eq!(gazetteer.search_count(), 1);
}

#[test]
fn teardown_discards_pending_lookups() {
    let (gazetteer, resolver) = recording_resolver();
    let mut debouncer = debouncer();
    debouncer.submit(FieldId::Pickup, "Connaught Place", 0);
    debouncer.submit(FieldId::Destination, "Chennai Central", 10);
    debouncer.cancel_all();
    assert!(debouncer.poll(10_000, &resolver).is_empty());
    assert_eq!(gazetteer.search_count(), 0);
}

#[test]
fn repeated_dispatches_are_served_from_cache() {
    let (gazetteer, resolver) = recording_resolver();
    let mut debouncer = debouncer();
    debouncer.submit(FieldId::Pickup, "Kolkata Airport", 0);
    debouncer.poll(300, &resolver);
    debouncer.submit(FieldId::Destination, "kolkata  airport", 400);
    let outcomes = debouncer.poll(700, &resolver);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(gazetteer.search_count(), 1);
}

#[test]
fn device_fix_is_named_by_reverse_lookup() {
    let airport = Coordinate::new(72.8680, 19.0897).expect("valid");
    let resolver = device_resolver(Arc::new(FixedLocator(airport)), 1_000);
    let location = resolver.resolve_current_device().expect("fix");
    assert_eq!(location.source, LocationSource::CurrentDevice);
    assert_eq!(location.coordinate, airport);
    assert_eq!(location.display_name, "Mumbai Airport, Mumbai");
}

#[test]
fn unnamed_device_fix_gets_a_coordinate_label() {
    let sea = Coordinate::new(70.0, 15.0).expect("valid");
    let resolver = device_resolver(Arc::new(FixedLocator(sea)), 1_000);
    let location = resolver.resolve_current_device().expect("fix");
    assert_eq!(location.display_name, "Current Location (15.0000, 70.0000)");
}

#[test]
fn denied_permission_degrades_to_map_center() {
    let resolver = device_resolver(Arc::new(FailingLocator(DeviceError::PermissionDenied)), 1_000);
    assert_eq!(
        resolver.resolve_current_device(),
        Err(ResolverError::PermissionDenied)
    );
    let fallback = resolver.resolve_current_device_or_center();
    assert_eq!(fallback.source, LocationSource::Unresolved);
    assert_eq!(
        (fallback.coordinate.longitude(), fallback.coordinate.latitude()),
        DEFAULT_CENTER
    );
}

#[test]
fn hanging_device_is_abandoned_after_the_timeout() {
    let resolver = device_resolver(Arc::new(HangingLocator), 50);
    let started = std::time::Instant::now();
    assert_eq!(resolver.resolve_current_device(), Err(ResolverError::Timeout));
    assert!(started.elapsed() < Duration::from_secs(2));
}
