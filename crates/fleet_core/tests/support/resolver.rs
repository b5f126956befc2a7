use std::sync::Arc;

use fleet_core::resolver::{
    DeviceLocator, LocationResolver, ResolverConfig, SearchDebouncer, StaticGazetteer,
};
use fleet_core::test_helpers::RecordingGazetteer;

/// Resolver over a recording popular-places gazetteer; the handle observes dispatches.
pub fn recording_resolver() -> (Arc<RecordingGazetteer>, LocationResolver) {
    let gazetteer = RecordingGazetteer::india_popular();
    let resolver = LocationResolver::new(Box::new(gazetteer.clone()), ResolverConfig::default());
    (gazetteer, resolver)
}

pub fn device_resolver(locator: Arc<dyn DeviceLocator>, timeout_ms: u64) -> LocationResolver {
    LocationResolver::new(
        Box::new(StaticGazetteer::india_popular()),
        ResolverConfig::default().with_device_timeout_ms(timeout_ms),
    )
    .with_locator(locator)
}

pub fn debouncer() -> SearchDebouncer {
    SearchDebouncer::from_config(&ResolverConfig::default())
}
