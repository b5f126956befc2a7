use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use fleet_core::clock::TickCadence;
use fleet_core::config::EngineConfig;
use fleet_core::error::QuoteError;
use fleet_core::fleet::{FleetSimulator, FleetSnapshot};
use fleet_core::geo::Coordinate;
use fleet_core::pricing::{
    FareAdjustment, FareModifiers, VehicleType, FEMALE_DRIVER, SUBSCRIPTION_DISCOUNT,
};
use fleet_core::quote::TripQuoteService;
use fleet_core::resolver::{FieldId, Gazetteer, LocationResolver, SearchDebouncer, StaticGazetteer};
use fleet_core::route::{RouteBuilder, RoutePlanner};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "nominatim")]
use fleet_core::resolver::nominatim::{NominatimGazetteer, DEFAULT_ENDPOINT};
#[cfg(not(feature = "nominatim"))]
const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org";

type CliResult<T> = Result<T, Box<dyn Error>>;

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "fleet",
    about = "Simulated fleet and trip quotes for Indian cities",
    long_about = "Drive the fleet simulator, quote trips between free-text places,\n\
                  build great-circle routes and try the debounced place search."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// JSON engine config; missing keys fall back to defaults
    #[arg(long, global = true, env = "FLEET_CONFIG")]
    config: Option<PathBuf>,
    /// Use the built-in table of popular places instead of Nominatim
    #[arg(long, global = true)]
    offline: bool,
    /// Nominatim base URL
    #[arg(long, global = true, env = "FLEET_NOMINATIM_URL", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a fleet and tick it, printing each snapshot
    Simulate {
        #[arg(long)]
        drivers: Option<usize>,
        #[arg(long)]
        radius_km: Option<f64>,
        #[arg(long, default_value_t = 5)]
        ticks: u64,
        #[arg(long)]
        seed: Option<u64>,
        /// Fleet centre as free text (defaults to the configured centre)
        #[arg(long)]
        near: Option<String>,
        /// Tick on the configured wall-clock interval instead of back to back
        #[arg(long)]
        realtime: bool,
        /// Print the final fleet in the rendering export format
        #[arg(long)]
        json: bool,
    },
    /// Quote a trip between two places
    Quote {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long, default_value_t = VehicleType::Taxi)]
        vehicle: VehicleType,
        /// Prefer a female driver (+15 %)
        #[arg(long)]
        female_driver: bool,
        /// Apply the subscriber discount (-25 %)
        #[arg(long)]
        subscription: bool,
        /// Flat toll add-on in rupees
        #[arg(long)]
        toll: Option<f64>,
        /// Price the fastest, shortest and toll-avoiding variants
        #[arg(long)]
        variants: bool,
        /// Simulate this many drivers around the pickup and report the pickup ETA
        #[arg(long)]
        fleet_drivers: Option<usize>,
    },
    /// Build a route between two places and print it as GeoJSON
    Route {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        resolution: Option<usize>,
    },
    /// Type a query keystroke by keystroke through the debounced search
    Search {
        query: String,
        /// Simulated delay between keystrokes
        #[arg(long, default_value_t = 120)]
        keystroke_ms: u64,
    },
}

// ── helpers ────────────────────────────────────────────────────────

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_core=info,fleet_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(global: &GlobalArgs) -> CliResult<EngineConfig> {
    match &global.config {
        Some(path) => {
            info!(path = %path.display(), "loading engine config");
            Ok(EngineConfig::from_json_file(path)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

#[cfg(feature = "nominatim")]
fn online_gazetteer(endpoint: &str, config: &EngineConfig) -> CliResult<Box<dyn Gazetteer>> {
    Ok(Box::new(NominatimGazetteer::from_config(
        endpoint,
        &config.resolver,
    )?))
}

#[cfg(not(feature = "nominatim"))]
fn online_gazetteer(endpoint: &str, _config: &EngineConfig) -> CliResult<Box<dyn Gazetteer>> {
    warn!(endpoint, "built without the nominatim feature, using offline places");
    Ok(Box::new(StaticGazetteer::india_popular()))
}

fn gazetteer(global: &GlobalArgs, config: &EngineConfig) -> CliResult<Box<dyn Gazetteer>> {
    if global.offline {
        Ok(Box::new(StaticGazetteer::india_popular()))
    } else {
        online_gazetteer(&global.endpoint, config)
    }
}

fn location_resolver(
    global: &GlobalArgs,
    config: &EngineConfig,
) -> CliResult<LocationResolver> {
    Ok(LocationResolver::new(
        gazetteer(global, config)?,
        config.resolver.clone(),
    ))
}

fn fare_modifiers(
    female_driver: bool,
    subscription: bool,
    toll: Option<f64>,
) -> BTreeMap<String, FareAdjustment> {
    let mut modifiers = BTreeMap::new();
    if female_driver {
        modifiers.insert(FEMALE_DRIVER.to_string(), FareAdjustment::Percent(0.15));
    }
    if subscription {
        modifiers.insert(
            SUBSCRIPTION_DISCOUNT.to_string(),
            FareAdjustment::Percent(-0.25),
        );
    }
    if let Some(amount) = toll {
        modifiers.insert("toll".to_string(), FareAdjustment::Flat(amount));
    }
    modifiers
}

fn first_match(resolver: &LocationResolver, text: &str) -> CliResult<Coordinate> {
    resolver
        .resolve(text)?
        .into_iter()
        .next()
        .map(|location| location.coordinate)
        .ok_or_else(|| format!("no place matches `{text}`").into())
}

fn print_json(value: &serde_json::Value) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn summarize(snapshot: &FleetSnapshot) {
    info!(
        tick = snapshot.tick(),
        drivers = snapshot.len(),
        available = snapshot.available_count(),
        "fleet snapshot"
    );
}

// ── commands ───────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn simulate(
    config: EngineConfig,
    resolver: &LocationResolver,
    drivers: Option<usize>,
    radius_km: Option<f64>,
    ticks: u64,
    seed: Option<u64>,
    near: Option<&str>,
    realtime: bool,
    json: bool,
) -> CliResult<()> {
    let mut params = config.fleet;
    if let Some(seed) = seed {
        params = params.with_seed(seed);
    }
    let center = match near {
        Some(text) => first_match(resolver, text)?,
        None => params.center_coordinate()?,
    };
    let count = drivers.unwrap_or(params.driver_count);
    let radius_km = radius_km.unwrap_or(params.radius_km);
    let interval_ms = params.tick_interval_ms;

    let mut sim = FleetSimulator::from_params(params);
    sim.start(center, count, radius_km)?;
    summarize(&sim.snapshot());

    if realtime {
        let started = Instant::now();
        let mut cadence = TickCadence::new(interval_ms);
        cadence.due(0);
        let mut done = 0;
        while done < ticks {
            let now_ms = started.elapsed().as_millis() as u64;
            for _ in 0..cadence.due(now_ms) {
                if done < ticks {
                    summarize(&sim.tick()?);
                    done += 1;
                }
            }
            thread::sleep(Duration::from_millis(100));
        }
    } else {
        for _ in 0..ticks {
            summarize(&sim.tick()?);
        }
    }
    sim.stop();

    let snapshot = sim.snapshot();
    if json {
        print_json(&serde_json::to_value(snapshot.to_export())?)?;
    } else {
        for driver in snapshot.nearby(center) {
            println!(
                "{:<10} {:<16} {:>9.4},{:>9.4}  {:<11} eta {:>2} min  ★{:.1}",
                driver.id,
                driver.vehicle_type.label(),
                driver.location.latitude(),
                driver.location.longitude(),
                if driver.available { "available" } else { "busy" },
                driver.eta_minutes,
                driver.rating,
            );
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn quote(
    config: &EngineConfig,
    service: &TripQuoteService,
    from: &str,
    to: &str,
    vehicle: VehicleType,
    modifiers: &BTreeMap<String, FareAdjustment>,
    variants: bool,
    fleet_drivers: Option<usize>,
) -> CliResult<()> {
    if variants {
        let modifiers = FareModifiers::try_from(modifiers.clone()).map_err(QuoteError::from)?;
        let trip = service.quote_variants(from, to, vehicle, &modifiers)?;
        let rows: Vec<_> = trip
            .variants
            .iter()
            .map(|v| {
                json!({
                    "variant": v.variant,
                    "distanceKm": v.distance_km,
                    "durationMinutes": v.duration_minutes,
                    "fare": v.fare.to_export(),
                })
            })
            .collect();
        return print_json(&json!({
            "pickup": trip.pickup.display_name,
            "destination": trip.destination.display_name,
            "vehicleType": trip.vehicle_type,
            "variants": rows,
        }));
    }

    let trip = match fleet_drivers {
        Some(count) => {
            let modifiers =
                FareModifiers::try_from(modifiers.clone()).map_err(QuoteError::from)?;
            let pickup = first_match(service.resolver(), from)?;
            let mut sim = FleetSimulator::from_params(config.fleet.clone());
            sim.start(pickup, count, config.fleet.radius_km)?;
            service.quote_with_fleet(from, to, vehicle, &modifiers, &sim.snapshot())?
        }
        None => service.quote(from, to, vehicle, modifiers)?,
    };

    print_json(&json!({
        "pickup": trip.pickup.display_name,
        "destination": trip.destination.display_name,
        "vehicleType": trip.vehicle_type,
        "distanceKm": trip.distance_km,
        "durationMinutes": trip.duration_minutes,
        "pickupEtaMinutes": trip.pickup_eta_minutes,
        "fare": trip.fare.to_export(),
    }))
}

fn route(
    config: &EngineConfig,
    resolver: &LocationResolver,
    from: &str,
    to: &str,
    resolution: Option<usize>,
) -> CliResult<()> {
    let pickup = first_match(resolver, from)?;
    let destination = first_match(resolver, to)?;
    let builder = RouteBuilder::new(config.route.clone());
    let resolution = resolution.unwrap_or(builder.default_resolution());
    let route = builder.build(pickup, destination, resolution)?;
    print_json(&route.to_geojson())
}

fn search(resolver: &LocationResolver, query: &str, keystroke_ms: u64) -> CliResult<()> {
    let mut debouncer = SearchDebouncer::from_config(resolver.config());
    let mut now_ms = 0;
    let mut typed = String::new();
    for ch in query.chars() {
        typed.push(ch);
        debouncer.submit(FieldId::Pickup, &typed, now_ms);
        for outcome in debouncer.poll(now_ms, resolver) {
            info!(query = %outcome.query, "intermediate suggestions");
        }
        now_ms += keystroke_ms;
    }

    let Some(due_ms) = debouncer.next_due() else {
        warn!(query, "query too short to search");
        return Ok(());
    };
    for outcome in debouncer.poll(due_ms, resolver) {
        let locations = outcome.result?;
        print_json(&json!({
            "query": outcome.query,
            "suggestions": locations,
        }))?;
    }
    Ok(())
}

fn run(cli: Cli) -> CliResult<()> {
    let config = load_config(&cli.global)?;
    match cli.command {
        Commands::Simulate {
            drivers,
            radius_km,
            ticks,
            seed,
            near,
            realtime,
            json,
        } => {
            let resolver = location_resolver(&cli.global, &config)?;
            simulate(
                config,
                &resolver,
                drivers,
                radius_km,
                ticks,
                seed,
                near.as_deref(),
                realtime,
                json,
            )
        }
        Commands::Quote {
            from,
            to,
            vehicle,
            female_driver,
            subscription,
            toll,
            variants,
            fleet_drivers,
        } => {
            let service =
                TripQuoteService::from_config(gazetteer(&cli.global, &config)?, &config);
            let modifiers = fare_modifiers(female_driver, subscription, toll);
            quote(
                &config,
                &service,
                &from,
                &to,
                vehicle,
                &modifiers,
                variants,
                fleet_drivers,
            )
        }
        Commands::Route {
            from,
            to,
            resolution,
        } => {
            let resolver = location_resolver(&cli.global, &config)?;
            route(&config, &resolver, &from, &to, resolution)
        }
        Commands::Search {
            query,
            keystroke_ms,
        } => {
            let resolver = location_resolver(&cli.global, &config)?;
            search(&resolver, &query, keystroke_ms)
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
