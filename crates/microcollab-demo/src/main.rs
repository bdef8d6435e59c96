//! Demo binary for the MicroCollab marketplace engine.
//!
//! Loads configuration, seeds the store, subscribes a logging listener to
//! the activity feed, runs the simulation for a bounded time, and prints
//! the final stats and most recent events.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `microcollab-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the simulation context from the configured seed
//! 4. Seed the initial listing through the dashboard facade
//! 5. Attach the feed listener and start the timer
//! 6. Stop after `demo.run_seconds` (or on Ctrl-C) and report

mod error;
mod feed_listener;

use std::path::Path;
use std::time::Duration;

use microcollab_core::config::SimulationConfig;
use microcollab_core::{DemoMarketplace, Simulation};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::DemoError;

const CONFIG_PATH: &str = "microcollab-config.yaml";

#[tokio::main]
async fn main() -> Result<(), DemoError> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging. RUST_LOG wins over the config.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        seed = config.market.seed,
        initial_requests = config.market.initial_requests,
        min_interval_ms = config.ticks.min_interval_ms,
        max_interval_ms = config.ticks.max_interval_ms,
        run_seconds = config.demo.run_seconds,
        "microcollab-demo starting"
    );

    // 3. Create the simulation context.
    let simulation = Simulation::create(&config, SmallRng::seed_from_u64(config.market.seed))?;

    // 4. Seed through the facade so it holds the first snapshot.
    let mut market = DemoMarketplace::new(simulation.clone());
    let seeded = market.load_initial_data()?;
    info!(
        requests = seeded,
        visible = market.requests().len(),
        "Initial listing loaded"
    );

    // 5. Attach the feed listener and start ticking.
    let (feed_subscription, counts) = feed_listener::attach(&simulation);
    let _ = market.start_simulation()?;

    // 6. Run until the deadline or Ctrl-C.
    let run_for = Duration::from_secs(config.demo.run_seconds);
    tokio::select! {
        () = tokio::time::sleep(run_for) => {
            info!(seconds = config.demo.run_seconds, "Demo run time elapsed");
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "Failed to listen for Ctrl-C");
            } else {
                info!("Interrupted");
            }
        }
    }

    let _ = market.stop_simulation();
    let _ = market.sync()?;
    drop(feed_subscription);

    report(&market, &counts, config.demo.feed_size)?;
    simulation.dispose();
    info!(ticks = simulation.ticks_run(), "microcollab-demo finished");
    Ok(())
}

/// Load configuration from `microcollab-config.yaml`, falling back to
/// defaults when the file is absent.
fn load_config() -> Result<SimulationConfig, DemoError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok(SimulationConfig::from_file(config_path)?)
    } else {
        let mut config = SimulationConfig::default();
        config.market.apply_env_overrides();
        Ok(config)
    }
}

/// Print final stats as JSON, per-type counts, and the newest events.
#[allow(clippy::print_stdout)]
fn report(
    market: &DemoMarketplace,
    counts: &feed_listener::FeedCounts,
    feed_size: usize,
) -> Result<(), DemoError> {
    println!("{}", serde_json::to_string_pretty(&market.stats())?);

    println!();
    println!("events by type ({} total):", counts.total());
    for (kind, n) in counts.snapshot() {
        println!("  {:<20} {n}", serde_json::to_string(&kind)?.trim_matches('"'));
    }

    println!();
    println!("latest activity:");
    for event in market.recent_events(feed_size)? {
        println!(
            "  {} {}",
            event.timestamp.format("%H:%M:%S"),
            event.summary
        );
    }
    Ok(())
}
