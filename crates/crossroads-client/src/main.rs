//! crossroads-sim binary
//!
//! Runs a multi-vehicle intersection simulation and prints the report as JSON.
//!
//! Client settings come from the usual `CROSSROADS_*` variables. On top of
//! those:
//!
//! - `CROSSROADS_SIM_SEED`: jitter and loss seed (default 42)
//! - `CROSSROADS_SIM_LOSS`: beacon loss rate; switches to periodic delivery
//! - `CROSSROADS_SIM_SCENARIO`: path to a JSON scenario file

use std::env;

use crossroads_client::{ClientConfig, Delivery, Scenario, Simulation, SimulationConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crossroads=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = ClientConfig::from_env()?;
    let topology = client.load_topology()?;

    let mut config = SimulationConfig {
        client,
        ..SimulationConfig::default()
    };
    if let Ok(seed) = env::var("CROSSROADS_SIM_SEED") {
        config.seed = seed.parse()?;
    }
    if let Ok(loss) = env::var("CROSSROADS_SIM_LOSS") {
        config.delivery = Delivery::Periodic {
            loss_rate: loss.parse()?,
        };
    }

    let scenario = match env::var("CROSSROADS_SIM_SCENARIO") {
        Ok(path) => Scenario::load(path)?,
        Err(_) => Scenario::four_way_rush(),
    };

    tracing::info!(
        intersection = topology.name(),
        policy = %config.client.policy,
        vehicles = scenario.vehicles.len(),
        "starting simulation"
    );

    let mut sim = Simulation::new(config, topology)?;
    sim.add_scenario(scenario)?;
    let report = sim.run()?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    for v in &report.violations {
        tracing::warn!(first = %v.first, second = %v.second, from = v.from, until = v.until, "conflicting vehicles crossed together");
    }
    if !report.all_finished() {
        tracing::warn!("horizon reached before every vehicle got through");
    }

    Ok(())
}
