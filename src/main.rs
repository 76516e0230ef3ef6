//! Headless acquisition runner
//!
//! Loads a system configuration, builds the measurement system and feeds
//! it simulated sensor data — useful for commissioning a configuration
//! without radio hardware attached. Runs until interrupted.

use anyhow::Context;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use loadmon::SystemConfig;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,loadmon=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "system.toml".to_string());
    let config = SystemConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;
    let mut system = config.build().context("building measurement system")?;

    info!(system = %system.name(), sensors = system.sensors().len(), "starting simulated feed");

    let addrs: Vec<_> = system
        .sensors()
        .iter()
        .map(|s| {
            let (group, node) = s.addr();
            ([group, node.unwrap_or(0)], s.devtype().input_channels())
        })
        .collect();

    let mut cycle: u64 = 0;
    loop {
        for (addr, n_in) in &addrs {
            let phase = cycle as f64 / 10.0;
            let raw: Vec<f64> = (0..*n_in)
                .map(|ch| 100.0 + 50.0 * (phase + ch as f64).sin())
                .collect();
            system.update_sensor(*addr, &raw)?;
        }
        system.process();

        // take the zero once the feed has settled
        if cycle == 20 {
            system.zero_all()?;
            info!("zero adjustment taken");
        }
        if cycle % 10 == 0 {
            info!(cycle, outputs = ?system.current_outputs(), "current values");
        }

        cycle += 1;
        std::thread::sleep(Duration::from_millis(100));
    }
}
