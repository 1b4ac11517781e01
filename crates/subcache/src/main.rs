//! subcache demo entry point.

use anyhow::Result;
use clap::Parser;
use subcache::cli::Cli;
use subcache::config::Config;
use subcache::output::{format_snapshot, format_summary};
use subcache::simulation::Simulation;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "subcache=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.apply(Config::from_env());
    tracing::info!(
        ticks = cli.ticks,
        tick_ms = config.tick_ms,
        destinations = ?config.destinations,
        "Starting simulation"
    );

    let mut simulation = Simulation::new(&config, cli.seed)?;

    for _ in 0..cli.ticks {
        tokio::select! {
            _ = tokio::time::sleep(config.tick()) => {}
            _ = signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, stopping early...");
                break;
            }
        }

        let snapshot = simulation.step()?;
        println!("{}", format_snapshot(&snapshot, cli.format));
    }

    let summary = simulation.finish();
    println!("{}", format_summary(&summary, cli.format));

    Ok(())
}
