pub mod cockpit;
pub mod config;
pub mod controller;
pub mod extension;
pub mod flight;
pub mod telemetry;
pub mod vehicle;

use crate::cockpit::{Cockpit, CockpitError};
use crate::config::{CockpitConfig, CONFIG_ENV, DRONE_IP_ENV};
use crate::controller::event_collector::{CollectorHandle, CollectorSettings};
use crate::extension::ExtensionRegistry;
use crate::vehicle::dry_run::DryRunLink;
use color_eyre::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const INPUT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = load_config()?;
    setup_logging_env(config.max_log_level()?);

    let registry = ExtensionRegistry::with_builtins();
    info!("Available extensions: {}", registry.names().join(", "));

    let link = Arc::new(DryRunLink::new(
        config.vehicle.address.clone(),
        config.vehicle.telemetry_capacity,
    ));
    info!("Vehicle link: dry run towards {}", link.address());

    let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
    let collector_cancel = CancellationToken::new();
    let collector = CollectorHandle::spawn(
        CollectorSettings {
            poll_interval: config.input_poll(),
        },
        input_tx,
        collector_cancel.clone(),
    )
    .await
    .map_err(CockpitError::from)?;

    let running = Cockpit::assemble(config, link.clone(), link, input_rx, registry)
        .install_extensions()?
        .start();

    tokio::signal::ctrl_c().await?;
    info!("Interrupted");

    collector_cancel.cancel();
    running.shutdown().await;
    tokio::task::spawn_blocking(move || collector.join()).await?;

    info!("Bye");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(())
}

fn load_config() -> Result<CockpitConfig, CockpitError> {
    let path = CockpitConfig::locate(std::env::args().nth(1), std::env::var(CONFIG_ENV).ok());
    Ok(CockpitConfig::load(&path, std::env::var(DRONE_IP_ENV).ok())?)
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
