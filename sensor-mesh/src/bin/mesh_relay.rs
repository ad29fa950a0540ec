//! mesh-relay daemon
//!
//! Accepts sensor node connections and relays every report to all connected
//! nodes of the same sensor kind.
//!
//! # Usage
//!
//! ```bash
//! mesh-relay v4 51511
//! mesh-relay v6 51511 --config relay.toml
//! ```

use clap::Parser;
use sensor_mesh::config::{IpVersion, RelayConfig};
use sensor_mesh::error::{Error, Result};
use sensor_mesh::relay::{Relay, RelayServer};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Type-scoped relay for the sensor mesh
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IP version to listen on (v4 or v6)
    #[arg(required_unless_present = "config")]
    ip_version: Option<IpVersion>,

    /// TCP port to listen on
    #[arg(required_unless_present = "config")]
    port: Option<u16>,

    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<RelayConfig> {
    let mut config = match &args.config {
        Some(path) => RelayConfig::from_file(path)?,
        None => RelayConfig::default(),
    };

    if let Some(ip_version) = args.ip_version {
        config.network.ip_version = ip_version;
    }
    if let Some(port) = args.port {
        config.network.port = port;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let relay = Arc::new(Relay::new(config.relay.outbound_queue_capacity));
    let server = RelayServer::bind_port(
        config.network.ip_version,
        config.network.port,
        relay,
        running,
    )?;

    log::info!(
        "Relay started ({} mode) on port {}",
        config.network.ip_version,
        config.network.port
    );

    server.run()?;

    log::info!("Relay stopped");
    Ok(())
}
