//! mesh-node sensor client
//!
//! Connects to a relay, emits its own reading on the kind's cadence and
//! corrects it from the three nearest same-kind neighbors. Prints one action
//! log entry per received report.
//!
//! # Usage
//!
//! ```bash
//! mesh-node 127.0.0.1 51511 --type temperature --coords 5 5
//! mesh-node ::1 51511 --type humidity --coords 2 8 --config node.toml
//! ```
//!
//! Exits with a non-zero status when the relay connection is lost.

use clap::Parser;
use sensor_mesh::config::NodeConfig;
use sensor_mesh::core::types::SensorKind;
use sensor_mesh::error::{Error, Result};
use sensor_mesh::node::{LocalSensorState, SensorNode, Session, connect};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Sensor node for the sensor mesh
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay host name or address (IPv4 or IPv6)
    #[arg(required_unless_present = "config")]
    host: Option<String>,

    /// Relay TCP port
    #[arg(required_unless_present = "config")]
    port: Option<u16>,

    /// Sensor kind: temperature, humidity or air_quality
    #[arg(short = 't', long = "type", required_unless_present = "config")]
    kind: Option<SensorKind>,

    /// Grid coordinates, each 0-9
    #[arg(
        long,
        num_args = 2,
        value_names = ["X", "Y"],
        allow_negative_numbers = true,
        required_unless_present = "config"
    )]
    coords: Option<Vec<i32>>,

    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default(),
    };

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(kind) = args.kind {
        config.sensor.kind = kind;
    }
    if let Some(coords) = &args.coords {
        let [x, y] = coords.as_slice() else {
            return Err(Error::InvalidParameter(
                "--coords takes exactly two values".to_string(),
            ));
        };
        config.sensor.x = *x;
        config.sensor.y = *y;
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

    let local = LocalSensorState::seeded(
        config.sensor.kind,
        config.sensor.coord()?,
        config.sensor.seed,
    );
    log::info!(
        "{} sensor in {} starting at {:.4} (emit every {:?})",
        local.kind,
        local.coord,
        local.measurement,
        local.emit_interval
    );

    let node = Arc::new(SensorNode::new(local, config.neighbors.capacity));
    let stream = connect(&config.server.host, config.server.port)?;

    Session::new(node, stream, io::stdout(), running).run()?;

    log::info!("Sensor node stopped");
    Ok(())
}
