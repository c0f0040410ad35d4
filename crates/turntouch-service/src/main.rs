//! Turn Touch monitor - BLE button remotes to MQTT.
//!
//! Run with: `cargo run -p turntouch-service`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use turntouch_core::{BleTransport, ManagerConfig, SessionManager, ble};
use turntouch_service::{Config, MqttPublisher};

/// Turn Touch monitor - watches BLE button remotes and publishes
/// press/release, battery and connection events to MQTT.
#[derive(Parser, Debug)]
#[command(name = "turntouch-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// MQTT broker URL (overrides config).
    #[arg(short, long)]
    broker: Option<String>,

    /// MQTT topic prefix (overrides config).
    #[arg(long)]
    topic_prefix: Option<String>,

    /// Disable MQTT publishing; events are only logged.
    #[arg(long)]
    no_mqtt: bool,

    /// Scan for matching remotes, print them, and exit without connecting.
    #[arg(long)]
    scan: bool,

    /// Scan duration in seconds for --scan.
    #[arg(long, default_value_t = 5)]
    scan_duration: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("turntouch_service=info".parse()?)
                .add_directive("turntouch_core=info".parse()?),
        )
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    // Override config with CLI args
    if let Some(broker) = args.broker {
        config.mqtt.broker = broker;
    }
    if let Some(prefix) = args.topic_prefix {
        config.mqtt.topic_prefix = prefix;
    }
    if args.no_mqtt {
        config.mqtt.enabled = false;
    }
    config.validate()?;

    let transport = Arc::new(BleTransport::new().await?);

    if args.scan {
        return run_scan(&transport, args.scan_duration).await;
    }

    let manager = Arc::new(SessionManager::with_config(
        transport,
        ManagerConfig {
            battery_poll_interval: Duration::from_secs(config.monitor.battery_poll_interval),
            ..ManagerConfig::default()
        },
    ));

    let shutdown = CancellationToken::new();

    // Event sinks: MQTT when enabled, logs always.
    if config.mqtt.enabled {
        MqttPublisher::new(config.mqtt.clone(), config.aliases())
            .start(manager.events().subscribe(), shutdown.clone());
    } else {
        info!("MQTT publishing disabled, events will only be logged");
    }
    spawn_event_logger(manager.events().subscribe());

    // Ctrl-c tears down sessions and stops the scan.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                shutdown.cancel();
            }
        });
    }

    info!("starting monitor");
    ble::run_monitor(manager, shutdown).await?;

    Ok(())
}

/// Log every domain event at info level.
fn spawn_event_logger(mut events: turntouch_core::EventReceiver) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(?event, "event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("event logger lagged, missed {} events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Diagnostic scan: list matching remotes without connecting.
async fn run_scan(transport: &BleTransport, duration_secs: u64) -> anyhow::Result<()> {
    let filter = turntouch_core::DiscoveryFilter::default();
    let found = ble::scan_once(transport, &filter, Duration::from_secs(duration_secs)).await?;

    if found.is_empty() {
        println!("No matching remotes found.");
    } else {
        for (address, alias) in found {
            match alias {
                Some(alias) => println!("{address}  {alias}"),
                None => println!("{address}"),
            }
        }
    }
    Ok(())
}
