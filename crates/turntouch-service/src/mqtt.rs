//! MQTT publisher for broadcasting remote-control events.
//!
//! Subscribes to the session manager's event channel and publishes every
//! domain event to an MQTT broker.
//!
//! # Topic Structure
//!
//! - `{prefix}/{device}/{direction}` - `pressed` / `released` per button
//! - `{prefix}/{device}/battery` - battery percentage
//! - `{prefix}/{device}/status` - `connected` / `disconnected`
//! - `{prefix}/{device}/events` - the full event as JSON
//!
//! Where `{prefix}` is configurable (default: "turntouch") and `{device}` is
//! the configured alias or the device address, sanitized for topic use.
//!
//! # Example Configuration
//!
//! ```toml
//! [mqtt]
//! enabled = true
//! broker = "mqtt://localhost:1883"
//! topic_prefix = "home/remotes"
//! qos = 1
//! retain = true
//! ```
//!
//! # Reconnection
//!
//! The client automatically reconnects if the connection is lost. Connection
//! errors are logged but don't stop the publisher task.

use std::collections::HashMap;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use turntouch_core::{ConnectionState, EventReceiver, RemoteEvent};

use crate::config::MqttConfig;

/// MQTT publisher that forwards remote events to a broker.
pub struct MqttPublisher {
    config: MqttConfig,
    /// Friendly names keyed by lowercased device address.
    aliases: HashMap<String, String>,
}

impl MqttPublisher {
    /// Create a new MQTT publisher.
    pub fn new(config: MqttConfig, aliases: HashMap<String, String>) -> Self {
        Self { config, aliases }
    }

    /// Start the publisher.
    ///
    /// Spawns a background task that connects to the configured broker and
    /// publishes every event received on `events` until `stop` is cancelled.
    /// Returns immediately.
    pub fn start(self, events: EventReceiver, stop: CancellationToken) {
        if !self.config.enabled {
            info!("MQTT publisher is disabled");
            return;
        }

        info!("Starting MQTT publisher to {}", self.config.broker);
        tokio::spawn(async move {
            run_mqtt_publisher(self.config, self.aliases, events, stop).await;
        });
    }
}

/// Run the MQTT publisher loop.
async fn run_mqtt_publisher(
    config: MqttConfig,
    aliases: HashMap<String, String>,
    mut events: EventReceiver,
    stop: CancellationToken,
) {
    let (host, port, use_tls) = match parse_broker_url(&config.broker) {
        Ok(parsed) => parsed,
        Err(e) => {
            error!("Invalid MQTT broker URL: {}", e);
            return;
        }
    };

    let mut mqtt_options = MqttOptions::new(&config.client_id, host, port);
    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive));

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        mqtt_options.set_credentials(username, password);
    }

    if use_tls {
        mqtt_options.set_transport(rumqttc::Transport::tls_with_config(
            rumqttc::TlsConfiguration::Native,
        ));
    }

    let qos = match config.qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    };

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 100);

    info!(
        "MQTT publisher connected to {} with prefix '{}'",
        config.broker, config.topic_prefix
    );

    // Event loop handler: drives the connection and logs trouble.
    let connection_stop = stop.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = connection_stop.cancelled() => break,
                polled = eventloop.poll() => match polled {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        info!("MQTT connected: {:?}", ack);
                    }
                    Ok(Event::Incoming(Packet::PingResp)) => {
                        debug!("MQTT ping response received");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("MQTT connection error: {}. Reconnecting...", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }
    });

    // Main publishing loop.
    loop {
        tokio::select! {
            result = events.recv() => {
                match result {
                    Ok(event) => {
                        if let Err(e) = publish_event(&client, &config, &aliases, &event, qos).await {
                            warn!("Failed to publish event: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("MQTT publisher lagged, missed {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Event channel closed, stopping MQTT publisher");
                        break;
                    }
                }
            }
            _ = stop.cancelled() => {
                info!("MQTT publisher received stop signal");
                break;
            }
        }
    }

    if let Err(e) = client.disconnect().await {
        debug!("Error disconnecting MQTT client: {}", e);
    }

    info!("MQTT publisher stopped");
}

/// Publish one event to its topics.
async fn publish_event(
    client: &AsyncClient,
    config: &MqttConfig,
    aliases: &HashMap<String, String>,
    event: &RemoteEvent,
    qos: QoS,
) -> Result<(), rumqttc::ClientError> {
    let prefix = &config.topic_prefix;
    let device = device_segment(aliases, event);

    match event {
        RemoteEvent::ButtonPressed { direction, .. } => {
            let topic = format!("{}/{}/{}", prefix, device, direction);
            client.publish(&topic, qos, false, "pressed").await?;
        }
        RemoteEvent::ButtonReleased { direction, .. } => {
            let topic = format!("{}/{}/{}", prefix, device, direction);
            client.publish(&topic, qos, false, "released").await?;
        }
        RemoteEvent::BatteryLevel { percent, .. } => {
            let topic = format!("{}/{}/battery", prefix, device);
            client
                .publish(&topic, qos, config.retain, percent.to_string())
                .await?;
        }
        RemoteEvent::ConnectionStateChanged { state, .. } => {
            let topic = format!("{}/{}/status", prefix, device);
            let payload = match state {
                ConnectionState::Connected => "connected",
                ConnectionState::Disconnected => "disconnected",
            };
            client.publish(&topic, qos, config.retain, payload).await?;
        }
        // Future event kinds still land on the JSON topic below.
        _ => {}
    }

    let json_topic = format!("{}/{}/events", prefix, device);
    let json_payload = serde_json::to_string(event).unwrap_or_default();
    client
        .publish(&json_topic, qos, false, json_payload.as_bytes())
        .await?;

    debug!("Published {:?} for {}", event, device);
    Ok(())
}

/// Topic segment for the event's device: configured alias, advertised alias,
/// or the raw address, sanitized.
fn device_segment(aliases: &HashMap<String, String>, event: &RemoteEvent) -> String {
    let device = match event {
        RemoteEvent::ButtonPressed { device, .. }
        | RemoteEvent::ButtonReleased { device, .. }
        | RemoteEvent::BatteryLevel { device, .. }
        | RemoteEvent::ConnectionStateChanged { device, .. } => device,
        _ => return "unknown".to_string(),
    };

    let name = aliases
        .get(&device.address.to_lowercase())
        .cloned()
        .or_else(|| device.alias.clone())
        .unwrap_or_else(|| device.address.clone());
    sanitize_topic_segment(&name)
}

/// Parse an MQTT broker URL into (host, port, use_tls).
fn parse_broker_url(url: &str) -> Result<(String, u16, bool), String> {
    let (scheme, rest) = if let Some(stripped) = url.strip_prefix("mqtt://") {
        ("mqtt", stripped)
    } else if let Some(stripped) = url.strip_prefix("mqtts://") {
        ("mqtts", stripped)
    } else {
        return Err("Invalid scheme: URL must start with mqtt:// or mqtts://".to_string());
    };

    let use_tls = scheme == "mqtts";
    let default_port = if use_tls { 8883 } else { 1883 };

    let (host, port) = if let Some((h, p)) = rest.rsplit_once(':') {
        let port = p
            .parse::<u16>()
            .map_err(|_| format!("Invalid port: {}", p))?;
        (h.to_string(), port)
    } else {
        (rest.to_string(), default_port)
    };

    if host.is_empty() {
        return Err("Host cannot be empty".to_string());
    }

    Ok((host, port, use_tls))
}

/// Sanitize a device name for use in MQTT topics.
///
/// MQTT topics cannot contain '#' or '+' wildcards, and should avoid spaces.
fn sanitize_topic_segment(s: &str) -> String {
    s.replace(['#', '+', ' ', '/'], "_")
}
