//! Turn Touch monitor daemon library.
//!
//! Wires the BLE session core to an MQTT sink:
//!
//! - [`config`]: TOML configuration with CLI-friendly overrides
//! - [`mqtt`]: publisher forwarding domain events to a broker
//!
//! The `turntouch-service` binary in `main.rs` assembles these with the
//! transport and session manager from `turntouch-core`.

pub mod config;
pub mod mqtt;

pub use config::{Config, ConfigError, DeviceConfig, MonitorConfig, MqttConfig};
pub use mqtt::MqttPublisher;
