//! Monitor configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Monitor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Monitoring behavior.
    pub monitor: MonitorConfig,
    /// MQTT sink settings.
    pub mqtt: MqttConfig,
    /// Known devices (aliases for event topics and logs).
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// A missing file is not an error; defaults are used.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - The battery poll interval is within reasonable bounds (10s - 1 hour)
    /// - The MQTT broker URL has a known scheme and the QoS is 0-2
    /// - Device addresses are not empty and not duplicated
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.monitor.validate());
        errors.extend(self.mqtt.validate());

        let mut seen = std::collections::HashSet::new();
        for (i, device) in self.devices.iter().enumerate() {
            let prefix = format!("devices[{}]", i);
            if device.address.is_empty() {
                errors.push(ValidationError {
                    field: format!("{}.address", prefix),
                    message: "device address cannot be empty".to_string(),
                });
            } else if !seen.insert(device.address.to_lowercase()) {
                errors.push(ValidationError {
                    field: format!("{}.address", prefix),
                    message: format!("duplicate device address '{}'", device.address),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Alias lookup table keyed by lowercased device address.
    pub fn aliases(&self) -> std::collections::HashMap<String, String> {
        self.devices
            .iter()
            .filter_map(|d| {
                d.alias
                    .as_ref()
                    .map(|alias| (d.address.to_lowercase(), alias.clone()))
            })
            .collect()
    }
}

/// Monitoring behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between battery reads while a remote is connected.
    pub battery_poll_interval: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            battery_poll_interval: 60,
        }
    }
}

impl MonitorConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !(10..=3600).contains(&self.battery_poll_interval) {
            errors.push(ValidationError {
                field: "monitor.battery_poll_interval".to_string(),
                message: format!(
                    "interval {}s out of bounds (10-3600)",
                    self.battery_poll_interval
                ),
            });
        }
        errors
    }
}

/// MQTT sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Whether to publish events at all.
    pub enabled: bool,
    /// Broker URL (`mqtt://host:port` or `mqtts://host:port`).
    pub broker: String,
    /// Client identifier presented to the broker.
    pub client_id: String,
    /// Leading topic segment for all published events.
    pub topic_prefix: String,
    /// QoS level for published messages (0-2).
    pub qos: u8,
    /// Whether battery/status topics are published retained.
    pub retain: bool,
    /// Keep-alive interval in seconds.
    pub keep_alive: u64,
    /// Optional broker credentials.
    pub username: Option<String>,
    /// Optional broker credentials.
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            broker: "mqtt://localhost:1883".to_string(),
            client_id: "turntouch-monitor".to_string(),
            topic_prefix: "turntouch".to_string(),
            qos: 1,
            retain: false,
            keep_alive: 30,
            username: None,
            password: None,
        }
    }
}

impl MqttConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.enabled
            && !self.broker.starts_with("mqtt://")
            && !self.broker.starts_with("mqtts://")
        {
            errors.push(ValidationError {
                field: "mqtt.broker".to_string(),
                message: format!(
                    "invalid broker '{}': expected mqtt:// or mqtts:// URL",
                    self.broker
                ),
            });
        }
        if self.qos > 2 {
            errors.push(ValidationError {
                field: "mqtt.qos".to_string(),
                message: format!("invalid QoS {}: must be 0, 1 or 2", self.qos),
            });
        }
        if self.topic_prefix.is_empty() {
            errors.push(ValidationError {
                field: "mqtt.topic_prefix".to_string(),
                message: "topic prefix cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// A known device entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Link-layer address (or platform peripheral identifier).
    pub address: String,
    /// Friendly name used in topics and logs instead of the address.
    pub alias: Option<String>,
}

/// A single validation failure.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The configuration field at fault.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  {}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("turntouch")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().expect("default config should be valid");
        assert_eq!(config.monitor.battery_poll_interval, 60);
        assert_eq!(config.mqtt.topic_prefix, "turntouch");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[mqtt]
broker = "mqtt://broker.local:1883"
topic_prefix = "home/remotes"

[[devices]]
address = "C0:FF:EE:00:00:01"
alias = "living-room"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.mqtt.broker, "mqtt://broker.local:1883");
        assert_eq!(config.mqtt.qos, 1); // default preserved
        assert_eq!(config.monitor.battery_poll_interval, 60);
        assert_eq!(
            config.aliases().get("c0:ff:ee:00:00:01").map(String::as_str),
            Some("living-room")
        );
    }

    #[test]
    fn test_invalid_broker_scheme_rejected() {
        let config = Config {
            mqtt: MqttConfig {
                broker: "http://localhost".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_out_of_bounds_poll_interval_rejected() {
        let config = Config {
            monitor: MonitorConfig {
                battery_poll_interval: 5,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_device_addresses_rejected() {
        let config = Config {
            devices: vec![
                DeviceConfig {
                    address: "AA:BB:CC:DD:EE:FF".to_string(),
                    alias: None,
                },
                DeviceConfig {
                    address: "aa:bb:cc:dd:ee:ff".to_string(),
                    alias: Some("dup".to_string()),
                },
            ],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[mqtt").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
