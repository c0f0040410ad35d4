//! Domain events emitted by sessions for external sinks.
//!
//! The core has no opinion about where events go; a sink (an MQTT bridge, a
//! log, a test harness) subscribes to the manager's [`EventDispatcher`] and
//! receives every event emitted by every session.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use turntouch_types::Direction;

/// Device identifier attached to every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRef {
    /// Link-layer address (or platform peripheral identifier).
    pub address: String,
    /// Advertised local name, if known.
    pub alias: Option<String>,
}

impl DeviceRef {
    /// Create a device reference without an alias.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            alias: None,
        }
    }

    /// Create a device reference with an alias.
    pub fn with_alias(address: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            alias: Some(alias.into()),
        }
    }
}

/// Connection state carried by [`RemoteEvent::ConnectionStateChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Link established.
    Connected,
    /// Link lost or torn down.
    Disconnected,
}

/// Events emitted by device sessions.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum RemoteEvent {
    /// The session's connection state changed.
    ConnectionStateChanged {
        device: DeviceRef,
        state: ConnectionState,
    },
    /// A direction button transitioned released -> held.
    ButtonPressed {
        device: DeviceRef,
        direction: Direction,
    },
    /// A direction button transitioned held -> released.
    ButtonReleased {
        device: DeviceRef,
        direction: Direction,
    },
    /// A battery reading was decoded (from a poll or a pushed notification).
    BatteryLevel { device: DeviceRef, percent: u8 },
}

/// Sender for remote events.
pub type EventSender = broadcast::Sender<RemoteEvent>;

/// Receiver for remote events.
pub type EventReceiver = broadcast::Receiver<RemoteEvent>;

/// Event dispatcher fanning events out to any number of receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: RemoteEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the sender for direct use.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = RemoteEvent::ButtonPressed {
            device: DeviceRef::with_alias("AA:BB:CC:DD:EE:FF", "Living Room"),
            direction: Direction::North,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"button_pressed\""));
        assert!(json.contains("\"direction\":\"north\""));
        assert!(json.contains("Living Room"));
    }

    #[test]
    fn test_connection_state_serialization() {
        let event = RemoteEvent::ConnectionStateChanged {
            device: DeviceRef::new("AA:BB:CC:DD:EE:FF"),
            state: ConnectionState::Disconnected,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"state\":\"disconnected\""));
    }

    #[test]
    fn test_dispatcher_fan_out() {
        let dispatcher = EventDispatcher::new(8);
        let mut rx1 = dispatcher.subscribe();
        let mut rx2 = dispatcher.subscribe();

        dispatcher.send(RemoteEvent::BatteryLevel {
            device: DeviceRef::new("X"),
            percent: 42,
        });

        assert!(matches!(
            rx1.try_recv().unwrap(),
            RemoteEvent::BatteryLevel { percent: 42, .. }
        ));
        assert!(matches!(
            rx2.try_recv().unwrap(),
            RemoteEvent::BatteryLevel { percent: 42, .. }
        ));
    }

    #[test]
    fn test_dispatcher_send_without_receivers_is_ok() {
        let dispatcher = EventDispatcher::default();
        dispatcher.send(RemoteEvent::BatteryLevel {
            device: DeviceRef::new("X"),
            percent: 1,
        });
        assert_eq!(dispatcher.receiver_count(), 0);
    }
}
