//! Transport abstraction between sessions and the BLE stack.
//!
//! Sessions never talk to the radio directly: every adapter operation goes
//! through the [`RemoteTransport`] trait, implemented by the btleplug-backed
//! transport in [`crate::ble`] and by the mock in [`crate::mock`]. This keeps
//! the state machine free of any coupling to a particular BLE library and
//! makes it testable without hardware.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// Descriptor of a characteristic discovered during service resolution.
///
/// This is a borrowed-by-value view of an adapter-owned characteristic: it
/// carries just enough to address the characteristic through the transport
/// and is dropped when the session's handles are cleared on disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    /// UUID of the owning service.
    pub service: Uuid,
    /// UUID of the characteristic itself.
    pub uuid: Uuid,
}

/// Descriptor of a resolved GATT service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    /// Service UUID.
    pub uuid: Uuid,
    /// Characteristics exposed by the service.
    pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
    /// Build a service descriptor from its UUID and characteristic UUIDs.
    pub fn new(uuid: Uuid, characteristics: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            uuid,
            characteristics: characteristics
                .into_iter()
                .map(|c| GattCharacteristic {
                    service: uuid,
                    uuid: c,
                })
                .collect(),
        }
    }

    /// Find a characteristic of this service by exact UUID.
    pub fn characteristic(&self, uuid: Uuid) -> Option<&GattCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }
}

/// Operations the session state machine needs from a BLE transport.
///
/// All operations are asynchronous and none may block on the radio beyond
/// the awaited future; results of longer flows (connection, resolution) are
/// fed back into the session manager as callbacks by whoever drives the
/// transport.
#[async_trait]
pub trait RemoteTransport: Send + Sync + 'static {
    /// Initiate a connection to a discovered peripheral.
    async fn connect(&self, address: &str) -> Result<()>;

    /// Drop the link-layer connection.
    async fn disconnect(&self, address: &str) -> Result<()>;

    /// Enumerate services and characteristics of a connected peripheral.
    async fn resolve_services(&self, address: &str) -> Result<Vec<GattService>>;

    /// Subscribe to value notifications on a characteristic.
    async fn enable_notifications(
        &self,
        address: &str,
        characteristic: &GattCharacteristic,
    ) -> Result<()>;

    /// Read a characteristic value.
    async fn read_value(
        &self,
        address: &str,
        characteristic: &GattCharacteristic,
    ) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use turntouch_types::uuids;

    #[test]
    fn test_service_characteristic_lookup() {
        let service = GattService::new(
            uuids::BUTTON_STATUS_SERVICE,
            [uuids::BUTTON_STATUS_CHARACTERISTIC],
        );

        let found = service
            .characteristic(uuids::BUTTON_STATUS_CHARACTERISTIC)
            .unwrap();
        assert_eq!(found.service, uuids::BUTTON_STATUS_SERVICE);
        assert!(service.characteristic(uuids::BATTERY_LEVEL).is_none());
    }
}
