//! Mock transport implementation for testing.
//!
//! This module provides a scriptable [`RemoteTransport`] so the session state
//! machine can be exercised without BLE hardware.
//!
//! # Features
//!
//! - **Scripted GATT layouts**: per-device service tables, including remotes
//!   without a battery service
//! - **Failure injection**: make connect or subscribe fail per device
//! - **Operation recording**: every transport call is logged for assertions

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use uuid::{Uuid, uuid};

use turntouch_types::uuids::{
    BATTERY_LEVEL, BATTERY_SERVICE, BUTTON_STATUS_CHARACTERISTIC, BUTTON_STATUS_SERVICE,
};

use crate::error::{Error, Result};
use crate::transport::{GattCharacteristic, GattService, RemoteTransport};

/// The standard GATT layout of a remote: button-status service plus battery.
pub fn remote_services() -> Vec<GattService> {
    vec![
        GattService::new(BUTTON_STATUS_SERVICE, [BUTTON_STATUS_CHARACTERISTIC]),
        GattService::new(BATTERY_SERVICE, [BATTERY_LEVEL]),
    ]
}

/// GATT layout of a remote whose firmware lacks the battery service.
pub fn remote_services_without_battery() -> Vec<GattService> {
    vec![GattService::new(
        BUTTON_STATUS_SERVICE,
        [BUTTON_STATUS_CHARACTERISTIC],
    )]
}

/// GATT layout with the battery assigned numbers grafted onto a vendor base
/// UUID, as some firmware does; only the 32-bit prefix matches the standard.
pub fn remote_services_with_vendor_battery() -> Vec<GattService> {
    vec![
        GattService::new(BUTTON_STATUS_SERVICE, [BUTTON_STATUS_CHARACTERISTIC]),
        GattService::new(
            uuid!("0000180f-dc4f-41b1-bb04-4e4deb81fadd"),
            [uuid!("00002a19-dc4f-41b1-bb04-4e4deb81fadd")],
        ),
    ]
}

/// A recorded transport operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOp {
    Connect(String),
    Disconnect(String),
    ResolveServices(String),
    EnableNotifications(String, Uuid),
    ReadValue(String, Uuid),
}

#[derive(Debug, Clone)]
struct MockPeripheral {
    services: Vec<GattService>,
    battery_payload: Vec<u8>,
    connect_error: Option<String>,
    subscribe_error: Option<String>,
    connected: bool,
}

impl MockPeripheral {
    fn new(services: Vec<GattService>) -> Self {
        Self {
            services,
            battery_payload: vec![0xFF],
            connect_error: None,
            subscribe_error: None,
            connected: false,
        }
    }
}

/// A mock transport for driving sessions in tests.
#[derive(Debug, Default)]
pub struct MockTransport {
    peripherals: RwLock<HashMap<String, MockPeripheral>>,
    operations: Mutex<Vec<TransportOp>>,
}

impl MockTransport {
    /// Create an empty mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a remote with the standard button + battery layout.
    pub async fn add_remote(&self, address: &str) {
        self.add_device(address, remote_services()).await;
    }

    /// Script a remote with the standard layout under a generated address.
    pub async fn add_random_remote(&self) -> String {
        let address = format!("MOCK-{:06X}", rand::random::<u32>() % 0xFF_FFFF);
        self.add_remote(&address).await;
        address
    }

    /// Script a remote without a battery service.
    pub async fn add_remote_without_battery(&self, address: &str) {
        self.add_device(address, remote_services_without_battery())
            .await;
    }

    /// Script a device with an arbitrary GATT layout.
    pub async fn add_device(&self, address: &str, services: Vec<GattService>) {
        self.peripherals
            .write()
            .await
            .insert(address.to_string(), MockPeripheral::new(services));
    }

    /// Set the payload returned by battery reads for a device.
    pub async fn set_battery_payload(&self, address: &str, payload: Vec<u8>) {
        if let Some(peripheral) = self.peripherals.write().await.get_mut(address) {
            peripheral.battery_payload = payload;
        }
    }

    /// Make connection attempts to a device fail.
    pub async fn fail_connect(&self, address: &str, reason: &str) {
        if let Some(peripheral) = self.peripherals.write().await.get_mut(address) {
            peripheral.connect_error = Some(reason.to_string());
        }
    }

    /// Make notification subscriptions on a device fail.
    pub async fn fail_subscribe(&self, address: &str, reason: &str) {
        if let Some(peripheral) = self.peripherals.write().await.get_mut(address) {
            peripheral.subscribe_error = Some(reason.to_string());
        }
    }

    /// Every transport call recorded so far, in order.
    pub async fn operations(&self) -> Vec<TransportOp> {
        self.operations.lock().await.clone()
    }

    /// Number of battery-level reads issued against a device.
    pub async fn battery_reads(&self, address: &str) -> usize {
        self.operations
            .lock()
            .await
            .iter()
            .filter(|op| {
                matches!(op, TransportOp::ReadValue(a, uuid)
                    if a == address && turntouch_types::uuids::is_battery_level(uuid))
            })
            .count()
    }

    /// Number of connect attempts issued against a device.
    pub async fn connect_attempts(&self, address: &str) -> usize {
        self.operations
            .lock()
            .await
            .iter()
            .filter(|op| matches!(op, TransportOp::Connect(a) if a == address))
            .count()
    }

    /// Whether the scripted device is currently connected.
    pub async fn is_connected(&self, address: &str) -> bool {
        self.peripherals
            .read()
            .await
            .get(address)
            .is_some_and(|p| p.connected)
    }

    async fn record(&self, op: TransportOp) {
        self.operations.lock().await.push(op);
    }
}

#[async_trait]
impl RemoteTransport for MockTransport {
    async fn connect(&self, address: &str) -> Result<()> {
        self.record(TransportOp::Connect(address.to_string())).await;

        let mut peripherals = self.peripherals.write().await;
        let peripheral = peripherals
            .get_mut(address)
            .ok_or_else(|| Error::UnknownDevice(address.to_string()))?;

        if let Some(reason) = &peripheral.connect_error {
            return Err(Error::connection_failed(address, reason.clone()));
        }
        peripheral.connected = true;
        Ok(())
    }

    async fn disconnect(&self, address: &str) -> Result<()> {
        self.record(TransportOp::Disconnect(address.to_string()))
            .await;

        let mut peripherals = self.peripherals.write().await;
        let peripheral = peripherals
            .get_mut(address)
            .ok_or_else(|| Error::UnknownDevice(address.to_string()))?;
        peripheral.connected = false;
        Ok(())
    }

    async fn resolve_services(&self, address: &str) -> Result<Vec<GattService>> {
        self.record(TransportOp::ResolveServices(address.to_string()))
            .await;

        let peripherals = self.peripherals.read().await;
        let peripheral = peripherals
            .get(address)
            .ok_or_else(|| Error::UnknownDevice(address.to_string()))?;

        if !peripheral.connected {
            return Err(Error::NotConnected);
        }
        Ok(peripheral.services.clone())
    }

    async fn enable_notifications(
        &self,
        address: &str,
        characteristic: &GattCharacteristic,
    ) -> Result<()> {
        self.record(TransportOp::EnableNotifications(
            address.to_string(),
            characteristic.uuid,
        ))
        .await;

        let peripherals = self.peripherals.read().await;
        let peripheral = peripherals
            .get(address)
            .ok_or_else(|| Error::UnknownDevice(address.to_string()))?;

        if !peripheral.connected {
            return Err(Error::NotConnected);
        }
        if let Some(reason) = &peripheral.subscribe_error {
            return Err(Error::notify_enable_failed(
                characteristic.uuid,
                reason.clone(),
            ));
        }
        Ok(())
    }

    async fn read_value(
        &self,
        address: &str,
        characteristic: &GattCharacteristic,
    ) -> Result<Vec<u8>> {
        self.record(TransportOp::ReadValue(
            address.to_string(),
            characteristic.uuid,
        ))
        .await;

        let peripherals = self.peripherals.read().await;
        let peripheral = peripherals
            .get(address)
            .ok_or_else(|| Error::UnknownDevice(address.to_string()))?;

        if !peripheral.connected {
            return Err(Error::NotConnected);
        }
        if turntouch_types::uuids::is_battery_level(&characteristic.uuid) {
            return Ok(peripheral.battery_payload.clone());
        }
        Ok(vec![0xFF])
    }
}
