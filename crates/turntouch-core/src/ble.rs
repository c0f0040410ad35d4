//! btleplug-backed transport and adapter event loop.
//!
//! [`BleTransport`] implements [`RemoteTransport`] over a system Bluetooth
//! adapter. [`run_monitor`] drives the whole pipeline: it starts a filtered
//! scan, translates adapter events into [`SessionManager`] callbacks, and
//! forwards per-peripheral notification streams.
//!
//! Division of labor: connection results are reported by the manager's own
//! connect attempts (the `connect` future resolving), so the adapter's
//! `DeviceConnected` event is used only to start the notification forwarder
//! for that peripheral. `DeviceDisconnected` is the single source of the
//! disconnect callback.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::manager::SessionManager;
use crate::transport::{GattCharacteristic, GattService, RemoteTransport};
use crate::util::create_identifier;

/// Transport backed by a system Bluetooth adapter.
pub struct BleTransport {
    adapter: Adapter,
    /// Peripherals seen during discovery, keyed by device address.
    peripherals: RwLock<HashMap<String, Peripheral>>,
    /// Reverse map from platform peripheral IDs to device addresses.
    addresses: RwLock<HashMap<PeripheralId, String>>,
}

impl BleTransport {
    /// Create a transport on the first available Bluetooth adapter.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::AdapterUnavailable)?;
        Ok(Self::with_adapter(adapter))
    }

    /// Create a transport on a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            peripherals: RwLock::new(HashMap::new()),
            addresses: RwLock::new(HashMap::new()),
        }
    }

    /// The underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Track a discovered peripheral under its address.
    pub async fn register(&self, id: PeripheralId, address: &str, peripheral: Peripheral) {
        self.peripherals
            .write()
            .await
            .insert(address.to_string(), peripheral);
        self.addresses.write().await.insert(id, address.to_string());
    }

    /// Look up the address a peripheral ID was registered under.
    pub async fn address_for(&self, id: &PeripheralId) -> Option<String> {
        self.addresses.read().await.get(id).cloned()
    }

    async fn peripheral(&self, address: &str) -> Result<Peripheral> {
        self.peripherals
            .read()
            .await
            .get(address)
            .cloned()
            .ok_or_else(|| Error::UnknownDevice(address.to_string()))
    }

    /// Find the adapter-owned characteristic matching a resolved handle.
    async fn find_characteristic(
        peripheral: &Peripheral,
        handle: &GattCharacteristic,
    ) -> Result<btleplug::api::Characteristic> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == handle.uuid && c.service_uuid == handle.service)
            .ok_or_else(|| Error::characteristic_not_found(handle.uuid, handle.service))
    }
}

#[async_trait]
impl RemoteTransport for BleTransport {
    async fn connect(&self, address: &str) -> Result<()> {
        let peripheral = self.peripheral(address).await?;
        peripheral.connect().await?;
        Ok(())
    }

    async fn disconnect(&self, address: &str) -> Result<()> {
        let peripheral = self.peripheral(address).await?;
        peripheral.disconnect().await?;
        Ok(())
    }

    async fn resolve_services(&self, address: &str) -> Result<Vec<GattService>> {
        let peripheral = self.peripheral(address).await?;
        peripheral.discover_services().await?;

        let services = peripheral
            .services()
            .into_iter()
            .map(|service| GattService {
                uuid: service.uuid,
                characteristics: service
                    .characteristics
                    .into_iter()
                    .map(|c| GattCharacteristic {
                        service: service.uuid,
                        uuid: c.uuid,
                    })
                    .collect(),
            })
            .collect();
        Ok(services)
    }

    async fn enable_notifications(
        &self,
        address: &str,
        characteristic: &GattCharacteristic,
    ) -> Result<()> {
        let peripheral = self.peripheral(address).await?;
        let target = Self::find_characteristic(&peripheral, characteristic).await?;
        peripheral
            .subscribe(&target)
            .await
            .map_err(|e| Error::notify_enable_failed(characteristic.uuid, e.to_string()))
    }

    async fn read_value(
        &self,
        address: &str,
        characteristic: &GattCharacteristic,
    ) -> Result<Vec<u8>> {
        let peripheral = self.peripheral(address).await?;
        let target = Self::find_characteristic(&peripheral, characteristic).await?;
        Ok(peripheral.read(&target).await?)
    }
}

/// Run the monitor until `shutdown` is cancelled.
///
/// Starts a scan filtered to the manager's allow-list and feeds every adapter
/// event into the session manager. Each connected peripheral gets a spawned
/// forwarder task that relays its notification stream; the stream ends on
/// disconnect, so forwarders clean themselves up.
pub async fn run_monitor(
    manager: Arc<SessionManager<BleTransport>>,
    shutdown: CancellationToken,
) -> Result<()> {
    let transport = Arc::clone(manager.transport());
    let adapter = transport.adapter().clone();

    let mut events = adapter.events().await?;
    adapter
        .start_scan(manager.config().filter.scan_filter())
        .await?;
    info!("scanning for remotes");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.next() => {
                let Some(event) = event else { break };
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        handle_advertisement(&manager, &transport, id).await;
                    }
                    CentralEvent::DeviceConnected(id) => {
                        if let Some(address) = transport.address_for(&id).await {
                            debug!(%address, "link established, starting notification forwarder");
                            let manager = Arc::clone(&manager);
                            let transport = Arc::clone(&transport);
                            let shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                if let Err(e) =
                                    forward_notifications(manager, transport, &address, shutdown)
                                        .await
                                {
                                    debug!(%address, error = %e, "notification forwarder stopped");
                                }
                            });
                        }
                    }
                    CentralEvent::DeviceDisconnected(id) => {
                        if let Some(address) = transport.address_for(&id).await {
                            manager.on_disconnected(&address).await;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    if let Err(e) = adapter.stop_scan().await {
        debug!(error = %e, "stopping scan failed");
    }
    manager.shutdown().await;
    Ok(())
}

/// Process an advertisement: register the peripheral and hand the discovery
/// to the manager.
async fn handle_advertisement(
    manager: &Arc<SessionManager<BleTransport>>,
    transport: &Arc<BleTransport>,
    id: PeripheralId,
) {
    let peripheral = match transport.adapter().peripheral(&id).await {
        Ok(peripheral) => peripheral,
        Err(e) => {
            debug!(?id, error = %e, "advertised peripheral vanished");
            return;
        }
    };

    let Ok(Some(properties)) = peripheral.properties().await else {
        return;
    };

    let advertised = properties.services.clone();
    if !manager.config().filter.accepts(&advertised) {
        // Keep the peripheral map bounded to devices we care about.
        return;
    }

    let address = create_identifier(&properties.address.to_string(), &id);
    let alias = properties.local_name.clone();

    transport.register(id, &address, peripheral).await;
    manager
        .on_device_discovered(&address, &advertised, alias.as_deref())
        .await;
}

/// Relay a peripheral's notification stream into the manager.
async fn forward_notifications(
    manager: Arc<SessionManager<BleTransport>>,
    transport: Arc<BleTransport>,
    address: &str,
    shutdown: CancellationToken,
) -> Result<()> {
    let peripheral = transport.peripheral(address).await?;
    let mut notifications = peripheral.notifications().await?;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            item = notifications.next() => {
                let Some(notification) = item else {
                    // Stream ends when the peripheral disconnects.
                    break;
                };
                manager
                    .on_notification(address, notification.uuid, &notification.value)
                    .await;
            }
        }
    }

    Ok(())
}

/// Scan for matching remotes for a fixed duration and return what was seen.
///
/// Diagnostic helper used by the service's scan-only mode; does not connect.
pub async fn scan_once(
    transport: &BleTransport,
    filter: &crate::filter::DiscoveryFilter,
    duration: std::time::Duration,
) -> Result<Vec<(String, Option<String>)>> {
    let adapter = transport.adapter();

    adapter.start_scan(filter.scan_filter()).await?;
    tokio::time::sleep(duration).await;
    adapter.stop_scan().await?;

    let mut found = Vec::new();
    for peripheral in adapter.peripherals().await? {
        if let Ok(Some(properties)) = peripheral.properties().await {
            if !filter.accepts(&properties.services) {
                continue;
            }
            let address = create_identifier(&properties.address.to_string(), &peripheral.id());
            found.push((address, properties.local_name.clone()));
        }
    }

    info!("scan complete, {} matching remote(s)", found.len());
    Ok(found)
}
