//! Multi-device session management.
//!
//! The [`SessionManager`] is the single entry point the BLE transport talks
//! to: every adapter-level callback (discovery, connect result, service
//! resolution, notification, disconnect) is routed here and dispatched to the
//! owning [`DeviceSession`] by address.
//!
//! Each session sits behind its own async mutex, so callbacks for one address
//! are processed in arrival order and never interleaved, while sessions for
//! different remotes make progress concurrently. The session map itself is
//! only locked for insert/lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::events::EventDispatcher;
use crate::filter::DiscoveryFilter;
use crate::session::{DEFAULT_BATTERY_POLL_INTERVAL, DeviceSession, SessionState};
use crate::transport::{GattService, RemoteTransport};

/// Configuration for the session manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Which advertisements are treated as candidate remotes.
    pub filter: DiscoveryFilter,
    /// Interval between battery reads while a session is ready.
    pub battery_poll_interval: Duration,
    /// Event channel capacity.
    pub event_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            filter: DiscoveryFilter::default(),
            battery_poll_interval: DEFAULT_BATTERY_POLL_INTERVAL,
            event_capacity: 100,
        }
    }
}

/// Manager owning one [`DeviceSession`] per tracked remote.
pub struct SessionManager<T: RemoteTransport> {
    transport: Arc<T>,
    sessions: RwLock<HashMap<String, Arc<Mutex<DeviceSession>>>>,
    events: EventDispatcher,
    config: ManagerConfig,
}

impl<T: RemoteTransport> SessionManager<T> {
    /// Create a manager with default configuration.
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_config(transport, ManagerConfig::default())
    }

    /// Create a manager with custom configuration.
    pub fn with_config(transport: Arc<T>, config: ManagerConfig) -> Self {
        Self {
            transport,
            sessions: RwLock::new(HashMap::new()),
            events: EventDispatcher::new(config.event_capacity),
            config,
        }
    }

    /// The event dispatcher for subscribing to domain events.
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// The manager configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The transport sessions are driven through.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Number of tracked sessions (in any state).
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Lifecycle state of a tracked session, if any.
    pub async fn session_state(&self, address: &str) -> Option<SessionState> {
        match self.session(address).await {
            Some(session) => Some(session.lock().await.state()),
            None => None,
        }
    }

    async fn session(&self, address: &str) -> Option<Arc<Mutex<DeviceSession>>> {
        self.sessions.read().await.get(address).cloned()
    }

    /// Handle a discovery event from the adapter.
    ///
    /// Advertisements outside the allow-list are rejected (defensively, since
    /// some transports only pre-filter). A new address gets a session and an
    /// immediate connection attempt; a tracked address with a live session is
    /// a no-op; a session that ended in `Disconnected` is re-attempted, since
    /// the advertisement means the remote is back in range.
    pub async fn on_device_discovered(
        self: &Arc<Self>,
        address: &str,
        advertised: &[Uuid],
        alias: Option<&str>,
    ) {
        if !self.config.filter.accepts(advertised) {
            debug!(%address, "ignoring advertisement outside the allow-list");
            return;
        }

        if let Some(existing) = self.session(address).await {
            let mut session = existing.lock().await;
            if session.state() == SessionState::Disconnected {
                info!(%address, "rediscovered, reconnecting");
                session.begin_connecting();
                drop(session);
                self.spawn_connect(address);
            } else {
                debug!(%address, state = ?session.state(), "already tracked, ignoring rediscovery");
            }
            return;
        }

        let session = Arc::new(Mutex::new(DeviceSession::new(address, alias)));
        {
            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(address) {
                return;
            }
            sessions.insert(address.to_string(), session.clone());
        }

        info!(%address, alias = ?alias, "discovered remote, connecting");
        session.lock().await.begin_connecting();
        self.spawn_connect(address);
    }

    fn spawn_connect(self: &Arc<Self>, address: &str) {
        let manager = Arc::clone(self);
        let address = address.to_string();
        tokio::spawn(async move {
            match manager.transport.connect(&address).await {
                Ok(()) => manager.on_connect_result(&address, true, None).await,
                Err(e) => {
                    manager
                        .on_connect_result(&address, false, Some(&e.to_string()))
                        .await
                }
            }
        });
    }

    /// Handle the outcome of a connection attempt.
    ///
    /// On success, service resolution is kicked off; on failure the session
    /// records the reason and rests in `Disconnected` until rediscovery.
    pub async fn on_connect_result(self: &Arc<Self>, address: &str, ok: bool, reason: Option<&str>) {
        let Some(session) = self.session(address).await else {
            warn!(%address, "connect result for untracked device dropped");
            return;
        };

        session
            .lock()
            .await
            .handle_connect_result(ok, reason, &self.events);

        if ok {
            self.spawn_resolve(address);
        }
    }

    fn spawn_resolve(self: &Arc<Self>, address: &str) {
        let manager = Arc::clone(self);
        let address = address.to_string();
        tokio::spawn(async move {
            match manager.transport.resolve_services(&address).await {
                Ok(services) => manager.on_services_resolved(&address, &services).await,
                Err(e) => {
                    warn!(%address, error = %e, "service resolution failed, dropping connection");
                    let _ = manager.transport.disconnect(&address).await;
                    manager.on_disconnected(&address).await;
                }
            }
        });
    }

    /// Handle a service enumeration delivered by the adapter.
    ///
    /// A resolution failure here means the device does not implement the
    /// expected protocol: only that session is torn down, never the manager
    /// or other sessions.
    pub async fn on_services_resolved(self: &Arc<Self>, address: &str, services: &[GattService]) {
        let Some(session) = self.session(address).await else {
            warn!(%address, "service resolution for untracked device dropped");
            return;
        };

        let resolved = {
            let mut session = session.lock().await;
            let result = session
                .handle_services_resolved(
                    services,
                    &self.transport,
                    &self.events,
                    self.config.battery_poll_interval,
                )
                .await;
            if result.is_ok() && session.is_degraded() {
                warn!(%address, "session is ready but degraded: no button events will arrive");
            }
            result
        };

        if let Err(e) = resolved {
            error!(%address, error = %e, "remote does not match the expected protocol, dropping session");
            let _ = self.transport.disconnect(address).await;
            session.lock().await.handle_disconnected(&self.events);
        }
    }

    /// Route a characteristic notification to the owning session.
    pub async fn on_notification(&self, address: &str, characteristic: Uuid, payload: &[u8]) {
        let Some(session) = self.session(address).await else {
            warn!(%address, "notification for untracked device dropped");
            return;
        };

        session
            .lock()
            .await
            .handle_notification(characteristic, payload, &self.events);
    }

    /// Handle a link loss reported by the adapter.
    pub async fn on_disconnected(&self, address: &str) {
        let Some(session) = self.session(address).await else {
            warn!(%address, "disconnect for untracked device dropped");
            return;
        };

        session.lock().await.handle_disconnected(&self.events);
    }

    /// Tear down every session, dropping any live connections.
    pub async fn shutdown(&self) {
        let sessions: Vec<(String, Arc<Mutex<DeviceSession>>)> = {
            let map = self.sessions.read().await;
            map.iter()
                .map(|(address, session)| (address.clone(), session.clone()))
                .collect()
        };

        for (address, session) in sessions {
            let mut session = session.lock().await;
            if session.state().is_up() {
                let _ = self.transport.disconnect(&address).await;
            }
            session.handle_disconnected(&self.events);
        }

        info!("session manager shut down");
    }
}
