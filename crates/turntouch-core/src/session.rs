//! Per-device session state machine.
//!
//! One [`DeviceSession`] exists per discovered remote. It owns the connection
//! state, the resolved characteristic handles, the previous button snapshot
//! used for edge detection, and the battery-poll task. All mutation happens
//! through the handler methods, which the manager invokes under a per-session
//! lock so callbacks for one address are never interleaved.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use turntouch_types::{
    ButtonState, decode_battery_level, decode_buttons,
    uuids::{self, BUTTON_STATUS_CHARACTERISTIC, BUTTON_STATUS_SERVICE},
};

use crate::error::{Error, Result};
use crate::events::{ConnectionState, DeviceRef, EventDispatcher, RemoteEvent};
use crate::transport::{GattCharacteristic, GattService, RemoteTransport};

/// Default interval between battery reads while a session is ready.
pub const DEFAULT_BATTERY_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Lifecycle state of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Advertisement seen, no connection attempt yet.
    Discovered,
    /// Connection attempt in flight.
    Connecting,
    /// Link established, services not yet resolved.
    Connected,
    /// Service enumeration delivered, handles being resolved.
    ServicesResolving,
    /// Handles resolved, notifications requested, battery poll running.
    Ready,
    /// Link lost or torn down. The manager may re-attempt from here.
    Disconnected,
}

impl SessionState {
    /// Whether the link is up in this state.
    pub fn is_up(self) -> bool {
        matches!(
            self,
            SessionState::Connected | SessionState::ServicesResolving | SessionState::Ready
        )
    }
}

/// State machine for a single remote.
///
/// Every session owns its own decoding state; nothing here is shared between
/// devices.
pub struct DeviceSession {
    address: String,
    alias: Option<String>,
    state: SessionState,
    /// Set once per session after resolution, cleared on disconnect.
    button_characteristic: Option<GattCharacteristic>,
    /// Absent on remotes whose firmware lacks the battery service.
    battery_characteristic: Option<GattCharacteristic>,
    previous_buttons: ButtonState,
    battery_poll: Option<CancellationToken>,
    notifications_enabled: bool,
    last_failure: Option<String>,
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("address", &self.address)
            .field("alias", &self.alias)
            .field("state", &self.state)
            .field("has_battery", &self.battery_characteristic.is_some())
            .field("notifications_enabled", &self.notifications_enabled)
            .finish_non_exhaustive()
    }
}

impl DeviceSession {
    /// Create a session for a freshly discovered address.
    pub fn new(address: impl Into<String>, alias: Option<&str>) -> Self {
        Self {
            address: address.into(),
            alias: alias.map(str::to_string),
            state: SessionState::Discovered,
            button_characteristic: None,
            battery_characteristic: None,
            previous_buttons: ButtonState::RELEASED,
            battery_poll: None,
            notifications_enabled: false,
            last_failure: None,
        }
    }

    /// The device address this session tracks.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The advertised local name, if one was seen.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the remote exposes a battery characteristic.
    pub fn has_battery(&self) -> bool {
        self.battery_characteristic.is_some()
    }

    /// Ready but without button notifications: the subscription was refused,
    /// so no button events will arrive until the next reconnect.
    pub fn is_degraded(&self) -> bool {
        self.state == SessionState::Ready && !self.notifications_enabled
    }

    /// The most recent connection failure reason, if any.
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    fn device_ref(&self) -> DeviceRef {
        DeviceRef {
            address: self.address.clone(),
            alias: self.alias.clone(),
        }
    }

    /// Mark the session as connecting. Called on first discovery and when the
    /// manager re-attempts after a disconnect.
    pub fn begin_connecting(&mut self) {
        self.state = SessionState::Connecting;
    }

    /// Record the outcome of a connection attempt.
    pub fn handle_connect_result(
        &mut self,
        ok: bool,
        reason: Option<&str>,
        events: &EventDispatcher,
    ) {
        if ok {
            info!(address = %self.address, alias = ?self.alias, "connected");
            self.state = SessionState::Connected;
            events.send(RemoteEvent::ConnectionStateChanged {
                device: self.device_ref(),
                state: ConnectionState::Connected,
            });
        } else {
            let reason = reason.unwrap_or("unknown").to_string();
            warn!(address = %self.address, %reason, "connection failed");
            self.last_failure = Some(reason);
            self.state = SessionState::Disconnected;
        }
    }

    /// Resolve characteristic handles from the enumerated services, enable
    /// button notifications, and start the battery poll.
    ///
    /// The button-status service and its notify characteristic are required
    /// exact matches; their absence means the device does not implement the
    /// expected protocol and the session cannot be used. The battery
    /// service/characteristic are prefix-matched and optional.
    pub async fn handle_services_resolved<T: RemoteTransport>(
        &mut self,
        services: &[GattService],
        transport: &Arc<T>,
        events: &EventDispatcher,
        battery_poll_interval: Duration,
    ) -> Result<()> {
        self.state = SessionState::ServicesResolving;
        debug!(address = %self.address, count = services.len(), "resolving services");

        let button_service = services
            .iter()
            .find(|s| s.uuid == BUTTON_STATUS_SERVICE)
            .ok_or_else(|| Error::service_not_found(BUTTON_STATUS_SERVICE, &self.address))?;

        let button_characteristic = button_service
            .characteristic(BUTTON_STATUS_CHARACTERISTIC)
            .ok_or_else(|| {
                Error::characteristic_not_found(BUTTON_STATUS_CHARACTERISTIC, BUTTON_STATUS_SERVICE)
            })?
            .clone();

        // Some remotes ship firmware without battery status.
        let battery_characteristic = services
            .iter()
            .find(|s| uuids::is_battery_service(&s.uuid))
            .and_then(|s| s.characteristics.iter().find(|c| uuids::is_battery_level(&c.uuid)))
            .cloned();

        eprintln!("DIAG battery_characteristic = {:?}", battery_characteristic);
        if battery_characteristic.is_none() {
            info!(address = %self.address, "no battery service, skipping battery polling");
        }

        self.button_characteristic = Some(button_characteristic.clone());
        self.battery_characteristic = battery_characteristic.clone();
        self.previous_buttons = ButtonState::RELEASED;
        self.state = SessionState::Ready;

        match transport
            .enable_notifications(&self.address, &button_characteristic)
            .await
        {
            Ok(()) => {
                info!(address = %self.address, "button notifications enabled");
                self.notifications_enabled = true;
            }
            Err(e) => {
                // The session stays up, but no button events will arrive.
                warn!(address = %self.address, error = %e, "enabling button notifications failed");
                self.notifications_enabled = false;
            }
        }

        if let Some(characteristic) = battery_characteristic {
            self.spawn_battery_poll(characteristic, transport, events, battery_poll_interval);
        }

        Ok(())
    }

    /// Start the recurring battery read. The first tick fires immediately,
    /// which doubles as the read-on-ready.
    fn spawn_battery_poll<T: RemoteTransport>(
        &mut self,
        characteristic: GattCharacteristic,
        transport: &Arc<T>,
        events: &EventDispatcher,
        poll_interval: Duration,
    ) {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let transport = Arc::clone(transport);
        let events = events.clone();
        let device = self.device_ref();

        tokio::spawn(async move {
            let mut tick = interval(poll_interval);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        debug!(address = %device.address, "battery poll cancelled");
                        break;
                    }
                    _ = tick.tick() => {
                        eprintln!("DIAG poll tick firing read for {}", device.address);
                        match transport.read_value(&device.address, &characteristic).await {
                            Ok(payload) => match decode_battery_level(&payload) {
                                Ok(percent) => {
                                    // The session may have been torn down while
                                    // the read was in flight.
                                    if task_token.is_cancelled() {
                                        break;
                                    }
                                    debug!(address = %device.address, percent, "battery level");
                                    events.send(RemoteEvent::BatteryLevel {
                                        device: device.clone(),
                                        percent,
                                    });
                                }
                                Err(e) => {
                                    warn!(address = %device.address, error = %e, "dropping malformed battery payload");
                                }
                            },
                            Err(e) => {
                                warn!(address = %device.address, error = %e, "battery read failed");
                            }
                        }
                    }
                }
            }
        });

        self.battery_poll = Some(token);
    }

    /// Route a characteristic notification to the right decoder.
    ///
    /// Battery notifications emit a [`RemoteEvent::BatteryLevel`]; button
    /// notifications run edge detection against the stored snapshot and emit
    /// one event per transition, presses before releases, each in north,
    /// east, west, south order. Anything else is ignored. Malformed payloads
    /// are logged and dropped without touching session state.
    pub fn handle_notification(
        &mut self,
        characteristic: Uuid,
        payload: &[u8],
        events: &EventDispatcher,
    ) {
        if self.state != SessionState::Ready {
            debug!(address = %self.address, state = ?self.state, "notification outside ready state ignored");
            return;
        }

        if self
            .battery_characteristic
            .as_ref()
            .is_some_and(|c| c.uuid == characteristic)
        {
            match decode_battery_level(payload) {
                Ok(percent) => {
                    info!(address = %self.address, percent, "battery status");
                    events.send(RemoteEvent::BatteryLevel {
                        device: self.device_ref(),
                        percent,
                    });
                }
                Err(e) => {
                    warn!(address = %self.address, error = %e, "dropping malformed battery notification");
                }
            }
            return;
        }

        if self
            .button_characteristic
            .as_ref()
            .is_some_and(|c| c.uuid == characteristic)
        {
            match decode_buttons(payload, self.previous_buttons) {
                Ok(change) => {
                    self.previous_buttons = change.state;
                    debug!(address = %self.address, held = ?change.held, "button state");
                    for direction in change.newly_pressed.iter() {
                        events.send(RemoteEvent::ButtonPressed {
                            device: self.device_ref(),
                            direction,
                        });
                    }
                    for direction in change.newly_released.iter() {
                        events.send(RemoteEvent::ButtonReleased {
                            device: self.device_ref(),
                            direction,
                        });
                    }
                }
                Err(e) => {
                    warn!(address = %self.address, error = %e, "dropping malformed button notification");
                }
            }
            return;
        }

        debug!(address = %self.address, %characteristic, "notification on unrecognized characteristic ignored");
    }

    /// Tear the session down to its pre-connect state.
    ///
    /// Cancels the battery poll, clears the resolved handles, resets the
    /// button snapshot, and emits exactly one disconnected event if the link
    /// had been up.
    pub fn handle_disconnected(&mut self, events: &EventDispatcher) {
        if let Some(token) = self.battery_poll.take() {
            token.cancel();
        }
        self.button_characteristic = None;
        self.battery_characteristic = None;
        self.notifications_enabled = false;
        self.previous_buttons = ButtonState::RELEASED;

        let was_up = self.state.is_up();
        self.state = SessionState::Disconnected;

        if was_up {
            info!(address = %self.address, "disconnected");
            events.send(RemoteEvent::ConnectionStateChanged {
                device: self.device_ref(),
                state: ConnectionState::Disconnected,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventDispatcher;
    use crate::mock::{MockTransport, remote_services, remote_services_without_battery};
    use turntouch_types::Direction;

    const ADDR: &str = "C0:FF:EE:00:00:01";

    fn drain(rx: &mut crate::events::EventReceiver) -> Vec<RemoteEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    async fn ready_session(
        transport: &Arc<MockTransport>,
        events: &EventDispatcher,
        services: &[GattService],
    ) -> DeviceSession {
        let mut session = DeviceSession::new(ADDR, Some("Office remote"));
        session.begin_connecting();
        session.handle_connect_result(true, None, events);
        session
            .handle_services_resolved(services, transport, events, Duration::from_secs(60))
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_resolution_finds_handles_and_reaches_ready() {
        let transport = Arc::new(MockTransport::new());
        transport.add_remote(ADDR).await;
        transport.connect(ADDR).await.unwrap();

        let events = EventDispatcher::default();
        let session = ready_session(&transport, &events, &remote_services()).await;

        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.has_battery());
        assert!(!session.is_degraded());
    }

    #[tokio::test]
    async fn test_missing_button_service_is_fatal() {
        let transport = Arc::new(MockTransport::new());
        let events = EventDispatcher::default();
        let mut session = DeviceSession::new(ADDR, None);
        session.handle_connect_result(true, None, &events);

        let services = [GattService::new(
            turntouch_types::uuids::BATTERY_SERVICE,
            [turntouch_types::uuids::BATTERY_LEVEL],
        )];
        let err = session
            .handle_services_resolved(&services, &transport, &events, Duration::from_secs(60))
            .await
            .unwrap_err();

        assert!(err.is_protocol_mismatch());
    }

    #[tokio::test]
    async fn test_missing_notify_characteristic_is_fatal() {
        let transport = Arc::new(MockTransport::new());
        let events = EventDispatcher::default();
        let mut session = DeviceSession::new(ADDR, None);
        session.handle_connect_result(true, None, &events);

        // Right service, wrong characteristic.
        let services = [GattService::new(
            BUTTON_STATUS_SERVICE,
            [turntouch_types::uuids::BATTERY_LEVEL],
        )];
        let err = session
            .handle_services_resolved(&services, &transport, &events, Duration::from_secs(60))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::CharacteristicNotFound { .. }));
    }

    #[tokio::test]
    async fn test_absent_battery_is_a_capability_gap_not_an_error() {
        let transport = Arc::new(MockTransport::new());
        transport.add_remote(ADDR).await;
        transport.connect(ADDR).await.unwrap();

        let events = EventDispatcher::default();
        let session =
            ready_session(&transport, &events, &remote_services_without_battery()).await;

        assert_eq!(session.state(), SessionState::Ready);
        assert!(!session.has_battery());
    }

    #[tokio::test]
    async fn test_refused_subscription_leaves_session_degraded() {
        let transport = Arc::new(MockTransport::new());
        transport.add_remote(ADDR).await;
        transport.fail_subscribe(ADDR, "write not permitted").await;
        transport.connect(ADDR).await.unwrap();

        let events = EventDispatcher::default();
        let session = ready_session(&transport, &events, &remote_services()).await;

        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.is_degraded());
    }

    #[tokio::test]
    async fn test_button_notification_emits_edges_in_order() {
        let transport = Arc::new(MockTransport::new());
        transport.add_remote(ADDR).await;
        transport.connect(ADDR).await.unwrap();

        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let mut session =
            ready_session(&transport, &events, &remote_services_without_battery()).await;
        drain(&mut rx);

        // north+east held at once, then both released.
        session.handle_notification(BUTTON_STATUS_CHARACTERISTIC, &[0xFC, 0x00], &events);
        session.handle_notification(BUTTON_STATUS_CHARACTERISTIC, &[0xFF, 0x00], &events);

        let directions: Vec<_> = drain(&mut rx)
            .into_iter()
            .map(|event| match event {
                RemoteEvent::ButtonPressed { direction, .. } => ("pressed", direction),
                RemoteEvent::ButtonReleased { direction, .. } => ("released", direction),
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();

        assert_eq!(
            directions,
            [
                ("pressed", Direction::North),
                ("pressed", Direction::East),
                ("released", Direction::North),
                ("released", Direction::East),
            ]
        );
    }

    #[tokio::test]
    async fn test_repeated_notification_does_not_refire() {
        let transport = Arc::new(MockTransport::new());
        transport.add_remote(ADDR).await;
        transport.connect(ADDR).await.unwrap();

        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let mut session =
            ready_session(&transport, &events, &remote_services_without_battery()).await;
        drain(&mut rx);

        session.handle_notification(BUTTON_STATUS_CHARACTERISTIC, &[0xFE], &events);
        assert_eq!(drain(&mut rx).len(), 1);

        session.handle_notification(BUTTON_STATUS_CHARACTERISTIC, &[0xFE], &events);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_malformed_notification_is_dropped_without_state_change() {
        let transport = Arc::new(MockTransport::new());
        transport.add_remote(ADDR).await;
        transport.connect(ADDR).await.unwrap();

        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let mut session =
            ready_session(&transport, &events, &remote_services_without_battery()).await;
        drain(&mut rx);

        session.handle_notification(BUTTON_STATUS_CHARACTERISTIC, &[], &events);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(session.state(), SessionState::Ready);

        // The stored snapshot is untouched: a press still registers.
        session.handle_notification(BUTTON_STATUS_CHARACTERISTIC, &[0xFE], &events);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_unrecognized_characteristic_is_ignored() {
        let transport = Arc::new(MockTransport::new());
        transport.add_remote(ADDR).await;
        transport.connect(ADDR).await.unwrap();

        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let mut session =
            ready_session(&transport, &events, &remote_services_without_battery()).await;
        drain(&mut rx);

        session.handle_notification(Uuid::nil(), &[0xFE], &events);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_clears_handles_and_emits_once() {
        let transport = Arc::new(MockTransport::new());
        transport.add_remote(ADDR).await;
        transport.connect(ADDR).await.unwrap();

        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let mut session = ready_session(&transport, &events, &remote_services()).await;
        drain(&mut rx);

        session.handle_disconnected(&events);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.has_battery());

        let emitted = drain(&mut rx);
        assert_eq!(emitted.len(), 1);
        assert!(matches!(
            emitted[0],
            RemoteEvent::ConnectionStateChanged {
                state: ConnectionState::Disconnected,
                ..
            }
        ));

        // A second teardown is quiet.
        session.handle_disconnected(&events);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_connect_failure_records_reason_without_disconnect_event() {
        let events = EventDispatcher::default();
        let mut rx = events.subscribe();

        let mut session = DeviceSession::new(ADDR, None);
        session.begin_connecting();
        session.handle_connect_result(false, Some("le-connection-abort-by-local"), &events);

        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.last_failure(), Some("le-connection-abort-by-local"));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_battery_poll_reads_immediately_and_periodically() {
        let transport = Arc::new(MockTransport::new());
        transport.add_remote(ADDR).await;
        transport.set_battery_payload(ADDR, vec![0x80]).await;
        transport.connect(ADDR).await.unwrap();

        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let mut session = ready_session(&transport, &events, &remote_services()).await;
        drain(&mut rx);

        // Immediate read on ready.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(transport.battery_reads(ADDR).await >= 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(transport.battery_reads(ADDR).await >= 2);

        let battery_events: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, RemoteEvent::BatteryLevel { percent: 50, .. }))
            .collect();
        assert!(battery_events.len() >= 2);

        session.handle_disconnected(&events);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_battery_poll() {
        let transport = Arc::new(MockTransport::new());
        transport.add_remote(ADDR).await;
        transport.connect(ADDR).await.unwrap();

        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let mut session = ready_session(&transport, &events, &remote_services()).await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        let reads_before = transport.battery_reads(ADDR).await;

        session.handle_disconnected(&events);
        drain(&mut rx);

        tokio::time::sleep(Duration::from_secs(180)).await;
        assert_eq!(transport.battery_reads(ADDR).await, reads_before);
        assert!(drain(&mut rx).is_empty());
    }
}
