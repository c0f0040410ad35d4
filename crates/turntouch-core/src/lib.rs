//! BLE session state machine for Turn Touch remotes.
//!
//! This crate turns raw GATT notification bytes from a Turn Touch remote into
//! discrete, de-duplicated press/release events, tolerating an unreliable
//! radio link and firmware that lacks the optional battery service.
//!
//! # Architecture
//!
//! - **Discovery filtering**: advertisements are matched against an
//!   allow-list of service UUIDs; matching remotes are connected
//!   automatically.
//! - **Device sessions**: one [`DeviceSession`] per remote owns the
//!   connection lifecycle, the resolved characteristic handles, the previous
//!   button snapshot for edge detection, and the battery poll.
//! - **Session manager**: the [`SessionManager`] routes every adapter
//!   callback to the owning session by address and fans domain events out to
//!   subscribers.
//! - **Transport boundary**: sessions drive the radio only through the
//!   [`RemoteTransport`] trait, implemented for btleplug in [`ble`] and by a
//!   scriptable mock in [`mock`].
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use turntouch_core::{BleTransport, SessionManager, ble};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(BleTransport::new().await?);
//!     let manager = Arc::new(SessionManager::new(transport));
//!
//!     let mut events = manager.events().subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{event:?}");
//!         }
//!     });
//!
//!     ble::run_monitor(manager, CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod ble;
pub mod error;
pub mod events;
pub mod filter;
pub mod manager;
pub mod mock;
pub mod session;
pub mod transport;
pub mod util;

// Core exports
pub use ble::BleTransport;
pub use error::{Error, Result};
pub use events::{
    ConnectionState, DeviceRef, EventDispatcher, EventReceiver, EventSender, RemoteEvent,
};
pub use filter::DiscoveryFilter;
pub use manager::{ManagerConfig, SessionManager};
pub use mock::{MockTransport, TransportOp};
pub use session::{DEFAULT_BATTERY_POLL_INTERVAL, DeviceSession, SessionState};
pub use transport::{GattCharacteristic, GattService, RemoteTransport};

// Re-export the decoding layer for downstream convenience.
pub use turntouch_types::{
    ButtonChange, ButtonState, Direction, DirectionSet, ParseError, decode_battery_level,
    decode_buttons, uuids,
};
