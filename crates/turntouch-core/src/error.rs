//! Error types for turntouch-core.
//!
//! This module defines all error types that can occur when tracking a Turn
//! Touch remote over Bluetooth Low Energy.
//!
//! # Error Classes
//!
//! | Error | Class | Handling |
//! |-------|-------|----------|
//! | [`Error::InvalidPayload`] | bad notification bytes | logged, notification dropped, session unaffected |
//! | [`Error::ServiceNotFound`] / [`Error::CharacteristicNotFound`] | device does not match the expected protocol | that session is torn down; other sessions unaffected |
//! | [`Error::NotifyEnableFailed`] | transport refused the subscription | logged, session stays up in a degraded mode without button events |
//! | [`Error::Bluetooth`] / [`Error::ConnectionFailed`] | transport failure | logged, session transitions to disconnected, no in-core retry |
//!
//! A missing battery service is deliberately *not* an error: it is a
//! capability gap recorded as an absent handle on the session.

use thiserror::Error;
use uuid::Uuid;

use turntouch_types::ParseError;

/// Errors that can occur when communicating with Turn Touch remotes.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// No Bluetooth adapter available on this host.
    #[error("no Bluetooth adapter available")]
    AdapterUnavailable,

    /// Connection attempt failed.
    #[error("connection to {address} failed: {reason}")]
    ConnectionFailed {
        /// The device address that failed to connect.
        address: String,
        /// The transport-reported reason.
        reason: String,
    },

    /// A required GATT service is missing on a device that advertised the
    /// protocol.
    #[error("service {uuid} not found on {address}")]
    ServiceNotFound {
        /// The service UUID that was expected.
        uuid: Uuid,
        /// The device address.
        address: String,
    },

    /// A required characteristic is missing from a resolved service.
    #[error("characteristic {uuid} not found in service {service}")]
    CharacteristicNotFound {
        /// The characteristic UUID that was expected.
        uuid: Uuid,
        /// The service that was searched.
        service: Uuid,
    },

    /// Subscribing to button notifications failed.
    #[error("enabling notifications on {uuid} failed: {reason}")]
    NotifyEnableFailed {
        /// The characteristic UUID.
        uuid: Uuid,
        /// The transport-reported reason.
        reason: String,
    },

    /// Operation attempted against an address the transport is not tracking.
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// Operation attempted while not connected to the device.
    #[error("not connected to device")]
    NotConnected,

    /// Failed to decode a payload received from the device.
    #[error(transparent)]
    InvalidPayload(#[from] ParseError),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a connection failure with a reason string.
    pub fn connection_failed(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Create a service-not-found error.
    pub fn service_not_found(uuid: Uuid, address: impl Into<String>) -> Self {
        Self::ServiceNotFound {
            uuid,
            address: address.into(),
        }
    }

    /// Create a characteristic-not-found error.
    pub fn characteristic_not_found(uuid: Uuid, service: Uuid) -> Self {
        Self::CharacteristicNotFound { uuid, service }
    }

    /// Create a notify-enable failure.
    pub fn notify_enable_failed(uuid: Uuid, reason: impl Into<String>) -> Self {
        Self::NotifyEnableFailed {
            uuid,
            reason: reason.into(),
        }
    }

    /// Whether this error means the device does not implement the expected
    /// protocol (a configuration problem, never worth retrying).
    pub fn is_protocol_mismatch(&self) -> bool {
        matches!(
            self,
            Self::ServiceNotFound { .. } | Self::CharacteristicNotFound { .. }
        )
    }
}

/// Result type alias using turntouch-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
