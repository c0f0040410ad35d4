//! Error types for payload decoding in turntouch-types.

use thiserror::Error;

/// Errors that can occur when decoding Turn Touch notification payloads.
///
/// This error type is platform-agnostic and does not include BLE-specific
/// errors (those belong in turntouch-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// Payload bytes did not match the expected wire format.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl ParseError {
    /// Create an invalid-payload error with a description.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }
}

/// Result type alias using turntouch-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
