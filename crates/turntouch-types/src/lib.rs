//! Platform-agnostic protocol types for Turn Touch BLE remotes.
//!
//! This crate provides the pure decoding layer shared by every consumer of
//! the remote's GATT payloads: no I/O, no async, no BLE dependency.
//!
//! # Features
//!
//! - Button-status decoding with press/release edge detection
//! - Battery-level decoding
//! - UUID constants for the remote's services and characteristics
//! - Error types for payload decoding
//!
//! # Example
//!
//! ```
//! use turntouch_types::{ButtonState, Direction, decode_buttons};
//!
//! // 0xFE = north held (active-low), nothing held before.
//! let change = decode_buttons(&[0xFE, 0x00], ButtonState::RELEASED).unwrap();
//! assert!(change.newly_pressed.contains(Direction::North));
//! ```

pub mod battery;
pub mod buttons;
pub mod error;
pub mod uuid;

pub use battery::decode_battery_level;
pub use buttons::{ButtonChange, ButtonState, Direction, DirectionSet, decode_buttons};
pub use error::{ParseError, ParseResult};
pub use self::uuid as uuids;

#[cfg(test)]
mod tests {
    use super::*;

    // --- Cross-module decoding tests ---

    #[test]
    fn test_press_release_cycle_produces_one_event_each() {
        let mut state = ButtonState::RELEASED;
        let mut presses = Vec::new();
        let mut releases = Vec::new();

        for payload in [[0xFEu8, 0x00], [0xFE, 0x00], [0xFF, 0x00]] {
            let change = decode_buttons(&payload, state).unwrap();
            presses.extend(change.newly_pressed.iter());
            releases.extend(change.newly_released.iter());
            state = change.state;
        }

        assert_eq!(presses, [Direction::North]);
        assert_eq!(releases, [Direction::North]);
    }

    #[test]
    fn test_battery_scaling_matches_remote_range() {
        assert_eq!(decode_battery_level(&[0xFF]).unwrap(), 100);
        assert_eq!(decode_battery_level(&[0x80]).unwrap(), 50);
        assert_eq!(decode_battery_level(&[0x00]).unwrap(), 0);
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::invalid_payload("button status payload is empty");
        assert_eq!(
            err.to_string(),
            "invalid payload: button status payload is empty"
        );
    }

    #[test]
    fn test_uuid_prefix_helpers_exported() {
        assert!(uuids::is_battery_service(&uuids::BATTERY_SERVICE));
        assert!(uuids::is_battery_level(&uuids::BATTERY_LEVEL));
    }
}
