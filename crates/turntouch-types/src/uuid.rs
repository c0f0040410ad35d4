//! Bluetooth UUIDs for Turn Touch remotes.
//!
//! This module contains the UUIDs needed to discover and talk to a Turn
//! Touch remote over Bluetooth Low Energy.

use uuid::{Uuid, uuid};

// --- Turn Touch Service UUIDs ---

/// Button-status service advertised and exposed by the remote.
pub const BUTTON_STATUS_SERVICE: Uuid = uuid!("99c31523-dc4f-41b1-bb04-4e4deb81fadd");

/// Short-form identifier (16-bit `0x1523` on the Bluetooth base UUID) that
/// some firmware revisions advertise instead of the full service UUID.
pub const BUTTON_STATUS_SERVICE_SHORT: Uuid = uuid!("00001523-0000-1000-8000-00805f9b34fb");

// --- Turn Touch Characteristic UUIDs ---

/// Notify characteristic carrying the button-status byte(s).
pub const BUTTON_STATUS_CHARACTERISTIC: Uuid = uuid!("99c31525-dc4f-41b1-bb04-4e4deb81fadd");

// --- Standard BLE Service UUIDs ---

/// Battery service (base form; some firmware grafts the assigned number onto
/// a vendor base UUID, hence the prefix matchers below).
pub const BATTERY_SERVICE: Uuid = uuid!("0000180f-0000-1000-8000-00805f9b34fb");

/// Battery level characteristic.
pub const BATTERY_LEVEL: Uuid = uuid!("00002a19-0000-1000-8000-00805f9b34fb");

/// 32-bit prefix of the battery service UUID.
const BATTERY_SERVICE_PREFIX: u32 = 0x0000_180F;

/// 32-bit prefix of the battery level characteristic UUID.
const BATTERY_LEVEL_PREFIX: u32 = 0x0000_2A19;

/// Whether a service UUID identifies a battery service, matched by prefix.
#[must_use]
pub fn is_battery_service(uuid: &Uuid) -> bool {
    uuid.as_fields().0 == BATTERY_SERVICE_PREFIX
}

/// Whether a characteristic UUID identifies a battery level reading, matched
/// by prefix.
#[must_use]
pub fn is_battery_level(uuid: &Uuid) -> bool {
    uuid.as_fields().0 == BATTERY_LEVEL_PREFIX
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_status_service_uuid() {
        let expected = "99c31523-dc4f-41b1-bb04-4e4deb81fadd";
        assert_eq!(BUTTON_STATUS_SERVICE.to_string(), expected);
    }

    #[test]
    fn test_button_status_characteristic_uuid() {
        let expected = "99c31525-dc4f-41b1-bb04-4e4deb81fadd";
        assert_eq!(BUTTON_STATUS_CHARACTERISTIC.to_string(), expected);
    }

    #[test]
    fn test_short_form_service_uuid() {
        let expected = "00001523-0000-1000-8000-00805f9b34fb";
        assert_eq!(BUTTON_STATUS_SERVICE_SHORT.to_string(), expected);
    }

    #[test]
    fn test_battery_service_uuid() {
        let expected = "0000180f-0000-1000-8000-00805f9b34fb";
        assert_eq!(BATTERY_SERVICE.to_string(), expected);
    }

    #[test]
    fn test_battery_level_uuid() {
        let expected = "00002a19-0000-1000-8000-00805f9b34fb";
        assert_eq!(BATTERY_LEVEL.to_string(), expected);
    }

    #[test]
    fn test_battery_service_prefix_match() {
        assert!(is_battery_service(&BATTERY_SERVICE));
        // Vendor-extended tail still matches the prefix.
        let extended = uuid!("0000180f-dc4f-41b1-bb04-4e4deb81fadd");
        assert!(is_battery_service(&extended));
        assert!(!is_battery_service(&BUTTON_STATUS_SERVICE));
    }

    #[test]
    fn test_battery_level_prefix_match() {
        assert!(is_battery_level(&BATTERY_LEVEL));
        let extended = uuid!("00002a19-dc4f-41b1-bb04-4e4deb81fadd");
        assert!(is_battery_level(&extended));
        assert!(!is_battery_level(&BUTTON_STATUS_CHARACTERISTIC));
        assert!(!is_battery_level(&BATTERY_SERVICE));
    }

    #[test]
    fn test_service_uuids_are_distinct() {
        assert_ne!(BUTTON_STATUS_SERVICE, BUTTON_STATUS_SERVICE_SHORT);
        assert_ne!(BUTTON_STATUS_SERVICE, BATTERY_SERVICE);
        assert_ne!(BUTTON_STATUS_CHARACTERISTIC, BATTERY_LEVEL);
    }

    #[test]
    fn test_button_uuids_share_vendor_base() {
        // Service and characteristic differ only in the assigned-number field.
        assert_eq!(
            BUTTON_STATUS_SERVICE.as_fields().3,
            BUTTON_STATUS_CHARACTERISTIC.as_fields().3
        );
    }
}
