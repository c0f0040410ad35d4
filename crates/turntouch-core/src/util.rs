//! Utility functions for turntouch-core.

use btleplug::platform::PeripheralId;

/// Format a peripheral ID as a string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms, they may be MAC
/// addresses or other formats. This function extracts the useful identifier
/// string.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Create a device address string from a BLE address and peripheral ID.
///
/// On macOS where addresses read 00:00:00:00:00:00, the peripheral ID is used
/// instead; elsewhere the Bluetooth address is the stable identifier.
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if address == "00:00:00:00:00:00" {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}
