//! Discovery filtering.
//!
//! Decides whether an advertised peripheral is a Turn Touch remote worth
//! connecting to. The same allow-list seeds the scan filter handed to the
//! BLE stack, so the scan request and the defensive re-check here always
//! agree; the re-check matters because some platforms only pre-filter and
//! still deliver unrelated advertisements.

use btleplug::api::ScanFilter;
use uuid::Uuid;

use turntouch_types::uuids::{BUTTON_STATUS_SERVICE, BUTTON_STATUS_SERVICE_SHORT};

/// Filter matching advertisements against an allow-list of service UUIDs.
#[derive(Debug, Clone)]
pub struct DiscoveryFilter {
    allowed: Vec<Uuid>,
}

impl Default for DiscoveryFilter {
    fn default() -> Self {
        // Older firmware advertises only the 16-bit short form.
        Self {
            allowed: vec![BUTTON_STATUS_SERVICE, BUTTON_STATUS_SERVICE_SHORT],
        }
    }
}

impl DiscoveryFilter {
    /// Create a filter with a custom allow-list.
    pub fn new(allowed: Vec<Uuid>) -> Self {
        Self { allowed }
    }

    /// The configured allow-list.
    pub fn allowed(&self) -> &[Uuid] {
        &self.allowed
    }

    /// Whether a peripheral advertising `services` is a candidate device.
    pub fn accepts(&self, services: &[Uuid]) -> bool {
        services.iter().any(|uuid| self.allowed.contains(uuid))
    }

    /// The scan filter to pass to the BLE stack at discovery start.
    pub fn scan_filter(&self) -> ScanFilter {
        ScanFilter {
            services: self.allowed.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turntouch_types::uuids::BATTERY_SERVICE;

    #[test]
    fn test_accepts_full_service_uuid() {
        let filter = DiscoveryFilter::default();
        assert!(filter.accepts(&[BUTTON_STATUS_SERVICE]));
    }

    #[test]
    fn test_accepts_short_form_uuid() {
        let filter = DiscoveryFilter::default();
        assert!(filter.accepts(&[BATTERY_SERVICE, BUTTON_STATUS_SERVICE_SHORT]));
    }

    #[test]
    fn test_rejects_unrelated_advertisement() {
        let filter = DiscoveryFilter::default();
        assert!(!filter.accepts(&[BATTERY_SERVICE]));
        assert!(!filter.accepts(&[]));
    }

    #[test]
    fn test_scan_filter_agrees_with_allow_list() {
        let filter = DiscoveryFilter::default();
        assert_eq!(filter.scan_filter().services, filter.allowed());
    }
}
