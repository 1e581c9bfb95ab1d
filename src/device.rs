use serde::{Deserialize, Serialize};
use std::fmt;

/// USB identity of an attached device, used for diagnostics and filtering only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceId {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VID=0x{:04X}, PID=0x{:04X}",
            self.vendor_id, self.product_id
        )
    }
}

/// A single accept rule; a missing product id matches every product of the vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFilter {
    pub vendor_id: u16,
    #[serde(default)]
    pub product_id: Option<u16>,
}

impl DeviceFilter {
    pub fn matches(&self, device: &DeviceId) -> bool {
        self.vendor_id == device.vendor_id
            && self.product_id.map_or(true, |pid| pid == device.product_id)
    }
}

/// Returns true when `device` passes the filter list. An empty list accepts everything.
pub fn is_accepted(filters: &[DeviceFilter], device: &DeviceId) -> bool {
    filters.is_empty() || filters.iter().any(|filter| filter.matches(device))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_display_format() {
        let device = DeviceId::new(0x046d, 0x85e);
        assert_eq!(device.to_string(), "VID=0x046D, PID=0x085E");
    }

    #[test]
    fn test_filter_matching() {
        let device = DeviceId::new(0x046d, 0x085e);

        let vendor_only = DeviceFilter {
            vendor_id: 0x046d,
            product_id: None,
        };
        let exact = DeviceFilter {
            vendor_id: 0x046d,
            product_id: Some(0x085e),
        };
        let other_product = DeviceFilter {
            vendor_id: 0x046d,
            product_id: Some(0x0001),
        };

        assert!(vendor_only.matches(&device));
        assert!(exact.matches(&device));
        assert!(!other_product.matches(&device));
    }

    #[test]
    fn test_empty_filter_list_accepts_all() {
        let device = DeviceId::new(0x1234, 0x5678);
        assert!(is_accepted(&[], &device));

        let filters = [DeviceFilter {
            vendor_id: 0x0bda,
            product_id: None,
        }];
        assert!(!is_accepted(&filters, &device));
    }
}
