//! Test utilities for usbh-enum
//!
//! Provides descriptor fixtures and a builder for configuration descriptor
//! sets, shared by the unit and integration tests of every crate.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{ConfigurationBuilder, endpoint, interface};
//!
//! let bytes = ConfigurationBuilder::new(1)
//!     .record(&interface(0, 1, 0x08))
//!     .record(&endpoint(0x81, 0x02, 512))
//!     .build();
//! assert_eq!(bytes.len(), 25);
//! assert_eq!(bytes[2], 25); // wTotalLength
//! ```

use descriptor::{ConfigDescriptor, DescriptorType};

/// Create a mock device descriptor (GET_DESCRIPTOR Device)
///
/// Returns a standard 18-byte device descriptor for VID 0x1234, PID 0x5678
pub fn create_mock_device_descriptor() -> Vec<u8> {
    vec![
        0x12, // bLength
        0x01, // bDescriptorType (Device)
        0x00, 0x02, // bcdUSB (2.00)
        0x00, // bDeviceClass
        0x00, // bDeviceSubClass
        0x00, // bDeviceProtocol
        0x40, // bMaxPacketSize0 (64 bytes)
        0x34, 0x12, // idVendor (0x1234)
        0x78, 0x56, // idProduct (0x5678)
        0x00, 0x01, // bcdDevice (1.00)
        0x01, // iManufacturer
        0x02, // iProduct
        0x03, // iSerialNumber
        0x01, // bNumConfigurations
    ]
}

/// Create a mock configuration descriptor set
///
/// One vendor-specific interface with a single bulk IN endpoint
pub fn create_mock_config_descriptor() -> Vec<u8> {
    vec![
        // Configuration descriptor
        0x09, // bLength
        0x02, // bDescriptorType (Configuration)
        0x19, 0x00, // wTotalLength (25 bytes)
        0x01, // bNumInterfaces
        0x01, // bConfigurationValue
        0x00, // iConfiguration
        0x80, // bmAttributes (Bus-powered)
        0x32, // bMaxPower (100mA)
        // Interface descriptor
        0x09, // bLength
        0x04, // bDescriptorType (Interface)
        0x00, // bInterfaceNumber
        0x00, // bAlternateSetting
        0x01, // bNumEndpoints
        0xFF, // bInterfaceClass (Vendor-specific)
        0x00, // bInterfaceSubClass
        0x00, // bInterfaceProtocol
        0x00, // iInterface
        // Endpoint descriptor
        0x07, // bLength
        0x05, // bDescriptorType (Endpoint)
        0x81, // bEndpointAddress (EP1 IN)
        0x02, // bmAttributes (Bulk)
        0x00, 0x02, // wMaxPacketSize (512 bytes)
        0x00, // bInterval
    ]
}

/// Create a boot keyboard configuration descriptor set
///
/// One HID interface, its HID class descriptor, and an interrupt IN endpoint
pub fn create_mock_keyboard_config() -> Vec<u8> {
    ConfigurationBuilder::new(1)
        .attributes(0xa0)
        .record(&[0x09, 0x04, 0x00, 0x00, 0x01, 0x03, 0x01, 0x01, 0x00])
        .record(&hid(&[(0x22, 63)]))
        .record(&endpoint(0x81, 0x03, 8))
        .build()
}

/// Interface descriptor with alternate setting 0 and no string
pub fn interface(number: u8, num_endpoints: u8, class: u8) -> Vec<u8> {
    vec![
        0x09,
        DescriptorType::Interface.code(),
        number,
        0x00,
        num_endpoints,
        class,
        0x00,
        0x00,
        0x00,
    ]
}

/// Endpoint descriptor; `attributes` carries the transfer type in bits 1..0
pub fn endpoint(address: u8, attributes: u8, max_packet_size: u16) -> Vec<u8> {
    let [lo, hi] = max_packet_size.to_le_bytes();
    let interval = if attributes & 0x03 == 0x03 { 10 } else { 0 };
    vec![
        0x07,
        DescriptorType::Endpoint.code(),
        address,
        attributes,
        lo,
        hi,
        interval,
    ]
}

/// HID class descriptor with the given (type, length) pairs
pub fn hid(class_descriptors: &[(u8, u16)]) -> Vec<u8> {
    let mut buf = vec![
        0x00,
        DescriptorType::Hid.code(),
        0x11,
        0x01, // bcdHID (1.11)
        0x00, // bCountryCode
        class_descriptors.len() as u8,
    ];
    for (kind, length) in class_descriptors {
        buf.push(*kind);
        buf.extend_from_slice(&length.to_le_bytes());
    }
    buf[0] = buf.len() as u8;
    buf
}

/// Interface association descriptor
pub fn association(first_interface: u8, interface_count: u8, function_class: u8) -> Vec<u8> {
    vec![
        0x08,
        DescriptorType::InterfaceAssociation.code(),
        first_interface,
        interface_count,
        function_class,
        0x00,
        0x00,
        0x00,
    ]
}

/// Builds a configuration descriptor set record by record
///
/// The configuration head is generated on [`build`](Self::build) with
/// `wTotalLength` covering every appended record.
#[derive(Debug, Clone)]
pub struct ConfigurationBuilder {
    num_interfaces: u8,
    configuration_value: u8,
    attributes: u8,
    max_power: u8,
    total_length: Option<u16>,
    body: Vec<u8>,
}

impl ConfigurationBuilder {
    pub fn new(num_interfaces: u8) -> Self {
        Self {
            num_interfaces,
            configuration_value: 1,
            attributes: 0x80,
            max_power: 0x32,
            total_length: None,
            body: Vec::new(),
        }
    }

    pub fn configuration_value(mut self, value: u8) -> Self {
        self.configuration_value = value;
        self
    }

    pub fn attributes(mut self, attributes: u8) -> Self {
        self.attributes = attributes;
        self
    }

    /// Override the computed `wTotalLength`, for truncation tests
    pub fn total_length(mut self, total_length: u16) -> Self {
        self.total_length = Some(total_length);
        self
    }

    /// Append raw record bytes after the configuration head
    pub fn record(mut self, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let computed = (ConfigDescriptor::LENGTH + self.body.len()) as u16;
        let head = ConfigDescriptor {
            total_length: self.total_length.unwrap_or(computed),
            num_interfaces: self.num_interfaces,
            configuration_value: self.configuration_value,
            configuration_index: 0,
            attributes: self.attributes,
            max_power: self.max_power,
        };

        let mut buf = head.encode();
        buf.extend_from_slice(&self.body);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use descriptor::{DeviceDescriptor, HidDescriptor, RawConfiguration};

    #[test]
    fn test_create_mock_device_descriptor() {
        let desc = create_mock_device_descriptor();

        assert_eq!(desc.len(), 18);
        let device = DeviceDescriptor::decode(&desc).unwrap();
        assert_eq!(device.vendor_id, 0x1234);
        assert_eq!(device.product_id, 0x5678);
        assert_eq!(device.max_packet_size0, 64);
    }

    #[test]
    fn test_create_mock_config_descriptor() {
        let desc = create_mock_config_descriptor();

        assert_eq!(desc.len(), 25);
        let config = RawConfiguration::new(&desc).unwrap().parse().unwrap();
        assert_eq!(config.interfaces[0].endpoints[0].max_packet_size, 512);
    }

    #[test]
    fn test_builder_matches_handwritten_fixture() {
        let built = ConfigurationBuilder::new(1)
            .record(&interface(0, 1, 0xff))
            .record(&endpoint(0x81, 0x02, 512))
            .build();

        assert_eq!(built, create_mock_config_descriptor());
    }

    #[test]
    fn test_keyboard_fixture() {
        let desc = create_mock_keyboard_config();

        assert_eq!(desc.len(), 34);
        let config = RawConfiguration::new(&desc).unwrap().parse().unwrap();
        assert_eq!(config.interfaces[0].hid.unwrap().report.length, 63);
        assert!(config.descriptor.remote_wakeup());
    }

    #[test]
    fn test_hid_record_lengths() {
        assert_eq!(hid(&[(0x22, 63)]).len(), 9);

        let two = hid(&[(0x22, 63), (0x23, 16)]);
        assert_eq!(two.len(), 12);
        assert_eq!(two[0], 12);
        let decoded = HidDescriptor::decode(&two).unwrap();
        assert_eq!(decoded.optional.unwrap().length, 16);
    }

    #[test]
    fn test_total_length_override() {
        let desc = ConfigurationBuilder::new(0).total_length(64).build();
        assert_eq!(desc.len(), 9);
        assert_eq!(desc[2], 64);
        assert!(RawConfiguration::new(&desc).is_err());
    }
}
