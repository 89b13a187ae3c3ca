//! Human-readable descriptor dumps
//!
//! Each record renders as one `field: value` line per wire field, using the
//! USB specification field names so the output can be compared against
//! `lsusb -v` or a protocol analyzer.

use crate::configuration::RawConfiguration;
use crate::error::Result;
use crate::types::{
    ConfigDescriptor, DeviceDescriptor, EndpointDescriptor, HidDescriptor,
    InterfaceAssociationDescriptor, InterfaceDescriptor,
};
use crate::walker::{Descriptor, WalkEntry};
use std::fmt::{self, Write};

/// Format a binary-coded decimal version such as `bcdUSB` (0x0210 -> "2.10")
pub fn format_bcd(bcd: u16) -> String {
    format!("{:x}.{:02x}", bcd >> 8, bcd & 0xff)
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "bLength: {}", Self::LENGTH)?;
        writeln!(f, "bDescriptorType (device): 1")?;
        writeln!(f, "bcdUSB: 0x{:x} ({})", self.usb_version, format_bcd(self.usb_version))?;
        writeln!(f, "bDeviceClass: 0x{:02x}", self.class)?;
        writeln!(f, "bDeviceSubClass: 0x{:02x}", self.sub_class)?;
        writeln!(f, "bDeviceProtocol: 0x{:02x}", self.protocol)?;
        writeln!(f, "bMaxPacketSize0: {}", self.max_packet_size0)?;
        writeln!(f, "idVendor: 0x{:04x}", self.vendor_id)?;
        writeln!(f, "idProduct: 0x{:04x}", self.product_id)?;
        writeln!(f, "bcdDevice: 0x{:x}", self.device_version)?;
        writeln!(f, "iManufacturer: {}", self.manufacturer_index)?;
        writeln!(f, "iProduct: {}", self.product_index)?;
        writeln!(f, "iSerialNumber: {}", self.serial_number_index)?;
        write!(f, "bNumConfigurations: {}", self.num_configurations)
    }
}

impl fmt::Display for ConfigDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let powers: Vec<&str> = [
            (self.self_powered(), "Self Powered"),
            (self.remote_wakeup(), "Remote Wakeup"),
            (self.battery_powered(), "Battery Powered"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect();

        writeln!(f, "bLength: {}", Self::LENGTH)?;
        writeln!(f, "bDescriptorType (config): 2")?;
        writeln!(f, "wTotalLength: {}", self.total_length)?;
        writeln!(f, "bNumInterfaces: {}", self.num_interfaces)?;
        writeln!(f, "bConfigurationValue: {}", self.configuration_value)?;
        writeln!(f, "iConfiguration: {}", self.configuration_index)?;
        writeln!(f, "bmAttributes({}): 0x{:02x}", powers.join(", "), self.attributes)?;
        write!(f, "bMaxPower: {} = {} mA", self.max_power, self.max_power_ma())
    }
}

impl fmt::Display for InterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "bLength: {}", Self::LENGTH)?;
        writeln!(f, "bDescriptorType (interface): 4")?;
        writeln!(f, "bInterfaceNumber: {}", self.interface_number)?;
        writeln!(f, "bAlternateSetting: {}", self.alternate_setting)?;
        writeln!(f, "bNumEndpoints: {}", self.num_endpoints)?;
        writeln!(f, "bInterfaceClass: 0x{:02x}", self.class)?;
        writeln!(f, "bInterfaceSubClass: 0x{:02x}", self.sub_class)?;
        writeln!(f, "bInterfaceProtocol: 0x{:02x}", self.protocol)?;
        write!(f, "iInterface: {}", self.interface_index)
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "bLength: {}", self.length())?;
        writeln!(f, "bDescriptorType (endpoint): 5")?;
        writeln!(f, "bEndpointAddress({}): 0x{:02x}", self.direction(), self.address)?;
        writeln!(f, "bmAttributes({}): 0x{:02x}", self.transfer_type(), self.attributes)?;
        writeln!(f, "wMaxPacketSize: {}", self.max_packet_size)?;
        write!(f, "bInterval: {}", self.interval)?;
        if let Some(audio) = &self.audio {
            writeln!(f)?;
            writeln!(f, "bRefresh: {}", audio.refresh)?;
            write!(f, "bSynchAddress: 0x{:02x}", audio.synch_address)?;
        }
        Ok(())
    }
}

impl fmt::Display for HidDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "bLength: {}", self.length)?;
        writeln!(f, "bDescriptorType (HID): 33")?;
        writeln!(f, "bcdHID: 0x{:04x}", self.hid_version)?;
        writeln!(f, "bCountryCode: {}", self.country_code)?;
        writeln!(f, "bNumDescriptor: {}", self.num_descriptors)?;
        writeln!(f, "bDescriptorType: {}", self.report.descriptor_type)?;
        write!(f, "wDescriptorLength: {}", self.report.length)?;
        if let Some(optional) = &self.optional {
            writeln!(f)?;
            writeln!(f, "bDescriptorTypeOpt: {}", optional.descriptor_type)?;
            write!(f, "wDescriptorLengthOpt: {}", optional.length)?;
        }
        Ok(())
    }
}

impl fmt::Display for InterfaceAssociationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "bLength: {}", Self::LENGTH)?;
        writeln!(f, "bDescriptorType (interface association): 11")?;
        writeln!(f, "bFirstInterface: {}", self.first_interface)?;
        writeln!(f, "bInterfaceCount: {}", self.interface_count)?;
        writeln!(f, "bFunctionClass: 0x{:02x}", self.function_class)?;
        writeln!(f, "bFunctionSubClass: 0x{:02x}", self.function_sub_class)?;
        writeln!(f, "bFunctionProtocol: 0x{:02x}", self.function_protocol)?;
        write!(f, "iFunction: {}", self.function_index)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Descriptor::Device(d) => fmt::Display::fmt(d, f),
            Descriptor::Configuration(d) => fmt::Display::fmt(d, f),
            Descriptor::Interface(d) => fmt::Display::fmt(d, f),
            Descriptor::Endpoint(d) => fmt::Display::fmt(d, f),
            Descriptor::Hid(d) => fmt::Display::fmt(d, f),
            Descriptor::InterfaceAssociation(d) => fmt::Display::fmt(d, f),
        }
    }
}

impl fmt::Display for WalkEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{:#06x}] {} descriptor", self.offset, self.descriptor.kind())?;
        fmt::Display::fmt(&self.descriptor, f)
    }
}

/// Render every record of a configuration, one block per record.
///
/// A walk error discards the partial output and is returned as is.
pub fn dump_configuration(raw: &RawConfiguration<'_>) -> Result<String> {
    let mut out = String::new();
    for entry in raw.walk() {
        let entry = entry?;
        // Writing to a String cannot fail
        let _ = writeln!(out, "{}", entry);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bcd() {
        assert_eq!(format_bcd(0x0200), "2.00");
        assert_eq!(format_bcd(0x0210), "2.10");
        assert_eq!(format_bcd(0x0111), "1.11");
    }

    #[test]
    fn test_endpoint_dump() {
        let ep = EndpointDescriptor::new(0x81, 0x03, 8, 10);
        let text = ep.to_string();
        assert!(text.starts_with("bLength: 7\n"));
        assert!(text.contains("bEndpointAddress(In): 0x81"));
        assert!(text.contains("bmAttributes(Interrupt): 0x03"));
        assert!(text.contains("bInterval: 10"));
        assert!(!text.contains("bRefresh"));
    }

    #[test]
    fn test_audio_endpoint_dump() {
        let bytes = [0x09, 0x05, 0x01, 0x09, 0xc0, 0x00, 0x01, 0x00, 0x03];
        let text = EndpointDescriptor::decode(&bytes).unwrap().to_string();
        assert!(text.starts_with("bLength: 9\n"));
        assert!(text.contains("bmAttributes(Isochronous): 0x09"));
        assert!(text.contains("bRefresh: 0"));
        assert!(text.ends_with("bSynchAddress: 0x03"));
    }

    #[test]
    fn test_config_dump_power_flags() {
        let config = ConfigDescriptor {
            total_length: 34,
            num_interfaces: 1,
            configuration_value: 1,
            configuration_index: 0,
            attributes: 0xe0,
            max_power: 50,
        };
        let text = config.to_string();
        assert!(text.contains("bmAttributes(Self Powered, Remote Wakeup): 0xe0"));
        assert!(text.contains("bMaxPower: 50 = 100 mA"));
    }

    #[test]
    fn test_hid_dump_optional_pair() {
        let bytes = [
            0x0c, 0x21, 0x11, 0x01, 0x00, 0x02, 0x22, 0x3f, 0x00, 0x23, 0x10, 0x00,
        ];
        let hid = HidDescriptor::decode(&bytes).unwrap();
        let text = hid.to_string();
        assert!(text.contains("bNumDescriptor: 2"));
        assert!(text.contains("bDescriptorTypeOpt: 35"));
        assert!(text.contains("wDescriptorLengthOpt: 16"));

        let single = HidDescriptor::decode(&[0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0x3f, 0x00])
            .unwrap();
        assert!(!single.to_string().contains("Opt"));
    }

    #[test]
    fn test_dump_configuration() {
        let buf = [
            0x09, 0x02, 0x12, 0x00, 0x01, 0x01, 0x00, 0x80, 0x32, // configuration
            0x09, 0x04, 0x00, 0x00, 0x00, 0xff, 0x00, 0x00, 0x00, // interface
        ];
        let raw = RawConfiguration::new(&buf).unwrap();
        let text = dump_configuration(&raw).unwrap();
        assert!(text.contains("[0x0000] configuration descriptor"));
        assert!(text.contains("[0x0009] interface descriptor"));
        assert!(text.contains("bInterfaceClass: 0xff"));
    }
}
