//! Configuration descriptor sets
//!
//! [`RawConfiguration`] is a validated, borrowed view of one full
//! configuration descriptor buffer. [`Configuration`] is the grouped form:
//! each interface with the endpoints and HID descriptor that follow it.

use crate::error::{DescriptorError, Result};
use crate::types::{
    ConfigDescriptor, DescriptorType, EndpointDescriptor, HidDescriptor,
    InterfaceAssociationDescriptor, InterfaceDescriptor,
};
use crate::walker::{Descriptor, DescriptorWalker};
use serde::Serialize;
use tracing::debug;

/// Borrowed configuration descriptor buffer
///
/// The buffer is owned by the host-controller layer. Construction checks the
/// 9-byte configuration header and restricts the view to `wTotalLength`.
#[derive(Debug, Clone, Copy)]
pub struct RawConfiguration<'a> {
    descriptor: ConfigDescriptor,
    bytes: &'a [u8],
}

impl<'a> RawConfiguration<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        let descriptor = ConfigDescriptor::decode(bytes)?;

        let total = descriptor.total_length as usize;
        if total < ConfigDescriptor::LENGTH {
            return Err(DescriptorError::too_short(
                DescriptorType::Configuration,
                total,
                ConfigDescriptor::LENGTH,
            ));
        }
        if total > bytes.len() {
            return Err(DescriptorError::TruncatedStream {
                offset: 0,
                length: total,
                remaining: bytes.len(),
            });
        }
        if total < bytes.len() {
            debug!(
                "Ignoring {} bytes past wTotalLength {}",
                bytes.len() - total,
                total
            );
        }

        Ok(Self {
            descriptor,
            bytes: &bytes[..total],
        })
    }

    /// The configuration descriptor head
    pub fn descriptor(&self) -> &ConfigDescriptor {
        &self.descriptor
    }

    /// The `wTotalLength` bytes covered by this configuration
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Walk every record, starting with the configuration descriptor itself
    pub fn walk(&self) -> DescriptorWalker<'a> {
        DescriptorWalker::new(self.bytes)
    }

    /// Group the records into interfaces
    pub fn parse(&self) -> Result<Configuration> {
        Configuration::from_raw(self)
    }
}

/// One interface (alternate setting) with the records nested under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interface {
    pub descriptor: InterfaceDescriptor,
    pub endpoints: Vec<EndpointDescriptor>,
    pub hid: Option<HidDescriptor>,
}

impl Interface {
    fn new(descriptor: InterfaceDescriptor) -> Self {
        Self {
            descriptor,
            endpoints: Vec::with_capacity(descriptor.num_endpoints as usize),
            hid: None,
        }
    }

    fn finish(self) -> Result<Self> {
        if self.endpoints.len() != self.descriptor.num_endpoints as usize {
            return Err(DescriptorError::EndpointCountMismatch {
                interface: self.descriptor.interface_number,
                expected: self.descriptor.num_endpoints,
                found: self.endpoints.len(),
            });
        }
        Ok(self)
    }
}

/// Record counts per kind, for logging and assertions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfigurationSummary {
    pub interfaces: usize,
    pub endpoints: usize,
    pub hid: usize,
    pub associations: usize,
}

/// A fully grouped configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    pub descriptor: ConfigDescriptor,
    pub interfaces: Vec<Interface>,
    pub associations: Vec<InterfaceAssociationDescriptor>,
}

impl Configuration {
    fn from_raw(raw: &RawConfiguration<'_>) -> Result<Self> {
        let descriptor = *raw.descriptor();
        let mut interfaces = Vec::new();
        let mut associations = Vec::new();
        let mut current: Option<Interface> = None;

        for entry in raw.walk() {
            let entry = entry?;

            match entry.descriptor {
                Descriptor::Configuration(_) if entry.offset == 0 => {}
                Descriptor::Configuration(_) => {
                    return Err(DescriptorError::malformed(
                        DescriptorType::Configuration,
                        format!("nested configuration descriptor at offset {}", entry.offset),
                    ));
                }
                Descriptor::Interface(intf) => {
                    if let Some(done) = current.replace(Interface::new(intf)) {
                        interfaces.push(done.finish()?);
                    }
                }
                Descriptor::Endpoint(ep) => match current.as_mut() {
                    Some(intf) => intf.endpoints.push(ep),
                    None => return Err(orphan(DescriptorType::Endpoint, entry.offset)),
                },
                Descriptor::Hid(hid) => match current.as_mut() {
                    Some(intf) if intf.hid.is_some() => {
                        return Err(DescriptorError::malformed(
                            DescriptorType::Hid,
                            format!(
                                "duplicate HID descriptor for interface {} at offset {}",
                                intf.descriptor.interface_number, entry.offset
                            ),
                        ));
                    }
                    Some(intf) => intf.hid = Some(hid),
                    None => return Err(orphan(DescriptorType::Hid, entry.offset)),
                },
                Descriptor::InterfaceAssociation(iad) => {
                    let end = u16::from(iad.first_interface) + u16::from(iad.interface_count);
                    if end > u16::from(descriptor.num_interfaces) {
                        return Err(DescriptorError::malformed(
                            DescriptorType::InterfaceAssociation,
                            format!(
                                "interfaces {}..{} exceed bNumInterfaces {}",
                                iad.first_interface, end, descriptor.num_interfaces
                            ),
                        ));
                    }
                    if let Some(done) = current.take() {
                        interfaces.push(done.finish()?);
                    }
                    associations.push(iad);
                }
                Descriptor::Device(_) => {
                    debug!("Ignoring device descriptor at offset {}", entry.offset);
                }
            }
        }

        if let Some(done) = current.take() {
            interfaces.push(done.finish()?);
        }

        Ok(Self {
            descriptor,
            interfaces,
            associations,
        })
    }

    /// The association whose range covers `interface`, if any
    pub fn association_for(&self, interface: &Interface) -> Option<&InterfaceAssociationDescriptor> {
        self.associations
            .iter()
            .find(|iad| iad.contains(interface.descriptor.interface_number))
    }

    pub fn summary(&self) -> ConfigurationSummary {
        ConfigurationSummary {
            interfaces: self.interfaces.len(),
            endpoints: self.interfaces.iter().map(|i| i.endpoints.len()).sum(),
            hid: self.interfaces.iter().filter(|i| i.hid.is_some()).count(),
            associations: self.associations.len(),
        }
    }
}

fn orphan(kind: DescriptorType, offset: usize) -> DescriptorError {
    DescriptorError::malformed(
        kind,
        format!("record at offset {} precedes any interface", offset),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // Boot keyboard: one HID interface with one interrupt IN endpoint
    const KEYBOARD: [u8; 34] = [
        0x09, 0x02, 0x22, 0x00, 0x01, 0x01, 0x00, 0xa0, 0x32, // configuration
        0x09, 0x04, 0x00, 0x00, 0x01, 0x03, 0x01, 0x01, 0x00, // interface 0
        0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0x3f, 0x00, // HID
        0x07, 0x05, 0x81, 0x03, 0x08, 0x00, 0x0a, // endpoint 0x81
    ];

    #[test]
    fn test_raw_configuration_bounds() {
        let raw = RawConfiguration::new(&KEYBOARD).unwrap();
        assert_eq!(raw.as_bytes().len(), 34);
        assert_eq!(raw.descriptor().num_interfaces, 1);
    }

    #[test]
    fn test_raw_configuration_truncated() {
        let err = RawConfiguration::new(&KEYBOARD[..30]).unwrap_err();
        assert_eq!(
            err,
            DescriptorError::TruncatedStream {
                offset: 0,
                length: 34,
                remaining: 30,
            }
        );
    }

    #[test]
    fn test_raw_configuration_trailing_bytes() {
        let mut buf = KEYBOARD.to_vec();
        buf.extend_from_slice(&[0xde, 0xad]);
        let raw = RawConfiguration::new(&buf).unwrap();
        assert_eq!(raw.as_bytes(), &KEYBOARD[..]);
        assert_eq!(raw.walk().count(), 4);
    }

    #[test]
    fn test_raw_configuration_too_short() {
        assert!(matches!(
            RawConfiguration::new(&KEYBOARD[..8]),
            Err(DescriptorError::MalformedDescriptor { .. })
        ));
    }

    #[test]
    fn test_parse_keyboard() {
        let config = RawConfiguration::new(&KEYBOARD).unwrap().parse().unwrap();
        assert_eq!(config.interfaces.len(), 1);

        let intf = &config.interfaces[0];
        assert_eq!(intf.descriptor.class, 0x03);
        assert_eq!(intf.endpoints.len(), 1);
        assert_eq!(intf.endpoints[0].address, 0x81);
        assert_eq!(intf.hid.unwrap().report.length, 63);
        assert!(config.association_for(intf).is_none());
        assert_eq!(
            config.summary(),
            ConfigurationSummary {
                interfaces: 1,
                endpoints: 1,
                hid: 1,
                associations: 0,
            }
        );
    }

    #[test]
    fn test_endpoint_count_mismatch() {
        let mut buf = KEYBOARD;
        buf[13] = 2; // bNumEndpoints
        let err = RawConfiguration::new(&buf).unwrap().parse().unwrap_err();
        assert_eq!(
            err,
            DescriptorError::EndpointCountMismatch {
                interface: 0,
                expected: 2,
                found: 1,
            }
        );
    }

    #[test]
    fn test_endpoint_before_interface() {
        let buf = [
            0x09, 0x02, 0x10, 0x00, 0x01, 0x01, 0x00, 0x80, 0x32, // configuration
            0x07, 0x05, 0x81, 0x03, 0x08, 0x00, 0x0a, // endpoint
        ];
        assert!(matches!(
            RawConfiguration::new(&buf).unwrap().parse(),
            Err(DescriptorError::MalformedDescriptor {
                kind: DescriptorType::Endpoint,
                ..
            })
        ));
    }

    #[test]
    fn test_duplicate_hid_descriptor() {
        let buf = [
            0x09, 0x02, 0x24, 0x00, 0x01, 0x01, 0x00, 0xa0, 0x32, // configuration
            0x09, 0x04, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, // interface 0
            0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0x3f, 0x00, // HID
            0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0x99, 0x00, // HID again
        ];
        let err = RawConfiguration::new(&buf).unwrap().parse().unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::MalformedDescriptor {
                kind: DescriptorType::Hid,
                ..
            }
        ));
        assert!(err.to_string().contains("duplicate HID descriptor"));
    }

    #[test]
    fn test_association_out_of_range() {
        let buf = [
            0x09, 0x02, 0x11, 0x00, 0x01, 0x01, 0x00, 0x80, 0x32, // configuration
            0x08, 0x0b, 0x00, 0x02, 0x02, 0x02, 0x01, 0x00, // IAD covering 0..2
        ];
        assert!(matches!(
            RawConfiguration::new(&buf).unwrap().parse(),
            Err(DescriptorError::MalformedDescriptor {
                kind: DescriptorType::InterfaceAssociation,
                ..
            })
        ));
    }
}
