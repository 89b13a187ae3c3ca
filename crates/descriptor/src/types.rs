//! USB descriptor record types
//!
//! This module defines typed representations of the standard USB descriptors
//! found in a device's descriptor set: device, configuration, interface,
//! endpoint, HID class and interface association descriptors.
//!
//! Every record is decoded from a borrowed byte window with an explicit
//! length check before any field is read. Multi-byte fields are little-endian
//! on the wire (USB 2.0 §8.1). Each record can also be encoded back into its
//! canonical byte layout.

use crate::error::{DescriptorError, Result};
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Descriptor type tag (`bDescriptorType`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DescriptorType {
    Device,
    Configuration,
    String,
    Interface,
    Endpoint,
    DeviceQualifier,
    OtherSpeedConfiguration,
    InterfacePower,
    Otg,
    Debug,
    InterfaceAssociation,
    Bos,
    DeviceCapability,
    /// HID class descriptor (HID 1.11 §6.2.1)
    Hid,
    /// HID report descriptor
    Report,
    /// HID physical descriptor
    Physical,
    /// Any tag this crate does not interpret
    Unknown(u8),
}

impl DescriptorType {
    /// Wire value of the type tag
    pub fn code(self) -> u8 {
        match self {
            DescriptorType::Device => 0x01,
            DescriptorType::Configuration => 0x02,
            DescriptorType::String => 0x03,
            DescriptorType::Interface => 0x04,
            DescriptorType::Endpoint => 0x05,
            DescriptorType::DeviceQualifier => 0x06,
            DescriptorType::OtherSpeedConfiguration => 0x07,
            DescriptorType::InterfacePower => 0x08,
            DescriptorType::Otg => 0x09,
            DescriptorType::Debug => 0x0A,
            DescriptorType::InterfaceAssociation => 0x0B,
            DescriptorType::Bos => 0x0F,
            DescriptorType::DeviceCapability => 0x10,
            DescriptorType::Hid => 0x21,
            DescriptorType::Report => 0x22,
            DescriptorType::Physical => 0x23,
            DescriptorType::Unknown(code) => code,
        }
    }
}

impl From<u8> for DescriptorType {
    fn from(code: u8) -> Self {
        match code {
            0x01 => DescriptorType::Device,
            0x02 => DescriptorType::Configuration,
            0x03 => DescriptorType::String,
            0x04 => DescriptorType::Interface,
            0x05 => DescriptorType::Endpoint,
            0x06 => DescriptorType::DeviceQualifier,
            0x07 => DescriptorType::OtherSpeedConfiguration,
            0x08 => DescriptorType::InterfacePower,
            0x09 => DescriptorType::Otg,
            0x0A => DescriptorType::Debug,
            0x0B => DescriptorType::InterfaceAssociation,
            0x0F => DescriptorType::Bos,
            0x10 => DescriptorType::DeviceCapability,
            0x21 => DescriptorType::Hid,
            0x22 => DescriptorType::Report,
            0x23 => DescriptorType::Physical,
            other => DescriptorType::Unknown(other),
        }
    }
}

impl fmt::Display for DescriptorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DescriptorType::Device => "device",
            DescriptorType::Configuration => "configuration",
            DescriptorType::String => "string",
            DescriptorType::Interface => "interface",
            DescriptorType::Endpoint => "endpoint",
            DescriptorType::DeviceQualifier => "device qualifier",
            DescriptorType::OtherSpeedConfiguration => "other-speed configuration",
            DescriptorType::InterfacePower => "interface power",
            DescriptorType::Otg => "OTG",
            DescriptorType::Debug => "debug",
            DescriptorType::InterfaceAssociation => "interface association",
            DescriptorType::Bos => "BOS",
            DescriptorType::DeviceCapability => "device capability",
            DescriptorType::Hid => "HID",
            DescriptorType::Report => "HID report",
            DescriptorType::Physical => "HID physical",
            DescriptorType::Unknown(code) => return write!(f, "unknown ({:#04x})", code),
        };
        f.write_str(name)
    }
}

/// Common two-byte prefix of every descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorHeader {
    /// `bLength`: size of the whole record in bytes
    pub length: u8,
    /// `bDescriptorType`
    pub descriptor_type: u8,
}

impl DescriptorHeader {
    pub const SIZE: usize = 2;

    /// Read the header at the start of `bytes`, if two bytes are available
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [length, descriptor_type, ..] => Some(Self {
                length: *length,
                descriptor_type: *descriptor_type,
            }),
            _ => None,
        }
    }

    pub fn kind(&self) -> DescriptorType {
        DescriptorType::from(self.descriptor_type)
    }
}

/// Validate a record window and return it cut to its declared length.
fn check_record(bytes: &[u8], kind: DescriptorType, minimum: usize) -> Result<&[u8]> {
    if bytes.len() < minimum {
        return Err(DescriptorError::too_short(kind, bytes.len(), minimum));
    }
    if bytes[1] != kind.code() {
        return Err(DescriptorError::UnexpectedType {
            expected: kind,
            found: bytes[1],
        });
    }

    let declared = bytes[0] as usize;
    if declared < minimum {
        return Err(DescriptorError::too_short(kind, declared, minimum));
    }
    if declared > bytes.len() {
        return Err(DescriptorError::malformed(
            kind,
            format!(
                "declares {} bytes but only {} are available",
                declared,
                bytes.len()
            ),
        ));
    }

    Ok(&bytes[..declared])
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    let mut field = [0u8; 2];
    LittleEndian::write_u16(&mut field, value);
    buf.extend_from_slice(&field);
}

/// Standard device descriptor (USB 2.0 §9.6.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// `bcdUSB`
    pub usb_version: u16,
    pub class: u8,
    pub sub_class: u8,
    pub protocol: u8,
    /// `bMaxPacketSize0`
    pub max_packet_size0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    /// `bcdDevice`
    pub device_version: u16,
    pub manufacturer_index: u8,
    pub product_index: u8,
    pub serial_number_index: u8,
    pub num_configurations: u8,
}

impl DeviceDescriptor {
    pub const LENGTH: usize = 18;

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let b = check_record(bytes, DescriptorType::Device, Self::LENGTH)?;
        if b.len() != Self::LENGTH {
            return Err(DescriptorError::malformed(
                DescriptorType::Device,
                format!("bLength is {}, expected {}", b.len(), Self::LENGTH),
            ));
        }

        Ok(Self {
            usb_version: LittleEndian::read_u16(&b[2..4]),
            class: b[4],
            sub_class: b[5],
            protocol: b[6],
            max_packet_size0: b[7],
            vendor_id: LittleEndian::read_u16(&b[8..10]),
            product_id: LittleEndian::read_u16(&b[10..12]),
            device_version: LittleEndian::read_u16(&b[12..14]),
            manufacturer_index: b[14],
            product_index: b[15],
            serial_number_index: b[16],
            num_configurations: b[17],
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LENGTH);
        buf.push(Self::LENGTH as u8);
        buf.push(DescriptorType::Device.code());
        put_u16(&mut buf, self.usb_version);
        buf.extend_from_slice(&[
            self.class,
            self.sub_class,
            self.protocol,
            self.max_packet_size0,
        ]);
        put_u16(&mut buf, self.vendor_id);
        put_u16(&mut buf, self.product_id);
        put_u16(&mut buf, self.device_version);
        buf.extend_from_slice(&[
            self.manufacturer_index,
            self.product_index,
            self.serial_number_index,
            self.num_configurations,
        ]);
        buf
    }
}

/// Standard configuration descriptor (USB 2.0 §9.6.3)
///
/// Only the fixed 9-byte head; the nested interface, endpoint and class
/// descriptors that follow it are reached through the walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDescriptor {
    /// `wTotalLength`: size of this descriptor plus everything nested in it
    pub total_length: u16,
    pub num_interfaces: u8,
    /// `bConfigurationValue`, the argument to SET_CONFIGURATION
    pub configuration_value: u8,
    pub configuration_index: u8,
    /// `bmAttributes`
    pub attributes: u8,
    /// `bMaxPower` in 2 mA units
    pub max_power: u8,
}

impl ConfigDescriptor {
    pub const LENGTH: usize = 9;

    pub const ATTR_SELF_POWERED: u8 = 0x40;
    pub const ATTR_REMOTE_WAKEUP: u8 = 0x20;
    pub const ATTR_BATTERY_POWERED: u8 = 0x10;

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let b = check_record(bytes, DescriptorType::Configuration, Self::LENGTH)?;

        Ok(Self {
            total_length: LittleEndian::read_u16(&b[2..4]),
            num_interfaces: b[4],
            configuration_value: b[5],
            configuration_index: b[6],
            attributes: b[7],
            max_power: b[8],
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LENGTH);
        buf.push(Self::LENGTH as u8);
        buf.push(DescriptorType::Configuration.code());
        put_u16(&mut buf, self.total_length);
        buf.extend_from_slice(&[
            self.num_interfaces,
            self.configuration_value,
            self.configuration_index,
            self.attributes,
            self.max_power,
        ]);
        buf
    }

    pub fn self_powered(&self) -> bool {
        self.attributes & Self::ATTR_SELF_POWERED != 0
    }

    pub fn remote_wakeup(&self) -> bool {
        self.attributes & Self::ATTR_REMOTE_WAKEUP != 0
    }

    pub fn battery_powered(&self) -> bool {
        self.attributes & Self::ATTR_BATTERY_POWERED != 0
    }

    /// Maximum bus power draw in milliamps
    pub fn max_power_ma(&self) -> u16 {
        u16::from(self.max_power) * 2
    }
}

/// Standard interface descriptor (USB 2.0 §9.6.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    pub interface_number: u8,
    pub alternate_setting: u8,
    /// Endpoints following this interface, not counting endpoint 0
    pub num_endpoints: u8,
    pub class: u8,
    pub sub_class: u8,
    pub protocol: u8,
    pub interface_index: u8,
}

impl InterfaceDescriptor {
    pub const LENGTH: usize = 9;

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let b = check_record(bytes, DescriptorType::Interface, Self::LENGTH)?;

        Ok(Self {
            interface_number: b[2],
            alternate_setting: b[3],
            num_endpoints: b[4],
            class: b[5],
            sub_class: b[6],
            protocol: b[7],
            interface_index: b[8],
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![
            Self::LENGTH as u8,
            DescriptorType::Interface.code(),
            self.interface_number,
            self.alternate_setting,
            self.num_endpoints,
            self.class,
            self.sub_class,
            self.protocol,
            self.interface_index,
        ]
    }
}

/// Endpoint direction, from bit 7 of `bEndpointAddress`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Host to device
    Out,
    /// Device to host
    In,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Out => f.write_str("Out"),
            Direction::In => f.write_str("In"),
        }
    }
}

/// Endpoint transfer type, from bits 0..1 of `bmAttributes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

impl TransferType {
    pub fn from_attributes(attributes: u8) -> Self {
        match attributes & EndpointDescriptor::TRANSFER_TYPE_MASK {
            0 => TransferType::Control,
            1 => TransferType::Isochronous,
            2 => TransferType::Bulk,
            _ => TransferType::Interrupt,
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferType::Control => "Control",
            TransferType::Isochronous => "Isochronous",
            TransferType::Bulk => "Bulk",
            TransferType::Interrupt => "Interrupt",
        };
        f.write_str(name)
    }
}

/// Isochronous synchronization type, bits 2..3 of `bmAttributes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncType {
    NoSync,
    Asynchronous,
    Adaptive,
    Synchronous,
}

/// Isochronous usage type, bits 4..5 of `bmAttributes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageType {
    Data,
    Feedback,
    ImplicitFeedback,
    Reserved,
}

/// Standard endpoint descriptor (USB 2.0 §9.6.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// `bEndpointAddress`, direction bit included
    pub address: u8,
    /// `bmAttributes`
    pub attributes: u8,
    /// `wMaxPacketSize`, including the additional-transaction bits
    pub max_packet_size: u16,
    /// `bInterval`
    pub interval: u8,
    /// Trailing fields of the 9-byte audio class layout
    pub audio: Option<AudioEndpointFields>,
}

/// `bRefresh` and `bSynchAddress`, present only on audio class endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioEndpointFields {
    pub refresh: u8,
    pub synch_address: u8,
}

impl EndpointDescriptor {
    pub const LENGTH: usize = 7;
    pub const AUDIO_LENGTH: usize = 9;

    pub const DIRECTION_MASK: u8 = 0x80;
    pub const NUMBER_MASK: u8 = 0x0F;
    pub const TRANSFER_TYPE_MASK: u8 = 0x03;

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let b = check_record(bytes, DescriptorType::Endpoint, Self::LENGTH)?;

        let audio = match b.len() {
            Self::LENGTH => None,
            Self::AUDIO_LENGTH => Some(AudioEndpointFields {
                refresh: b[7],
                synch_address: b[8],
            }),
            other => {
                return Err(DescriptorError::malformed(
                    DescriptorType::Endpoint,
                    format!(
                        "bLength is {}, expected {} or {}",
                        other,
                        Self::LENGTH,
                        Self::AUDIO_LENGTH
                    ),
                ));
            }
        };

        Ok(Self {
            address: b[2],
            attributes: b[3],
            max_packet_size: LittleEndian::read_u16(&b[4..6]),
            interval: b[6],
            audio,
        })
    }

    /// Standard 7-byte endpoint
    pub fn new(address: u8, attributes: u8, max_packet_size: u16, interval: u8) -> Self {
        Self {
            address,
            attributes,
            max_packet_size,
            interval,
            audio: None,
        }
    }

    /// `bLength` of the encoded record
    pub fn length(&self) -> usize {
        if self.audio.is_some() {
            Self::AUDIO_LENGTH
        } else {
            Self::LENGTH
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.length());
        buf.push(self.length() as u8);
        buf.push(DescriptorType::Endpoint.code());
        buf.push(self.address);
        buf.push(self.attributes);
        put_u16(&mut buf, self.max_packet_size);
        buf.push(self.interval);
        if let Some(audio) = &self.audio {
            buf.push(audio.refresh);
            buf.push(audio.synch_address);
        }
        buf
    }

    pub fn direction(&self) -> Direction {
        if self.address & Self::DIRECTION_MASK != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    pub fn number(&self) -> u8 {
        self.address & Self::NUMBER_MASK
    }

    pub fn transfer_type(&self) -> TransferType {
        TransferType::from_attributes(self.attributes)
    }

    /// Synchronization type; only meaningful for isochronous endpoints
    pub fn sync_type(&self) -> SyncType {
        match (self.attributes >> 2) & 0x03 {
            0 => SyncType::NoSync,
            1 => SyncType::Asynchronous,
            2 => SyncType::Adaptive,
            _ => SyncType::Synchronous,
        }
    }

    /// Usage type; only meaningful for isochronous endpoints
    pub fn usage_type(&self) -> UsageType {
        match (self.attributes >> 4) & 0x03 {
            0 => UsageType::Data,
            1 => UsageType::Feedback,
            2 => UsageType::ImplicitFeedback,
            _ => UsageType::Reserved,
        }
    }

    /// Packet size in bytes (bits 0..10 of `wMaxPacketSize`)
    pub fn packet_size(&self) -> u16 {
        self.max_packet_size & 0x07FF
    }

    /// Transactions per microframe for high-speed periodic endpoints (1..=3)
    ///
    /// Bits 11..12 of `wMaxPacketSize` hold the number of additional
    /// transactions. The encoding `0b11` is reserved and yields `None`.
    pub fn transactions_per_microframe(&self) -> Option<u8> {
        match (self.max_packet_size >> 11) & 0x03 {
            0b11 => None,
            extra => Some(extra as u8 + 1),
        }
    }
}

/// One (type, length) pair trailing a HID descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HidClassDescriptor {
    /// `bDescriptorType` of the class descriptor, usually report (0x22)
    pub descriptor_type: u8,
    /// `wDescriptorLength`
    pub length: u16,
}

impl HidClassDescriptor {
    pub fn kind(&self) -> DescriptorType {
        DescriptorType::from(self.descriptor_type)
    }
}

/// HID class descriptor (HID 1.11 §6.2.1)
///
/// Carries one or two class descriptor pairs. The declared `bLength` is
/// cross-checked against `bNumDescriptors`: 9 bytes for one pair, 12 or 13
/// bytes for two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HidDescriptor {
    /// Declared `bLength`, kept so the record re-encodes to its original size
    pub length: u8,
    /// `bcdHID`
    pub hid_version: u16,
    pub country_code: u8,
    /// `bNumDescriptors`
    pub num_descriptors: u8,
    /// First class descriptor, always present
    pub report: HidClassDescriptor,
    /// Second class descriptor, present iff `num_descriptors > 1`
    pub optional: Option<HidClassDescriptor>,
}

impl HidDescriptor {
    pub const MIN_LENGTH: usize = 9;
    pub const MAX_CLASS_DESCRIPTORS: u8 = 2;

    /// Bytes needed for `num_descriptors` class descriptor pairs
    pub fn required_length(num_descriptors: u8) -> usize {
        6 + 3 * num_descriptors as usize
    }

    /// One pair needs exactly 9 bytes. Two pairs take 12 bytes, or 13 when
    /// the record is padded by a trailing byte.
    fn accepts_length(num_descriptors: u8, length: usize) -> bool {
        let required = Self::required_length(num_descriptors);
        match num_descriptors {
            1 => length == required,
            _ => length == required || length == required + 1,
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let b = check_record(bytes, DescriptorType::Hid, Self::MIN_LENGTH)?;

        let num_descriptors = b[5];
        if num_descriptors == 0 || num_descriptors > Self::MAX_CLASS_DESCRIPTORS {
            return Err(DescriptorError::malformed(
                DescriptorType::Hid,
                format!(
                    "bNumDescriptors is {}, expected 1 or {}",
                    num_descriptors,
                    Self::MAX_CLASS_DESCRIPTORS
                ),
            ));
        }

        if !Self::accepts_length(num_descriptors, b.len()) {
            return Err(DescriptorError::malformed(
                DescriptorType::Hid,
                format!(
                    "bLength {} does not match {} class descriptor(s)",
                    b.len(),
                    num_descriptors
                ),
            ));
        }

        let report = HidClassDescriptor {
            descriptor_type: b[6],
            length: LittleEndian::read_u16(&b[7..9]),
        };
        let optional = (num_descriptors > 1).then(|| HidClassDescriptor {
            descriptor_type: b[9],
            length: LittleEndian::read_u16(&b[10..12]),
        });

        Ok(Self {
            length: b[0],
            hid_version: LittleEndian::read_u16(&b[2..4]),
            country_code: b[4],
            num_descriptors,
            report,
            optional,
        })
    }

    /// Encode to `length` bytes; bytes past the last pair are zero.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.length as usize);
        buf.push(self.length);
        buf.push(DescriptorType::Hid.code());
        put_u16(&mut buf, self.hid_version);
        buf.push(self.country_code);
        buf.push(self.num_descriptors);
        for class in self.class_descriptors() {
            buf.push(class.descriptor_type);
            put_u16(&mut buf, class.length);
        }
        buf.resize((self.length as usize).max(buf.len()), 0);
        buf
    }

    /// All class descriptor pairs in wire order
    pub fn class_descriptors(&self) -> impl Iterator<Item = &HidClassDescriptor> {
        std::iter::once(&self.report).chain(self.optional.as_ref())
    }
}

/// Interface association descriptor (USB 2.0 ECN, IAD)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAssociationDescriptor {
    pub first_interface: u8,
    pub interface_count: u8,
    pub function_class: u8,
    pub function_sub_class: u8,
    pub function_protocol: u8,
    pub function_index: u8,
}

impl InterfaceAssociationDescriptor {
    pub const LENGTH: usize = 8;

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let b = check_record(bytes, DescriptorType::InterfaceAssociation, Self::LENGTH)?;

        if b[3] == 0 {
            return Err(DescriptorError::malformed(
                DescriptorType::InterfaceAssociation,
                "bInterfaceCount is 0",
            ));
        }

        Ok(Self {
            first_interface: b[2],
            interface_count: b[3],
            function_class: b[4],
            function_sub_class: b[5],
            function_protocol: b[6],
            function_index: b[7],
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![
            Self::LENGTH as u8,
            DescriptorType::InterfaceAssociation.code(),
            self.first_interface,
            self.interface_count,
            self.function_class,
            self.function_sub_class,
            self.function_protocol,
            self.function_index,
        ]
    }

    /// Whether `interface_number` falls in this association's range
    pub fn contains(&self, interface_number: u8) -> bool {
        let first = u16::from(self.first_interface);
        let number = u16::from(interface_number);
        number >= first && number < first + u16::from(self.interface_count)
    }
}
