//! USB descriptor parsing for usbh-enum
//!
//! This crate decodes the standard USB descriptors a host reads during
//! enumeration and walks the variable-length, type-tagged byte stream of a
//! configuration descriptor. It performs no I/O: buffers are borrowed from
//! whoever fetched them from the device.
//!
//! # Example
//!
//! ```
//! use descriptor::{Descriptor, RawConfiguration};
//!
//! let bytes = [
//!     0x09, 0x02, 0x19, 0x00, 0x01, 0x01, 0x00, 0x80, 0x32, // configuration
//!     0x09, 0x04, 0x00, 0x00, 0x01, 0x08, 0x06, 0x50, 0x00, // interface
//!     0x07, 0x05, 0x81, 0x02, 0x40, 0x00, 0x00, // endpoint 0x81
//! ];
//!
//! let raw = RawConfiguration::new(&bytes).unwrap();
//! let endpoints = raw
//!     .walk()
//!     .filter_map(|entry| match entry.unwrap().descriptor {
//!         Descriptor::Endpoint(ep) => Some(ep),
//!         _ => None,
//!     })
//!     .count();
//! assert_eq!(endpoints, 1);
//! ```
//!
//! # Grouped Configurations
//!
//! ```
//! use descriptor::RawConfiguration;
//!
//! let bytes = [
//!     0x09, 0x02, 0x19, 0x00, 0x01, 0x01, 0x00, 0x80, 0x32,
//!     0x09, 0x04, 0x00, 0x00, 0x01, 0x08, 0x06, 0x50, 0x00,
//!     0x07, 0x05, 0x81, 0x02, 0x40, 0x00, 0x00,
//! ];
//!
//! let config = RawConfiguration::new(&bytes).unwrap().parse().unwrap();
//! assert_eq!(config.interfaces[0].descriptor.class, 0x08);
//! assert_eq!(config.interfaces[0].endpoints.len(), 1);
//! ```

pub mod configuration;
pub mod dump;
pub mod error;
pub mod types;
pub mod walker;

pub use configuration::{Configuration, ConfigurationSummary, Interface, RawConfiguration};
pub use dump::{dump_configuration, format_bcd};
pub use error::{DescriptorError, Result};
pub use types::{
    AudioEndpointFields, ConfigDescriptor, DescriptorHeader, DescriptorType, DeviceDescriptor,
    Direction, EndpointDescriptor, HidClassDescriptor, HidDescriptor,
    InterfaceAssociationDescriptor, InterfaceDescriptor, SyncType, TransferType, UsageType,
};
pub use walker::{Descriptor, DescriptorWalker, WalkEntry};
