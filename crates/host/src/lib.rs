//! USB host enumeration for usbh-enum
//!
//! Watches a USB host controller for attached devices, fetches each new
//! device's descriptors and hands the active configuration descriptor to a
//! [`DescriptorSink`](usb::DescriptorSink).
//!
//! # Example
//!
//! ```no_run
//! use host::usb::{HostSettings, LoggingSink, RusbHost, UsbHost};
//!
//! # fn main() -> Result<(), host::error::EnumerationError> {
//! let mut usb = UsbHost::setup(RusbHost::new(), &HostSettings::default(), LoggingSink)?;
//! loop {
//!     usb.pump();
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! # }
//! ```

pub mod config;
pub mod error;
pub mod usb;

pub use error::{EnumerationError, HostError};
