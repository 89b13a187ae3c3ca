//! USB subsystem
//!
//! Device enumeration on top of a host-controller collaborator:
//! - [`HostController`]: the collaborator interface, with a libusb backend
//! - [`UsbHost`]: the enumeration dispatcher and its event pump
//! - [`DescriptorSink`]: where enumerated configurations go

pub mod backend;
pub mod enumerator;
pub mod pump;
pub mod rusb_host;
pub mod sink;

pub use backend::{
    ClientConfig, ClientEvent, ClientHandle, DeviceAddress, DeviceHandle, DeviceInfo, DeviceSpeed,
    HostController, HostEventFlags, InstallConfig,
};
pub use enumerator::{HostSettings, UsbHost};
pub use rusb_host::RusbHost;
pub use sink::{DescriptorSink, JsonSink, LoggingSink};
