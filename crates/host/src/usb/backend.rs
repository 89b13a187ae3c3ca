//! Host-controller collaborator interface
//!
//! The enumeration core never talks to a USB stack directly. Everything it
//! needs from the host controller, from installing the stack to fetching a
//! device's descriptor bytes, goes through [`HostController`]. The libusb
//! implementation lives in [`rusb_host`](super::rusb_host); tests provide
//! their own.

use crate::error::HostError;
use serde::Serialize;
use std::fmt;
use std::ops::BitOr;
use std::time::Duration;

/// Registered client, issued by [`HostController::register_client`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ClientHandle(pub u32);

/// Opened device, issued by [`HostController::open_device`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceHandle(pub u32);

/// Where a device sits on the host: bus number and device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceAddress {
    pub bus: u8,
    pub address: u8,
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus {:03} device {:03}", self.bus, self.address)
    }
}

/// USB device speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceSpeed {
    Low,
    Full,
    High,
    Super,
    SuperPlus,
    Unknown,
}

impl fmt::Display for DeviceSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceSpeed::Low => "Low speed (1.5 Mbit/s)",
            DeviceSpeed::Full => "Full speed (12 Mbit/s)",
            DeviceSpeed::High => "High speed (480 Mbit/s)",
            DeviceSpeed::Super => "SuperSpeed (5 Gbit/s)",
            DeviceSpeed::SuperPlus => "SuperSpeed+ (10 Gbit/s)",
            DeviceSpeed::Unknown => "Unknown speed",
        };
        f.write_str(name)
    }
}

/// Summary of an opened device, as reported by the collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub address: DeviceAddress,
    pub speed: DeviceSpeed,
    /// `bMaxPacketSize0` of the default control pipe
    pub max_packet_size0: u8,
    /// `bConfigurationValue` of the active configuration
    pub configuration_value: u8,
}

/// Parameters for [`HostController::install`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallConfig {
    /// Enable verbose logging inside the host stack
    pub debug: bool,
}

/// Parameters for [`HostController::register_client`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Depth of the client's event queue
    pub max_num_event_msg: usize,
    /// Report devices already attached at registration as new devices
    pub enumerate_attached: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_num_event_msg: 5,
            enumerate_attached: true,
        }
    }
}

/// Host-library event flags returned by [`HostController::handle_host_events`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostEventFlags(u32);

impl HostEventFlags {
    pub const NONE: Self = Self(0);
    /// No client is registered any more
    pub const NO_CLIENTS: Self = Self(0x01);
    /// Every device has been closed by every client
    pub const ALL_FREE: Self = Self(0x02);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for HostEventFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Event delivered to a registered client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// A device was attached and is ready to be opened
    NewDevice { address: DeviceAddress },
    /// A device this client opened was detached
    DeviceGone { device: DeviceHandle },
    /// An event kind this crate does not interpret
    Unknown(u32),
}

/// USB host-controller driver as seen by the enumeration core
///
/// All calls happen on one thread. Descriptor bytes are cached by the
/// collaborator when the device is opened and stay valid until it is closed.
pub trait HostController {
    fn install(&mut self, config: &InstallConfig) -> Result<(), HostError>;

    fn uninstall(&mut self) -> Result<(), HostError>;

    fn register_client(&mut self, config: &ClientConfig) -> Result<ClientHandle, HostError>;

    fn deregister_client(&mut self, client: ClientHandle) -> Result<(), HostError>;

    fn open_device(
        &mut self,
        client: ClientHandle,
        address: DeviceAddress,
    ) -> Result<DeviceHandle, HostError>;

    fn close_device(&mut self, client: ClientHandle, device: DeviceHandle)
    -> Result<(), HostError>;

    fn device_info(&self, device: DeviceHandle) -> Result<DeviceInfo, HostError>;

    /// Raw 18-byte device descriptor
    fn device_descriptor(&self, device: DeviceHandle) -> Result<&[u8], HostError>;

    /// Raw descriptor set of the active configuration, `wTotalLength` bytes
    fn active_config_descriptor(&self, device: DeviceHandle) -> Result<&[u8], HostError>;

    /// Process host-library events, waiting at most `timeout`
    fn handle_host_events(&mut self, timeout: Duration) -> Result<HostEventFlags, HostError>;

    /// Collect the events pending for `client`, waiting at most `timeout`
    fn handle_client_events(
        &mut self,
        client: ClientHandle,
        timeout: Duration,
    ) -> Result<Vec<ClientEvent>, HostError>;
}
