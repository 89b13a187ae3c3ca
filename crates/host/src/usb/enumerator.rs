//! Enumeration dispatcher
//!
//! [`UsbHost`] owns the host-controller collaborator, the registered client
//! and the descriptor sink. For every new-device event it opens the device,
//! fetches its descriptors and hands the active configuration to the sink.

use crate::error::EnumerationError;
use crate::usb::backend::{
    ClientConfig, ClientEvent, ClientHandle, DeviceAddress, DeviceHandle, HostController,
    InstallConfig,
};
use crate::usb::sink::DescriptorSink;
use descriptor::{DeviceDescriptor, RawConfiguration, format_bcd};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Settings applied by [`UsbHost::setup`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    pub install: InstallConfig,
    pub client: ClientConfig,
    /// Bounded wait for host-library events per pump
    pub host_event_timeout: Duration,
    /// Bounded wait for client events per pump
    pub client_event_timeout: Duration,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            install: InstallConfig::default(),
            client: ClientConfig::default(),
            host_event_timeout: Duration::from_millis(1),
            client_event_timeout: Duration::from_millis(1),
        }
    }
}

/// Enumeration context
///
/// Created by [`setup`](Self::setup) and driven by [`pump`](Self::pump).
pub struct UsbHost<H: HostController, S: DescriptorSink> {
    pub(super) host: H,
    pub(super) client: ClientHandle,
    pub(super) sink: S,
    /// Devices opened by this client, in arrival order
    pub(super) devices: Vec<DeviceHandle>,
    pub(super) host_event_timeout: Duration,
    pub(super) client_event_timeout: Duration,
    pub(super) all_clients_gone: bool,
    pub(super) all_devices_free: bool,
}

impl<H: HostController, S: DescriptorSink> UsbHost<H, S> {
    /// Install the host stack and register the enumeration client
    pub fn setup(mut host: H, settings: &HostSettings, sink: S) -> Result<Self, EnumerationError> {
        host.install(&settings.install)
            .map_err(EnumerationError::collaborator("install"))?;

        let client = match host.register_client(&settings.client) {
            Ok(client) => client,
            Err(e) => {
                if let Err(uninstall_err) = host.uninstall() {
                    warn!("Failed to uninstall host stack: {}", uninstall_err);
                }
                return Err(EnumerationError::Collaborator {
                    operation: "register_client",
                    source: e,
                });
            }
        };

        info!("Enumeration client {:?} registered", client);
        Ok(Self {
            host,
            client,
            sink,
            devices: Vec::new(),
            host_event_timeout: settings.host_event_timeout,
            client_event_timeout: settings.client_event_timeout,
            all_clients_gone: false,
            all_devices_free: false,
        })
    }

    /// Replace the sink, returning the previous one
    pub fn register_sink(&mut self, sink: S) -> S {
        std::mem::replace(&mut self.sink, sink)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn client(&self) -> ClientHandle {
        self.client
    }

    /// Devices currently held open, in arrival order
    pub fn open_devices(&self) -> &[DeviceHandle] {
        &self.devices
    }

    /// The host library has reported that no client is registered
    pub fn all_clients_gone(&self) -> bool {
        self.all_clients_gone
    }

    /// The host library has reported that every device is closed
    pub fn all_devices_free(&self) -> bool {
        self.all_devices_free
    }

    /// Dispatch one client event
    pub fn handle_event(&mut self, event: ClientEvent) -> Result<(), EnumerationError> {
        match event {
            ClientEvent::NewDevice { address } => {
                info!("New device at {}", address);
                self.enumerate(address)
            }
            ClientEvent::DeviceGone { device } => {
                info!("Device {:?} gone", device);
                self.release(device);
                Ok(())
            }
            ClientEvent::Unknown(code) => {
                debug!("Ignoring unknown client event {:#x}", code);
                Ok(())
            }
        }
    }

    fn enumerate(&mut self, address: DeviceAddress) -> Result<(), EnumerationError> {
        let device = self
            .host
            .open_device(self.client, address)
            .map_err(EnumerationError::collaborator("open_device"))?;

        if let Err(e) = self.deliver(device) {
            if let Err(close_err) = self.host.close_device(self.client, device) {
                warn!("Failed to close device {:?}: {}", device, close_err);
            }
            return Err(e);
        }

        self.devices.push(device);
        Ok(())
    }

    fn deliver(&mut self, device: DeviceHandle) -> Result<(), EnumerationError> {
        let info = self
            .host
            .device_info(device)
            .map_err(EnumerationError::collaborator("device_info"))?;
        info!(
            "{}: {}, bMaxPacketSize0 {}, bConfigurationValue {}",
            info.address, info.speed, info.max_packet_size0, info.configuration_value
        );

        let bytes = self
            .host
            .device_descriptor(device)
            .map_err(EnumerationError::collaborator("device_descriptor"))?;
        let descriptor = DeviceDescriptor::decode(bytes)?;
        info!(
            "{:04x}:{:04x} USB {} class 0x{:02x}",
            descriptor.vendor_id,
            descriptor.product_id,
            format_bcd(descriptor.usb_version),
            descriptor.class
        );
        debug!("Device descriptor:\n{}", descriptor);

        let bytes = self
            .host
            .active_config_descriptor(device)
            .map_err(EnumerationError::collaborator("active_config_descriptor"))?;
        let raw = RawConfiguration::new(bytes)?;

        self.sink.on_configuration(&raw);
        Ok(())
    }

    fn release(&mut self, device: DeviceHandle) {
        let Some(position) = self.devices.iter().position(|d| *d == device) else {
            debug!("Device {:?} was not opened by this client", device);
            return;
        };
        self.devices.remove(position);

        if let Err(e) = self.host.close_device(self.client, device) {
            warn!("Failed to close device {:?}: {}", device, e);
        }
    }

    /// Close every open device, deregister the client and uninstall the
    /// host stack. Returns the collaborator.
    pub fn shutdown(self) -> Result<H, EnumerationError> {
        let Self {
            mut host,
            client,
            devices,
            ..
        } = self;

        for device in devices {
            if let Err(e) = host.close_device(client, device) {
                warn!("Failed to close device {:?}: {}", device, e);
            }
        }

        host.deregister_client(client)
            .map_err(EnumerationError::collaborator("deregister_client"))?;
        host.uninstall()
            .map_err(EnumerationError::collaborator("uninstall"))?;

        info!("Enumeration client {:?} shut down", client);
        Ok(host)
    }
}
