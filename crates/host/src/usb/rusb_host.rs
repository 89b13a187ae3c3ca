//! libusb-backed host controller
//!
//! Implements [`HostController`] on top of `rusb`. Hot-plug notices are
//! raised by libusb from inside `handle_events`, forwarded through a bounded
//! channel, and turned into [`ClientEvent`]s when the client polls. Descriptor
//! bytes are read with standard GET_DESCRIPTOR requests when a device is
//! opened and cached until it is closed.

use crate::error::HostError;
use crate::usb::backend::{
    ClientConfig, ClientEvent, ClientHandle, DeviceAddress, DeviceHandle, DeviceInfo, DeviceSpeed,
    HostController, HostEventFlags, InstallConfig,
};
use async_channel::{Receiver, Sender, TrySendError};
use descriptor::{ConfigDescriptor, DescriptorType, DeviceDescriptor};
use rusb::{Context, Device, Hotplug, HotplugBuilder, Registration, UsbContext};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Standard request code for GET_DESCRIPTOR (USB 2.0 §9.4)
const GET_DESCRIPTOR: u8 = 0x06;

/// Timeout for each descriptor read on the default control pipe
const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);

/// Root hubs (Linux Foundation, hub class) are never reported
const ROOT_HUB_VENDOR_ID: u16 = 0x1d6b;
const HUB_CLASS: u8 = 0x09;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HotplugNotice {
    Arrived(DeviceAddress),
    Left(DeviceAddress),
}

struct Client {
    handle: ClientHandle,
    notices: Receiver<HotplugNotice>,
    _registration: Registration<Context>,
}

struct OpenDevice {
    client: ClientHandle,
    info: DeviceInfo,
    device_descriptor: Vec<u8>,
    config_descriptor: Vec<u8>,
    _handle: rusb::DeviceHandle<Context>,
}

/// Host controller backed by the system libusb
///
/// Supports a single registered client.
pub struct RusbHost {
    context: Option<Context>,
    client: Option<Client>,
    devices: HashMap<DeviceHandle, OpenDevice>,
    next_client_id: u32,
    next_handle_id: u32,
}

impl RusbHost {
    pub fn new() -> Self {
        Self {
            context: None,
            client: None,
            devices: HashMap::new(),
            next_client_id: 1,
            next_handle_id: 1,
        }
    }

    fn context(&self) -> Result<&Context, HostError> {
        self.context.as_ref().ok_or(HostError::NotInstalled)
    }

    fn check_client(&self, client: ClientHandle) -> Result<(), HostError> {
        match &self.client {
            Some(registered) if registered.handle == client => Ok(()),
            _ => Err(HostError::UnknownClient),
        }
    }

    fn open_device_inner(
        &self,
        client: ClientHandle,
        address: DeviceAddress,
    ) -> Result<OpenDevice, HostError> {
        let context = self.context()?;
        let device = context
            .devices()?
            .iter()
            .find(|d| d.bus_number() == address.bus && d.address() == address.address)
            .ok_or(HostError::NotFound)?;

        let handle = device.open()?;
        debug!("Opened device at {}", address);

        let device_descriptor = read_descriptor(
            &handle,
            DescriptorType::Device,
            0,
            DeviceDescriptor::LENGTH as u16,
        )?;

        let active = handle.active_configuration()?;
        let index = config_index(&device, active)?;
        let config_descriptor = read_config_descriptor(&handle, index)?;

        let info = DeviceInfo {
            address,
            speed: map_device_speed(device.speed()),
            max_packet_size0: device.device_descriptor()?.max_packet_size(),
            configuration_value: active,
        };

        Ok(OpenDevice {
            client,
            info,
            device_descriptor,
            config_descriptor,
            _handle: handle,
        })
    }

    fn open_device_entry(&self, device: DeviceHandle) -> Result<&OpenDevice, HostError> {
        self.devices.get(&device).ok_or(HostError::UnknownDevice)
    }

    fn handle_for(&self, client: ClientHandle, address: DeviceAddress) -> Option<DeviceHandle> {
        self.devices
            .iter()
            .find(|(_, open)| open.client == client && open.info.address == address)
            .map(|(handle, _)| *handle)
    }
}

impl Default for RusbHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostController for RusbHost {
    fn install(&mut self, config: &InstallConfig) -> Result<(), HostError> {
        if self.context.is_some() {
            return Err(HostError::Busy);
        }
        if !rusb::has_hotplug() {
            warn!("libusb on this platform has no hot-plug support");
            return Err(HostError::NotSupported);
        }

        let mut context = Context::new()?;
        if config.debug {
            context.set_log_level(rusb::LogLevel::Debug);
        }

        let version = rusb::version();
        info!(
            "Installed libusb {}.{}.{} host stack",
            version.major(),
            version.minor(),
            version.micro()
        );
        self.context = Some(context);
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), HostError> {
        self.context()?;
        if self.client.is_some() {
            return Err(HostError::Busy);
        }

        self.context = None;
        info!("Uninstalled host stack");
        Ok(())
    }

    fn register_client(&mut self, config: &ClientConfig) -> Result<ClientHandle, HostError> {
        let context = self.context()?.clone();
        if self.client.is_some() {
            return Err(HostError::Busy);
        }
        if config.max_num_event_msg == 0 {
            return Err(HostError::InvalidParam);
        }

        let (sender, notices) = async_channel::bounded(config.max_num_event_msg);
        let registration = HotplugBuilder::new()
            .enumerate(config.enumerate_attached)
            .register(&context, Box::new(HotplugForwarder { sender }))?;

        let handle = ClientHandle(self.next_client_id);
        self.next_client_id += 1;
        self.client = Some(Client {
            handle,
            notices,
            _registration: registration,
        });

        debug!("Registered client {:?}", handle);
        Ok(handle)
    }

    fn deregister_client(&mut self, client: ClientHandle) -> Result<(), HostError> {
        self.check_client(client)?;
        if self.devices.values().any(|open| open.client == client) {
            return Err(HostError::Busy);
        }

        self.client = None;
        debug!("Deregistered client {:?}", client);
        Ok(())
    }

    fn open_device(
        &mut self,
        client: ClientHandle,
        address: DeviceAddress,
    ) -> Result<DeviceHandle, HostError> {
        self.check_client(client)?;
        if self.handle_for(client, address).is_some() {
            return Err(HostError::Busy);
        }

        let open = self.open_device_inner(client, address)?;

        let handle = DeviceHandle(self.next_handle_id);
        self.next_handle_id += 1;
        self.devices.insert(handle, open);
        Ok(handle)
    }

    fn close_device(&mut self, client: ClientHandle, device: DeviceHandle) -> Result<(), HostError> {
        self.check_client(client)?;
        match self.devices.get(&device) {
            Some(open) if open.client == client => {}
            _ => return Err(HostError::UnknownDevice),
        }

        if let Some(open) = self.devices.remove(&device) {
            debug!("Closed device at {}", open.info.address);
        }
        Ok(())
    }

    fn device_info(&self, device: DeviceHandle) -> Result<DeviceInfo, HostError> {
        Ok(self.open_device_entry(device)?.info)
    }

    fn device_descriptor(&self, device: DeviceHandle) -> Result<&[u8], HostError> {
        Ok(&self.open_device_entry(device)?.device_descriptor)
    }

    fn active_config_descriptor(&self, device: DeviceHandle) -> Result<&[u8], HostError> {
        Ok(&self.open_device_entry(device)?.config_descriptor)
    }

    fn handle_host_events(&mut self, timeout: Duration) -> Result<HostEventFlags, HostError> {
        self.context()?.handle_events(Some(timeout))?;

        let mut flags = HostEventFlags::NONE;
        if self.client.is_none() {
            flags = flags | HostEventFlags::NO_CLIENTS;
        }
        if self.devices.is_empty() {
            flags = flags | HostEventFlags::ALL_FREE;
        }
        Ok(flags)
    }

    // Notices are only produced by handle_host_events on this thread, so
    // there is nothing to wait for here.
    fn handle_client_events(
        &mut self,
        client: ClientHandle,
        _timeout: Duration,
    ) -> Result<Vec<ClientEvent>, HostError> {
        self.check_client(client)?;

        let mut notices = Vec::new();
        if let Some(registered) = &self.client {
            while let Ok(notice) = registered.notices.try_recv() {
                notices.push(notice);
            }
        }

        let events = notices
            .into_iter()
            .filter_map(|notice| match notice {
                HotplugNotice::Arrived(address) => Some(ClientEvent::NewDevice { address }),
                HotplugNotice::Left(address) => match self.handle_for(client, address) {
                    Some(device) => Some(ClientEvent::DeviceGone { device }),
                    None => {
                        debug!("Device at {} left without being opened", address);
                        None
                    }
                },
            })
            .collect();
        Ok(events)
    }
}

/// Hot-plug callback
///
/// Runs inside libusb event handling, so it only forwards notices.
struct HotplugForwarder {
    sender: Sender<HotplugNotice>,
}

impl HotplugForwarder {
    fn forward(&self, notice: HotplugNotice) {
        match self.sender.try_send(notice) {
            Ok(()) => trace!("Queued hot-plug notice {:?}", notice),
            Err(TrySendError::Full(notice)) => {
                warn!("Client event queue full, dropping {:?}", notice)
            }
            Err(TrySendError::Closed(_)) => debug!("Client gone, dropping hot-plug notice"),
        }
    }
}

impl Hotplug<Context> for HotplugForwarder {
    fn device_arrived(&mut self, device: Device<Context>) {
        if is_root_hub(&device) {
            trace!(
                "Skipping root hub: bus={}, addr={}",
                device.bus_number(),
                device.address()
            );
            return;
        }
        self.forward(HotplugNotice::Arrived(address_of(&device)));
    }

    fn device_left(&mut self, device: Device<Context>) {
        self.forward(HotplugNotice::Left(address_of(&device)));
    }
}

fn address_of<T: UsbContext>(device: &Device<T>) -> DeviceAddress {
    DeviceAddress {
        bus: device.bus_number(),
        address: device.address(),
    }
}

fn is_root_hub<T: UsbContext>(device: &Device<T>) -> bool {
    device
        .device_descriptor()
        .map(|d| d.vendor_id() == ROOT_HUB_VENDOR_ID && d.class_code() == HUB_CLASS)
        .unwrap_or(false)
}

/// Index of the configuration whose `bConfigurationValue` is `value`
fn config_index<T: UsbContext>(device: &Device<T>, value: u8) -> Result<u8, HostError> {
    let count = device.device_descriptor()?.num_configurations();
    for index in 0..count {
        if device.config_descriptor(index)?.number() == value {
            return Ok(index);
        }
    }
    warn!("No configuration descriptor with bConfigurationValue {}", value);
    Err(HostError::NotFound)
}

/// Issue GET_DESCRIPTOR on the default control pipe
fn read_descriptor<T: UsbContext>(
    handle: &rusb::DeviceHandle<T>,
    kind: DescriptorType,
    index: u8,
    length: u16,
) -> Result<Vec<u8>, HostError> {
    let request_type = rusb::request_type(
        rusb::Direction::In,
        rusb::RequestType::Standard,
        rusb::Recipient::Device,
    );
    let value = (u16::from(kind.code()) << 8) | u16::from(index);

    let mut buf = vec![0u8; length as usize];
    let read = handle.read_control(request_type, GET_DESCRIPTOR, value, 0, &mut buf, CONTROL_TIMEOUT)?;
    buf.truncate(read);
    Ok(buf)
}

/// Read the 9-byte head for `wTotalLength`, then the whole descriptor set
fn read_config_descriptor<T: UsbContext>(
    handle: &rusb::DeviceHandle<T>,
    index: u8,
) -> Result<Vec<u8>, HostError> {
    let head = read_descriptor(
        handle,
        DescriptorType::Configuration,
        index,
        ConfigDescriptor::LENGTH as u16,
    )?;
    let total_length = ConfigDescriptor::decode(&head)
        .map_err(|e| HostError::Other(format!("Bad configuration header: {}", e)))?
        .total_length;

    read_descriptor(handle, DescriptorType::Configuration, index, total_length)
}

/// Map rusb device speed to DeviceSpeed
fn map_device_speed(speed: rusb::Speed) -> DeviceSpeed {
    match speed {
        rusb::Speed::Low => DeviceSpeed::Low,
        rusb::Speed::Full => DeviceSpeed::Full,
        rusb::Speed::High => DeviceSpeed::High,
        rusb::Speed::Super => DeviceSpeed::Super,
        rusb::Speed::SuperPlus => DeviceSpeed::SuperPlus,
        _ => DeviceSpeed::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_device_speed() {
        assert_eq!(map_device_speed(rusb::Speed::Low), DeviceSpeed::Low);
        assert_eq!(map_device_speed(rusb::Speed::Full), DeviceSpeed::Full);
        assert_eq!(map_device_speed(rusb::Speed::High), DeviceSpeed::High);
        assert_eq!(map_device_speed(rusb::Speed::Super), DeviceSpeed::Super);
        assert_eq!(
            map_device_speed(rusb::Speed::SuperPlus),
            DeviceSpeed::SuperPlus
        );
        assert_eq!(map_device_speed(rusb::Speed::Unknown), DeviceSpeed::Unknown);
    }

    #[test]
    fn test_forwarder_drops_when_full() {
        let (sender, receiver) = async_channel::bounded(1);
        let forwarder = HotplugForwarder { sender };
        let first = DeviceAddress { bus: 1, address: 2 };
        let second = DeviceAddress { bus: 1, address: 3 };

        forwarder.forward(HotplugNotice::Arrived(first));
        forwarder.forward(HotplugNotice::Arrived(second));

        assert_eq!(receiver.try_recv().unwrap(), HotplugNotice::Arrived(first));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_forwarder_after_client_gone() {
        let (sender, receiver) = async_channel::bounded(1);
        drop(receiver);
        let forwarder = HotplugForwarder { sender };
        forwarder.forward(HotplugNotice::Left(DeviceAddress { bus: 1, address: 2 }));
    }

    #[test]
    fn test_calls_before_install() {
        let mut host = RusbHost::new();

        assert_eq!(
            host.register_client(&ClientConfig::default()),
            Err(HostError::NotInstalled)
        );
        assert_eq!(
            host.handle_host_events(Duration::from_millis(1)),
            Err(HostError::NotInstalled)
        );
        assert_eq!(host.uninstall(), Err(HostError::NotInstalled));
    }

    #[test]
    fn test_unknown_handles() {
        let mut host = RusbHost::new();

        assert_eq!(
            host.device_descriptor(DeviceHandle(7)),
            Err(HostError::UnknownDevice)
        );
        assert_eq!(
            host.active_config_descriptor(DeviceHandle(7)),
            Err(HostError::UnknownDevice)
        );
        assert_eq!(
            host.handle_client_events(ClientHandle(1), Duration::ZERO),
            Err(HostError::UnknownClient)
        );
        assert_eq!(
            host.deregister_client(ClientHandle(1)),
            Err(HostError::UnknownClient)
        );
    }
}
