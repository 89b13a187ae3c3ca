//! Host event pump
//!
//! The application calls [`UsbHost::pump`] periodically from its own loop.
//! Each call performs two bounded waits and returns.

use crate::usb::backend::{HostController, HostEventFlags};
use crate::usb::enumerator::UsbHost;
use crate::usb::sink::DescriptorSink;
use tracing::{info, warn};

impl<H: HostController, S: DescriptorSink> UsbHost<H, S> {
    /// Process pending host-library events, then dispatch pending client
    /// events. Returns the number of client events dispatched.
    ///
    /// Timeouts are silent. Other failures are logged and the pump keeps
    /// going on the next call.
    pub fn pump(&mut self) -> usize {
        match self.host.handle_host_events(self.host_event_timeout) {
            Ok(flags) => self.latch(flags),
            Err(e) if e.is_timeout() => {}
            Err(e) => warn!("Host event handling failed: {}", e),
        }

        let events = match self
            .host
            .handle_client_events(self.client, self.client_event_timeout)
        {
            Ok(events) => events,
            Err(e) if e.is_timeout() => return 0,
            Err(e) => {
                warn!("Client event handling failed: {}", e);
                return 0;
            }
        };

        let count = events.len();
        for event in events {
            if let Err(e) = self.handle_event(event) {
                warn!("Enumeration failed: {}", e);
            }
        }
        count
    }

    fn latch(&mut self, flags: HostEventFlags) {
        if flags.contains(HostEventFlags::NO_CLIENTS) && !self.all_clients_gone {
            info!("No clients registered with the host stack");
            self.all_clients_gone = true;
        }
        if flags.contains(HostEventFlags::ALL_FREE) && !self.all_devices_free {
            info!("All devices freed");
            self.all_devices_free = true;
        }
    }
}
