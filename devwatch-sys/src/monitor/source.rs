// SPDX-License-Identifier: GPL-3.0-only

use std::io;
use std::marker::PhantomData;
use std::os::fd::{AsRawFd, RawFd};

use devwatch_types::properties::SYSPATH_KEY;
use devwatch_types::{DeviceAction, DeviceEvent, MonitorFilter};
use tracing::debug;

use crate::context::SubsystemContext;
use crate::error::MonitorOpenError;
use crate::properties::extract_device;

/// A socket that delivers device change notifications
pub trait DeviceSource: AsRawFd {
    /// Receive exactly one pending notification without blocking.
    ///
    /// Returns `WouldBlock` when nothing is queued. `Interrupted` means a
    /// message was consumed and discarded but more data is waiting.
    fn receive(&mut self) -> io::Result<DeviceEvent>;
}

/// Netlink monitor on the udev event group
///
/// Borrows the [`SubsystemContext`] it was opened from, so the context
/// cannot be closed while the source exists.
pub struct UdevSource<'ctx> {
    socket: udev::MonitorSocket,
    _context: PhantomData<&'ctx SubsystemContext>,
}

impl<'ctx> UdevSource<'ctx> {
    /// Open a monitor restricted to `filter`.
    ///
    /// The filter is installed on the socket, so the kernel drops
    /// non-matching events before they reach us. If any step fails the
    /// partially built monitor is released before the error is returned.
    pub fn open(
        context: &'ctx SubsystemContext,
        filter: &MonitorFilter,
    ) -> Result<Self, MonitorOpenError> {
        let builder = udev::MonitorBuilder::with_udev(context.udev().clone())
            .map_err(MonitorOpenError::Create)?;

        let builder = match &filter.devtype {
            Some(devtype) => builder.match_subsystem_devtype(&filter.subsystem, devtype),
            None => builder.match_subsystem(&filter.subsystem),
        }
        .map_err(|source| MonitorOpenError::Filter {
            subsystem: filter.subsystem.clone(),
            devtype: filter.devtype.clone(),
            source,
        })?;

        let socket = builder.listen().map_err(MonitorOpenError::Listen)?;
        set_nonblocking(socket.as_raw_fd()).map_err(MonitorOpenError::Listen)?;

        debug!(
            fd = socket.as_raw_fd(),
            subsystem = %filter.subsystem,
            devtype = filter.devtype.as_deref().unwrap_or("*"),
            "netlink monitor listening"
        );

        Ok(Self {
            socket,
            _context: PhantomData,
        })
    }
}

impl AsRawFd for UdevSource<'_> {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

impl DeviceSource for UdevSource<'_> {
    fn receive(&mut self) -> io::Result<DeviceEvent> {
        match self.socket.iter().next() {
            // The per-event udev_device is released when `event` drops at the
            // end of this arm, before the record reaches any sink.
            Some(event) => Ok(event_from_device(&event)),
            None if has_pending_data(self.socket.as_raw_fd())? => {
                Err(io::Error::from(io::ErrorKind::Interrupted))
            }
            None => Err(io::Error::from(io::ErrorKind::WouldBlock)),
        }
    }
}

/// Copy everything we report about a device out of the native handle
pub(crate) fn event_from_device(device: &udev::Device) -> DeviceEvent {
    let syspath = device.syspath().to_string_lossy().into_owned();
    let mut properties = extract_device(device);
    properties.insert(SYSPATH_KEY, Some(syspath.clone()));

    DeviceEvent {
        action: device
            .property_value("ACTION")
            .map(|action| DeviceAction::from(action.to_string_lossy().as_ref()))
            .unwrap_or_else(|| DeviceAction::Other("unknown".to_string())),
        devnode: device
            .devnode()
            .map(|node| node.to_string_lossy().into_owned()),
        syspath,
        subsystem: device
            .subsystem()
            .map(|subsystem| subsystem.to_string_lossy().into_owned()),
        devtype: device
            .devtype()
            .map(|devtype| devtype.to_string_lossy().into_owned()),
        properties,
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    if flags & libc::O_NONBLOCK == 0
        && unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0
    {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// libudev returns NULL both for "nothing queued" and for messages it
/// rejects after reading them. Peek at the socket to tell the two apart.
fn has_pending_data(fd: RawFd) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    match unsafe { libc::poll(&mut pollfd, 1, 0) } {
        n if n < 0 => {
            let error = io::Error::last_os_error();
            if error.kind() == io::ErrorKind::Interrupted {
                Ok(true)
            } else {
                Err(error)
            }
        }
        0 => Ok(false),
        _ => Ok(pollfd.revents & libc::POLLIN != 0),
    }
}
