// SPDX-License-Identifier: GPL-3.0-only

//! Fake kernel notification source for driving the event loop in tests.
//!
//! Each datagram on the socket pair is one JSON-encoded `DeviceEvent`, the
//! same one-message-per-read shape as the udev netlink socket. The filter is
//! applied on the sending side, the way the kernel socket filter does it.

#![allow(dead_code)]

use std::cell::Cell;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixDatagram;
use std::rc::Rc;

use devwatch_sys::DeviceSource;
use devwatch_types::properties::SYSPATH_KEY;
use devwatch_types::{DeviceAction, DeviceEvent, MonitorFilter, PropertyMap};

pub struct FakeKernel {
    tx: UnixDatagram,
    filter: MonitorFilter,
}

pub struct FakeSource {
    rx: UnixDatagram,
    buf: Vec<u8>,
    releases: Rc<Cell<usize>>,
}

pub fn fake_monitor(filter: MonitorFilter) -> (FakeKernel, FakeSource, Rc<Cell<usize>>) {
    let (tx, rx) = UnixDatagram::pair().expect("socket pair");
    rx.set_nonblocking(true).expect("non-blocking receiver");
    let releases = Rc::new(Cell::new(0));

    (
        FakeKernel { tx, filter },
        FakeSource {
            rx,
            buf: vec![0; 64 * 1024],
            releases: releases.clone(),
        },
        releases,
    )
}

impl FakeKernel {
    /// Queue a notification; returns whether it passed the filter
    pub fn inject(&self, event: &DeviceEvent) -> bool {
        if !self
            .filter
            .matches(event.subsystem.as_deref(), event.devtype.as_deref())
        {
            return false;
        }

        let payload = serde_json::to_vec(event).expect("encode event");
        self.tx.send(&payload).expect("queue event");
        true
    }
}

impl AsRawFd for FakeSource {
    fn as_raw_fd(&self) -> RawFd {
        self.rx.as_raw_fd()
    }
}

impl DeviceSource for FakeSource {
    fn receive(&mut self) -> io::Result<DeviceEvent> {
        let len = self.rx.recv(&mut self.buf)?;
        serde_json::from_slice(&self.buf[..len])
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.releases.set(self.releases.get() + 1);
    }
}

pub fn partition_event(action: &str, name: &str, extra: &[(&str, &str)]) -> DeviceEvent {
    device_event(action, name, "block", Some("partition"), extra)
}

pub fn device_event(
    action: &str,
    name: &str,
    subsystem: &str,
    devtype: Option<&str>,
    extra: &[(&str, &str)],
) -> DeviceEvent {
    let syspath = format!("/sys/devices/pci0000:00/usb1/1-1/block/{name}");
    let mut properties: PropertyMap = extra.iter().map(|(k, v)| (*k, Some(*v))).collect();
    properties.insert(SYSPATH_KEY, Some(syspath.clone()));

    DeviceEvent {
        action: DeviceAction::from(action),
        devnode: Some(format!("/dev/{name}")),
        syspath,
        subsystem: Some(subsystem.to_string()),
        devtype: devtype.map(str::to_string),
        properties,
    }
}
