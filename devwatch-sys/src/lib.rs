// SPDX-License-Identifier: GPL-3.0-only

//! Low-level device subsystem access for devwatch
//!
//! This crate talks to libudev and the kernel directly:
//! - Opening the process-wide libudev context
//! - Enumerating present devices with their properties
//! - Watching the udev netlink socket for hotplug notifications
//! - Resolving the mount point of a device node from the mount table
//!
//! Everything here is single-threaded. libudev handles are not `Send`, and
//! the monitor event loop runs on a `current_thread` tokio runtime.

pub mod context;
pub mod enumerate;
pub mod error;
pub mod monitor;
pub mod mounts;
pub mod properties;

pub use context::SubsystemContext;
pub use enumerate::{DeviceCatalog, UdevCatalog, list_devices};
pub use error::{
    EnumerationError, EventLoopError, InitError, MonitorError, MonitorOpenError, MountError,
    SinkError,
};
pub use monitor::{Delivery, DeviceSource, EventLoop, MonitorToken, UdevSource};
pub use mounts::{MountEntry, MountTable, MountWait};
pub use properties::{extract, extract_device};
