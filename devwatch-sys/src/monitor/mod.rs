// SPDX-License-Identifier: GPL-3.0-only

//! Hotplug monitoring
//!
//! A [`DeviceSource`] is a readiness-pollable socket that yields one
//! [`DeviceEvent`](devwatch_types::DeviceEvent) per receive. The
//! [`EventLoop`] owns every registered source in an arena and hands the
//! caller a [`MonitorToken`] for each subscription.
//!
//! Teardown of a subscription always runs in two steps: the descriptor is
//! removed from the reactor first, then the native monitor is released.

mod event_loop;
mod source;

pub use event_loop::{Delivery, EventLoop, MonitorToken};
pub use source::{DeviceSource, UdevSource};
