// SPDX-License-Identifier: GPL-3.0-only

//! Canonical data models for devwatch
//!
//! These types are shared by the system layer and the CLI host:
//!
//! - **devwatch-sys**: builds these records from libudev handles
//! - **devwatch**: serializes them to JSON lines for consumers
//!
//! None of these types hold native references, so a record can be kept
//! for as long as the caller likes after it was emitted or returned.

pub mod device;
pub mod filter;
pub mod properties;

pub use device::{DeviceAction, DeviceEvent, DeviceRecord};
pub use filter::MonitorFilter;
pub use properties::PropertyMap;
