// SPDX-License-Identifier: GPL-3.0-only

//! Point-in-time enumeration of udev devices

use std::io;
use std::path::Path;

use devwatch_types::{DeviceRecord, PropertyMap};
use libudev_sys as ffi;
use tracing::{debug, warn};
use udev::AsRawWithContext;

use crate::context::SubsystemContext;
use crate::error::EnumerationError;
use crate::properties::{ListEntries, extract_device};

/// Source of device syspaths and their properties
pub trait DeviceCatalog {
    /// Scan the devices present right now and return their syspaths in
    /// cursor order
    fn scan(&self) -> Result<Vec<String>, EnumerationError>;

    /// Open one device by syspath and read its properties
    fn open(&self, syspath: &str) -> io::Result<PropertyMap>;
}

/// Walk every device the catalog reports and collect its properties.
///
/// Each call performs a fresh scan. A device that disappears between the
/// scan and the open is skipped; only a cursor that cannot be created is
/// an error.
pub fn list_devices<C: DeviceCatalog + ?Sized>(
    catalog: &C,
) -> Result<Vec<DeviceRecord>, EnumerationError> {
    let syspaths = catalog.scan()?;
    let mut records = Vec::with_capacity(syspaths.len());

    for syspath in syspaths {
        match catalog.open(&syspath) {
            Ok(properties) => records.push(DeviceRecord::new(syspath, properties)),
            Err(error) => debug!(%syspath, %error, "device vanished during enumeration, skipping"),
        }
    }

    debug!(devices = records.len(), "enumeration finished");
    Ok(records)
}

/// libudev-backed catalog
pub struct UdevCatalog<'ctx> {
    context: &'ctx SubsystemContext,
    subsystem: Option<String>,
}

impl<'ctx> UdevCatalog<'ctx> {
    /// Catalog over all devices
    pub fn new(context: &'ctx SubsystemContext) -> Self {
        Self {
            context,
            subsystem: None,
        }
    }

    /// Restrict the scan to one subsystem
    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }
}

impl DeviceCatalog for UdevCatalog<'_> {
    fn scan(&self) -> Result<Vec<String>, EnumerationError> {
        let mut enumerator = udev::Enumerator::with_udev(self.context.udev().clone())
            .map_err(EnumerationError::Cursor)?;

        if let Some(subsystem) = &self.subsystem {
            enumerator
                .match_subsystem(subsystem)
                .map_err(|source| EnumerationError::Match {
                    subsystem: subsystem.clone(),
                    source,
                })?;
        }

        // SAFETY: the enumerator is alive for the whole block and the list
        // is copied into owned strings before it is dropped.
        let (status, syspaths) = unsafe {
            let status = ffi::udev_enumerate_scan_devices(enumerator.as_raw());
            let head = ffi::udev_enumerate_get_list_entry(enumerator.as_raw());
            let syspaths = ListEntries::new(head)
                .map(|(name, _)| name.to_string_lossy().into_owned())
                .collect::<Vec<_>>();
            (status, syspaths)
        };

        Ok(accept_scan(self.subsystem.as_deref(), status, syspaths))
    }

    fn open(&self, syspath: &str) -> io::Result<PropertyMap> {
        let device =
            udev::Device::from_syspath_with_context(self.context.udev().clone(), Path::new(syspath))?;
        Ok(extract_device(&device))
    }
}

/// libudev reports a negative status when part of sysfs could not be read
/// (an unreadable class directory, a device that failed to open), yet the
/// list still holds everything it did find. Keep those devices.
fn accept_scan(subsystem: Option<&str>, status: i32, syspaths: Vec<String>) -> Vec<String> {
    let subsystem = subsystem.unwrap_or("*");

    if status < 0 {
        let error = io::Error::from_raw_os_error(-status);
        warn!(subsystem, %error, found = syspaths.len(), "device scan was incomplete");
    }

    debug!(subsystem, candidates = syspaths.len(), "device scan complete");
    syspaths
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::BTreeSet;

    use super::*;

    struct FakeCatalog {
        devices: Vec<(&'static str, Option<PropertyMap>)>,
        scans: Cell<usize>,
        fail_scan: bool,
    }

    impl FakeCatalog {
        fn new(devices: Vec<(&'static str, Option<PropertyMap>)>) -> Self {
            Self {
                devices,
                scans: Cell::new(0),
                fail_scan: false,
            }
        }
    }

    impl DeviceCatalog for FakeCatalog {
        fn scan(&self) -> Result<Vec<String>, EnumerationError> {
            if self.fail_scan {
                return Err(EnumerationError::Cursor(io::Error::from(
                    io::ErrorKind::OutOfMemory,
                )));
            }
            self.scans.set(self.scans.get() + 1);
            Ok(self.devices.iter().map(|(path, _)| path.to_string()).collect())
        }

        fn open(&self, syspath: &str) -> io::Result<PropertyMap> {
            self.devices
                .iter()
                .find(|(path, _)| *path == syspath)
                .and_then(|(_, properties)| properties.clone())
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }
    }

    fn props(pairs: &[(&str, &str)]) -> PropertyMap {
        pairs.iter().map(|(k, v)| (*k, Some(*v))).collect()
    }

    #[test]
    fn vanished_devices_are_skipped() {
        let catalog = FakeCatalog::new(vec![
            ("/sys/devices/a", Some(props(&[("SUBSYSTEM", "block")]))),
            ("/sys/devices/gone", None),
            ("/sys/devices/b", Some(props(&[("SUBSYSTEM", "usb")]))),
        ]);

        let records = list_devices(&catalog).expect("enumeration should succeed");
        let syspaths: Vec<_> = records.iter().map(|r| r.syspath.as_str()).collect();
        assert_eq!(syspaths, vec!["/sys/devices/a", "/sys/devices/b"]);
    }

    #[test]
    fn records_carry_syspath_property() {
        let catalog = FakeCatalog::new(vec![(
            "/sys/devices/a",
            Some(props(&[("DEVNAME", "/dev/sda")])),
        )]);

        let records = list_devices(&catalog).expect("enumeration should succeed");
        assert_eq!(records[0].properties.value("syspath"), Some("/sys/devices/a"));
        assert_eq!(records[0].properties.value("DEVNAME"), Some("/dev/sda"));
    }

    #[test]
    fn scan_failure_is_an_error() {
        let mut catalog = FakeCatalog::new(Vec::new());
        catalog.fail_scan = true;
        assert!(matches!(list_devices(&catalog), Err(EnumerationError::Cursor(_))));
    }

    #[test]
    fn incomplete_scan_keeps_what_it_found() {
        let found = vec!["/sys/devices/a".to_string(), "/sys/devices/b".to_string()];
        let kept = accept_scan(Some("block"), -libc::EACCES, found.clone());
        assert_eq!(kept, found);

        assert_eq!(accept_scan(None, 0, found.clone()), found);
    }

    #[test]
    fn every_call_rescans() {
        let catalog = FakeCatalog::new(vec![
            ("/sys/devices/a", Some(PropertyMap::new())),
            ("/sys/devices/b", Some(PropertyMap::new())),
        ]);

        let first: BTreeSet<_> = list_devices(&catalog)
            .expect("first scan")
            .into_iter()
            .map(|r| r.syspath)
            .collect();
        let second: BTreeSet<_> = list_devices(&catalog)
            .expect("second scan")
            .into_iter()
            .map(|r| r.syspath)
            .collect();

        assert_eq!(first, second);
        assert_eq!(catalog.scans.get(), 2);
    }

    #[test]
    fn live_enumeration_is_stable() {
        if !Path::new("/run/udev").exists() {
            return;
        }
        let Ok(context) = SubsystemContext::open() else {
            return;
        };
        let catalog = UdevCatalog::new(&context);

        let first: BTreeSet<_> = list_devices(&catalog)
            .expect("first scan")
            .into_iter()
            .map(|r| r.syspath)
            .collect();
        let second: BTreeSet<_> = list_devices(&catalog)
            .expect("second scan")
            .into_iter()
            .map(|r| r.syspath)
            .collect();

        // Devices may come and go between scans on a live system, but the
        // bulk of the tree is static.
        assert!(first.intersection(&second).count() * 10 >= first.len() * 9);
    }
}
