// SPDX-License-Identifier: GPL-3.0-only

//! Conversion of udev property lists into `PropertyMap`

use std::ffi::{CStr, OsStr, c_char};
use std::marker::PhantomData;
use std::os::unix::ffi::OsStrExt;

use devwatch_types::PropertyMap;
use libudev_sys as ffi;
use udev::AsRawWithContext;

/// Build a property record from `(name, value)` list entries.
///
/// Entries are taken in the order given. A `None` value is kept as an
/// explicit null. A repeated name overwrites the earlier value.
pub fn extract<I, K, V>(entries: I) -> PropertyMap
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<OsStr>,
    V: AsRef<OsStr>,
{
    let entries = entries.into_iter();
    let mut properties = PropertyMap::with_capacity(entries.size_hint().0);

    for (name, value) in entries {
        properties.insert(
            name.as_ref().to_string_lossy().into_owned(),
            value.map(|value| value.as_ref().to_string_lossy().into_owned()),
        );
    }

    properties
}

/// Read every property of a device, in libudev order
///
/// The device is only borrowed; the caller keeps ownership of the handle.
pub fn extract_device(device: &udev::Device) -> PropertyMap {
    // SAFETY: the list belongs to `device`, which outlives the iterator.
    let entries = unsafe {
        ListEntries::new(ffi::udev_device_get_properties_list_entry(device.as_raw()))
    };
    extract(entries)
}

/// Iterator over a raw `udev_list_entry` chain.
///
/// Unlike `udev::Properties` it reports a NULL value as `None` instead of
/// an empty string.
pub(crate) struct ListEntries<'a> {
    entry: *mut ffi::udev_list_entry,
    _owner: PhantomData<&'a ()>,
}

impl<'a> ListEntries<'a> {
    /// # Safety
    ///
    /// `head` must be NULL or the head of a list that stays alive and
    /// unmodified for `'a`.
    pub(crate) unsafe fn new(head: *mut ffi::udev_list_entry) -> Self {
        Self {
            entry: head,
            _owner: PhantomData,
        }
    }
}

impl<'a> Iterator for ListEntries<'a> {
    type Item = (&'a OsStr, Option<&'a OsStr>);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.entry.is_null() {
            let current = self.entry;
            // SAFETY: `current` is a live entry of the list per `new`'s contract.
            let (name, value) = unsafe {
                self.entry = ffi::udev_list_entry_get_next(current);
                (
                    ffi::udev_list_entry_get_name(current),
                    ffi::udev_list_entry_get_value(current),
                )
            };

            // libudev never hands out unnamed entries; skip rather than crash if it does.
            if name.is_null() {
                continue;
            }

            // SAFETY: libudev strings are NUL-terminated and owned by the list.
            let name = unsafe { os_str_from_ptr(name) };
            let value = (!value.is_null()).then(|| unsafe { os_str_from_ptr(value) });
            return Some((name, value));
        }

        None
    }
}

unsafe fn os_str_from_ptr<'a>(ptr: *const c_char) -> &'a OsStr {
    OsStr::from_bytes(unsafe { CStr::from_ptr(ptr) }.to_bytes())
}
