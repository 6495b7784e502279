// SPDX-License-Identifier: GPL-3.0-only

//! Human and JSON-lines rendering of records

use std::io::{self, Write};
use std::path::Path;

use devwatch_types::{DeviceEvent, DeviceRecord};
use serde::Serialize;

pub fn write_record(out: &mut impl Write, record: &DeviceRecord, json: bool) -> io::Result<()> {
    if json {
        return write_json_line(out, record);
    }

    writeln!(out, "{}", record.syspath)?;
    for (name, value) in record.properties.iter() {
        match value {
            Some(value) => writeln!(out, "    {name}={value}")?,
            None => writeln!(out, "    {name}")?,
        }
    }
    writeln!(out)
}

pub fn write_event(out: &mut impl Write, event: &DeviceEvent, json: bool) -> io::Result<()> {
    if json {
        return write_json_line(out, event);
    }

    writeln!(
        out,
        "{:<7} {} {}",
        event.action.as_str(),
        event.devnode.as_deref().unwrap_or("-"),
        event.syspath
    )
}

pub fn write_mount(
    out: &mut impl Write,
    device: &str,
    mount_dir: Option<&Path>,
    json: bool,
) -> io::Result<()> {
    if json {
        let line = serde_json::json!({
            "device": device,
            "mount_dir": mount_dir.map(|dir| dir.to_string_lossy()),
        });
        return write_json_line(out, &line);
    }

    match mount_dir {
        Some(dir) => writeln!(out, "{device} mounted at {}", dir.display()),
        None => writeln!(out, "{device} not mounted"),
    }
}

fn write_json_line(out: &mut impl Write, value: &impl Serialize) -> io::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use devwatch_types::{DeviceAction, PropertyMap};

    use super::*;

    fn rendered(write: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        write(&mut buf).expect("write to buffer");
        String::from_utf8(buf).expect("utf-8 output")
    }

    fn sample_event() -> DeviceEvent {
        let properties: PropertyMap = [("ID_FS_TYPE", Some("ext4")), ("syspath", Some("/sys/x"))]
            .into_iter()
            .collect();
        DeviceEvent {
            action: DeviceAction::Add,
            devnode: Some("/dev/sdb1".into()),
            syspath: "/sys/x".into(),
            subsystem: Some("block".into()),
            devtype: Some("partition".into()),
            properties,
        }
    }

    #[test]
    fn human_event_line() {
        let line = rendered(|out| write_event(out, &sample_event(), false));
        assert_eq!(line, "add     /dev/sdb1 /sys/x\n");
    }

    #[test]
    fn json_event_is_one_line_with_ordered_properties() {
        let line = rendered(|out| write_event(out, &sample_event(), true));
        assert_eq!(line.lines().count(), 1);
        assert!(line.contains(r#""properties":{"ID_FS_TYPE":"ext4","syspath":"/sys/x"}"#));
    }

    #[test]
    fn human_record_shows_valueless_properties_bare() {
        let mut properties = PropertyMap::new();
        properties.insert("DEVNAME", Some("/dev/sda".into()));
        properties.insert("ID_EMPTY", None);
        let record = DeviceRecord::new("/sys/a", properties);

        let text = rendered(|out| write_record(out, &record, false));
        assert_eq!(text, "/sys/a\n    DEVNAME=/dev/sda\n    ID_EMPTY\n    syspath=/sys/a\n\n");
    }

    #[test]
    fn mount_lines() {
        let found = rendered(|out| write_mount(out, "/dev/sdb1", Some(Path::new("/mnt/usb")), false));
        assert_eq!(found, "/dev/sdb1 mounted at /mnt/usb\n");

        let missing = rendered(|out| write_mount(out, "/dev/sdb1", None, true));
        assert_eq!(missing, "{\"device\":\"/dev/sdb1\",\"mount_dir\":null}\n");
    }
}
