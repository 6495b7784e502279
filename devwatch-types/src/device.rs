// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::properties::{PropertyMap, SYSPATH_KEY};

/// Kernel uevent action attached to a monitor notification
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceAction {
    Add,
    Remove,
    Change,
    /// Any other action string (`bind`, `unbind`, `move`, `online`, ...)
    Other(String),
}

impl DeviceAction {
    pub fn as_str(&self) -> &str {
        match self {
            DeviceAction::Add => "add",
            DeviceAction::Remove => "remove",
            DeviceAction::Change => "change",
            DeviceAction::Other(action) => action,
        }
    }
}

impl From<&str> for DeviceAction {
    fn from(action: &str) -> Self {
        match action {
            "add" => DeviceAction::Add,
            "remove" => DeviceAction::Remove,
            "change" => DeviceAction::Change,
            other => DeviceAction::Other(other.to_string()),
        }
    }
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DeviceAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DeviceAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let action = String::deserialize(deserializer)?;
        Ok(DeviceAction::from(action.as_str()))
    }
}

/// A device as returned by enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Path of the device in the sysfs tree (e.g. `/sys/devices/.../sdb/sdb1`)
    pub syspath: String,

    /// udev properties in library order, with `syspath` appended
    pub properties: PropertyMap,
}

impl DeviceRecord {
    /// Build a record, attaching the syspath to the property set
    pub fn new(syspath: impl Into<String>, mut properties: PropertyMap) -> Self {
        let syspath = syspath.into();
        properties.insert(SYSPATH_KEY, Some(syspath.clone()));
        Self {
            syspath,
            properties,
        }
    }
}

/// A device change notification as delivered by the monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub action: DeviceAction,

    /// Device node (e.g. `/dev/sdb1`); not every device has one
    pub devnode: Option<String>,

    pub syspath: String,

    pub subsystem: Option<String>,

    pub devtype: Option<String>,

    /// udev properties in library order, with `syspath` attached
    pub properties: PropertyMap,
}

impl DeviceEvent {
    pub fn devnode_or_empty(&self) -> &str {
        self.devnode.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_round_trip_through_their_kernel_names() {
        for name in ["add", "remove", "change", "bind"] {
            assert_eq!(DeviceAction::from(name).as_str(), name);
        }
        assert_eq!(DeviceAction::from("move"), DeviceAction::Other("move".into()));
    }

    #[test]
    fn record_attaches_syspath_after_existing_properties() {
        let properties: PropertyMap = [("ID_FS_TYPE", Some("ext4"))].into_iter().collect();
        let record = DeviceRecord::new("/sys/devices/virtual/block/loop0", properties);

        assert_eq!(
            record.properties.keys().collect::<Vec<_>>(),
            vec!["ID_FS_TYPE", "syspath"]
        );
        assert_eq!(
            record.properties.value("syspath"),
            Some("/sys/devices/virtual/block/loop0")
        );
    }

    #[test]
    fn event_serializes_action_as_plain_string() {
        let event = DeviceEvent {
            action: DeviceAction::Add,
            devnode: Some("/dev/sdb1".into()),
            syspath: "/sys/block/sdb/sdb1".into(),
            subsystem: Some("block".into()),
            devtype: Some("partition".into()),
            properties: PropertyMap::new(),
        };

        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["action"], "add");
        assert_eq!(json["devnode"], "/dev/sdb1");
    }
}
