// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Kernel-side match applied to a monitor socket
///
/// Events outside the filter are dropped by the netlink socket filter and
/// never reach userspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorFilter {
    pub subsystem: String,

    /// `None` matches every devtype of the subsystem
    #[serde(default)]
    pub devtype: Option<String>,
}

impl MonitorFilter {
    pub fn new(subsystem: impl Into<String>, devtype: Option<String>) -> Self {
        Self {
            subsystem: subsystem.into(),
            devtype,
        }
    }

    /// Whether a device with the given subsystem/devtype passes the filter
    pub fn matches(&self, subsystem: Option<&str>, devtype: Option<&str>) -> bool {
        if subsystem != Some(self.subsystem.as_str()) {
            return false;
        }

        match &self.devtype {
            Some(wanted) => devtype == Some(wanted.as_str()),
            None => true,
        }
    }
}

impl Default for MonitorFilter {
    /// Block device partitions
    fn default() -> Self {
        Self {
            subsystem: "block".to_string(),
            devtype: Some("partition".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_partitions_only() {
        let filter = MonitorFilter::default();
        assert!(filter.matches(Some("block"), Some("partition")));
        assert!(!filter.matches(Some("block"), Some("disk")));
        assert!(!filter.matches(Some("usb"), Some("partition")));
        assert!(!filter.matches(None, None));
    }

    #[test]
    fn missing_devtype_matches_whole_subsystem() {
        let filter = MonitorFilter::new("input", None);
        assert!(filter.matches(Some("input"), None));
        assert!(filter.matches(Some("input"), Some("anything")));
    }
}
