// SPDX-License-Identifier: GPL-3.0-only

//! Mount point lookup for device nodes

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::error::MountError;

/// Live mount table maintained by the kernel
pub const PROC_MOUNTS: &str = "/proc/mounts";

/// One line of the mount table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// First field, e.g. `/dev/sdb1`
    pub device: String,
    /// Second field, the mount directory
    pub mount_dir: PathBuf,
}

/// How long [`MountTable::wait_for`] keeps polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountWait {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for MountWait {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountTable {
    path: PathBuf,
}

impl MountTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mount directory of the first entry whose device field equals `device`.
    ///
    /// The comparison is exact: no normalization, no symlink resolution.
    pub fn resolve(&self, device: &str) -> Result<PathBuf, MountError> {
        let reader = self.open()?;

        for line in reader.lines() {
            let line = line.map_err(|source| self.unavailable(source))?;
            if let Some(entry) = parse_mount_line(&line)
                && entry.device == device
            {
                debug!(device, mount_dir = ?entry.mount_dir, "mount point resolved");
                return Ok(entry.mount_dir);
            }
        }

        Err(MountError::NotFound {
            device: device.to_string(),
        })
    }

    /// Poll until `device` shows up in the table or `wait.timeout` elapses.
    ///
    /// A freshly added device is usually mounted a little after its udev
    /// event. Only `NotFound` is retried; an unreadable table fails at once.
    pub async fn wait_for(&self, device: &str, wait: &MountWait) -> Result<PathBuf, MountError> {
        let started = Instant::now();

        loop {
            match self.resolve(device) {
                Err(MountError::NotFound { .. }) => {}
                other => return other,
            }

            let waited = started.elapsed();
            if waited >= wait.timeout {
                return Err(MountError::Timeout {
                    device: device.to_string(),
                    waited,
                });
            }

            sleep(wait.poll_interval.min(wait.timeout - waited)).await;
        }
    }

    fn open(&self) -> Result<BufReader<File>, MountError> {
        File::open(&self.path)
            .map(BufReader::new)
            .map_err(|source| self.unavailable(source))
    }

    fn unavailable(&self, source: std::io::Error) -> MountError {
        MountError::TableUnavailable {
            path: self.path.clone(),
            source,
        }
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new(PROC_MOUNTS)
    }
}

/// Parse one `fstab(5)`-format line. Comments and short lines yield `None`.
pub fn parse_mount_line(line: &str) -> Option<MountEntry> {
    let line = line.trim_start();
    if line.starts_with('#') {
        return None;
    }

    let mut fields = line.split_whitespace();
    let device = fields.next()?;
    let mount_dir = fields.next()?;

    Some(MountEntry {
        device: unescape_mount_field(device),
        mount_dir: PathBuf::from(unescape_mount_field(mount_dir)),
    })
}

/// Decode `\NNN` octal escapes (e.g. `\040` for a space)
fn unescape_mount_field(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1..=index + 3].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let octal = &value[index + 1..index + 4];
            if let Ok(byte) = u8::from_str_radix(octal, 8) {
                output.push(byte);
                index += 4;
                continue;
            }
        }

        output.push(bytes[index]);
        index += 1;
    }

    String::from_utf8_lossy(&output).into_owned()
}
