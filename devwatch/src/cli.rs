// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "devwatch", version)]
#[command(about = "Enumerate udev devices and watch hotplug events")]
pub struct Cli {
    /// Configuration file (defaults to $XDG_CONFIG_HOME/devwatch/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print every device currently known to udev
    List {
        /// Only list devices of this subsystem
        #[arg(long)]
        subsystem: Option<String>,

        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },

    /// Watch for add/remove/change notifications until interrupted
    Monitor {
        /// Subsystem to watch (resets the configured devtype)
        #[arg(long)]
        subsystem: Option<String>,

        /// Devtype to watch within the subsystem
        #[arg(long)]
        devtype: Option<String>,

        /// Look up the mount point of each added device node
        #[arg(long)]
        resolve_mounts: bool,

        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },

    /// Print the mount directory of a device node
    MountPoint {
        /// Device path exactly as it appears in the mount table, e.g. /dev/sdb1
        device: String,

        /// Keep polling until the device is mounted
        #[arg(long)]
        wait: bool,

        /// Override the configured wait timeout
        #[arg(long, requires = "wait")]
        timeout_ms: Option<u64>,
    },
}
