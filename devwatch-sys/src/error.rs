// SPDX-License-Identifier: GPL-3.0-only

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::monitor::MonitorToken;

/// The libudev context could not be created; nothing else can work
#[derive(Error, Debug)]
#[error("failed to create libudev context: {0}")]
pub struct InitError(#[source] pub io::Error);

/// An enumeration cursor could not be created
#[derive(Error, Debug)]
pub enum EnumerationError {
    #[error("failed to create enumeration cursor: {0}")]
    Cursor(#[source] io::Error),

    #[error("failed to add enumeration match for subsystem {subsystem}: {source}")]
    Match {
        subsystem: String,
        #[source]
        source: io::Error,
    },
}

/// A monitor subscription could not be set up
#[derive(Error, Debug)]
pub enum MonitorOpenError {
    #[error("failed to create netlink monitor: {0}")]
    Create(#[source] io::Error),

    #[error("failed to apply monitor filter {subsystem}/{}: {source}", .devtype.as_deref().unwrap_or("*"))]
    Filter {
        subsystem: String,
        devtype: Option<String>,
        #[source]
        source: io::Error,
    },

    #[error("failed to enable event reception: {0}")]
    Listen(#[source] io::Error),

    #[error("no tokio runtime available to register the monitor with")]
    NoRuntime,

    #[error("failed to register monitor with the event loop: {0}")]
    Register(#[source] io::Error),
}

/// Misuse of a monitor subscription
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MonitorError {
    #[error("monitor {0:?} is not open (already closed or never opened)")]
    NotOpen(MonitorToken),
}

/// Error returned by an emit sink
#[derive(Error, Debug)]
#[error(transparent)]
pub struct SinkError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl SinkError {
    pub fn new(error: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self(error.into())
    }
}

impl From<io::Error> for SinkError {
    fn from(error: io::Error) -> Self {
        Self::new(error)
    }
}

/// Failure while driving the monitor event loop
#[derive(Error, Debug)]
pub enum EventLoopError {
    #[error("no monitors are registered")]
    Idle,

    #[error("failed to receive from monitor {token:?}: {source}")]
    Io {
        token: MonitorToken,
        #[source]
        source: io::Error,
    },

    #[error("sink for monitor {token:?} failed: {source}")]
    Sink {
        token: MonitorToken,
        #[source]
        source: SinkError,
    },
}

/// Mount point lookup failures
#[derive(Error, Debug)]
pub enum MountError {
    #[error("can't open mount table {path:?}: {source}")]
    TableUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{device} is not mounted")]
    NotFound { device: String },

    #[error("{device} was not mounted after {waited:?}")]
    Timeout { device: String, waited: Duration },
}
