// SPDX-License-Identifier: GPL-3.0-only

use tracing::debug;

use crate::error::InitError;

/// Process-wide connection to libudev
///
/// Open it once at startup and pass it by reference to the enumerator and
/// to monitor sources. Both borrow the context, so it cannot be closed
/// while either is still alive.
pub struct SubsystemContext {
    udev: udev::Udev,
}

impl SubsystemContext {
    pub fn open() -> Result<Self, InitError> {
        let udev = udev::Udev::new().map_err(InitError)?;
        debug!("libudev context opened");
        Ok(Self { udev })
    }

    pub(crate) fn udev(&self) -> &udev::Udev {
        &self.udev
    }

    /// Release the context. Dropping it has the same effect.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for SubsystemContext {
    fn drop(&mut self) {
        debug!("libudev context released");
    }
}

impl std::fmt::Debug for SubsystemContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubsystemContext").finish_non_exhaustive()
    }
}
