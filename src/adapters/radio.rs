//! Shared-radio activity flags.
//!
//! WiFi and Bluetooth share one antenna.  The Bluetooth side raises these
//! flags while it scans or holds a connection; the link reads them through
//! [`RadioPort`] to widen its heartbeat timeout.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::app::ports::RadioPort;

#[derive(Debug)]
pub struct RadioActivity {
    scanning: AtomicBool,
    connected: AtomicBool,
}

/// Process-wide radio state, written by the Bluetooth stack callbacks.
pub static RADIO: RadioActivity = RadioActivity::new();

impl RadioActivity {
    pub const fn new() -> Self {
        Self {
            scanning: AtomicBool::new(false),
            connected: AtomicBool::new(false),
        }
    }

    pub fn set_scanning(&self, on: bool) {
        self.scanning.store(on, Ordering::Release);
    }

    pub fn set_connected(&self, on: bool) {
        self.connected.store(on, Ordering::Release);
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Default for RadioActivity {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioPort for RadioActivity {
    fn is_busy(&self) -> bool {
        self.is_scanning() || self.is_connected()
    }
}
