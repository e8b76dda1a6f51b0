//! WiFi station-mode adapter.
//!
//! Joins the access point whose credentials the WiFi driver already holds
//! in flash.  Bring-up is refused when the heap is too low to host the
//! WiFi stack, and a failed join is retried a fixed number of times.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF driver via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.

use core::fmt;
use core::time::Duration;
use log::{error, info, warn};

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{BlockingWifi, Configuration, EspWifi};

/// Minimum free heap (bytes) required before starting the WiFi stack.
pub const MIN_FREE_HEAP: u32 = 50_000;

/// Join attempts before giving up.
pub const MAX_ATTEMPTS: u32 = 3;

/// Pause between join attempts.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(2);

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    NoCredentials,
    InsufficientHeap { free: u32 },
    ConnectionFailed,
    Driver,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no stored WiFi credentials"),
            Self::InsufficientHeap { free } => {
                write!(f, "insufficient heap for WiFi ({} < {} bytes)", free, MIN_FREE_HEAP)
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::Driver => write!(f, "WiFi driver error"),
        }
    }
}

impl std::error::Error for WifiError {}

// ───────────────────────────────────────────────────────────────
// Policy helpers
// ───────────────────────────────────────────────────────────────

pub fn check_free_heap(free: u32) -> Result<(), WifiError> {
    if free < MIN_FREE_HEAP {
        return Err(WifiError::InsufficientHeap { free });
    }
    Ok(())
}

/// Run `attempt` up to `max_attempts` times, sleeping `backoff` between
/// failures.  Returns the 1-based attempt that succeeded.
pub fn connect_with_retry(
    max_attempts: u32,
    backoff: Duration,
    mut attempt: impl FnMut(u32) -> Result<(), WifiError>,
) -> Result<u32, WifiError> {
    for n in 1..=max_attempts {
        if n > 1 {
            warn!("WiFi: retry {} in {}ms", n - 1, backoff.as_millis());
            std::thread::sleep(backoff);
        }
        match attempt(n) {
            Ok(()) => {
                info!("WiFi: connected on attempt {}", n);
                return Ok(n);
            }
            Err(e) => error!("WiFi: attempt {} failed: {}", n, e),
        }
    }
    error!("WiFi: all {} connection attempts failed", max_attempts);
    Err(WifiError::ConnectionFailed)
}

#[cfg(target_os = "espidf")]
pub fn free_heap() -> u32 {
    // SAFETY: read-only query of the allocator statistics.
    unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
}

#[cfg(not(target_os = "espidf"))]
pub fn free_heap() -> u32 {
    u32::MAX
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiStation {
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Simulation: stored SSID and how many joins fail before one succeeds.
    #[cfg(not(target_os = "espidf"))]
    sim_ssid: Option<String>,
    #[cfg(not(target_os = "espidf"))]
    sim_failures: u32,
    connected: bool,
    backoff: Duration,
}

impl WifiStation {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: BlockingWifi<EspWifi<'static>>) -> Self {
        Self {
            wifi,
            connected: false,
            backoff: RETRY_BACKOFF,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new_sim(ssid: Option<&str>, failures: u32) -> Self {
        Self {
            sim_ssid: ssid.map(str::to_string),
            sim_failures: failures,
            connected: false,
            backoff: Duration::ZERO,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Bring up the station with the stored credentials.
    pub fn start(&mut self) -> Result<(), WifiError> {
        let free = free_heap();
        info!("WiFi: free heap before init: {} bytes", free);
        check_free_heap(free)?;

        self.platform_configure()?;
        let backoff = self.backoff;
        connect_with_retry(MAX_ATTEMPTS, backoff, |_| self.platform_join())?;
        self.connected = true;
        info!("WiFi: free heap after connect: {} bytes", free_heap());
        Ok(())
    }

    /// Erase the stored credentials and drop the link.
    ///
    /// The next [`start`](Self::start) fails with `NoCredentials` until new
    /// credentials are provisioned; callers normally restart the chip next.
    pub fn forget_credentials(&mut self) -> Result<(), WifiError> {
        warn!("WiFi: erasing stored credentials");
        self.connected = false;
        self.platform_forget()
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_forget(&mut self) -> Result<(), WifiError> {
        let _ = self.wifi.disconnect();
        // SAFETY: the driver is initialised; esp_wifi_restore only resets
        // its persisted settings.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_restore() };
        if ret != esp_idf_svc::sys::ESP_OK as i32 {
            error!("WiFi: esp_wifi_restore failed: {}", ret);
            return Err(WifiError::Driver);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_forget(&mut self) -> Result<(), WifiError> {
        self.sim_ssid = None;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_configure(&mut self) -> Result<(), WifiError> {
        let stored = self.wifi.get_configuration().map_err(|_| WifiError::Driver)?;
        let client = match stored {
            Configuration::Client(c) | Configuration::Mixed(c, _) if !c.ssid.is_empty() => c,
            _ => return Err(WifiError::NoCredentials),
        };
        info!("WiFi: joining '{}'", client.ssid);
        self.wifi
            .set_configuration(&Configuration::Client(client))
            .map_err(|_| WifiError::Driver)?;
        self.wifi.start().map_err(|_| WifiError::Driver)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_configure(&mut self) -> Result<(), WifiError> {
        match &self.sim_ssid {
            Some(ssid) => {
                info!("WiFi(sim): joining '{}'", ssid);
                Ok(())
            }
            None => Err(WifiError::NoCredentials),
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_join(&mut self) -> Result<(), WifiError> {
        if let Err(e) = self.wifi.connect() {
            warn!("WiFi: connect error {:?}", e);
            let _ = self.wifi.disconnect();
            return Err(WifiError::ConnectionFailed);
        }
        self.wifi
            .wait_netif_up()
            .map_err(|_| WifiError::ConnectionFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_join(&mut self) -> Result<(), WifiError> {
        if self.sim_failures > 0 {
            self.sim_failures -= 1;
            return Err(WifiError::ConnectionFailed);
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
