//! Link configuration parameters
//!
//! All tunable parameters for the remote task link.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::link::registry::CLIENT_CAPACITY;

/// Core link configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    // --- Admission ---
    /// Maximum concurrently attached WebSocket clients
    pub max_clients: u8,
    /// Inbound messages per second allowed per client
    pub rate_limit_per_sec: u8,
    /// Inbound message burst allowed per client
    pub rate_limit_burst: u8,

    // --- Liveness ---
    /// Heartbeat silence (ms) after which a client is dropped
    pub heartbeat_timeout_ms: u32,
    /// Extra heartbeat allowance (ms) while the radio is busy
    pub radio_grace_ms: u32,
    /// Interval (ms) between heartbeat sweeps
    pub health_check_interval_ms: u32,

    // --- Tasks ---
    /// Execution ceiling (ms) for one running task
    pub task_execution_timeout_ms: u32,

    // --- Timing ---
    /// Tick loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Radio status log interval (milliseconds)
    pub radio_status_log_interval_ms: u32,

    // --- Network ---
    /// WebSocket listen port
    pub ws_port: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            // Admission
            max_clients: 2,
            rate_limit_per_sec: 20,
            rate_limit_burst: 20,

            // Liveness
            heartbeat_timeout_ms: 40_000,
            radio_grace_ms: 15_000,
            health_check_interval_ms: 15_000,

            // Tasks
            task_execution_timeout_ms: 45_000,

            // Timing
            control_loop_interval_ms: 10,
            radio_status_log_interval_ms: 30_000,

            // Network
            ws_port: 81,
        }
    }
}

impl LinkConfig {
    /// Heartbeat timeout in effect, widened while the radio is busy.
    pub fn effective_heartbeat_timeout_ms(&self, radio_busy: bool) -> u32 {
        if radio_busy {
            self.heartbeat_timeout_ms.saturating_add(self.radio_grace_ms)
        } else {
            self.heartbeat_timeout_ms
        }
    }

    /// Range-check every field. Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 || self.max_clients as usize > CLIENT_CAPACITY {
            return Err(ConfigError::ValidationFailed(
                "max_clients must be 1..=CLIENT_CAPACITY",
            ));
        }
        if self.rate_limit_per_sec == 0 || self.rate_limit_burst == 0 {
            return Err(ConfigError::ValidationFailed(
                "rate limits must be non-zero",
            ));
        }
        if !(1_000..=600_000).contains(&self.heartbeat_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "heartbeat_timeout_ms must be 1000–600000",
            ));
        }
        if self.radio_grace_ms > 120_000 {
            return Err(ConfigError::ValidationFailed(
                "radio_grace_ms must be <= 120000",
            ));
        }
        if !(500..=300_000).contains(&self.health_check_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "health_check_interval_ms must be 500–300000",
            ));
        }
        if self.task_execution_timeout_ms < self.health_check_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "task_execution_timeout_ms must be >= health_check_interval_ms",
            ));
        }
        if !(1..=1_000).contains(&self.control_loop_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "control_loop_interval_ms must be 1–1000",
            ));
        }
        if self.ws_port == 0 {
            return Err(ConfigError::ValidationFailed("ws_port must be non-zero"));
        }
        Ok(())
    }
}

/// Load the stored configuration and check it before use.
pub fn load(store: &impl ConfigPort) -> crate::error::Result<LinkConfig> {
    let config = store.load()?;
    config.validate()?;
    Ok(config)
}
