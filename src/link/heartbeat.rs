//! Heartbeat monitor: periodic liveness sweep over the client registry.
//!
//! Runs on a fixed interval regardless of message traffic.  A client whose
//! heartbeat silence exceeds the *effective* timeout is removed from the
//! registry; the caller then notifies it, closes the socket and fails any
//! task it owned.
//!
//! The effective timeout is widened while the shared radio is busy: BLE
//! scanning starves the WiFi stack and the tick loop, and a client must not
//! be dropped merely because its heartbeats were delayed by that.

use log::{error, warn};

use super::registry::{CLIENT_CAPACITY, ClientId, ClientRegistry};
use crate::config::LinkConfig;

/// Outcome of one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Clients removed from the registry by this sweep.
    pub expired: heapless::Vec<ClientId, CLIENT_CAPACITY>,
    /// Whether the radio grace period was in effect.
    pub radio_busy: bool,
}

pub struct HeartbeatMonitor {
    interval_ms: u64,
    base_timeout_ms: u64,
    grace_ms: u64,
    last_sweep_ms: u64,
}

impl HeartbeatMonitor {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            interval_ms: config.health_check_interval_ms.into(),
            base_timeout_ms: config.heartbeat_timeout_ms.into(),
            grace_ms: config.radio_grace_ms.into(),
            last_sweep_ms: 0,
        }
    }

    pub fn effective_timeout_ms(&self, radio_busy: bool) -> u64 {
        if radio_busy {
            self.base_timeout_ms + self.grace_ms
        } else {
            self.base_timeout_ms
        }
    }

    /// `true` once more than one sweep interval has passed since the last sweep.
    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_sweep_ms) > self.interval_ms
    }

    /// Sweep if the interval has elapsed.
    pub fn poll(
        &mut self,
        now_ms: u64,
        radio_busy: bool,
        registry: &mut ClientRegistry,
    ) -> Option<SweepReport> {
        if !self.is_due(now_ms) {
            return None;
        }
        Some(self.sweep(now_ms, radio_busy, registry))
    }

    /// Remove every client silent for longer than the effective timeout.
    pub fn sweep(
        &mut self,
        now_ms: u64,
        radio_busy: bool,
        registry: &mut ClientRegistry,
    ) -> SweepReport {
        self.last_sweep_ms = now_ms;
        let timeout = self.effective_timeout_ms(radio_busy);
        let expired = registry.expired(now_ms, timeout);

        for &client_id in &expired {
            if radio_busy {
                warn!(
                    "Heartbeat[{}]: timeout during radio activity ({}ms)",
                    client_id, timeout
                );
            } else {
                error!("Heartbeat[{}]: timeout, disconnecting", client_id);
            }
            registry.on_disconnect(client_id);
        }

        SweepReport {
            expired,
            radio_busy,
        }
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    fn setup() -> (HeartbeatMonitor, ClientRegistry) {
        let cfg = LinkConfig::default();
        (HeartbeatMonitor::new(&cfg), ClientRegistry::new(&cfg))
    }

    #[test]
    fn sweep_interval_is_strict() {
        let (mut mon, mut reg) = setup();
        assert!(mon.poll(15_000, false, &mut reg).is_none());
        assert!(mon.poll(15_001, false, &mut reg).is_some());
        assert!(mon.poll(30_001, false, &mut reg).is_none());
        assert!(mon.poll(30_002, false, &mut reg).is_some());
    }

    #[test]
    fn silent_client_expires() {
        let (mut mon, mut reg) = setup();
        reg.on_connect(0, 0).unwrap();
        reg.on_connect(1, 0).unwrap();
        reg.touch(1, 30_000);

        let report = mon.sweep(40_001, false, &mut reg);
        assert_eq!(report.expired.as_slice(), &[0]);
        assert!(!reg.is_connected(0));
        assert!(reg.is_connected(1));
    }

    #[test]
    fn radio_activity_extends_timeout() {
        let (mut mon, mut reg) = setup();
        reg.on_connect(0, 0).unwrap();

        let report = mon.sweep(50_000, true, &mut reg);
        assert!(report.expired.is_empty());
        assert!(report.radio_busy);
        assert!(reg.is_connected(0));

        let report = mon.sweep(55_001, true, &mut reg);
        assert_eq!(report.expired.as_slice(), &[0]);
    }

    #[test]
    fn effective_timeout_values() {
        let (mon, _) = setup();
        assert_eq!(mon.effective_timeout_ms(false), 40_000);
        assert_eq!(mon.effective_timeout_ms(true), 55_000);
    }
}
