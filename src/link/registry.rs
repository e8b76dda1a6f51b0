//! Client registry: admission and bookkeeping of attached WebSocket sessions.
//!
//! A session exists from an accepted CONNECT until DISCONNECT or a
//! heartbeat expiry.  Admission is capped at [`LinkConfig::max_clients`];
//! a refused connection never gets a session.
//!
//! Each session carries a token-bucket limiter (via `burster`) so a single
//! chatty client cannot monopolise the tick loop.

use burster::Limiter;
use core::time::Duration;
use log::{info, warn};

use crate::config::LinkConfig;
use crate::error::AdmissionError;

// ── Constants ────────────────────────────────────────────────

/// Upper bound on `max_clients`; sizes the fixed session table.
pub const CLIENT_CAPACITY: usize = 4;

/// Client identifier assigned by the transport. Reused after disconnect.
pub type ClientId = u8;

// ── Session ──────────────────────────────────────────────────

/// One attached client.
pub struct ClientSession {
    pub id: ClientId,
    pub connected: bool,
    /// Monotonic milliseconds of the last heartbeat (or command).
    pub last_heartbeat_ms: u64,
    pub connected_at_ms: u64,
    rate_limiter: burster::TokenBucket<fn() -> Duration>,
}

impl ClientSession {
    fn new(id: ClientId, now_ms: u64, per_sec: u8, burst: u8) -> Self {
        Self {
            id,
            connected: true,
            last_heartbeat_ms: now_ms,
            connected_at_ms: now_ms,
            rate_limiter: burster::TokenBucket::new_with_time_provider(
                per_sec.into(),
                burst.into(),
                platform_now as fn() -> Duration,
            ),
        }
    }

    /// Milliseconds since the last heartbeat.
    pub fn silence_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_heartbeat_ms)
    }

    /// Consume one rate-limit token; returns `false` when exhausted.
    pub fn check_rate_limit(&mut self) -> bool {
        self.rate_limiter.try_consume(1).is_ok()
    }
}

// ── Registry ─────────────────────────────────────────────────

/// Fixed-capacity table of attached clients.
pub struct ClientRegistry {
    sessions: heapless::Vec<ClientSession, CLIENT_CAPACITY>,
    max_clients: usize,
    rate_per_sec: u8,
    rate_burst: u8,
}

impl ClientRegistry {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            sessions: heapless::Vec::new(),
            max_clients: (config.max_clients as usize).min(CLIENT_CAPACITY),
            rate_per_sec: config.rate_limit_per_sec,
            rate_burst: config.rate_limit_burst,
        }
    }

    /// Admit a new connection.
    ///
    /// A repeated CONNECT for an already-registered id is a new socket that
    /// reused the id: the old session is dropped and a fresh one created.
    /// Otherwise the connection is refused once the cap is hit.
    pub fn on_connect(&mut self, client_id: ClientId, now_ms: u64) -> Result<(), AdmissionError> {
        if self.on_disconnect(client_id) {
            warn!("Link[{}]: duplicate connect, replacing session", client_id);
        }

        if self.sessions.len() >= self.max_clients {
            warn!(
                "Link[{}]: max clients reached ({}), rejecting",
                client_id, self.max_clients
            );
            return Err(AdmissionError::MaxClientsReached);
        }

        let session = ClientSession::new(client_id, now_ms, self.rate_per_sec, self.rate_burst);
        if self.sessions.push(session).is_err() {
            return Err(AdmissionError::MaxClientsReached);
        }
        info!(
            "Link[{}]: connected ({}/{})",
            client_id,
            self.sessions.len(),
            self.max_clients
        );
        Ok(())
    }

    /// Remove a session. Returns `true` if one existed.
    ///
    /// Idempotent: unknown or already-removed ids are a no-op.
    pub fn on_disconnect(&mut self, client_id: ClientId) -> bool {
        match self.sessions.iter().position(|s| s.id == client_id) {
            Some(idx) => {
                self.sessions.swap_remove(idx);
                info!("Link[{}]: session removed", client_id);
                true
            }
            None => false,
        }
    }

    /// Record a heartbeat. Returns `false` for unknown clients.
    pub fn touch(&mut self, client_id: ClientId, now_ms: u64) -> bool {
        match self.get_mut(client_id) {
            Some(session) => {
                session.last_heartbeat_ms = now_ms;
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self, client_id: ClientId) -> bool {
        self.get(client_id).is_some_and(|s| s.connected)
    }

    /// Consume one inbound-message token for `client_id`.
    ///
    /// Unknown clients are always refused.
    pub fn check_rate_limit(&mut self, client_id: ClientId) -> bool {
        self.get_mut(client_id)
            .is_some_and(ClientSession::check_rate_limit)
    }

    /// Ids whose heartbeat silence strictly exceeds `timeout_ms`.
    pub fn expired(&self, now_ms: u64, timeout_ms: u64) -> heapless::Vec<ClientId, CLIENT_CAPACITY> {
        self.sessions
            .iter()
            .filter(|s| s.silence_ms(now_ms) > timeout_ms)
            .map(|s| s.id)
            .collect()
    }

    pub fn get(&self, client_id: ClientId) -> Option<&ClientSession> {
        self.sessions.iter().find(|s| s.id == client_id)
    }

    fn get_mut(&mut self, client_id: ClientId) -> Option<&mut ClientSession> {
        self.sessions.iter_mut().find(|s| s.id == client_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.sessions.iter().map(|s| s.id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }
}

// ── Platform time for rate limiter ───────────────────────────

#[cfg(target_os = "espidf")]
fn platform_now() -> Duration {
    // SAFETY: esp_timer_get_time has no preconditions once the scheduler runs.
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

#[cfg(not(target_os = "espidf"))]
fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    fn registry() -> ClientRegistry {
        ClientRegistry::new(&LinkConfig::default())
    }

    #[test]
    fn admits_up_to_cap() {
        let mut reg = registry();
        assert!(reg.on_connect(0, 0).is_ok());
        assert!(reg.on_connect(1, 0).is_ok());
        assert_eq!(
            reg.on_connect(2, 0),
            Err(AdmissionError::MaxClientsReached)
        );
        assert!(!reg.is_connected(2));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn slot_frees_after_disconnect() {
        let mut reg = registry();
        reg.on_connect(0, 0).unwrap();
        reg.on_connect(1, 0).unwrap();
        assert!(reg.on_disconnect(0));
        assert!(reg.on_connect(2, 10).is_ok());
        assert!(reg.is_connected(2));
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut reg = registry();
        reg.on_connect(3, 0).unwrap();
        assert!(reg.on_disconnect(3));
        assert!(!reg.on_disconnect(3));
        assert!(!reg.on_disconnect(9));
        assert!(reg.is_empty());
    }

    #[test]
    fn duplicate_connect_replaces_session_without_consuming_slot() {
        let mut reg = registry();
        reg.on_connect(0, 0).unwrap();
        reg.on_connect(1, 0).unwrap();
        reg.on_connect(0, 500).unwrap();
        assert_eq!(reg.len(), 2);
        assert!(reg.on_disconnect(1));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(0).map(|s| s.last_heartbeat_ms), Some(500));
    }

    #[test]
    fn touch_updates_heartbeat() {
        let mut reg = registry();
        reg.on_connect(0, 0).unwrap();
        assert!(reg.touch(0, 1234));
        assert_eq!(reg.get(0).map(|s| s.silence_ms(2000)), Some(766));
        assert!(!reg.touch(7, 1234));
    }

    #[test]
    fn expired_uses_strict_comparison() {
        let mut reg = registry();
        reg.on_connect(0, 0).unwrap();
        reg.on_connect(1, 5_000).unwrap();
        assert!(reg.expired(40_000, 40_000).is_empty());
        let ids = reg.expired(40_001, 40_000);
        assert_eq!(ids.as_slice(), &[0]);
    }

    #[test]
    fn rate_limiter_exhaustion() {
        let mut reg = registry();
        reg.on_connect(0, 0).unwrap();
        let burst = LinkConfig::default().rate_limit_burst;
        for _ in 0..burst {
            assert!(reg.check_rate_limit(0));
        }
        assert!(!reg.check_rate_limit(0));
        assert!(!reg.check_rate_limit(5));
    }
}
