//! Port traits: the hexagonal boundary between the link core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ LinkService (domain)
//! ```
//!
//! Driven adapters (WebSocket server, command interpreter, radio flags,
//! event sinks, config storage) implement these traits.  The
//! [`LinkService`](super::service::LinkService) consumes them via generics,
//! so the domain core never touches sockets or UARTs directly.

use crate::app::commands::DeviceCommand;
use crate::config::LinkConfig;
use crate::link::registry::ClientId;

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain → clients)
// ───────────────────────────────────────────────────────────────

/// Write-side of the multiplexed client connection.
///
/// Inbound traffic arrives as [`TransportEvent`]s fed to the service.
pub trait LinkTransport {
    /// Queue a text frame for one client. Unknown clients are ignored.
    fn send_text(&mut self, client_id: ClientId, text: &str);

    /// Forcibly close one client's connection.
    fn close(&mut self, client_id: ClientId);
}

/// Connection-level events raised by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected(ClientId),
    Disconnected(ClientId),
    Text { client_id: ClientId, text: String },
}

// ───────────────────────────────────────────────────────────────
// Command interpreter port (driven adapter: domain → device)
// ───────────────────────────────────────────────────────────────

/// The device command interpreter.
///
/// Dispatch is fire-and-forget: the command executes over later ticks and
/// its result shows up through [`take_response`](Self::take_response).
pub trait CommandInterpreter {
    /// Start executing `cmd`. Must not block.
    fn dispatch(&mut self, cmd: &DeviceCommand);

    /// Collect the result of the last dispatched command, once ready.
    fn take_response(&mut self) -> Option<String>;
}

// ───────────────────────────────────────────────────────────────
// Radio activity port (driven adapter: Bluetooth → domain)
// ───────────────────────────────────────────────────────────────

/// Read-only view of the shared radio's state.
pub trait RadioPort {
    /// `true` while another subsystem is scanning or connected over the radio.
    fn is_busy(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`LinkEvent`](super::events::LinkEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::LinkEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists link configuration.
///
/// Implementations MUST validate before persisting; invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`LinkConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<LinkConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &LinkConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::Corrupted => Self::Config("config corrupted"),
            ConfigError::StorageFull => Self::Config("storage full"),
            ConfigError::IoError => Self::Config("storage I/O error"),
        }
    }
}
