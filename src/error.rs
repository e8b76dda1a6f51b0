//! Unified error types for the RoboLink firmware.
//!
//! One `Error` enum that every subsystem converts into, keeping the tick
//! loop's error handling uniform. All variants are `Copy` so they can be
//! passed through the scheduler and registry without allocation.
//!
//! | Category            | Reported to           | Effect on state              |
//! |---------------------|-----------------------|------------------------------|
//! | [`AdmissionError`]  | offending client      | nothing created              |
//! | [`ProtocolError`]   | sender                | connection stays open        |
//! | [`DecodeError`]     | nobody (logged)       | sub-command skipped          |
//! | [`TaskFailure`]     | task owner            | task ends in `error`         |

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the link subsystem funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A connection or task was refused by admission control.
    Admission(AdmissionError),
    /// An inbound message could not be understood.
    Protocol(ProtocolError),
    /// A base64 sub-command could not be decoded.
    Decode(DecodeError),
    /// A running task was terminated.
    Task(TaskFailure),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admission(e) => write!(f, "admission: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Task(e) => write!(f, "task: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Admission errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    /// The connection cap is already reached.
    MaxClientsReached,
    /// A task is already running; the new one is not queued.
    TaskAlreadyActive,
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxClientsReached => write!(f, "Max clients reached"),
            Self::TaskAlreadyActive => write!(f, "Previous task is still running"),
        }
    }
}

impl From<AdmissionError> for Error {
    fn from(e: AdmissionError) -> Self {
        Self::Admission(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The frame is not a JSON document.
    InvalidJson,
    /// `type` is missing or not one the server understands.
    UnsupportedType,
    /// A `command` message without a string array `commands`.
    MalformedCommand,
    /// The sender exhausted its message budget.
    RateLimited,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson => write!(f, "Invalid JSON format"),
            Self::UnsupportedType => write!(f, "Unsupported message type"),
            Self::MalformedCommand => write!(f, "Malformed command"),
            Self::RateLimited => write!(f, "Rate limit exceeded"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

/// Recovered locally: the offending sub-command is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The sub-command string or its base64 payload is empty.
    EmptyPayload,
    /// The base64 payload contains invalid characters or length.
    InvalidBase64,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "empty payload"),
            Self::InvalidBase64 => write!(f, "invalid base64"),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Task failures
// ---------------------------------------------------------------------------

/// Terminal reasons for a task ending in `error`. None of them is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFailure {
    /// The owning client closed its connection.
    ClientDisconnected,
    /// The owning client stopped sending heartbeats.
    HeartbeatTimeout,
    /// The task ran longer than the execution ceiling.
    ExecutionTimeout,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientDisconnected => write!(f, "client disconnected"),
            Self::HeartbeatTimeout => write!(f, "client disconnected (heartbeat timeout)"),
            Self::ExecutionTimeout => write!(f, "execution timeout"),
        }
    }
}

impl From<TaskFailure> for Error {
    fn from(e: TaskFailure) -> Self {
        Self::Task(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
