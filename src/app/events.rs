//! Outbound link events.
//!
//! The [`LinkService`](super::service::LinkService) and the scheduler emit
//! these through the [`EventSink`](super::ports::EventSink) port.  Adapters
//! on the other side decide what to do with them; the firmware logs them
//! to serial.

use crate::error::{AdmissionError, DecodeError, ProtocolError, TaskFailure};
use crate::link::registry::ClientId;
use crate::link::task::TaskId;

/// Structured events emitted by the link core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A client was admitted.
    ClientConnected(ClientId),

    /// A connection attempt was refused.
    ClientRejected {
        client_id: ClientId,
        reason: AdmissionError,
    },

    /// A client went away (transport close or heartbeat expiry).
    ClientDisconnected(ClientId),

    /// A client missed its heartbeat window and was dropped.
    ClientExpired {
        client_id: ClientId,
        radio_busy: bool,
    },

    /// An inbound message was rejected.
    ProtocolViolation {
        client_id: ClientId,
        error: ProtocolError,
    },

    /// A task entered `running`.
    TaskStarted { task_id: TaskId, client_id: ClientId },

    /// A task was refused because another one is running.
    TaskRejected { task_id: TaskId, client_id: ClientId },

    /// One sub-command was handed to the interpreter.
    SubCommandDispatched { task_id: TaskId, index: usize },

    /// A sub-command failed to decode and was skipped.
    SubCommandSkipped {
        task_id: TaskId,
        index: usize,
        error: DecodeError,
    },

    /// A task finished every sub-command.
    TaskCompleted { task_id: TaskId, results: usize },

    /// A task was terminated.
    TaskFailed { task_id: TaskId, reason: TaskFailure },
}
