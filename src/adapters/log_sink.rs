//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured link events to the
//! logger (UART / USB-CDC in production), one line per event.

use log::{debug, info, warn};

use crate::app::events::LinkEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`LinkEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &LinkEvent) {
        match event {
            LinkEvent::ClientConnected(id) => info!("CLIENT | {} connected", id),
            LinkEvent::ClientRejected { client_id, reason } => {
                warn!("CLIENT | {} rejected: {}", client_id, reason);
            }
            LinkEvent::ClientDisconnected(id) => info!("CLIENT | {} disconnected", id),
            LinkEvent::ClientExpired {
                client_id,
                radio_busy,
            } => warn!(
                "CLIENT | {} heartbeat expired (radio {})",
                client_id,
                if *radio_busy { "busy" } else { "idle" }
            ),
            LinkEvent::ProtocolViolation { client_id, error } => {
                warn!("PROTO | client {}: {}", client_id, error);
            }
            LinkEvent::TaskStarted { task_id, client_id } => {
                info!("TASK | {} running (client {})", task_id, client_id);
            }
            LinkEvent::TaskRejected { task_id, client_id } => {
                warn!("TASK | {} rejected (client {}), busy", task_id, client_id);
            }
            LinkEvent::SubCommandDispatched { task_id, index } => {
                debug!("TASK | {} dispatch #{}", task_id, index);
            }
            LinkEvent::SubCommandSkipped {
                task_id,
                index,
                error,
            } => warn!("TASK | {} skip #{}: {}", task_id, index, error),
            LinkEvent::TaskCompleted { task_id, results } => {
                info!("TASK | {} completed, {} result(s)", task_id, results);
            }
            LinkEvent::TaskFailed { task_id, reason } => {
                warn!("TASK | {} error: {}", task_id, reason);
            }
        }
    }
}
