//! Link inter-task communication channels.
//!
//! `embassy-sync` bounded MPMC channels bridge the WebSocket server
//! callbacks, the async writer and the synchronous tick loop.  All of them
//! share these static channels.
//!
//! ```text
//! ┌──────────────┐ TransportEvent ┌──────────────┐
//! │ WS callbacks  │──────────────▶│   Tick loop   │
//! │ + I/O task    │◀──────────────│   (sync)      │
//! └──────────────┘ OutboundFrame  └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::ports::{LinkTransport, TransportEvent};
use crate::link::registry::ClientId;

/// Outbound work for the I/O task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text { client_id: ClientId, text: String },
    Close(ClientId),
}

/// Channel depth for inbound events.
const INBOUND_DEPTH: usize = 16;

/// Channel depth for outbound frames.
const OUTBOUND_DEPTH: usize = 32;

/// Inbound events: WebSocket server → tick loop.
pub static INBOUND: Channel<CriticalSectionRawMutex, TransportEvent, INBOUND_DEPTH> =
    Channel::new();

/// Outbound frames: tick loop → I/O task.
pub static OUTBOUND: Channel<CriticalSectionRawMutex, OutboundFrame, OUTBOUND_DEPTH> =
    Channel::new();

/// Hand an event to the tick loop. Returns `false` if the channel is full.
///
/// A lost `Disconnected` is recovered by the heartbeat sweep, or sooner by
/// the next `Connected` for the same id.
pub fn publish(event: TransportEvent) -> bool {
    match INBOUND.try_send(event) {
        Ok(()) => true,
        Err(embassy_sync::channel::TrySendError::Full(event)) => {
            warn!("IO: inbound channel full, dropping {:?}", event);
            false
        }
    }
}

/// Try to receive the next inbound event.
pub fn try_recv_event() -> Option<TransportEvent> {
    INBOUND.try_receive().ok()
}

/// [`LinkTransport`] that queues frames for the I/O task.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelTransport;

impl ChannelTransport {
    fn push(frame: OutboundFrame) {
        if OUTBOUND.try_send(frame).is_err() {
            warn!("IO: outbound channel full, frame dropped");
        }
    }
}

impl LinkTransport for ChannelTransport {
    fn send_text(&mut self, client_id: ClientId, text: &str) {
        Self::push(OutboundFrame::Text {
            client_id,
            text: text.to_string(),
        });
    }

    fn close(&mut self, client_id: ClientId) {
        Self::push(OutboundFrame::Close(client_id));
    }
}
