//! Async link I/O task: drains outbound frames to the sockets.
//!
//! Runs in a dedicated thread using `edge-executor`.  The writer future is
//! truly async: it parks on `OUTBOUND.receive().await` and wakes the moment
//! the tick loop queues a frame, so there is no polling.
//!
//! ```text
//!  ┌──────────────────────────────────────────────┐
//!  │  I/O Thread                                  │
//!  │  ┌────────────────────────────────────────┐  │
//!  │  │  futures_lite::future::block_on        │  │
//!  │  │  ┌──────────────────────────────────┐  │  │
//!  │  │  │  edge_executor::LocalExecutor    │  │  │
//!  │  │  │     ┌─────────────────────┐      │  │  │
//!  │  │  │     │ Write (wake-on-send) │      │  │  │
//!  │  │  │     └─────────────────────┘      │  │  │
//!  │  │  └──────────────────────────────────┘  │  │
//!  │  └────────────────────────────────────────┘  │
//!  └──────────────────────────────────────────────┘
//! ```
//!
//! Reading is callback-driven by the HTTP server and does not pass through
//! this thread.

use core::fmt;
use log::{info, warn};

use super::channels::{OUTBOUND, OutboundFrame, publish};
use crate::app::ports::TransportEvent;
use crate::link::registry::ClientId;

/// Socket write failed; the connection is considered gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// No open socket for this client id.
    NotConnected,
    /// The stack refused the frame.
    Io,
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Io => write!(f, "socket write failed"),
        }
    }
}

/// Write side of the per-client sockets.
pub trait SocketWriter {
    fn write_text(&mut self, client_id: ClientId, text: &str) -> Result<(), WriteError>;

    /// Close the socket. Unknown ids are ignored.
    fn close(&mut self, client_id: ClientId);
}

/// Apply one outbound frame.
///
/// A failed write closes the socket; the broken client id is returned so
/// the caller can report the disconnect.
pub fn apply_frame(writer: &mut impl SocketWriter, frame: OutboundFrame) -> Option<ClientId> {
    match frame {
        OutboundFrame::Text { client_id, text } => match writer.write_text(client_id, &text) {
            Ok(()) | Err(WriteError::NotConnected) => None,
            Err(e) => {
                warn!("IO: write to client {} failed: {}", client_id, e);
                writer.close(client_id);
                Some(client_id)
            }
        },
        OutboundFrame::Close(client_id) => {
            writer.close(client_id);
            None
        }
    }
}

/// Write task: wakes instantly when the tick loop queues a frame.
pub async fn write_loop(mut writer: impl SocketWriter) {
    loop {
        let frame = OUTBOUND.receive().await;
        if let Some(client_id) = apply_frame(&mut writer, frame) {
            publish(TransportEvent::Disconnected(client_id));
        }
    }
}

/// Entry point for the I/O thread.
pub fn run_io_loop(writer: impl SocketWriter + 'static) {
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
    executor.spawn(write_loop(writer)).detach();

    info!("IO task started (async writer)");
    futures_lite::future::block_on(executor.run(core::future::pending::<()>()));
}

/// Spawn the I/O task in a dedicated thread pinned to Core 0 (PRO_CPU),
/// next to lwIP and the WiFi driver.
pub fn spawn(
    writer: impl SocketWriter + Send + 'static,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    crate::adapters::task_pin::spawn_on_core(
        crate::adapters::task_pin::Core::Pro,
        10,
        8,
        "link-io\0",
        move || run_io_loop(writer),
    )
}
