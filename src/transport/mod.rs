//! Transport plumbing between the WebSocket server and the tick loop.
//!
//! ```text
//!  httpd thread ──TransportEvent──▶ INBOUND  ──▶ tick loop (LinkService)
//!  io thread    ◀──OutboundFrame─── OUTBOUND ◀── ChannelTransport
//! ```
//!
//! The tick loop never touches a socket: it only pushes frames into
//! [`channels::OUTBOUND`] and the I/O thread writes them out.

pub mod channels;
pub mod io_task;

pub use channels::{ChannelTransport, OutboundFrame};
pub use io_task::SocketWriter;
