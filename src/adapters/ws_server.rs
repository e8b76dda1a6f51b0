//! WebSocket server adapter.
//!
//! The ESP-IDF HTTP server calls the WebSocket handler on its own thread
//! for every open, frame and close.  This adapter maps httpd session
//! descriptors onto small [`ClientId`]s, publishes [`TransportEvent`]s to
//! the tick loop and keeps a detached sender per socket for the I/O task.
//!
//! ```text
//!  httpd ──open/text/close──▶ SharedSockets ──TransportEvent──▶ INBOUND
//!  I/O task ──write_text/close──▶ SharedSockets ──▶ detached sender
//! ```
//!
//! One slot more than [`CLIENT_CAPACITY`] is kept so a connection above the
//! admission cap still gets an id and can be told why it is refused.

use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::app::ports::TransportEvent;
use crate::link::registry::{CLIENT_CAPACITY, ClientId};
use crate::transport::io_task::{SocketWriter, WriteError};

#[cfg(target_os = "espidf")]
use esp_idf_svc::http::server::{Configuration, EspHttpServer, ws::EspHttpWsDetachedSender};
#[cfg(target_os = "espidf")]
use esp_idf_svc::ws::FrameType;

/// Socket slots tracked by the adapter.
pub const SOCKET_SLOTS: usize = CLIENT_CAPACITY + 1;

/// Largest inbound text frame accepted.
pub const MAX_FRAME_LEN: usize = 4096;

/// Sending half of one WebSocket.
pub trait WsSender {
    fn send_text(&mut self, text: &str) -> Result<(), WriteError>;
    fn send_close(&mut self);
}

// ── Session table ────────────────────────────────────────────

/// Fixed table mapping httpd session descriptors to client ids.
pub struct SocketTable<S> {
    slots: [Option<(i32, S)>; SOCKET_SLOTS],
}

impl<S> SocketTable<S> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Claim the lowest free slot for `session`.
    pub fn attach(&mut self, session: i32, sender: S) -> Option<ClientId> {
        let idx = self.slots.iter().position(Option::is_none)?;
        self.slots[idx] = Some((session, sender));
        Some(idx as ClientId)
    }

    /// Release the slot held by `session`.
    pub fn detach(&mut self, session: i32) -> Option<ClientId> {
        let id = self.id_of(session)?;
        self.slots[id as usize] = None;
        Some(id)
    }

    pub fn id_of(&self, session: i32) -> Option<ClientId> {
        self.slots
            .iter()
            .position(|s| matches!(s, Some((fd, _)) if *fd == session))
            .map(|idx| idx as ClientId)
    }

    pub fn sender_mut(&mut self, client_id: ClientId) -> Option<&mut S> {
        self.slots
            .get_mut(client_id as usize)?
            .as_mut()
            .map(|(_, s)| s)
    }

    /// Release a slot by client id, returning its sender.
    pub fn remove(&mut self, client_id: ClientId) -> Option<S> {
        self.slots
            .get_mut(client_id as usize)?
            .take()
            .map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> Default for SocketTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Shared handle ────────────────────────────────────────────

/// Session table shared between the httpd callbacks and the I/O task.
pub struct SharedSockets<S>(Arc<Mutex<SocketTable<S>>>);

impl<S> Clone for SharedSockets<S> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<S> Default for SharedSockets<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SharedSockets<S> {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(SocketTable::new())))
    }

    fn lock(&self) -> MutexGuard<'_, SocketTable<S>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A socket opened. `None` when every slot is taken.
    pub fn on_open(&self, session: i32, sender: S) -> Option<TransportEvent> {
        match self.lock().attach(session, sender) {
            Some(id) => {
                debug!("WS: session {} -> client {}", session, id);
                Some(TransportEvent::Connected(id))
            }
            None => {
                warn!("WS: no free socket slot for session {}", session);
                None
            }
        }
    }

    /// A socket closed. `None` when the slot was already released.
    pub fn on_close(&self, session: i32) -> Option<TransportEvent> {
        self.lock().detach(session).map(TransportEvent::Disconnected)
    }

    /// A text frame arrived.
    pub fn on_text(&self, session: i32, text: &str) -> Option<TransportEvent> {
        let client_id = self.lock().id_of(session)?;
        Some(TransportEvent::Text {
            client_id,
            text: text.to_string(),
        })
    }

    pub fn connected(&self) -> usize {
        self.lock().len()
    }
}

impl<S: WsSender> SocketWriter for SharedSockets<S> {
    fn write_text(&mut self, client_id: ClientId, text: &str) -> Result<(), WriteError> {
        match self.lock().sender_mut(client_id) {
            Some(sender) => sender.send_text(text),
            None => Err(WriteError::NotConnected),
        }
    }

    fn close(&mut self, client_id: ClientId) {
        let sender = self.lock().remove(client_id);
        if let Some(mut sender) = sender {
            sender.send_close();
        }
    }
}

// ── ESP-IDF server ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl WsSender for EspHttpWsDetachedSender {
    fn send_text(&mut self, text: &str) -> Result<(), WriteError> {
        self.send(FrameType::Text(false), text.as_bytes())
            .map_err(|_| WriteError::Io)
    }

    fn send_close(&mut self) {
        let _ = self.send(FrameType::Close, &[]);
    }
}

/// Start the HTTP server with the link WebSocket on `/`.
#[cfg(target_os = "espidf")]
pub fn start(
    port: u16,
    sockets: SharedSockets<EspHttpWsDetachedSender>,
) -> anyhow::Result<EspHttpServer<'static>> {
    use crate::transport::channels::publish;

    let mut server = EspHttpServer::new(&Configuration {
        http_port: port,
        ..Default::default()
    })?;

    server.ws_handler("/", move |ws| -> Result<(), esp_idf_svc::sys::EspError> {
        if ws.is_new() {
            let sender = ws.create_detached_sender()?;
            match sockets.on_open(ws.session(), sender) {
                Some(event) => {
                    publish(event);
                }
                None => ws.send(FrameType::Close, &[])?,
            }
            return Ok(());
        }

        if ws.is_closed() {
            if let Some(event) = sockets.on_close(ws.session()) {
                publish(event);
            }
            return Ok(());
        }

        let (frame_type, len) = ws.recv(&mut [])?;
        if len > MAX_FRAME_LEN {
            warn!("WS: session {} frame too large ({} bytes)", ws.session(), len);
            return Ok(());
        }
        let mut buf = vec![0u8; len];
        ws.recv(&mut buf)?;

        if let FrameType::Text(_) = frame_type {
            match core::str::from_utf8(&buf) {
                Ok(text) => {
                    if let Some(event) = sockets.on_text(ws.session(), text.trim_end_matches('\0'))
                    {
                        publish(event);
                    }
                }
                Err(_) => warn!("WS: session {} sent non-UTF-8 text", ws.session()),
            }
        }
        Ok(())
    })?;

    log::info!("WS: server listening on port {}", port);
    Ok(server)
}
