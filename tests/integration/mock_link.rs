//! Mock adapters for link integration tests.
//!
//! Records every frame, dispatch and event so tests can assert on the full
//! history without sockets or a UART.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use robolink::adapters::uart_interpreter::SerialLink;
use robolink::app::commands::DeviceCommand;
use robolink::app::events::LinkEvent;
use robolink::app::ports::{CommandInterpreter, EventSink, LinkTransport, RadioPort};
use robolink::link::registry::ClientId;
use serde_json::Value;

// ── RecordingTransport ────────────────────────────────────────

#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Vec<(ClientId, String)>,
    pub closed: Vec<ClientId>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every frame sent to `client_id`, parsed.
    pub fn messages_for(&self, client_id: ClientId) -> Vec<Value> {
        self.sent
            .iter()
            .filter(|(id, _)| *id == client_id)
            .map(|(_, text)| serde_json::from_str(text).expect("frames are JSON"))
            .collect()
    }

    pub fn last_for(&self, client_id: ClientId) -> Option<Value> {
        self.messages_for(client_id).pop()
    }

    /// `response` frames for `task_id`, in order.
    pub fn responses(&self, task_id: &str) -> Vec<Value> {
        self.sent
            .iter()
            .map(|(_, text)| serde_json::from_str::<Value>(text).expect("frames are JSON"))
            .filter(|v| v["type"] == "response" && v["taskId"] == task_id)
            .collect()
    }
}

impl LinkTransport for RecordingTransport {
    fn send_text(&mut self, client_id: ClientId, text: &str) {
        self.sent.push((client_id, text.to_string()));
    }

    fn close(&mut self, client_id: ClientId) {
        self.closed.push(client_id);
    }
}

// ── EchoInterpreter ───────────────────────────────────────────

/// Answers each dispatch with `r<n>`, `n` counting dispatches from zero.
///
/// With `hold` set, responses are withheld until it is cleared.
#[derive(Default)]
pub struct EchoInterpreter {
    pub dispatched: Vec<DeviceCommand>,
    pub hold: bool,
    outstanding: bool,
}

#[allow(dead_code)]
impl EchoInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holding() -> Self {
        Self {
            hold: true,
            ..Self::default()
        }
    }
}

impl CommandInterpreter for EchoInterpreter {
    fn dispatch(&mut self, cmd: &DeviceCommand) {
        self.dispatched.push(cmd.clone());
        self.outstanding = true;
    }

    fn take_response(&mut self) -> Option<String> {
        if self.hold || !self.outstanding {
            return None;
        }
        self.outstanding = false;
        Some(format!("r{}", self.dispatched.len() - 1))
    }
}

// ── SharedSerial ──────────────────────────────────────────────

/// Serial line whose far end is driven by the test.
///
/// Clones share both directions, so a test can keep one handle while the
/// `UartInterpreter` owns another.
#[derive(Clone, Default)]
pub struct SharedSerial {
    writes: Rc<RefCell<Vec<Vec<u8>>>>,
    rx: Rc<RefCell<VecDeque<u8>>>,
}

#[allow(dead_code)]
impl SharedSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes arriving from the controller.
    pub fn deliver(&self, bytes: &[u8]) {
        self.rx.borrow_mut().extend(bytes);
    }

    /// One entry per written frame.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.writes.borrow().clone()
    }
}

impl SerialLink for SharedSerial {
    fn write_all(&mut self, bytes: &[u8]) -> bool {
        self.writes.borrow_mut().push(bytes.to_vec());
        true
    }

    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        let mut rx = self.rx.borrow_mut();
        let n = rx.len().min(buf.len());
        for (dst, src) in buf.iter_mut().zip(rx.drain(..n)) {
            *dst = src;
        }
        n
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<LinkEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&LinkEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &LinkEvent) {
        self.events.push(event.clone());
    }
}

// ── ManualRadio ───────────────────────────────────────────────

#[derive(Default)]
pub struct ManualRadio {
    pub busy: bool,
}

impl RadioPort for ManualRadio {
    fn is_busy(&self) -> bool {
        self.busy
    }
}
