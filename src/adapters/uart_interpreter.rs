//! UART command interpreter adapter.
//!
//! The motion interpreter runs on a separate controller behind a UART.
//! A dispatched [`DeviceCommand`] is written as opcode, parameter bytes and
//! terminator; the interpreter answers with one newline-terminated line,
//! which becomes the sub-command's result.
//!
//! Reads are non-blocking: [`take_response`](CommandInterpreter::take_response)
//! drains whatever bytes have arrived and returns a line once one is
//! complete.  Bytes already waiting when a command is dispatched belong to
//! an earlier command and are discarded.

use log::{debug, warn};

use crate::app::commands::DeviceCommand;
use crate::app::ports::CommandInterpreter;

#[cfg(target_os = "espidf")]
use esp_idf_hal::uart::UartDriver;

/// Longest response line kept; longer lines are truncated.
pub const MAX_LINE_LEN: usize = 512;

/// Byte-level serial link.
pub trait SerialLink {
    fn write_all(&mut self, bytes: &[u8]) -> bool;

    /// Read what is available without blocking; returns the count.
    fn read_available(&mut self, buf: &mut [u8]) -> usize;
}

#[cfg(target_os = "espidf")]
impl SerialLink for UartDriver<'_> {
    fn write_all(&mut self, bytes: &[u8]) -> bool {
        let mut offset = 0;
        while offset < bytes.len() {
            match self.write(&bytes[offset..]) {
                Ok(0) | Err(_) => return false,
                Ok(n) => offset += n,
            }
        }
        true
    }

    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        self.read(buf, esp_idf_hal::delay::NON_BLOCK).unwrap_or(0)
    }
}

// ── Line assembly ────────────────────────────────────────────

/// Accumulates bytes into newline-terminated lines.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8>,
    overflow: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes; returns the first completed line, if any.
    ///
    /// Bytes after the newline stay buffered for the next line.
    pub fn feed(&mut self, bytes: &[u8]) -> Option<String> {
        let mut rest = bytes;
        while let Some((&b, tail)) = rest.split_first() {
            rest = tail;
            if b == b'\n' {
                let line = self.finish();
                self.feed_remaining(rest);
                return Some(line);
            }
            if self.buf.len() < MAX_LINE_LEN {
                self.buf.push(b);
            } else {
                self.overflow = true;
            }
        }
        None
    }

    fn feed_remaining(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.buf.len() < MAX_LINE_LEN {
                self.buf.push(b);
            }
        }
    }

    fn finish(&mut self) -> String {
        if self.overflow {
            warn!("UART: response line truncated to {} bytes", MAX_LINE_LEN);
            self.overflow = false;
        }
        let line = String::from_utf8_lossy(&self.buf)
            .trim_end_matches('\r')
            .to_string();
        self.buf.clear();
        line
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.overflow = false;
    }
}

// ── Interpreter ──────────────────────────────────────────────

pub struct UartInterpreter<L: SerialLink> {
    link: L,
    line: LineAssembler,
    pending: Option<String>,
}

impl<L: SerialLink> UartInterpreter<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            line: LineAssembler::new(),
            pending: None,
        }
    }

    /// Drain the UART into the line buffer.
    fn poll(&mut self) {
        let mut chunk = [0u8; 64];
        while self.pending.is_none() {
            let n = self.link.read_available(&mut chunk);
            if n == 0 {
                break;
            }
            self.pending = self.line.feed(&chunk[..n]);
        }
    }

    /// Discard everything received so far.
    fn flush_rx(&mut self) {
        let mut chunk = [0u8; 64];
        let mut dropped = self.line.buf.len();
        loop {
            let n = self.link.read_available(&mut chunk);
            if n == 0 {
                break;
            }
            dropped += n;
        }
        if dropped > 0 || self.pending.is_some() {
            debug!("UART: dropped {} stale bytes before dispatch", dropped);
        }
        self.line.clear();
        self.pending = None;
    }
}

impl<L: SerialLink> CommandInterpreter for UartInterpreter<L> {
    fn dispatch(&mut self, cmd: &DeviceCommand) {
        self.flush_rx();
        let wire = cmd.to_wire();
        debug!(
            "UART: -> '{}' ({} bytes, {:?})",
            cmd.opcode as char,
            wire.len(),
            cmd.source
        );
        if !self.link.write_all(&wire) {
            warn!("UART: write failed for opcode '{}'", cmd.opcode as char);
        }
    }

    fn take_response(&mut self) -> Option<String> {
        self.poll();
        self.pending.take()
    }
}
