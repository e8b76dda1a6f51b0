//! Command-group sequencer: one sub-command at a time, strictly in order.
//!
//! Sub-command encodings:
//!
//! | Form              | Opcode             | Parameters                      |
//! |-------------------|--------------------|---------------------------------|
//! | `"<op><params>"`  | first byte         | remaining bytes, NUL-terminated |
//! | `"b64:<payload>"` | first decoded byte | remaining bytes, see [`ParamEncoding`] |
//!
//! A sub-command that fails to decode is skipped in place: the cursor moves
//! on and the next entry is tried in the same pass, without recording a
//! result.  The skip is a loop, so a group made entirely of bad entries
//! simply exhausts.
//!
//! An abandoned sub-command keeps the command slot until the interpreter
//! answers it or [`DRAIN_TIMEOUT_MS`] passes.  The stale reply is discarded
//! so it can never be collected as the next task's result.
//!
//! [`ParamEncoding`]: crate::app::commands::ParamEncoding

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use log::{debug, warn};
use std::sync::Arc;

use super::slot::{CommandSlot, SlotLease};
use super::task::Task;
use crate::app::commands::{CommandSource, DeviceCommand};
use crate::app::events::LinkEvent;
use crate::app::ports::{CommandInterpreter, EventSink};
use crate::error::DecodeError;

/// Marker for base64-encoded binary sub-commands.
pub const B64_PREFIX: &str = "b64:";

/// How long an abandoned sub-command may hold the slot awaiting its reply.
pub const DRAIN_TIMEOUT_MS: u64 = 5_000;

/// Standard alphabet; trailing `=` padding optional.
const B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode one raw sub-command string.
pub fn decode_sub_command(raw: &str) -> Result<DeviceCommand, DecodeError> {
    if let Some(payload) = raw.strip_prefix(B64_PREFIX) {
        if payload.is_empty() {
            return Err(DecodeError::EmptyPayload);
        }
        let bytes = B64
            .decode(payload)
            .map_err(|_| DecodeError::InvalidBase64)?;
        let (&opcode, params) = bytes.split_first().ok_or(DecodeError::EmptyPayload)?;
        return Ok(DeviceCommand::decoded(opcode, params, CommandSource::Web));
    }

    let (&opcode, params) = raw
        .as_bytes()
        .split_first()
        .ok_or(DecodeError::EmptyPayload)?;
    Ok(DeviceCommand::text(opcode, params, CommandSource::Web))
}

/// Result of trying to move a task forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The sub-command at `index` is now executing.
    Dispatched { index: usize },
    /// Another source holds the command slot; retry on a later tick.
    WaitingForSlot,
    /// No sub-commands remain.
    Exhausted,
}

/// Slot held on behalf of an abandoned sub-command.
struct Drain {
    _lease: SlotLease,
    deadline_ms: u64,
}

/// Drives one task's command group through the interpreter.
pub struct CommandGroupSequencer {
    slot: Arc<CommandSlot>,
    lease: Option<SlotLease>,
    drain: Option<Drain>,
}

impl CommandGroupSequencer {
    pub fn new(slot: Arc<CommandSlot>) -> Self {
        Self {
            slot,
            lease: None,
            drain: None,
        }
    }

    /// `true` while a dispatched sub-command awaits its result.
    pub fn in_flight(&self) -> bool {
        self.lease.is_some()
    }

    /// `true` while the reply of an abandoned sub-command is awaited.
    pub fn is_draining(&self) -> bool {
        self.drain.is_some()
    }

    /// Dispatch the sub-command under the cursor, skipping undecodable ones.
    pub fn advance(
        &mut self,
        task: &mut Task,
        interpreter: &mut impl CommandInterpreter,
        sink: &mut impl EventSink,
    ) -> Advance {
        if self.lease.is_some() {
            return Advance::Dispatched {
                index: task.current_index,
            };
        }

        loop {
            let index = task.current_index;
            let Some(raw) = task.current_command() else {
                return Advance::Exhausted;
            };

            match decode_sub_command(raw) {
                Ok(cmd) => {
                    let lease = match self.slot.try_acquire(CommandSource::Web) {
                        Ok(lease) => lease,
                        Err(busy) => {
                            debug!(
                                "Sched[{}]: command slot held by {:?}, waiting",
                                task.id(),
                                busy.holder
                            );
                            return Advance::WaitingForSlot;
                        }
                    };
                    debug!(
                        "Sched[{}]: dispatch #{} opcode='{}' ({} param bytes)",
                        task.id(),
                        index,
                        cmd.opcode as char,
                        cmd.params.len()
                    );
                    interpreter.dispatch(&cmd);
                    self.lease = Some(lease);
                    sink.emit(&LinkEvent::SubCommandDispatched {
                        task_id: task.id().clone(),
                        index,
                    });
                    return Advance::Dispatched { index };
                }
                Err(error) => {
                    warn!(
                        "Sched[{}]: sub-command #{} skipped ({})",
                        task.id(),
                        index,
                        error
                    );
                    sink.emit(&LinkEvent::SubCommandSkipped {
                        task_id: task.id().clone(),
                        index,
                        error,
                    });
                    task.current_index += 1;
                }
            }
        }
    }

    /// Record the in-flight result if the interpreter has one.
    ///
    /// Returns `true` when a result was appended and the cursor moved.
    pub fn collect(&mut self, task: &mut Task, interpreter: &mut impl CommandInterpreter) -> bool {
        if self.lease.is_none() {
            return false;
        }
        let Some(result) = interpreter.take_response() else {
            return false;
        };
        task.results.push(result);
        task.current_index += 1;
        self.lease = None;
        true
    }

    /// Abandon the in-flight sub-command.
    ///
    /// If its reply is not already waiting, the slot stays held until
    /// [`poll_drain`](Self::poll_drain) sees the reply or the deadline passes.
    pub fn abort(&mut self, now_ms: u64, interpreter: &mut impl CommandInterpreter) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        if let Some(stale) = interpreter.take_response() {
            debug!("Sched: discarded reply '{}' of abandoned sub-command", stale);
            return;
        }
        self.drain = Some(Drain {
            _lease: lease,
            deadline_ms: now_ms.saturating_add(DRAIN_TIMEOUT_MS),
        });
    }

    /// Swallow the reply of an abandoned sub-command.
    ///
    /// Returns `true` once nothing is left to drain.
    pub fn poll_drain(&mut self, now_ms: u64, interpreter: &mut impl CommandInterpreter) -> bool {
        let Some(deadline_ms) = self.drain.as_ref().map(|d| d.deadline_ms) else {
            return true;
        };
        if let Some(stale) = interpreter.take_response() {
            debug!("Sched: discarded late reply '{}'", stale);
        } else if now_ms <= deadline_ms {
            return false;
        } else {
            warn!(
                "Sched: abandoned sub-command silent for {}ms, releasing slot",
                DRAIN_TIMEOUT_MS
            );
        }
        self.drain = None;
        true
    }
}
