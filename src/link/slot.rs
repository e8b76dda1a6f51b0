//! Single-slot command channel shared by every local command source.
//!
//! The interpreter executes one command at a time.  WebSocket tasks, the
//! voice module and the serial console all feed it, so each must hold the
//! slot while a command is in flight.  Acquisition is scoped: a
//! [`SlotLease`] frees the slot when dropped, so a failed or timed-out task
//! can never leave it occupied.
//!
//! ```text
//!   Web task ─┐
//!   Voice ────┼──▶ CommandSlot (atomic owner) ──▶ interpreter
//!   Serial ───┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::app::commands::CommandSource;

const FREE: u8 = 0;

/// The slot is held by another source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotBusy {
    pub holder: CommandSource,
}

/// Shared ownership marker for the interpreter's single command slot.
#[derive(Debug)]
pub struct CommandSlot {
    owner: AtomicU8,
}

impl CommandSlot {
    pub const fn new() -> Self {
        Self {
            owner: AtomicU8::new(FREE),
        }
    }

    /// Claim the slot for `source`, or report who holds it.
    pub fn try_acquire(self: &Arc<Self>, source: CommandSource) -> Result<SlotLease, SlotBusy> {
        match self
            .owner
            .compare_exchange(FREE, source as u8, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(SlotLease {
                slot: Arc::clone(self),
                source,
            }),
            Err(current) => Err(SlotBusy {
                holder: source_from_u8(current).unwrap_or(source),
            }),
        }
    }

    /// Current holder, if any.
    pub fn owner(&self) -> Option<CommandSource> {
        source_from_u8(self.owner.load(Ordering::Acquire))
    }

    pub fn is_free(&self) -> bool {
        self.owner.load(Ordering::Acquire) == FREE
    }
}

impl Default for CommandSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped claim on the [`CommandSlot`]; releases it on drop.
#[derive(Debug)]
#[must_use = "dropping the lease releases the command slot immediately"]
pub struct SlotLease {
    slot: Arc<CommandSlot>,
    source: CommandSource,
}

impl SlotLease {
    pub fn source(&self) -> CommandSource {
        self.source
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.slot.owner.store(FREE, Ordering::Release);
    }
}

fn source_from_u8(raw: u8) -> Option<CommandSource> {
    match raw {
        1 => Some(CommandSource::Web),
        2 => Some(CommandSource::Voice),
        3 => Some(CommandSource::Serial),
        _ => None,
    }
}
