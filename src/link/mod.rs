//! Remote task link: client admission, liveness and single-flight execution.
//!
//! ```text
//!  ┌──────────────┐   ┌──────────────┐   ┌───────────────────────────┐
//!  │ ClientRegistry│◀──│  Heartbeat   │   │       TaskScheduler        │
//!  │  (≤ N slots)  │   │   Monitor    │   │  TaskTable · watchdog      │
//!  └──────────────┘   └──────────────┘   │  ┌──────────────────────┐  │
//!                                        │  │ CommandGroupSequencer │──┼──▶ CommandSlot ──▶ interpreter
//!                                        │  └──────────────────────┘  │
//!                                        └───────────────────────────┘
//! ```
//!
//! Everything in here is driven from one tick and holds no locks, apart
//! from the [`slot::CommandSlot`] shared with other local command sources.

pub mod heartbeat;
pub mod registry;
pub mod scheduler;
pub mod sequencer;
pub mod slot;
pub mod task;
