//! Task model: one client-submitted command group and its lifecycle.
//!
//! ```text
//!   pending ──▶ running ──┬──▶ completed
//!                         └──▶ error
//! ```
//!
//! `completed` and `error` are terminal: the task is reported to its owner
//! and removed from the [`TaskTable`].

use core::fmt;
use serde::Serialize;

use super::registry::ClientId;

// ── Identity ─────────────────────────────────────────────────

/// Opaque task identity: client-supplied, or `"<millis>_<rand>"`.
///
/// Server-generated ids are collision-improbable, not guaranteed unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a server-side id from the uptime and a random suffix.
    pub fn generate(now_ms: u64) -> Self {
        Self(format!("{}_{}", now_ms, random_u32() % 1000))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Status ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl TaskStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

// ── Task ─────────────────────────────────────────────────────

/// A command group owned by one client.
///
/// Invariants: `current_index <= command_group.len()` and
/// `results.len() <= current_index` (skipped sub-commands add no result).
#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    client_id: ClientId,
    pub(super) status: TaskStatus,
    command_group: Vec<String>,
    pub(super) results: Vec<String>,
    pub(super) current_index: usize,
    timestamp_ms: u64,
    pub(super) start_ms: Option<u64>,
    pub(super) end_ms: Option<u64>,
}

impl Task {
    pub fn new(id: TaskId, client_id: ClientId, commands: Vec<String>, now_ms: u64) -> Self {
        Self {
            id,
            client_id,
            status: TaskStatus::Pending,
            command_group: commands,
            results: Vec::new(),
            current_index: 0,
            timestamp_ms: now_ms,
            start_ms: None,
            end_ms: None,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn command_group(&self) -> &[String] {
        &self.command_group
    }

    pub fn results(&self) -> &[String] {
        &self.results
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn start_ms(&self) -> Option<u64> {
        self.start_ms
    }

    pub fn end_ms(&self) -> Option<u64> {
        self.end_ms
    }

    /// `true` once the cursor has passed the last sub-command.
    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.command_group.len()
    }

    /// The sub-command under the cursor.
    pub fn current_command(&self) -> Option<&str> {
        self.command_group
            .get(self.current_index)
            .map(String::as_str)
    }

    /// Milliseconds spent in `running` so far.
    pub fn running_for_ms(&self, now_ms: u64) -> Option<u64> {
        match (self.status, self.start_ms) {
            (TaskStatus::Running, Some(start)) => Some(now_ms.saturating_sub(start)),
            _ => None,
        }
    }
}

// ── Table ────────────────────────────────────────────────────

/// Insertion-ordered task table.
///
/// Ordering is submission order, so the next-pending scan is FIFO.
#[derive(Debug, Default)]
pub struct TaskTable {
    tasks: Vec<Task>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Store a task. Refuses a duplicate id.
    pub fn insert(&mut self, task: Task) -> bool {
        if self.contains(task.id()) {
            return false;
        }
        self.tasks.push(task);
        true
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.iter().any(|t| &t.id == id)
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let idx = self.tasks.iter().position(|t| &t.id == id)?;
        Some(self.tasks.remove(idx))
    }

    /// Earliest-submitted task still `pending`.
    pub fn first_pending(&self) -> Option<TaskId> {
        self.tasks
            .iter()
            .find(|t| t.status == TaskStatus::Pending)
            .map(|t| t.id.clone())
    }

    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

// ── Platform randomness (non-cryptographic) ──────────────────

#[cfg(target_os = "espidf")]
fn random_u32() -> u32 {
    // SAFETY: esp_random reads the hardware RNG register; no preconditions.
    unsafe { esp_idf_svc::sys::esp_random() }
}

#[cfg(not(target_os = "espidf"))]
fn random_u32() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    RandomState::new().build_hasher().finish() as u32
}
