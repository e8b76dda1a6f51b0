//! Single-flight task scheduler.
//!
//! At most one task runs at any instant.  The running task is tracked by a
//! single `Option<TaskId>`; "a task is active" and "which task is active"
//! can therefore never disagree.
//!
//! ```text
//!   submit ──▶ idle? ──no──▶ Err(TaskAlreadyActive)   (active task untouched)
//!                │
//!               yes
//!                ▼
//!            running ──tick──▶ collect result ──▶ dispatch next ──▶ …
//!                │                                     │
//!                │  watchdog / owner lost              ▼ exhausted
//!                ▼                                  completed
//!              error
//!                │
//!                └──▶ idle ──▶ promote earliest pending (if any)
//! ```
//!
//! The scheduler never touches the transport.  Every status change that the
//! owning client must hear about is queued as a [`TaskUpdate`] and handed
//! out by [`TaskScheduler::drain_updates`].

use log::{error, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;

use super::registry::ClientId;
use super::sequencer::{Advance, CommandGroupSequencer};
use super::slot::CommandSlot;
use super::task::{Task, TaskId, TaskStatus, TaskTable};
use crate::app::events::LinkEvent;
use crate::app::ports::{CommandInterpreter, EventSink};
use crate::error::{AdmissionError, TaskFailure};

/// Status change destined for a task's owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskUpdate {
    pub client_id: ClientId,
    pub task_id: TaskId,
    pub status: TaskStatus,
    /// Present on `completed` (possibly empty).
    pub results: Option<Vec<String>>,
    /// Present on `error`.
    pub error: Option<String>,
}

pub struct TaskScheduler {
    tasks: TaskTable,
    current: Option<TaskId>,
    sequencer: CommandGroupSequencer,
    execution_timeout_ms: u64,
    updates: VecDeque<TaskUpdate>,
}

impl TaskScheduler {
    pub fn new(slot: Arc<CommandSlot>, execution_timeout_ms: u64) -> Self {
        Self {
            tasks: TaskTable::new(),
            current: None,
            sequencer: CommandGroupSequencer::new(slot),
            execution_timeout_ms,
            updates: VecDeque::new(),
        }
    }

    /// `true` while a task is running.
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// `true` while the reply of an aborted sub-command still holds the slot.
    pub fn is_draining(&self) -> bool {
        self.sequencer.is_draining()
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.current.as_ref().and_then(|id| self.tasks.get(id))
    }

    pub fn tasks(&self) -> &TaskTable {
        &self.tasks
    }

    /// Admit a task and start it immediately.
    ///
    /// Rejected without side effects while another task is running, or when
    /// a task with the same id is already tracked.
    pub fn submit(
        &mut self,
        task: Task,
        now_ms: u64,
        interpreter: &mut impl CommandInterpreter,
        sink: &mut impl EventSink,
    ) -> Result<TaskId, AdmissionError> {
        if self.current.is_some() || self.tasks.contains(task.id()) {
            warn!(
                "Sched: task {} from client {} rejected, another task is active",
                task.id(),
                task.client_id()
            );
            sink.emit(&LinkEvent::TaskRejected {
                task_id: task.id().clone(),
                client_id: task.client_id(),
            });
            return Err(AdmissionError::TaskAlreadyActive);
        }

        let id = task.id().clone();
        self.tasks.insert(task);
        self.start(&id, now_ms, interpreter, sink);
        self.promote_pending(now_ms, interpreter, sink);
        Ok(id)
    }

    /// Collect results, dispatch the next sub-command, enforce the ceiling.
    pub fn tick(
        &mut self,
        now_ms: u64,
        interpreter: &mut impl CommandInterpreter,
        sink: &mut impl EventSink,
    ) {
        self.sequencer.poll_drain(now_ms, interpreter);
        self.drive(now_ms, interpreter, sink);

        let overdue = self
            .current_task()
            .and_then(|t| t.running_for_ms(now_ms))
            .is_some_and(|elapsed| elapsed > self.execution_timeout_ms);
        if overdue {
            if let Some(id) = self.current.clone() {
                error!(
                    "Sched: task {} exceeded {}ms, aborting",
                    id, self.execution_timeout_ms
                );
                self.finish(&id, Err(TaskFailure::ExecutionTimeout), now_ms, interpreter, sink);
            }
        }

        self.promote_pending(now_ms, interpreter, sink);
    }

    /// Drop everything owned by a departed client.
    ///
    /// The running task, if the client owned it, ends in `error` with
    /// `failure`.  Its pending tasks are discarded silently.  Returns `true`
    /// when the running task was failed.
    pub fn fail_client(
        &mut self,
        client_id: ClientId,
        failure: TaskFailure,
        now_ms: u64,
        interpreter: &mut impl CommandInterpreter,
        sink: &mut impl EventSink,
    ) -> bool {
        let owned = self
            .current_task()
            .filter(|t| t.client_id() == client_id)
            .map(|t| t.id().clone());

        if let Some(id) = &owned {
            warn!("Sched: task {} failed, {}", id, failure);
            self.finish(id, Err(failure), now_ms, interpreter, sink);
        }

        let orphans: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|t| t.client_id() == client_id && t.status() == TaskStatus::Pending)
            .map(|t| t.id().clone())
            .collect();
        for id in &orphans {
            self.tasks.remove(id);
        }

        self.promote_pending(now_ms, interpreter, sink);
        owned.is_some()
    }

    /// Hand every queued update to `f`, oldest first.
    pub fn drain_updates(&mut self, mut f: impl FnMut(TaskUpdate)) {
        while let Some(update) = self.updates.pop_front() {
            f(update);
        }
    }

    // ── Internals ────────────────────────────────────────────

    fn start(
        &mut self,
        id: &TaskId,
        now_ms: u64,
        interpreter: &mut impl CommandInterpreter,
        sink: &mut impl EventSink,
    ) {
        let Some(task) = self.tasks.get_mut(id) else {
            return;
        };
        task.status = TaskStatus::Running;
        task.start_ms = Some(now_ms);
        let client_id = task.client_id();
        self.current = Some(id.clone());

        info!(
            "Sched: task {} started for client {} ({} sub-commands)",
            id,
            client_id,
            task.command_group().len()
        );
        self.updates.push_back(TaskUpdate {
            client_id,
            task_id: id.clone(),
            status: TaskStatus::Running,
            results: None,
            error: None,
        });
        sink.emit(&LinkEvent::TaskStarted {
            task_id: id.clone(),
            client_id,
        });

        self.drive(now_ms, interpreter, sink);
    }

    fn drive(
        &mut self,
        now_ms: u64,
        interpreter: &mut impl CommandInterpreter,
        sink: &mut impl EventSink,
    ) {
        let Some(id) = self.current.clone() else {
            return;
        };
        let Some(task) = self.tasks.get_mut(&id) else {
            self.current = None;
            return;
        };

        if self.sequencer.in_flight() && !self.sequencer.collect(task, interpreter) {
            return;
        }
        if !self.sequencer.poll_drain(now_ms, interpreter) {
            return;
        }

        if self.sequencer.advance(task, interpreter, sink) == Advance::Exhausted {
            self.finish(&id, Ok(()), now_ms, interpreter, sink);
        }
    }

    /// Move the task to a terminal state, report it and release the slot.
    fn finish(
        &mut self,
        id: &TaskId,
        outcome: Result<(), TaskFailure>,
        now_ms: u64,
        interpreter: &mut impl CommandInterpreter,
        sink: &mut impl EventSink,
    ) {
        self.sequencer.abort(now_ms, interpreter);
        if self.current.as_ref() == Some(id) {
            self.current = None;
        }
        let Some(mut task) = self.tasks.remove(id) else {
            return;
        };
        task.end_ms = Some(now_ms);

        let update = match outcome {
            Ok(()) => {
                task.status = TaskStatus::Completed;
                info!(
                    "Sched: task {} completed ({} results)",
                    id,
                    task.results.len()
                );
                sink.emit(&LinkEvent::TaskCompleted {
                    task_id: id.clone(),
                    results: task.results.len(),
                });
                TaskUpdate {
                    client_id: task.client_id(),
                    task_id: id.clone(),
                    status: TaskStatus::Completed,
                    results: Some(core::mem::take(&mut task.results)),
                    error: None,
                }
            }
            Err(reason) => {
                task.status = TaskStatus::Error;
                sink.emit(&LinkEvent::TaskFailed {
                    task_id: id.clone(),
                    reason,
                });
                TaskUpdate {
                    client_id: task.client_id(),
                    task_id: id.clone(),
                    status: TaskStatus::Error,
                    results: None,
                    error: Some(reason.to_string()),
                }
            }
        };
        self.updates.push_back(update);
    }

    /// Start pending tasks in submission order until one stays running.
    fn promote_pending(
        &mut self,
        now_ms: u64,
        interpreter: &mut impl CommandInterpreter,
        sink: &mut impl EventSink,
    ) {
        while self.current.is_none() {
            let Some(next) = self.tasks.first_pending() else {
                break;
            };
            self.start(&next, now_ms, interpreter, sink);
        }
    }
}
