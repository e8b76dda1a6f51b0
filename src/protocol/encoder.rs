//! Response encoder: renders outbound messages as JSON text frames.
//!
//! Pure and stateless.  `results` is present only on `completed`, `error`
//! only on `error`.

use log::warn;
use serde::Serialize;

use crate::link::registry::ClientId;
use crate::link::scheduler::TaskUpdate;
use crate::link::task::TaskStatus;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage<'a> {
    Connected {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    Heartbeat {
        timestamp: u64,
    },
    Response {
        #[serde(rename = "taskId")]
        task_id: &'a str,
        status: TaskStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        results: Option<&'a [String]>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<&'a str>,
    },
    Error {
        error: &'a str,
    },
}

impl OutboundMessage<'_> {
    /// Serialise to a text frame. `None` (with a warning) on failure.
    pub fn encode(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Encode: failed to serialise {:?}: {}", self, e);
                None
            }
        }
    }
}

pub fn connected(client_id: ClientId) -> Option<String> {
    OutboundMessage::Connected {
        client_id: client_id.to_string(),
    }
    .encode()
}

pub fn heartbeat_ack(now_ms: u64) -> Option<String> {
    OutboundMessage::Heartbeat { timestamp: now_ms }.encode()
}

/// Task status transition.
pub fn task_update(update: &TaskUpdate) -> Option<String> {
    let results = match update.status {
        TaskStatus::Completed => Some(update.results.as_deref().unwrap_or(&[])),
        _ => None,
    };
    let error = match update.status {
        TaskStatus::Error => Some(update.error.as_deref().unwrap_or("unknown error")),
        _ => None,
    };
    OutboundMessage::Response {
        task_id: update.task_id.as_str(),
        status: update.status,
        results,
        error,
    }
    .encode()
}

/// A `response` in `error` state for a task that never started.
pub fn task_rejected(task_id: &str, reason: &str) -> Option<String> {
    OutboundMessage::Response {
        task_id,
        status: TaskStatus::Error,
        results: None,
        error: Some(reason),
    }
    .encode()
}

pub fn error(message: &str) -> Option<String> {
    OutboundMessage::Error { error: message }.encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::task::TaskId;
    use serde_json::{Value, json};

    fn parse(text: Option<String>) -> Value {
        serde_json::from_str(&text.unwrap()).unwrap()
    }

    fn update(status: TaskStatus) -> TaskUpdate {
        TaskUpdate {
            client_id: 0,
            task_id: TaskId::new("42_7"),
            status,
            results: None,
            error: None,
        }
    }

    #[test]
    fn connected_carries_string_id() {
        assert_eq!(
            parse(connected(1)),
            json!({"type": "connected", "clientId": "1"})
        );
    }

    #[test]
    fn heartbeat_echoes_timestamp() {
        assert_eq!(
            parse(heartbeat_ack(123_456)),
            json!({"type": "heartbeat", "timestamp": 123_456})
        );
    }

    #[test]
    fn running_has_no_results_or_error() {
        assert_eq!(
            parse(task_update(&update(TaskStatus::Running))),
            json!({"type": "response", "taskId": "42_7", "status": "running"})
        );
    }

    #[test]
    fn completed_always_has_results() {
        assert_eq!(
            parse(task_update(&update(TaskStatus::Completed))),
            json!({"type": "response", "taskId": "42_7", "status": "completed", "results": []})
        );

        let mut u = update(TaskStatus::Completed);
        u.results = Some(vec!["a".into(), "b".into()]);
        assert_eq!(parse(task_update(&u))["results"], json!(["a", "b"]));
    }

    #[test]
    fn error_carries_reason_only() {
        let mut u = update(TaskStatus::Error);
        u.error = Some("execution timeout".into());
        u.results = Some(vec!["ignored".into()]);
        assert_eq!(
            parse(task_update(&u)),
            json!({"type": "response", "taskId": "42_7", "status": "error", "error": "execution timeout"})
        );
    }

    #[test]
    fn rejection_and_plain_error() {
        assert_eq!(
            parse(task_rejected("b", "Previous task is still running"))["status"],
            "error"
        );
        assert_eq!(
            parse(error("Max clients reached")),
            json!({"type": "error", "error": "Max clients reached"})
        );
    }
}
