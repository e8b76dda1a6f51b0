//! Inbound message parsing.
//!
//! The frame is parsed into a generic JSON value first so that an unknown
//! `type` and a malformed `command` body are reported separately.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ProtocolError;

/// A well-formed client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Heartbeat,
    Command {
        /// Client-chosen identity; `None` when absent or empty.
        task_id: Option<String>,
        commands: Vec<String>,
    },
}

#[derive(Deserialize)]
struct CommandBody {
    #[serde(rename = "taskId", default)]
    task_id: Option<String>,
    commands: Vec<String>,
}

/// Parse one text frame.
pub fn parse_inbound(text: &str) -> Result<InboundMessage, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(|_| ProtocolError::InvalidJson)?;

    match value.get("type").and_then(Value::as_str) {
        Some("heartbeat") => Ok(InboundMessage::Heartbeat),
        Some("command") => {
            let body = CommandBody::deserialize(&value)
                .map_err(|_| ProtocolError::MalformedCommand)?;
            Ok(InboundMessage::Command {
                task_id: body.task_id.filter(|id| !id.is_empty()),
                commands: body.commands,
            })
        }
        _ => Err(ProtocolError::UnsupportedType),
    }
}
