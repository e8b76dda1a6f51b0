//! JSON wire protocol spoken over the WebSocket.
//!
//! | Direction | `type`      | Fields                                   |
//! |-----------|-------------|------------------------------------------|
//! | in        | `heartbeat` |                                          |
//! | in        | `command`   | `taskId`?, `commands: [string]`          |
//! | out       | `connected` | `clientId`                               |
//! | out       | `heartbeat` | `timestamp`                              |
//! | out       | `response`  | `taskId`, `status`, `results`?, `error`? |
//! | out       | `error`     | `error`                                  |

pub mod encoder;
pub mod message;

pub use encoder::OutboundMessage;
pub use message::{InboundMessage, parse_inbound};
