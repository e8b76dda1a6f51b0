//! Fuzz target: `parse_inbound`
//!
//! Drives arbitrary text frames into the inbound message parser and asserts
//! that it never panics and that every accepted command carries a usable
//! task id.
//!
//! cargo fuzz run fuzz_message_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use robolink::protocol::{InboundMessage, parse_inbound};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok(InboundMessage::Command { task_id: Some(id), .. }) = parse_inbound(text) {
        assert!(!id.is_empty(), "empty taskId must be treated as absent");
    }
});
