//! Application core: pure domain logic, zero I/O.
//!
//! This module wires the remote task link together: client admission,
//! heartbeat liveness, single-flight task scheduling and response
//! encoding.  All interaction with sockets, the command interpreter and
//! the radio happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
