//! RoboLink firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod link;
pub mod pins;
pub mod protocol;
pub mod transport;

// The ESP-only adapters compile on the host too; their hardware paths are
// guarded by cfg attributes inside.
pub mod adapters;
