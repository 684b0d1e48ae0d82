//! Snuffelaar sensor node library.
//!
//! Exposes the node core and its adapters for integration testing.  All
//! ESP-IDF-specific code is guarded by
//! `#[cfg(all(target_os = "espidf", feature = "espidf"))]` within each
//! module; any other build, ESP targets without the feature included,
//! gets the host simulation.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pins;
pub mod publisher;
pub mod scheduler;
pub mod topic;

// Each of these carries a host simulation next to its ESP-IDF
// implementation, selected by cfg inside the module.
pub mod adapters;
pub mod drivers;
pub mod sensors;
