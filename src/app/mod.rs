//! Application core: node lifecycle and orchestration, zero I/O.
//!
//! [`service::NodeService`] is the explicit context object that owns the
//! sensor registry, publisher and poll scheduler.  All interaction with
//! the network, the broker and the clock happens through **port traits**
//! defined in [`ports`], keeping this layer fully testable without real
//! peripherals.

pub mod events;
pub mod ports;
pub mod service;
