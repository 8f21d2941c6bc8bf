//! Application core: pure domain logic, zero I/O.
//!
//! Command parsing, acknowledgement and telemetry policy, the inbound
//! mailbox, and connection retry.  All interaction with hardware and the
//! network happens through **port traits** defined in [`ports`], keeping
//! this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod mailbox;
pub mod ports;
pub mod reconnect;
pub mod service;
