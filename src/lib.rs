//! Gate controller firmware library.
//!
//! Exposes the pure-logic modules for integration testing and host-side
//! simulation. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod pins;
pub mod scheduler;
pub mod settings;
