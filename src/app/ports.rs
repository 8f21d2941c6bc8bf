//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ GateService (domain)
//! ```
//!
//! Driven adapters (actuator, event sinks, storage, network links) implement
//! these traits.  The [`GateService`](super::service::GateService) consumes
//! them via generics, so the domain core never touches hardware directly.
//!
//! ## Durability notes
//!
//! - **StoragePort** writes MUST be all-or-nothing: the full value is staged
//!   and then committed in one step, so a power cut never leaves a torn
//!   settings record.

use crate::error::ActuatorError;

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → servo + limit switch)
// ───────────────────────────────────────────────────────────────

/// Primitive operations on the gate actuator.
///
/// Motion algorithms (direct write, stepped approach) are built on top of
/// these in [`crate::drivers::motion`].
pub trait ActuatorPort {
    /// Last commanded raw position; `None` before the first write.
    fn position(&self) -> Option<i32>;

    /// Command the servo to `raw`.
    fn write_position(&mut self, raw: i32) -> Result<(), ActuatorError>;

    /// Switch servo power.  A no-op when no enable line is fitted.
    fn set_power(&mut self, on: bool) -> Result<(), ActuatorError>;

    /// Whether a limit / obstruction switch is fitted.
    fn has_sensor(&self) -> bool;

    /// Debounced switch state; `false` when no switch is fitted.
    fn obstructed(&mut self) -> Result<bool, ActuatorError>;

    /// Block for `ms` milliseconds while the servo catches up.
    fn pause_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → broker / logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, MQTT).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &super::events::AppEvent) {
        (**self).emit(event);
    }
}

/// Fan one event out to two sinks.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic; no partial writes on power loss.
///   The ESP-IDF NVS API guarantees this with a single `nvs_commit()`;
///   in-memory simulation achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Connectivity port (driven adapter: WiFi station, broker session)
// ───────────────────────────────────────────────────────────────

/// A link that must be up before the control loop can talk to the broker.
pub trait ConnectivityPort {
    /// Make one connection attempt.  Returns `Ok` once the link is up.
    fn connect(&mut self) -> Result<(), ConnectivityError>;

    fn is_connected(&self) -> bool;

    /// Short label for log lines ("wifi", "mqtt").
    fn name(&self) -> &'static str;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond tick since boot.  Wraps at `u32::MAX`; callers
/// compare with `wrapping_sub`.
pub trait ClockPort {
    fn now_ms(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Firmware update port
// ───────────────────────────────────────────────────────────────

/// Pulls a firmware image for this gate from the update server.
pub trait UpdatePort {
    fn check_for_update(&mut self, gate_id: &str) -> UpdateOutcome;
}

/// Result of one update check.  Reported via logs only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Server has nothing newer for this gate.
    NoUpdate,
    /// A new image was written and marked bootable.
    Updated,
    /// The check or download failed; the error code is adapter-specific.
    Failed(i32),
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

/// Errors from [`ConnectivityPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    /// No SSID / broker URL configured.
    NoCredentials,
    /// The attempt was made and failed.
    ConnectionFailed,
    /// A lower layer (e.g. WiFi under MQTT) is not up yet.
    NotReady,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no credentials configured"),
            Self::ConnectionFailed => write!(f, "connection failed"),
            Self::NotReady => write!(f, "underlying link not ready"),
        }
    }
}

impl core::error::Error for StorageError {}

impl core::error::Error for ConnectivityError {}
