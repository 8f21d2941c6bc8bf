//! Mock hardware adapters for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real GPIO/PWM registers.

use std::collections::HashMap;

use gatectl::app::events::AppEvent;
use gatectl::app::ports::{ActuatorPort, EventSink, StorageError, StoragePort};
use gatectl::error::ActuatorError;

// ── MockActuator ──────────────────────────────────────────────

/// Limit switch that reads tripped at or beyond either end stop.
#[derive(Debug, Clone, Copy)]
pub struct EndStops {
    /// Tripped when the servo is at or above this.
    pub open_at: i32,
    /// Tripped when the servo is at or below this.
    pub closed_at: i32,
}

pub struct MockActuator {
    pub position: Option<i32>,
    pub writes: Vec<i32>,
    pub power: Vec<bool>,
    pub paused_ms: u32,
    pub stops: Option<EndStops>,
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl MockActuator {
    /// No switch fitted.
    pub fn new() -> Self {
        Self {
            position: None,
            writes: Vec::new(),
            power: Vec::new(),
            paused_ms: 0,
            stops: None,
            fail_writes: false,
        }
    }

    pub fn with_stops(open_at: i32, closed_at: i32) -> Self {
        Self {
            stops: Some(EndStops { open_at, closed_at }),
            ..Self::new()
        }
    }

    /// A switch is fitted but never closes.
    pub fn with_dead_switch() -> Self {
        Self::with_stops(i32::MAX, i32::MIN)
    }

    pub fn at(mut self, raw: i32) -> Self {
        self.position = Some(raw);
        self
    }

    pub fn last_write(&self) -> Option<i32> {
        self.writes.last().copied()
    }

    pub fn powered(&self) -> bool {
        self.power.last().copied().unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.writes.clear();
        self.power.clear();
        self.paused_ms = 0;
    }
}

impl Default for MockActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorPort for MockActuator {
    fn position(&self) -> Option<i32> {
        self.position
    }

    fn write_position(&mut self, raw: i32) -> Result<(), ActuatorError> {
        if self.fail_writes {
            return Err(ActuatorError::PwmWriteFailed);
        }
        let raw = raw.clamp(0, 180);
        self.writes.push(raw);
        self.position = Some(raw);
        Ok(())
    }

    fn set_power(&mut self, on: bool) -> Result<(), ActuatorError> {
        self.power.push(on);
        Ok(())
    }

    fn has_sensor(&self) -> bool {
        self.stops.is_some()
    }

    fn obstructed(&mut self) -> Result<bool, ActuatorError> {
        Ok(match (self.stops, self.position) {
            (Some(s), Some(p)) => p >= s.open_at || p <= s.closed_at,
            _ => false,
        })
    }

    fn pause_ms(&mut self, ms: u32) {
        self.paused_ms += ms;
    }
}

// ── MockNvs ───────────────────────────────────────────────────

pub struct MockNvs {
    pub store: HashMap<String, Vec<u8>>,
    pub fail_writes: bool,
    pub fail_reads: bool,
    pub writes: u32,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self {
            store: HashMap::new(),
            fail_writes: false,
            fail_reads: false,
            writes: 0,
        }
    }

    /// Overwrite a stored blob directly, bypassing the settings codec.
    pub fn poke(&mut self, namespace: &str, key: &str, data: &[u8]) {
        self.store.insert(format!("{}::{}", namespace, key), data.to_vec());
    }

    pub fn peek(&self, namespace: &str, key: &str) -> Option<&[u8]> {
        self.store
            .get(&format!("{}::{}", namespace, key))
            .map(Vec::as_slice)
    }
}

impl Default for MockNvs {
    fn default() -> Self {
        Self::new()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        if self.fail_reads {
            return Err(StorageError::IoError);
        }
        match self.store.get(&format!("{}::{}", namespace, key)) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Full);
        }
        self.writes += 1;
        self.store.insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{}::{}", namespace, key))
    }
}

// ── RecordingSink ─────────────────────────────────────────────

/// Keeps a copy of every emitted event.
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// `(verb, payload)` for every event that would leave the device.
    pub fn published(&self) -> Vec<(&'static str, String)> {
        self.events
            .iter()
            .filter_map(|e| e.topic_verb().map(|v| (v, e.payload().to_string())))
            .collect()
    }

    pub fn verbs(&self) -> Vec<&'static str> {
        self.events.iter().filter_map(AppEvent::topic_verb).collect()
    }

    pub fn logs(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Log(line) => Some(line.to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.verbs().iter().filter(|v| **v == verb).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
