//! Outbound application events.
//!
//! The [`GateService`](super::service::GateService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, publish to the broker
//! under [`AppEvent::topic_verb`], or both.

use core::fmt::Write;

use serde::Serialize;

use super::commands::Verb;
use crate::config::GateId;
use crate::fsm::{GatePosition, Target};

/// Rendered payload for one event.
pub type Payload = heapless::String<128>;

/// Diagnostic line mirrored to the broker log topic.
pub type LogLine = heapless::String<96>;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The service has started (carries the identity in use).
    Started(GateId),

    /// Periodic status snapshot.
    Heartbeat(TelemetryData),

    /// A move command was accepted (moved or already there).
    GateAck(Target),

    /// A limit was changed; echoes the verb that changed it.
    LimitsAck(Verb),

    /// Settings were written on request.
    FlashAck,

    /// Calibration finished; `true` on success.
    CalibrateAck(bool),

    /// Diagnostic text for operators watching the broker.
    Log(LogLine),
}

impl AppEvent {
    /// Build a [`AppEvent::Log`] from format arguments, truncating long lines.
    pub fn log(args: core::fmt::Arguments<'_>) -> Self {
        let mut line = LogLine::new();
        let _ = Truncating(&mut line).write_fmt(args);
        Self::Log(line)
    }

    /// Outbound topic verb; `None` for events that stay on the device.
    pub fn topic_verb(&self) -> Option<&'static str> {
        match self {
            Self::Started(_) => None,
            Self::Heartbeat(_) => Some("heartbeat"),
            Self::GateAck(_) => Some("gateack"),
            Self::LimitsAck(_) => Some("limitsack"),
            Self::FlashAck => Some("flashack"),
            Self::CalibrateAck(_) => Some("calibrateack"),
            Self::Log(_) => Some("gatelog"),
        }
    }

    pub fn payload(&self) -> Payload {
        let mut out = Payload::new();
        match self {
            Self::Started(id) => {
                let _ = out.push_str(id);
            }
            Self::Heartbeat(t) => t.write_json(&mut out),
            Self::GateAck(target) => {
                let _ = out.push_str(target.as_str());
            }
            Self::LimitsAck(verb) => {
                let _ = out.push_str(verb.as_str());
            }
            Self::FlashAck => {
                let _ = out.push_str("done");
            }
            Self::CalibrateAck(ok) => {
                let _ = out.push_str(if *ok { "ok" } else { "failed" });
            }
            Self::Log(line) => {
                let _ = out.push_str(line);
            }
        }
        out
    }
}

/// Writes as much as fits, then silently drops the rest.
struct Truncating<'a, const N: usize>(&'a mut heapless::String<N>);

impl<const N: usize> Write for Truncating<'_, N> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// A point-in-time status snapshot, serialized as the heartbeat body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryData {
    pub gate_pos: GatePosition,
    pub open_pos: i32,
    pub closed_pos: i32,
    pub calibrated: bool,
}

impl TelemetryData {
    fn write_json(&self, out: &mut Payload) {
        match serde_json::to_string(self) {
            Ok(json) => {
                let _ = out.push_str(&json);
            }
            Err(e) => log::error!("heartbeat serialization failed: {e}"),
        }
    }
}
