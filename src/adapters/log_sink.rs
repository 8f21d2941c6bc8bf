//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every application event to the
//! ESP-IDF logger (UART / USB-CDC in production).  The firmware pairs it
//! with the MQTT sink so operators see the same lines on serial and on
//! the broker.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Heartbeat(t) => {
                info!(
                    "HEARTBEAT | pos={} | open={} closed={} | calibrated={}",
                    t.gate_pos.as_str(),
                    t.open_pos,
                    t.closed_pos,
                    t.calibrated
                );
            }
            AppEvent::GateAck(target) => info!("ACK | gate {}", target.as_str()),
            AppEvent::LimitsAck(verb) => info!("ACK | limits {}", verb.as_str()),
            AppEvent::FlashAck => info!("ACK | flash done"),
            AppEvent::CalibrateAck(true) => info!("ACK | calibrate ok"),
            AppEvent::CalibrateAck(false) => warn!("ACK | calibrate failed"),
            AppEvent::Log(line) => warn!("GATELOG | {line}"),
            AppEvent::Started(id) => info!("START | gate {id}"),
        }
    }
}
