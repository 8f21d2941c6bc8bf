//! System configuration parameters
//!
//! All tunable parameters for one gate controller build.  The deployed
//! variants differ only in the values held here: movement strategy,
//! presence of the enable line and limit switch, and whether moves are
//! refused until the gate has been calibrated.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::pins::SERVO_MAX_POSITION;

/// Maximum gate identity length (characters, excluding the record NUL).
pub const GATE_ID_MAX_LEN: usize = 10;

/// Bounded gate identity string.
pub type GateId = heapless::String<GATE_ID_MAX_LEN>;

/// How the actuator is driven from its current position to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementStrategy {
    /// Write the final position in one call, then wait for the servo to settle.
    Direct,
    /// Walk the position in fixed increments, sampling the limit sensor
    /// on the final approach.
    Stepped,
}

/// Core gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    // --- Identity & persisted defaults ---
    /// Identity used when the settings store holds no valid record.
    pub default_gate_id: GateId,
    /// Raw open position used before calibration / first flash.
    pub default_open_position: i32,
    /// Raw closed position used before calibration / first flash.
    pub default_closed_position: i32,
    /// Settings record version tag.  Changing it invalidates stored records.
    pub settings_version: heapless::String<16>,

    // --- Hardware variant ---
    pub movement: MovementStrategy,
    /// Servo power is switched through an enable line.
    pub has_enable_line: bool,
    /// An end-stop / obstruction switch is fitted.
    pub has_limit_switch: bool,
    /// Refuse moves until limits are trustworthy.
    pub requires_calibration: bool,

    // --- Motion ---
    /// Wait after a direct write or a back-off (milliseconds).
    pub settle_delay_ms: u32,
    /// Raw units per stepped-motion increment.
    pub step_size: i32,
    /// Wait after each stepped-motion increment (milliseconds).
    pub step_delay_ms: u32,
    /// Distance short of a limit where the checked final approach begins.
    pub approach_offset: i32,
    /// Consecutive LOW samples needed to treat the switch as tripped.
    pub sensor_debounce_samples: u8,

    // --- Calibration ---
    /// Provisional beyond-range target for the open sweep.
    pub sweep_open_bound: i32,
    /// Provisional beyond-range target for the closed sweep.
    pub sweep_closed_bound: i32,
    /// Step budget per sweep.
    pub calibration_max_steps: u32,

    // --- Boot ---
    /// Drive the gate closed right after boot.
    pub close_on_boot: bool,

    // --- Messaging ---
    /// Prepended to every topic verb (`/gatecmd/<id>`).
    pub topic_prefix: heapless::String<8>,

    // --- Timing ---
    /// Heartbeat report interval (milliseconds)
    pub heartbeat_interval_ms: u32,
    /// Fixed pause between connection attempts (milliseconds)
    pub reconnect_backoff_ms: u32,
    /// Minimum spacing between firmware update checks (milliseconds)
    pub update_check_interval_ms: u32,
    /// Pause after servicing the broker each loop iteration (milliseconds)
    pub loop_pause_ms: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::direct_drive()
    }
}

impl GateConfig {
    /// Servo behind an enable line, no switch, moved with a single write.
    pub fn direct_drive() -> Self {
        Self {
            // Identity & defaults
            default_gate_id: bounded("11"),
            default_open_position: 110,
            default_closed_position: 20,
            settings_version: bounded("2025-03-05-01"),

            // Variant
            movement: MovementStrategy::Direct,
            has_enable_line: true,
            has_limit_switch: false,
            requires_calibration: false,

            // Motion
            settle_delay_ms: 1000,
            step_size: 2,
            step_delay_ms: 15,
            approach_offset: 10,
            sensor_debounce_samples: 2,

            // Calibration
            sweep_open_bound: SERVO_MAX_POSITION,
            sweep_closed_bound: 0,
            calibration_max_steps: 120,

            // Boot
            close_on_boot: true,

            // Messaging
            topic_prefix: bounded("/"),

            // Timing
            heartbeat_interval_ms: 3000,
            reconnect_backoff_ms: 1000,
            update_check_interval_ms: 5000,
            loop_pause_ms: 10,
        }
    }

    /// Stepped motion with a limit switch; moves wait for calibration.
    pub fn limit_switch() -> Self {
        Self {
            movement: MovementStrategy::Stepped,
            has_limit_switch: true,
            requires_calibration: true,
            settle_delay_ms: 300,
            ..Self::direct_drive()
        }
    }

    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), Error> {
        let in_range = |p: i32| (0..=SERVO_MAX_POSITION).contains(&p);

        if !is_valid_gate_id(&self.default_gate_id) {
            return Err(Error::Config(
                "default_gate_id must be printable ASCII without '/', '+', '#'",
            ));
        }
        if self.settings_version.is_empty() || self.settings_version.contains('\0') {
            return Err(Error::Config("settings_version must be non-empty, no NUL"));
        }
        if !in_range(self.default_open_position) || !in_range(self.default_closed_position) {
            return Err(Error::Config("default positions must be 0–180"));
        }
        if self.default_open_position == self.default_closed_position {
            return Err(Error::Config(
                "default_open_position must differ from default_closed_position",
            ));
        }
        if !(1..=20).contains(&self.step_size) {
            return Err(Error::Config("step_size must be 1–20"));
        }
        if !(0..=90).contains(&self.approach_offset) {
            return Err(Error::Config("approach_offset must be 0–90"));
        }
        if self.sensor_debounce_samples == 0 {
            return Err(Error::Config("sensor_debounce_samples must be at least 1"));
        }
        if !in_range(self.sweep_open_bound) || !in_range(self.sweep_closed_bound) {
            return Err(Error::Config("sweep bounds must be 0–180"));
        }
        if self.sweep_open_bound == self.sweep_closed_bound {
            return Err(Error::Config("sweep bounds must differ"));
        }
        if self.calibration_max_steps == 0 {
            return Err(Error::Config("calibration_max_steps must be at least 1"));
        }
        if self.requires_calibration && !self.has_limit_switch {
            return Err(Error::Config(
                "requires_calibration needs a limit switch to calibrate against",
            ));
        }
        if !(100..=60_000).contains(&self.heartbeat_interval_ms) {
            return Err(Error::Config("heartbeat_interval_ms must be 100–60000"));
        }
        if self.reconnect_backoff_ms == 0 {
            return Err(Error::Config("reconnect_backoff_ms must be non-zero"));
        }
        Ok(())
    }
}

/// Broker, WiFi, and update-server endpoints baked in at build time.
#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    pub wifi_ssid: &'static str,
    pub wifi_password: &'static str,
    /// e.g. `mqtt://192.168.1.10:1883`
    pub broker_url: &'static str,
    /// Base URL; the gate identity is appended as the last path segment.
    pub update_url: &'static str,
}

impl NetworkConfig {
    pub const fn from_build_env() -> Self {
        Self {
            wifi_ssid: match option_env!("GATE_WIFI_SSID") {
                Some(s) => s,
                None => "",
            },
            wifi_password: match option_env!("GATE_WIFI_PASS") {
                Some(s) => s,
                None => "",
            },
            broker_url: match option_env!("GATE_MQTT_URL") {
                Some(s) => s,
                None => "mqtt://192.168.1.10:1883",
            },
            update_url: match option_env!("GATE_OTA_URL") {
                Some(s) => s,
                None => "http://192.168.1.10:8266/firmware",
            },
        }
    }
}

/// Gate identities become topic segments, so broker wildcards and the
/// level separator are excluded.
pub fn is_valid_gate_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= GATE_ID_MAX_LEN && crate::adapters::utils::is_topic_segment(id)
}

/// Copy `s` into a bounded string, truncating at capacity.
pub fn bounded<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
