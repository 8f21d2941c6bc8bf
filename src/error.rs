//! Unified error types for the gate controller firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's "log and continue" handling uniform.  All variants are
//! `Copy` so they pass through the controller and dispatcher without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An actuator or sensor I/O operation failed.
    Actuator(ActuatorError),
    /// A calibration sweep did not produce usable limits.
    Calibration(CalibrationError),
    /// A communication subsystem failed.
    Comms(CommsError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Calibration(e) => write!(f, "calibration: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// PWM duty-cycle write failed.
    PwmWriteFailed,
    /// Enable-line GPIO set failed.
    GpioWriteFailed,
    /// Limit-switch GPIO read failed.
    GpioReadFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::GpioReadFailed => write!(f, "GPIO read failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Calibration errors
// ---------------------------------------------------------------------------

/// Direction of a calibration sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDirection {
    TowardOpen,
    TowardClosed,
}

impl fmt::Display for SweepDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TowardOpen => write!(f, "open"),
            Self::TowardClosed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// This variant has no limit sensor to calibrate against.
    NoSensor,
    /// The sweep hit its bound or step budget before the sensor tripped.
    SensorNeverTripped(SweepDirection),
    /// Both sweeps stopped at the same raw position.
    DegenerateLimits,
    /// Actuator I/O failed mid-sweep.
    Actuator(ActuatorError),
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSensor => write!(f, "no limit sensor fitted"),
            Self::SensorNeverTripped(dir) => {
                write!(f, "sensor never tripped sweeping toward {dir}")
            }
            Self::DegenerateLimits => write!(f, "open and closed extremes coincide"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
        }
    }
}

impl From<ActuatorError> for CalibrationError {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

impl From<CalibrationError> for Error {
    fn from(e: CalibrationError) -> Self {
        Self::Calibration(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    MqttPublishFailed,
    MqttSubscribeFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MqttPublishFailed => write!(f, "MQTT publish failed"),
            Self::MqttSubscribeFailed => write!(f, "MQTT subscribe failed"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
