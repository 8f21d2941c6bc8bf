//! GPIO / peripheral pin assignments for the gate controller boards.
//!
//! Single source of truth: drivers reference this module rather than
//! hard-coding pin numbers.  Two board layouts are in the field; they
//! differ only in which pins carry the servo signal and enable line.

/// Pin numbers for one board layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinAssignment {
    /// LEDC PWM output to the servo signal wire.
    pub servo_pwm: i32,
    /// Digital output gating servo power (active HIGH).
    pub servo_enable: i32,
    /// Digital input from the end-stop / obstruction switch.
    /// Pulled up; reads LOW when tripped.
    pub limit_switch: i32,
}

// ---------------------------------------------------------------------------
// Board layouts
// ---------------------------------------------------------------------------

/// Compact carrier board (the layout most gates use).
pub const COMPACT_BOARD: PinAssignment = PinAssignment {
    servo_pwm: 4,
    servo_enable: 5,
    limit_switch: 6,
};

/// Full-size devkit carrier.
pub const DEVKIT_BOARD: PinAssignment = PinAssignment {
    servo_pwm: 2,
    servo_enable: 15,
    limit_switch: 13,
};

/// Layout the firmware image is built for.
pub const ACTIVE_BOARD: PinAssignment = COMPACT_BOARD;

// ---------------------------------------------------------------------------
// Servo PWM configuration
// ---------------------------------------------------------------------------

/// Hobby-servo frame rate.
pub const SERVO_PWM_FREQ_HZ: u32 = 50;
/// Frame period at 50 Hz.
pub const SERVO_PERIOD_US: u32 = 20_000;
/// Pulse width commanding raw position 0.
pub const SERVO_MIN_PULSE_US: u32 = 544;
/// Pulse width commanding raw position 180.
pub const SERVO_MAX_PULSE_US: u32 = 2_400;
/// Highest raw position the servo accepts.
pub const SERVO_MAX_POSITION: i32 = 180;
