//! Hobby-servo PWM driver.
//!
//! Converts a raw position (0–180, the same scale the servo library on the
//! first-generation gates used) into a pulse width and writes it as a duty
//! fraction of the 20 ms frame.
//!
//! ## Dual-target design
//!
//! Generic over [`SetDutyCycle`]: on ESP-IDF this wraps an `LedcDriver`;
//! host tests pass a recording mock.

use embedded_hal::pwm::SetDutyCycle;

use crate::error::ActuatorError;
use crate::pins::{SERVO_MAX_POSITION, SERVO_MAX_PULSE_US, SERVO_MIN_PULSE_US, SERVO_PERIOD_US};

pub struct ServoPwm<P> {
    pwm: P,
}

impl<P: SetDutyCycle> ServoPwm<P> {
    pub fn new(pwm: P) -> Self {
        Self { pwm }
    }

    /// Command the servo to `raw`, clamped to the servo's range.
    pub fn set_position(&mut self, raw: i32) -> Result<(), ActuatorError> {
        let pulse = pulse_width_us(raw);
        self.pwm
            .set_duty_cycle_fraction(pulse as u16, SERVO_PERIOD_US as u16)
            .map_err(|_| ActuatorError::PwmWriteFailed)
    }

    /// Stop driving pulses (servo stops holding position).
    pub fn release(&mut self) -> Result<(), ActuatorError> {
        self.pwm
            .set_duty_cycle_fully_off()
            .map_err(|_| ActuatorError::PwmWriteFailed)
    }
}

/// Pulse width for a raw position, linear between the min and max pulse.
pub fn pulse_width_us(raw: i32) -> u32 {
    let raw = raw.clamp(0, SERVO_MAX_POSITION) as u32;
    SERVO_MIN_PULSE_US + raw * (SERVO_MAX_PULSE_US - SERVO_MIN_PULSE_US) / SERVO_MAX_POSITION as u32
}
