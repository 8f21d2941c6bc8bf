//! Gate actuator: servo PWM plus optional enable line and limit switch.
//!
//! Implements [`ActuatorPort`] so the position controller and calibration
//! engine can drive it without knowing which pins are fitted.  Variants
//! without an enable line or a switch pass [`NoPin`] in those slots.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use embedded_hal::pwm::SetDutyCycle;

use super::limit_switch::LimitSwitch;
use super::servo::ServoPwm;
use crate::app::ports::ActuatorPort;
use crate::error::ActuatorError;
use crate::pins::SERVO_MAX_POSITION;

/// Placeholder for a pin the board variant does not fit.
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

impl InputPin for NoPin {
    // Reads as the idle (untripped) level.
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(true)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(false)
    }
}

pub struct GateActuator<S, E, L, D> {
    servo: ServoPwm<S>,
    enable: Option<E>,
    switch: Option<LimitSwitch<L>>,
    delay: D,
    position: Option<i32>,
}

impl<S, E, L, D> GateActuator<S, E, L, D>
where
    S: SetDutyCycle,
    E: OutputPin,
    L: InputPin,
    D: DelayNs,
{
    pub fn new(
        servo: ServoPwm<S>,
        enable: Option<E>,
        switch: Option<LimitSwitch<L>>,
        delay: D,
    ) -> Self {
        Self {
            servo,
            enable,
            switch,
            delay,
            position: None,
        }
    }
}

impl<S, E, L, D> ActuatorPort for GateActuator<S, E, L, D>
where
    S: SetDutyCycle,
    E: OutputPin,
    L: InputPin,
    D: DelayNs,
{
    fn position(&self) -> Option<i32> {
        self.position
    }

    fn write_position(&mut self, raw: i32) -> Result<(), ActuatorError> {
        let raw = raw.clamp(0, SERVO_MAX_POSITION);
        self.servo.set_position(raw)?;
        self.position = Some(raw);
        Ok(())
    }

    fn set_power(&mut self, on: bool) -> Result<(), ActuatorError> {
        let Some(pin) = self.enable.as_mut() else {
            return Ok(());
        };
        let res = if on { pin.set_high() } else { pin.set_low() };
        res.map_err(|_| ActuatorError::GpioWriteFailed)
    }

    fn has_sensor(&self) -> bool {
        self.switch.is_some()
    }

    fn obstructed(&mut self) -> Result<bool, ActuatorError> {
        match self.switch.as_mut() {
            Some(sw) => sw.is_tripped(),
            None => Ok(false),
        }
    }

    fn pause_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
