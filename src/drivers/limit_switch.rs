//! End-stop / obstruction switch.
//!
//! Idle-high with pull-up: the input reads LOW while the gate presses the
//! switch or something blocks its path.  A trip is only reported when
//! `samples` consecutive reads are LOW, which filters contact bounce and
//! servo-noise glitches during stepped motion.

use embedded_hal::digital::InputPin;

use crate::error::ActuatorError;

pub struct LimitSwitch<P> {
    pin: P,
    samples: u8,
}

impl<P: InputPin> LimitSwitch<P> {
    pub fn new(pin: P, samples: u8) -> Self {
        Self {
            pin,
            samples: samples.max(1),
        }
    }

    /// `true` when every one of `samples` reads is LOW.
    pub fn is_tripped(&mut self) -> Result<bool, ActuatorError> {
        for _ in 0..self.samples {
            if self.pin.is_high().map_err(|_| ActuatorError::GpioReadFailed)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
