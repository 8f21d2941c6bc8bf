//! Limit discovery by sweeping into the end stops.
//!
//! ```text
//!   current ──▶ neutral ──sweep▶ open stop ──▶ neutral ──sweep▶ closed stop
//! ```
//!
//! Each sweep steps toward a provisional bound beyond the usable range
//! with the switch checked after every step.  The position the motion
//! layer backs off to after a trip becomes that extreme.  A sweep that
//! reaches its bound (or runs out of steps) without a trip means the
//! switch is missing or broken, and the previous limits stay in force.

use log::{info, warn};

use super::limits::TravelLimits;
use crate::app::ports::ActuatorPort;
use crate::config::GateConfig;
use crate::drivers::motion::{StepOutcome, StepProfile, move_stepped, with_power};
use crate::error::{CalibrationError, SweepDirection};

#[derive(Debug, Clone, Copy)]
pub struct CalibrationEngine {
    profile: StepProfile,
    open_bound: i32,
    closed_bound: i32,
    max_steps: u32,
}

impl CalibrationEngine {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            profile: StepProfile {
                step_size: config.step_size,
                step_delay_ms: config.step_delay_ms,
                settle_delay_ms: config.settle_delay_ms,
            },
            open_bound: config.sweep_open_bound,
            closed_bound: config.sweep_closed_bound,
            max_steps: config.calibration_max_steps,
        }
    }

    /// Sweep both extremes.  On success the actuator rests at the new
    /// closed extreme; on a sweep failure it is returned to the neutral
    /// middle of `current`.
    pub fn run<A: ActuatorPort + ?Sized>(
        &self,
        act: &mut A,
        current: &TravelLimits,
    ) -> Result<TravelLimits, CalibrationError> {
        if !act.has_sensor() {
            return Err(CalibrationError::NoSensor);
        }
        let neutral = current.middle();
        info!("calibration: starting from neutral {neutral}");

        with_power(act, |act| {
            move_stepped(act, neutral, &self.profile, false, None)?;

            let open = match self.sweep(act, self.open_bound, SweepDirection::TowardOpen) {
                Ok(v) => v,
                Err(e) => return self.abort(act, neutral, e),
            };
            info!("calibration: open extreme {open}");

            move_stepped(act, neutral, &self.profile, false, None)?;

            let closed = match self.sweep(act, self.closed_bound, SweepDirection::TowardClosed) {
                Ok(v) => v,
                Err(e) => return self.abort(act, neutral, e),
            };
            info!("calibration: closed extreme {closed}");

            match TravelLimits::new(open, closed) {
                Some(limits) => Ok(limits),
                None => self.abort(act, neutral, CalibrationError::DegenerateLimits),
            }
        })
    }

    fn sweep<A: ActuatorPort + ?Sized>(
        &self,
        act: &mut A,
        bound: i32,
        direction: SweepDirection,
    ) -> Result<i32, CalibrationError> {
        match move_stepped(act, bound, &self.profile, true, Some(self.max_steps))? {
            StepOutcome::Obstructed { stopped_at, .. } => Ok(stopped_at),
            StepOutcome::Reached | StepOutcome::BudgetExhausted { .. } => {
                Err(CalibrationError::SensorNeverTripped(direction))
            }
        }
    }

    fn abort<A: ActuatorPort + ?Sized>(
        &self,
        act: &mut A,
        neutral: i32,
        err: CalibrationError,
    ) -> Result<TravelLimits, CalibrationError> {
        warn!("calibration failed: {err}");
        move_stepped(act, neutral, &self.profile, false, None)?;
        Err(err)
    }
}
