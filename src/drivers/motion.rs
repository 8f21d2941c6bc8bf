//! Motion primitives built on [`ActuatorPort`].
//!
//! Two ways of getting the servo somewhere:
//!
//! - [`move_direct`]: one write, then wait for the servo to settle.
//! - [`move_stepped`]: walk toward the target `step_size` units at a time,
//!   optionally sampling the limit switch after each step.  A trip backs
//!   the servo off by one step and ends the move.
//!
//! Power sequencing is separate ([`with_power`]) so a compound move
//! (approach point, then final approach) keeps the enable line high
//! throughout.

use log::warn;

use crate::app::ports::ActuatorPort;
use crate::error::ActuatorError;

/// Timing and increment for stepped motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepProfile {
    pub step_size: i32,
    pub step_delay_ms: u32,
    pub settle_delay_ms: u32,
}

/// How a stepped move ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The target was written.
    Reached,
    /// The switch tripped; the servo was backed off to `stopped_at`.
    /// `still_blocked` is the switch state after the back-off settled.
    Obstructed { stopped_at: i32, still_blocked: bool },
    /// The step budget ran out before the target.
    BudgetExhausted { stopped_at: i32 },
}

/// Run `f` with servo power on, and switch it off again afterwards even
/// when `f` fails.
pub fn with_power<A, T, E>(act: &mut A, f: impl FnOnce(&mut A) -> Result<T, E>) -> Result<T, E>
where
    A: ActuatorPort + ?Sized,
    E: From<ActuatorError>,
{
    act.set_power(true)?;
    let result = f(act);
    let off = act.set_power(false);
    let value = result?;
    off?;
    Ok(value)
}

/// Write `raw` in one go and wait `settle_ms`.
pub fn move_direct<A: ActuatorPort + ?Sized>(
    act: &mut A,
    raw: i32,
    settle_ms: u32,
) -> Result<(), ActuatorError> {
    act.write_position(raw)?;
    act.pause_ms(settle_ms);
    Ok(())
}

/// Step from the current position to `target`.
///
/// With `check` set the switch is sampled after every step.  `budget`
/// caps the number of steps taken.  When the physical position is not
/// known yet there is nothing to step from, so the target is written
/// directly.
pub fn move_stepped<A: ActuatorPort + ?Sized>(
    act: &mut A,
    target: i32,
    profile: &StepProfile,
    check: bool,
    budget: Option<u32>,
) -> Result<StepOutcome, ActuatorError> {
    let Some(mut current) = act.position() else {
        move_direct(act, target, profile.settle_delay_ms)?;
        return Ok(StepOutcome::Reached);
    };

    let step = profile.step_size.max(1);
    let mut taken = 0u32;

    while current != target {
        if budget.is_some_and(|b| taken >= b) {
            return Ok(StepOutcome::BudgetExhausted {
                stopped_at: current,
            });
        }

        let next = current + (target - current).clamp(-step, step);
        act.write_position(next)?;
        act.pause_ms(profile.step_delay_ms);
        taken += 1;

        if check && act.obstructed()? {
            act.write_position(current)?;
            act.pause_ms(profile.settle_delay_ms);
            let still_blocked = act.obstructed()?;
            if still_blocked {
                warn!("limit switch still tripped after backing off to {current}");
            }
            return Ok(StepOutcome::Obstructed {
                stopped_at: current,
                still_blocked,
            });
        }

        current = next;
    }

    Ok(StepOutcome::Reached)
}
