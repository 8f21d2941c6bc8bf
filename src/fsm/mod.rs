//! Gate position controller.
//!
//! Decides how to get the actuator from where it is to where it has been
//! asked to be:
//!
//! ```text
//!              request(target)
//!                    │
//!   ┌────────────────┼───────────────────────────────┐
//!   │ needs calibration and not calibrated? ──▶ NotCalibrated
//!   │ already at target, servo settled there? ──▶ AlreadyThere
//!   │ otherwise drive (Direct | Stepped) ──▶ Moved { raw, outcome }
//!   └────────────────────────────────────────────────┘
//! ```
//!
//! The controller owns the actuator, the travel limits, the calibration
//! flag and the logical position.  Persisting limits and reporting are
//! the service layer's job.

pub mod calibration;
pub mod limits;

use log::{info, warn};
use serde::Serialize;

use crate::app::ports::ActuatorPort;
use crate::config::{GateConfig, MovementStrategy};
use crate::drivers::motion::{StepOutcome, StepProfile, move_direct, move_stepped, with_power};
use crate::error::{ActuatorError, CalibrationError};
use crate::pins::SERVO_MAX_POSITION;
use calibration::CalibrationEngine;
use limits::TravelLimits;

// ---------------------------------------------------------------------------
// Positions and targets
// ---------------------------------------------------------------------------

/// Logical gate position as last commanded.  Never persisted; a reboot
/// starts from `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePosition {
    #[default]
    Unknown,
    Open,
    #[serde(rename = "close")]
    Closed,
    Middle,
}

impl GatePosition {
    /// Wire name used in heartbeats.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Open => "open",
            Self::Closed => "close",
            Self::Middle => "middle",
        }
    }
}

/// A position a move command may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Open,
    Close,
    Middle,
}

impl Target {
    pub fn from_payload(payload: &str) -> Option<Self> {
        match payload {
            "open" => Some(Self::Open),
            "close" => Some(Self::Close),
            "middle" => Some(Self::Middle),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Middle => "middle",
        }
    }
}

impl From<Target> for GatePosition {
    fn from(t: Target) -> Self {
        match t {
            Target::Open => Self::Open,
            Target::Close => Self::Closed,
            Target::Middle => Self::Middle,
        }
    }
}

/// Which extreme a limit-set command changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Open,
    Closed,
}

impl LimitKind {
    /// Where the gate goes after this limit changes.
    pub fn target(self) -> Target {
        match self {
            Self::Open => Target::Open,
            Self::Closed => Target::Close,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    /// The actuator was driven.  `raw` is where it was sent; `outcome`
    /// says whether it got there.
    Moved { raw: i32, outcome: StepOutcome },
    /// Already at the target; nothing was actuated.
    AlreadyThere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    /// This variant refuses moves until the limits are calibrated.
    NotCalibrated,
    Actuator(ActuatorError),
}

impl From<ActuatorError> for MoveError {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

impl core::fmt::Display for MoveError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotCalibrated => write!(f, "gate not calibrated"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitError {
    /// The new value equals the other extreme.
    WouldCollapse,
    /// Beyond the servo's travel.
    OutOfRange,
}

impl core::fmt::Display for LimitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::WouldCollapse => write!(f, "open and closed limits must differ"),
            Self::OutOfRange => write!(f, "limit must be 0-{SERVO_MAX_POSITION}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Motion profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct MotionProfile {
    pub strategy: MovementStrategy,
    pub steps: StepProfile,
    pub approach_offset: i32,
}

impl MotionProfile {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            strategy: config.movement,
            steps: StepProfile {
                step_size: config.step_size,
                step_delay_ms: config.step_delay_ms,
                settle_delay_ms: config.settle_delay_ms,
            },
            approach_offset: config.approach_offset,
        }
    }
}

/// Point `offset` units short of `to` on the way from `from`.  `None`
/// when the move is already that short.
fn approach_point(from: i32, to: i32, offset: i32) -> Option<i32> {
    if (to - from).abs() <= offset {
        return None;
    }
    Some(if to > from { to - offset } else { to + offset })
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct PositionController<A> {
    actuator: A,
    limits: TravelLimits,
    calibrated: bool,
    requires_calibration: bool,
    position: GatePosition,
    /// Actuator position after the last completed move.
    settled_raw: Option<i32>,
    motion: MotionProfile,
    /// Present only when a limit switch is fitted.
    calibration: Option<CalibrationEngine>,
    moves: u32,
}

impl<A: ActuatorPort> PositionController<A> {
    pub fn new(actuator: A, config: &GateConfig, limits: TravelLimits, calibrated: bool) -> Self {
        Self {
            actuator,
            limits,
            calibrated,
            requires_calibration: config.requires_calibration,
            position: GatePosition::Unknown,
            settled_raw: None,
            motion: MotionProfile::from_config(config),
            calibration: config
                .has_limit_switch
                .then(|| CalibrationEngine::from_config(config)),
            moves: 0,
        }
    }

    /// Move the gate to `target`.
    pub fn request(&mut self, target: Target) -> Result<MoveResult, MoveError> {
        if self.requires_calibration && !self.calibrated {
            return Err(MoveError::NotCalibrated);
        }

        let raw = self.limits.raw_for(target);
        if self.position == GatePosition::from(target) && self.settled_raw == Some(raw) {
            return Ok(MoveResult::AlreadyThere);
        }

        let outcome = self.drive(target, raw)?;
        self.position = target.into();
        self.settled_raw = self.actuator.position();
        self.moves = self.moves.wrapping_add(1);

        match outcome {
            StepOutcome::Reached => info!("gate {} (raw {raw})", target.as_str()),
            StepOutcome::Obstructed { stopped_at, .. } => {
                warn!("gate {} obstructed at {stopped_at}", target.as_str());
            }
            StepOutcome::BudgetExhausted { stopped_at } => {
                warn!("gate {} stopped short at {stopped_at}", target.as_str());
            }
        }
        Ok(MoveResult::Moved { raw, outcome })
    }

    /// Replace one extreme.  The logical position becomes `Unknown` so the
    /// follow-up move to that extreme is never skipped as a no-op.
    /// Operator-set limits count as calibrated.
    pub fn set_limit(&mut self, kind: LimitKind, value: i32) -> Result<TravelLimits, LimitError> {
        if !(0..=SERVO_MAX_POSITION).contains(&value) {
            return Err(LimitError::OutOfRange);
        }
        let limits = self
            .limits
            .with_limit(kind, value)
            .ok_or(LimitError::WouldCollapse)?;
        self.limits = limits;
        self.calibrated = true;
        self.position = GatePosition::Unknown;
        self.settled_raw = None;
        Ok(limits)
    }

    /// Discover both extremes with the limit switch.  On failure the
    /// previous limits and calibration flag are kept.
    pub fn calibrate(&mut self) -> Result<TravelLimits, CalibrationError> {
        let Some(engine) = self.calibration else {
            return Err(CalibrationError::NoSensor);
        };

        match engine.run(&mut self.actuator, &self.limits) {
            Ok(limits) => {
                self.limits = limits;
                self.calibrated = true;
                self.position = GatePosition::Closed;
                self.settled_raw = self.actuator.position();
                Ok(limits)
            }
            Err(e) => {
                self.position = GatePosition::Unknown;
                self.settled_raw = None;
                Err(e)
            }
        }
    }

    fn drive(&mut self, target: Target, raw: i32) -> Result<StepOutcome, ActuatorError> {
        let motion = self.motion;
        with_power(&mut self.actuator, |act| match motion.strategy {
            MovementStrategy::Direct => {
                move_direct(act, raw, motion.steps.settle_delay_ms)?;
                Ok(StepOutcome::Reached)
            }
            MovementStrategy::Stepped if target == Target::Middle => {
                move_stepped(act, raw, &motion.steps, false, None)
            }
            MovementStrategy::Stepped => {
                let approach = act
                    .position()
                    .and_then(|from| approach_point(from, raw, motion.approach_offset));
                if let Some(approach) = approach {
                    move_stepped(act, approach, &motion.steps, false, None)?;
                }
                move_stepped(act, raw, &motion.steps, true, None)
            }
        })
    }

    pub fn position(&self) -> GatePosition {
        self.position
    }

    pub fn limits(&self) -> TravelLimits {
        self.limits
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn can_calibrate(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn settled_raw(&self) -> Option<i32> {
        self.settled_raw
    }

    /// Completed moves since boot.
    pub fn move_count(&self) -> u32 {
        self.moves
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }
}
