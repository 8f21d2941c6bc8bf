//! PositionController → motion → actuator, for both movement strategies.

use crate::mock_hw::MockActuator;

use gatectl::config::GateConfig;
use gatectl::drivers::motion::StepOutcome;
use gatectl::error::ActuatorError;
use gatectl::fsm::limits::TravelLimits;
use gatectl::fsm::{GatePosition, LimitError, LimitKind, MoveError, MoveResult, PositionController, Target};

fn limits() -> TravelLimits {
    TravelLimits::new(110, 20).unwrap()
}

fn direct(act: MockActuator) -> PositionController<MockActuator> {
    PositionController::new(act, &GateConfig::direct_drive(), limits(), false)
}

fn stepped(act: MockActuator, calibrated: bool) -> PositionController<MockActuator> {
    PositionController::new(act, &GateConfig::limit_switch(), limits(), calibrated)
}

// ── Direct drive ──────────────────────────────────────────────

#[test]
fn direct_move_is_one_write_inside_a_power_window() {
    let mut c = direct(MockActuator::new());
    let r = c.request(Target::Open).unwrap();

    assert_eq!(
        r,
        MoveResult::Moved {
            raw: 110,
            outcome: StepOutcome::Reached
        }
    );
    assert_eq!(c.actuator().writes, vec![110]);
    assert_eq!(c.actuator().power, vec![true, false]);
    assert_eq!(c.actuator().paused_ms, 1000);
    assert_eq!(c.position(), GatePosition::Open);
    assert_eq!(c.settled_raw(), Some(110));
}

#[test]
fn repeated_request_is_a_no_op() {
    let mut c = direct(MockActuator::new());
    c.request(Target::Close).unwrap();
    c.actuator_mut().clear();

    assert_eq!(c.request(Target::Close).unwrap(), MoveResult::AlreadyThere);
    assert!(c.actuator().writes.is_empty());
    assert!(c.actuator().power.is_empty());
    assert_eq!(c.move_count(), 1);
}

#[test]
fn middle_is_mean_of_limits() {
    let mut c = direct(MockActuator::new());
    c.request(Target::Open).unwrap();
    c.request(Target::Middle).unwrap();
    assert_eq!(c.actuator().writes, vec![110, 65]);
    assert_eq!(c.position(), GatePosition::Middle);
}

#[test]
fn direct_drive_moves_without_calibration() {
    let mut c = direct(MockActuator::new());
    assert!(!c.is_calibrated());
    assert!(c.request(Target::Open).is_ok());
}

#[test]
fn actuator_failure_is_reported_and_power_dropped() {
    let mut act = MockActuator::new();
    act.fail_writes = true;
    let mut c = direct(act);

    assert_eq!(
        c.request(Target::Open),
        Err(MoveError::Actuator(ActuatorError::PwmWriteFailed))
    );
    assert!(!c.actuator().powered());
    assert_eq!(c.position(), GatePosition::Unknown);
}

// ── Limits ────────────────────────────────────────────────────

#[test]
fn set_limit_forces_next_move() {
    let mut c = direct(MockActuator::new());
    c.request(Target::Open).unwrap();

    let l = c.set_limit(LimitKind::Open, 120).unwrap();
    assert_eq!((l.open(), l.closed()), (120, 20));
    assert_eq!(c.position(), GatePosition::Unknown);
    assert!(c.is_calibrated());

    c.request(Target::Open).unwrap();
    assert_eq!(c.actuator().last_write(), Some(120));
}

#[test]
fn set_limit_rejects_collapse() {
    let mut c = direct(MockActuator::new());
    assert_eq!(
        c.set_limit(LimitKind::Open, 20),
        Err(LimitError::WouldCollapse)
    );
    assert_eq!(c.limits(), limits());
}

#[test]
fn set_limit_rejects_values_beyond_servo_travel() {
    let mut c = direct(MockActuator::new());
    for v in [181, 200, i32::from(u16::MAX), -1] {
        assert_eq!(c.set_limit(LimitKind::Open, v), Err(LimitError::OutOfRange));
    }
    assert_eq!(c.limits(), limits());
    assert!(!c.is_calibrated());
}

#[test]
fn full_travel_limit_stays_idempotent() {
    let mut c = direct(MockActuator::new());
    c.set_limit(LimitKind::Open, 180).unwrap();
    c.request(Target::Open).unwrap();
    assert_eq!(c.settled_raw(), Some(180));
    assert_eq!(c.request(Target::Open).unwrap(), MoveResult::AlreadyThere);
    assert_eq!(c.actuator().writes, vec![180]);
}

#[test]
fn set_limit_allows_inverted_range() {
    let mut c = direct(MockActuator::new());
    let l = c.set_limit(LimitKind::Closed, 150).unwrap();
    assert_eq!((l.open(), l.closed()), (110, 150));
    assert_eq!(l.middle(), 130);
}

// ── Stepped ───────────────────────────────────────────────────

#[test]
fn stepped_refuses_until_calibrated() {
    let mut c = stepped(MockActuator::with_dead_switch().at(20), false);
    assert_eq!(c.request(Target::Open), Err(MoveError::NotCalibrated));
    assert!(c.actuator().writes.is_empty());
    assert!(c.actuator().power.is_empty());
}

#[test]
fn stepped_move_approaches_then_checks() {
    let mut c = stepped(MockActuator::with_dead_switch().at(20), true);
    let r = c.request(Target::Open).unwrap();

    assert_eq!(
        r,
        MoveResult::Moved {
            raw: 110,
            outcome: StepOutcome::Reached
        }
    );
    let writes = &c.actuator().writes;
    assert_eq!(writes.len(), 45);
    assert_eq!(writes[0], 22);
    assert_eq!(writes[39], 100);
    assert_eq!(*writes.last().unwrap(), 110);
    assert_eq!(c.actuator().power, vec![true, false]);
}

#[test]
fn stepped_from_unknown_position_writes_once() {
    let mut c = stepped(MockActuator::with_dead_switch(), true);
    c.request(Target::Close).unwrap();
    assert_eq!(c.actuator().writes, vec![20]);
    assert_eq!(c.actuator().paused_ms, 300);
}

#[test]
fn obstruction_stops_short_and_is_not_idempotent() {
    let mut c = stepped(MockActuator::with_stops(105, -1000).at(20), true);
    let r = c.request(Target::Open).unwrap();

    assert_eq!(
        r,
        MoveResult::Moved {
            raw: 110,
            outcome: StepOutcome::Obstructed {
                stopped_at: 104,
                still_blocked: false
            }
        }
    );
    assert_eq!(c.position(), GatePosition::Open);
    assert_eq!(c.settled_raw(), Some(104));

    // Not at the commanded raw position, so the next request drives again.
    c.actuator_mut().clear();
    assert!(matches!(
        c.request(Target::Open).unwrap(),
        MoveResult::Moved { .. }
    ));
    assert_eq!(c.actuator().writes, vec![106, 104]);
}

#[test]
fn stepped_middle_does_not_check_switch() {
    // Switch reads tripped everywhere below 70; an unchecked move ignores it.
    let mut c = stepped(MockActuator::with_stops(1000, 70).at(110), true);
    let r = c.request(Target::Middle).unwrap();
    assert_eq!(
        r,
        MoveResult::Moved {
            raw: 65,
            outcome: StepOutcome::Reached
        }
    );
    assert_eq!(c.actuator().last_write(), Some(65));
}

// ── Round trips ───────────────────────────────────────────────

fn assert_round_trip(mut c: PositionController<MockActuator>, open: i32, closed: i32) {
    c.request(Target::Open).unwrap();
    assert_eq!(c.settled_raw(), Some(open));
    c.request(Target::Close).unwrap();
    assert_eq!(c.settled_raw(), Some(closed));
    c.request(Target::Open).unwrap();
    assert_eq!(c.actuator().last_write(), Some(open));
    assert_eq!(c.settled_raw(), Some(open));
    assert_eq!(c.request(Target::Open).unwrap(), MoveResult::AlreadyThere);
}

#[test]
fn direct_open_close_open_returns_to_open() {
    let odd = TravelLimits::new(111, 17).unwrap();
    let c = PositionController::new(MockActuator::new(), &GateConfig::direct_drive(), odd, false);
    assert_round_trip(c, 111, 17);
}

#[test]
fn stepped_open_close_open_returns_to_open() {
    // Odd extremes so the two-unit steps never land on them by accident.
    let odd = TravelLimits::new(111, 17).unwrap();
    let c = PositionController::new(
        MockActuator::with_dead_switch().at(50),
        &GateConfig::limit_switch(),
        odd,
        true,
    );
    assert_round_trip(c, 111, 17);
}
