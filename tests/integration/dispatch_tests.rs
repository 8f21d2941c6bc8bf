//! Broker message → GateService → acks, persistence, heartbeat.

use crate::mock_hw::{MockActuator, MockNvs, RecordingSink};

use gatectl::app::mailbox::{InboundMessage, Mailbox};
use gatectl::app::ports::{UpdateOutcome, UpdatePort};
use gatectl::app::service::GateService;
use gatectl::config::GateConfig;
use gatectl::fsm::GatePosition;
use gatectl::settings::{LoadOutcome, SettingsStore};

struct Rig {
    service: GateService<MockActuator>,
    store: SettingsStore<MockNvs>,
    mailbox: Mailbox,
    sink: RecordingSink,
}

impl Rig {
    fn new(config: GateConfig, act: MockActuator) -> Self {
        let store = SettingsStore::new(MockNvs::new(), &config);
        let boot = store.load();
        let mut service = GateService::new(config, act, boot, 0).unwrap();
        let mut sink = RecordingSink::new();
        service.start(&mut sink);
        sink.clear();
        Self {
            service,
            store,
            mailbox: Mailbox::new(),
            sink,
        }
    }

    fn direct() -> Self {
        Self::new(GateConfig::direct_drive(), MockActuator::new())
    }

    fn send(&mut self, topic: &str, payload: &str) {
        self.mailbox
            .post(InboundMessage::new(topic, payload.as_bytes()).unwrap());
        self.service
            .step(1, &self.mailbox, &mut self.store, &mut self.sink);
    }
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_announces_and_closes() {
    let store = SettingsStore::new(MockNvs::new(), &GateConfig::direct_drive());
    let mut service =
        GateService::new(GateConfig::direct_drive(), MockActuator::new(), store.load(), 0).unwrap();
    let mut sink = RecordingSink::new();
    service.start(&mut sink);

    assert_eq!(sink.events.len(), 1);
    assert!(sink.published().is_empty(), "startup stays on the device");
    assert_eq!(service.controller().actuator().writes, vec![20]);
    assert_eq!(service.controller().position(), GatePosition::Closed);
}

#[test]
fn uncalibrated_stepped_gate_skips_boot_close() {
    let rig = Rig::new(GateConfig::limit_switch(), MockActuator::with_stops(145, 15));
    assert!(rig.service.controller().actuator().writes.is_empty());
    assert_eq!(rig.service.controller().position(), GatePosition::Unknown);
}

// ── gatecmd ───────────────────────────────────────────────────

#[test]
fn gatecmd_moves_and_acks() {
    let mut rig = Rig::direct();
    rig.send("/gatecmd/11", "open");

    assert_eq!(rig.sink.published(), vec![("gateack", "open".to_string())]);
    assert_eq!(rig.service.controller().actuator().last_write(), Some(110));
}

#[test]
fn gatecmd_repeat_still_acks() {
    let mut rig = Rig::direct();
    rig.send("/gatecmd/11", "close");
    assert_eq!(rig.sink.count("gateack"), 1);
    assert_eq!(rig.service.controller().actuator().writes, vec![20]);
}

#[test]
fn topic_prefix_is_optional() {
    let mut rig = Rig::direct();
    rig.send("gatecmd/11", "middle");
    assert_eq!(rig.sink.published(), vec![("gateack", "middle".to_string())]);
}

#[test]
fn foreign_gate_is_rejected() {
    let mut rig = Rig::direct();
    rig.send("/gatecmd/12", "open");

    assert_eq!(rig.sink.count("gateack"), 0);
    let logs = rig.sink.logs();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].starts_with("Invalid command: /gatecmd/12 open"));
}

#[test]
fn bad_payloads_are_logged_not_acked() {
    let mut rig = Rig::direct();
    for (topic, payload) in [
        ("/gatecmd/11", ""),
        ("/gatecmd/11", "sideways"),
        ("/setopenpos/11", "-5"),
        ("/setopenpos/11", "99999"),
        ("/opensesame/11", "1"),
    ] {
        rig.send(topic, payload);
    }
    assert_eq!(rig.sink.verbs(), vec!["gatelog"; 5]);
    assert!(rig.sink.logs().iter().all(|l| l.starts_with("Invalid command:")));
    assert_eq!(rig.store.storage().writes, 0);
}

#[test]
fn uncalibrated_move_is_refused() {
    let mut rig = Rig::new(GateConfig::limit_switch(), MockActuator::with_stops(145, 15));
    rig.send("/gatecmd/11", "open");

    assert_eq!(rig.sink.count("gateack"), 0);
    assert!(rig.sink.logs()[0].contains("not calibrated"));
}

// ── Limits ────────────────────────────────────────────────────

#[test]
fn setopenpos_persists_moves_and_acks() {
    let mut rig = Rig::direct();
    rig.send("/setopenpos/11", "150");

    assert_eq!(
        rig.sink.published(),
        vec![
            ("gatelog", "Setting setopenpos = 150".to_string()),
            ("limitsack", "setopenpos".to_string()),
        ]
    );
    assert_eq!(rig.service.controller().actuator().last_write(), Some(150));
    assert_eq!(rig.service.controller().position(), GatePosition::Open);

    let LoadOutcome::Loaded(record) = rig.store.load() else {
        panic!("record not stored");
    };
    assert_eq!(record.limits.open(), 150);
    assert_eq!(record.limits.closed(), 20);
    assert_eq!(record.identity.as_str(), "11");
}

#[test]
fn gatemin_sets_closed_extreme() {
    let mut rig = Rig::direct();
    rig.send("/gatemin/11", "30");

    assert_eq!(rig.sink.count("limitsack"), 1);
    assert_eq!(rig.service.controller().limits().closed(), 30);
    assert_eq!(rig.service.controller().actuator().last_write(), Some(30));
    let t = rig.service.build_telemetry();
    assert_eq!((t.open_pos, t.closed_pos), (110, 30));
}

#[test]
fn collapsing_limit_is_rejected() {
    let mut rig = Rig::direct();
    rig.send("/setclosepos/11", "110");

    assert_eq!(rig.sink.count("limitsack"), 0);
    assert_eq!(rig.sink.count("gatelog"), 1);
    assert_eq!(rig.service.controller().limits().closed(), 20);
    assert_eq!(rig.store.storage().writes, 0);
}

#[test]
fn limit_beyond_servo_travel_is_rejected() {
    let mut rig = Rig::direct();
    rig.send("/setopenpos/11", "200");

    assert_eq!(rig.sink.count("limitsack"), 0);
    assert_eq!(rig.sink.logs().len(), 1);
    assert!(rig.sink.logs()[0].starts_with("Invalid command: setopenpos 200"));
    assert_eq!(rig.service.controller().limits().open(), 110);
    assert!(rig.service.controller().actuator().writes.is_empty());
    assert_eq!(rig.store.storage().writes, 0);
    assert_eq!(rig.service.build_telemetry().open_pos, 110);
}

#[test]
fn non_numeric_limit_keeps_current_value() {
    let mut rig = Rig::direct();
    rig.send("/setopenpos/11", "abc");

    assert_eq!(rig.sink.count("limitsack"), 0);
    assert_eq!(rig.service.controller().limits().open(), 110);
    assert_eq!(rig.service.controller().limits().closed(), 20);
}

#[test]
fn numeric_limit_is_taken_exactly() {
    let mut rig = Rig::direct();
    rig.send("/setclosepos/11", "45");

    assert_eq!(rig.sink.count("limitsack"), 1);
    assert_eq!(rig.service.controller().limits().closed(), 45);
    assert_eq!(rig.service.controller().actuator().last_write(), Some(45));
}

#[test]
fn limit_not_acked_when_write_fails() {
    let mut rig = Rig::direct();
    rig.store.storage_mut().fail_writes = true;
    rig.send("/setopenpos/11", "150");

    assert_eq!(rig.sink.count("limitsack"), 0);
    assert!(
        rig.sink
            .logs()
            .contains(&"Settings write failed: storage full".to_string())
    );
}

#[test]
fn limit_not_acked_when_move_fails() {
    let mut rig = Rig::direct();
    rig.service.controller_mut().actuator_mut().fail_writes = true;
    rig.send("/setopenpos/11", "150");

    assert_eq!(rig.sink.count("limitsack"), 0);
    assert!(rig.sink.logs().iter().any(|l| l.starts_with("Move open failed")));
}

#[test]
fn operator_limit_calibrates_stepped_gate() {
    let mut rig = Rig::new(
        GateConfig::limit_switch(),
        MockActuator::with_stops(1000, -1000),
    );
    rig.send("/setclosepos/11", "25");
    assert!(rig.service.controller().is_calibrated());
    assert_eq!(rig.sink.count("limitsack"), 1);
    assert_eq!(rig.service.controller().actuator().last_write(), Some(25));
}

// ── flash ─────────────────────────────────────────────────────

#[test]
fn flash_writes_and_acks() {
    let mut rig = Rig::direct();
    rig.send("/flash/11", "");

    assert_eq!(rig.sink.published(), vec![("flashack", "done".to_string())]);
    assert_eq!(rig.store.storage().writes, 1);
    assert!(matches!(rig.store.load(), LoadOutcome::Loaded(_)));
}

#[test]
fn flash_failure_is_not_acked() {
    let mut rig = Rig::direct();
    rig.store.storage_mut().fail_writes = true;
    rig.send("/flash/11", "");

    assert_eq!(rig.sink.count("flashack"), 0);
    assert_eq!(rig.sink.logs(), vec!["Settings write failed: storage full"]);
}

// ── calibrate ─────────────────────────────────────────────────

#[test]
fn calibrate_without_switch_is_logged() {
    let mut rig = Rig::direct();
    rig.send("/calibrate/11", "");

    assert_eq!(rig.sink.count("calibrateack"), 0);
    assert_eq!(rig.sink.count("gatelog"), 1);
    assert!(rig.service.controller().actuator().writes.is_empty());
}

#[test]
fn calibrate_persists_and_acks() {
    let mut rig = Rig::new(GateConfig::limit_switch(), MockActuator::with_stops(145, 15));
    rig.send("/calibrate/11", "");

    assert_eq!(
        rig.sink.published(),
        vec![
            ("gatelog", "Calibrated: open=143 closed=17".to_string()),
            ("calibrateack", "ok".to_string()),
        ]
    );
    let LoadOutcome::Loaded(record) = rig.store.load() else {
        panic!("record not stored");
    };
    assert_eq!((record.limits.open(), record.limits.closed()), (143, 17));

    rig.sink.clear();
    rig.send("/gatecmd/11", "open");
    assert_eq!(rig.sink.count("gateack"), 1);
}

#[test]
fn calibration_not_acked_when_write_fails() {
    let mut rig = Rig::new(GateConfig::limit_switch(), MockActuator::with_stops(145, 15));
    rig.store.storage_mut().fail_writes = true;
    rig.send("/calibrate/11", "");

    assert_eq!(rig.sink.count("calibrateack"), 0);
    assert_eq!(
        rig.sink.logs().last().map(String::as_str),
        Some("Settings write failed: storage full")
    );
}

#[test]
fn failed_calibration_acks_failure() {
    let mut rig = Rig::new(GateConfig::limit_switch(), MockActuator::with_dead_switch());
    rig.send("/calibrate/11", "");

    assert_eq!(rig.sink.count("calibrateack"), 1);
    assert_eq!(
        rig.sink.published().last().unwrap(),
        &("calibrateack", "failed".to_string())
    );
    assert!(!rig.service.controller().is_calibrated());
    assert_eq!(rig.store.storage().writes, 0);
}

// ── Mailbox ───────────────────────────────────────────────────

#[test]
fn newest_message_wins() {
    let mut rig = Rig::direct();
    rig.mailbox
        .post(InboundMessage::new("/gatecmd/11", b"open").unwrap());
    rig.mailbox
        .post(InboundMessage::new("/gatecmd/11", b"middle").unwrap());
    rig.service
        .step(1, &rig.mailbox, &mut rig.store, &mut rig.sink);
    rig.service
        .step(2, &rig.mailbox, &mut rig.store, &mut rig.sink);

    assert_eq!(rig.sink.published(), vec![("gateack", "middle".to_string())]);
}

// ── Heartbeat ─────────────────────────────────────────────────

#[test]
fn heartbeat_after_interval() {
    let mut rig = Rig::direct();
    assert!(!rig.service.poll_telemetry(3000, &mut rig.sink));
    assert!(rig.service.poll_telemetry(3001, &mut rig.sink));
    assert!(!rig.service.poll_telemetry(3002, &mut rig.sink));

    assert_eq!(
        rig.sink.published(),
        vec![(
            "heartbeat",
            r#"{"gatePos":"close","openPos":110,"closedPos":20,"calibrated":false}"#.to_string()
        )]
    );
}

#[test]
fn heartbeat_reports_unknown_position() {
    let rig = Rig::new(GateConfig::limit_switch(), MockActuator::with_stops(145, 15));
    let t = rig.service.build_telemetry();
    assert_eq!(t.gate_pos, GatePosition::Unknown);
    assert!(!t.calibrated);
}

// ── Update checks ─────────────────────────────────────────────

struct CountingUpdater {
    checks: Vec<String>,
}

impl UpdatePort for CountingUpdater {
    fn check_for_update(&mut self, gate_id: &str) -> UpdateOutcome {
        self.checks.push(gate_id.to_string());
        UpdateOutcome::NoUpdate
    }
}

#[test]
fn update_check_is_rate_limited_and_needs_wifi() {
    let mut rig = Rig::direct();
    let mut updater = CountingUpdater { checks: Vec::new() };

    assert_eq!(rig.service.poll_update(6000, false, &mut updater), None);
    assert_eq!(
        rig.service.poll_update(6001, true, &mut updater),
        Some(UpdateOutcome::NoUpdate)
    );
    assert_eq!(rig.service.poll_update(7000, true, &mut updater), None);
    assert_eq!(updater.checks, vec!["11"]);
}
