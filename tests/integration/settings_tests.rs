//! Settings record → boot behaviour.

use crate::mock_hw::{MockActuator, MockNvs, RecordingSink};

use gatectl::app::mailbox::{InboundMessage, Mailbox};
use gatectl::app::service::GateService;
use gatectl::config::{GateConfig, bounded};
use gatectl::fsm::limits::TravelLimits;
use gatectl::settings::{
    LoadOutcome, RECORD_LEN, SETTINGS_KEY, SETTINGS_NAMESPACE, SettingsRecord, SettingsStore,
};

fn record(id: &str, open: i32, closed: i32) -> SettingsRecord {
    SettingsRecord {
        identity: bounded(id),
        limits: TravelLimits::new(open, closed).unwrap(),
    }
}

fn store_with(config: &GateConfig, rec: &SettingsRecord) -> SettingsStore<MockNvs> {
    let mut store = SettingsStore::new(MockNvs::new(), config);
    store.save(rec).unwrap();
    store
}

#[test]
fn stored_record_restores_identity_and_limits() {
    let config = GateConfig::direct_drive();
    let mut store = store_with(&config, &record("7", 150, 30));

    let mut service =
        GateService::new(config.clone(), MockActuator::new(), store.load(), 0).unwrap();
    let mut sink = RecordingSink::new();
    service.start(&mut sink);

    assert_eq!(service.identity().as_str(), "7");
    assert!(service.controller().is_calibrated());
    assert_eq!(service.controller().actuator().writes, vec![30]);

    // Commands are now addressed to gate 7.
    let mailbox = Mailbox::new();
    mailbox.post(InboundMessage::new("/gatecmd/11", b"open").unwrap());
    service.step(1, &mailbox, &mut store, &mut sink);
    mailbox.post(InboundMessage::new("/gatecmd/7", b"open").unwrap());
    service.step(2, &mailbox, &mut store, &mut sink);

    assert_eq!(sink.count("gateack"), 1);
    assert_eq!(service.controller().actuator().last_write(), Some(150));
}

#[test]
fn stored_record_lets_stepped_gate_move_at_boot() {
    let config = GateConfig::limit_switch();
    let store = store_with(&config, &record("11", 120, 25));

    let mut service = GateService::new(
        config,
        MockActuator::with_stops(1000, -1000),
        store.load(),
        0,
    )
    .unwrap();
    service.start(&mut RecordingSink::new());
    assert_eq!(service.controller().actuator().writes, vec![25]);
}

#[test]
fn version_change_boots_on_defaults() {
    let old = GateConfig {
        settings_version: bounded("2024-01-01-01"),
        ..GateConfig::direct_drive()
    };
    let store = store_with(&old, &record("7", 150, 30));
    let raw = store
        .storage()
        .peek(SETTINGS_NAMESPACE, SETTINGS_KEY)
        .unwrap()
        .to_vec();

    let mut nvs = MockNvs::new();
    nvs.poke(SETTINGS_NAMESPACE, SETTINGS_KEY, &raw);
    let current = SettingsStore::new(nvs, &GateConfig::direct_drive());
    assert_eq!(current.load(), LoadOutcome::Uninitialized);

    let service =
        GateService::new(GateConfig::direct_drive(), MockActuator::new(), current.load(), 0)
            .unwrap();
    assert_eq!(service.identity().as_str(), "11");
    assert_eq!(service.controller().limits(), TravelLimits::new(110, 20).unwrap());
    assert!(!service.controller().is_calibrated());
}

#[test]
fn flipped_bit_is_corruption() {
    let config = GateConfig::direct_drive();
    let mut store = store_with(&config, &record("7", 150, 30));
    let mut raw = store
        .storage()
        .peek(SETTINGS_NAMESPACE, SETTINGS_KEY)
        .unwrap()
        .to_vec();
    assert_eq!(raw.len(), RECORD_LEN);

    // Low byte of the open position.
    raw[16] ^= 0x01;
    store
        .storage_mut()
        .poke(SETTINGS_NAMESPACE, SETTINGS_KEY, &raw);
    assert_eq!(store.load(), LoadOutcome::Corrupted);
}

#[test]
fn read_error_is_corruption() {
    let config = GateConfig::direct_drive();
    let mut store = store_with(&config, &record("7", 150, 30));
    store.storage_mut().fail_reads = true;
    assert_eq!(store.load(), LoadOutcome::Corrupted);
}

#[test]
fn empty_store_is_uninitialized() {
    let store = SettingsStore::new(MockNvs::new(), &GateConfig::direct_drive());
    assert_eq!(store.load(), LoadOutcome::Uninitialized);
}

#[test]
fn save_replaces_previous_record() {
    let config = GateConfig::direct_drive();
    let mut store = store_with(&config, &record("7", 150, 30));
    store.save(&record("7", 140, 35)).unwrap();
    assert_eq!(store.load(), LoadOutcome::Loaded(record("7", 140, 35)));
    assert_eq!(store.storage().writes, 2);
}
