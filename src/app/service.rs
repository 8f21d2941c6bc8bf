//! Gate service: the hexagonal core.
//!
//! [`GateService`] owns the position controller and the periodic timers.
//! Everything else (settings storage, the broker, the update server) is
//! a port injected at the call site, so the whole service runs against
//! mocks in host tests.
//!
//! ```text
//!  Mailbox ─────▶ ┌──────────────────────────┐ ──▶ EventSink
//!                 │       GateService        │     (acks, heartbeat, log)
//! ActuatorPort ◀──│  PositionController      │
//!                 │  heartbeat · update timer│ ──▶ SettingsStore
//!  UpdatePort ◀── └──────────────────────────┘
//! ```
//!
//! One loop iteration handles at most one inbound message, then the
//! heartbeat, then the update check.

use log::info;

use crate::config::{GateConfig, GateId};
use crate::drivers::motion::StepOutcome;
use crate::error::{Error, Result};
use crate::fsm::limits::TravelLimits;
use crate::fsm::{MoveError, MoveResult, PositionController, Target};
use crate::scheduler::IntervalTimer;
use crate::settings::{LoadOutcome, SettingsRecord, SettingsStore};

use super::commands::{GateCommand, parse};
use super::events::{AppEvent, TelemetryData};
use super::mailbox::{InboundMessage, Mailbox};
use super::ports::{ActuatorPort, EventSink, StoragePort, UpdateOutcome, UpdatePort};

// ───────────────────────────────────────────────────────────────
// GateService
// ───────────────────────────────────────────────────────────────

pub struct GateService<A> {
    identity: GateId,
    config: GateConfig,
    controller: PositionController<A>,
    heartbeat: IntervalTimer,
    update_check: IntervalTimer,
}

impl<A: ActuatorPort> GateService<A> {
    /// Build the service from what boot found in the settings store.
    ///
    /// A loaded record supplies the identity and limits and counts as
    /// calibrated; anything else falls back to the compiled-in defaults.
    pub fn new(config: GateConfig, actuator: A, boot: LoadOutcome, now_ms: u32) -> Result<Self> {
        config.validate()?;
        let (identity, limits, calibrated) = match boot {
            LoadOutcome::Loaded(record) => (record.identity, record.limits, true),
            LoadOutcome::Uninitialized | LoadOutcome::Corrupted => {
                let limits = TravelLimits::new(
                    config.default_open_position,
                    config.default_closed_position,
                )
                .ok_or(Error::Config("default positions must differ"))?;
                (config.default_gate_id.clone(), limits, false)
            }
        };

        let controller = PositionController::new(actuator, &config, limits, calibrated);
        Ok(Self {
            identity,
            heartbeat: IntervalTimer::new(config.heartbeat_interval_ms, now_ms),
            update_check: IntervalTimer::new(config.update_check_interval_ms, now_ms),
            controller,
            config,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Announce startup and, if configured, drive the gate closed so the
    /// logical position is known.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started(self.identity.clone()));
        info!(
            "GateService started: gate {} open={} closed={} calibrated={}",
            self.identity,
            self.controller.limits().open(),
            self.controller.limits().closed(),
            self.controller.is_calibrated()
        );
        if self.config.close_on_boot {
            if let Err(e) = self.controller.request(Target::Close) {
                sink.emit(&AppEvent::log(format_args!("boot close skipped: {e}")));
            }
        }
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// Handle at most one pending message, then emit the heartbeat if due.
    pub fn step<S: StoragePort>(
        &mut self,
        now_ms: u32,
        mailbox: &Mailbox,
        store: &mut SettingsStore<S>,
        sink: &mut impl EventSink,
    ) {
        if let Some(msg) = mailbox.take() {
            self.handle_message(&msg, store, sink);
        }
        self.poll_telemetry(now_ms, sink);
    }

    /// Parse and execute one inbound message.  Rejected messages are
    /// reported on the log topic and never acknowledged.
    pub fn handle_message<S: StoragePort>(
        &mut self,
        msg: &InboundMessage,
        store: &mut SettingsStore<S>,
        sink: &mut impl EventSink,
    ) {
        match parse(
            &msg.topic,
            &msg.payload,
            &self.config.topic_prefix,
            &self.identity,
        ) {
            Ok(cmd) => self.handle_command(cmd, store, sink),
            Err(e) => sink.emit(&AppEvent::log(format_args!(
                "Invalid command: {} {} ({e})",
                msg.topic, msg.payload
            ))),
        }
    }

    // ── Command handling ──────────────────────────────────────

    pub fn handle_command<S: StoragePort>(
        &mut self,
        cmd: GateCommand,
        store: &mut SettingsStore<S>,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            GateCommand::Move(target) => {
                if self.move_to(target, sink) {
                    sink.emit(&AppEvent::GateAck(target));
                }
            }
            GateCommand::SetLimit { verb, kind, value } => {
                match self.controller.set_limit(kind, i32::from(value)) {
                    Ok(_) => {
                        sink.emit(&AppEvent::log(format_args!(
                            "Setting {} = {value}",
                            verb.as_str()
                        )));
                        let saved = self.persist(store, sink);
                        let moved = self.move_to(kind.target(), sink);
                        if saved && moved {
                            sink.emit(&AppEvent::LimitsAck(verb));
                        }
                    }
                    Err(e) => sink.emit(&AppEvent::log(format_args!(
                        "Invalid command: {} {value} ({e})",
                        verb.as_str()
                    ))),
                }
            }
            GateCommand::Flash => {
                if self.persist(store, sink) {
                    sink.emit(&AppEvent::FlashAck);
                }
            }
            GateCommand::Calibrate => {
                if !self.controller.can_calibrate() {
                    sink.emit(&AppEvent::log(format_args!(
                        "Invalid command: calibrate (no limit switch fitted)"
                    )));
                    return;
                }
                match self.controller.calibrate() {
                    Ok(limits) => {
                        sink.emit(&AppEvent::log(format_args!(
                            "Calibrated: open={} closed={}",
                            limits.open(),
                            limits.closed()
                        )));
                        if self.persist(store, sink) {
                            sink.emit(&AppEvent::CalibrateAck(true));
                        }
                    }
                    Err(e) => {
                        sink.emit(&AppEvent::log(format_args!("Calibration failed: {e}")));
                        sink.emit(&AppEvent::CalibrateAck(false));
                    }
                }
            }
        }
    }

    /// Returns `true` when the move was accepted (moved or already there).
    fn move_to(&mut self, target: Target, sink: &mut impl EventSink) -> bool {
        match self.controller.request(target) {
            Ok(MoveResult::AlreadyThere) => {
                info!("gate already {}", target.as_str());
                true
            }
            Ok(MoveResult::Moved { outcome, .. }) => {
                if let StepOutcome::Obstructed { stopped_at, .. } = outcome {
                    sink.emit(&AppEvent::log(format_args!(
                        "Obstructed moving {} at {stopped_at}",
                        target.as_str()
                    )));
                }
                true
            }
            Err(e @ MoveError::NotCalibrated) => {
                sink.emit(&AppEvent::log(format_args!(
                    "Invalid command: gatecmd {} ({e})",
                    target.as_str()
                )));
                false
            }
            Err(e @ MoveError::Actuator(_)) => {
                sink.emit(&AppEvent::log(format_args!(
                    "Move {} failed: {e}",
                    target.as_str()
                )));
                false
            }
        }
    }

    /// Write identity and limits; failures are reported, not propagated.
    #[must_use]
    fn persist<S: StoragePort>(
        &self,
        store: &mut SettingsStore<S>,
        sink: &mut impl EventSink,
    ) -> bool {
        match store.save(&self.settings_record()) {
            Ok(()) => true,
            Err(e) => {
                sink.emit(&AppEvent::log(format_args!("Settings write failed: {e}")));
                false
            }
        }
    }

    // ── Periodic work ─────────────────────────────────────────

    /// Emit a heartbeat when the interval has elapsed.
    pub fn poll_telemetry(&mut self, now_ms: u32, sink: &mut impl EventSink) -> bool {
        if !self.heartbeat.poll(now_ms) {
            return false;
        }
        sink.emit(&AppEvent::Heartbeat(self.build_telemetry()));
        true
    }

    /// Rate-limited firmware update check.  Skipped entirely while Wi-Fi
    /// is down.  `None` when no check ran.
    pub fn poll_update(
        &mut self,
        now_ms: u32,
        wifi_up: bool,
        updater: &mut impl UpdatePort,
    ) -> Option<UpdateOutcome> {
        if !wifi_up || !self.update_check.poll(now_ms) {
            return None;
        }
        let outcome = updater.check_for_update(&self.identity);
        match outcome {
            UpdateOutcome::NoUpdate => log::debug!("update check: no update"),
            UpdateOutcome::Updated => info!("update check: new firmware written"),
            UpdateOutcome::Failed(code) => log::warn!("update check failed ({code})"),
        }
        Some(outcome)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn build_telemetry(&self) -> TelemetryData {
        let limits = self.controller.limits();
        TelemetryData {
            gate_pos: self.controller.position(),
            open_pos: limits.open(),
            closed_pos: limits.closed(),
            calibrated: self.controller.is_calibrated(),
        }
    }

    pub fn settings_record(&self) -> SettingsRecord {
        SettingsRecord {
            identity: self.identity.clone(),
            limits: self.controller.limits(),
        }
    }

    pub fn identity(&self) -> &GateId {
        &self.identity
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn controller(&self) -> &PositionController<A> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PositionController<A> {
        &mut self.controller
    }
}
