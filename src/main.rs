//! Gate controller firmware: main entry point.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                     │
//! │                                                               │
//! │  GateActuator      LogEventSink   NvsAdapter    SystemClock   │
//! │  (servo+switch)    (EventSink)    (StoragePort) (ClockPort)   │
//! │  WifiAdapter       MqttAdapter    HttpUpdater                 │
//! │  (Connectivity)    (Conn+Sink)    (UpdatePort)                │
//! │                                                               │
//! │  ──────────────── Port Trait Boundary ───────────────────     │
//! │                                                               │
//! │  ┌───────────────────────────────────────────────────────┐    │
//! │  │            GateService (pure logic)                   │    │
//! │  │  PositionController · CalibrationEngine · timers      │    │
//! │  └───────────────────────────────────────────────────────┘    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The loop is single-threaded: make sure WiFi and the broker session are
//! up, handle at most one inbound command, heartbeat, check for firmware,
//! pause.  The broker client's callback only fills the mailbox.
//!
//! On host builds `main` runs a short scripted session against the
//! simulation adapters instead.

#![deny(unused_must_use)]

use anyhow::Result;

use gatectl::app::mailbox::Mailbox;
use gatectl::config::GateConfig;

/// Filled by the broker client's callback, drained by the control loop.
static MAILBOX: Mailbox = Mailbox::new();

fn build_config() -> GateConfig {
    if cfg!(feature = "limit-switch") {
        GateConfig::limit_switch()
    } else {
        GateConfig::direct_drive()
    }
}

// ── Firmware ──────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn main() -> Result<()> {
    use embedded_hal::delay::DelayNs;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_hal::gpio::{AnyOutputPin, PinDriver};
    use esp_idf_hal::ledc::{LedcDriver, LedcTimerDriver, Resolution, config::TimerConfig};
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_hal::prelude::*;
    use log::{error, info, warn};

    use gatectl::adapters::device_id;
    use gatectl::adapters::log_sink::LogEventSink;
    use gatectl::adapters::mqtt::MqttAdapter;
    use gatectl::adapters::nvs::NvsAdapter;
    use gatectl::adapters::ota::{self, HttpUpdater};
    use gatectl::adapters::time::{StdDelay, SystemClock};
    use gatectl::adapters::wifi::WifiAdapter;
    use gatectl::app::ports::{ClockPort, ConnectivityPort, UpdateOutcome};
    use gatectl::app::reconnect::{RetryPolicy, ensure_connected};
    use gatectl::app::service::GateService;
    use gatectl::config::NetworkConfig;
    use gatectl::drivers::actuator::GateActuator;
    use gatectl::drivers::servo::ServoPwm;
    use gatectl::pins::{ACTIVE_BOARD, SERVO_PWM_FREQ_HZ};
    use gatectl::settings::SettingsStore;

    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    let mac = device_id::read_mac();
    info!(
        "gatectl v{} on board {}",
        env!("CARGO_PKG_VERSION"),
        device_id::board_serial(&mac)
    );
    ota::mark_running_image_valid();

    let config = build_config();
    let net = NetworkConfig::from_build_env();

    // ── 2. Settings ───────────────────────────────────────────
    let mut store = SettingsStore::new(NvsAdapter::new()?, &config);
    let boot = store.load();
    info!("settings: {boot:?}");

    // ── 3. Actuator ───────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::new()
            .frequency(SERVO_PWM_FREQ_HZ.Hz())
            .resolution(Resolution::Bits14),
    )?;
    // SAFETY: the pin numbers come from the active board layout and no
    // other driver claims them.
    let servo_pin = unsafe { AnyOutputPin::new(ACTIVE_BOARD.servo_pwm) };
    let servo = ServoPwm::new(LedcDriver::new(peripherals.ledc.channel0, timer, servo_pin)?);

    let enable = if config.has_enable_line {
        // SAFETY: as above.
        let pin = unsafe { AnyOutputPin::new(ACTIVE_BOARD.servo_enable) };
        Some(PinDriver::output(pin)?)
    } else {
        None
    };

    #[cfg(feature = "limit-switch")]
    let switch = {
        // SAFETY: as above.
        let pin = unsafe { esp_idf_hal::gpio::AnyIOPin::new(ACTIVE_BOARD.limit_switch) };
        let mut input = PinDriver::input(pin)?;
        input.set_pull(esp_idf_hal::gpio::Pull::Up)?;
        Some(gatectl::drivers::limit_switch::LimitSwitch::new(
            input,
            config.sensor_debounce_samples,
        ))
    };
    #[cfg(not(feature = "limit-switch"))]
    let switch: Option<gatectl::drivers::limit_switch::LimitSwitch<gatectl::drivers::actuator::NoPin>> =
        None;

    let actuator = GateActuator::new(servo, enable, switch, StdDelay);

    // ── 4. Service ────────────────────────────────────────────
    let clock = SystemClock::new();
    let mut service = GateService::new(config.clone(), actuator, boot, clock.now_ms())?;

    let sysloop = EspSystemEventLoop::take()?;
    let mut wifi = WifiAdapter::new(
        peripherals.modem,
        sysloop,
        Some(store.storage().partition()),
        net.wifi_ssid,
        net.wifi_password,
    )?;
    let identity = service.identity().clone();
    let mut mqtt = MqttAdapter::new(net.broker_url, &config.topic_prefix, &identity, &MAILBOX);
    let mut updater = HttpUpdater::new(net.update_url);
    let mut delay = StdDelay;
    let policy = RetryPolicy::forever(config.reconnect_backoff_ms);

    service.start(&mut LogEventSink);
    info!("System ready. Entering control loop.");

    // ── 5. Control loop ───────────────────────────────────────
    loop {
        if let Err(e) = ensure_connected(&mut wifi, &mut delay, policy) {
            error!("wifi unusable: {e}");
            delay.delay_ms(config.reconnect_backoff_ms);
            continue;
        }
        if let Err(e) = ensure_connected(&mut mqtt, &mut delay, policy) {
            warn!("mqtt unusable: {e}");
            delay.delay_ms(config.reconnect_backoff_ms);
            continue;
        }

        let now = clock.now_ms();
        service.step(now, &MAILBOX, &mut store, &mut (LogEventSink, &mut mqtt));

        if let Some(UpdateOutcome::Updated) =
            service.poll_update(clock.now_ms(), wifi.is_connected(), &mut updater)
        {
            ota::reboot();
        }

        delay.delay_ms(config.loop_pause_ms);
    }
}

// ── Host simulation ───────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
fn main() -> Result<()> {
    use core::convert::Infallible;

    use embedded_hal::pwm::{ErrorType, SetDutyCycle};

    use gatectl::adapters::log_sink::LogEventSink;
    use gatectl::adapters::mqtt::MqttAdapter;
    use gatectl::adapters::nvs::NvsAdapter;
    use gatectl::adapters::time::{StdDelay, SystemClock};
    use gatectl::adapters::wifi::WifiAdapter;
    use gatectl::app::ports::ClockPort;
    use gatectl::app::reconnect::{RetryPolicy, ensure_connected};
    use gatectl::app::service::GateService;
    use gatectl::drivers::actuator::{GateActuator, NoPin};
    use gatectl::drivers::limit_switch::LimitSwitch;
    use gatectl::drivers::servo::ServoPwm;
    use gatectl::settings::SettingsStore;

    /// PWM channel that only remembers its duty.
    struct SimPwm(u16);

    impl ErrorType for SimPwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for SimPwm {
        fn max_duty_cycle(&self) -> u16 {
            u16::MAX
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
            self.0 = duty;
            Ok(())
        }
    }

    let config = GateConfig {
        settle_delay_ms: 0,
        step_delay_ms: 0,
        ..build_config()
    };
    let clock = SystemClock::new();
    let mut store = SettingsStore::new(NvsAdapter::new()?, &config);
    let boot = store.load();
    let actuator = GateActuator::new(
        ServoPwm::new(SimPwm(0)),
        Some(NoPin),
        None::<LimitSwitch<NoPin>>,
        StdDelay,
    );
    let mut service = GateService::new(config.clone(), actuator, boot, clock.now_ms())?;

    let mut wifi = WifiAdapter::simulated("sim-yard", "")?;
    let identity = service.identity().clone();
    let mut mqtt = MqttAdapter::loopback(&config.topic_prefix, &identity, &MAILBOX);
    let policy = RetryPolicy::forever(config.reconnect_backoff_ms);
    ensure_connected(&mut wifi, &mut StdDelay, policy)?;
    ensure_connected(&mut mqtt, &mut StdDelay, policy)?;

    service.start(&mut LogEventSink);
    let script: [(&str, &[u8]); 3] = [("gatecmd", b"open"), ("setclosepos", b"25"), ("flash", b"")];
    for (verb, payload) in script {
        let topic = gatectl::app::commands::topic_for(&config.topic_prefix, verb, &identity);
        mqtt.inject(&topic, payload);
        service.step(clock.now_ms(), &MAILBOX, &mut store, &mut (LogEventSink, &mut mqtt));
    }

    for (topic, payload) in mqtt.published() {
        println!("{topic} {payload}");
    }
    Ok(())
}
