//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements         | Connects to                  |
//! |-------------|--------------------|------------------------------|
//! | `device_id` | (helpers)          | eFuse MAC → client id        |
//! | `log_sink`  | EventSink          | Serial log output            |
//! | `mqtt`      | ConnectivityPort   | ESP-MQTT broker session      |
//! |             | EventSink          | Ack / heartbeat / log topics |
//! | `nvs`       | StoragePort        | NVS / in-memory store        |
//! | `ota`       | UpdatePort         | HTTP pull + OTA partition    |
//! | `time`      | ClockPort, DelayNs | ESP32 system timer           |
//! | `wifi`      | ConnectivityPort   | ESP-IDF WiFi STA             |
//!
//! The actuator adapter lives with the servo and switch drivers in
//! [`crate::drivers::actuator`].

pub mod device_id;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod ota;
pub mod time;
pub(crate) mod utils;
pub mod wifi;
