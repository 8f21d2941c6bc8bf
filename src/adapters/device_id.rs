//! Broker client identity and board serial.
//!
//! The MQTT client id is derived from the gate identity so a broker
//! dashboard shows which gate each session belongs to.  The factory MAC
//! suffix is only logged at boot, to tell boards with the same gate
//! identity apart while commissioning.

use core::fmt::Write;

use crate::config::GateId;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Broker client id: `gatectl-gate-<gate id>`.
pub type ClientId = heapless::String<32>;

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn client_id(gate_id: &GateId) -> ClientId {
    let mut id = ClientId::new();
    let _ = write!(id, "gatectl-gate-{gate_id}");
    id
}

/// Last three MAC bytes in uppercase hex, e.g. `EFCAFE`.
pub fn board_serial(mac: &MacAddress) -> heapless::String<8> {
    let mut s = heapless::String::new();
    let _ = write!(s, "{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    s
}
