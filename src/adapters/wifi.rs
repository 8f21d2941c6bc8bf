//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`] so the control loop's reconnect routine
//! can bring the station link up and keep it up.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi` over
//!   `EspWifi`.  Each `connect()` is one association attempt followed by
//!   waiting for DHCP.
//! - **all other targets**: a scriptable simulation for host-side tests.

use log::{info, warn};

use crate::adapters::utils::is_printable_ascii;
use crate::app::ports::{ConnectivityError, ConnectivityPort};

#[cfg(target_os = "espidf")]
use esp_idf_hal::modem::Modem;
#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi},
};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::NoCredentials);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::NoCredentials);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    ssid: heapless::String<32>,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Simulation: link state and number of attempts left to fail.
    #[cfg(not(target_os = "espidf"))]
    sim_up: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_failures_left: u32,
    attempts: u32,
}

impl WifiAdapter {
    /// Configure the station and start the driver.  Does not associate;
    /// the control loop's first `connect()` does.  With `nvs` the driver
    /// keeps its RF calibration across reboots.
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        ssid: &str,
        password: &str,
    ) -> anyhow::Result<Self> {
        validate_ssid(ssid).map_err(|e| anyhow::anyhow!("ssid: {e}"))?;
        validate_password(password).map_err(|e| anyhow::anyhow!("password: {e}"))?;

        let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sysloop.clone(), nvs)?, sysloop)?;
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|()| anyhow::anyhow!("ssid too long"))?,
            password: password
                .try_into()
                .map_err(|()| anyhow::anyhow!("password too long"))?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        }))?;
        wifi.start()?;
        info!("WiFi: station started for '{ssid}'");

        Ok(Self {
            ssid: crate::config::bounded(ssid),
            wifi,
            attempts: 0,
        })
    }

    /// Simulated station; starts disconnected.
    #[cfg(not(target_os = "espidf"))]
    pub fn simulated(ssid: &str, password: &str) -> Result<Self, ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        Ok(Self {
            ssid: crate::config::bounded(ssid),
            sim_up: false,
            sim_failures_left: 0,
            attempts: 0,
        })
    }

    /// Simulation: make the next `n` connection attempts fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn fail_next(&mut self, n: u32) {
        self.sim_failures_left = n;
    }

    /// Simulation: drop the link as if the access point went away.
    #[cfg(not(target_os = "espidf"))]
    pub fn drop_link(&mut self) {
        self.sim_up = false;
    }

    /// Total connection attempts since construction.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        self.wifi.connect().map_err(|e| {
            warn!("WiFi: associate failed ({e})");
            ConnectivityError::ConnectionFailed
        })?;
        self.wifi.wait_netif_up().map_err(|e| {
            warn!("WiFi: no IP ({e})");
            ConnectivityError::ConnectionFailed
        })?;
        if let Ok(ip) = self.wifi.wifi().sta_netif().get_ip_info() {
            info!("WiFi: got IP {}", ip.ip);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        if self.sim_failures_left > 0 {
            self.sim_failures_left -= 1;
            warn!("WiFi(sim): simulated failure (attempt {})", self.attempts);
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.sim_up = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_up
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.platform_is_connected() {
            return Ok(());
        }
        self.attempts = self.attempts.wrapping_add(1);
        info!("WiFi: connecting to '{}'", self.ssid);
        self.platform_connect()
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn name(&self) -> &'static str {
        "wifi"
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
