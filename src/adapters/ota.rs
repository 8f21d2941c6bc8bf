//! Pull-style firmware update over HTTP, backed by the `esp-ota` crate.
//!
//! Flow: `GET <update_url>/<gate id>` → 304/204 means nothing new, 200
//! streams the body into the inactive OTA partition → finalize → mark
//! bootable.  The caller reboots on [`UpdateOutcome::Updated`].
//!
//! On simulation targets the HTTP response is scripted and the image is
//! only counted, so the same state machine runs in host tests.

use core::fmt::{self, Write as _};

use log::{info, warn};

use crate::app::ports::{UpdateOutcome, UpdatePort};

/// Largest image accepted (size of one OTA app slot).
pub const MAX_FIRMWARE_SIZE: u32 = 0x1E_0000;

/// Body read chunk.
const CHUNK_LEN: usize = 1024;

pub type UpdateUrl = heapless::String<128>;

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    AlreadyInProgress,
    InvalidSize,
    BeginFailed,
    WriteFailed,
    VerifyFailed,
    BootSetFailed,
    IncompleteTransfer,
    NotReceiving,
    Overflow,
    UrlTooLong,
}

impl OtaError {
    /// Negative codes keep these apart from HTTP statuses and `esp_err_t`
    /// values in [`UpdateOutcome::Failed`].
    pub fn code(self) -> i32 {
        match self {
            Self::AlreadyInProgress => -1,
            Self::InvalidSize => -2,
            Self::BeginFailed => -3,
            Self::WriteFailed => -4,
            Self::VerifyFailed => -5,
            Self::BootSetFailed => -6,
            Self::IncompleteTransfer => -7,
            Self::NotReceiving => -8,
            Self::Overflow => -9,
            Self::UrlTooLong => -10,
        }
    }
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInProgress => write!(f, "OTA session already in progress"),
            Self::InvalidSize => write!(f, "firmware size out of range"),
            Self::BeginFailed => write!(f, "OTA begin failed"),
            Self::WriteFailed => write!(f, "OTA write failed"),
            Self::VerifyFailed => write!(f, "OTA verification failed"),
            Self::BootSetFailed => write!(f, "set boot partition failed"),
            Self::IncompleteTransfer => write!(f, "body shorter than Content-Length"),
            Self::NotReceiving => write!(f, "no OTA session open"),
            Self::Overflow => write!(f, "body longer than allowed"),
            Self::UrlTooLong => write!(f, "update URL too long"),
        }
    }
}

// ── Image writer ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaState {
    Idle,
    Receiving {
        /// `None` when the server sent no Content-Length.
        expected_size: Option<u32>,
        bytes_written: u32,
    },
    ReadyToReboot,
    Failed,
}

/// Sequential writer into the inactive OTA partition.
pub struct ImageWriter {
    state: OtaState,
    #[cfg(target_os = "espidf")]
    ota_update: Option<esp_ota::OtaUpdate>,
}

impl Default for ImageWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter {
    pub fn new() -> Self {
        Self {
            state: OtaState::Idle,
            #[cfg(target_os = "espidf")]
            ota_update: None,
        }
    }

    pub fn state(&self) -> OtaState {
        self.state
    }

    /// Open the inactive partition.  `expected_size` comes from the
    /// response's Content-Length when present.
    pub fn begin(&mut self, expected_size: Option<u32>) -> Result<(), OtaError> {
        if matches!(self.state, OtaState::Receiving { .. }) {
            return Err(OtaError::AlreadyInProgress);
        }
        if let Some(size) = expected_size {
            if size == 0 || size > MAX_FIRMWARE_SIZE {
                return Err(OtaError::InvalidSize);
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let update = esp_ota::OtaUpdate::begin().map_err(|e| {
                warn!("esp-ota begin failed: {:?}", e);
                OtaError::BeginFailed
            })?;
            self.ota_update = Some(update);
        }

        self.state = OtaState::Receiving {
            expected_size,
            bytes_written: 0,
        };
        match expected_size {
            Some(n) => info!("OTA: begin ({n} bytes)"),
            None => info!("OTA: begin (length unknown)"),
        }
        Ok(())
    }

    /// Append the next chunk of the image.  Returns total bytes written.
    pub fn write(&mut self, data: &[u8]) -> Result<u32, OtaError> {
        let OtaState::Receiving {
            expected_size,
            bytes_written,
        } = self.state
        else {
            return Err(OtaError::NotReceiving);
        };

        let limit = expected_size.unwrap_or(MAX_FIRMWARE_SIZE);
        let new_written = bytes_written.saturating_add(data.len() as u32);
        if new_written > limit {
            self.abort();
            return Err(OtaError::Overflow);
        }

        #[cfg(target_os = "espidf")]
        {
            let Some(update) = self.ota_update.as_mut() else {
                return Err(OtaError::NotReceiving);
            };
            if let Err(e) = update.write(data) {
                warn!("esp-ota write failed: {:?}", e);
                self.abort();
                return Err(OtaError::WriteFailed);
            }
        }

        self.state = OtaState::Receiving {
            expected_size,
            bytes_written: new_written,
        };
        Ok(new_written)
    }

    /// Verify the image and mark its partition bootable.
    pub fn finalize(&mut self) -> Result<(), OtaError> {
        match self.state {
            OtaState::Receiving {
                expected_size: Some(expected),
                bytes_written,
            } if bytes_written != expected => {
                self.abort();
                return Err(OtaError::IncompleteTransfer);
            }
            OtaState::Receiving { bytes_written: 0, .. } => {
                self.abort();
                return Err(OtaError::InvalidSize);
            }
            OtaState::Receiving { .. } => {}
            _ => return Err(OtaError::NotReceiving),
        }

        #[cfg(target_os = "espidf")]
        {
            let Some(update) = self.ota_update.take() else {
                self.state = OtaState::Failed;
                return Err(OtaError::NotReceiving);
            };
            let mut completed = update.finalize().map_err(|e| {
                warn!("esp-ota finalize failed: {:?}", e);
                self.state = OtaState::Failed;
                OtaError::VerifyFailed
            })?;
            completed.set_as_boot_partition().map_err(|e| {
                warn!("esp-ota set_as_boot_partition failed: {:?}", e);
                self.state = OtaState::Failed;
                OtaError::BootSetFailed
            })?;
        }

        self.state = OtaState::ReadyToReboot;
        info!("OTA: finalized, ready to reboot");
        Ok(())
    }

    /// Drop the open session; the partition is left unbootable.
    pub fn abort(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            // esp-ota aborts when OtaUpdate is dropped
            self.ota_update.take();
        }
        self.state = OtaState::Idle;
        warn!("OTA: aborted");
    }
}

// ── HTTP update check ─────────────────────────────────────────

/// What the update server's status code means for us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    NoUpdate,
    Image,
    Error(u16),
}

pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200 => StatusClass::Image,
        204 | 304 => StatusClass::NoUpdate,
        other => StatusClass::Error(other),
    }
}

/// `<base>/<gate id>`, without doubling a trailing slash on `base`.
pub fn update_url(base: &str, gate_id: &str) -> Result<UpdateUrl, OtaError> {
    let mut url = UpdateUrl::new();
    write!(url, "{}/{gate_id}", base.trim_end_matches('/')).map_err(|_| OtaError::UrlTooLong)?;
    Ok(url)
}

/// Pump `read` into `writer` until it returns 0, then finalize.
fn stream_image<E>(
    writer: &mut ImageWriter,
    expected_size: Option<u32>,
    mut read: impl FnMut(&mut [u8]) -> Result<usize, E>,
    read_error: impl Fn(E) -> i32,
) -> Result<u32, i32> {
    writer.begin(expected_size).map_err(OtaError::code)?;
    let mut buf = [0u8; CHUNK_LEN];
    let mut total = 0;
    loop {
        let n = match read(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                writer.abort();
                return Err(read_error(e));
            }
        };
        if n == 0 {
            break;
        }
        total = writer.write(&buf[..n]).map_err(OtaError::code)?;
    }
    writer.finalize().map_err(OtaError::code)?;
    Ok(total)
}

/// [`UpdatePort`] that polls an HTTP server for a per-gate image.
pub struct HttpUpdater {
    base_url: &'static str,
    writer: ImageWriter,
    #[cfg(not(target_os = "espidf"))]
    sim_response: Option<(u16, Vec<u8>)>,
    #[cfg(not(target_os = "espidf"))]
    last_url: Option<UpdateUrl>,
}

impl HttpUpdater {
    pub fn new(base_url: &'static str) -> Self {
        Self {
            base_url,
            writer: ImageWriter::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_response: None,
            #[cfg(not(target_os = "espidf"))]
            last_url: None,
        }
    }

    /// Simulation: the next check answers `status` with `body`.
    #[cfg(not(target_os = "espidf"))]
    pub fn respond_with(&mut self, status: u16, body: Vec<u8>) {
        self.sim_response = Some((status, body));
    }

    /// Simulation: the URL requested by the last check.
    #[cfg(not(target_os = "espidf"))]
    pub fn last_url(&self) -> Option<&str> {
        self.last_url.as_deref()
    }

    pub fn writer_state(&self) -> OtaState {
        self.writer.state()
    }

    #[cfg(target_os = "espidf")]
    fn fetch(&mut self, url: &str) -> Result<UpdateOutcome, i32> {
        use esp_idf_svc::http::Method;
        use esp_idf_svc::http::client::{Configuration, EspHttpConnection};

        let mut conn = EspHttpConnection::new(&Configuration {
            timeout: Some(core::time::Duration::from_secs(10)),
            ..Default::default()
        })
        .map_err(|e| e.code())?;
        conn.initiate_request(Method::Get, url, &[])
            .map_err(|e| e.code())?;
        conn.initiate_response().map_err(|e| e.code())?;

        match classify_status(conn.status()) {
            StatusClass::NoUpdate => return Ok(UpdateOutcome::NoUpdate),
            StatusClass::Error(status) => return Err(i32::from(status)),
            StatusClass::Image => {}
        }

        let expected = conn
            .header("Content-Length")
            .and_then(|v| v.trim().parse::<u32>().ok());
        let total = stream_image(&mut self.writer, expected, |buf| conn.read(buf), |e| e.code())?;
        info!("update: {total} bytes from {url}");
        Ok(UpdateOutcome::Updated)
    }

    #[cfg(not(target_os = "espidf"))]
    fn fetch(&mut self, url: &str) -> Result<UpdateOutcome, i32> {
        self.last_url = Some(crate::config::bounded(url));
        let Some((status, body)) = self.sim_response.take() else {
            return Ok(UpdateOutcome::NoUpdate);
        };
        match classify_status(status) {
            StatusClass::NoUpdate => return Ok(UpdateOutcome::NoUpdate),
            StatusClass::Error(status) => return Err(i32::from(status)),
            StatusClass::Image => {}
        }

        let mut rest = body.as_slice();
        let total = stream_image(
            &mut self.writer,
            Some(body.len() as u32),
            |buf: &mut [u8]| -> Result<usize, core::convert::Infallible> {
                let n = rest.len().min(buf.len());
                buf[..n].copy_from_slice(&rest[..n]);
                rest = &rest[n..];
                Ok(n)
            },
            |e| match e {},
        )?;
        info!("update(sim): {total} bytes from {url}");
        Ok(UpdateOutcome::Updated)
    }
}

impl UpdatePort for HttpUpdater {
    fn check_for_update(&mut self, gate_id: &str) -> UpdateOutcome {
        let url = match update_url(self.base_url, gate_id) {
            Ok(url) => url,
            Err(e) => {
                warn!("update: {e}");
                return UpdateOutcome::Failed(e.code());
            }
        };
        match self.fetch(&url) {
            Ok(outcome) => outcome,
            Err(code) => {
                warn!("update: GET {url} failed ({code})");
                UpdateOutcome::Failed(code)
            }
        }
    }
}

// ── Boot validation / reboot ──────────────────────────────────

/// Mark the running image valid so the bootloader does not roll back.
#[cfg(target_os = "espidf")]
pub fn mark_running_image_valid() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: firmware marked valid (rollback cancelled)"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn mark_running_image_valid() {
    info!("OTA rollback check (simulation): skipped");
}

/// Soft-reset into the newly written image.
#[cfg(target_os = "espidf")]
pub fn reboot() -> ! {
    info!("OTA: rebooting into new firmware");
    esp_ota::restart();
}
