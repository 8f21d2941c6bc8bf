//! Persisted gate settings: identity and travel limits.
//!
//! Stored as one fixed 64-byte blob so a write is a single NVS set plus
//! commit:
//!
//! ```text
//!  ┌──────────────┬───┬───────────┬───┬─────────┬───────────┬──────────┬─────────┐
//!  │ version tag  │ 0 │ gate id   │ 0 │ open i32│ closed i32│ checksum │ zero pad│
//!  │ (≤ 16 bytes) │   │ (≤ 10)    │   │  LE     │  LE       │ 4 bytes  │ to 64   │
//!  └──────────────┴───┴───────────┴───┴─────────┴───────────┴──────────┴─────────┘
//! ```
//!
//! The checksum is the first four bytes of SHA-256 over everything before
//! it.  A record written by a different firmware version is treated as
//! absent; a record that fails to parse or verify is treated as corrupt.
//! Either way the controller boots on compiled-in defaults.

use core::fmt;

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::config::{GateConfig, GateId, is_valid_gate_id};
use crate::fsm::limits::TravelLimits;
use crate::pins::SERVO_MAX_POSITION;

pub const RECORD_LEN: usize = 64;
pub const SETTINGS_NAMESPACE: &str = "gate";
pub const SETTINGS_KEY: &str = "settings";

pub const VERSION_MAX_LEN: usize = 16;
const CHECKSUM_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsRecord {
    pub identity: GateId,
    pub limits: TravelLimits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// Written under another version tag (or never written).
    VersionMismatch,
    /// Missing terminator, bad identity, short blob, or limits that are
    /// collapsed or beyond the servo's travel.
    Malformed,
    ChecksumMismatch,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VersionMismatch => write!(f, "version mismatch"),
            Self::Malformed => write!(f, "malformed record"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
        }
    }
}

fn checksum(bytes: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = hmac_sha256::Hash::hash(bytes);
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Split off a NUL-terminated string of at most `max` bytes.
fn take_cstr(bytes: &[u8], max: usize) -> Result<(&str, &[u8]), RecordError> {
    let window = &bytes[..bytes.len().min(max + 1)];
    let nul = window
        .iter()
        .position(|&b| b == 0)
        .ok_or(RecordError::Malformed)?;
    let s = core::str::from_utf8(&bytes[..nul]).map_err(|_| RecordError::Malformed)?;
    Ok((s, &bytes[nul + 1..]))
}

fn take_i32(bytes: &[u8]) -> Result<(i32, &[u8]), RecordError> {
    let (head, rest) = bytes.split_first_chunk::<4>().ok_or(RecordError::Malformed)?;
    Ok((i32::from_le_bytes(*head), rest))
}

impl SettingsRecord {
    /// Serialize under `version` (at most [`VERSION_MAX_LEN`] bytes are
    /// stored).
    pub fn encode(&self, version: &str) -> [u8; RECORD_LEN] {
        let version = &version.as_bytes()[..version.len().min(VERSION_MAX_LEN)];
        let mut out = [0u8; RECORD_LEN];
        let mut pos = 0;
        for part in [version, self.identity.as_bytes()] {
            out[pos..pos + part.len()].copy_from_slice(part);
            pos += part.len() + 1;
        }
        for v in [self.limits.open(), self.limits.closed()] {
            out[pos..pos + 4].copy_from_slice(&v.to_le_bytes());
            pos += 4;
        }
        let sum = checksum(&out[..pos]);
        out[pos..pos + CHECKSUM_LEN].copy_from_slice(&sum);
        out
    }

    pub fn decode(bytes: &[u8], version: &str) -> Result<Self, RecordError> {
        let (tag, rest) = take_cstr(bytes, version.len()).map_err(|_| {
            // No terminator where this version's tag would end: some other
            // layout, or an erased region.
            RecordError::VersionMismatch
        })?;
        if tag != version {
            return Err(RecordError::VersionMismatch);
        }

        let (id, rest) = take_cstr(rest, crate::config::GATE_ID_MAX_LEN)?;
        if !is_valid_gate_id(id) {
            return Err(RecordError::Malformed);
        }
        let (open, rest) = take_i32(rest)?;
        let (closed, rest) = take_i32(rest)?;

        let body_len = bytes.len() - rest.len();
        let (stored, _) = rest
            .split_first_chunk::<CHECKSUM_LEN>()
            .ok_or(RecordError::Malformed)?;
        if *stored != checksum(&bytes[..body_len]) {
            return Err(RecordError::ChecksumMismatch);
        }

        let in_range = |p: i32| (0..=SERVO_MAX_POSITION).contains(&p);
        if !in_range(open) || !in_range(closed) {
            return Err(RecordError::Malformed);
        }
        let limits = TravelLimits::new(open, closed).ok_or(RecordError::Malformed)?;
        let mut identity = GateId::new();
        identity.push_str(id).map_err(|()| RecordError::Malformed)?;
        Ok(Self { identity, limits })
    }
}

/// What boot found in the settings store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(SettingsRecord),
    /// Nothing stored, or stored by a different firmware version.
    Uninitialized,
    /// Stored but unreadable.
    Corrupted,
}

pub struct SettingsStore<S> {
    storage: S,
    version: heapless::String<VERSION_MAX_LEN>,
}

impl<S: StoragePort> SettingsStore<S> {
    pub fn new(storage: S, config: &GateConfig) -> Self {
        Self {
            storage,
            version: config.settings_version.clone(),
        }
    }

    /// Read and verify the stored record.  Never fails; problems are
    /// logged and reported as a non-`Loaded` outcome.
    pub fn load(&self) -> LoadOutcome {
        let mut buf = [0u8; RECORD_LEN];
        let len = match self.storage.read(SETTINGS_NAMESPACE, SETTINGS_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => {
                info!("settings: nothing stored, using defaults");
                return LoadOutcome::Uninitialized;
            }
            Err(e) => {
                warn!("settings: read failed ({e}), using defaults");
                return LoadOutcome::Corrupted;
            }
        };

        match SettingsRecord::decode(&buf[..len], &self.version) {
            Ok(record) => {
                info!(
                    "settings: gate {} open={} closed={}",
                    record.identity,
                    record.limits.open(),
                    record.limits.closed()
                );
                LoadOutcome::Loaded(record)
            }
            Err(RecordError::VersionMismatch) => {
                info!("settings: stored record is from another version, using defaults");
                LoadOutcome::Uninitialized
            }
            Err(e) => {
                warn!("settings: {e}, using defaults");
                LoadOutcome::Corrupted
            }
        }
    }

    pub fn save(&mut self, record: &SettingsRecord) -> Result<(), StorageError> {
        let bytes = record.encode(&self.version);
        self.storage.write(SETTINGS_NAMESPACE, SETTINGS_KEY, &bytes)?;
        info!(
            "settings: saved gate {} open={} closed={}",
            record.identity,
            record.limits.open(),
            record.limits.closed()
        );
        Ok(())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}
