//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] over the default NVS partition.  Each call
//! opens its namespace, does one operation and drops the handle again;
//! the settings store touches flash a handful of times per boot, so there
//! is nothing to gain from keeping handles open.
//!
//! `set_blob` commits before it returns, so a power cut leaves either the
//! old or the new record.  Host builds keep blobs in a map.

use crate::app::ports::{StorageError, StoragePort};
use log::info;

#[cfg(not(target_os = "espidf"))]
use std::collections::BTreeMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::{ESP_ERR_NVS_NOT_ENOUGH_SPACE, ESP_ERR_NVS_NOT_FOUND, EspError};
#[cfg(target_os = "espidf")]
use log::warn;

pub struct NvsAdapter {
    #[cfg(target_os = "espidf")]
    partition: EspDefaultNvsPartition,
    #[cfg(not(target_os = "espidf"))]
    blobs: BTreeMap<(String, String), Vec<u8>>,
}

impl NvsAdapter {
    /// Take the default partition.
    ///
    /// A partition with no free pages, or one written by another NVS
    /// version, is erased first; the gate then boots on defaults.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            let partition = EspDefaultNvsPartition::take().map_err(|e| {
                warn!("NVS: partition unavailable ({e})");
                StorageError::IoError
            })?;
            info!("NvsAdapter: default partition ready");
            Ok(Self { partition })
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("NvsAdapter: simulation backend");
            Ok(Self {
                blobs: BTreeMap::new(),
            })
        }
    }

    /// Handle on the partition, e.g. for the WiFi driver's calibration data.
    #[cfg(target_os = "espidf")]
    pub fn partition(&self) -> EspDefaultNvsPartition {
        self.partition.clone()
    }

    #[cfg(target_os = "espidf")]
    fn open(&self, namespace: &str, read_write: bool) -> Result<EspNvs<NvsDefault>, EspError> {
        EspNvs::new(self.partition.clone(), namespace, read_write)
    }

    #[cfg(not(target_os = "espidf"))]
    fn slot(namespace: &str, key: &str) -> (String, String) {
        (namespace.to_owned(), key.to_owned())
    }
}

#[cfg(target_os = "espidf")]
fn storage_error(op: &str, namespace: &str, key: &str, e: EspError) -> StorageError {
    match e.code() {
        // A namespace that was never written reads like a missing key.
        ESP_ERR_NVS_NOT_FOUND => StorageError::NotFound,
        ESP_ERR_NVS_NOT_ENOUGH_SPACE => StorageError::Full,
        code => {
            warn!("NvsAdapter: {op} {namespace}/{key} failed ({code})");
            StorageError::IoError
        }
    }
}

#[cfg(target_os = "espidf")]
impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let nvs = self
            .open(namespace, false)
            .map_err(|e| storage_error("open", namespace, key, e))?;
        match nvs.get_blob(key, buf) {
            Ok(Some(blob)) => Ok(blob.len()),
            Ok(None) => Err(StorageError::NotFound),
            Err(e) => Err(storage_error("read", namespace, key, e)),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let mut nvs = self
            .open(namespace, true)
            .map_err(|e| storage_error("open", namespace, key, e))?;
        nvs.set_blob(key, data)
            .map_err(|e| storage_error("write", namespace, key, e))
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let mut nvs = self
            .open(namespace, true)
            .map_err(|e| storage_error("open", namespace, key, e))?;
        nvs.remove(key)
            .map(|_| ())
            .map_err(|e| storage_error("delete", namespace, key, e))
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.open(namespace, false)
            .and_then(|nvs| nvs.contains(key))
            .unwrap_or(false)
    }
}

#[cfg(not(target_os = "espidf"))]
impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let blob = self
            .blobs
            .get(&Self::slot(namespace, key))
            .ok_or(StorageError::NotFound)?;
        let len = blob.len().min(buf.len());
        buf[..len].copy_from_slice(&blob[..len]);
        Ok(len)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.blobs.insert(Self::slot(namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.blobs.remove(&Self::slot(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.blobs.contains_key(&Self::slot(namespace, key))
    }
}
