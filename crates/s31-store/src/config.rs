//! Configuration document: JSON on flash plus a SHA-256 companion file.
//!
//! A document is only accepted when it parses AND its digest matches the
//! checksum file. Anything else falls back to defaults and schedules a save,
//! so corruption heals itself on the next pass.

use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use s31_core::{S31Error, S31Result};

use crate::backend::{write_all, StorageBackend};
use crate::{CONFIG_CHECKSUM_FILE, CONFIG_FILE};

/// Web UI password. Wiped from RAM when dropped.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(s: &str) -> Self {
        Self(String::from(s))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for Password {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Password(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigData {
    pub host_name: String,
    pub web_user_name: String,
    pub web_password: Password,
    pub report_send_interval_ms: u64,
    /// Absolute power change (W) that warrants a report.
    pub wattage_threshold: u16,
    /// Relative power change (%) that warrants a report.
    pub wattage_percent_threshold: u8,
    /// Over-power ceiling in watts; 0 disables the interlock.
    pub max_power: u16,
    pub max_power_hold_ms: u32,
    pub voltage_calibration_ratio: f64,
    pub current_calibration_ratio: f64,
    pub power_calibration_ratio: f64,
}

impl Default for ConfigData {
    fn default() -> Self {
        Self {
            host_name: String::new(),
            web_user_name: String::from("admin"),
            web_password: Password::new("admin"),
            report_send_interval_ms: 60 * 1000,
            wattage_threshold: 25,
            wattage_percent_threshold: 5,
            max_power: 0,
            max_power_hold_ms: 10_000,
            voltage_calibration_ratio: 1.0,
            current_calibration_ratio: 1.0,
            power_calibration_ratio: 1.0,
        }
    }
}

/// Lowercase hex SHA-256.
pub fn digest_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn digest_matches(data: &[u8], expected: &[u8]) -> bool {
    match core::str::from_utf8(expected) {
        Ok(s) => digest_hex(data).eq_ignore_ascii_case(s.trim()),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLoad {
    Loaded,
    Missing,
    Corrupt,
}

pub struct ConfigStore {
    data: ConfigData,
    save_pending: bool,
    revision: u32,
}

impl ConfigStore {
    /// Load from flash. Never fails: on any problem the defaults are used and a
    /// save is scheduled.
    pub fn load(backend: &dyn StorageBackend) -> (Self, ConfigLoad) {
        let (data, outcome) = match Self::try_load(backend) {
            Ok(data) => {
                debug!("config: loaded from flash");
                (data, ConfigLoad::Loaded)
            }
            Err(S31Error::NotFound) => {
                info!("config: no stored config found");
                (ConfigData::default(), ConfigLoad::Missing)
            }
            Err(e) => {
                warn!("config: stored config rejected ({}), using defaults", e);
                (ConfigData::default(), ConfigLoad::Corrupt)
            }
        };
        let save_pending = outcome != ConfigLoad::Loaded;
        (Self { data, save_pending, revision: 0 }, outcome)
    }

    fn try_load(backend: &dyn StorageBackend) -> S31Result<ConfigData> {
        let doc = backend.read(CONFIG_FILE)?;
        if doc.is_empty() {
            return Err(S31Error::NotFound);
        }
        let data: ConfigData = serde_json::from_slice(&doc).map_err(|_| S31Error::Corrupted)?;
        let checksum = backend.read(CONFIG_CHECKSUM_FILE).unwrap_or_default();
        if !digest_matches(&doc, &checksum) {
            error!("config: checksum mismatch");
            return Err(S31Error::ChecksumMismatch);
        }
        Ok(data)
    }

    pub fn data(&self) -> &ConfigData {
        &self.data
    }

    /// Edit in place; the change is written on the next `poll`.
    pub fn update<F: FnOnce(&mut ConfigData)>(&mut self, f: F) {
        f(&mut self.data);
        self.save_pending = true;
    }

    pub fn reset_to_defaults(&mut self) {
        self.data = ConfigData::default();
        self.save_pending = true;
    }

    pub fn request_save(&mut self) {
        self.save_pending = true;
    }

    pub fn save_pending(&self) -> bool {
        self.save_pending
    }

    /// Bumped on every successful save or restore.
    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Flush a pending save. Returns true when a save was written.
    pub fn poll(&mut self, backend: &mut dyn StorageBackend) -> bool {
        if !self.save_pending {
            return false;
        }
        self.save(backend).is_ok()
    }

    /// Serialize and write document then checksum. On failure the save stays
    /// pending and the previous files remain authoritative.
    pub fn save(&mut self, backend: &mut dyn StorageBackend) -> S31Result<()> {
        info!("config: saving configuration");
        let json = serde_json::to_vec(&self.data).map_err(|_| S31Error::Generic)?;

        if let Err(e) = write_all(backend, CONFIG_FILE, &json) {
            error!("config: failed to write config file: {}", e);
            self.save_pending = true;
            return Err(e);
        }
        let checksum = digest_hex(&json);
        if let Err(e) = write_all(backend, CONFIG_CHECKSUM_FILE, checksum.as_bytes()) {
            error!("config: failed to write config checksum file: {}", e);
            self.save_pending = true;
            return Err(e);
        }

        self.save_pending = false;
        self.revision = self.revision.wrapping_add(1);
        info!("config: saving configuration done");
        Ok(())
    }

    /// The stored document, after flushing any pending change.
    pub fn export_json(&mut self, backend: &mut dyn StorageBackend) -> S31Result<Vec<u8>> {
        if self.save_pending {
            self.save(backend)?;
        }
        backend.read(CONFIG_FILE)
    }

    /// Replace the stored document with an uploaded one. `digest` must be the
    /// hex SHA-256 of `json`; nothing is written unless both parse and digest
    /// check out.
    pub fn restore_json(&mut self, backend: &mut dyn StorageBackend, json: &[u8], digest: &str) -> S31Result<()> {
        let data: ConfigData = serde_json::from_slice(json).map_err(|_| {
            error!("config: uploaded config does not parse");
            S31Error::Corrupted
        })?;

        let expected = digest_hex(json);
        if !expected.eq_ignore_ascii_case(digest.trim()) {
            error!("config: uploaded digest does not match, file digest: {}", expected);
            return Err(S31Error::ChecksumMismatch);
        }

        write_all(backend, CONFIG_FILE, json)?;
        write_all(backend, CONFIG_CHECKSUM_FILE, digest.trim().as_bytes())?;

        self.data = data;
        self.save_pending = false;
        self.revision = self.revision.wrapping_add(1);
        info!("config: restored uploaded configuration");
        Ok(())
    }

    /// Remove both files and fall back to defaults (saved on the next poll).
    pub fn erase(&mut self, backend: &mut dyn StorageBackend) -> S31Result<()> {
        backend.delete(CONFIG_CHECKSUM_FILE)?;
        backend.delete(CONFIG_FILE)?;
        self.reset_to_defaults();
        Ok(())
    }
}
