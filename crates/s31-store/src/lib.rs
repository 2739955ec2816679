#![no_std]
#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod backend;
pub mod config;
#[cfg(feature = "std")]
pub mod fs_backend;
pub mod record;

use alloc::boxed::Box;
use alloc::vec::Vec;

use log::{error, info};

use s31_core::{EnergyWords, S31Result};
use s31_hal::{ResetCause, ScratchMemory};

pub use backend::{MemoryBackend, StorageBackend};
pub use config::{digest_hex, ConfigData, ConfigLoad, ConfigStore, Password};
pub use record::{BootOutcome, RecordStore, SNAPSHOT_INTERVAL_MS};

/// Flash copy of the scratch record.
pub const SNAPSHOT_FILE: &str = "rtc.bin";
pub const CONFIG_FILE: &str = "conf.json";
pub const CONFIG_CHECKSUM_FILE: &str = "confchksum.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootReport {
    pub record: BootOutcome,
    pub config: ConfigLoad,
}

/// Both persistence tiers plus the configuration document, behind one owner.
pub struct PersistentStateStore {
    backend: Box<dyn StorageBackend>,
    scratch: Box<dyn ScratchMemory>,
    record: RecordStore,
    config: ConfigStore,
}

impl PersistentStateStore {
    pub fn open(
        backend: Box<dyn StorageBackend>,
        mut scratch: Box<dyn ScratchMemory>,
        cause: ResetCause,
        now_ms: u32,
    ) -> S31Result<(Self, BootReport)> {
        let (record, record_outcome) = RecordStore::boot(&mut *scratch, &*backend, cause, now_ms)?;
        let (config, config_outcome) = ConfigStore::load(&*backend);
        Ok((
            Self { backend, scratch, record, config },
            BootReport { record: record_outcome, config: config_outcome },
        ))
    }

    pub fn relay_on(&self) -> bool {
        self.record.relay_on()
    }

    /// Record the relay state and snapshot to flash immediately.
    pub fn set_relay_on(&mut self, on: bool) -> S31Result<()> {
        self.record.set_relay_on(&mut *self.scratch, on)?;
        self.record.request_snapshot();
        self.record.snapshot(&*self.scratch, &mut *self.backend)
    }

    pub fn energy(&self) -> EnergyWords {
        self.record.energy()
    }

    /// Scratch only; reaches flash with the next snapshot.
    pub fn set_energy(&mut self, energy: EnergyWords) -> S31Result<()> {
        self.record.set_energy(&mut *self.scratch, energy)
    }

    pub fn request_snapshot(&mut self) {
        self.record.request_snapshot();
    }

    pub fn config(&self) -> &ConfigData {
        self.config.data()
    }

    pub fn config_revision(&self) -> u32 {
        self.config.revision()
    }

    pub fn config_save_pending(&self) -> bool {
        self.config.save_pending()
    }

    pub fn update_config<F: FnOnce(&mut ConfigData)>(&mut self, f: F) {
        self.config.update(f);
    }

    pub fn export_config(&mut self) -> S31Result<Vec<u8>> {
        self.config.export_json(&mut *self.backend)
    }

    pub fn restore_config(&mut self, json: &[u8], digest: &str) -> S31Result<()> {
        self.config.restore_json(&mut *self.backend, json, digest)
    }

    /// Periodic work: snapshot when due, flush a pending config save.
    /// A pending config save also forces a snapshot.
    pub fn poll(&mut self, now_ms: u32) {
        if self.config.save_pending() {
            self.record.request_snapshot();
        }
        self.record.poll(&*self.scratch, &mut *self.backend, now_ms);
        self.config.poll(&mut *self.backend);
    }

    /// Wipe record, snapshot and config. Defaults are saved on the next poll.
    pub fn factory_reset(&mut self) -> S31Result<()> {
        info!("store: factory reset");
        if let Err(e) = self.config.erase(&mut *self.backend) {
            error!("store: erasing config failed: {}", e);
        }
        self.record.erase(&mut *self.scratch, &mut *self.backend)
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        &*self.backend
    }

    pub fn scratch(&self) -> &dyn ScratchMemory {
        &*self.scratch
    }
}
