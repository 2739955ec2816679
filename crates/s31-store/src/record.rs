//! Scratch-tier record and its periodic flash snapshot.

use log::{debug, error, info, warn};

use s31_core::{EnergyWords, PersistedRecord, S31Result};
use s31_hal::{ResetCause, ScratchMemory};
use s31_time::Interval;

use crate::backend::{write_all, StorageBackend};
use crate::SNAPSHOT_FILE;

/// Flash snapshot cadence. Bounds both flash wear and the data lost on a power cut.
pub const SNAPSHOT_INTERVAL_MS: u32 = 60 * 60 * 1000;

/// How the record was obtained at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// Warm reset: scratch taken as-is.
    ScratchKept,
    /// Scratch magic checked and found valid.
    ScratchVerified,
    /// Cold boot: scratch reloaded from the flash snapshot.
    RestoredFromSnapshot,
    /// Nothing trustworthy; region wiped and re-stamped.
    ZeroFilled,
}

pub struct RecordStore {
    record: PersistedRecord,
    last_snapshot: Option<PersistedRecord>,
    interval: Interval,
    snapshot_requested: bool,
}

fn read_scratch(scratch: &dyn ScratchMemory) -> S31Result<PersistedRecord> {
    let mut buf = [0u8; PersistedRecord::SIZE];
    scratch.read(0, &mut buf)?;
    PersistedRecord::from_bytes(&buf)
}

fn write_scratch(scratch: &mut dyn ScratchMemory, record: &PersistedRecord) -> S31Result<()> {
    let mut buf = [0u8; PersistedRecord::SIZE];
    record.to_bytes(&mut buf)?;
    scratch.write(0, &buf)
}

/// Valid snapshot only: exact size and matching magic.
fn read_snapshot(backend: &dyn StorageBackend) -> Option<PersistedRecord> {
    let bytes = backend.read(SNAPSHOT_FILE).ok()?;
    if bytes.len() != PersistedRecord::SIZE {
        warn!("store: snapshot has {} bytes, expected {}", bytes.len(), PersistedRecord::SIZE);
        return None;
    }
    let record = PersistedRecord::from_bytes(&bytes).ok()?;
    if !record.is_valid() {
        warn!("store: snapshot magic mismatch ({:#010x})", record.magic);
        return None;
    }
    Some(record)
}

fn zero_fill(scratch: &mut dyn ScratchMemory) -> S31Result<PersistedRecord> {
    let zeros = [0u8; 32];
    let mut offset = 0;
    let capacity = scratch.capacity();
    while offset < capacity {
        let n = zeros.len().min(capacity - offset);
        scratch.write(offset, &zeros[..n])?;
        offset += n;
    }
    let record = PersistedRecord::stamped();
    write_scratch(scratch, &record)?;
    Ok(record)
}

impl RecordStore {
    /// Recover the record according to why we reset.
    pub fn boot(
        scratch: &mut dyn ScratchMemory,
        backend: &dyn StorageBackend,
        cause: ResetCause,
        now_ms: u32,
    ) -> S31Result<(Self, BootOutcome)> {
        let recovered = if cause.preserves_scratch() {
            read_scratch(scratch).ok().map(|r| (r, BootOutcome::ScratchKept))
        } else if cause.is_cold() {
            match read_snapshot(backend) {
                Some(r) => {
                    write_scratch(scratch, &r)?;
                    Some((r, BootOutcome::RestoredFromSnapshot))
                }
                None => None,
            }
        } else {
            read_scratch(scratch)
                .ok()
                .filter(|r| r.is_valid())
                .map(|r| (r, BootOutcome::ScratchVerified))
        };

        let (record, outcome) = match recovered {
            Some(found) => {
                debug!("store: using scratch values {:?}", found.0);
                found
            }
            None => {
                warn!("store: no trustworthy record after {:?} reset, zero-filling", cause);
                (zero_fill(scratch)?, BootOutcome::ZeroFilled)
            }
        };

        info!(
            "store: boot {:?} -> {:?} (relay {}, {} kWh + {} Ws)",
            cause, outcome, record.relay_on, record.energy.kwh, record.energy.ws
        );

        let last_snapshot = match outcome {
            BootOutcome::RestoredFromSnapshot => Some(record),
            _ => None,
        };

        Ok((
            Self {
                record,
                last_snapshot,
                interval: Interval::new(SNAPSHOT_INTERVAL_MS, now_ms),
                snapshot_requested: false,
            },
            outcome,
        ))
    }

    pub fn record(&self) -> &PersistedRecord {
        &self.record
    }

    pub fn relay_on(&self) -> bool {
        self.record.relay_on
    }

    pub fn energy(&self) -> EnergyWords {
        self.record.energy
    }

    pub fn set_relay_on(&mut self, scratch: &mut dyn ScratchMemory, on: bool) -> S31Result<()> {
        self.record.relay_on = on;
        write_scratch(scratch, &self.record)
    }

    pub fn set_energy(&mut self, scratch: &mut dyn ScratchMemory, energy: EnergyWords) -> S31Result<()> {
        if self.record.energy == energy {
            return Ok(());
        }
        self.record.energy = energy;
        write_scratch(scratch, &self.record)
    }

    /// Snapshot on the next `poll`, regardless of the interval.
    pub fn request_snapshot(&mut self) {
        self.snapshot_requested = true;
    }

    pub fn snapshot_pending(&self) -> bool {
        self.snapshot_requested
    }

    /// Copy scratch to flash if requested, or if the interval elapsed and
    /// something changed since the last snapshot.
    pub fn poll(
        &mut self,
        scratch: &dyn ScratchMemory,
        backend: &mut dyn StorageBackend,
        now_ms: u32,
    ) -> bool {
        let due = self.interval.is_due(now_ms);
        if !self.snapshot_requested && !due {
            return false;
        }
        if !self.snapshot_requested && self.last_snapshot == Some(self.record) {
            self.interval.mark(now_ms);
            return false;
        }
        match self.snapshot(scratch, backend) {
            Ok(()) => {
                self.interval.mark(now_ms);
                true
            }
            // Keep the request so the next pass retries.
            Err(_) => {
                self.snapshot_requested = true;
                false
            }
        }
    }

    /// Write the scratch record to flash now.
    pub fn snapshot(&mut self, scratch: &dyn ScratchMemory, backend: &mut dyn StorageBackend) -> S31Result<()> {
        let record = read_scratch(scratch)?;
        let mut buf = [0u8; PersistedRecord::SIZE];
        record.to_bytes(&mut buf)?;
        match write_all(backend, SNAPSHOT_FILE, &buf) {
            Ok(()) => {
                info!("store: saved scratch record to flash");
                self.last_snapshot = Some(record);
                self.snapshot_requested = false;
                Ok(())
            }
            Err(e) => {
                error!("store: snapshot write failed: {}", e);
                Err(e)
            }
        }
    }

    /// Factory reset: drop the flash snapshot and wipe the scratch region.
    pub fn erase(&mut self, scratch: &mut dyn ScratchMemory, backend: &mut dyn StorageBackend) -> S31Result<()> {
        backend.delete(SNAPSHOT_FILE)?;
        self.record = zero_fill(scratch)?;
        self.last_snapshot = None;
        self.snapshot_requested = false;
        Ok(())
    }
}
