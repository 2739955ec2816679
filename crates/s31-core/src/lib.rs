#![no_std]
#[cfg(feature = "std")]
extern crate std;

/// Stamped into the scratch record. Change this whenever the record layout changes.
pub const RECORD_MAGIC: u32 = 0xA453_5574;

/// Watt-seconds in one kWh.
pub const WS_PER_KWH: u32 = 3_600_000;

/// Size of the battery-backed scratch region (96 words).
pub const SCRATCH_REGION_BYTES: usize = 96 * 4;

/// Lifetime energy as persisted: whole kWh plus the watt-second remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnergyWords {
    pub kwh: u32,
    pub ws: u32,
}

/// The record mirrored between the scratch region and the flash snapshot.
///
/// Layout (little-endian words): `magic | relay | kwh | ws`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PersistedRecord {
    pub magic: u32,
    pub relay_on: bool,
    pub energy: EnergyWords,
}

impl PersistedRecord {
    pub const SIZE: usize = 16;

    /// A zeroed record carrying the current magic.
    pub fn stamped() -> Self {
        Self { magic: RECORD_MAGIC, ..Self::default() }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == RECORD_MAGIC
    }

    pub fn to_bytes(&self, buf: &mut [u8]) -> S31Result<()> {
        if buf.len() < Self::SIZE { return Err(S31Error::WireFormat); }
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&(self.relay_on as u32).to_le_bytes());
        buf[8..12].copy_from_slice(&self.energy.kwh.to_le_bytes());
        buf[12..16].copy_from_slice(&self.energy.ws.to_le_bytes());
        Ok(())
    }

    /// Decodes without judging the magic; callers decide whether to trust it.
    pub fn from_bytes(buf: &[u8]) -> S31Result<Self> {
        if buf.len() < Self::SIZE { return Err(S31Error::WireFormat); }
        let word = |at: usize| {
            let mut w = [0u8; 4];
            w.copy_from_slice(&buf[at..at + 4]);
            u32::from_le_bytes(w)
        };
        Ok(Self {
            magic: word(0),
            relay_on: word(4) != 0,
            energy: EnergyWords { kwh: word(8), ws: word(12) },
        })
    }
}

pub type S31Result<T> = Result<T, S31Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S31Error {
    Generic,
    InvalidState,
    HalError,
    WireFormat,
    ChecksumMismatch,
    NotCalibrated,
    SensorRange,
    Corrupted,
    ShortWrite,
    NotFound,
}

impl core::fmt::Display for S31Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for S31Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_layout_is_little_endian_words() {
        let rec = PersistedRecord {
            magic: RECORD_MAGIC,
            relay_on: true,
            energy: EnergyWords { kwh: 2, ws: 0x0102_0304 },
        };
        let mut buf = [0u8; PersistedRecord::SIZE];
        rec.to_bytes(&mut buf).unwrap();
        assert_eq!(&buf[0..4], &[0x74, 0x55, 0x53, 0xA4]);
        assert_eq!(&buf[4..8], &[1, 0, 0, 0]);
        assert_eq!(&buf[12..16], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(PersistedRecord::from_bytes(&buf).unwrap(), rec);
    }

    #[test]
    fn short_buffer_rejected() {
        assert_eq!(PersistedRecord::from_bytes(&[0u8; 15]), Err(S31Error::WireFormat));
        let mut small = [0u8; 4];
        assert!(PersistedRecord::stamped().to_bytes(&mut small).is_err());
    }
}
