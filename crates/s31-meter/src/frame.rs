//! CSE7766 telemetry frame layout.
//!
//! ```text
//!  0      header        55 = ok, AA = not calibrated, Fx = state flags
//!  1      sync          5A
//!  2..5   voltage coefficient   (BE24)
//!  5..8   voltage cycle         (BE24)
//!  8..11  current coefficient   (BE24)
//! 11..14  current cycle         (BE24)
//! 14..17  power coefficient     (BE24)
//! 17..20  power cycle           (BE24)
//! 20      adjustment            data-valid flags
//! 21..23  CF pulse counter      (BE16)
//! 23      checksum              low byte of sum(2..=22)
//! ```

pub const FRAME_LEN: usize = 24;

pub const HEADER_OK: u8 = 0x55;
pub const HEADER_NOT_CALIBRATED: u8 = 0xAA;
/// Headers from here up carry state flags in the low nibble.
pub const HEADER_FLAGS_MIN: u8 = 0xF0;
pub const SYNC: u8 = 0x5A;

/// First and last byte covered by the checksum.
pub const CHECKSUM_START: usize = 2;
pub const CHECKSUM_END: usize = 22;

fn be24(b: &[u8]) -> u32 {
    (b[0] as u32) << 16 | (b[1] as u32) << 8 | b[2] as u32
}

/// Chip fault bits carried by an `Fx` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorFaults {
    pub coefficient_storage_abnormal: bool,
    pub power_cycle_overrange: bool,
    pub current_cycle_overrange: bool,
    pub voltage_cycle_overrange: bool,
}

impl SensorFaults {
    pub fn from_header(header: u8) -> Self {
        let has = |mask: u8| header & mask == mask;
        Self {
            coefficient_storage_abnormal: has(0xF1),
            power_cycle_overrange: has(0xF2),
            current_cycle_overrange: has(0xF4),
            voltage_cycle_overrange: has(0xF8),
        }
    }

    /// The header reports an overrange condition that invalidates the frame.
    pub fn is_fatal(header: u8) -> bool {
        header & 0xFC > HEADER_FLAGS_MIN
    }
}

impl core::fmt::Display for SensorFaults {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut sep = "";
        for (set, what) in [
            (self.coefficient_storage_abnormal, "abnormal coefficient storage"),
            (self.power_cycle_overrange, "power cycle out of range"),
            (self.current_cycle_overrange, "current cycle out of range"),
            (self.voltage_cycle_overrange, "voltage cycle out of range"),
        ] {
            if set {
                write!(f, "{}{}", sep, what)?;
                sep = ", ";
            }
        }
        Ok(())
    }
}

/// Which measurement cycles the chip marked as valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Adjustment {
    pub voltage: bool,
    pub current: bool,
    pub power: bool,
}

impl From<u8> for Adjustment {
    fn from(adj: u8) -> Self {
        Self {
            voltage: adj & 0x40 != 0,
            current: adj & 0x20 != 0,
            power: adj & 0x10 != 0,
        }
    }
}

/// One complete 24-byte frame with its computed checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    pub(crate) bytes: [u8; FRAME_LEN],
    pub(crate) sum: u8,
}

impl RawFrame {
    pub fn new(bytes: [u8; FRAME_LEN]) -> Self {
        let sum = bytes[CHECKSUM_START..=CHECKSUM_END]
            .iter()
            .fold(0u8, |acc, b| acc.wrapping_add(*b));
        Self { bytes, sum }
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    pub fn checksum_ok(&self) -> bool {
        self.sum == self.bytes[23]
    }

    pub fn header(&self) -> u8 { self.bytes[0] }
    pub fn voltage_coef(&self) -> u32 { be24(&self.bytes[2..5]) }
    pub fn voltage_cycle(&self) -> u32 { be24(&self.bytes[5..8]) }
    pub fn current_coef(&self) -> u32 { be24(&self.bytes[8..11]) }
    pub fn current_cycle(&self) -> u32 { be24(&self.bytes[11..14]) }
    pub fn power_coef(&self) -> u32 { be24(&self.bytes[14..17]) }
    pub fn power_cycle(&self) -> u32 { be24(&self.bytes[17..20]) }
    pub fn adjustment(&self) -> Adjustment { Adjustment::from(self.bytes[20]) }

    pub fn pulses(&self) -> u16 {
        u16::from_be_bytes([self.bytes[21], self.bytes[22]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_bits_use_full_masks() {
        let f = SensorFaults::from_header(0xF6);
        assert!(f.power_cycle_overrange);
        assert!(f.current_cycle_overrange);
        assert!(!f.coefficient_storage_abnormal);
        assert!(!f.voltage_cycle_overrange);
        assert!(SensorFaults::is_fatal(0xF4));
        assert!(!SensorFaults::is_fatal(0xF2));
        assert!(!SensorFaults::is_fatal(HEADER_OK));
    }

    #[test]
    fn adjustment_flags() {
        let a = Adjustment::from(0xE1);
        assert!(a.voltage && a.current && !a.power);
    }
}
