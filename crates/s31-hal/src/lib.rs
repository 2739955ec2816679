#![no_std]
#![forbid(unsafe_code)]

use s31_core::{S31Error, S31Result};

/// Serial link parameters of the metering chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkProperties {
    pub baud_rate: u32,
    pub even_parity: bool,
}

/// The metering UART.
/// INVARIANT: Must be Non-Blocking.
pub trait SerialPort {
    fn properties(&self) -> LinkProperties;

    /// Bytes that can be read right now without blocking.
    fn available(&mut self) -> usize;

    /// Read one byte. `WouldBlock` when the receive buffer is empty.
    fn read(&mut self) -> nb::Result<u8, S31Error>;

    /// Drain whatever is currently buffered into `buf`.
    /// Default Implementation: scalar loop over `read`.
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        let mut count = 0;
        for slot in buf.iter_mut() {
            match self.read() {
                Ok(b) => {
                    *slot = b;
                    count += 1;
                }
                Err(_) => break,
            }
        }
        count
    }
}

/// Free-running millisecond clock. Wraps at `u32::MAX`.
///
/// Compare intervals with `now.wrapping_sub(start) >= period`, never with
/// an absolute deadline.
pub trait PlatformClock {
    fn now_ms(&self) -> u32;
}

/// The mains relay driver.
pub trait RelayOutput {
    fn set(&mut self, on: bool);
    fn is_on(&self) -> bool;
}

/// Battery-backed scratch memory: survives warm resets, lost on power cut.
pub trait ScratchMemory {
    fn capacity(&self) -> usize;
    fn read(&self, offset: usize, buf: &mut [u8]) -> S31Result<()>;
    fn write(&mut self, offset: usize, data: &[u8]) -> S31Result<()>;
}

/// Why the SoC came out of reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCause {
    PowerOn,
    HardwareWatchdog,
    Exception,
    SoftwareWatchdog,
    SoftwareRestart,
    DeepSleepWake,
    External,
}

impl ResetCause {
    /// Scratch contents are known to have survived this kind of reset.
    pub fn preserves_scratch(self) -> bool {
        matches!(self, ResetCause::HardwareWatchdog | ResetCause::Exception | ResetCause::External)
    }

    /// Scratch is garbage after this kind of reset; only flash can be trusted.
    pub fn is_cold(self) -> bool {
        self == ResetCause::PowerOn
    }
}

impl core::str::FromStr for ResetCause {
    type Err = S31Error;

    fn from_str(s: &str) -> S31Result<Self> {
        match s {
            "power-on" | "default" => Ok(ResetCause::PowerOn),
            "watchdog" | "wdt" => Ok(ResetCause::HardwareWatchdog),
            "exception" => Ok(ResetCause::Exception),
            "soft-watchdog" => Ok(ResetCause::SoftwareWatchdog),
            "soft-restart" => Ok(ResetCause::SoftwareRestart),
            "deep-sleep" => Ok(ResetCause::DeepSleepWake),
            "external" => Ok(ResetCause::External),
            _ => Err(S31Error::InvalidState),
        }
    }
}

/// Plain RAM scratch region, for hosts without battery-backed memory.
pub struct RamScratch {
    bytes: [u8; s31_core::SCRATCH_REGION_BYTES],
}

impl Default for RamScratch {
    fn default() -> Self {
        Self::new()
    }
}

impl RamScratch {
    pub const fn new() -> Self {
        Self { bytes: [0; s31_core::SCRATCH_REGION_BYTES] }
    }

    pub fn from_bytes(bytes: [u8; s31_core::SCRATCH_REGION_BYTES]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl ScratchMemory for RamScratch {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> S31Result<()> {
        let end = offset.checked_add(buf.len()).ok_or(S31Error::HalError)?;
        let src = self.bytes.get(offset..end).ok_or(S31Error::HalError)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> S31Result<()> {
        let end = offset.checked_add(data.len()).ok_or(S31Error::HalError)?;
        let dst = self.bytes.get_mut(offset..end).ok_or(S31Error::HalError)?;
        dst.copy_from_slice(data);
        Ok(())
    }
}
