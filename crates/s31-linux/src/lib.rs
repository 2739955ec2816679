use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info, warn};

use s31_core::{S31Error, S31Result, SCRATCH_REGION_BYTES};
use s31_hal::{LinkProperties, PlatformClock, RamScratch, RelayOutput, ScratchMemory, SerialPort};

pub mod setup;

/// Metering UART on a character device (or any readable file).
pub struct SerialDevice {
    file: File,
    path: PathBuf,
    rx: VecDeque<u8>,
}

impl SerialDevice {
    /// Open non-blocking. TTYs are switched to raw 4800 8E1.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
            .open(&path)?;

        if setup::is_tty(file.as_raw_fd()) {
            setup::configure_tty(file.as_raw_fd(), s31_meter::BAUD_RATE)?;
            info!("serial: {} configured for {} baud 8E1", path.display(), s31_meter::BAUD_RATE);
        } else {
            info!("serial: {} is not a tty, reading raw bytes", path.display());
        }

        Ok(Self { file, path, rx: VecDeque::new() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fill(&mut self) {
        let mut buf = [0u8; 256];
        loop {
            match self.file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => self.rx.extend(&buf[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("serial: read failed: {}", e);
                    break;
                }
            }
        }
    }
}

impl SerialPort for SerialDevice {
    fn properties(&self) -> LinkProperties {
        LinkProperties { baud_rate: s31_meter::BAUD_RATE, even_parity: true }
    }

    fn available(&mut self) -> usize {
        if self.rx.is_empty() {
            self.fill();
        }
        self.rx.len()
    }

    fn read(&mut self) -> nb::Result<u8, S31Error> {
        if self.rx.is_empty() {
            self.fill();
        }
        self.rx.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

/// Milliseconds since process start, wrapping like the firmware counter.
pub struct LinuxClock(Instant);

impl LinuxClock {
    pub fn new() -> Self {
        Self(Instant::now())
    }
}

impl Default for LinuxClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformClock for LinuxClock {
    fn now_ms(&self) -> u32 {
        self.0.elapsed().as_millis() as u32
    }
}

/// Scratch region mirrored to a file, so it survives a process restart the
/// way battery-backed RAM survives a warm reset. Delete the file to simulate
/// a power cut.
pub struct FileScratch {
    ram: RamScratch,
    path: PathBuf,
}

impl FileScratch {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let ram = match fs::read(&path) {
            Ok(bytes) if bytes.len() == SCRATCH_REGION_BYTES => {
                let mut region = [0u8; SCRATCH_REGION_BYTES];
                region.copy_from_slice(&bytes);
                debug!("scratch: loaded {}", path.display());
                RamScratch::from_bytes(region)
            }
            Ok(bytes) => {
                warn!("scratch: {} has {} bytes, starting blank", path.display(), bytes.len());
                RamScratch::new()
            }
            Err(_) => {
                info!("scratch: no region at {}, starting blank", path.display());
                RamScratch::new()
            }
        };
        Self { ram, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScratchMemory for FileScratch {
    fn capacity(&self) -> usize {
        self.ram.capacity()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> S31Result<()> {
        self.ram.read(offset, buf)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> S31Result<()> {
        self.ram.write(offset, data)?;
        fs::write(&self.path, self.ram.as_bytes()).map_err(|e| {
            warn!("scratch: mirroring to {} failed: {}", self.path.display(), e);
            S31Error::HalError
        })
    }
}

/// Relay stand-in: logs transitions and optionally drives a GPIO value file
/// (e.g. `/sys/class/gpio/gpio12/value`).
pub struct LoggingRelay {
    on: bool,
    gpio: Option<PathBuf>,
}

impl LoggingRelay {
    pub fn new(gpio: Option<PathBuf>) -> Self {
        Self { on: false, gpio }
    }
}

impl RelayOutput for LoggingRelay {
    fn set(&mut self, on: bool) {
        if on != self.on {
            info!("relay: switched {}", if on { "ON" } else { "OFF" });
        }
        self.on = on;
        if let Some(gpio) = &self.gpio {
            if let Err(e) = fs::write(gpio, if on { "1" } else { "0" }) {
                warn!("relay: writing {} failed: {}", gpio.display(), e);
            }
        }
    }

    fn is_on(&self) -> bool {
        self.on
    }
}
