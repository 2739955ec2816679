#![no_std]
#![forbid(unsafe_code)]

//! CSE7766 power metering: UART framing, frame validation and calibration.
//! Datasheet: http://www.chipsea.com/UploadFiles/2017/08/11144342F01B5662.pdf

use log::{debug, warn};

use s31_energy::Energy;
use s31_hal::SerialPort;

pub mod frame;
pub mod framer;

pub use frame::{Adjustment, RawFrame, SensorFaults, FRAME_LEN};
pub use framer::{Framer, FramerState, SYNC_INTERVAL_MS};

pub const BAUD_RATE: u32 = 4800;

/// Voltage and current divider resistor ratios of the board.
pub const V1R: f64 = 1.0;
pub const V2R: f64 = 1.0;

/// Why a complete frame produced no readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    Checksum,
    NotCalibrated,
    SensorRange(SensorFaults),
}

/// Per-board correction applied on top of the chip coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ratios {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
}

impl Default for Ratios {
    fn default() -> Self {
        Self { voltage: 1.0, current: 1.0, power: 1.0 }
    }
}

/// Chip self-reported coefficients. Re-read from every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Calibration {
    pub voltage: u32,
    pub current: u32,
    pub power: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Readings {
    pub voltage: f64,
    pub current: f64,
    pub active_power: f64,
}

impl Readings {
    pub fn apparent_power(&self) -> f64 {
        self.voltage * self.current
    }

    pub fn reactive_power(&self) -> f64 {
        let apparent = self.apparent_power();
        let active = self.active_power;
        let sq = apparent * apparent - active * active;
        if sq > 0.0 { sqrt(sq) } else { 0.0 }
    }

    /// Percent. Reports 100 when voltage or current is zero, which is
    /// indistinguishable from an ideal load; check the power magnitude first.
    pub fn power_factor(&self) -> f64 {
        if self.voltage > 0.0 && self.current > 0.0 {
            100.0 * self.active_power / self.voltage / self.current
        } else {
            100.0
        }
    }
}

/// A successfully interpreted frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoded {
    pub readings: Readings,
    pub calibration: Calibration,
    /// Watt-seconds consumed since the previous decoded frame.
    pub energy_ws: u32,
}

/// Pulses between two observations of the free-running 16-bit counter.
pub fn pulse_delta(previous: u16, current: u16) -> u32 {
    if current >= previous {
        (current - previous) as u32
    } else {
        current as u32 + (0xFFFF - previous as u32) + 1
    }
}

/// Watt-seconds for `pulses` CF pulses: `round(pulses * coef_p / 1e6)`.
pub fn pulses_to_ws(pulses: u32, power_coef: u32) -> u32 {
    ((pulses as u64 * power_coef as u64 + 500_000) / 1_000_000) as u32
}

fn scaled(ratio: f64, coef: u32, cycle: u32, divider: f64) -> f64 {
    if cycle == 0 {
        return 0.0;
    }
    ratio * coef as f64 / cycle as f64 / divider
}

/// Newton iteration from above; converges monotonically (no_std has no f64::sqrt).
fn sqrt(x: f64) -> f64 {
    if !(x > 0.0) || !x.is_finite() {
        return if x > 0.0 { x } else { 0.0 };
    }
    let mut guess = if x >= 1.0 { x } else { 1.0 };
    loop {
        let next = 0.5 * (guess + x / guess);
        if next >= guess {
            return guess;
        }
        guess = next;
    }
}

/// Stateless-per-frame interpreter; only remembers the last pulse count.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    ratios: Ratios,
    last_pulses: Option<u16>,
}

impl FrameDecoder {
    pub fn new(ratios: Ratios) -> Self {
        Self { ratios, last_pulses: None }
    }

    pub fn ratios(&self) -> Ratios {
        self.ratios
    }

    pub fn set_ratios(&mut self, ratios: Ratios) {
        self.ratios = ratios;
    }

    pub fn decode(&mut self, frame: &RawFrame) -> Result<Decoded, FrameError> {
        if !frame.checksum_ok() {
            return Err(FrameError::Checksum);
        }

        let header = frame.header();
        if header == frame::HEADER_NOT_CALIBRATED {
            return Err(FrameError::NotCalibrated);
        }
        if SensorFaults::is_fatal(header) {
            return Err(FrameError::SensorRange(SensorFaults::from_header(header)));
        }

        let calibration = Calibration {
            voltage: frame.voltage_coef(),
            current: frame.current_coef(),
            power: frame.power_coef(),
        };
        let adj = frame.adjustment();
        let r = self.ratios;

        let voltage = if adj.voltage {
            scaled(r.voltage, calibration.voltage, frame.voltage_cycle(), V2R)
        } else {
            0.0
        };

        // 0xF2: power cycle overflowed, i.e. no load.
        let active_power = if adj.power && header != 0xF2 {
            scaled(r.power, calibration.power, frame.power_cycle(), V1R * V2R)
        } else {
            0.0
        };

        let current = if adj.current && active_power > 0.0 {
            scaled(r.current, calibration.current, frame.current_cycle(), V1R)
        } else {
            0.0
        };

        let pulses = frame.pulses();
        let energy_ws = match self.last_pulses.replace(pulses) {
            Some(prev) => pulses_to_ws(pulse_delta(prev, pulses), calibration.power),
            None => 0,
        };

        Ok(Decoded {
            readings: Readings { voltage, current, active_power },
            calibration,
            energy_ws,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeterStats {
    pub frames: u32,
    pub checksum_errors: u32,
    pub chip_errors: u32,
}

/// Owns the framer, the decoder, the last good readings and the lifetime
/// energy accumulator.
pub struct Meter {
    framer: Framer,
    decoder: FrameDecoder,
    readings: Readings,
    calibration: Calibration,
    energy: Energy,
    stats: MeterStats,
    last_error: Option<FrameError>,
}

impl Meter {
    /// `energy` seeds the accumulator, normally from the persisted record.
    pub fn new(energy: Energy, ratios: Ratios) -> Self {
        Self {
            framer: Framer::new(),
            decoder: FrameDecoder::new(ratios),
            readings: Readings::default(),
            calibration: Calibration::default(),
            energy,
            stats: MeterStats::default(),
            last_error: None,
        }
    }

    /// Drain the UART until one frame completes or no bytes are pending.
    ///
    /// Returns `None` when no frame completed this pass. Readings are only
    /// replaced on success; on error the previous values stay.
    pub fn handle(&mut self, serial: &mut dyn SerialPort, now_ms: u32) -> Option<Result<&Readings, FrameError>> {
        let mut complete = None;
        while serial.available() > 0 {
            let byte = match serial.read() {
                Ok(b) => b,
                Err(_) => break,
            };
            if let Some(frame) = self.framer.push(byte, now_ms) {
                complete = Some(frame);
                break;
            }
        }
        let frame = complete?;
        Some(self.process(&frame))
    }

    /// Validate and apply one frame.
    pub fn process(&mut self, frame: &RawFrame) -> Result<&Readings, FrameError> {
        match self.decoder.decode(frame) {
            Ok(decoded) => {
                self.stats.frames = self.stats.frames.wrapping_add(1);
                self.readings = decoded.readings;
                self.calibration = decoded.calibration;
                self.energy.add_ws(decoded.energy_ws);
                self.last_error = None;
                Ok(&self.readings)
            }
            Err(e) => {
                match e {
                    FrameError::Checksum => {
                        self.stats.checksum_errors = self.stats.checksum_errors.wrapping_add(1);
                        debug!("meter: checksum error");
                    }
                    FrameError::NotCalibrated => {
                        self.stats.chip_errors = self.stats.chip_errors.wrapping_add(1);
                        warn!("meter: chip not calibrated");
                    }
                    FrameError::SensorRange(faults) => {
                        self.stats.chip_errors = self.stats.chip_errors.wrapping_add(1);
                        warn!("meter: sensor fault: {}", faults);
                    }
                }
                self.last_error = Some(e);
                Err(e)
            }
        }
    }

    pub fn readings(&self) -> &Readings {
        &self.readings
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn energy(&self) -> &Energy {
        &self.energy
    }

    /// Administrative override of the lifetime counter.
    pub fn reset_energy(&mut self, kwh: f64) {
        self.energy.assign_kwh_f64(kwh);
    }

    pub fn ratios(&self) -> Ratios {
        self.decoder.ratios()
    }

    pub fn set_ratios(&mut self, ratios: Ratios) {
        self.decoder.set_ratios(ratios);
    }

    pub fn stats(&self) -> MeterStats {
        self.stats
    }

    pub fn last_error(&self) -> Option<FrameError> {
        self.last_error
    }

    pub fn framer_state(&self) -> FramerState {
        self.framer.state()
    }
}
