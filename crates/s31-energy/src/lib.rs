#![no_std]
#![forbid(unsafe_code)]

//! Lifetime energy counter kept as whole kWh plus a watt-second remainder.
//!
//! Accumulation is exact integer arithmetic; only the display conversion
//! touches floating point.

use core::fmt;
use core::str::FromStr;

use s31_core::{EnergyWords, S31Error, S31Result, WS_PER_KWH};

/// Largest kWh count whose watt-second form still fits a signed 32-bit value.
/// `as_ws()` wraps the kWh part modulo this limit.
pub const KWH_LINEAR_LIMIT: u32 = ((1u64 << 31) / WS_PER_KWH as u64) as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Energy {
    kwh: u32,
    ws: u32,
}

impl Energy {
    pub const fn zero() -> Self {
        Self { kwh: 0, ws: 0 }
    }

    /// Build from raw parts, normalising an oversized remainder.
    pub fn from_parts(kwh: u32, ws: u32) -> Self {
        let mut e = Self { kwh, ws: 0 };
        e.add_ws(ws);
        e
    }

    pub fn kwh(&self) -> u32 {
        self.kwh
    }

    /// Always `< WS_PER_KWH`.
    pub fn ws(&self) -> u32 {
        self.ws
    }

    /// Accumulate watt-seconds. The kWh counter wraps at `u32::MAX`.
    pub fn add_ws(&mut self, ws: u32) {
        self.kwh = self.kwh.wrapping_add(ws / WS_PER_KWH);
        self.ws += ws % WS_PER_KWH;
        if self.ws >= WS_PER_KWH {
            self.ws -= WS_PER_KWH;
            self.kwh = self.kwh.wrapping_add(1);
        }
    }

    /// Watt-seconds in a single linear value.
    ///
    /// Lossy: the kWh part wraps modulo [`KWH_LINEAR_LIMIT`]. Read `kwh()` and
    /// `ws()` for exact lifetime totals.
    pub fn as_ws(&self) -> u32 {
        (self.kwh % KWH_LINEAR_LIMIT) * WS_PER_KWH + self.ws
    }

    /// For display only.
    pub fn as_kwh_f64(&self) -> f64 {
        self.kwh as f64 + self.ws as f64 / WS_PER_KWH as f64
    }

    /// Administrative override from an absolute kWh reading.
    /// Negative and NaN inputs clear the counter.
    pub fn assign_kwh_f64(&mut self, kwh: f64) {
        self.reset();
        // NaN fails every comparison
        if !(kwh > 0.0) {
            return;
        }
        if kwh >= u32::MAX as f64 {
            self.kwh = u32::MAX;
            return;
        }
        let whole = kwh as u32;
        let frac = kwh - whole as f64;
        self.kwh = whole;
        self.add_ws((frac * WS_PER_KWH as f64 + 0.5) as u32);
    }

    pub fn reset(&mut self) {
        self.kwh = 0;
        self.ws = 0;
    }

    /// True only when BOTH parts are nonzero, so exactly 1 kWh + 0 Ws
    /// reports nothing recorded.
    pub fn has_any_recorded(&self) -> bool {
        self.kwh > 0 && self.ws > 0
    }

    pub fn to_words(&self) -> EnergyWords {
        EnergyWords { kwh: self.kwh, ws: self.ws }
    }
}

impl From<EnergyWords> for Energy {
    fn from(words: EnergyWords) -> Self {
        Self::from_parts(words.kwh, words.ws)
    }
}

impl core::ops::AddAssign<u32> for Energy {
    fn add_assign(&mut self, ws: u32) {
        self.add_ws(ws);
    }
}

/// `<kwh>+<ws>`
impl fmt::Display for Energy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.kwh, self.ws)
    }
}

/// Accepts `<kwh>+<ws>`, or a bare `<ws>` which may exceed one kWh.
impl FromStr for Energy {
    type Err = S31Error;

    fn from_str(s: &str) -> S31Result<Self> {
        let s = s.trim();
        let (kwh, ws) = match s.split_once('+') {
            Some((k, w)) => (k.trim(), w.trim()),
            None => ("0", s),
        };
        let kwh = kwh.parse::<u32>().map_err(|_| S31Error::WireFormat)?;
        let ws = ws.parse::<u32>().map_err(|_| S31Error::WireFormat)?;
        Ok(Self::from_parts(kwh, ws))
    }
}
