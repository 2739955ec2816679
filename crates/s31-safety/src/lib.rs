#![no_std]
#![forbid(unsafe_code)]

use log::{debug, error};
use s31_time::StartStopTimer;

/// Over-power cutoff limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterlockConfig {
    /// Watts. 0 disables the interlock.
    pub max_power_w: u32,
    /// How long the load must stay at or above `max_power_w` before cutting off.
    pub hold_ms: u32,
}

impl InterlockConfig {
    pub fn is_enabled(&self) -> bool {
        self.max_power_w > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlockAction {
    /// Below the ceiling (or disabled).
    Idle,
    /// Over the ceiling, still inside the hold window.
    Armed { elapsed_ms: u32 },
    /// Hold window exhausted: the caller must switch the relay off.
    Trip,
}

/// Debounced over-power protection. Spikes shorter than the hold time
/// never trip.
pub struct PowerInterlock {
    config: InterlockConfig,
    timer: StartStopTimer,
    trips: u32,
}

impl PowerInterlock {
    pub fn new(config: InterlockConfig) -> Self {
        Self { config, timer: StartStopTimer::new(), trips: 0 }
    }

    pub fn config(&self) -> InterlockConfig {
        self.config
    }

    /// New limits take effect from the next sample; any running hold restarts.
    pub fn set_config(&mut self, config: InterlockConfig) {
        if config != self.config {
            self.timer.stop();
        }
        self.config = config;
    }

    /// Evaluate one active power sample taken at `now_ms`.
    pub fn tick(&mut self, active_power_w: f64, now_ms: u32) -> InterlockAction {
        if !self.config.is_enabled() || active_power_w < self.config.max_power_w as f64 {
            self.timer.stop();
            return InterlockAction::Idle;
        }

        let elapsed_ms = self.timer.start_if_not_running(now_ms);
        if elapsed_ms >= self.config.hold_ms {
            self.timer.stop();
            self.trips = self.trips.wrapping_add(1);
            error!(
                "interlock: {:.0} W >= {} W for {} ms, cutting power",
                active_power_w, self.config.max_power_w, elapsed_ms
            );
            return InterlockAction::Trip;
        }

        if elapsed_ms == 0 {
            debug!("interlock: armed at {:.0} W", active_power_w);
        }
        InterlockAction::Armed { elapsed_ms }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_running()
    }

    /// Number of cutoffs since boot.
    pub fn trips(&self) -> u32 {
        self.trips
    }
}
