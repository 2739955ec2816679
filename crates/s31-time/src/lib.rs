#![no_std]
#![forbid(unsafe_code)]

//! Wrap-safe millisecond timing helpers. All arithmetic is modular so the
//! 49.7 day rollover of the u32 clock is harmless.

/// Milliseconds from `start` to `now`, correct across one wrap of the clock.
pub fn elapsed_ms(now: u32, start: u32) -> u32 {
    now.wrapping_sub(start)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerStatus {
    Stopped,
    Running,
}

/// Measures how long a condition has held continuously.
#[derive(Debug, Clone, Copy)]
pub struct StartStopTimer {
    started_ms: u32,
    status: TimerStatus,
}

impl Default for StartStopTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl StartStopTimer {
    pub const fn new() -> Self {
        Self { started_ms: 0, status: TimerStatus::Stopped }
    }

    /// Starts the timer if stopped (returns 0), otherwise returns the time
    /// elapsed since it was started.
    pub fn start_if_not_running(&mut self, now_ms: u32) -> u32 {
        match self.status {
            TimerStatus::Stopped => {
                self.started_ms = now_ms;
                self.status = TimerStatus::Running;
                0
            }
            TimerStatus::Running => elapsed_ms(now_ms, self.started_ms),
        }
    }

    pub fn stop(&mut self) {
        self.started_ms = 0;
        self.status = TimerStatus::Stopped;
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }
}

/// Rate limiter for periodic work: fires at most once per `period_ms`.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    period_ms: u32,
    last_ms: u32,
}

impl Interval {
    /// The first period is measured from `now_ms`.
    pub fn new(period_ms: u32, now_ms: u32) -> Self {
        Self { period_ms, last_ms: now_ms }
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    pub fn is_due(&self, now_ms: u32) -> bool {
        elapsed_ms(now_ms, self.last_ms) >= self.period_ms
    }

    /// Restart the period at `now_ms`.
    pub fn mark(&mut self, now_ms: u32) {
        self.last_ms = now_ms;
    }

    /// `true` (and re-arms) when a full period has elapsed.
    pub fn poll(&mut self, now_ms: u32) -> bool {
        if self.is_due(now_ms) {
            self.last_ms = now_ms;
            true
        } else {
            false
        }
    }
}
