//! Published quantities and change notification.

use s31_energy::Energy;
use s31_meter::Readings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Voltage,
    Current,
    ActivePower,
    ApparentPower,
    ReactivePower,
    EnergyKwh,
    PowerFactor,
}

impl Metric {
    pub const COUNT: usize = 7;

    /// Evaluation order of the change table.
    pub const ALL: [Metric; Metric::COUNT] = [
        Metric::Voltage,
        Metric::Current,
        Metric::ActivePower,
        Metric::ApparentPower,
        Metric::ReactivePower,
        Metric::EnergyKwh,
        Metric::PowerFactor,
    ];

    pub fn decimal_places(self) -> u32 {
        match self {
            Metric::Current => 3,
            Metric::EnergyKwh | Metric::PowerFactor => 2,
            _ => 0,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::Voltage => "V",
            Metric::Current => "A",
            Metric::ActivePower => "W",
            Metric::ApparentPower => "VA",
            Metric::ReactivePower => "var",
            Metric::EnergyKwh => "kWh",
            Metric::PowerFactor => "%",
        }
    }

    /// Unrounded value.
    pub fn sample(self, readings: &Readings, energy: &Energy) -> f64 {
        match self {
            Metric::Voltage => readings.voltage,
            Metric::Current => readings.current,
            Metric::ActivePower => readings.active_power,
            Metric::ApparentPower => readings.apparent_power(),
            Metric::ReactivePower => readings.reactive_power(),
            Metric::EnergyKwh => energy.as_kwh_f64(),
            Metric::PowerFactor => readings.power_factor(),
        }
    }
}

/// Receives rounded values whenever they differ from the last published one.
pub trait MetricSink {
    fn on_change(&mut self, metric: Metric, value: f64);

    fn on_relay(&mut self, _on: bool) {}
}

/// Round half away from zero to `places` decimals. NaN passes through.
pub fn round_places(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let mut factor = 1.0;
    for _ in 0..places {
        factor *= 10.0;
    }
    let scaled = value * factor;
    if scaled >= i64::MAX as f64 || scaled <= i64::MIN as f64 {
        return value;
    }
    let rounded = if scaled >= 0.0 { (scaled + 0.5) as i64 } else { (scaled - 0.5) as i64 };
    rounded as f64 / factor
}
