#![no_std]
extern crate alloc;
use alloc::boxed::Box;
use alloc::vec::Vec;

use log::{debug, error, info, warn};

use s31_core::S31Result;
use s31_energy::Energy;
use s31_hal::{PlatformClock, RelayOutput, SerialPort};
use s31_meter::{Meter, MeterStats, Ratios, Readings};
use s31_safety::{InterlockAction, InterlockConfig, PowerInterlock};
use s31_store::{ConfigData, PersistentStateStore};
use s31_time::Interval;

pub mod metrics;
pub use metrics::{round_places, Metric, MetricSink};

/// How often the running energy total is copied into scratch memory.
pub const ENERGY_FLUSH_INTERVAL_MS: u32 = 10 * 1000;

fn ratios_from(config: &ConfigData) -> Ratios {
    Ratios {
        voltage: config.voltage_calibration_ratio,
        current: config.current_calibration_ratio,
        power: config.power_calibration_ratio,
    }
}

fn interlock_from(config: &ConfigData) -> InterlockConfig {
    InterlockConfig { max_power_w: config.max_power as u32, hold_ms: config.max_power_hold_ms }
}

/// The relay controller: meter, interlock and persistence driven by one
/// cooperative `poll` loop.
pub struct RelayKernel {
    serial: Box<dyn SerialPort>,
    clock: Box<dyn PlatformClock>,
    relay: Box<dyn RelayOutput>,
    store: PersistentStateStore,

    meter: Meter,
    interlock: PowerInterlock,
    energy_flush: Interval,
    applied_revision: u32,

    values: [Option<f64>; Metric::COUNT],
    sinks: Vec<Box<dyn MetricSink>>,
}

impl RelayKernel {
    /// Takes ownership of the platform and an already opened store. The
    /// relay is driven to the persisted state before the first pass.
    pub fn new(
        serial: Box<dyn SerialPort>,
        clock: Box<dyn PlatformClock>,
        mut relay: Box<dyn RelayOutput>,
        store: PersistentStateStore,
    ) -> Self {
        let now = clock.now_ms();
        let config = store.config();
        let meter = Meter::new(Energy::from(store.energy()), ratios_from(config));
        let interlock = PowerInterlock::new(interlock_from(config));

        relay.set(store.relay_on());
        info!(
            "kernel: started, relay {}, energy {}",
            if store.relay_on() { "on" } else { "off" },
            meter.energy()
        );
        let props = serial.properties();
        debug!("kernel: meter link {} baud, even parity {}", props.baud_rate, props.even_parity);

        Self {
            serial,
            clock,
            relay,
            applied_revision: store.config_revision(),
            store,
            meter,
            interlock,
            energy_flush: Interval::new(ENERGY_FLUSH_INTERVAL_MS, now),
            values: [None; Metric::COUNT],
            sinks: Vec::new(),
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn MetricSink>) {
        self.sinks.push(sink);
    }

    /// One pass of the control loop. Returns `true` when a fresh frame was
    /// decoded.
    pub fn poll(&mut self) -> bool {
        let now = self.clock.now_ms();

        let fresh = match self.meter.handle(&mut *self.serial, now) {
            Some(Ok(_)) => true,
            Some(Err(_)) | None => false,
        };

        if self.energy_flush.poll(now) {
            self.flush_energy();
        }

        if fresh {
            self.publish_changes();
        }

        if let InterlockAction::Trip = self.interlock.tick(self.meter.readings().active_power, now) {
            if self.relay.is_on() {
                if let Err(e) = self.set_relay(false) {
                    error!("kernel: persisting interlock cutoff failed: {}", e);
                }
            }
        }

        self.store.poll(now);
        if self.store.config_revision() != self.applied_revision {
            self.apply_config();
        }

        fresh
    }

    fn flush_energy(&mut self) {
        if let Err(e) = self.store.set_energy(self.meter.energy().to_words()) {
            warn!("kernel: energy flush to scratch failed: {}", e);
        }
    }

    fn publish_changes(&mut self) {
        let readings = *self.meter.readings();
        let energy = *self.meter.energy();
        for (i, metric) in Metric::ALL.iter().enumerate() {
            let value = round_places(metric.sample(&readings, &energy), metric.decimal_places());
            if self.values[i] == Some(value) {
                continue;
            }
            self.values[i] = Some(value);
            for sink in self.sinks.iter_mut() {
                sink.on_change(*metric, value);
            }
        }
    }

    fn apply_config(&mut self) {
        let config = self.store.config();
        self.meter.set_ratios(ratios_from(config));
        self.interlock.set_config(interlock_from(config));
        self.applied_revision = self.store.config_revision();
        debug!("kernel: applied config revision {}", self.applied_revision);
    }

    /// Switch the relay and persist the new state immediately. Switching
    /// off also flushes the energy total, so the snapshot carries it.
    pub fn set_relay(&mut self, on: bool) -> S31Result<()> {
        if !on {
            self.flush_energy();
        }
        self.relay.set(on);
        info!("kernel: relay {}", if on { "on" } else { "off" });
        for sink in self.sinks.iter_mut() {
            sink.on_relay(on);
        }
        self.store.set_relay_on(on)
    }

    /// Flush energy to scratch and snapshot to flash right away, e.g. before
    /// a planned shutdown.
    pub fn persist_now(&mut self) {
        self.flush_energy();
        self.store.request_snapshot();
        self.store.poll(self.clock.now_ms());
    }

    pub fn toggle_relay(&mut self) -> S31Result<()> {
        let on = !self.relay.is_on();
        self.set_relay(on)
    }

    pub fn is_relay_on(&self) -> bool {
        self.relay.is_on()
    }

    fn value(&self, metric: Metric) -> f64 {
        round_places(
            metric.sample(self.meter.readings(), self.meter.energy()),
            metric.decimal_places(),
        )
    }

    pub fn voltage(&self) -> f64 {
        self.value(Metric::Voltage)
    }

    pub fn current(&self) -> f64 {
        self.value(Metric::Current)
    }

    pub fn active_power(&self) -> f64 {
        self.value(Metric::ActivePower)
    }

    pub fn apparent_power(&self) -> f64 {
        self.value(Metric::ApparentPower)
    }

    pub fn reactive_power(&self) -> f64 {
        self.value(Metric::ReactivePower)
    }

    pub fn power_factor(&self) -> f64 {
        self.value(Metric::PowerFactor)
    }

    pub fn energy_kwh(&self) -> f64 {
        self.value(Metric::EnergyKwh)
    }

    /// Linear watt-seconds. Wraps once the counter passes the linear limit.
    pub fn energy_ws(&self) -> u32 {
        self.meter.energy().as_ws()
    }

    /// Outlet in use.
    pub fn any_power(&self) -> bool {
        self.meter.readings().active_power > 0.0
    }

    pub fn readings(&self) -> &Readings {
        self.meter.readings()
    }

    pub fn meter_stats(&self) -> MeterStats {
        self.meter.stats()
    }

    pub fn interlock_trips(&self) -> u32 {
        self.interlock.trips()
    }

    /// Administrative override of the lifetime counter; persisted with the
    /// next snapshot.
    pub fn reset_energy(&mut self, kwh: f64) -> S31Result<()> {
        self.meter.reset_energy(kwh);
        info!("kernel: energy counter set to {}", self.meter.energy());
        self.store.set_energy(self.meter.energy().to_words())?;
        self.store.request_snapshot();
        Ok(())
    }

    /// Wipe persisted state and configuration, switch the relay off.
    pub fn factory_reset(&mut self) -> S31Result<()> {
        warn!("kernel: factory reset");
        self.relay.set(false);
        for sink in self.sinks.iter_mut() {
            sink.on_relay(false);
        }
        self.meter.reset_energy(0.0);
        let result = self.store.factory_reset();
        self.apply_config();
        result
    }

    pub fn config(&self) -> &ConfigData {
        self.store.config()
    }

    /// Edit the configuration. Takes effect immediately; saved on the next pass.
    pub fn update_config<F: FnOnce(&mut ConfigData)>(&mut self, f: F) {
        self.store.update_config(f);
        self.apply_config();
    }

    pub fn export_config(&mut self) -> S31Result<Vec<u8>> {
        self.store.export_config()
    }

    pub fn restore_config(&mut self, json: &[u8], digest: &str) -> S31Result<()> {
        self.store.restore_config(json, digest)?;
        self.apply_config();
        Ok(())
    }

    pub fn store(&self) -> &PersistentStateStore {
        &self.store
    }
}
