use clap::Parser;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use std::time::Duration;

use s31_hal::{PlatformClock, ResetCause};
use s31_linux::{FileScratch, LinuxClock, LoggingRelay, SerialDevice};
use s31_runtime::{Metric, MetricSink, RelayKernel};
use s31_store::fs_backend::FileSystemBackend;
use s31_store::PersistentStateStore;

#[derive(Parser)]
#[command(about = "Smart relay controller: CSE7766 metering, energy counter, over-power cutoff")]
struct Cli {
    /// Metering UART (or a capture file).
    #[arg(long, default_value = "/dev/ttyS0")] serial: PathBuf,
    /// Flash file system root (rtc.bin, conf.json, confchksum.txt).
    #[arg(long, default_value = "./s31-data")] data_dir: PathBuf,
    /// File standing in for battery-backed scratch memory.
    #[arg(long, default_value = "./s31-data/scratch.ram")] scratch: PathBuf,
    /// power-on, watchdog, exception, soft-watchdog, soft-restart, deep-sleep, external
    #[arg(long, default_value = "power-on")] reset_cause: ResetCause,
    #[arg(long, default_value_t = 10)] period_ms: u64,
    /// GPIO value file for the relay.
    #[arg(long)] relay_gpio: Option<PathBuf>,
    /// Override the stored over-power ceiling (W, 0 disables).
    #[arg(long)] max_power: Option<u16>,
    /// Override the stored over-power hold time.
    #[arg(long)] hold_ms: Option<u32>,
    /// Switch the relay on at startup.
    #[arg(long)] relay_on: bool,
}

struct LogSink;

impl MetricSink for LogSink {
    fn on_change(&mut self, metric: Metric, value: f64) {
        debug!("{:?}: {} {}", metric, value, metric.unit());
    }

    fn on_relay(&mut self, on: bool) {
        info!("Relay is now {}", if on { "ON" } else { "OFF" });
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    info!(">>> S31 NODE v{} <<<", env!("CARGO_PKG_VERSION"));
    info!("Reset cause: {:?}", cli.reset_cause);

    let clock = LinuxClock::new();
    let serial = SerialDevice::open(&cli.serial)?;
    let backend = FileSystemBackend::new(&cli.data_dir)?;
    let scratch = FileScratch::open(&cli.scratch);

    let (store, report) = PersistentStateStore::open(
        Box::new(backend),
        Box::new(scratch),
        cli.reset_cause,
        clock.now_ms(),
    )
    .map_err(|e| anyhow::anyhow!("opening persistent state: {}", e))?;
    info!("Boot: record {:?}, config {:?}", report.record, report.config);

    let mut kernel = RelayKernel::new(
        Box::new(serial),
        Box::new(clock),
        Box::new(LoggingRelay::new(cli.relay_gpio.clone())),
        store,
    );
    kernel.add_sink(Box::new(LogSink));

    if cli.max_power.is_some() || cli.hold_ms.is_some() {
        kernel.update_config(|c| {
            if let Some(w) = cli.max_power { c.max_power = w; }
            if let Some(ms) = cli.hold_ms { c.max_power_hold_ms = ms; }
        });
    }
    info!(
        "Interlock: max {} W, hold {} ms",
        kernel.config().max_power, kernel.config().max_power_hold_ms
    );

    if cli.relay_on && !kernel.is_relay_on() {
        if let Err(e) = kernel.set_relay(true) {
            error!("Persisting relay state failed: {}", e);
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        warn!("Signal received. Stopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    let report_clock = LinuxClock::new();
    let mut last_report = report_clock.now_ms();

    while running.load(Ordering::SeqCst) {
        kernel.poll();

        let interval = kernel.config().report_send_interval_ms.min(u32::MAX as u64) as u32;
        let now = report_clock.now_ms();
        if interval > 0 && now.wrapping_sub(last_report) >= interval {
            last_report = now;
            let stats = kernel.meter_stats();
            info!(
                "{} V, {} A, {} W, {} VA, {} var, PF {} %, {} kWh (frames {}, checksum errors {}, chip errors {})",
                kernel.voltage(),
                kernel.current(),
                kernel.active_power(),
                kernel.apparent_power(),
                kernel.reactive_power(),
                kernel.power_factor(),
                kernel.energy_kwh(),
                stats.frames,
                stats.checksum_errors,
                stats.chip_errors,
            );
        }

        std::thread::sleep(Duration::from_millis(cli.period_ms));
    }

    kernel.persist_now();
    info!("State saved. Bye.");
    Ok(())
}
