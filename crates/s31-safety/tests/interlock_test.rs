use s31_safety::{InterlockAction, InterlockConfig, PowerInterlock};

const LIMITS: InterlockConfig = InterlockConfig { max_power_w: 100, hold_ms: 5_000 };

/// Feed `watts` once per millisecond over `[from, to]`, counting trips.
fn hold(interlock: &mut PowerInterlock, watts: f64, from: u32, to: u32) -> u32 {
    let mut trips = 0;
    let mut t = from;
    loop {
        if interlock.tick(watts, t) == InterlockAction::Trip {
            trips += 1;
        }
        if t == to { break; }
        t = t.wrapping_add(1);
    }
    trips
}

#[test]
fn test_short_spike_never_trips() {
    let mut il = PowerInterlock::new(LIMITS);
    assert_eq!(hold(&mut il, 150.0, 0, 4_999), 0);
    assert!(il.is_armed());

    assert_eq!(il.tick(50.0, 5_000), InterlockAction::Idle);
    assert!(!il.is_armed());
    assert_eq!(hold(&mut il, 50.0, 5_001, 20_000), 0);
    assert_eq!(il.trips(), 0);
}

#[test]
fn test_sustained_overload_trips_once() {
    let mut il = PowerInterlock::new(LIMITS);
    assert_eq!(hold(&mut il, 150.0, 0, 5_001), 1);
    assert_eq!(il.trips(), 1);
}

#[test]
fn test_trip_at_exact_hold() {
    let mut il = PowerInterlock::new(LIMITS);
    assert_eq!(il.tick(100.0, 10), InterlockAction::Armed { elapsed_ms: 0 });
    assert_eq!(il.tick(100.0, 5_009), InterlockAction::Armed { elapsed_ms: 4_999 });
    assert_eq!(il.tick(100.0, 5_010), InterlockAction::Trip);
    assert!(!il.is_armed());
}

#[test]
fn test_dip_restarts_hold() {
    let mut il = PowerInterlock::new(LIMITS);
    assert_eq!(hold(&mut il, 150.0, 0, 4_000), 0);
    il.tick(99.9, 4_001);
    assert_eq!(hold(&mut il, 150.0, 4_002, 9_000), 0);
    assert_eq!(il.tick(150.0, 9_002), InterlockAction::Trip);
}

#[test]
fn test_disabled_when_ceiling_zero() {
    let mut il = PowerInterlock::new(InterlockConfig { max_power_w: 0, hold_ms: 0 });
    assert_eq!(hold(&mut il, 3_000.0, 0, 10_000), 0);
    assert!(!il.is_armed());
}

#[test]
fn test_hold_across_clock_wrap() {
    let mut il = PowerInterlock::new(LIMITS);
    let start = u32::MAX - 2_000;
    assert_eq!(hold(&mut il, 150.0, start, 2_998), 0);
    assert_eq!(il.tick(150.0, 2_999), InterlockAction::Trip);
}

#[test]
fn test_reconfigure_restarts_timer() {
    let mut il = PowerInterlock::new(LIMITS);
    hold(&mut il, 150.0, 0, 4_000);
    il.set_config(InterlockConfig { max_power_w: 120, hold_ms: 5_000 });
    assert!(!il.is_armed());
    assert_eq!(il.tick(150.0, 4_001), InterlockAction::Armed { elapsed_ms: 0 });
}
