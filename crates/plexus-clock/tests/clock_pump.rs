//! Integration tests for the clock pump.
//!
//! Timer tests run with `start_paused = true`, so tokio auto-advances time
//! whenever every task is idle and `sleep_until` resolves at once.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use plexus_clock::{ClockConfig, ClockPolicy, ClockPump, LogicalClock};
use plexus_dispatch::{
    Clock, Dispatcher, Message, MessageRef, MsgClass, Receiver, ReceiverHandle, ReceiverKey,
    TimeAdvanced,
};

// =========================================================================
// Helpers
// =========================================================================

const ALARM: MsgClass = MsgClass(0x0400);

fn config_20hz() -> ClockConfig {
    ClockConfig::with_rate(20)
}

/// Records what it sees: time-advanced seconds, or "alarm".
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
}

impl Recorder {
    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Receiver for Recorder {
    fn msg_receive(&self, msg: &MessageRef, _d: &Dispatcher) -> bool {
        let entry = match msg.payload::<TimeAdvanced>() {
            Some(t) => format!("t={:.2}", t.seconds),
            None => "alarm".to_string(),
        };
        self.seen.lock().unwrap().push(entry);
        true
    }
}

fn wired(pump: &ClockPump) -> (Dispatcher, Arc<Recorder>) {
    let dispatcher = Dispatcher::new(pump.clock());
    let recorder = Arc::new(Recorder::default());
    for class in [MsgClass::TIME_ADVANCED, ALARM] {
        dispatcher.register_for_exact_type(class, ReceiverHandle::new(ReceiverKey(1), &recorder));
    }
    (dispatcher, recorder)
}

// =========================================================================
// ClockConfig
// =========================================================================

#[test]
fn test_default_config_is_event_driven() {
    let cfg = ClockConfig::default();
    assert_eq!(cfg.tick_rate_hz, 0);
    assert_eq!(cfg.tick_duration(), None);
    assert_eq!(cfg.policy, ClockPolicy::Skip);
}

#[test]
fn test_with_rate_sets_duration() {
    assert_eq!(
        ClockConfig::with_rate(20).tick_duration(),
        Some(Duration::from_millis(50))
    );
    assert_eq!(
        ClockConfig::with_rate(60).tick_duration(),
        Some(Duration::from_secs_f64(1.0 / 60.0))
    );
}

// =========================================================================
// Pump creation and accessors
// =========================================================================

#[test]
fn test_pump_initial_state() {
    let p = ClockPump::new(ClockConfig {
        start_seconds: 3.0,
        ..config_20hz()
    });
    assert_eq!(p.tick_count(), 0);
    assert_eq!(p.tick_rate_hz(), 20);
    assert!(!p.is_event_driven());
    assert!(!p.is_paused());
    assert_eq!(p.seconds(), 3.0);
    assert_eq!(p.clock().now(), 3.0);
}

#[test]
fn test_over_max_rate_is_clamped() {
    let p = ClockPump::with_rate(500);
    assert_eq!(p.tick_rate_hz(), ClockConfig::MAX_TICK_RATE_HZ);
}

#[test]
fn test_with_clock_shares_the_clock() {
    let clock = Arc::new(LogicalClock::new(7.0));
    let p = ClockPump::with_clock(config_20hz(), clock.clone());
    assert!(Arc::ptr_eq(&p.clock(), &clock));
    assert_eq!(p.seconds(), 7.0);
}

// =========================================================================
// Tick firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_advances_logical_time() {
    let mut p = ClockPump::new(config_20hz());

    let info = p.wait_for_tick().await;
    assert_eq!(info.tick, 1);
    assert_eq!(info.dt, Duration::from_millis(50));
    assert!((info.seconds - 0.05).abs() < 1e-9);
    assert!(!info.overrun);
    assert_eq!(info.ticks_skipped, 0);
    assert_eq!(p.clock().ticks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ticks_are_monotonic_with_fixed_dt() {
    let mut p = ClockPump::new(config_20hz());
    let mut last = 0.0;
    for expected in 1..=5 {
        let info = p.wait_for_tick().await;
        assert_eq!(info.tick, expected);
        assert_eq!(info.dt, Duration::from_millis(50));
        assert!(info.seconds > last);
        last = info.seconds;
    }
    assert!((p.seconds() - 0.25).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_event_driven_never_fires() {
    let mut p = ClockPump::with_rate(0);
    let result = tokio::time::timeout(Duration::from_secs(5), p.wait_for_tick()).await;
    assert!(result.is_err(), "event-driven pump should pend forever");
    assert_eq!(p.seconds(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_drop_and_catchup_normal_tick() {
    for policy in [ClockPolicy::Drop, ClockPolicy::CatchUp { max_catchup: 3 }] {
        let mut p = ClockPump::new(ClockConfig {
            policy,
            ..config_20hz()
        });
        let info = p.wait_for_tick().await;
        assert!(!info.overrun);
        assert_eq!(info.ticks_skipped, 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_skip_policy_reports_missed_ticks() {
    let mut p = ClockPump::new(config_20hz());
    // Let three and a half steps pass before polling.
    tokio::time::advance(Duration::from_millis(225)).await;

    let info = p.wait_for_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 3);
    // Skipped steps are not added to logical time.
    assert!((info.seconds - 0.05).abs() < 1e-9);
    assert_eq!(p.metrics().total_overruns, 1);
    assert_eq!(p.metrics().total_skipped, 3);
}

// =========================================================================
// Pause / Resume
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_pause_prevents_ticks() {
    let mut p = ClockPump::new(config_20hz());
    p.wait_for_tick().await;

    p.pause();
    assert!(p.is_paused());
    let result = tokio::time::timeout(Duration::from_secs(1), p.wait_for_tick()).await;
    assert!(result.is_err(), "paused pump should pend");
    assert_eq!(p.tick_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resume_allows_ticks_again() {
    let mut p = ClockPump::new(config_20hz());
    p.wait_for_tick().await;
    p.pause();
    p.pause();
    p.resume();
    p.resume();
    assert!(!p.is_paused());

    let info = p.wait_for_tick().await;
    assert_eq!(info.tick, 2);
    assert!(!info.overrun);
}

// =========================================================================
// Metrics
// =========================================================================

#[test]
fn test_initial_metrics_are_zero() {
    let p = ClockPump::new(config_20hz());
    let m = p.metrics();
    assert_eq!(m.total_ticks, 0);
    assert_eq!(m.total_overruns, 0);
    assert_eq!(m.avg_tick_time, Duration::ZERO);
    assert_eq!(m.max_tick_time, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_without_tick_is_noop() {
    let mut p = ClockPump::new(config_20hz());
    p.record_tick_end();
    assert_eq!(p.metrics().total_ticks, 0);
    assert_eq!(p.metrics().budget_utilization, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_budget_utilization_under_budget() {
    let mut p = ClockPump::new(config_20hz());
    p.wait_for_tick().await;
    // Budget tracking uses wall-clock time.
    std::thread::sleep(Duration::from_micros(50));
    p.record_tick_end();

    let util = p.metrics().budget_utilization;
    assert!(util > 0.0);
    assert!(util < 1.0);
    assert!(p.metrics().max_tick_time > Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_disabled_skips_timing() {
    let mut p = ClockPump::new(ClockConfig {
        metrics_enabled: false,
        ..config_20hz()
    });
    p.wait_for_tick().await;
    std::thread::sleep(Duration::from_micros(50));
    p.record_tick_end();

    assert_eq!(p.metrics().total_ticks, 1);
    assert_eq!(p.metrics().avg_tick_time, Duration::ZERO);
    assert_eq!(p.metrics().max_tick_time, Duration::ZERO);
}

// =========================================================================
// Dispatcher integration
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_tick_sends_time_advanced() {
    let mut p = ClockPump::new(config_20hz());
    let (dispatcher, recorder) = wired(&p);

    p.tick(&dispatcher).await;
    p.tick(&dispatcher).await;

    assert_eq!(recorder.seen(), vec!["t=0.05", "t=0.10"]);
    assert_eq!(p.metrics().total_ticks, 2);
}

#[tokio::test(start_paused = true)]
async fn test_deferred_message_released_on_its_tick() {
    let mut p = ClockPump::new(config_20hz());
    let (dispatcher, recorder) = wired(&p);

    assert!(dispatcher.send(Message::signal(ALARM).broadcast().at(0.12), false));
    assert_eq!(dispatcher.deferred_len(), 1);

    p.tick(&dispatcher).await; // 0.05
    p.tick(&dispatcher).await; // 0.10
    assert!(!recorder.seen().contains(&"alarm".to_string()));

    p.tick(&dispatcher).await; // 0.15
    assert_eq!(dispatcher.deferred_len(), 0);
    // Released messages queue ahead of the tick that released them.
    assert_eq!(recorder.seen(), vec!["t=0.05", "t=0.10", "alarm", "t=0.15"]);
}

#[test]
fn test_advance_manually_in_event_driven_mode() {
    let mut p = ClockPump::with_rate(0);
    let (dispatcher, recorder) = wired(&p);
    dispatcher.send(Message::signal(ALARM).broadcast().at(1.0), false);

    let info = p.advance_manually(0.5, &dispatcher);
    assert_eq!(info.tick, 1);
    assert_eq!(info.seconds, 0.5);
    assert_eq!(dispatcher.deferred_len(), 1);

    let info = p.advance_manually(0.5, &dispatcher);
    assert_eq!(info.seconds, 1.0);
    assert_eq!(dispatcher.deferred_len(), 0);
    assert_eq!(recorder.seen(), vec!["t=0.50", "alarm", "t=1.00"]);
}

#[test]
fn test_advance_manually_ignores_negative_delta() {
    let mut p = ClockPump::with_rate(0);
    let (dispatcher, _recorder) = wired(&p);
    let info = p.advance_manually(-3.0, &dispatcher);
    assert_eq!(info.seconds, 0.0);
    assert_eq!(info.dt, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_select_loop_pattern() {
    let mut p = ClockPump::new(config_20hz());
    let (dispatcher, recorder) = wired(&p);
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(1);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(160)).await;
        tx.send("stop").await.ok();
    });

    let mut fired = 0u64;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "stop");
                break;
            }
            info = p.wait_for_tick() => {
                fired += 1;
                assert_eq!(info.tick, fired);
                p.pump(&dispatcher, &info);
            }
        }
    }

    assert!(fired >= 3, "expected at least 3 ticks, got {fired}");
    assert_eq!(recorder.seen().len() as u64, fired);
}
