//! The fixed-timestep pump.

use std::sync::Arc;
use std::time::{Duration, Instant};

use plexus_dispatch::{Clock, Dispatcher, Message};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

use crate::{ClockConfig, ClockPolicy, LogicalClock};

/// One tick, as returned by [`ClockPump::wait_for_tick`].
#[derive(Debug, Clone, PartialEq)]
pub struct TickInfo {
    /// Starts at 1.
    pub tick: u64,
    /// Fixed step, always `1 / tick_rate_hz`. Manual advances carry the
    /// caller's delta instead.
    pub dt: Duration,
    /// Logical time after this tick.
    pub seconds: f64,
    /// The tick woke more than 10% of a step late.
    pub overrun: bool,
    pub ticks_skipped: u64,
}

/// Counters kept across ticks.
///
/// Timing values cover the work between a tick firing and
/// [`ClockPump::record_tick_end`], which [`ClockPump::pump`] calls itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClockMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Exponential moving average, α = 0.1.
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Fraction of the step used by the last tick. Above 1.0 is an overrun.
    pub budget_utilization: f64,
}

/// Drives a [`LogicalClock`] at a fixed rate and announces each step to a
/// [`Dispatcher`] as a time-advanced message.
///
/// Meant to sit in a `tokio::select!` loop next to network and command
/// branches:
///
/// ```ignore
/// loop {
///     tokio::select! {
///         Some(frame) = link.recv() => bridge.handle_datagram(&frame, &dispatcher),
///         info = pump.wait_for_tick() => pump.pump(&dispatcher, &info),
///     }
/// }
/// ```
pub struct ClockPump {
    config: ClockConfig,
    clock: Arc<LogicalClock>,
    tick_duration: Option<Duration>,
    tick_count: u64,
    next_tick: Option<TokioInstant>,
    tick_start: Option<Instant>,
    paused: bool,
    metrics: ClockMetrics,
}

impl ClockPump {
    pub fn new(config: ClockConfig) -> Self {
        let clock = Arc::new(LogicalClock::new(config.start_seconds));
        Self::with_clock(config, clock)
    }

    /// A pump that drives an existing clock. Its `start_seconds` is ignored.
    pub fn with_clock(config: ClockConfig, clock: Arc<LogicalClock>) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();
        let next_tick = tick_duration.map(|d| TokioInstant::now() + d);

        if let Some(step) = tick_duration {
            debug!(
                rate_hz = config.tick_rate_hz,
                step_ms = step.as_secs_f64() * 1000.0,
                policy = ?config.policy,
                "clock pump created"
            );
        } else {
            debug!("clock pump created in event-driven mode");
        }

        Self {
            config,
            clock,
            tick_duration,
            tick_count: 0,
            next_tick,
            tick_start: None,
            paused: false,
            metrics: ClockMetrics::default(),
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(ClockConfig::with_rate(tick_rate_hz))
    }

    /// The clock this pump advances. Hand it to
    /// [`Dispatcher::new`] so deferred messages follow logical time.
    pub fn clock(&self) -> Arc<LogicalClock> {
        self.clock.clone()
    }

    /// Waits for the next step and advances the logical clock by it.
    ///
    /// Pends forever when event-driven or paused.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, step) = match (self.next_tick, self.tick_duration) {
            (Some(next), Some(step)) if !self.paused => (next, step),
            _ => return std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > step / 10;
        let behind = (late_by.as_nanos() / step.as_nanos()) as u64;
        let mut ticks_skipped = 0;

        self.next_tick = Some(match self.config.policy {
            ClockPolicy::Skip => {
                if overrun {
                    ticks_skipped = behind;
                    if behind > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = behind,
                            late_ms = late_by.as_secs_f64() * 1000.0,
                            "clock overrun, skipping ahead"
                        );
                    }
                }
                now + step
            }
            ClockPolicy::CatchUp { max_catchup } => {
                if !overrun {
                    next + step
                } else {
                    ticks_skipped = behind.saturating_sub(u64::from(max_catchup));
                    if behind > 0 {
                        warn!(
                            tick = self.tick_count,
                            behind,
                            skipping = ticks_skipped,
                            max_catchup,
                            "clock overrun, catching up"
                        );
                    }
                    if behind <= u64::from(max_catchup) {
                        next + step
                    } else {
                        now + step
                    }
                }
            }
            ClockPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "clock overrun, dropping"
                    );
                }
                next + step
            }
        });

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        let seconds = self.clock.advance(step.as_secs_f64());
        trace!(tick = self.tick_count, seconds, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: step,
            seconds,
            overrun,
            ticks_skipped,
        }
    }

    /// Announces `info` to `dispatcher` and runs the resulting dispatch
    /// pass. Returns whether anything received the time-advanced message.
    pub fn pump(&mut self, dispatcher: &Dispatcher, info: &TickInfo) -> bool {
        let delivered = dispatcher.send(
            Message::time_advanced(info.seconds, info.dt.as_secs_f64()),
            false,
        );
        self.record_tick_end();
        delivered
    }

    /// Waits for one tick and pumps it.
    pub async fn tick(&mut self, dispatcher: &Dispatcher) -> TickInfo {
        let info = self.wait_for_tick().await;
        self.pump(dispatcher, &info);
        info
    }

    /// Advances the clock by `dt` seconds outside the timer and pumps the
    /// step. Works in every mode, paused included.
    pub fn advance_manually(&mut self, dt: f64, dispatcher: &Dispatcher) -> TickInfo {
        let dt = if dt.is_finite() && dt > 0.0 {
            dt
        } else {
            warn!(dt, "ignoring non-positive manual advance");
            0.0
        };
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());
        self.metrics.total_ticks += 1;

        let seconds = self.clock.advance(dt);
        let info = TickInfo {
            tick: self.tick_count,
            dt: Duration::from_secs_f64(dt),
            seconds,
            overrun: false,
            ticks_skipped: 0,
        };
        self.pump(dispatcher, &info);
        info
    }

    /// Closes the current tick for budget tracking. A no-op without an
    /// open tick.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();

        if let Some(budget) = self.tick_duration {
            let utilization = elapsed.as_secs_f64() / budget.as_secs_f64();
            self.metrics.budget_utilization = utilization;
            if utilization >= 1.0 {
                warn!(
                    tick = self.tick_count,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    budget_ms = budget.as_secs_f64() * 1000.0,
                    "tick exceeded budget"
                );
            } else if utilization >= self.config.budget_warn_threshold {
                warn!(
                    tick = self.tick_count,
                    utilization_pct = format!("{:.1}", utilization * 100.0),
                    "tick approaching budget"
                );
            }
        }

        if self.config.metrics_enabled {
            self.metrics.max_tick_time = self.metrics.max_tick_time.max(elapsed);
            let alpha = 0.1;
            let prev = self.metrics.avg_tick_time.as_secs_f64();
            self.metrics.avg_tick_time =
                Duration::from_secs_f64(prev * (1.0 - alpha) + elapsed.as_secs_f64() * alpha);
        }
    }

    /// Stops the timer. Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "clock pump paused");
        }
    }

    /// Restarts the timer one step from now, so time spent paused is not
    /// made up in a burst.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(step) = self.tick_duration {
                self.next_tick = Some(TokioInstant::now() + step);
            }
            debug!(tick = self.tick_count, "clock pump resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_event_driven(&self) -> bool {
        self.tick_duration.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Logical time now.
    pub fn seconds(&self) -> f64 {
        self.clock.now()
    }

    pub fn metrics(&self) -> &ClockMetrics {
        &self.metrics
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn tick_duration(&self) -> Option<Duration> {
        self.tick_duration
    }
}
