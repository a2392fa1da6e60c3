//! Fixed-period interval scheduler for FutureMesh background tasks.
//!
//! Drives the slow control loops of the client: token revalidation
//! (every 5 minutes) and notification polling (every 30 seconds). Supports
//! pause/resume for offline periods and an out-of-band "fire now" for
//! events such as connectivity being restored.
//!
//! # Disabled mode
//!
//! When `period` is zero, the scheduler is disabled and
//! [`IntervalScheduler::wait_for_tick`] pends forever. A loop built around
//! it keeps reacting to its other `select!` branches.
//!
//! # Integration
//!
//! The scheduler is designed to sit inside a background task's
//! `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = connectivity.changed() => { /* pause, or resume + fire_now */ }
//!         _ = scheduler.wait_for_tick() => { /* revalidate */ }
//!     }
//! }
//! ```
//!
//! `wait_for_tick` only mutates the scheduler after its sleep completes,
//! so dropping it in a losing `select!` branch loses nothing.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when one or more periods were missed entirely (the task was
/// busy, or the host was suspended).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Fire once and schedule the next tick a full period from now.
    /// A laptop waking from sleep revalidates once, not twelve times.
    #[default]
    Skip,
    /// Fire missed ticks back to back, up to `max_catchup` of them, then
    /// fall back to `Skip`.
    CatchUp {
        /// Hard cap on consecutive catch-up ticks.
        max_catchup: u32,
    },
}

/// Full configuration for the interval scheduler.
#[derive(Debug, Clone)]
pub struct IntervalConfig {
    /// Time between ticks. `Duration::ZERO` disables the scheduler.
    pub period: Duration,
    /// Missed-period handling policy.
    pub policy: TickPolicy,
    /// Random jitter (0..max) added to the *first* tick, so that many
    /// clients started together don't hit the server in lockstep.
    pub initial_jitter: Duration,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            period: Duration::ZERO,
            policy: TickPolicy::default(),
            initial_jitter: Duration::ZERO,
        }
    }
}

impl IntervalConfig {
    /// Shortest period accepted. Anything lower is clamped up.
    pub const MIN_PERIOD: Duration = Duration::from_millis(10);

    /// A config ticking every `period` with no jitter.
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Adds first-tick jitter.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.initial_jitter = jitter;
        self
    }

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`IntervalScheduler::new`]. Rules:
    /// - a non-zero `period` below [`Self::MIN_PERIOD`] is raised to it;
    /// - `initial_jitter` is capped to one period.
    pub fn validated(mut self) -> Self {
        if !self.period.is_zero() && self.period < Self::MIN_PERIOD {
            warn!(
                period_ms = self.period.as_millis() as u64,
                min_ms = Self::MIN_PERIOD.as_millis() as u64,
                "interval period below minimum, clamping"
            );
            self.period = Self::MIN_PERIOD;
        }
        if self.initial_jitter > self.period {
            self.initial_jitter = self.period;
        }
        self
    }

    /// The period, or `None` when disabled.
    pub fn active_period(&self) -> Option<Duration> {
        if self.period.is_zero() {
            None
        } else {
            Some(self.period)
        }
    }
}

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`IntervalScheduler::wait_for_tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// `true` if the tick was requested with [`IntervalScheduler::fire_now`]
    /// rather than reached by waiting out the period.
    pub forced: bool,
    /// How many whole periods were missed before this tick.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters kept by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickMetrics {
    /// Total ticks fired.
    pub total_ticks: u64,
    /// Ticks fired by `fire_now`.
    pub total_forced: u64,
    /// Periods skipped because they were missed.
    pub total_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-period scheduler. One per background loop.
pub struct IntervalScheduler {
    config: IntervalConfig,
    period: Option<Duration>,
    tick_count: u64,
    /// When the next tick should fire.
    next_tick: Option<Instant>,
    /// Set by `fire_now`, consumed by the next tick.
    forced: bool,
    paused: bool,
    metrics: TickMetrics,
}

impl IntervalScheduler {
    /// Create a new scheduler from config.
    ///
    /// The first tick is one period (plus jitter) away; it does not fire
    /// immediately. Call [`fire_now`](Self::fire_now) for that.
    pub fn new(config: IntervalConfig) -> Self {
        let config = config.validated();
        let period = config.active_period();

        let next_tick = period.map(|p| {
            let jitter = if config.initial_jitter.is_zero() {
                Duration::ZERO
            } else {
                let max = config.initial_jitter.as_millis() as u64;
                Duration::from_millis(rand::rng().random_range(0..=max))
            };
            Instant::now() + p + jitter
        });

        match period {
            None => debug!("interval scheduler created disabled"),
            Some(p) => debug!(
                period_secs = p.as_secs_f64(),
                policy = ?config.policy,
                "interval scheduler created"
            ),
        }

        Self {
            config,
            period,
            tick_count: 0,
            next_tick,
            forced: false,
            paused: false,
            metrics: TickMetrics::default(),
        }
    }

    /// Create a scheduler ticking every `period` with default settings.
    pub fn every(period: Duration) -> Self {
        Self::new(IntervalConfig::every(period))
    }

    /// Wait until the next tick is due. Returns [`TickInfo`] for the tick.
    ///
    /// When disabled or paused this future pends forever; it never
    /// resolves on its own, but `tokio::select!` still drives other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, period) = match (self.next_tick, self.period) {
            (Some(next), Some(period)) if !self.paused => (next, period),
            _ => return std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;
        let forced = std::mem::take(&mut self.forced);

        let late_by = now.saturating_duration_since(next);
        let behind = (late_by.as_nanos() / period.as_nanos()) as u64;
        let mut ticks_skipped = 0u64;

        self.next_tick = Some(match self.config.policy {
            TickPolicy::Skip => {
                if behind > 0 {
                    ticks_skipped = behind;
                    warn!(
                        tick = self.tick_count,
                        skipped = behind,
                        "interval periods missed, skipping ahead"
                    );
                }
                now + period
            }
            TickPolicy::CatchUp { max_catchup } => {
                if behind == 0 {
                    next + period
                } else if behind <= max_catchup as u64 {
                    debug!(tick = self.tick_count, behind, "catching up missed periods");
                    next + period
                } else {
                    ticks_skipped = behind - max_catchup as u64;
                    warn!(
                        tick = self.tick_count,
                        behind,
                        skipping = ticks_skipped,
                        "interval catch-up capped at {max_catchup}"
                    );
                    now + period
                }
            }
        });

        self.metrics.total_ticks += 1;
        self.metrics.total_skipped += ticks_skipped;
        if forced {
            self.metrics.total_forced += 1;
        }

        trace!(tick = self.tick_count, forced, "interval tick fired");

        TickInfo {
            tick: self.tick_count,
            forced,
            ticks_skipped,
        }
    }

    /// Make the next tick fire immediately instead of at the end of the
    /// current period. The period restarts from that tick.
    ///
    /// Has no visible effect while paused or disabled.
    pub fn fire_now(&mut self) {
        if self.period.is_some() {
            self.next_tick = Some(Instant::now());
            self.forced = true;
            trace!(tick = self.tick_count, "interval tick forced");
        }
    }

    /// Pause the loop. `wait_for_tick` will pend until [`resume`](Self::resume) is called.
    ///
    /// Safe to call multiple times (idempotent).
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "interval scheduler paused");
        }
    }

    /// Resume after a pause.
    ///
    /// Resets the next deadline to `now + period` so the time spent paused
    /// doesn't count as missed periods.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(period) = self.period {
                self.next_tick = Some(Instant::now() + period);
            }
            self.forced = false;
            debug!(tick = self.tick_count, "interval scheduler resumed");
        }
    }

    /// Whether the scheduler is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the scheduler is disabled (zero period).
    pub fn is_disabled(&self) -> bool {
        self.period.is_none()
    }

    /// Current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Snapshot of current metrics.
    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    /// The configured period, or `None` when disabled.
    pub fn period(&self) -> Option<Duration> {
        self.period
    }
}
