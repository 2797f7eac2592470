// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adaptive frame pacing state machine.
//!
//! [`FramePacer`] turns the host time read at each wake-up into a
//! [`TickPlan`]: how long until the next ideal frame, and which host
//! primitive should deliver it. It performs no scheduling itself; the
//! [`frame_loop`](crate::frame_loop) driver runs the render callback and
//! talks to the host.
//!
//! # Mode decision
//!
//! In [`PacingMode::Auto`] the pacer rides the display-synced primitive and
//! stores the time of each of the first [`SAMPLE_CAPACITY`] ticks. On the
//! tick after the window fills it compares the display's recent interval
//! against the target:
//!
//! ```text
//! average = (sample[29] - sample[20]) / 10
//! average <  target - tolerance  → Fixed (display too fast, use the timer)
//! average >= target - tolerance  → Sync  (display is close enough)
//! ```
//!
//! The decision is taken once and never revisited.
//!
//! # Drift correction
//!
//! The ideal next frame time advances by exactly one target interval per
//! tick. Timer delays are recomputed from that absolute time, so timer
//! imprecision never accumulates. When the clock overtakes the ideal time
//! (a stall), the ideal time is clamped to `now` rather than replaying the
//! missed frames.

use crate::time::{Duration, HostTime, Timebase};
use crate::trace::{ModeDecisionEvent, PacerTickEvent, ResyncEvent, Tracer};

/// Number of tick timestamps collected before the mode decision.
pub const SAMPLE_CAPACITY: usize = 30;

/// First sample of the tail window used for the mode decision.
const WINDOW_START: usize = 20;

/// Divisor applied to the tail span to get the average interval.
const WINDOW_DIVISOR: u64 = 10;

/// 1000/60 ms, in nanoseconds.
pub const TARGET_INTERVAL_NANOS: u64 = 1_000_000_000 / 60;

/// Allowed shortfall of the display interval below the target, in
/// nanoseconds.
pub const DEVIATION_TOLERANCE_NANOS: u64 = 2_000_000;

/// Which host primitive drives the loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PacingMode {
    /// Measuring the display-synced primitive; not yet decided.
    #[default]
    Auto,
    /// Locked to the timer primitive at the target interval.
    Fixed,
    /// Locked to the display-synced primitive.
    Sync,
}

impl PacingMode {
    /// Returns a short lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Fixed => "fixed",
            Self::Sync => "sync",
        }
    }

    /// The primitive used to schedule ticks in this mode.
    #[must_use]
    pub const fn primitive(self) -> Primitive {
        match self {
            Self::Fixed => Primitive::Timer,
            Self::Auto | Self::Sync => Primitive::DisplaySync,
        }
    }
}

/// A host scheduling primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Fires once before the next display repaint; ignores delays.
    DisplaySync,
    /// Fires after a requested delay.
    Timer,
}

impl Primitive {
    /// Returns a short lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DisplaySync => "display",
            Self::Timer => "timer",
        }
    }
}

/// Configuration for a [`FramePacer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacerConfig {
    /// Mode the loop starts in.
    pub initial_mode: PacingMode,
    /// Target interval between frames, in host ticks.
    pub target_interval: Duration,
    /// How far below the target the measured display interval may fall
    /// before the loop switches to the timer.
    pub deviation_tolerance: Duration,
}

impl PacerConfig {
    /// 60 Hz pacing with a 2 ms tolerance, in the given timebase.
    #[must_use]
    pub const fn new(timebase: Timebase) -> Self {
        Self {
            initial_mode: PacingMode::Auto,
            target_interval: Duration::from_nanos(TARGET_INTERVAL_NANOS, timebase),
            deviation_tolerance: Duration::from_nanos(DEVIATION_TOLERANCE_NANOS, timebase),
        }
    }

    /// Default configuration for the Web (microsecond ticks).
    ///
    /// The 60 Hz target truncates to 16 666 µs, so a drift-free timer loop
    /// runs at about 60.0024 Hz.
    #[must_use]
    pub const fn web() -> Self {
        Self::new(Timebase::MICROS)
    }

    /// Returns this configuration with a different initial mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: PacingMode) -> Self {
        self.initial_mode = mode;
        self
    }

    /// Display intervals strictly below this select [`PacingMode::Fixed`].
    #[must_use]
    pub const fn decision_threshold(&self) -> Duration {
        self.target_interval.saturating_sub(self.deviation_tolerance)
    }
}

/// Fixed-capacity, append-only store of tick timestamps.
#[derive(Clone, Debug)]
pub struct SampleWindow {
    samples: [HostTime; SAMPLE_CAPACITY],
    len: usize,
}

impl SampleWindow {
    /// Creates an empty window.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            samples: [HostTime(0); SAMPLE_CAPACITY],
            len: 0,
        }
    }

    /// Appends a timestamp. Returns `false` and drops it if the window is full.
    pub fn push(&mut self, t: HostTime) -> bool {
        if self.is_full() {
            return false;
        }
        self.samples[self.len] = t;
        self.len += 1;
        true
    }

    /// Number of stored samples.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no samples are stored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` once [`SAMPLE_CAPACITY`] samples are stored.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len == SAMPLE_CAPACITY
    }

    /// The stored samples, oldest first.
    #[must_use]
    pub fn as_slice(&self) -> &[HostTime] {
        &self.samples[..self.len]
    }

    /// Span covered by the tail window, `sample[29] - sample[20]`.
    ///
    /// Returns `None` until the window is full.
    #[must_use]
    pub fn tail_span(&self) -> Option<Duration> {
        if !self.is_full() {
            return None;
        }
        Some(self.samples[SAMPLE_CAPACITY - 1] - self.samples[WINDOW_START])
    }

    /// Average interval over the tail window, `tail_span / 10`, truncated.
    #[must_use]
    pub fn average_interval(&self) -> Option<Duration> {
        self.tail_span().map(|span| Duration(span.ticks() / WINDOW_DIVISOR))
    }
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// The outcome of one [`FramePacer::tick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickPlan {
    /// Zero-based index of this tick.
    pub frame_index: u64,
    /// Host time the tick was evaluated at.
    pub now: HostTime,
    /// Ideal time of the next frame.
    pub ideal_next: HostTime,
    /// `ideal_next - now`; zero right after a resync.
    pub delay: Duration,
    /// Primitive to schedule the next tick with.
    pub primitive: Primitive,
    /// Mode after this tick.
    pub mode: PacingMode,
    /// Whether the ideal time had fallen behind and was clamped to `now`.
    pub resynced: bool,
}

/// Per-loop pacing state.
///
/// # Usage
///
/// ```rust
/// use cadence_core::pacer::{FramePacer, PacerConfig, PacingMode, Primitive};
/// use cadence_core::time::{HostTime, Timebase};
/// use cadence_core::trace::Tracer;
///
/// let config = PacerConfig::new(Timebase::NANOS).with_mode(PacingMode::Fixed);
/// let mut pacer = FramePacer::new(config, HostTime(0));
/// let plan = pacer.tick(HostTime(1_000_000), &mut Tracer::none());
/// assert_eq!(plan.primitive, Primitive::Timer);
/// assert_eq!(plan.ideal_next, HostTime(16_666_666));
/// ```
#[derive(Clone, Debug)]
pub struct FramePacer {
    config: PacerConfig,
    mode: PacingMode,
    ideal_next: HostTime,
    samples: SampleWindow,
    frame_index: u64,
}

impl FramePacer {
    /// Creates a pacer whose ideal frame time starts at `start`.
    #[must_use]
    pub const fn new(config: PacerConfig, start: HostTime) -> Self {
        Self {
            mode: config.initial_mode,
            ideal_next: start,
            samples: SampleWindow::new(),
            frame_index: 0,
            config,
        }
    }

    /// Runs the bookkeeping for one wake-up at host time `now`.
    pub fn tick(&mut self, now: HostTime, tracer: &mut Tracer<'_>) -> TickPlan {
        let frame_index = self.frame_index;
        self.frame_index += 1;

        if self.mode == PacingMode::Auto && !self.samples.push(now) {
            self.decide(frame_index, now, tracer);
        }

        let target = self.ideal_next + self.config.target_interval;
        let resynced = target < now;
        if resynced {
            tracer.resync(&ResyncEvent {
                frame_index,
                now,
                behind: now - target,
            });
            self.ideal_next = now;
        } else {
            self.ideal_next = target;
        }

        let plan = TickPlan {
            frame_index,
            now,
            ideal_next: self.ideal_next,
            delay: self.ideal_next - now,
            primitive: self.mode.primitive(),
            mode: self.mode,
            resynced,
        };
        tracer.pacer_tick(&PacerTickEvent::from(&plan));
        plan
    }

    fn decide(&mut self, frame_index: u64, now: HostTime, tracer: &mut Tracer<'_>) {
        let Some(span) = self.samples.tail_span() else {
            return;
        };
        let threshold = self.config.decision_threshold();
        // span / 10 < threshold, without truncating the division.
        self.mode = if span < threshold.saturating_mul(WINDOW_DIVISOR) {
            PacingMode::Fixed
        } else {
            PacingMode::Sync
        };
        tracer.mode_decision(&ModeDecisionEvent {
            frame_index,
            now,
            average_interval: Duration(span.ticks() / WINDOW_DIVISOR),
            threshold,
            mode: self.mode,
        });
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> PacingMode {
        self.mode
    }

    /// Ideal time of the next frame.
    #[must_use]
    pub const fn ideal_next_frame_time(&self) -> HostTime {
        self.ideal_next
    }

    /// Collected samples.
    #[must_use]
    pub const fn samples(&self) -> &SampleWindow {
        &self.samples
    }

    /// Number of ticks run so far.
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_index
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    const T0: u64 = 1_000_000_000;
    const MS: u64 = 1_000_000;

    fn config(mode: PacingMode) -> PacerConfig {
        PacerConfig::new(Timebase::NANOS).with_mode(mode)
    }

    /// Feeds ticks spaced `interval` apart, starting one interval after `T0`.
    /// Returns the mode after each tick.
    fn feed(pacer: &mut FramePacer, interval: u64, ticks: u64) -> Vec<PacingMode> {
        (1..=ticks)
            .map(|k| pacer.tick(HostTime(T0 + k * interval), &mut Tracer::none()).mode)
            .collect()
    }

    #[test]
    fn web_config_uses_microsecond_ticks() {
        let config = PacerConfig::web();
        assert_eq!(config.target_interval, Duration(16_666));
        assert_eq!(config.deviation_tolerance, Duration(2_000));
        assert_eq!(config.decision_threshold(), Duration(14_666));
        assert_eq!(config.initial_mode, PacingMode::Auto);
    }

    #[test]
    fn sample_window_caps_at_capacity() {
        let mut window = SampleWindow::new();
        assert!(window.is_empty());
        for i in 0..SAMPLE_CAPACITY as u64 {
            assert!(window.push(HostTime(i)), "sample {i} fits");
        }
        assert!(window.is_full());
        assert!(!window.push(HostTime(99)), "31st sample is rejected");
        assert_eq!(window.len(), SAMPLE_CAPACITY);
        assert_eq!(window.as_slice().last(), Some(&HostTime(29)));
    }

    #[test]
    fn average_uses_tail_over_ten() {
        let mut window = SampleWindow::new();
        assert_eq!(window.average_interval(), None, "not full yet");
        for i in 0..SAMPLE_CAPACITY as u64 {
            window.push(HostTime(i * 100));
        }
        // Nine intervals of 100 divided by ten.
        assert_eq!(window.tail_span(), Some(Duration(900)));
        assert_eq!(window.average_interval(), Some(Duration(90)));
    }

    #[test]
    fn fast_display_switches_to_fixed_after_thirtieth_sample() {
        let mut pacer = FramePacer::new(config(PacingMode::Auto), HostTime(T0));
        let modes = feed(&mut pacer, 8 * MS, 40);

        assert!(
            modes[..30].iter().all(|m| *m == PacingMode::Auto),
            "still measuring through tick 30"
        );
        assert_eq!(pacer.samples().len(), SAMPLE_CAPACITY);
        assert_eq!(modes[30], PacingMode::Fixed, "decided on the 31st tick");
        assert!(modes[30..].iter().all(|m| *m == PacingMode::Fixed));
    }

    #[test]
    fn near_target_display_switches_to_sync() {
        let mut pacer = FramePacer::new(config(PacingMode::Auto), HostTime(T0));
        let modes = feed(&mut pacer, 16_700_000, 31);
        assert_eq!(modes[29], PacingMode::Auto);
        assert_eq!(modes[30], PacingMode::Sync);
    }

    /// Fills the window so that `sample[29] - sample[20] == span`, then runs
    /// the decision tick.
    fn decide_with_tail_span(span: u64) -> PacingMode {
        let mut pacer = FramePacer::new(config(PacingMode::Auto), HostTime(0));
        let mut now = 0;
        for i in 0..SAMPLE_CAPACITY {
            if i <= WINDOW_START {
                now += 1;
            } else if i == WINDOW_START + 1 {
                now += span;
            }
            pacer.tick(HostTime(now), &mut Tracer::none());
        }
        pacer.tick(HostTime(now + 1), &mut Tracer::none()).mode
    }

    #[test]
    fn decision_threshold_is_strict() {
        let threshold = config(PacingMode::Auto).decision_threshold().ticks();
        assert_eq!(
            decide_with_tail_span(threshold * 10),
            PacingMode::Sync,
            "average equal to the threshold keeps Sync"
        );
        assert_eq!(
            decide_with_tail_span(threshold * 10 - 1),
            PacingMode::Fixed,
            "a fraction below the threshold selects Fixed"
        );
    }

    #[test]
    fn decision_tick_does_not_record_a_sample() {
        let mut pacer = FramePacer::new(config(PacingMode::Auto), HostTime(T0));
        feed(&mut pacer, 16_800_000, 35);
        assert_eq!(pacer.samples().len(), SAMPLE_CAPACITY);
        assert_eq!(
            pacer.samples().as_slice()[29],
            HostTime(T0 + 30 * 16_800_000),
            "last sample is tick 30"
        );
    }

    #[test]
    fn explicit_modes_never_measure() {
        for mode in [PacingMode::Fixed, PacingMode::Sync] {
            let mut pacer = FramePacer::new(config(mode), HostTime(T0));
            let modes = feed(&mut pacer, 8 * MS, 40);
            assert!(modes.iter().all(|m| *m == mode), "{mode:?} is terminal");
            assert!(pacer.samples().is_empty(), "{mode:?} collects no samples");
        }
    }

    #[test]
    fn fixed_mode_ideal_time_is_drift_free() {
        let cfg = config(PacingMode::Fixed);
        let target = cfg.target_interval.ticks();
        let mut pacer = FramePacer::new(cfg, HostTime(T0));
        let jitter = [0, 300_000, 1_200_000, 50_000, 2_000_000];

        // Each tick lands a little late relative to the previous ideal time.
        let mut now = HostTime(T0);
        for (k, late) in (1..=600_u64).zip(jitter.iter().cycle()) {
            let plan = pacer.tick(now, &mut Tracer::none());
            assert_eq!(
                plan.ideal_next,
                HostTime(T0 + k * target),
                "ideal time after tick {k}"
            );
            assert!(!plan.resynced);
            assert_eq!(plan.delay, plan.ideal_next - now);
            now = plan.ideal_next + Duration(*late);
        }
    }

    #[test]
    fn stall_clamps_to_now() {
        let cfg = config(PacingMode::Fixed);
        let target = cfg.target_interval;
        let mut pacer = FramePacer::new(cfg, HostTime(T0));
        let first = pacer.tick(HostTime(T0), &mut Tracer::none());
        assert_eq!(first.ideal_next, HostTime(T0) + target);

        // Suspended for 11 frames.
        let woke = first.ideal_next + target.saturating_mul(11);
        let plan = pacer.tick(woke, &mut Tracer::none());
        assert!(plan.resynced);
        assert_eq!(plan.ideal_next, woke, "clamped to now");
        assert_eq!(plan.delay, Duration::ZERO);

        // Back to the normal cadence from the new origin.
        let next = pacer.tick(woke, &mut Tracer::none());
        assert!(!next.resynced);
        assert_eq!(next.ideal_next, woke + target);
        assert_eq!(next.delay, target);
    }

    #[test]
    fn ideal_time_never_moves_backward() {
        let mut pacer = FramePacer::new(config(PacingMode::Auto), HostTime(T0));
        let mut last = pacer.ideal_next_frame_time();
        let spacing = [8, 33, 16, 100, 1, 16, 17, 250, 4];
        let mut now = T0;
        for step in spacing.iter().cycle().take(90) {
            now += step * MS;
            let plan = pacer.tick(HostTime(now), &mut Tracer::none());
            assert!(plan.ideal_next >= last, "monotone at {now}");
            assert!(plan.ideal_next >= plan.now, "never behind now");
            last = plan.ideal_next;
        }
        assert_eq!(pacer.frame_count(), 90);
    }

    #[cfg(feature = "trace")]
    #[test]
    fn decision_is_traced_exactly_once() {
        use crate::trace::TraceSink;

        #[derive(Default)]
        struct Decisions(Vec<ModeDecisionEvent>);
        impl TraceSink for Decisions {
            fn on_mode_decision(&mut self, e: &ModeDecisionEvent) {
                self.0.push(*e);
            }
        }

        let mut sink = Decisions::default();
        let mut pacer = FramePacer::new(config(PacingMode::Auto), HostTime(T0));
        for k in 1..=60 {
            pacer.tick(HostTime(T0 + k * 8 * MS), &mut Tracer::new(&mut sink));
        }
        assert_eq!(sink.0.len(), 1, "one decision per loop");
        let decision = sink.0[0];
        assert_eq!(decision.frame_index, 30);
        assert_eq!(decision.mode, PacingMode::Fixed);
        assert_eq!(decision.average_interval, Duration(7_200_000));
    }
}
