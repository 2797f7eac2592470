// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reusable cadence metrics and grading for demo harnesses.
//!
//! Feed the interval between consecutive render calls into a
//! [`CadenceTracker`] and it reports how close the loop is to its target
//! rate:
//!
//! ```
//! use cadence_core::pacer::PacingMode;
//! use cadence_harness::{CadenceGrade, CadenceSample, CadenceTracker};
//!
//! let mut tracker = CadenceTracker::<8>::default();
//! let report = tracker.observe(CadenceSample {
//!     mode: PacingMode::Fixed,
//!     interval_ms: 16.9,
//! });
//! assert_eq!(report.grade, CadenceGrade::A);
//! assert_eq!(report.late_frames, 0);
//! ```

#![no_std]

extern crate alloc;

use alloc::string::String;
use cadence_core::pacer::{PacerConfig, PacingMode};
use cadence_core::time::Timebase;

/// Intervals longer than this multiple of the target count as late.
pub const LATE_FACTOR: f64 = 1.5;

/// Per-frame sample fed into [`CadenceTracker::observe`].
#[derive(Clone, Copy, Debug)]
pub struct CadenceSample {
    /// Mode the loop was in when this frame rendered.
    pub mode: PacingMode,
    /// Time since the previous render call, in ms.
    pub interval_ms: f64,
}

/// Letter grade for pacing quality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CadenceGrade {
    /// Steady cadence, almost no late frames.
    A,
    /// Good cadence with occasional late frames.
    B,
    /// Noticeably uneven but usable.
    C,
    /// Poor pacing.
    D,
}

impl CadenceGrade {
    /// Returns a short label for HUD rendering.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

/// Aggregated report returned by [`CadenceTracker::observe`].
#[derive(Clone, Copy, Debug)]
pub struct CadenceReport {
    /// Current grade.
    pub grade: CadenceGrade,
    /// Mean interval over the window, in ms.
    pub mean_interval_ms: f64,
    /// Mean absolute deviation from the target interval over the window, in
    /// ms.
    pub jitter_ms: f64,
    /// Frame rate implied by the mean interval.
    pub effective_hz: f64,
    /// Late frames per 1000 observed frames.
    pub late_rate_per_1000: f64,
    /// Total frames observed.
    pub total_frames: u64,
    /// Total frames whose interval exceeded [`LATE_FACTOR`] × target.
    pub late_frames: u64,
}

/// Rolling cadence tracker with fixed-size interval history.
///
/// The history starts filled with the target interval, so early reports lean
/// towards the target until `N` frames have been observed.
#[derive(Debug)]
pub struct CadenceTracker<const N: usize> {
    target_ms: f64,
    intervals_ms: [f64; N],
    cursor: usize,
    total_frames: u64,
    late_frames: u64,
}

impl<const N: usize> Default for CadenceTracker<N> {
    fn default() -> Self {
        Self::for_config(&PacerConfig::new(Timebase::NANOS), Timebase::NANOS)
    }
}

impl<const N: usize> CadenceTracker<N> {
    /// Creates a tracker aiming at `target_ms` between frames.
    #[must_use]
    pub const fn new(target_ms: f64) -> Self {
        Self {
            target_ms,
            intervals_ms: [target_ms; N],
            cursor: 0,
            total_frames: 0,
            late_frames: 0,
        }
    }

    /// Creates a tracker aiming at the target interval of `config`.
    #[must_use]
    pub fn for_config(config: &PacerConfig, timebase: Timebase) -> Self {
        Self::new(config.target_interval.as_millis_f64(timebase))
    }

    /// Target interval, in ms.
    #[must_use]
    pub const fn target_ms(&self) -> f64 {
        self.target_ms
    }

    /// Observes one frame and returns an updated report.
    #[must_use]
    pub fn observe(&mut self, sample: CadenceSample) -> CadenceReport {
        self.total_frames = self.total_frames.saturating_add(1);
        self.intervals_ms[self.cursor % N] = sample.interval_ms;
        self.cursor = (self.cursor + 1) % N;

        if sample.interval_ms > self.target_ms * LATE_FACTOR {
            self.late_frames = self.late_frames.saturating_add(1);
        }

        let mut sum = 0.0;
        let mut deviation = 0.0;
        for &interval in &self.intervals_ms {
            sum += interval;
            deviation += (interval - self.target_ms).abs();
        }
        let mean = sum / N as f64;
        let jitter = deviation / N as f64;
        let effective_hz = if mean > 0.0 { 1000.0 / mean } else { 0.0 };
        let late_rate = self.late_frames as f64 * 1000.0 / self.total_frames as f64;

        CadenceReport {
            grade: grade_for(sample.mode, jitter, late_rate),
            mean_interval_ms: mean,
            jitter_ms: jitter,
            effective_hz,
            late_rate_per_1000: late_rate,
            total_frames: self.total_frames,
            late_frames: self.late_frames,
        }
    }

    /// Returns ring-buffer intervals oldest→newest.
    #[must_use]
    pub fn intervals(&self) -> [f64; N] {
        let mut out = [0.0; N];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.intervals_ms[(self.cursor + i) % N];
        }
        out
    }

    /// Returns an ASCII sparkline over [`intervals()`](Self::intervals).
    #[must_use]
    pub fn sparkline_ascii(&self, min_ms: f64, max_ms: f64) -> String {
        const LEVELS: &[u8] = b" .:-=+*#%@";
        let mut out = String::with_capacity(N);
        for v in self.intervals() {
            let v = v.clamp(min_ms, max_ms);
            let t = (v - min_ms) / (max_ms - min_ms);
            #[expect(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                reason = "index is clamped to ASCII level count"
            )]
            let level = (t * (LEVELS.len() as f64 - 1.0) + 0.5) as usize;
            out.push(LEVELS[level] as char);
        }
        out
    }
}

fn grade_for(mode: PacingMode, jitter_ms: f64, late_rate_per_1000: f64) -> CadenceGrade {
    let (a_jitter, b_jitter, c_jitter, a_late, b_late, c_late) = match mode {
        PacingMode::Sync => (1.0, 2.5, 5.0, 5.0, 20.0, 60.0),
        PacingMode::Fixed => (2.0, 4.0, 8.0, 10.0, 30.0, 80.0),
        PacingMode::Auto => (4.0, 8.0, 12.0, 20.0, 50.0, 100.0),
    };

    if jitter_ms < a_jitter && late_rate_per_1000 < a_late {
        CadenceGrade::A
    } else if jitter_ms < b_jitter && late_rate_per_1000 < b_late {
        CadenceGrade::B
    } else if jitter_ms < c_jitter && late_rate_per_1000 < c_late {
        CadenceGrade::C
    } else {
        CadenceGrade::D
    }
}
