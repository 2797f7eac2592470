// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are converted to milliseconds using a [`Timebase`].

use std::io::Write;

use cadence_core::time::{Duration, HostTime, Timebase};
use cadence_core::trace::{CancelEvent, ModeDecisionEvent, PacerTickEvent, ResyncEvent, TraceSink};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    timebase: Timebase,
    ticks: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self::new(Box::new(std::io::stderr()), timebase)
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>, timebase: Timebase) -> Self {
        Self::with_writer(writer, timebase)
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self {
            writer,
            timebase,
            ticks: true,
        }
    }

    /// Stops printing per-tick lines; decisions, resyncs and cancellation
    /// are still printed.
    #[must_use]
    pub fn without_ticks(mut self) -> Self {
        self.ticks = false;
        self
    }

    /// Consumes the sink and returns its writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn ms(&self, d: Duration) -> f64 {
        d.as_millis_f64(self.timebase)
    }

    fn at_ms(&self, t: HostTime) -> f64 {
        self.ms(Duration(t.ticks()))
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_pacer_tick(&mut self, e: &PacerTickEvent) {
        if !self.ticks {
            return;
        }
        let _ = writeln!(
            self.writer,
            "[tick] frame={} now={:.3}ms next={:.3}ms delay={:.3}ms mode={} via={}",
            e.frame_index,
            self.at_ms(e.now),
            self.at_ms(e.ideal_next),
            self.ms(e.delay),
            e.mode.as_str(),
            e.primitive.as_str(),
        );
    }

    fn on_mode_decision(&mut self, e: &ModeDecisionEvent) {
        let _ = writeln!(
            self.writer,
            "[decide] frame={} at={:.3}ms average={:.3}ms threshold={:.3}ms mode={}",
            e.frame_index,
            self.at_ms(e.now),
            self.ms(e.average_interval),
            self.ms(e.threshold),
            e.mode.as_str(),
        );
    }

    fn on_resync(&mut self, e: &ResyncEvent) {
        let _ = writeln!(
            self.writer,
            "[resync] frame={} at={:.3}ms behind={:.3}ms",
            e.frame_index,
            self.at_ms(e.now),
            self.ms(e.behind),
        );
    }

    fn on_cancel(&mut self, e: &CancelEvent) {
        let _ = writeln!(
            self.writer,
            "[cancel] frames={} at={:.3}ms mode={}",
            e.frames,
            self.at_ms(e.now),
            e.mode.as_str(),
        );
    }
}
