// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Browser console trace output.

use alloc::format;

use cadence_core::time::{Duration, HostTime};
use cadence_core::trace::{CancelEvent, ModeDecisionEvent, PacerTickEvent, ResyncEvent, TraceSink};
use wasm_bindgen::JsValue;

/// Logs pacing events to the browser console, one line per event.
///
/// Per-tick events are noisy at 60 Hz, so they are skipped unless
/// [`with_ticks`](Self::with_ticks) is used.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleSink {
    ticks: bool,
}

impl ConsoleSink {
    /// Creates a sink that logs mode decisions, resyncs and cancellation.
    #[must_use]
    pub const fn new() -> Self {
        Self { ticks: false }
    }

    /// Creates a sink that also logs every tick.
    #[must_use]
    pub const fn with_ticks() -> Self {
        Self { ticks: true }
    }
}

fn ms(d: Duration) -> f64 {
    d.as_millis_f64(crate::timebase())
}

fn at_ms(t: HostTime) -> f64 {
    ms(Duration(t.ticks()))
}

fn log(line: &str) {
    web_sys::console::log_1(&JsValue::from_str(line));
}

impl TraceSink for ConsoleSink {
    fn on_pacer_tick(&mut self, e: &PacerTickEvent) {
        if !self.ticks {
            return;
        }
        log(&format!(
            "[cadence:tick] frame={} now={:.3}ms next={:.3}ms delay={:.3}ms {} via {}",
            e.frame_index,
            at_ms(e.now),
            at_ms(e.ideal_next),
            ms(e.delay),
            e.mode.as_str(),
            e.primitive.as_str(),
        ));
    }

    fn on_mode_decision(&mut self, e: &ModeDecisionEvent) {
        log(&format!(
            "[cadence:decide] frame={} average={:.3}ms threshold={:.3}ms -> {}",
            e.frame_index,
            ms(e.average_interval),
            ms(e.threshold),
            e.mode.as_str(),
        ));
    }

    fn on_resync(&mut self, e: &ResyncEvent) {
        log(&format!(
            "[cadence:resync] frame={} at={:.3}ms behind={:.3}ms",
            e.frame_index,
            at_ms(e.now),
            ms(e.behind),
        ));
    }

    fn on_cancel(&mut self, e: &CancelEvent) {
        log(&format!(
            "[cadence:cancel] after {} frames at={:.3}ms mode={}",
            e.frames,
            at_ms(e.now),
            e.mode.as_str(),
        ));
    }
}
