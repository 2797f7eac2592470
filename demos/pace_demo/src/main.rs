// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated pacing sessions that exercise the loop and its diagnostics.
//!
//! Runs three loops on a [`SimHost`]: a 120 Hz display that the pacer
//! abandons for the timer, a 60 Hz display it keeps, and a timer-paced loop
//! that is suspended mid-run. Every loop reports to both a
//! [`PrettyPrintSink`] and a shared [`RecorderSink`], its render intervals
//! are graded by a [`CadenceTracker`], and the recording is exported as a
//! Chrome trace JSON file.

use std::cell::RefCell;
use std::fs::File;
use std::io::BufWriter;
use std::rc::Rc;

use cadence_core::frame_loop::{self, PacerHandle};
use cadence_core::host::FrameHost;
use cadence_core::pacer::{PacerConfig, PacingMode, SAMPLE_CAPACITY};
use cadence_core::sim::SimHost;
use cadence_core::time::{Duration, HostTime, Timebase};
use cadence_core::trace::SharedSink;

use cadence_debug::pretty::PrettyPrintSink;
use cadence_debug::recorder::RecorderSink;
use cadence_harness::{CadenceSample, CadenceTracker};

const TIMEBASE: Timebase = SimHost::TIMEBASE;
/// Each scenario starts this far after the previous one on the trace timeline.
const SCENARIO_SPACING_MS: u64 = 10_000;

struct Scenario {
    name: &'static str,
    display_interval_ns: u64,
    initial_mode: PacingMode,
    timer_lateness_ns: &'static [u64],
    ticks: usize,
    /// Suspend the host for this many ms after `ticks`, then run `ticks` again.
    suspend_ms: Option<u64>,
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "120 Hz display, auto",
        display_interval_ns: 8_333_333,
        initial_mode: PacingMode::Auto,
        timer_lateness_ns: &[0, 1_200_000, 400_000, 2_500_000],
        ticks: 120,
        suspend_ms: None,
    },
    Scenario {
        name: "60 Hz display, auto",
        display_interval_ns: 16_800_000,
        initial_mode: PacingMode::Auto,
        timer_lateness_ns: &[],
        ticks: 45,
        suspend_ms: None,
    },
    Scenario {
        name: "fixed, suspended tab",
        display_interval_ns: 16_666_667,
        initial_mode: PacingMode::Fixed,
        timer_lateness_ns: &[300_000, 900_000],
        ticks: 45,
        suspend_ms: Some(750),
    },
];

fn main() {
    let pretty = SharedSink::new(
        PrettyPrintSink::new(Box::new(std::io::stdout()), TIMEBASE).without_ticks(),
    );
    let recorder = SharedSink::new(RecorderSink::new());

    let mut origin = HostTime(1_000_000_000);
    for scenario in SCENARIOS {
        run_scenario(scenario, origin, &pretty, &recorder);
        origin += Duration::from_millis(SCENARIO_SPACING_MS, TIMEBASE);
    }

    // -- export Chrome trace -----------------------------------------------
    let path = "pace_trace.json";
    let file = File::create(path).expect("failed to create pace_trace.json");
    let mut writer = BufWriter::new(file);
    let recording = recorder.borrow();
    cadence_debug::chrome::export(recording.as_bytes(), TIMEBASE, &mut writer)
        .expect("failed to write Chrome trace");

    println!("Wrote {path} ({} bytes recorded)", recording.as_bytes().len());
}

fn run_scenario(
    scenario: &Scenario,
    origin: HostTime,
    pretty: &SharedSink<PrettyPrintSink>,
    recorder: &SharedSink<RecorderSink>,
) {
    println!("== {} ==", scenario.name);

    let host = SimHost::new(origin, Duration(scenario.display_interval_ns));
    let lateness: Vec<_> = scenario
        .timer_lateness_ns
        .iter()
        .map(|&ns| Duration(ns))
        .collect();
    host.set_timer_lateness(&lateness);

    let renders = Rc::new(RefCell::new(Vec::new()));
    let clock = host.clone();
    let log = Rc::clone(&renders);
    let config = PacerConfig::new(TIMEBASE).with_mode(scenario.initial_mode);
    let handle = frame_loop::start_traced(
        host.clone(),
        config,
        move || log.borrow_mut().push(clock.now()),
        Box::new((pretty.clone(), recorder.clone())),
    );

    host.run_ticks(scenario.ticks);
    if let Some(ms) = scenario.suspend_ms {
        host.suspend_for(Duration::from_millis(ms, TIMEBASE));
        host.run_ticks(scenario.ticks);
    }
    handle.cancel();

    report(&handle, scenario.initial_mode, &renders.borrow());
}

fn report(handle: &PacerHandle, initial_mode: PacingMode, renders: &[HostTime]) {
    let mut tracker = CadenceTracker::<64>::default();
    let mut last = None;
    for (i, window) in renders.windows(2).enumerate() {
        // Interval `i` ends on tick `i + 1`. The first `SAMPLE_CAPACITY`
        // intervals end on ticks that were scheduled while measuring.
        let mode = if initial_mode == PacingMode::Auto && i < SAMPLE_CAPACITY {
            PacingMode::Auto
        } else {
            handle.mode()
        };
        let interval = window[1] - window[0];
        last = Some(tracker.observe(CadenceSample {
            mode,
            interval_ms: interval.as_millis_f64(TIMEBASE),
        }));
    }

    let Some(report) = last else {
        println!("no intervals recorded");
        return;
    };
    println!(
        "mode={} frames={} mean={:.3}ms jitter={:.3}ms rate={:.1}Hz late={} grade={}",
        handle.mode().as_str(),
        handle.frame_count(),
        report.mean_interval_ms,
        report.jitter_ms,
        report.effective_hz,
        report.late_frames,
        report.grade.as_str(),
    );
    println!("[{}]", tracker.sparkline_ascii(0.0, 2.0 * tracker.target_ms()));
}
