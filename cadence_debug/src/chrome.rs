// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Ticks land on one track per primitive (`display` and `timer`), so the
//! switch out of measuring mode is visible at a glance. The requested delay
//! of each tick is also emitted as a counter.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use cadence_core::pacer::Primitive;
use cadence_core::time::{Duration, Timebase};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Timestamps are converted to microseconds using the provided [`Timebase`].
pub fn export(bytes: &[u8], timebase: Timebase, writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = vec![
        thread_name(Primitive::DisplaySync),
        thread_name(Primitive::Timer),
    ];

    for recorded in decode(bytes) {
        let ts = ticks_to_us(recorded.timestamp().ticks(), timebase);
        match recorded {
            RecordedEvent::PacerTick(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Tick",
                    "cat": "Pacer",
                    "ts": ts,
                    "pid": 0,
                    "tid": track(e.primitive),
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "mode": e.mode.as_str(),
                        "ideal_next_us": ticks_to_us(e.ideal_next.ticks(), timebase),
                    }
                }));
                events.push(json!({
                    "ph": "C",
                    "name": "delay",
                    "cat": "Pacer",
                    "ts": ts,
                    "pid": 0,
                    "args": {
                        "ms": ms(e.delay, timebase),
                    }
                }));
            }
            RecordedEvent::ModeDecision(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "ModeDecision",
                    "cat": "Pacer",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "frame_index": e.frame_index,
                        "average_ms": ms(e.average_interval, timebase),
                        "threshold_ms": ms(e.threshold, timebase),
                        "mode": e.mode.as_str(),
                    }
                }));
            }
            RecordedEvent::Resync(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Resync",
                    "cat": "Pacer",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "frame_index": e.frame_index,
                        "behind_ms": ms(e.behind, timebase),
                    }
                }));
            }
            RecordedEvent::Cancel(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Cancel",
                    "cat": "Pacer",
                    "ts": ts,
                    "pid": 0,
                    "tid": track(e.mode.primitive()),
                    "s": "p",
                    "args": {
                        "frames": e.frames,
                        "mode": e.mode.as_str(),
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn track(primitive: Primitive) -> u32 {
    match primitive {
        Primitive::DisplaySync => 0,
        Primitive::Timer => 1,
    }
}

fn thread_name(primitive: Primitive) -> Value {
    json!({
        "ph": "M",
        "name": "thread_name",
        "pid": 0,
        "tid": track(primitive),
        "args": {
            "name": primitive.as_str(),
        }
    })
}

fn ticks_to_us(ticks: u64, timebase: Timebase) -> f64 {
    timebase.ticks_to_nanos(ticks) as f64 / 1000.0
}

fn ms(d: Duration, timebase: Timebase) -> f64 {
    d.as_millis_f64(timebase)
}
