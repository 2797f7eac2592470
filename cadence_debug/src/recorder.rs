// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`]. A truncated trailing record ends the
//! iteration.

use cadence_core::pacer::{PacingMode, Primitive};
use cadence_core::time::{Duration, HostTime};
use cadence_core::trace::{CancelEvent, ModeDecisionEvent, PacerTickEvent, ResyncEvent, TraceSink};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_PACER_TICK: u8 = 1;
const TAG_MODE_DECISION: u8 = 2;
const TAG_RESYNC: u8 = 3;
const TAG_CANCEL: u8 = 4;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_mode(&mut self, mode: PacingMode) {
        self.write_u8(match mode {
            PacingMode::Auto => 0,
            PacingMode::Fixed => 1,
            PacingMode::Sync => 2,
        });
    }

    fn write_primitive(&mut self, primitive: Primitive) {
        self.write_u8(match primitive {
            Primitive::DisplaySync => 0,
            Primitive::Timer => 1,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_pacer_tick(&mut self, e: &PacerTickEvent) {
        self.write_u8(TAG_PACER_TICK);
        self.write_u64(e.frame_index);
        self.write_u64(e.now.ticks());
        self.write_u64(e.ideal_next.ticks());
        self.write_u64(e.delay.ticks());
        self.write_mode(e.mode);
        self.write_primitive(e.primitive);
    }

    fn on_mode_decision(&mut self, e: &ModeDecisionEvent) {
        self.write_u8(TAG_MODE_DECISION);
        self.write_u64(e.frame_index);
        self.write_u64(e.now.ticks());
        self.write_u64(e.average_interval.ticks());
        self.write_u64(e.threshold.ticks());
        self.write_mode(e.mode);
    }

    fn on_resync(&mut self, e: &ResyncEvent) {
        self.write_u8(TAG_RESYNC);
        self.write_u64(e.frame_index);
        self.write_u64(e.now.ticks());
        self.write_u64(e.behind.ticks());
    }

    fn on_cancel(&mut self, e: &CancelEvent) {
        self.write_u8(TAG_CANCEL);
        self.write_u64(e.frames);
        self.write_u64(e.now.ticks());
        self.write_mode(e.mode);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordedEvent {
    /// A [`PacerTickEvent`].
    PacerTick(PacerTickEvent),
    /// A [`ModeDecisionEvent`].
    ModeDecision(ModeDecisionEvent),
    /// A [`ResyncEvent`].
    Resync(ResyncEvent),
    /// A [`CancelEvent`].
    Cancel(CancelEvent),
}

impl RecordedEvent {
    /// Host time at which the event was emitted.
    #[must_use]
    pub fn timestamp(&self) -> HostTime {
        match self {
            Self::PacerTick(e) => e.now,
            Self::ModeDecision(e) => e.now,
            Self::Resync(e) => e.now,
            Self::Cancel(e) => e.now,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Option<u8> {
        if self.remaining() < 1 {
            return None;
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        if self.remaining() < 8 {
            return None;
        }
        let v = u64::from_le_bytes(self.data[self.pos..self.pos + 8].try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_duration(&mut self) -> Option<Duration> {
        self.read_u64().map(Duration)
    }

    fn read_mode(&mut self) -> Option<PacingMode> {
        Some(match self.read_u8()? {
            0 => PacingMode::Auto,
            1 => PacingMode::Fixed,
            _ => PacingMode::Sync,
        })
    }

    fn read_primitive(&mut self) -> Option<Primitive> {
        Some(match self.read_u8()? {
            0 => Primitive::DisplaySync,
            _ => Primitive::Timer,
        })
    }

    fn decode_pacer_tick(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PacerTick(PacerTickEvent {
            frame_index: self.read_u64()?,
            now: self.read_time()?,
            ideal_next: self.read_time()?,
            delay: self.read_duration()?,
            mode: self.read_mode()?,
            primitive: self.read_primitive()?,
        }))
    }

    fn decode_mode_decision(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::ModeDecision(ModeDecisionEvent {
            frame_index: self.read_u64()?,
            now: self.read_time()?,
            average_interval: self.read_duration()?,
            threshold: self.read_duration()?,
            mode: self.read_mode()?,
        }))
    }

    fn decode_resync(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Resync(ResyncEvent {
            frame_index: self.read_u64()?,
            now: self.read_time()?,
            behind: self.read_duration()?,
        }))
    }

    fn decode_cancel(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Cancel(CancelEvent {
            frames: self.read_u64()?,
            now: self.read_time()?,
            mode: self.read_mode()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_PACER_TICK => self.decode_pacer_tick(),
            TAG_MODE_DECISION => self.decode_mode_decision(),
            TAG_RESYNC => self.decode_resync(),
            TAG_CANCEL => self.decode_cancel(),
            _ => None, // unknown tag: stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
