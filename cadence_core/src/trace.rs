// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the pacing loop.
//!
//! This module provides a [`TraceSink`] trait with one method per pacing
//! event. All method bodies default to no-ops, so implementing only the events
//! you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! A sink handed to a running loop is owned by that loop. Wrap it in a
//! [`SharedSink`] to keep reading it from outside, and use a tuple `(A, B)` to
//! feed two sinks at once.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

use alloc::rc::Rc;
use core::cell::{Ref, RefCell, RefMut};

use crate::pacer::{PacingMode, Primitive, TickPlan};
use crate::time::{Duration, HostTime};

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted once per tick, after the ideal time has been advanced and before
/// the render callback runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacerTickEvent {
    /// Zero-based tick counter.
    pub frame_index: u64,
    /// Host time read at the start of the tick.
    pub now: HostTime,
    /// Ideal time of the next frame after this tick's bookkeeping.
    pub ideal_next: HostTime,
    /// Delay until `ideal_next`; only honored by the timer primitive.
    pub delay: Duration,
    /// Mode in effect after this tick.
    pub mode: PacingMode,
    /// Primitive the next tick is scheduled with.
    pub primitive: Primitive,
}

impl From<&TickPlan> for PacerTickEvent {
    fn from(plan: &TickPlan) -> Self {
        Self {
            frame_index: plan.frame_index,
            now: plan.now,
            ideal_next: plan.ideal_next,
            delay: plan.delay,
            mode: plan.mode,
            primitive: plan.primitive,
        }
    }
}

/// Emitted on the single tick where `Auto` resolves to `Fixed` or `Sync`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeDecisionEvent {
    /// Tick on which the decision was taken.
    pub frame_index: u64,
    /// Host time of that tick.
    pub now: HostTime,
    /// Smoothed display-sync interval measured over the sample tail.
    pub average_interval: Duration,
    /// Intervals strictly below this switch the loop to `Fixed`.
    pub threshold: Duration,
    /// The mode chosen.
    pub mode: PacingMode,
}

/// Emitted when the clock has overtaken the ideal frame time and the ideal
/// time is clamped to `now` instead of bursting catch-up frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResyncEvent {
    /// Tick on which the clamp happened.
    pub frame_index: u64,
    /// Host time the ideal time was clamped to.
    pub now: HostTime,
    /// How far the unclamped ideal time lagged behind `now`.
    pub behind: Duration,
}

/// Emitted the first time a loop is cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CancelEvent {
    /// Number of ticks the loop executed.
    pub frames: u64,
    /// Host time of the cancellation.
    pub now: HostTime,
    /// Mode the loop was in.
    pub mode: PacingMode,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from a pacing loop.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called once per tick.
    fn on_pacer_tick(&mut self, e: &PacerTickEvent) {
        _ = e;
    }

    /// Called when `Auto` mode resolves.
    fn on_mode_decision(&mut self, e: &ModeDecisionEvent) {
        _ = e;
    }

    /// Called when the ideal frame time is clamped forward.
    fn on_resync(&mut self, e: &ResyncEvent) {
        _ = e;
    }

    /// Called when the loop is cancelled.
    fn on_cancel(&mut self, e: &CancelEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// Provided sinks
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

/// A sink shared between a running loop and its owner.
///
/// Clones refer to the same sink. Events are forwarded through a `RefCell`
/// borrow, so inspect the inner sink between ticks, never from inside one of
/// its own callbacks.
#[derive(Debug, Default)]
pub struct SharedSink<S> {
    inner: Rc<RefCell<S>>,
}

impl<S> SharedSink<S> {
    /// Wraps `sink` for sharing.
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self {
            inner: Rc::new(RefCell::new(sink)),
        }
    }

    /// Borrows the inner sink.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, S> {
        self.inner.borrow()
    }

    /// Mutably borrows the inner sink.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, S> {
        self.inner.borrow_mut()
    }
}

impl<S> Clone for SharedSink<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: TraceSink> TraceSink for SharedSink<S> {
    fn on_pacer_tick(&mut self, e: &PacerTickEvent) {
        self.inner.borrow_mut().on_pacer_tick(e);
    }

    fn on_mode_decision(&mut self, e: &ModeDecisionEvent) {
        self.inner.borrow_mut().on_mode_decision(e);
    }

    fn on_resync(&mut self, e: &ResyncEvent) {
        self.inner.borrow_mut().on_resync(e);
    }

    fn on_cancel(&mut self, e: &CancelEvent) {
        self.inner.borrow_mut().on_cancel(e);
    }
}

impl<A: TraceSink, B: TraceSink> TraceSink for (A, B) {
    fn on_pacer_tick(&mut self, e: &PacerTickEvent) {
        self.0.on_pacer_tick(e);
        self.1.on_pacer_tick(e);
    }

    fn on_mode_decision(&mut self, e: &ModeDecisionEvent) {
        self.0.on_mode_decision(e);
        self.1.on_mode_decision(e);
    }

    fn on_resync(&mut self, e: &ResyncEvent) {
        self.0.on_resync(e);
        self.1.on_resync(e);
    }

    fn on_cancel(&mut self, e: &CancelEvent) {
        self.0.on_cancel(e);
        self.1.on_cancel(e);
    }
}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`PacerTickEvent`].
    #[inline]
    pub fn pacer_tick(&mut self, e: &PacerTickEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_pacer_tick(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`ModeDecisionEvent`].
    #[inline]
    pub fn mode_decision(&mut self, e: &ModeDecisionEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_mode_decision(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`ResyncEvent`].
    #[inline]
    pub fn resync(&mut self, e: &ResyncEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_resync(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`CancelEvent`].
    #[inline]
    pub fn cancel(&mut self, e: &CancelEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_cancel(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
