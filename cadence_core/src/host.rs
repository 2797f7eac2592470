// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host contract for pacing loops.
//!
//! A pacing loop needs exactly three things from its environment:
//!
//! - **Clock**: a monotonic `now()` in host ticks.
//! - **Display-synced primitive**: run a callback once before the next
//!   display repaint (`requestAnimationFrame` on the web). Its spacing is
//!   whatever the display and the host decide.
//! - **Timer primitive**: run a callback after a requested delay
//!   (`setTimeout` on the web).
//!
//! [`FrameHost`] captures that capability set. Backend crates implement it
//! for their platform; [`SimHost`](crate::sim::SimHost) implements it over a
//! virtual clock for tests and demos.
//!
//! Hosts are single-threaded: callbacks run on the host's event loop, one at
//! a time, and never from inside a `request_*` call.

use alloc::boxed::Box;
use core::fmt::Debug;

use crate::time::{Duration, HostTime};

/// A one-shot callback handed to a host primitive.
pub type HostCallback = Box<dyn FnOnce()>;

/// Scheduling primitives and clock provided by the environment.
pub trait FrameHost {
    /// Identifies a pending display-synced request.
    type DisplayHandle: Copy + Debug;
    /// Identifies a pending timer.
    type TimerHandle: Copy + Debug;

    /// Reads the monotonic clock.
    fn now(&self) -> HostTime;

    /// Runs `callback` once before the next display repaint.
    fn request_display_sync(&self, callback: HostCallback) -> Self::DisplayHandle;

    /// Cancels a display-synced request. Cancelling a request that already
    /// fired or was already cancelled does nothing.
    fn cancel_display_sync(&self, handle: Self::DisplayHandle);

    /// Runs `callback` once, `delay` ticks from now.
    fn request_timer(&self, delay: Duration, callback: HostCallback) -> Self::TimerHandle;

    /// Cancels a timer. Cancelling a timer that already fired or was already
    /// cancelled does nothing.
    fn cancel_timer(&self, handle: Self::TimerHandle);
}

/// The primitive request a loop currently has in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActiveHandle<D, T> {
    /// Nothing pending: the loop is mid-tick or stopped.
    #[default]
    Idle,
    /// Waiting on the display-synced primitive.
    DisplaySync(D),
    /// Waiting on the timer primitive.
    Timer(T),
}

impl<D, T> ActiveHandle<D, T> {
    /// Returns `true` if a request is pending.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Cancels whatever `active` refers to.
pub fn cancel_active<H: FrameHost + ?Sized>(
    host: &H,
    active: ActiveHandle<H::DisplayHandle, H::TimerHandle>,
) {
    match active {
        ActiveHandle::Idle => {}
        ActiveHandle::DisplaySync(handle) => host.cancel_display_sync(handle),
        ActiveHandle::Timer(handle) => host.cancel_timer(handle),
    }
}
