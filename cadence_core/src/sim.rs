// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic simulated host.
//!
//! [`SimHost`] implements [`FrameHost`] over a virtual nanosecond clock.
//! Nothing runs until the owner drives it with [`step`](SimHost::step),
//! [`run_ticks`](SimHost::run_ticks) or [`run_until`](SimHost::run_until),
//! which makes whole pacing sessions reproducible in unit tests.
//!
//! - Display-synced requests fire on the next vsync boundary strictly after
//!   the request time. Vsyncs sit at `origin + n * display_interval`; changing
//!   the interval re-anchors the grid at the current time.
//! - Timers fire at `request time + delay + lateness`, where lateness cycles
//!   through the pattern given to [`set_timer_lateness`](SimHost::set_timer_lateness).
//! - [`suspend_for`](SimHost::suspend_for) jumps the clock forward; anything
//!   that fell due in the meantime fires late, at the new `now`.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::host::{FrameHost, HostCallback};
use crate::pacer::Primitive;
use crate::time::{Duration, HostTime, Timebase};

/// Identifies a request made to a [`SimHost`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SimHandle(u64);

struct Pending {
    id: u64,
    due: HostTime,
    primitive: Primitive,
    callback: HostCallback,
}

struct SimInner {
    now: Cell<HostTime>,
    vsync_origin: Cell<HostTime>,
    display_interval: Cell<Duration>,
    timer_lateness: RefCell<Vec<Duration>>,
    lateness_cursor: Cell<usize>,
    next_id: Cell<u64>,
    queue: RefCell<Vec<Pending>>,
}

/// A virtual-time [`FrameHost`].
///
/// Clones share the same clock and queue, so a test can hand one clone to a
/// loop and keep driving another.
#[derive(Clone)]
pub struct SimHost {
    inner: Rc<SimInner>,
}

impl SimHost {
    /// Timebase of the simulated clock.
    pub const TIMEBASE: Timebase = Timebase::NANOS;

    /// Creates a host whose clock reads `origin` and whose display refreshes
    /// every `display_interval`, with vsyncs aligned to `origin`.
    ///
    /// # Panics
    ///
    /// Panics if `display_interval` is zero.
    #[must_use]
    pub fn new(origin: HostTime, display_interval: Duration) -> Self {
        assert!(
            display_interval > Duration::ZERO,
            "display interval must be positive"
        );
        Self {
            inner: Rc::new(SimInner {
                now: Cell::new(origin),
                vsync_origin: Cell::new(origin),
                display_interval: Cell::new(display_interval),
                timer_lateness: RefCell::new(Vec::new()),
                lateness_cursor: Cell::new(0),
                next_id: Cell::new(0),
                queue: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Creates a host at one second with a display refreshing every
    /// `interval_nanos`.
    #[must_use]
    pub fn with_refresh_nanos(interval_nanos: u64) -> Self {
        Self::new(HostTime(1_000_000_000), Duration(interval_nanos))
    }

    /// Changes the display refresh interval. The vsync grid is re-anchored at
    /// the current time; requests already queued keep their due time.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn set_display_interval(&self, interval: Duration) {
        assert!(interval > Duration::ZERO, "display interval must be positive");
        self.inner.vsync_origin.set(self.inner.now.get());
        self.inner.display_interval.set(interval);
    }

    /// Sets the extra delay added to successive timers, cycling through
    /// `pattern`. An empty pattern makes timers exact.
    pub fn set_timer_lateness(&self, pattern: &[Duration]) {
        *self.inner.timer_lateness.borrow_mut() = pattern.to_vec();
        self.inner.lateness_cursor.set(0);
    }

    /// Jumps the clock forward without running anything.
    pub fn suspend_for(&self, duration: Duration) {
        self.inner.now.set(self.inner.now.get() + duration);
    }

    /// Runs the earliest pending callback, advancing the clock to its due
    /// time (or leaving it if the callback is overdue). Returns `false` if
    /// nothing is pending.
    pub fn step(&self) -> bool {
        let next = {
            let mut queue = self.inner.queue.borrow_mut();
            let earliest = queue
                .iter()
                .enumerate()
                .min_by_key(|(_, p)| (p.due, p.id))
                .map(|(i, _)| i);
            earliest.map(|i| queue.remove(i))
        };
        let Some(pending) = next else {
            return false;
        };
        if pending.due > self.inner.now.get() {
            self.inner.now.set(pending.due);
        }
        (pending.callback)();
        true
    }

    /// Runs up to `count` callbacks. Returns how many ran.
    pub fn run_ticks(&self, count: usize) -> usize {
        (0..count).take_while(|_| self.step()).count()
    }

    /// Runs every callback due at or before `deadline`, then moves the clock
    /// to `deadline` if it is still earlier. Returns how many ran.
    pub fn run_until(&self, deadline: HostTime) -> usize {
        let mut ran = 0;
        while self.next_due().is_some_and(|due| due <= deadline) {
            self.step();
            ran += 1;
        }
        if self.inner.now.get() < deadline {
            self.inner.now.set(deadline);
        }
        ran
    }

    /// Due time of the earliest pending callback.
    #[must_use]
    pub fn next_due(&self) -> Option<HostTime> {
        self.inner.queue.borrow().iter().map(|p| p.due).min()
    }

    /// Number of pending callbacks.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Primitive of the earliest pending callback.
    #[must_use]
    pub fn pending_primitive(&self) -> Option<Primitive> {
        self.inner
            .queue
            .borrow()
            .iter()
            .min_by_key(|p| (p.due, p.id))
            .map(|p| p.primitive)
    }

    fn next_vsync_after(&self, t: HostTime) -> HostTime {
        let origin = self.inner.vsync_origin.get();
        let interval = self.inner.display_interval.get().ticks();
        let elapsed = (t - origin).ticks();
        HostTime(origin.ticks() + (elapsed / interval + 1) * interval)
    }

    fn next_lateness(&self) -> Duration {
        let pattern = self.inner.timer_lateness.borrow();
        if pattern.is_empty() {
            return Duration::ZERO;
        }
        let cursor = self.inner.lateness_cursor.get();
        self.inner.lateness_cursor.set((cursor + 1) % pattern.len());
        pattern[cursor]
    }

    fn enqueue(&self, due: HostTime, primitive: Primitive, callback: HostCallback) -> SimHandle {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.queue.borrow_mut().push(Pending {
            id,
            due,
            primitive,
            callback,
        });
        SimHandle(id)
    }

    fn remove(&self, handle: SimHandle, primitive: Primitive) {
        // Bind the removed entry so its callback drops after the borrow ends.
        let removed = {
            let mut queue = self.inner.queue.borrow_mut();
            queue
                .iter()
                .position(|p| p.id == handle.0 && p.primitive == primitive)
                .map(|i| queue.remove(i))
        };
        drop(removed);
    }
}

impl FrameHost for SimHost {
    type DisplayHandle = SimHandle;
    type TimerHandle = SimHandle;

    fn now(&self) -> HostTime {
        self.inner.now.get()
    }

    fn request_display_sync(&self, callback: HostCallback) -> SimHandle {
        let due = self.next_vsync_after(self.inner.now.get());
        self.enqueue(due, Primitive::DisplaySync, callback)
    }

    fn cancel_display_sync(&self, handle: SimHandle) {
        self.remove(handle, Primitive::DisplaySync);
    }

    fn request_timer(&self, delay: Duration, callback: HostCallback) -> SimHandle {
        let due = self.inner.now.get() + delay + self.next_lateness();
        self.enqueue(due, Primitive::Timer, callback)
    }

    fn cancel_timer(&self, handle: SimHandle) {
        self.remove(handle, Primitive::Timer);
    }
}

impl fmt::Debug for SimHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimHost")
            .field("now", &self.inner.now.get())
            .field("display_interval", &self.inner.display_interval.get())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}
