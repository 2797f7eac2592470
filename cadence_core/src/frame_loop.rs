// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Running a paced render loop on a host.
//!
//! [`start`] wires a [`FramePacer`] to a [`FrameHost`] and a render callback
//! and returns a [`PacerHandle`]. Every wake-up runs one tick:
//!
//! ```text
//!   host primitive fires
//!       │
//!       ▼
//!   FramePacer::tick(now) ──► TickPlan
//!       │
//!       ▼
//!   render()
//!       │
//!       ▼
//!   request_display_sync / request_timer(plan.delay) ──► ActiveHandle
//! ```
//!
//! Exactly one request is pending at a time, and the active handle is
//! replaced before the tick returns, so [`PacerHandle::cancel`] always
//! cancels the request that is really in flight, even across the switch
//! from the display-synced primitive to the timer.
//!
//! The loop keeps itself alive through its pending request: dropping every
//! [`PacerHandle`] does not stop it. Only [`PacerHandle::cancel`] does.
//! Cancelling drops the render callback and the trace sink along with the
//! pending request, so both may hold a handle clone without leaking the loop.
//!
//! A panic in the render callback unwinds out of the tick before the next
//! request is made, so the loop ends there; start a new one to resume.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::host::{ActiveHandle, FrameHost, cancel_active};
use crate::pacer::{FramePacer, PacerConfig, PacingMode, Primitive};
use crate::time::Duration;
use crate::trace::{CancelEvent, TraceSink, Tracer};

type Active<H> = ActiveHandle<<H as FrameHost>::DisplayHandle, <H as FrameHost>::TimerHandle>;

struct LoopShared<H: FrameHost> {
    host: H,
    pacer: RefCell<FramePacer>,
    /// Taken out while it runs; `None` once the loop is cancelled.
    render: RefCell<Option<Box<dyn FnMut()>>>,
    active: Cell<Active<H>>,
    cancelled: Cell<bool>,
    /// Mirrors of the pacer state, readable while the pacer is borrowed.
    mode: Cell<PacingMode>,
    frames: Cell<u64>,
    sink: RefCell<Option<Box<dyn TraceSink>>>,
    /// Cancel event raised while the sink was busy.
    deferred_cancel: Cell<Option<CancelEvent>>,
}

/// Type-erased control surface of a running loop.
trait LoopControl {
    fn cancel(&self);
    fn is_cancelled(&self) -> bool;
    fn mode(&self) -> PacingMode;
    fn frame_count(&self) -> u64;
    fn is_pending(&self) -> bool;
}

/// Starts a paced loop that calls `render` once per tick.
///
/// The ideal frame time is seeded from `host.now()`, and the first tick is
/// requested with the primitive of `config.initial_mode` (a zero-delay timer
/// for [`PacingMode::Fixed`], the display-synced primitive otherwise).
/// `render` never runs before this function returns.
#[must_use = "dropping the handle leaves the loop running with no way to cancel it"]
pub fn start<H, F>(host: H, config: PacerConfig, render: F) -> PacerHandle
where
    H: FrameHost + 'static,
    F: FnMut() + 'static,
{
    spawn(host, config, Box::new(render), None)
}

/// Like [`start`], also reporting pacing events to `sink`.
///
/// Events are only delivered when `cadence_core` is built with the `trace`
/// feature.
#[must_use = "dropping the handle leaves the loop running with no way to cancel it"]
pub fn start_traced<H, F>(
    host: H,
    config: PacerConfig,
    render: F,
    sink: Box<dyn TraceSink>,
) -> PacerHandle
where
    H: FrameHost + 'static,
    F: FnMut() + 'static,
{
    spawn(host, config, Box::new(render), Some(sink))
}

fn spawn<H: FrameHost + 'static>(
    host: H,
    config: PacerConfig,
    render: Box<dyn FnMut()>,
    sink: Option<Box<dyn TraceSink>>,
) -> PacerHandle {
    let start_time = host.now();
    let shared = Rc::new(LoopShared {
        host,
        pacer: RefCell::new(FramePacer::new(config, start_time)),
        render: RefCell::new(Some(render)),
        active: Cell::new(ActiveHandle::Idle),
        cancelled: Cell::new(false),
        mode: Cell::new(config.initial_mode),
        frames: Cell::new(0),
        sink: RefCell::new(sink),
        deferred_cancel: Cell::new(None),
    });
    schedule(&shared, config.initial_mode.primitive(), Duration::ZERO);
    PacerHandle { inner: shared }
}

fn schedule<H: FrameHost + 'static>(
    shared: &Rc<LoopShared<H>>,
    primitive: Primitive,
    delay: Duration,
) {
    let next = Rc::clone(shared);
    let callback = Box::new(move || run_tick(&next));
    let active = match primitive {
        Primitive::DisplaySync => {
            ActiveHandle::DisplaySync(shared.host.request_display_sync(callback))
        }
        Primitive::Timer => ActiveHandle::Timer(shared.host.request_timer(delay, callback)),
    };
    shared.active.set(active);
}

fn run_tick<H: FrameHost + 'static>(shared: &Rc<LoopShared<H>>) {
    // The request that woke us is spent.
    shared.active.set(ActiveHandle::Idle);
    if shared.cancelled.get() {
        return;
    }

    let now = shared.host.now();
    let plan = {
        let mut sink = shared.sink.borrow_mut();
        let mut tracer = match sink.as_mut() {
            Some(sink) => Tracer::new(&mut **sink),
            None => Tracer::none(),
        };
        shared.pacer.borrow_mut().tick(now, &mut tracer)
    };
    // A sink callback may have cancelled during the tick.
    if shared.cancelled.get() {
        shared.release();
        return;
    }
    shared.mode.set(plan.mode);
    shared.frames.set(plan.frame_index + 1);

    // No loop borrows are held here, so `render` may cancel.
    let render = shared.render.borrow_mut().take();
    if let Some(mut render) = render {
        render();
        if !shared.cancelled.get() {
            *shared.render.borrow_mut() = Some(render);
        }
    }

    if shared.cancelled.get() {
        shared.release();
        return;
    }
    schedule(shared, plan.primitive, plan.delay);
}

impl<H: FrameHost> LoopShared<H> {
    /// Drops the render callback and the sink once the loop is cancelled.
    ///
    /// Either may hold a [`PacerHandle`], so keeping them would keep the loop
    /// alive forever. Anything currently borrowed is released by the tick
    /// that holds it.
    fn release(&self) {
        let render = self.render.try_borrow_mut().ok().and_then(|mut r| r.take());
        drop(render);

        let Ok(mut slot) = self.sink.try_borrow_mut() else {
            return;
        };
        let mut sink = slot.take();
        drop(slot);
        if let (Some(event), Some(sink)) = (self.deferred_cancel.take(), sink.as_mut()) {
            Tracer::new(&mut **sink).cancel(&event);
        }
        drop(sink);
    }
}

impl<H: FrameHost> LoopControl for LoopShared<H> {
    fn cancel(&self) {
        if self.cancelled.replace(true) {
            return;
        }
        cancel_active(&self.host, self.active.replace(ActiveHandle::Idle));

        let event = CancelEvent {
            frames: self.frames.get(),
            now: self.host.now(),
            mode: self.mode.get(),
        };
        self.deferred_cancel.set(Some(event));
        self.release();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    fn mode(&self) -> PacingMode {
        self.mode.get()
    }

    fn frame_count(&self) -> u64 {
        self.frames.get()
    }

    fn is_pending(&self) -> bool {
        self.active.get().is_pending()
    }
}

/// Controls a loop created by [`start`].
///
/// Clones control the same loop, so a clone can be moved into the render
/// callback to stop the loop from inside a frame.
#[derive(Clone)]
pub struct PacerHandle {
    inner: Rc<dyn LoopControl>,
}

impl PacerHandle {
    /// Cancels the pending request and stops the loop.
    ///
    /// After this returns the render callback is never invoked again. If
    /// called from inside the render callback, the current invocation
    /// finishes and no further tick is scheduled. Calling it again does
    /// nothing.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Current pacing mode.
    #[must_use]
    pub fn mode(&self) -> PacingMode {
        self.inner.mode()
    }

    /// Number of ticks run so far.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.inner.frame_count()
    }

    /// Returns `true` if a host request is in flight.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.is_pending()
    }
}

impl fmt::Debug for PacerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacerHandle")
            .field("cancelled", &self.is_cancelled())
            .field("mode", &self.mode())
            .field("frame_count", &self.frame_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::vec::Vec;

    use super::*;
    use crate::sim::SimHost;
    use crate::time::Timebase;

    const MS: u64 = 1_000_000;

    fn config(mode: PacingMode) -> PacerConfig {
        PacerConfig::new(Timebase::NANOS).with_mode(mode)
    }

    /// Sets its flag when dropped.
    struct DropFlag(Rc<Cell<bool>>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.set(true);
        }
    }

    #[cfg(feature = "trace")]
    impl TraceSink for DropFlag {}

    fn counter() -> (Rc<Cell<u32>>, impl FnMut() + 'static) {
        let count = Rc::new(Cell::new(0));
        let inner = Rc::clone(&count);
        (count, move || inner.set(inner.get() + 1))
    }

    #[test]
    fn render_never_runs_during_start() {
        let host = SimHost::with_refresh_nanos(16 * MS);
        let (count, render) = counter();
        let handle = start(host.clone(), config(PacingMode::Auto), render);
        assert_eq!(count.get(), 0);
        assert!(handle.is_pending());
        assert_eq!(host.pending_primitive(), Some(Primitive::DisplaySync));
    }

    #[test]
    fn fixed_mode_starts_on_the_timer() {
        let host = SimHost::with_refresh_nanos(16 * MS);
        let (count, render) = counter();
        let handle = start(host.clone(), config(PacingMode::Fixed), render);
        assert_eq!(host.pending_primitive(), Some(Primitive::Timer));
        assert_eq!(host.next_due(), Some(host.now()), "zero delay");

        host.run_ticks(5);
        assert_eq!(count.get(), 5);
        assert_eq!(handle.frame_count(), 5);
        assert_eq!(host.pending_primitive(), Some(Primitive::Timer));
    }

    #[test]
    fn fast_display_switches_loop_to_timer() {
        let host = SimHost::with_refresh_nanos(8 * MS);
        let (count, render) = counter();
        let handle = start(host.clone(), config(PacingMode::Auto), render);

        host.run_ticks(30);
        assert_eq!(handle.mode(), PacingMode::Auto, "undecided after 30 samples");
        assert_eq!(host.pending_primitive(), Some(Primitive::DisplaySync));

        host.run_ticks(1);
        assert_eq!(handle.mode(), PacingMode::Fixed);
        assert_eq!(host.pending_primitive(), Some(Primitive::Timer));
        assert_eq!(host.pending_count(), 1, "exactly one request in flight");

        // From here on the timer paces at the target, not the display's 8ms.
        host.run_ticks(1);
        let before = host.now();
        host.run_ticks(60);
        let elapsed = host.now() - before;
        let target = config(PacingMode::Fixed).target_interval;
        assert_eq!(elapsed, target.saturating_mul(60));
        assert_eq!(count.get(), 92);
    }

    #[test]
    fn fixed_loop_ticks_land_on_ideal_times_despite_jitter() {
        let host = SimHost::with_refresh_nanos(16 * MS);
        host.set_timer_lateness(&[Duration(0), Duration(700_000), Duration(150_000)]);
        let origin = host.now();
        let times = Rc::new(RefCell::new(Vec::new()));
        let render = {
            let host = host.clone();
            let times = Rc::clone(&times);
            move || times.borrow_mut().push(host.now())
        };
        let _handle = start(host.clone(), config(PacingMode::Fixed), render);
        host.run_ticks(300);

        let target = config(PacingMode::Fixed).target_interval.ticks();
        let jitter = [0, 700_000, 150_000];
        for (k, t) in times.borrow().iter().enumerate().skip(1) {
            // Tick k fires at ideal time k plus that timer's lateness.
            let ideal = origin.ticks() + k as u64 * target;
            let late = jitter[k % jitter.len()];
            assert_eq!(t.ticks(), ideal + late, "tick {k}");
        }
    }

    #[test]
    fn sixteen_point_eight_display_settles_on_sync() {
        let host = SimHost::with_refresh_nanos(16_800_000);
        let (count, render) = counter();
        let handle = start(host.clone(), config(PacingMode::Auto), render);

        host.run_ticks(30);
        assert_eq!(handle.mode(), PacingMode::Auto);
        host.run_ticks(10);
        assert_eq!(handle.mode(), PacingMode::Sync);
        assert_eq!(count.get(), 40);
        assert_eq!(host.pending_primitive(), Some(Primitive::DisplaySync));
    }

    #[test]
    fn cancel_from_inside_render_stops_immediately() {
        let host = SimHost::with_refresh_nanos(16 * MS);
        let slot: Rc<RefCell<Option<PacerHandle>>> = Rc::new(RefCell::new(None));
        let count = Rc::new(Cell::new(0));
        let render = {
            let slot = Rc::clone(&slot);
            let count = Rc::clone(&count);
            move || {
                count.set(count.get() + 1);
                if count.get() == 3
                    && let Some(handle) = slot.borrow().as_ref()
                {
                    handle.cancel();
                }
            }
        };
        let handle = start(host.clone(), config(PacingMode::Auto), render);
        *slot.borrow_mut() = Some(handle.clone());

        host.run_ticks(10);
        assert_eq!(count.get(), 3, "no invocation after cancel");
        assert!(handle.is_cancelled());
        assert!(!handle.is_pending());
        assert_eq!(host.pending_count(), 0, "nothing left scheduled");
    }

    #[test]
    fn cancel_twice_is_a_no_op() {
        let host = SimHost::with_refresh_nanos(8 * MS);
        let (count, render) = counter();
        let handle = start(host.clone(), config(PacingMode::Auto), render);
        host.run_ticks(35);

        handle.cancel();
        handle.cancel();
        handle.clone().cancel();
        assert!(handle.is_cancelled());
        assert_eq!(host.pending_count(), 0);
        assert_eq!(host.run_ticks(10), 0);
        assert_eq!(count.get(), 35);
    }

    #[test]
    fn cancel_targets_the_timer_after_the_switch() {
        let host = SimHost::with_refresh_nanos(8 * MS);
        let (count, render) = counter();
        let handle = start(host.clone(), config(PacingMode::Auto), render);
        host.run_ticks(31);
        assert_eq!(host.pending_primitive(), Some(Primitive::Timer));

        handle.cancel();
        assert_eq!(host.pending_count(), 0, "the timer, not a stale frame request");
        host.suspend_for(Duration(MS * 1000));
        assert_eq!(host.run_ticks(5), 0);
        assert_eq!(count.get(), 31);
    }

    #[test]
    fn cancel_from_render_releases_the_callback() {
        let host = SimHost::with_refresh_nanos(16 * MS);
        let slot: Rc<RefCell<Option<PacerHandle>>> = Rc::new(RefCell::new(None));
        let dropped = Rc::new(Cell::new(false));
        let render = {
            let slot = Rc::clone(&slot);
            let flag = DropFlag(Rc::clone(&dropped));
            move || {
                let _owned = &flag;
                if let Some(handle) = slot.borrow().as_ref() {
                    handle.cancel();
                }
            }
        };
        let handle = start(host.clone(), config(PacingMode::Auto), render);
        *slot.borrow_mut() = Some(handle.clone());

        assert_eq!(host.run_ticks(3), 1);
        assert!(dropped.get(), "render closure outlived the cancelled loop");
        assert_eq!(host.pending_count(), 0);
        assert_eq!(handle.frame_count(), 1);
    }

    #[test]
    fn cancel_from_outside_releases_a_handle_holding_callback() {
        let host = SimHost::with_refresh_nanos(16 * MS);
        let slot: Rc<RefCell<Option<PacerHandle>>> = Rc::new(RefCell::new(None));
        let dropped = Rc::new(Cell::new(false));
        let render = {
            let slot = Rc::clone(&slot);
            let flag = DropFlag(Rc::clone(&dropped));
            move || {
                let _owned = (&flag, &slot);
            }
        };
        let handle = start(host.clone(), config(PacingMode::Auto), render);
        *slot.borrow_mut() = Some(handle.clone());
        host.run_ticks(5);
        assert!(!dropped.get());

        handle.cancel();
        assert!(dropped.get(), "cancel keeps the callback alive");
        assert_eq!(host.run_ticks(5), 0);
    }

    #[test]
    fn panicking_render_ends_the_loop() {
        use std::panic::{AssertUnwindSafe, catch_unwind};

        let host = SimHost::with_refresh_nanos(16 * MS);
        let count = Rc::new(Cell::new(0));
        let render = {
            let count = Rc::clone(&count);
            move || {
                count.set(count.get() + 1);
                if count.get() == 2 {
                    panic!("render failed");
                }
            }
        };
        let handle = start(host.clone(), config(PacingMode::Auto), render);
        assert!(host.step());

        let result = catch_unwind(AssertUnwindSafe(|| host.step()));
        assert!(result.is_err());
        assert!(!handle.is_pending(), "no tick scheduled after the panic");
        assert_eq!(host.pending_count(), 0);
        assert_eq!(host.run_ticks(5), 0);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn stall_does_not_burst_catch_up_frames() {
        let host = SimHost::with_refresh_nanos(16 * MS);
        let (count, render) = counter();
        let _handle = start(host.clone(), config(PacingMode::Fixed), render);
        host.run_ticks(10);

        let target = config(PacingMode::Fixed).target_interval;
        host.suspend_for(target.saturating_mul(12));
        let woke = host.now();
        host.run_ticks(1);
        assert_eq!(count.get(), 11);
        // Clamped to now: one zero-delay tick, then the normal cadence.
        assert_eq!(host.next_due(), Some(woke));
        host.run_ticks(1);
        assert_eq!(count.get(), 12);
        assert_eq!(host.next_due(), Some(woke + target));
    }

    #[test]
    fn independent_loops_do_not_interfere() {
        let fast = SimHost::with_refresh_nanos(8 * MS);
        let steady = SimHost::with_refresh_nanos(16_700_000);
        let (_, render_a) = counter();
        let (_, render_b) = counter();
        let a = start(fast.clone(), config(PacingMode::Auto), render_a);
        let b = start(steady.clone(), config(PacingMode::Auto), render_b);
        fast.run_ticks(31);
        steady.run_ticks(31);
        assert_eq!(a.mode(), PacingMode::Fixed);
        assert_eq!(b.mode(), PacingMode::Sync);
        a.cancel();
        assert!(!b.is_cancelled());
    }

    #[cfg(feature = "trace")]
    #[test]
    fn loop_reports_decision_and_single_cancel() {
        use crate::trace::{ModeDecisionEvent, SharedSink};

        #[derive(Default)]
        struct Log {
            ticks: u32,
            decisions: Vec<ModeDecisionEvent>,
            cancels: Vec<CancelEvent>,
        }
        impl TraceSink for Log {
            fn on_pacer_tick(&mut self, _e: &crate::trace::PacerTickEvent) {
                self.ticks += 1;
            }
            fn on_mode_decision(&mut self, e: &ModeDecisionEvent) {
                self.decisions.push(*e);
            }
            fn on_cancel(&mut self, e: &CancelEvent) {
                self.cancels.push(*e);
            }
        }

        let host = SimHost::with_refresh_nanos(16_700_000);
        let log = SharedSink::new(Log::default());
        let handle = start_traced(
            host.clone(),
            config(PacingMode::Auto),
            || {},
            Box::new(log.clone()),
        );
        host.run_ticks(45);
        handle.cancel();
        handle.cancel();

        let log = log.borrow();
        assert_eq!(log.ticks, 45);
        assert_eq!(log.decisions.len(), 1);
        assert_eq!(log.decisions[0].mode, PacingMode::Sync);
        assert_eq!(log.cancels.len(), 1, "second cancel is silent");
        assert_eq!(log.cancels[0].frames, 45);
        assert_eq!(
            log.cancels[0].now,
            crate::time::HostTime(1_000_000_000 + 45 * 16_700_000)
        );
    }

    #[cfg(feature = "trace")]
    #[test]
    fn cancel_from_a_sink_callback_is_delivered_after_the_tick() {
        use crate::trace::{ModeDecisionEvent, SharedSink};

        #[derive(Default)]
        struct Canceller {
            handle: Option<PacerHandle>,
            cancels: Vec<CancelEvent>,
        }
        impl TraceSink for Canceller {
            fn on_mode_decision(&mut self, _e: &ModeDecisionEvent) {
                if let Some(handle) = &self.handle {
                    assert_eq!(handle.mode(), PacingMode::Auto);
                    handle.cancel();
                }
            }
            fn on_cancel(&mut self, e: &CancelEvent) {
                self.cancels.push(*e);
            }
        }

        let host = SimHost::with_refresh_nanos(8 * MS);
        let sink = SharedSink::new(Canceller::default());
        let released = Rc::new(Cell::new(false));
        let (count, render) = counter();
        let handle = start_traced(
            host.clone(),
            config(PacingMode::Auto),
            render,
            Box::new((sink.clone(), DropFlag(Rc::clone(&released)))),
        );
        sink.borrow_mut().handle = Some(handle.clone());

        assert_eq!(host.run_ticks(40), 31);
        assert!(handle.is_cancelled());
        assert_eq!(count.get(), 30, "the deciding tick does not render");
        assert_eq!(host.pending_count(), 0);
        assert!(released.get(), "sink kept after cancel");

        let sink = sink.borrow();
        assert_eq!(sink.cancels.len(), 1);
        assert_eq!(sink.cancels[0].frames, 30);
        assert_eq!(handle.frame_count(), 30);
    }
}
