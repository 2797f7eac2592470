// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Browser [`FrameHost`].
//!
//! [`WebHost`] maps the display-synced primitive to `requestAnimationFrame`
//! and the timer primitive to `setTimeout`. The clock is `performance.now()`
//! converted to microsecond [`HostTime`] ticks.
//!
//! Each primitive owns one JS closure for the lifetime of the host. The
//! closure takes the pending Rust callback out of its slot and runs it, so
//! requesting a frame never allocates a new JS function and a cancelled
//! callback is dropped on the Rust side right away.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::{Cell, RefCell};
use core::fmt;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;

use cadence_core::host::{FrameHost, HostCallback};
use cadence_core::time::{Duration, HostTime};

// Direct global bindings instead of `web_sys::Window` methods, so nothing has
// to fetch (and unwrap) the Window object on every frame.
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = performance, js_name = "now")]
    pub(crate) fn performance_now() -> f64;

    #[wasm_bindgen(js_name = "requestAnimationFrame")]
    fn request_animation_frame(callback: &JsValue) -> i32;

    #[wasm_bindgen(js_name = "cancelAnimationFrame")]
    fn cancel_animation_frame(id: i32);

    #[wasm_bindgen(js_name = "setTimeout")]
    fn set_timeout(callback: &JsValue, millis: f64) -> i32;

    #[wasm_bindgen(js_name = "clearTimeout")]
    fn clear_timeout(id: i32);
}

/// Identifies a pending `requestAnimationFrame` request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RafId(pub i32);

/// Identifies a pending `setTimeout` request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeoutId(pub i32);

/// A [`FrameHost`] backed by the browser's main-thread event loop.
///
/// Holds at most one pending request per primitive: a second request on the
/// same primitive replaces the first. A pacing loop never has more than one
/// request in flight, so one host per loop is enough.
#[derive(Clone)]
pub struct WebHost {
    inner: Rc<WebInner>,
}

struct WebInner {
    display: Slot,
    timer: Slot,
}

/// State shared between a [`Slot`] and its JS closure.
#[derive(Default)]
struct SlotState {
    callback: RefCell<Option<HostCallback>>,
    /// Browser id of the in-flight request, if any.
    id: Cell<Option<i32>>,
}

/// One primitive's pending callback and the JS closure that runs it.
struct Slot {
    state: Rc<SlotState>,
    closure: Closure<dyn FnMut()>,
}

impl Slot {
    fn new() -> Self {
        let state = Rc::new(SlotState::default());
        let fired = Rc::clone(&state);
        let closure = Closure::wrap(Box::new(move || {
            fired.id.set(None);
            // The borrow ends with this statement; the callback re-borrows
            // the slot when it requests the next frame.
            let callback = fired.callback.borrow_mut().take();
            if let Some(callback) = callback {
                callback();
            }
        }) as Box<dyn FnMut()>);
        Self { state, closure }
    }

    fn js_function(&self) -> &JsValue {
        self.closure.as_ref()
    }

    fn pending_id(&self) -> Option<i32> {
        self.state.id.get()
    }

    /// Stores `callback`, returning the callback it replaces.
    fn arm(&self, id: i32, callback: HostCallback) -> Option<HostCallback> {
        self.state.id.set(Some(id));
        self.state.callback.borrow_mut().replace(callback)
    }

    /// Forgets the request `id` if it is still the current one.
    fn disarm(&self, id: i32) -> Option<HostCallback> {
        if self.state.id.get() != Some(id) {
            return None;
        }
        self.state.id.set(None);
        self.state.callback.borrow_mut().take()
    }
}

impl WebHost {
    /// Creates a host with no pending requests.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(WebInner {
                display: Slot::new(),
                timer: Slot::new(),
            }),
        }
    }
}

impl Default for WebHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameHost for WebHost {
    type DisplayHandle = RafId;
    type TimerHandle = TimeoutId;

    fn now(&self) -> HostTime {
        crate::now()
    }

    fn request_display_sync(&self, callback: HostCallback) -> RafId {
        let slot = &self.inner.display;
        if let Some(previous) = slot.pending_id() {
            cancel_animation_frame(previous);
        }
        let id = request_animation_frame(slot.js_function());
        let replaced = slot.arm(id, callback);
        drop(replaced);
        RafId(id)
    }

    fn cancel_display_sync(&self, handle: RafId) {
        let dropped = self.inner.display.disarm(handle.0);
        if dropped.is_some() {
            cancel_animation_frame(handle.0);
        }
    }

    fn request_timer(&self, delay: Duration, callback: HostCallback) -> TimeoutId {
        let slot = &self.inner.timer;
        if let Some(previous) = slot.pending_id() {
            clear_timeout(previous);
        }
        let millis = delay.as_millis_f64(crate::timebase());
        let id = set_timeout(slot.js_function(), millis);
        let replaced = slot.arm(id, callback);
        drop(replaced);
        TimeoutId(id)
    }

    fn cancel_timer(&self, handle: TimeoutId) {
        let dropped = self.inner.timer.disarm(handle.0);
        if dropped.is_some() {
            clear_timeout(handle.0);
        }
    }
}

impl fmt::Debug for WebHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebHost")
            .field("display_pending", &self.inner.display.pending_id())
            .field("timer_pending", &self.inner.timer.pending_id())
            .finish_non_exhaustive()
    }
}
