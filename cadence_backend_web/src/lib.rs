// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Web backend for cadence.
//!
//! This crate provides integration with browser APIs:
//!
//! - [`WebHost`]: a [`FrameHost`] over `requestAnimationFrame`, `setTimeout`
//!   and `performance.now()`
//! - [`ConsoleSink`]: a [`TraceSink`](cadence_core::trace::TraceSink) that
//!   logs pacing events to the browser console
//! - [`start`]: starts a paced loop on a fresh [`WebHost`]

#![no_std]

extern crate alloc;

mod console;
mod host;

pub use cadence_core::host::FrameHost;
pub use console::ConsoleSink;
pub use host::{RafId, TimeoutId, WebHost};

use alloc::boxed::Box;

use cadence_core::frame_loop::{self, PacerHandle};
use cadence_core::pacer::PacerConfig;
use cadence_core::time::{HostTime, Timebase};
use cadence_core::trace::TraceSink;

/// Returns the current host time from `performance.now()`.
///
/// The returned [`HostTime`] is in microsecond ticks. Use [`timebase`] to
/// convert to nanoseconds.
#[must_use]
pub fn now() -> HostTime {
    let ms = host::performance_now();
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "performance.now() returns small positive f64; µs fits in u64"
    )]
    let us = (ms * 1000.0) as u64;
    HostTime(us)
}

/// Returns the web [`Timebase`]: 1 tick = 1 µs = 1000 ns.
#[must_use]
pub const fn timebase() -> Timebase {
    Timebase::MICROS
}

/// Starts a paced loop on a new [`WebHost`].
///
/// `config` is usually [`PacerConfig::web()`], optionally with a different
/// initial mode. Call [`PacerHandle::cancel`] to stop the loop.
#[must_use = "dropping the handle leaves the loop running with no way to cancel it"]
pub fn start(config: PacerConfig, render: impl FnMut() + 'static) -> PacerHandle {
    frame_loop::start(WebHost::new(), config, render)
}

/// Like [`start`], also reporting pacing events to `sink`.
#[must_use = "dropping the handle leaves the loop running with no way to cancel it"]
pub fn start_traced(
    config: PacerConfig,
    render: impl FnMut() + 'static,
    sink: impl TraceSink + 'static,
) -> PacerHandle {
    frame_loop::start_traced(WebHost::new(), config, render, Box::new(sink))
}
