// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adaptive frame pacing for render loops.
//!
//! `cadence_core` drives a render callback at a steady 60 Hz on hosts whose
//! display-synced callback may fire faster than that (120 Hz or 144 Hz
//! panels). It is `no_std` compatible (with `alloc`) and knows nothing about
//! any particular platform: backends provide a clock and two scheduling
//! primitives through the [`FrameHost`](host::FrameHost) trait.
//!
//! # Architecture
//!
//! A loop starts in measuring mode on the display-synced primitive, records
//! the first 30 wake-up times, then settles on a primitive for good:
//!
//! ```text
//!   start(host, config, render)
//!       │
//!       ▼
//!   Auto ── 30 samples ──► FramePacer::decide()
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//!   Fixed: request_timer(ideal - now)   Sync: request_display_sync()
//! ```
//!
//! Ideal frame times advance by exactly one target interval per tick, so
//! timer lateness never accumulates. A tick that finds itself behind its own
//! ideal time (after a suspended tab, for example) snaps the ideal time to
//! the present instead of racing to catch up.
//!
//! **[`pacer`]**: The pure pacing state machine. [`FramePacer`](pacer::FramePacer)
//! turns a clock reading into a [`TickPlan`](pacer::TickPlan).
//!
//! **[`frame_loop`]**: [`start`](frame_loop::start) runs a pacer on a host
//! and hands back a cancellable [`PacerHandle`](frame_loop::PacerHandle).
//!
//! **[`host`]**: The [`FrameHost`](host::FrameHost) contract between the
//! loop and its environment.
//!
//! **[`sim`]**: [`SimHost`](sim::SimHost), a deterministic virtual-clock
//! host for tests and demos.
//!
//! **[`time`]**: Host-tick time types and tick/nanosecond conversion.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! loop instrumentation, with zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod frame_loop;
pub mod host;
pub mod pacer;
pub mod sim;
pub mod time;
pub mod trace;
