// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Asynchronous commit scheduling for a hardware display compositor.
//!
//! A [`Compositor`] accepts frame submissions, resolves them with
//! [`winlatch_core`], imports their buffers, and hands them to a single
//! worker thread that programs the display controller one frame at a time.
//!
//! ```text
//!   submit() ─► validate ─► resolve ─► import ─► FIFO ─► worker
//!      │                                                  │
//!      └──────────────── release Fence ◄── frame Active ◄─┘
//! ```
//!
//! Buffers are double-buffered: the buffers of frame *N* stay mapped until
//! frame *N + 1* is on screen, and are then released exactly once.
//!
//! The device and buffer services are supplied by the embedder through the
//! [`DisplayHardware`] and [`BufferImporter`] traits.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables structured event dispatch to the
//!   installed [`TraceSink`](trace::TraceSink). Log output through `tracing`
//!   is always available.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod buffer;
pub mod config;
mod compositor;
pub mod error;
pub mod fence;
pub mod frame;
pub mod hardware;
pub mod state;
pub mod trace;
mod worker;

pub use buffer::{BufferImporter, MappedPlane};
pub use compositor::Compositor;
pub use config::{CommitConfig, FatalPolicy};
pub use error::{BufferImportError, CommitError, HardwareError, WaitKind};
pub use fence::Fence;
pub use hardware::DisplayHardware;
pub use state::{CompositorSnapshot, DeviceState};
