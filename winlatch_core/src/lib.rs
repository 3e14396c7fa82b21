// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Window configuration, geometry, and frame resolution for hardware display
//! compositing.
//!
//! `winlatch_core` turns a client's description of the next frame into the
//! register snapshot a display controller latches. It is `no_std` compatible
//! (with `alloc`), performs no I/O, and every function is deterministic:
//! identical input always produces identical output.
//!
//! # Architecture
//!
//! ```text
//!   &[WindowConfig]
//!       │
//!       ▼
//!   validate() ──► FrameRequest ──► resolve_frame() ──► ResolvedFrame
//!                                                            │
//!                 ┌──────────────────────────────────────────┘
//!                 ▼
//!   RegisterFrame::build() ──► RegisterFrame ──► (commit worker)
//! ```
//!
//! **[`window`]** — Per-slot requests: state, source and destination
//! rectangles, format, blending, channel, buffer and fence handles.
//!
//! **[`validate`]** — Whole-submission checks. A submission either passes
//! as a unit or is rejected with a [`ValidationError`](validate::ValidationError).
//!
//! **[`partial`]** — Grows a requested update rectangle until the hardware
//! can refresh it, or falls back to a full frame, and clips windows into it.
//!
//! **[`blocking`]** — Finds the largest part of each window hidden by opaque
//! content above it.
//!
//! **[`resolve`]** — Chains the resolvers and fills blank frames.
//!
//! **[`regs`]** — Control-word encoding and the [`RegisterFrame`](regs::RegisterFrame)
//! snapshot.
//!
//! **[`protection`]** — Per-channel protection masks and transitions.
//!
//! **[`caps`]** — Hardware capabilities and panel description, fixed per
//! compositor.
//!
//! **[`geometry`]** and **[`format`]** — Integer rectangles and pixel
//! formats.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod blocking;
pub mod caps;
pub mod format;
pub mod geometry;
pub mod partial;
pub mod protection;
pub mod regs;
pub mod resolve;
pub mod validate;
pub mod window;
