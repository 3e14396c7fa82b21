// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording and pretty-printing of winlatch commit traces.
//!
//! This crate provides [`TraceSink`](winlatch_commit::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`]: one human-readable line per event.
//! - [`recorder::RecorderSink`]: compact binary recording, read back with
//!   [`recorder::decode`].

pub mod pretty;
pub mod recorder;
