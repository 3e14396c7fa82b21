// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame resolution: validated request in, programmable windows out.
//!
//! ```text
//!   FrameRequest
//!       │
//!       ▼
//!   blank fallback ──► resolve_partial() ──► resolve_blocking()
//!                                                   │
//!                                                   ▼
//!                      ResolvedFrame ◄──────── blank fallback
//! ```
//!
//! Resolution never fails. Every step either keeps a window, rewrites it, or
//! drops it from this frame.

use alloc::vec::Vec;

use crate::blocking::resolve_blocking;
use crate::caps::{HardwareCapabilities, Panel};
use crate::geometry::Region;
use crate::partial::{UpdateRegion, resolve_partial};
use crate::regs::RegisterFrame;
use crate::validate::FrameRequest;
use crate::window::WindowConfig;

/// Fill color used when a frame has nothing to show.
pub const BLANK_COLOR: u32 = 0xff00_0000;

/// Windows ready to be bound to buffers and programmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedFrame {
    /// One entry per slot, clipped to `update` and with hidden windows
    /// disabled.
    pub windows: Vec<WindowConfig>,
    /// Blocking region of each slot.
    pub blocks: Vec<Option<Region>>,
    /// Area of the panel this frame refreshes.
    pub update: UpdateRegion,
    /// Whether slot 0 was turned into a blank fill.
    pub blanked: bool,
}

impl ResolvedFrame {
    /// Builds the register snapshot for this frame, without plane
    /// addresses.
    #[must_use]
    pub fn to_registers(&self, panel: &Panel) -> RegisterFrame {
        RegisterFrame::build(&self.windows, &self.blocks, self.update, panel)
    }
}

/// Turns slot 0 into a full-panel blank fill when no slot is enabled.
///
/// Returns `true` if the fill was applied.
pub fn apply_blank_fallback(windows: &mut [WindowConfig], panel: &Panel) -> bool {
    if windows.iter().any(WindowConfig::is_enabled) {
        return false;
    }
    let Some(base) = windows.first_mut() else {
        return false;
    };
    *base = WindowConfig::solid(0, Region::new(0, 0, panel.width, panel.height), BLANK_COLOR);
    true
}

/// Runs every resolution step over a validated request.
#[must_use]
pub fn resolve_frame(
    request: &FrameRequest,
    caps: &HardwareCapabilities,
    panel: &Panel,
) -> ResolvedFrame {
    let mut windows = request.windows.clone();
    let mut blanked = apply_blank_fallback(&mut windows, panel);
    let requested = if blanked { None } else { request.update };

    let partial = resolve_partial(&windows, requested, caps, panel);
    let mut windows = partial.windows;
    let mut update = partial.region;
    let mut blocks = resolve_blocking(&mut windows, caps, panel, update.is_partial());

    // Clipping and blocking can hide every slot that was enabled on entry.
    if !blanked && apply_blank_fallback(&mut windows, panel) {
        blocks.fill(None);
        update = UpdateRegion::Full;
        blanked = true;
    }

    ResolvedFrame {
        windows,
        blocks,
        update,
        blanked,
    }
}
