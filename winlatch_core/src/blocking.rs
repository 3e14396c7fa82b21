// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Overlap and blocking-region resolution.
//!
//! A blocking rectangle tells the hardware to skip fetching part of a window
//! because whatever is composited above it fully hides that part. Each
//! window gets at most one such rectangle, so the resolver picks the single
//! largest covered area it can find.
//!
//! The search is greedy and looks at one covering window at a time: two
//! adjacent opaque windows that together cover a larger area are never
//! merged. Results therefore depend on which single overlap is largest, not
//! on the union of all overlaps.

use alloc::vec::Vec;

use crate::caps::{HardwareCapabilities, Panel};
use crate::geometry::{Rect, Region};
use crate::window::{WindowConfig, WindowState};

/// Result of blocking resolution for one window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockingOutcome {
    /// Fetch the whole window.
    None,
    /// Skip this region, given relative to the window's destination origin.
    Block(Region),
    /// The window is hidden entirely and is dropped from the frame.
    Disable,
}

/// Returns `true` if blocking can apply to this window at all.
fn eligible(window: &WindowConfig) -> bool {
    window.state == WindowState::Buffer
        && window.format.is_rgb32()
        && !window.rotation.is_rotated()
        && !window.is_scaled()
}

/// Area of the panel an upper window hides, in panel coordinates.
fn covered_area(above: &WindowConfig) -> Option<Region> {
    if above.format.is_opaque() {
        Some(above.dst)
    } else {
        above.opaque_area.filter(|a| !a.is_empty())
    }
}

fn large_enough(r: &Rect, min_w: i32, min_h: i32) -> bool {
    r.width() >= min_w && r.height() >= min_h
}

/// Resolves the blocking outcome of the window in slot `index`.
///
/// `windows` is the slot-ordered frame; only slots above `index` are
/// consulted. `partial_update` must be `true` when the frame is a partial
/// update, which turns off the transparent-area path.
#[must_use]
pub fn resolve_window(
    windows: &[WindowConfig],
    index: usize,
    caps: &HardwareCapabilities,
    panel: &Panel,
    partial_update: bool,
) -> BlockingOutcome {
    let Some(window) = windows.get(index) else {
        return BlockingOutcome::None;
    };
    if !caps.blocking || !eligible(window) {
        return BlockingOutcome::None;
    }

    let own = window.dst.to_rect();
    let min = caps.min_blocking;
    let mut best: Option<Rect> = None;

    for above in &windows[index + 1..] {
        if above.state != WindowState::Buffer || above.uses_plane_alpha() {
            continue;
        }
        let Some(cover) = covered_area(above) else {
            continue;
        };
        let Some(overlap) = own.intersection(&cover.to_rect()) else {
            continue;
        };
        if overlap == own {
            return BlockingOutcome::Disable;
        }
        if !large_enough(&overlap, min.width, min.height) {
            continue;
        }
        if overlap.area() > best.map_or(0, |b| b.area()) {
            best = Some(overlap);
        }
    }

    if !partial_update {
        if let Some(transparent) = window.transparent_area.filter(|t| !t.is_empty()) {
            let area = transparent.to_rect().area() * 100;
            let threshold = panel.area() * u64::from(caps.transparent_blocking_percent);
            if area >= threshold {
                if let Some(overlap) = own.intersection(&transparent.to_rect()) {
                    if overlap.area() > best.map_or(0, |b| b.area()) {
                        // A larger but unusable candidate cancels blocking
                        // for this window.
                        if !large_enough(&overlap, min.width, min.height) {
                            return BlockingOutcome::None;
                        }
                        if overlap == own {
                            return BlockingOutcome::Disable;
                        }
                        best = Some(overlap);
                    }
                }
            }
        }
    }

    match best {
        Some(rect) => BlockingOutcome::Block(rect.to_region().relative_to(own.left, own.top)),
        None => BlockingOutcome::None,
    }
}

/// Resolves every slot of a frame, bottom to top.
///
/// Windows resolved to [`BlockingOutcome::Disable`] are switched to
/// [`WindowState::Disabled`] in place. The returned vector holds the
/// blocking region of each slot.
pub fn resolve_blocking(
    windows: &mut [WindowConfig],
    caps: &HardwareCapabilities,
    panel: &Panel,
    partial_update: bool,
) -> Vec<Option<Region>> {
    let mut blocks = alloc::vec![None; windows.len()];
    for index in 0..windows.len() {
        match resolve_window(windows, index, caps, panel, partial_update) {
            BlockingOutcome::None => {}
            BlockingOutcome::Block(region) => blocks[index] = Some(region),
            BlockingOutcome::Disable => windows[index].state = WindowState::Disabled,
        }
    }
    blocks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
