// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Partial-update resolution.
//!
//! Command-mode panels keep their own frame memory, so only the area that
//! changed has to be sent. The client names that area; [`resolve_update`]
//! grows it to satisfy scaler and alignment limits (or gives up and asks for
//! a full frame), and [`clip_windows`] rewrites every window into the
//! coordinate space of the resulting rectangle.

use alloc::vec::Vec;

use crate::caps::{HardwareCapabilities, Panel};
use crate::geometry::{Rect, Region, align_down, align_up};
use crate::window::{WindowConfig, WindowState};

/// Area of the panel a frame refreshes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum UpdateRegion {
    /// The whole panel.
    #[default]
    Full,
    /// Only this region, in panel coordinates.
    Partial(Region),
}

impl UpdateRegion {
    /// The refreshed area in panel coordinates.
    #[must_use]
    pub const fn region(&self, panel: &Panel) -> Region {
        match self {
            Self::Full => Region::new(0, 0, panel.width, panel.height),
            Self::Partial(r) => *r,
        }
    }

    /// Returns `true` for a partial update.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        matches!(self, Self::Partial(_))
    }
}

/// Output of [`resolve_partial`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartialUpdate {
    /// What the frame refreshes.
    pub region: UpdateRegion,
    /// Windows rewritten for `region`. Identical to the input for full
    /// frames.
    pub windows: Vec<WindowConfig>,
}

/// Grows a requested update rectangle until the hardware can refresh it.
///
/// `windows` is the slot-ordered frame before clipping.
#[must_use]
pub fn resolve_update(
    windows: &[WindowConfig],
    requested: Option<Region>,
    caps: &HardwareCapabilities,
    panel: &Panel,
) -> UpdateRegion {
    let Some(mut req) = requested else {
        return UpdateRegion::Full;
    };
    if !caps.partial_update || req.is_empty() || req.x < 0 || req.y < 0 {
        return UpdateRegion::Full;
    }

    if let Some(rows) = caps.segment_rows {
        if req.y % rows != 0 || req.h % rows != 0 {
            return UpdateRegion::Full;
        }
        req.x = 0;
        req.w = panel.width;
    }

    if windows
        .iter()
        .any(|w| w.is_enabled() && w.rotation.is_rotated())
    {
        return UpdateRegion::Full;
    }

    // Scaled windows must be refreshed whole. Growing the rectangle can pull
    // in further scaled windows, so repeat until it settles.
    let mut rect = req.to_rect();
    loop {
        let mut grown = rect;
        for w in windows.iter().filter(|w| w.is_enabled() && w.is_scaled()) {
            let dst = w.dst.to_rect();
            if grown.intersects(&dst) && grown.differs(&dst) {
                grown = grown.union(&dst);
            }
        }
        if grown == rect {
            break;
        }
        rect = grown;
    }

    let mut region = rect.to_region();
    let align = caps.update_alignment;
    let aligned_x = align_down(region.x, align);
    region.w += region.x - aligned_x;
    region.x = aligned_x;
    region.w = align_up(region.w, align);
    if region.x + region.w > panel.width {
        region.x = 0;
        region.w = panel.width;
    }
    if region.y + region.h > panel.height {
        region.h = panel.height - region.y;
    }
    if region.is_empty() || region == UpdateRegion::Full.region(panel) {
        return UpdateRegion::Full;
    }

    // Every enabled slot must keep a slice the channel can fetch. Extents are
    // measured edge to edge, so a slice exactly at the minimum is too small.
    let update = region.to_rect();
    for w in windows.iter().filter(|w| w.is_enabled()) {
        let Some(overlap) = update.intersection(&w.dst.to_rect()) else {
            continue;
        };
        let (span_x, span_y) = (overlap.right - overlap.left, overlap.bottom - overlap.top);
        if span_x == 0 && span_y == 0 {
            continue;
        }
        let min = if w.format.plane_count() == 1 {
            caps.min_scaler_input
        } else {
            caps.min_scaler_input_multiplane
        };
        if span_x < min.width || span_y < min.height {
            return UpdateRegion::Full;
        }
    }

    UpdateRegion::Partial(region)
}

fn clip_hint(hint: Option<Region>, update: &Rect) -> Option<Region> {
    let clipped = hint?.to_rect().intersection(update)?;
    Some(clipped.to_region().relative_to(update.left, update.top))
}

/// Rewrites windows into the coordinate space of `update`.
///
/// Windows outside `update` are disabled. The rest have their destination
/// clipped and moved so that `update`'s origin becomes `(0, 0)`. Unscaled
/// windows have their source cropped by the same amount; scaled windows
/// keep their source, since [`resolve_update`] grew `update` to contain
/// them.
pub fn clip_windows(windows: &mut [WindowConfig], update: Region) {
    let bounds = update.to_rect();
    for w in windows.iter_mut().filter(|w| w.is_enabled()) {
        let dst = w.dst.to_rect();
        let Some(clipped) = bounds.intersection(&dst) else {
            w.state = WindowState::Disabled;
            continue;
        };
        let scaled = w.is_scaled();
        let new_dst = clipped.to_region().relative_to(update.x, update.y);
        if !scaled {
            w.src.x += clipped.left - dst.left;
            w.src.y += clipped.top - dst.top;
            w.src.w = new_dst.w;
            w.src.h = new_dst.h;
        }
        w.dst = new_dst;
        w.opaque_area = clip_hint(w.opaque_area, &bounds);
        w.transparent_area = clip_hint(w.transparent_area, &bounds);
    }
}

/// Resolves the update rectangle and clips a copy of the frame to it.
#[must_use]
pub fn resolve_partial(
    windows: &[WindowConfig],
    requested: Option<Region>,
    caps: &HardwareCapabilities,
    panel: &Panel,
) -> PartialUpdate {
    let region = resolve_update(windows, requested, caps, panel);
    let mut windows = windows.to_vec();
    if let UpdateRegion::Partial(r) = region {
        clip_windows(&mut windows, r);
    }
    PartialUpdate { region, windows }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
