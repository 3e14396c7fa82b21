// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer window requests.
//!
//! A submission is a slice of [`WindowConfig`] values, one per hardware slot
//! the client wants to touch, plus at most one entry in
//! [`WindowState::UpdateRegion`] naming the panel area that actually
//! changed. Slot index doubles as z-order: higher indices are composited on
//! top of lower ones.

use alloc::vec::Vec;

use crate::format::PixelFormat;
use crate::geometry::{Region, Size};

/// Opaque handle to a producer buffer plane, resolved by the importer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

impl core::fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "BufferHandle({})", self.0)
    }
}

/// Opaque handle to a producer's acquire fence.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceHandle(pub u64);

impl core::fmt::Debug for FenceHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FenceHandle({})", self.0)
    }
}

/// A hardware DMA channel feeding one window.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(pub u8);

impl ChannelId {
    /// Bit for this channel in a per-channel mask, or `0` for a channel
    /// past the mask width.
    #[must_use]
    pub const fn bit(self) -> u32 {
        if self.0 < 32 { 1 << self.0 } else { 0 }
    }
}

impl core::fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

/// What a slot shows this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowState {
    /// Slot is off.
    Disabled,
    /// Slot fills its destination with a constant ARGB color.
    SolidColor(u32),
    /// Slot scans out an imported buffer.
    Buffer,
    /// Not a layer: `dst` names the panel area that changed.
    UpdateRegion,
}

/// How a window's pixels combine with what is beneath them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Blending {
    /// Source replaces destination.
    #[default]
    None,
    /// Source color is already multiplied by its alpha.
    Premultiplied,
    /// Source color is multiplied by alpha during blending.
    Coverage,
}

/// Source orientation applied by the DMA channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    /// As stored.
    #[default]
    Normal,
    /// Mirrored left-to-right.
    FlipX,
    /// Mirrored top-to-bottom.
    FlipY,
    /// Half turn.
    Rot180,
    /// Quarter turn clockwise.
    Rot90,
    /// Quarter turn counter-clockwise.
    Rot270,
}

impl Rotation {
    /// Returns `true` for quarter turns, which swap the source axes and make
    /// the channel fetch column-wise.
    #[must_use]
    pub const fn is_rotated(self) -> bool {
        matches!(self, Self::Rot90 | Self::Rot270)
    }
}

/// One slot of a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowConfig {
    /// Hardware slot, also the z-order.
    pub index: usize,
    /// What the slot shows.
    pub state: WindowState,
    /// Crop inside the source buffer.
    pub src: Region,
    /// Placement on the panel.
    pub dst: Region,
    /// Full extent of the source buffer.
    pub buffer_size: Size,
    /// Source layout.
    pub format: PixelFormat,
    /// Blend equation.
    pub blending: Blending,
    /// Whole-window alpha; 0 and 255 both mean "not used".
    pub plane_alpha: u8,
    /// Content must stay on a protected channel.
    pub protected: bool,
    /// Channel that fetches this window.
    pub channel: ChannelId,
    /// Source orientation.
    pub rotation: Rotation,
    /// One handle per plane of `format`.
    pub planes: Vec<BufferHandle>,
    /// Fence the producer signals once the buffer is written.
    pub acquire_fence: Option<FenceHandle>,
    /// Part of `dst` known to be fully opaque, in panel coordinates.
    pub opaque_area: Option<Region>,
    /// Part of `dst` known to be fully transparent, in panel coordinates.
    pub transparent_area: Option<Region>,
}

impl WindowConfig {
    /// A disabled slot.
    #[must_use]
    pub fn disabled(index: usize) -> Self {
        Self {
            index,
            state: WindowState::Disabled,
            src: Region::default(),
            dst: Region::default(),
            buffer_size: Size::default(),
            format: PixelFormat::Argb8888,
            blending: Blending::None,
            plane_alpha: 255,
            protected: false,
            channel: ChannelId(0),
            rotation: Rotation::Normal,
            planes: Vec::new(),
            acquire_fence: None,
            opaque_area: None,
            transparent_area: None,
        }
    }

    /// A buffer-backed slot showing the whole buffer at `dst`, unscaled when
    /// `dst` matches the buffer extent.
    #[must_use]
    pub fn buffer(
        index: usize,
        channel: ChannelId,
        format: PixelFormat,
        buffer_size: Size,
        dst: Region,
        planes: Vec<BufferHandle>,
    ) -> Self {
        Self {
            state: WindowState::Buffer,
            src: Region::new(0, 0, buffer_size.width, buffer_size.height),
            dst,
            buffer_size,
            format,
            channel,
            planes,
            ..Self::disabled(index)
        }
    }

    /// A constant-color slot. The blender fills these itself, so no
    /// channel is involved.
    #[must_use]
    pub fn solid(index: usize, dst: Region, argb: u32) -> Self {
        Self {
            state: WindowState::SolidColor(argb),
            dst,
            ..Self::disabled(index)
        }
    }

    /// The update-region entry of a submission.
    #[must_use]
    pub fn update_region(dst: Region) -> Self {
        Self {
            state: WindowState::UpdateRegion,
            dst,
            ..Self::disabled(0)
        }
    }

    /// Returns `true` if this slot produces pixels.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self.state, WindowState::Buffer | WindowState::SolidColor(_))
    }

    /// Returns `true` if the channel has to scale between `src` and `dst`.
    #[must_use]
    pub const fn is_scaled(&self) -> bool {
        matches!(self.state, WindowState::Buffer)
            && (self.src.w != self.dst.w || self.src.h != self.dst.h)
    }

    /// Returns `true` if plane alpha takes part in blending.
    #[must_use]
    pub const fn uses_plane_alpha(&self) -> bool {
        self.plane_alpha > 0 && self.plane_alpha < 255
    }
}
