// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hardware-programmable frame snapshots.
//!
//! A [`RegisterFrame`] is everything the commit worker writes for one frame:
//! a [`WindowRegs`] per slot plus the frame-wide update region, protection
//! mask and bandwidth estimate. It is derived deterministically from the
//! resolved windows, so identical submissions produce bit-identical frames.

use alloc::vec::Vec;

use bitflags::bitflags;

use crate::caps::Panel;
use crate::format::PixelFormat;
use crate::geometry::{Region, Size};
use crate::partial::UpdateRegion;
use crate::protection::ChannelMask;
use crate::window::{Blending, ChannelId, Rotation, WindowConfig, WindowState};

/// Most planes any format uses.
pub const MAX_PLANES: usize = 3;

/// Device-visible address of an imported buffer plane.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DeviceAddress(pub u64);

impl core::fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "DeviceAddress({:#x})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Control word
// ---------------------------------------------------------------------------

bitflags! {
    /// Single-bit fields of a window control word.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ControlFlags: u32 {
        /// Window takes part in blending.
        const ENABLE = 1 << 0;
        /// Alpha comes from each pixel rather than from the alpha registers.
        const PIXEL_ALPHA = 1 << 1;
        /// Pixel alpha is multiplied by plane alpha.
        const PLANE_ALPHA_MUL = 1 << 6;
    }
}

/// Blend equation selected by a control word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendFunc {
    /// Source replaces destination.
    Copy,
    /// Premultiplied source-over.
    SourceOver,
    /// Non-premultiplied source-over.
    Coverage,
    /// Premultiplied source-over scaled by plane alpha.
    PremultipliedPlaneAlpha,
}

impl BlendFunc {
    const fn bits(self) -> u32 {
        match self {
            Self::Copy => 0,
            Self::SourceOver => 1,
            Self::Coverage => 2,
            Self::PremultipliedPlaneAlpha => 3,
        }
    }

    const fn from_bits(bits: u32) -> Self {
        match bits {
            0 => Self::Copy,
            1 => Self::SourceOver,
            3 => Self::PremultipliedPlaneAlpha,
            _ => Self::Coverage,
        }
    }
}

const FUNC_SHIFT: u32 = 8;
const FUNC_MASK: u32 = 0xf << FUNC_SHIFT;
const ALPHA0_SHIFT: u32 = 16;
const ALPHA1_SHIFT: u32 = 24;

/// Packed per-window control register.
///
/// Layout: flags in the low byte, blend function in bits 8..12, alpha value
/// 0 in bits 16..24 and alpha value 1 in bits 24..32.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ControlWord(pub u32);

impl core::fmt::Debug for ControlWord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ControlWord")
            .field("flags", &self.flags())
            .field("func", &self.func())
            .field("alpha0", &self.alpha0())
            .field("alpha1", &self.alpha1())
            .finish()
    }
}

impl ControlWord {
    /// Encodes the blend setup of a window.
    ///
    /// `alpha_bits` is the per-pixel alpha depth of the source. Premultiplied
    /// blending needs real alpha to be meaningful, so it degrades to coverage
    /// for one-bit alpha, and for alpha-less sources that use plane alpha.
    #[must_use]
    pub fn encode(alpha_bits: u32, plane_alpha: u8, blending: Blending) -> Self {
        let uses_plane_alpha = plane_alpha > 0 && plane_alpha < 255;
        let mut blending = blending;
        let mut flags = ControlFlags::empty();

        if alpha_bits == 1 && blending == Blending::Premultiplied {
            blending = Blending::Coverage;
        }
        if uses_plane_alpha {
            if alpha_bits > 0 {
                if blending != Blending::None {
                    flags |= ControlFlags::PLANE_ALPHA_MUL;
                }
            } else if blending == Blending::Premultiplied {
                blending = Blending::Coverage;
            }
        }
        if alpha_bits > 1 {
            flags |= ControlFlags::PIXEL_ALPHA;
        }

        let func = match blending {
            Blending::None => BlendFunc::Copy,
            Blending::Premultiplied if uses_plane_alpha => BlendFunc::PremultipliedPlaneAlpha,
            Blending::Premultiplied => BlendFunc::SourceOver,
            Blending::Coverage => BlendFunc::Coverage,
        };
        let (alpha0, alpha1): (u8, u8) = if uses_plane_alpha {
            (plane_alpha, 0)
        } else {
            (0xff, 0xff)
        };

        Self(
            flags.bits()
                | (func.bits() << FUNC_SHIFT)
                | (u32::from(alpha0) << ALPHA0_SHIFT)
                | (u32::from(alpha1) << ALPHA1_SHIFT),
        )
    }

    /// Encodes the control word of a resolved window, including the enable
    /// bit. Disabled windows encode to zero.
    #[must_use]
    pub fn for_window(window: &WindowConfig) -> Self {
        match window.state {
            WindowState::Buffer => {
                Self::encode(window.format.alpha_bits(), window.plane_alpha, window.blending)
                    .with_enable(true)
            }
            WindowState::SolidColor(_) => {
                Self::encode(0, window.plane_alpha, window.blending).with_enable(true)
            }
            WindowState::Disabled | WindowState::UpdateRegion => Self(0),
        }
    }

    /// Returns this word with the enable bit set or cleared.
    #[must_use]
    pub const fn with_enable(self, enable: bool) -> Self {
        if enable {
            Self(self.0 | ControlFlags::ENABLE.bits())
        } else {
            Self(self.0 & !ControlFlags::ENABLE.bits())
        }
    }

    /// Raw register value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Single-bit fields.
    #[must_use]
    pub const fn flags(self) -> ControlFlags {
        ControlFlags::from_bits_truncate(self.0)
    }

    /// Returns `true` if the enable bit is set.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        self.0 & ControlFlags::ENABLE.bits() != 0
    }

    /// Blend function field.
    #[must_use]
    pub const fn func(self) -> BlendFunc {
        BlendFunc::from_bits((self.0 & FUNC_MASK) >> FUNC_SHIFT)
    }

    /// Alpha value 0.
    #[must_use]
    pub const fn alpha0(self) -> u8 {
        self.0.to_le_bytes()[2]
    }

    /// Alpha value 1.
    #[must_use]
    pub const fn alpha1(self) -> u8 {
        self.0.to_le_bytes()[3]
    }
}

// ---------------------------------------------------------------------------
// Window and frame registers
// ---------------------------------------------------------------------------

/// Registers of one blender slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WindowRegs {
    /// Control word.
    pub control: ControlWord,
    /// Placement in update-region coordinates.
    pub dst: Region,
    /// Crop inside the source buffer.
    pub src: Region,
    /// Full extent of the source buffer.
    pub buffer_size: Size,
    /// Channel fetching the window; `None` for solid and disabled slots.
    pub channel: Option<ChannelId>,
    /// Source layout.
    pub format: Option<PixelFormat>,
    /// Source orientation.
    pub rotation: Rotation,
    /// Fill color of solid slots.
    pub color: Option<u32>,
    /// Part of `dst` the channel may skip, relative to `dst`.
    pub block: Option<Region>,
    /// Device addresses of the source planes.
    pub planes: [Option<DeviceAddress>; MAX_PLANES],
    /// Content is protected.
    pub protected: bool,
}

impl WindowRegs {
    /// Returns `true` if the slot is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.control.is_enabled()
    }
}

/// Everything programmed for one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterFrame {
    /// One entry per blender slot.
    pub windows: Vec<WindowRegs>,
    /// Area of the panel refreshed.
    pub update: UpdateRegion,
    /// Whether `update` differs from the previously programmed region.
    pub update_changed: bool,
    /// Channels carrying protected content.
    pub protection: ChannelMask,
    /// Estimated fetch bandwidth in bytes per second.
    pub bandwidth: u64,
    /// Number of enabled slots.
    pub enabled_count: usize,
}

impl RegisterFrame {
    /// Builds the frame from resolved windows.
    ///
    /// `blocks` holds the blocking region of each slot, as produced by
    /// [`resolve_blocking`](crate::blocking::resolve_blocking). Plane
    /// addresses start out empty; see [`bind_planes`](Self::bind_planes).
    #[must_use]
    pub fn build(
        windows: &[WindowConfig],
        blocks: &[Option<Region>],
        update: UpdateRegion,
        panel: &Panel,
    ) -> Self {
        let mut frame = Self {
            windows: Vec::with_capacity(windows.len()),
            update,
            ..Self::default()
        };

        for (i, w) in windows.iter().enumerate() {
            let mut regs = WindowRegs {
                control: ControlWord::for_window(w),
                ..WindowRegs::default()
            };
            match w.state {
                WindowState::Buffer => {
                    regs.dst = w.dst;
                    regs.src = w.src;
                    regs.buffer_size = w.buffer_size;
                    regs.channel = Some(w.channel);
                    regs.format = Some(w.format);
                    regs.rotation = w.rotation;
                    regs.block = blocks.get(i).copied().flatten();
                    regs.protected = w.protected;
                    if w.protected {
                        frame.protection.insert(w.channel);
                    }
                    frame.bandwidth += bandwidth(w.dst, w.format, panel.refresh_hz);
                }
                WindowState::SolidColor(argb) => {
                    regs.dst = w.dst;
                    regs.color = Some(argb);
                }
                WindowState::Disabled | WindowState::UpdateRegion => {}
            }
            if regs.is_enabled() {
                frame.enabled_count += 1;
            }
            frame.windows.push(regs);
        }
        frame
    }

    /// Records the device addresses of a slot's planes.
    pub fn bind_planes(&mut self, slot: usize, addresses: &[DeviceAddress]) {
        if let Some(regs) = self.windows.get_mut(slot) {
            for (dst, addr) in regs.planes.iter_mut().zip(addresses) {
                *dst = Some(*addr);
            }
        }
    }

    /// Clears a slot's enable bit, keeping the rest of its registers for
    /// diagnostics.
    pub fn disable(&mut self, slot: usize) {
        if let Some(regs) = self.windows.get_mut(slot) {
            if regs.is_enabled() {
                regs.control = regs.control.with_enable(false);
                self.enabled_count -= 1;
            }
        }
    }
}

/// Bytes per second fetched for a window of extent `dst`.
#[must_use]
pub fn bandwidth(dst: Region, format: PixelFormat, refresh_hz: u32) -> u64 {
    let pixels = u64::from(dst.w.unsigned_abs()) * u64::from(dst.h.unsigned_abs());
    pixels * u64::from(format.bytes_per_pixel()) * u64::from(refresh_hz)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::window::BufferHandle;

    #[test]
    fn opaque_copy() {
        let w = ControlWord::encode(0, 255, Blending::None);
        assert_eq!(w.func(), BlendFunc::Copy);
        assert_eq!(w.flags(), ControlFlags::empty());
        assert_eq!((w.alpha0(), w.alpha1()), (0xff, 0xff));
    }

    #[test]
    fn premultiplied_with_pixel_alpha() {
        let w = ControlWord::encode(8, 255, Blending::Premultiplied);
        assert_eq!(w.func(), BlendFunc::SourceOver);
        assert_eq!(w.flags(), ControlFlags::PIXEL_ALPHA);
    }

    #[test]
    fn premultiplied_with_plane_alpha() {
        let w = ControlWord::encode(8, 128, Blending::Premultiplied);
        assert_eq!(w.func(), BlendFunc::PremultipliedPlaneAlpha);
        assert!(
            w.flags()
                .contains(ControlFlags::PIXEL_ALPHA | ControlFlags::PLANE_ALPHA_MUL),
            "pixel alpha scaled by plane alpha"
        );
        assert_eq!((w.alpha0(), w.alpha1()), (128, 0));
    }

    #[test]
    fn one_bit_alpha_degrades_to_coverage() {
        let w = ControlWord::encode(1, 255, Blending::Premultiplied);
        assert_eq!(w.func(), BlendFunc::Coverage);
        assert!(!w.flags().contains(ControlFlags::PIXEL_ALPHA), "1-bit alpha");
    }

    #[test]
    fn alphaless_plane_alpha_degrades_to_coverage() {
        let w = ControlWord::encode(0, 64, Blending::Premultiplied);
        assert_eq!(w.func(), BlendFunc::Coverage);
        assert!(
            !w.flags().contains(ControlFlags::PLANE_ALPHA_MUL),
            "nothing to multiply without pixel alpha"
        );
    }

    #[test]
    fn enable_bit_toggles() {
        let w = ControlWord::encode(8, 255, Blending::Coverage).with_enable(true);
        assert!(w.is_enabled(), "enabled");
        let off = w.with_enable(false);
        assert!(!off.is_enabled(), "disabled");
        assert_eq!(off.func(), w.func());
    }

    #[test]
    fn bandwidth_rounds_bytes_up() {
        assert_eq!(
            bandwidth(Region::new(0, 0, 100, 10), PixelFormat::Rgb565, 60),
            100 * 10 * 2 * 60
        );
        assert_eq!(
            bandwidth(Region::new(0, 0, 100, 10), PixelFormat::Nv12, 60),
            100 * 10 * 4 * 60
        );
    }

    #[test]
    fn build_frame() {
        let panel = Panel::new(1080, 1920, 60);
        let mut video = WindowConfig::buffer(
            1,
            ChannelId(3),
            PixelFormat::Xrgb8888,
            Size::new(64, 64),
            Region::new(0, 0, 64, 64),
            vec![BufferHandle(7)],
        );
        video.protected = true;
        let windows = vec![
            WindowConfig::solid(0, Region::new(0, 0, 1080, 1920), 0xff00_0000),
            video,
            WindowConfig::disabled(2),
        ];
        let blocks = vec![None, Some(Region::new(0, 0, 32, 16)), None];
        let mut frame = RegisterFrame::build(&windows, &blocks, UpdateRegion::Full, &panel);

        assert_eq!(frame.enabled_count, 2);
        assert_eq!(frame.windows[0].color, Some(0xff00_0000));
        assert_eq!(frame.windows[0].channel, None);
        assert_eq!(frame.windows[1].channel, Some(ChannelId(3)));
        assert_eq!(frame.windows[1].block, Some(Region::new(0, 0, 32, 16)));
        assert!(!frame.windows[2].is_enabled(), "slot 2 is off");
        assert_eq!(frame.protection, ChannelMask::from_bits(1 << 3));
        assert_eq!(frame.bandwidth, 64 * 64 * 4 * 60);

        frame.bind_planes(1, &[DeviceAddress(0x1000)]);
        assert_eq!(frame.windows[1].planes[0], Some(DeviceAddress(0x1000)));
        assert_eq!(frame.windows[1].planes[1], None);

        frame.disable(1);
        assert_eq!(frame.enabled_count, 1);
        assert!(!frame.windows[1].is_enabled(), "slot 1 disabled");
    }

    #[test]
    fn identical_input_identical_frame() {
        let panel = Panel::new(1080, 1920, 60);
        let windows = vec![WindowConfig::buffer(
            0,
            ChannelId(0),
            PixelFormat::Argb8888,
            Size::new(1080, 1920),
            Region::new(0, 0, 1080, 1920),
            vec![BufferHandle(1)],
        )];
        let a = RegisterFrame::build(&windows, &[None], UpdateRegion::Full, &panel);
        let b = RegisterFrame::build(&windows, &[None], UpdateRegion::Full, &panel);
        assert_eq!(a, b);
    }
}
