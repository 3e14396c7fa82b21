// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel formats understood by the window blender.

/// Memory layout of a window's source buffer.
///
/// Channel order is written most-significant byte first, so `Argb8888`
/// stores alpha in the top byte of each 32-bit word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 32-bit, alpha in the top byte.
    Argb8888,
    /// 32-bit, alpha in the top byte, blue/red swapped.
    Abgr8888,
    /// 32-bit, alpha in the bottom byte.
    Rgba8888,
    /// 32-bit, alpha in the bottom byte, blue/red swapped.
    Bgra8888,
    /// 32-bit, top byte ignored.
    Xrgb8888,
    /// 32-bit, top byte ignored, blue/red swapped.
    Xbgr8888,
    /// 32-bit, bottom byte ignored.
    Rgbx8888,
    /// 32-bit, bottom byte ignored, blue/red swapped.
    Bgrx8888,
    /// 16-bit with a single alpha bit.
    Rgba5551,
    /// 16-bit, no alpha.
    Rgb565,
    /// 4:2:0 luma plane followed by interleaved CbCr, one buffer.
    Nv12,
    /// 4:2:0 luma plane followed by interleaved CrCb, one buffer.
    Nv21,
    /// 4:2:0 luma and interleaved CbCr in separate buffers.
    Nv12M,
    /// 4:2:0 luma and interleaved CrCb in separate buffers.
    Nv21M,
    /// 4:2:0 three-plane Y, Cb, Cr, one buffer.
    Yuv420,
    /// 4:2:0 three-plane Y, Cr, Cb, one buffer.
    Yvu420,
    /// 4:2:0 three-plane Y, Cb, Cr, separate buffers.
    Yuv420M,
    /// 4:2:0 three-plane Y, Cr, Cb, separate buffers.
    Yvu420M,
}

impl PixelFormat {
    /// Number of separately imported buffers this format needs.
    #[must_use]
    pub const fn plane_count(self) -> usize {
        match self {
            Self::Nv12M | Self::Nv21M => 2,
            Self::Yuv420M | Self::Yvu420M => 3,
            _ => 1,
        }
    }

    /// Bits per pixel as seen by the blender.
    ///
    /// YUV sources are converted by the DMA channel before blending, so they
    /// report 32.
    #[must_use]
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Rgba5551 | Self::Rgb565 => 16,
            _ => 32,
        }
    }

    /// Number of per-pixel alpha bits.
    #[must_use]
    pub const fn alpha_bits(self) -> u32 {
        match self {
            Self::Argb8888 | Self::Abgr8888 | Self::Rgba8888 | Self::Bgra8888 => 8,
            Self::Rgba5551 => 1,
            _ => 0,
        }
    }

    /// Returns `true` if every pixel is fully opaque regardless of content.
    #[must_use]
    pub const fn is_opaque(self) -> bool {
        self.alpha_bits() == 0
    }

    /// Returns `true` for the 32-bit RGB family.
    #[must_use]
    pub const fn is_rgb32(self) -> bool {
        matches!(
            self,
            Self::Argb8888
                | Self::Abgr8888
                | Self::Rgba8888
                | Self::Bgra8888
                | Self::Xrgb8888
                | Self::Xbgr8888
                | Self::Rgbx8888
                | Self::Bgrx8888
        )
    }

    /// Returns `true` for the YUV 4:2:0 family.
    #[must_use]
    pub const fn is_yuv(self) -> bool {
        matches!(
            self,
            Self::Nv12
                | Self::Nv21
                | Self::Nv12M
                | Self::Nv21M
                | Self::Yuv420
                | Self::Yvu420
                | Self::Yuv420M
                | Self::Yvu420M
        )
    }

    /// Horizontal alignment, in pixels, that a window's left edge and width
    /// must honor so that each row starts on a 32-bit word.
    #[must_use]
    pub const fn x_alignment(self) -> i32 {
        (32 / self.bits_per_pixel()) as i32
    }

    /// Bytes fetched per pixel, rounded up.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u32 {
        self.bits_per_pixel().div_ceil(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_counts() {
        assert_eq!(PixelFormat::Argb8888.plane_count(), 1);
        assert_eq!(PixelFormat::Nv12.plane_count(), 1);
        assert_eq!(PixelFormat::Nv21M.plane_count(), 2);
        assert_eq!(PixelFormat::Yvu420M.plane_count(), 3);
    }

    #[test]
    fn alignment_follows_depth() {
        assert_eq!(PixelFormat::Xrgb8888.x_alignment(), 1);
        assert_eq!(PixelFormat::Rgb565.x_alignment(), 2);
        assert_eq!(PixelFormat::Nv12.x_alignment(), 1);
    }

    #[test]
    fn opacity() {
        assert!(PixelFormat::Xbgr8888.is_opaque(), "X formats ignore alpha");
        assert!(PixelFormat::Rgb565.is_opaque(), "565 has no alpha");
        assert!(!PixelFormat::Rgba5551.is_opaque(), "5551 has one alpha bit");
        assert!(PixelFormat::Rgba8888.is_rgb32(), "8888 is rgb32");
        assert!(!PixelFormat::Nv12.is_rgb32(), "yuv is not rgb32");
        assert!(PixelFormat::Yuv420M.is_yuv(), "yuv family");
    }
}
