// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Submission validation.
//!
//! [`validate`] checks a whole submission against the hardware's limits and
//! either rejects it with the first [`ValidationError`] found or returns a
//! [`FrameRequest`] with one entry per hardware slot. Nothing is imported or
//! programmed before this succeeds, so a rejected submission has no side
//! effects.

use alloc::vec::Vec;

use crate::caps::HardwareCapabilities;
use crate::geometry::Region;
use crate::window::{Blending, ChannelId, WindowConfig, WindowState};

/// Why a submission was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A window names a slot the hardware does not have.
    #[error("window index {index} out of range (hardware has {max} slots)")]
    IndexOutOfRange {
        /// Requested slot.
        index: usize,
        /// Slot count.
        max: usize,
    },
    /// Two entries name the same slot.
    #[error("window {index} configured twice")]
    DuplicateIndex {
        /// Repeated slot.
        index: usize,
    },
    /// More than one update-region entry.
    #[error("more than one update region in a single submission")]
    MultipleUpdateRegions,
    /// The update region has no area.
    #[error("update region {region:?} is empty")]
    EmptyUpdateRegion {
        /// Requested region.
        region: Region,
    },
    /// The update region ends past the largest register coordinate.
    #[error("update region {region:?} out of range")]
    UpdateRegionOutOfRange {
        /// Requested region.
        region: Region,
    },
    /// Slot 0 has nothing beneath it to blend with.
    #[error("blending {blending:?} not allowed on window 0")]
    BlendingOnBaseWindow {
        /// Requested blending.
        blending: Blending,
    },
    /// Destination is empty, starts above/left of the panel, or ends past
    /// the largest register coordinate.
    #[error("window {index} destination {dst:?} is invalid")]
    InvalidDestination {
        /// Offending slot.
        index: usize,
        /// Requested destination.
        dst: Region,
    },
    /// Left edge or right edge is not on a 32-bit word boundary.
    #[error("window {index} destination x={x} w={w} not aligned to {alignment} pixels")]
    Misaligned {
        /// Offending slot.
        index: usize,
        /// Requested left edge.
        x: i32,
        /// Requested width.
        w: i32,
        /// Required alignment in pixels.
        alignment: i32,
    },
    /// Rows are shorter than the minimum DMA burst.
    #[error("window {index} rows are {bytes} bytes, minimum is {min}")]
    TooNarrow {
        /// Offending slot.
        index: usize,
        /// Bytes per row.
        bytes: u32,
        /// Required minimum.
        min: u32,
    },
    /// Channel does not exist.
    #[error("window {index} uses channel {channel:?}, hardware has {count}")]
    ChannelOutOfRange {
        /// Offending slot.
        index: usize,
        /// Requested channel.
        channel: ChannelId,
        /// Channel count.
        count: u8,
    },
    /// Channel already feeds another enabled window.
    #[error("channel {channel:?} used by windows {first} and {second}")]
    ChannelInUse {
        /// Channel requested twice.
        channel: ChannelId,
        /// Slot that claimed it first.
        first: usize,
        /// Slot that claimed it second.
        second: usize,
    },
    /// Number of buffer handles does not match the format.
    #[error("window {index} has {got} planes, format needs {expected}")]
    PlaneCountMismatch {
        /// Offending slot.
        index: usize,
        /// Handles supplied.
        got: usize,
        /// Handles required.
        expected: usize,
    },
    /// Protected content on a channel that cannot enforce protection.
    #[error("window {index} is protected but channel {channel:?} is not secure")]
    InsecureChannel {
        /// Offending slot.
        index: usize,
        /// Requested channel.
        channel: ChannelId,
    },
    /// Source crop is empty or reaches outside the buffer.
    #[error("window {index} source {src:?} outside buffer")]
    SourceOutOfBounds {
        /// Offending slot.
        index: usize,
        /// Requested crop.
        src: Region,
    },
}

/// A validated submission, laid out by hardware slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRequest {
    /// One entry per slot; slots the submission did not mention are
    /// disabled.
    pub windows: Vec<WindowConfig>,
    /// Panel area the client says changed, if any.
    pub update: Option<Region>,
}

impl FrameRequest {
    /// Number of slots that produce pixels.
    #[must_use]
    pub fn enabled_count(&self) -> usize {
        self.windows.iter().filter(|w| w.is_enabled()).count()
    }
}

/// Checks a submission and lays it out by slot.
pub fn validate(
    configs: &[WindowConfig],
    caps: &HardwareCapabilities,
) -> Result<FrameRequest, ValidationError> {
    let mut windows: Vec<Option<WindowConfig>> = (0..caps.max_windows).map(|_| None).collect();
    let mut update = None;
    let mut channel_owner: Vec<Option<usize>> = alloc::vec![None; usize::from(caps.channel_count)];

    for config in configs {
        if config.state == WindowState::UpdateRegion {
            if update.is_some() {
                return Err(ValidationError::MultipleUpdateRegions);
            }
            if config.dst.is_empty() {
                return Err(ValidationError::EmptyUpdateRegion { region: config.dst });
            }
            if !config.dst.fits_registers() {
                return Err(ValidationError::UpdateRegionOutOfRange { region: config.dst });
            }
            update = Some(config.dst);
            continue;
        }

        let index = config.index;
        let slot = windows
            .get_mut(index)
            .ok_or(ValidationError::IndexOutOfRange {
                index,
                max: caps.max_windows,
            })?;
        if slot.is_some() {
            return Err(ValidationError::DuplicateIndex { index });
        }

        match config.state {
            WindowState::Buffer => {
                check_common(config)?;
                check_buffer(config, caps)?;
                let owner = channel_owner
                    .get_mut(usize::from(config.channel.0))
                    .ok_or(ValidationError::ChannelOutOfRange {
                        index,
                        channel: config.channel,
                        count: caps.channel_count,
                    })?;
                if let Some(first) = *owner {
                    return Err(ValidationError::ChannelInUse {
                        channel: config.channel,
                        first,
                        second: index,
                    });
                }
                *owner = Some(index);
            }
            WindowState::SolidColor(_) => check_common(config)?,
            WindowState::Disabled | WindowState::UpdateRegion => {}
        }

        *slot = Some(config.clone());
    }

    let windows = windows
        .into_iter()
        .enumerate()
        .map(|(i, w)| w.unwrap_or_else(|| WindowConfig::disabled(i)))
        .collect();
    Ok(FrameRequest { windows, update })
}

fn check_common(config: &WindowConfig) -> Result<(), ValidationError> {
    if config.index == 0 && config.blending != Blending::None {
        return Err(ValidationError::BlendingOnBaseWindow {
            blending: config.blending,
        });
    }
    let dst = config.dst;
    if dst.is_empty() || dst.x < 0 || dst.y < 0 || !dst.fits_registers() {
        return Err(ValidationError::InvalidDestination {
            index: config.index,
            dst,
        });
    }
    Ok(())
}

fn check_buffer(config: &WindowConfig, caps: &HardwareCapabilities) -> Result<(), ValidationError> {
    let index = config.index;
    let dst = config.dst;
    let format = config.format;

    let bytes = dst.w.unsigned_abs().saturating_mul(format.bits_per_pixel()) / 8;
    if bytes < caps.min_row_bytes {
        return Err(ValidationError::TooNarrow {
            index,
            bytes,
            min: caps.min_row_bytes,
        });
    }

    let alignment = format.x_alignment();
    if dst.x % alignment != 0 || (dst.x + dst.w) % alignment != 0 {
        return Err(ValidationError::Misaligned {
            index,
            x: dst.x,
            w: dst.w,
            alignment,
        });
    }

    if config.channel.0 >= caps.channel_count {
        return Err(ValidationError::ChannelOutOfRange {
            index,
            channel: config.channel,
            count: caps.channel_count,
        });
    }

    let expected = format.plane_count();
    if config.planes.len() != expected {
        return Err(ValidationError::PlaneCountMismatch {
            index,
            got: config.planes.len(),
            expected,
        });
    }

    if config.protected && !caps.is_secure(config.channel) {
        return Err(ValidationError::InsecureChannel {
            index,
            channel: config.channel,
        });
    }

    let src = config.src;
    let buf = config.buffer_size;
    let inside = match (src.x.checked_add(src.w), src.y.checked_add(src.h)) {
        (Some(right), Some(bottom)) => right <= buf.width && bottom <= buf.height,
        _ => false,
    };
    if src.is_empty() || src.x < 0 || src.y < 0 || !inside {
        return Err(ValidationError::SourceOutOfBounds { index, src });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::format::PixelFormat;
    use crate::geometry::Size;
    use crate::window::BufferHandle;

    fn caps() -> HardwareCapabilities {
        HardwareCapabilities::command_panel()
    }

    fn layer(index: usize, channel: u8, dst: Region) -> WindowConfig {
        WindowConfig::buffer(
            index,
            ChannelId(channel),
            PixelFormat::Argb8888,
            Size::new(dst.w, dst.h),
            dst,
            vec![BufferHandle(index as u64 + 1)],
        )
    }

    #[test]
    fn lays_out_by_slot() {
        let req = validate(
            &[
                layer(2, 1, Region::new(0, 0, 100, 100)),
                layer(0, 0, Region::new(0, 0, 1080, 1920)),
            ],
            &caps(),
        )
        .unwrap();
        assert_eq!(req.windows.len(), caps().max_windows);
        assert_eq!(req.windows[0].state, WindowState::Buffer);
        assert_eq!(req.windows[1].state, WindowState::Disabled);
        assert_eq!(req.windows[2].index, 2);
        assert_eq!(req.enabled_count(), 2);
        assert_eq!(req.update, None);
    }

    #[test]
    fn rejects_blending_on_slot_zero() {
        let mut base = layer(0, 0, Region::new(0, 0, 100, 100));
        base.blending = Blending::Premultiplied;
        assert_eq!(
            validate(&[base], &caps()),
            Err(ValidationError::BlendingOnBaseWindow {
                blending: Blending::Premultiplied
            })
        );
    }

    #[test]
    fn rejects_misaligned_16bit_window() {
        let mut w = layer(1, 1, Region::new(3, 0, 100, 100));
        w.format = PixelFormat::Rgb565;
        assert!(matches!(
            validate(&[w], &caps()),
            Err(ValidationError::Misaligned { x: 3, .. })
        ));

        let mut w = layer(1, 1, Region::new(2, 0, 101, 100));
        w.format = PixelFormat::Rgb565;
        w.buffer_size = Size::new(101, 100);
        assert!(
            matches!(
                validate(&[w], &caps()),
                Err(ValidationError::Misaligned { w: 101, .. })
            ),
            "right edge must be aligned too"
        );
    }

    #[test]
    fn rejects_narrow_rows() {
        let w = layer(1, 1, Region::new(0, 0, 31, 100));
        assert_eq!(
            validate(&[w], &caps()),
            Err(ValidationError::TooNarrow {
                index: 1,
                bytes: 124,
                min: 128
            })
        );
    }

    #[test]
    fn rejects_shared_channel() {
        let a = layer(0, 3, Region::new(0, 0, 100, 100));
        let b = layer(1, 3, Region::new(0, 0, 100, 100));
        assert_eq!(
            validate(&[a, b], &caps()),
            Err(ValidationError::ChannelInUse {
                channel: ChannelId(3),
                first: 0,
                second: 1
            })
        );
    }

    #[test]
    fn disabled_windows_do_not_claim_channels() {
        let a = layer(0, 3, Region::new(0, 0, 100, 100));
        let mut b = layer(1, 3, Region::new(0, 0, 100, 100));
        b.state = WindowState::Disabled;
        assert!(validate(&[a, b], &caps()).is_ok());
    }

    #[test]
    fn rejects_bad_index_and_duplicates() {
        let w = layer(9, 1, Region::new(0, 0, 100, 100));
        assert_eq!(
            validate(&[w], &caps()),
            Err(ValidationError::IndexOutOfRange { index: 9, max: 7 })
        );
        let a = layer(1, 1, Region::new(0, 0, 100, 100));
        let b = layer(1, 2, Region::new(0, 0, 100, 100));
        assert_eq!(
            validate(&[a, b], &caps()),
            Err(ValidationError::DuplicateIndex { index: 1 })
        );
    }

    #[test]
    fn rejects_plane_mismatch_and_insecure_channel() {
        let mut w = layer(1, 1, Region::new(0, 0, 100, 100));
        w.format = PixelFormat::Nv12M;
        assert!(matches!(
            validate(&[w], &caps()),
            Err(ValidationError::PlaneCountMismatch {
                got: 1,
                expected: 2,
                ..
            })
        ));

        let mut w = layer(1, 2, Region::new(0, 0, 100, 100));
        w.protected = true;
        assert!(matches!(
            validate(&[w], &caps()),
            Err(ValidationError::InsecureChannel { .. })
        ));
    }

    #[test]
    fn rejects_source_outside_buffer() {
        let mut w = layer(1, 1, Region::new(0, 0, 100, 100));
        w.src = Region::new(10, 0, 100, 100);
        assert!(matches!(
            validate(&[w], &caps()),
            Err(ValidationError::SourceOutOfBounds { .. })
        ));
    }

    #[test]
    fn single_update_region() {
        let u = WindowConfig::update_region(Region::new(10, 10, 50, 50));
        let req = validate(&[u.clone()], &caps()).unwrap();
        assert_eq!(req.update, Some(Region::new(10, 10, 50, 50)));
        assert_eq!(
            validate(&[u.clone(), u], &caps()),
            Err(ValidationError::MultipleUpdateRegions)
        );
    }

    #[test]
    fn rejects_negative_destination() {
        let w = WindowConfig::solid(1, Region::new(-4, 0, 64, 64), 0xff00_0000);
        assert!(matches!(
            validate(&[w], &caps()),
            Err(ValidationError::InvalidDestination { index: 1, .. })
        ));
    }

    #[test]
    fn huge_coordinates_are_rejected_not_overflowed() {
        let dst = Region::new(i32::MAX - 10, 0, 64, 64);
        let mut w = layer(1, 1, Region::new(0, 0, 64, 64));
        w.dst = dst;
        assert_eq!(
            validate(&[w], &caps()),
            Err(ValidationError::InvalidDestination { index: 1, dst })
        );

        let wide = Region::new(0, 0, i32::MAX, 64);
        let mut w = layer(1, 1, Region::new(0, 0, 64, 64));
        w.dst = wide;
        assert_eq!(
            validate(&[w], &caps()),
            Err(ValidationError::InvalidDestination { index: 1, dst: wide })
        );

        let src = Region::new(i32::MAX - 10, i32::MAX - 10, 64, 64);
        let mut w = layer(1, 1, Region::new(0, 0, 64, 64));
        w.src = src;
        assert_eq!(
            validate(&[w], &caps()),
            Err(ValidationError::SourceOutOfBounds { index: 1, src })
        );

        let region = Region::new(0, i32::MAX - 1, 128, 128);
        assert_eq!(
            validate(&[WindowConfig::update_region(region)], &caps()),
            Err(ValidationError::UpdateRegionOutOfRange { region })
        );
    }
}
