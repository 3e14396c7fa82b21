// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hardware capabilities and panel description.
//!
//! Both are fixed when a compositor is created. Presets cover the panel
//! classes the pipeline is commonly paired with; individual fields can be
//! overridden with struct update syntax.

use crate::geometry::Size;
use crate::window::ChannelId;

/// What the display controller can do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HardwareCapabilities {
    /// Number of blender slots.
    pub max_windows: usize,
    /// Number of DMA channels.
    pub channel_count: u8,
    /// Channels allowed to carry protected content, one bit per channel.
    pub secure_channels: u32,
    /// Whether per-window blocking rectangles are supported.
    pub blocking: bool,
    /// Whether the panel accepts partial updates.
    pub partial_update: bool,
    /// Smallest blocking rectangle worth programming.
    pub min_blocking: Size,
    /// A declared transparent area must cover at least this percentage of
    /// the panel before it is used for blocking.
    pub transparent_blocking_percent: u32,
    /// Minimum number of bytes fetched per window row.
    pub min_row_bytes: u32,
    /// Horizontal alignment of partial-update rectangles.
    pub update_alignment: i32,
    /// Row granularity of a segmented (compressed) output stream; partial
    /// updates on such panels always span full rows.
    pub segment_rows: Option<i32>,
    /// Smallest window slice a single-plane channel can scale from.
    pub min_scaler_input: Size,
    /// Smallest window slice a multi-plane channel can scale from.
    pub min_scaler_input_multiplane: Size,
}

impl HardwareCapabilities {
    /// Command-mode panel with blocking and partial updates.
    #[must_use]
    pub const fn command_panel() -> Self {
        Self {
            max_windows: 7,
            channel_count: 7,
            secure_channels: 0b111_1011,
            blocking: true,
            partial_update: true,
            min_blocking: Size::new(32, 16),
            transparent_blocking_percent: 15,
            min_row_bytes: 128,
            update_alignment: 8,
            segment_rows: None,
            min_scaler_input: Size::new(32, 16),
            min_scaler_input_multiplane: Size::new(64, 32),
        }
    }

    /// Command-mode panel fed a compressed, row-segmented stream.
    #[must_use]
    pub const fn compressed_command_panel() -> Self {
        Self {
            segment_rows: Some(64),
            ..Self::command_panel()
        }
    }

    /// Video-mode panel. Refreshes continuously, so partial updates do not
    /// apply.
    #[must_use]
    pub const fn video_panel() -> Self {
        Self {
            partial_update: false,
            ..Self::command_panel()
        }
    }

    /// Returns `true` if `channel` may carry protected content.
    #[must_use]
    pub const fn is_secure(&self, channel: ChannelId) -> bool {
        self.secure_channels & channel.bit() != 0
    }
}

impl Default for HardwareCapabilities {
    fn default() -> Self {
        Self::command_panel()
    }
}

/// The attached panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Panel {
    /// Active columns.
    pub width: i32,
    /// Active rows.
    pub height: i32,
    /// Frames per second.
    pub refresh_hz: u32,
}

impl Panel {
    /// Creates a panel description.
    #[must_use]
    pub const fn new(width: i32, height: i32, refresh_hz: u32) -> Self {
        Self {
            width,
            height,
            refresh_hz,
        }
    }

    /// Panel extent.
    #[must_use]
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Number of pixels on the panel.
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_where_expected() {
        let cmd = HardwareCapabilities::command_panel();
        assert!(cmd.partial_update, "command panels take partial updates");
        assert_eq!(cmd.segment_rows, None);
        assert_eq!(
            HardwareCapabilities::compressed_command_panel().segment_rows,
            Some(64)
        );
        assert!(
            !HardwareCapabilities::video_panel().partial_update,
            "video panels refresh whole frames"
        );
    }

    #[test]
    fn secure_mask() {
        let caps = HardwareCapabilities::command_panel();
        assert!(caps.is_secure(ChannelId(0)), "channel 0 is secure");
        assert!(!caps.is_secure(ChannelId(2)), "channel 2 is not secure");
        assert!(caps.is_secure(ChannelId(3)), "channel 3 is secure");
        assert!(!caps.is_secure(ChannelId(200)), "no such channel");
    }
}
