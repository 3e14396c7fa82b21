// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffer and fence import.
//!
//! Every buffer plane the hardware reads is held by a [`BufferBinding`]. A
//! binding releases its mapping when dropped, so a frame's buffers stay
//! mapped exactly as long as the frame's [`FrameBindings`] lives, and a
//! failed import unwinds whatever the submission had already imported.

use std::sync::Arc;

use winlatch_core::regs::DeviceAddress;
use winlatch_core::window::{BufferHandle, ChannelId, FenceHandle, WindowConfig, WindowState};

use crate::error::{BufferImportError, CommitError};
use crate::fence::Fence;

/// A buffer plane mapped into the display device's address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MappedPlane {
    /// Producer handle the mapping came from.
    pub handle: BufferHandle,
    /// Address the channel fetches from.
    pub address: DeviceAddress,
    /// Mapped length in bytes.
    pub size: u64,
}

/// Resolves producer handles into device mappings and fences.
///
/// Implementations are shared between the submitting thread, which imports,
/// and the commit worker, which releases.
pub trait BufferImporter: Send + Sync {
    /// Maps one plane for fetching through `channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown or cannot be mapped.
    fn import(
        &self,
        handle: BufferHandle,
        channel: ChannelId,
    ) -> Result<MappedPlane, BufferImportError>;

    /// Undoes one successful [`import`](Self::import).
    fn release(&self, plane: &MappedPlane);

    /// Resolves a producer's acquire fence.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown.
    fn import_fence(&self, handle: FenceHandle) -> Result<Fence, BufferImportError>;
}

/// A mapped plane, released when dropped.
pub struct BufferBinding {
    plane: MappedPlane,
    importer: Arc<dyn BufferImporter>,
}

impl core::fmt::Debug for BufferBinding {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("BufferBinding").field(&self.plane).finish()
    }
}

impl BufferBinding {
    /// Imports `handle` and wraps the mapping.
    ///
    /// # Errors
    ///
    /// Propagates the importer's error.
    pub fn import(
        importer: &Arc<dyn BufferImporter>,
        handle: BufferHandle,
        channel: ChannelId,
    ) -> Result<Self, BufferImportError> {
        let plane = importer.import(handle, channel)?;
        Ok(Self {
            plane,
            importer: Arc::clone(importer),
        })
    }

    /// The mapping.
    #[must_use]
    pub fn plane(&self) -> &MappedPlane {
        &self.plane
    }
}

impl Drop for BufferBinding {
    fn drop(&mut self) {
        self.importer.release(&self.plane);
    }
}

/// Everything imported for one slot.
#[derive(Debug)]
pub struct WindowBindings {
    /// Slot the bindings belong to.
    pub slot: usize,
    /// One binding per plane, in plane order.
    pub planes: Vec<BufferBinding>,
    /// Fence to wait on before the slot may be fetched.
    pub acquire: Option<Fence>,
}

impl WindowBindings {
    /// Device addresses of the planes, in plane order.
    #[must_use]
    pub fn addresses(&self) -> Vec<DeviceAddress> {
        self.planes.iter().map(|b| b.plane().address).collect()
    }
}

/// Everything imported for one frame.
#[derive(Debug, Default)]
pub struct FrameBindings {
    /// Bindings of every buffer-backed slot, in slot order.
    pub windows: Vec<WindowBindings>,
}

impl FrameBindings {
    /// Number of mapped planes.
    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.windows.iter().map(|w| w.planes.len()).sum()
    }

    /// Acquire fences of the frame, with their slots.
    pub fn acquire_fences(&self) -> impl Iterator<Item = (usize, &Fence)> {
        self.windows
            .iter()
            .filter_map(|w| w.acquire.as_ref().map(|f| (w.slot, f)))
    }

    /// Releases the bindings of one slot ahead of the rest of the frame.
    pub fn release_slot(&mut self, slot: usize) {
        self.windows.retain(|w| w.slot != slot);
    }
}

/// Imports every plane and acquire fence of the buffer-backed windows.
///
/// On failure nothing stays imported: bindings made so far are dropped,
/// which releases them.
///
/// # Errors
///
/// Returns [`CommitError::BufferImport`] naming the first slot that failed.
pub fn import_frame(
    importer: &Arc<dyn BufferImporter>,
    windows: &[WindowConfig],
) -> Result<FrameBindings, CommitError> {
    let mut frame = FrameBindings::default();
    for (slot, window) in windows.iter().enumerate() {
        if window.state != WindowState::Buffer {
            continue;
        }
        let fail = |source| CommitError::BufferImport { slot, source };

        let mut planes = Vec::with_capacity(window.planes.len());
        for &handle in &window.planes {
            planes.push(BufferBinding::import(importer, handle, window.channel).map_err(fail)?);
        }
        let acquire = window
            .acquire_fence
            .map(|h| importer.import_fence(h))
            .transpose()
            .map_err(fail)?;

        frame.windows.push(WindowBindings {
            slot,
            planes,
            acquire,
        });
    }
    Ok(frame)
}
