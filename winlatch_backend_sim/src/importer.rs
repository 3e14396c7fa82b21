// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A buffer importer that tracks every live mapping.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use winlatch_commit::fence::Fence;
use winlatch_commit::{BufferImportError, BufferImporter, MappedPlane};
use winlatch_core::regs::DeviceAddress;
use winlatch_core::window::{BufferHandle, ChannelId, FenceHandle};

use crate::log::{EventLog, SimEvent};

const PLANE_SIZE: u64 = 0x10_0000;
const ADDRESS_BASE: u64 = 0x8000_0000;

#[derive(Debug, Default)]
struct Mappings {
    /// Map count per handle.
    live: HashMap<BufferHandle, usize>,
    failing: HashSet<BufferHandle>,
    fences: HashMap<FenceHandle, Fence>,
    imports: u64,
    releases: u64,
    /// Set when a handle was released more often than imported.
    over_released: Option<BufferHandle>,
}

/// Simulated buffer importer.
///
/// Any handle imports successfully unless marked failing. Device addresses
/// are derived from the handle, so equal handles map to equal addresses.
/// Acquire fences must be registered with [`fence`](Self::fence) first.
#[derive(Debug)]
pub struct SimImporter {
    state: Mutex<Mappings>,
    log: EventLog,
}

impl SimImporter {
    /// Creates an importer logging to `log`.
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self {
            state: Mutex::new(Mappings::default()),
            log,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Mappings> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes imports of `handle` fail.
    pub fn fail_handle(&self, handle: BufferHandle) {
        self.lock().failing.insert(handle);
    }

    /// Registers (or returns the already registered) fence for `handle`.
    /// Signal the returned fence to release waiters.
    pub fn fence(&self, handle: FenceHandle) -> Fence {
        self.lock().fences.entry(handle).or_default().clone()
    }

    /// Number of outstanding mappings across all handles.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.lock().live.values().sum()
    }

    /// Whether `handle` has at least one outstanding mapping.
    #[must_use]
    pub fn is_live(&self, handle: BufferHandle) -> bool {
        self.lock().live.contains_key(&handle)
    }

    /// Total successful imports.
    #[must_use]
    pub fn imports(&self) -> u64 {
        self.lock().imports
    }

    /// Total releases.
    #[must_use]
    pub fn releases(&self) -> u64 {
        self.lock().releases
    }

    /// First handle released more often than it was imported, if any.
    #[must_use]
    pub fn over_released(&self) -> Option<BufferHandle> {
        self.lock().over_released
    }
}

impl BufferImporter for SimImporter {
    fn import(
        &self,
        handle: BufferHandle,
        channel: ChannelId,
    ) -> Result<MappedPlane, BufferImportError> {
        let mut state = self.lock();
        if state.failing.contains(&handle) {
            return Err(BufferImportError::InvalidHandle(handle));
        }
        *state.live.entry(handle).or_default() += 1;
        state.imports += 1;
        drop(state);

        tracing::trace!(?handle, ?channel, "sim import");
        self.log.push(SimEvent::Import(handle));
        Ok(MappedPlane {
            handle,
            address: DeviceAddress(ADDRESS_BASE + handle.0 * PLANE_SIZE),
            size: PLANE_SIZE,
        })
    }

    fn release(&self, plane: &MappedPlane) {
        let mut state = self.lock();
        state.releases += 1;
        match state.live.get(&plane.handle).copied() {
            Some(count) if count > 1 => {
                state.live.insert(plane.handle, count - 1);
            }
            Some(_) => {
                state.live.remove(&plane.handle);
            }
            None => {
                state.over_released.get_or_insert(plane.handle);
            }
        }
        drop(state);
        self.log.push(SimEvent::Release(plane.handle));
    }

    fn import_fence(&self, handle: FenceHandle) -> Result<Fence, BufferImportError> {
        self.lock()
            .fences
            .get(&handle)
            .cloned()
            .ok_or(BufferImportError::InvalidFence(handle))
    }
}
