// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for the commit pipeline.

use std::time::Duration;

use winlatch_core::validate::ValidationError;
use winlatch_core::window::{BufferHandle, ChannelId, FenceHandle};

use crate::state::DeviceState;

/// Something the commit worker waits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WaitKind {
    /// A producer's acquire fence.
    AcquireFence,
    /// The next vertical sync.
    Vsync,
    /// Written registers latching into the active set.
    ShadowUpdate,
    /// The scanout line counter returning to zero.
    LineCount,
    /// A DMA channel finishing its fetch.
    ChannelIdle,
}

impl WaitKind {
    /// Short lowercase name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AcquireFence => "acquire fence",
            Self::Vsync => "vsync",
            Self::ShadowUpdate => "shadow update",
            Self::LineCount => "line count",
            Self::ChannelIdle => "channel idle",
        }
    }
}

/// Failure reported by a [`DisplayHardware`](crate::hardware::DisplayHardware)
/// implementation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HardwareError {
    /// A bounded wait expired.
    #[error("timed out after {timeout:?} waiting for {}", wait.name())]
    Timeout {
        /// What was waited on.
        wait: WaitKind,
        /// How long.
        timeout: Duration,
    },
    /// A DMA channel rejected its configuration.
    #[error("channel {channel:?} rejected configuration: {reason}")]
    ChannelConfig {
        /// Failing channel.
        channel: ChannelId,
        /// Backend-specific detail.
        reason: String,
    },
    /// Any other device failure.
    #[error("display device error: {0}")]
    Device(String),
}

/// Failure to bind a producer buffer or fence.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BufferImportError {
    /// The handle does not name a live buffer.
    #[error("invalid buffer handle {0:?}")]
    InvalidHandle(BufferHandle),
    /// The buffer exists but could not be mapped for the device.
    #[error("failed to map {handle:?}: {reason}")]
    MapFailed {
        /// Buffer that failed.
        handle: BufferHandle,
        /// Backend-specific detail.
        reason: String,
    },
    /// The acquire fence handle does not name a live fence.
    #[error("invalid acquire fence {0:?}")]
    InvalidFence(FenceHandle),
}

/// Errors returned by [`Compositor`](crate::Compositor) operations.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    /// The submission was rejected before anything was imported.
    #[error("invalid submission: {0}")]
    Validation(#[from] ValidationError),
    /// A buffer or fence of one window could not be imported. Everything
    /// already imported for the submission has been released.
    #[error("window {slot}: {source}")]
    BufferImport {
        /// Slot whose import failed.
        slot: usize,
        /// Underlying failure.
        #[source]
        source: BufferImportError,
    },
    /// The requested power transition is not allowed from the current
    /// state.
    #[error("cannot go from {from:?} to {to:?}")]
    InvalidTransition {
        /// Current state.
        from: DeviceState,
        /// Requested state.
        to: DeviceState,
    },
    /// A power transition failed in the backend.
    #[error("power transition failed: {0}")]
    Hardware(#[from] HardwareError),
    /// The worker stopped after a fatal hardware timeout.
    #[error("commit worker halted after a fatal hardware error")]
    Halted,
    /// The worker thread could not be started.
    #[error("failed to spawn commit worker: {0}")]
    Spawn(#[from] std::io::Error),
    /// The worker thread is gone.
    #[error("commit worker is not running")]
    WorkerGone,
}
