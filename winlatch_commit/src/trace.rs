// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structured trace events from the commit pipeline.
//!
//! [`TraceSink`] has one method per event kind, all defaulting to no-ops.
//! The compositor owns one boxed sink (see
//! [`Compositor::set_trace_sink`](crate::Compositor::set_trace_sink)) and
//! dispatches to it through a [`Tracer`]. With the `trace` feature off every
//! `Tracer` method compiles to nothing.
//!
//! Timestamps are offsets from the moment the compositor was created.
//!
//! # Crate features
//!
//! - `trace` enables the `Tracer` method bodies.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use winlatch_core::partial::UpdateRegion;
use winlatch_core::protection::ChannelMask;
use winlatch_core::window::ChannelId;

use crate::error::WaitKind;
use crate::frame::{FrameSeq, FrameStage};
use crate::state::DeviceState;

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when `submit` hands a frame to the worker.
#[derive(Clone, Copy, Debug)]
pub struct FrameQueuedEvent {
    /// Frame.
    pub seq: FrameSeq,
    /// Enabled slots after resolution.
    pub enabled: usize,
    /// Refreshed area.
    pub update: UpdateRegion,
    /// Estimated fetch bandwidth in bytes per second.
    pub bandwidth: u64,
    /// Time of queuing.
    pub at: Duration,
}

/// Emitted when a frame changes lifecycle stage.
#[derive(Clone, Copy, Debug)]
pub struct StageEvent {
    /// Frame.
    pub seq: FrameSeq,
    /// Stage entered.
    pub stage: FrameStage,
    /// Time of the transition.
    pub at: Duration,
}

/// Emitted when a non-fatal wait expires.
#[derive(Clone, Copy, Debug)]
pub struct WaitTimeoutEvent {
    /// Frame being programmed.
    pub seq: FrameSeq,
    /// What was waited on.
    pub wait: WaitKind,
    /// Time of expiry.
    pub at: Duration,
}

/// Emitted when a slot is disabled because its channel faulted.
#[derive(Clone, Copy, Debug)]
pub struct WindowFaultEvent {
    /// Frame being programmed.
    pub seq: FrameSeq,
    /// Disabled slot.
    pub slot: usize,
    /// Faulted channel.
    pub channel: ChannelId,
    /// Time of the fault.
    pub at: Duration,
}

/// Emitted after channel protection was switched.
#[derive(Clone, Copy, Debug)]
pub struct ProtectionEvent {
    /// Frame being programmed.
    pub seq: FrameSeq,
    /// Channels switched.
    pub changed: ChannelMask,
    /// Mask now enforced.
    pub target: ChannelMask,
    /// Time of the switch.
    pub at: Duration,
}

/// Emitted after the panel update region was reprogrammed.
#[derive(Clone, Copy, Debug)]
pub struct UpdateRegionEvent {
    /// Frame being programmed.
    pub seq: FrameSeq,
    /// New region.
    pub update: UpdateRegion,
    /// Time of the write.
    pub at: Duration,
}

/// Emitted when the shadow registers failed to latch.
#[derive(Clone, Copy, Debug)]
pub struct FatalEvent {
    /// Frame whose registers did not latch.
    pub seq: FrameSeq,
    /// Expired wait.
    pub wait: WaitKind,
    /// Time of expiry.
    pub at: Duration,
}

/// Emitted when the device reaches a new power state.
#[derive(Clone, Copy, Debug)]
pub struct PowerEvent {
    /// State reached.
    pub state: DeviceState,
    /// Time of the transition.
    pub at: Duration,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the commit pipeline.
///
/// All methods have default no-op implementations.
pub trait TraceSink {
    /// Called when a frame is queued.
    fn on_frame_queued(&mut self, e: &FrameQueuedEvent) {
        _ = e;
    }

    /// Called when a frame changes stage.
    fn on_stage(&mut self, e: &StageEvent) {
        _ = e;
    }

    /// Called when a non-fatal wait expires.
    fn on_wait_timeout(&mut self, e: &WaitTimeoutEvent) {
        _ = e;
    }

    /// Called when a slot is disabled after a channel fault.
    fn on_window_fault(&mut self, e: &WindowFaultEvent) {
        _ = e;
    }

    /// Called after a protection switch.
    fn on_protection(&mut self, e: &ProtectionEvent) {
        _ = e;
    }

    /// Called after the update region is reprogrammed.
    fn on_update_region(&mut self, e: &UpdateRegionEvent) {
        _ = e;
    }

    /// Called on a fatal shadow-update timeout.
    fn on_fatal(&mut self, e: &FatalEvent) {
        _ = e;
    }

    /// Called on a power state change.
    fn on_power(&mut self, e: &PowerEvent) {
        _ = e;
    }
}

/// Shares one sink between the compositor and whoever inspects it.
impl<S: TraceSink + ?Sized> TraceSink for Arc<Mutex<S>> {
    fn on_frame_queued(&mut self, e: &FrameQueuedEvent) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_frame_queued(e);
    }

    fn on_stage(&mut self, e: &StageEvent) {
        self.lock().unwrap_or_else(PoisonError::into_inner).on_stage(e);
    }

    fn on_wait_timeout(&mut self, e: &WaitTimeoutEvent) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_wait_timeout(e);
    }

    fn on_window_fault(&mut self, e: &WindowFaultEvent) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_window_fault(e);
    }

    fn on_protection(&mut self, e: &ProtectionEvent) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_protection(e);
    }

    fn on_update_region(&mut self, e: &UpdateRegionEvent) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_update_region(e);
    }

    fn on_fatal(&mut self, e: &FatalEvent) {
        self.lock().unwrap_or_else(PoisonError::into_inner).on_fatal(e);
    }

    fn on_power(&mut self, e: &PowerEvent) {
        self.lock().unwrap_or_else(PoisonError::into_inner).on_power(e);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

/// Generates one forwarding method per event.
macro_rules! tracer_methods {
    ($($(#[$doc:meta])* $name:ident => $sink_fn:ident($ty:ty);)*) => {
        $(
            $(#[$doc])*
            #[inline]
            pub fn $name(&mut self, e: &$ty) {
                #[cfg(feature = "trace")]
                if let Some(s) = &mut self.sink {
                    s.$sink_fn(e);
                }
                #[cfg(not(feature = "trace"))]
                {
                    _ = e;
                }
            }
        )*
    };
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    tracer_methods! {
        /// Emits a [`FrameQueuedEvent`].
        frame_queued => on_frame_queued(FrameQueuedEvent);
        /// Emits a [`StageEvent`].
        stage => on_stage(StageEvent);
        /// Emits a [`WaitTimeoutEvent`].
        wait_timeout => on_wait_timeout(WaitTimeoutEvent);
        /// Emits a [`WindowFaultEvent`].
        window_fault => on_window_fault(WindowFaultEvent);
        /// Emits a [`ProtectionEvent`].
        protection => on_protection(ProtectionEvent);
        /// Emits an [`UpdateRegionEvent`].
        update_region => on_update_region(UpdateRegionEvent);
        /// Emits a [`FatalEvent`].
        fatal => on_fatal(FatalEvent);
        /// Emits a [`PowerEvent`].
        power => on_power(PowerEvent);
    }
}
