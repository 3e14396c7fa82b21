// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frames in flight.

use winlatch_core::regs::RegisterFrame;

use crate::buffer::FrameBindings;
use crate::fence::Fence;

/// Submission order of a frame. Starts at 1 and increases by one per
/// queued frame.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameSeq(pub u64);

impl core::fmt::Debug for FrameSeq {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FrameSeq({})", self.0)
    }
}

impl FrameSeq {
    /// The sequence number after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Where a frame is in its lifecycle.
///
/// Frames move strictly forward: `Queued` → `Programming` → `Active` →
/// `Retiring` → `Freed`. A frame becomes `Retiring` when its successor
/// becomes `Active`, and `Freed` once its buffers are released.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameStage {
    /// Accepted by `submit` and waiting for the worker.
    Queued,
    /// The worker is writing its registers.
    Programming,
    /// Latched and being scanned out.
    Active,
    /// Replaced on screen; buffers about to be released.
    Retiring,
    /// Buffers released.
    Freed,
}

impl FrameStage {
    /// Short lowercase name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Programming => "programming",
            Self::Active => "active",
            Self::Retiring => "retiring",
            Self::Freed => "freed",
        }
    }
}

/// A frame handed from `submit` to the worker.
#[derive(Debug)]
pub struct QueuedFrame {
    /// Submission order.
    pub seq: FrameSeq,
    /// Registers to program, with plane addresses bound.
    pub regs: RegisterFrame,
    /// Buffers the registers point at.
    pub bindings: FrameBindings,
    /// Signaled once the frame is active.
    pub release: Fence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_advances() {
        assert_eq!(FrameSeq(1).next(), FrameSeq(2));
        assert!(FrameSeq(2) > FrameSeq(1), "ordered");
    }

    #[test]
    fn stages_are_ordered() {
        assert!(FrameStage::Queued < FrameStage::Programming, "forward");
        assert!(FrameStage::Active < FrameStage::Retiring, "forward");
        assert_eq!(FrameStage::Retiring.name(), "retiring");
    }
}
