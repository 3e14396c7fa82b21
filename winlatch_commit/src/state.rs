// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Device power state and scheduler bookkeeping shared by the submitting
//! threads and the commit worker.

use winlatch_core::partial::UpdateRegion;
use winlatch_core::protection::{ChannelMask, ProtectionState};

use crate::frame::FrameSeq;

/// Power state of the display controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// Unpowered.
    #[default]
    Off,
    /// Power-on requested; the worker has not brought the device up yet.
    Init,
    /// Powered and scanning out.
    On,
    /// Low-power entry requested.
    LowPowerEntering,
    /// Idle between frames with clocks gated.
    LowPower,
    /// Low-power exit requested.
    LowPowerExiting,
    /// Power-off requested. Frames queued before the request still drain;
    /// new submissions are not queued.
    Disabling,
}

impl DeviceState {
    /// Returns `true` if `to` may follow `self`.
    #[must_use]
    pub const fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Off, Self::Init)
                | (Self::Init, Self::On | Self::Off)
                | (
                    Self::On | Self::LowPower | Self::LowPowerEntering | Self::LowPowerExiting,
                    Self::Disabling
                )
                | (Self::Disabling, Self::Off)
                | (Self::On, Self::LowPowerEntering)
                | (Self::LowPowerEntering, Self::LowPower | Self::On)
                | (Self::LowPower, Self::LowPowerExiting)
                | (Self::LowPowerExiting, Self::On | Self::LowPower)
        )
    }

    /// Returns `true` if submissions are queued for the worker. Frames
    /// submitted in a low-power state wake the device first.
    #[must_use]
    pub const fn accepts_frames(self) -> bool {
        matches!(
            self,
            Self::On | Self::LowPowerEntering | Self::LowPower | Self::LowPowerExiting
        )
    }

    /// Returns `true` while the device is at least partly in low power.
    #[must_use]
    pub const fn is_low_power(self) -> bool {
        matches!(
            self,
            Self::LowPowerEntering | Self::LowPower | Self::LowPowerExiting
        )
    }
}

/// State behind the compositor's lock.
#[derive(Debug)]
pub(crate) struct CompositorState {
    pub(crate) device: DeviceState,
    /// Protection mask the hardware enforces.
    pub(crate) protection: ProtectionState,
    /// Channels that faulted and have not been reset yet.
    pub(crate) errored: ChannelMask,
    /// Region of the most recently queued frame. `None` forces the next
    /// frame to program its region.
    pub(crate) last_update: Option<UpdateRegion>,
    pub(crate) last_seq: FrameSeq,
    pub(crate) active: Option<FrameSeq>,
    pub(crate) queued: usize,
    pub(crate) halted: bool,
    /// Another owner (such as a secure world) drives the display.
    pub(crate) secure_handoff: bool,
}

impl CompositorState {
    pub(crate) const fn new() -> Self {
        Self {
            device: DeviceState::Off,
            protection: ProtectionState::new(),
            errored: ChannelMask::EMPTY,
            last_update: None,
            last_seq: FrameSeq(0),
            active: None,
            queued: 0,
            halted: false,
            secure_handoff: false,
        }
    }

    pub(crate) fn snapshot(&self) -> CompositorSnapshot {
        CompositorSnapshot {
            device: self.device,
            protection: self.protection.current(),
            errored: self.errored,
            last_update: self.last_update,
            last_seq: self.last_seq,
            active: self.active,
            queued: self.queued,
            halted: self.halted,
            secure_handoff: self.secure_handoff,
        }
    }
}

/// Point-in-time copy of the scheduler state, for diagnostics and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositorSnapshot {
    /// Power state.
    pub device: DeviceState,
    /// Channels the hardware currently protects.
    pub protection: ChannelMask,
    /// Channels that faulted and await a reset.
    pub errored: ChannelMask,
    /// Update region of the most recently queued frame.
    pub last_update: Option<UpdateRegion>,
    /// Sequence number of the most recently queued frame.
    pub last_seq: FrameSeq,
    /// Sequence number of the frame on screen.
    pub active: Option<FrameSeq>,
    /// Frames queued or being programmed.
    pub queued: usize,
    /// The worker stopped after a fatal error.
    pub halted: bool,
    /// Submissions are short-circuited while another owner drives the
    /// display.
    pub secure_handoff: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_cycle() {
        use DeviceState::*;
        let path = [
            Off,
            Init,
            On,
            LowPowerEntering,
            LowPower,
            LowPowerExiting,
            On,
            Disabling,
            Off,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn rejected_transitions() {
        use DeviceState::*;
        assert!(!Off.can_transition(On), "must pass through init");
        assert!(!Off.can_transition(LowPower), "not powered");
        assert!(!On.can_transition(LowPower), "must request entry");
        assert!(!LowPower.can_transition(On), "must request exit");
        assert!(!On.can_transition(Off), "must drain first");
        assert!(!Disabling.can_transition(Init), "power-off in progress");
        assert!(!Off.can_transition(Disabling), "already off");
    }

    #[test]
    fn frames_accepted_when_powered() {
        assert!(DeviceState::On.accepts_frames(), "on");
        assert!(DeviceState::LowPower.accepts_frames(), "woken by frame");
        assert!(!DeviceState::Off.accepts_frames(), "off");
        assert!(!DeviceState::Init.accepts_frames(), "still starting");
        assert!(!DeviceState::Disabling.accepts_frames(), "shutting down");
    }

    #[test]
    fn fresh_state_snapshot() {
        let snap = CompositorState::new().snapshot();
        assert_eq!(snap.device, DeviceState::Off);
        assert_eq!(snap.active, None);
        assert_eq!(snap.last_seq, FrameSeq(0));
        assert!(!snap.halted, "running");
    }
}
