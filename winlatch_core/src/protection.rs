// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-channel content protection.
//!
//! Protection is switched per DMA channel, and a channel may only change
//! mode once it has stopped fetching. [`ProtectionState`] remembers what
//! the hardware currently enforces and turns each frame's wanted mask into
//! a [`ProtectionChange`] listing only the channels that must be switched.

use crate::window::ChannelId;

/// A set of DMA channels, one bit per channel.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ChannelMask(u32);

impl core::fmt::Debug for ChannelMask {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ChannelMask({:#09b})", self.0)
    }
}

impl ChannelMask {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Creates a mask from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if no channel is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if `channel` is set.
    #[must_use]
    pub const fn contains(self, channel: ChannelId) -> bool {
        self.0 & channel.bit() != 0
    }

    /// Adds `channel`.
    pub fn insert(&mut self, channel: ChannelId) {
        self.0 |= channel.bit();
    }

    /// Removes `channel`.
    pub fn remove(&mut self, channel: ChannelId) {
        self.0 &= !channel.bit();
    }

    /// Channels set in exactly one of the two masks.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 ^ other.0)
    }

    /// Channels set in both masks.
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Channels set in either mask.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Iterates over the set channels in ascending order.
    pub fn iter(self) -> impl Iterator<Item = ChannelId> {
        (0..32_u8)
            .map(ChannelId)
            .filter(move |c| self.contains(*c))
    }
}

/// Channels to switch before a frame's registers latch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProtectionChange {
    /// Channels whose mode differs from what the hardware enforces.
    pub changed: ChannelMask,
    /// Mask the hardware enforces once the change is applied.
    pub target: ChannelMask,
}

impl ProtectionChange {
    /// Returns `true` if nothing has to be switched.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Whether `channel` ends up protected.
    #[must_use]
    pub const fn enables(&self, channel: ChannelId) -> bool {
        self.target.contains(channel)
    }
}

/// Protection mask currently enforced by the hardware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProtectionState {
    current: ChannelMask,
}

impl ProtectionState {
    /// Hardware with no protected channels.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: ChannelMask::EMPTY,
        }
    }

    /// Currently enforced mask.
    #[must_use]
    pub const fn current(&self) -> ChannelMask {
        self.current
    }

    /// Computes the switches needed to reach `wanted`.
    ///
    /// `force` lists channels to switch even when their bit is unchanged,
    /// such as channels that were reset after a fault.
    #[must_use]
    pub const fn plan(&self, wanted: ChannelMask, force: ChannelMask) -> ProtectionChange {
        ProtectionChange {
            changed: self.current.difference(wanted).union(force),
            target: wanted,
        }
    }

    /// Records that `change` has been applied.
    pub fn commit(&mut self, change: &ProtectionChange) {
        self.current = change.target;
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn mask_ops() {
        let mut m = ChannelMask::EMPTY;
        m.insert(ChannelId(1));
        m.insert(ChannelId(4));
        assert!(m.contains(ChannelId(4)), "inserted");
        assert_eq!(m.iter().collect::<Vec<_>>(), [ChannelId(1), ChannelId(4)]);
        m.remove(ChannelId(1));
        assert_eq!(m.bits(), 1 << 4);
    }

    #[test]
    fn channels_past_the_mask_are_ignored() {
        assert_eq!(ChannelId(31).bit(), 1 << 31);
        assert_eq!(ChannelId(32).bit(), 0);
        assert_eq!(ChannelId(u8::MAX).bit(), 0);
        let mut m = ChannelMask::EMPTY;
        m.insert(ChannelId(40));
        assert_eq!(m, ChannelMask::EMPTY, "nothing inserted");
        assert!(!m.contains(ChannelId(40)), "never contained");
    }

    #[test]
    fn only_changed_channels_switch() {
        let mut state = ProtectionState::new();
        let first = state.plan(ChannelMask::from_bits(0b0110), ChannelMask::EMPTY);
        assert_eq!(first.changed, ChannelMask::from_bits(0b0110));
        state.commit(&first);

        let second = state.plan(ChannelMask::from_bits(0b0011), ChannelMask::EMPTY);
        assert_eq!(second.changed, ChannelMask::from_bits(0b0101));
        assert!(second.enables(ChannelId(0)), "channel 0 turns on");
        assert!(!second.enables(ChannelId(2)), "channel 2 turns off");
        state.commit(&second);
        assert_eq!(state.current(), ChannelMask::from_bits(0b0011));

        let same = state.plan(ChannelMask::from_bits(0b0011), ChannelMask::EMPTY);
        assert!(same.is_empty(), "nothing to do");
    }

    #[test]
    fn forced_channels_switch_anyway() {
        let state = ProtectionState::new();
        let change = state.plan(ChannelMask::EMPTY, ChannelMask::from_bits(1 << 5));
        assert!(change.changed.contains(ChannelId(5)), "reset channel reapplied");
        assert!(!change.enables(ChannelId(5)), "and left unprotected");
    }
}
