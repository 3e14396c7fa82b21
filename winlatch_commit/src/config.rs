// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Commit worker configuration.

use std::time::Duration;

/// What the worker does when the shadow registers fail to latch.
///
/// A missed shadow update means the hardware state is unknown, so the frame
/// cannot be retired safely and later frames cannot be programmed on top of
/// it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FatalPolicy {
    /// Log a register dump and abort the process.
    #[default]
    Abort,
    /// Log a register dump and stop the worker. Later operations return
    /// [`CommitError::Halted`](crate::CommitError::Halted).
    Halt,
}

/// Timeouts and failure policy of the commit worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitConfig {
    /// Longest wait for one acquire fence. On expiry the frame proceeds.
    pub acquire_timeout: Duration,
    /// Longest wait for vertical sync.
    pub vsync_timeout: Duration,
    /// Longest wait for written registers to latch.
    pub shadow_timeout: Duration,
    /// Longest wait for the line counter to return to zero before changing
    /// the update region or protection.
    pub line_count_timeout: Duration,
    /// Longest wait for a channel to stop fetching before its protection
    /// changes.
    pub channel_idle_timeout: Duration,
    /// Reaction to a shadow-update timeout.
    pub fatal_policy: FatalPolicy,
}

impl CommitConfig {
    /// Timeouts suited to a real display controller.
    #[must_use]
    pub const fn hardware() -> Self {
        Self {
            acquire_timeout: Duration::from_millis(900),
            vsync_timeout: Duration::from_millis(50),
            shadow_timeout: Duration::from_millis(300),
            line_count_timeout: Duration::from_millis(35),
            channel_idle_timeout: Duration::from_millis(50),
            fatal_policy: FatalPolicy::Abort,
        }
    }

    /// Same timeouts, but a fatal error halts the worker instead of
    /// aborting. Used with simulated hardware.
    #[must_use]
    pub const fn simulated() -> Self {
        Self {
            fatal_policy: FatalPolicy::Halt,
            ..Self::hardware()
        }
    }

    /// Returns this config with a different acquire timeout.
    #[must_use]
    pub const fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self::hardware()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_only_in_policy() {
        let hw = CommitConfig::hardware();
        let sim = CommitConfig::simulated();
        assert_eq!(hw.fatal_policy, FatalPolicy::Abort);
        assert_eq!(sim.fatal_policy, FatalPolicy::Halt);
        assert_eq!(
            CommitConfig {
                fatal_policy: FatalPolicy::Abort,
                ..sim
            },
            hw
        );
    }

    #[test]
    fn hardware_timeouts() {
        let hw = CommitConfig::default();
        assert_eq!(hw.acquire_timeout, Duration::from_millis(900));
        assert_eq!(hw.shadow_timeout, Duration::from_millis(300));
        assert_eq!(
            hw.with_acquire_timeout(Duration::from_millis(5)).acquire_timeout,
            Duration::from_millis(5)
        );
    }
}
