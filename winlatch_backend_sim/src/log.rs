// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared record of everything the simulated device and importer did.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use winlatch_core::partial::UpdateRegion;
use winlatch_core::window::{BufferHandle, ChannelId};

/// One observable action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimEvent {
    /// A buffer plane was mapped.
    Import(BufferHandle),
    /// A buffer plane was unmapped.
    Release(BufferHandle),
    /// Blender registers of a slot were written.
    WriteWindow {
        /// Slot.
        slot: usize,
        /// Enable bit of the written control word.
        enabled: bool,
    },
    /// A channel was programmed.
    ConfigureChannel {
        /// Channel.
        channel: ChannelId,
        /// Whether the channel accepted the configuration.
        ok: bool,
    },
    /// A faulted channel was reset.
    ResetChannel(ChannelId),
    /// The panel update region was written.
    SetUpdate(UpdateRegion),
    /// The worker waited for the line counter.
    WaitLineCount,
    /// The worker waited for a channel to go idle.
    WaitChannelIdle(ChannelId),
    /// Channel protection was switched.
    SetProtection {
        /// Channel.
        channel: ChannelId,
        /// New mode.
        protected: bool,
    },
    /// A shadow update was requested.
    RequestShadow,
    /// The requested shadow update latched.
    ShadowLatched,
    /// A vertical sync passed.
    Vsync,
    /// The device powered up.
    PowerOn,
    /// The device powered down.
    PowerOff,
    /// The device entered low power.
    EnterLowPower,
    /// The device left low power.
    ExitLowPower,
}

/// Bounded log with a `drop_oldest` overflow policy.
#[derive(Debug)]
struct Bounded {
    events: VecDeque<SimEvent>,
    capacity: usize,
    dropped: u64,
}

impl Bounded {
    fn push(&mut self, event: SimEvent) {
        if self.events.len() == self.capacity {
            _ = self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }
}

/// Cloneable handle to a shared event log.
#[derive(Clone, Debug)]
pub struct EventLog {
    inner: Arc<Mutex<Bounded>>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl EventLog {
    /// Capacity of [`EventLog::default`].
    pub const DEFAULT_CAPACITY: usize = 4096;

    /// Creates a log keeping at most `capacity` events. Zero is promoted to
    /// one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(Bounded {
                events: VecDeque::with_capacity(capacity.min(Self::DEFAULT_CAPACITY)),
                capacity,
                dropped: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Bounded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an event.
    pub fn push(&self, event: SimEvent) {
        tracing::trace!(?event, "sim");
        self.lock().push(event);
    }

    /// Copy of the retained events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<SimEvent> {
        self.lock().events.iter().copied().collect()
    }

    /// Number of retained events matching `pred`.
    #[must_use]
    pub fn count(&self, pred: impl Fn(&SimEvent) -> bool) -> usize {
        self.lock().events.iter().filter(|e| pred(e)).count()
    }

    /// Index of the first retained event equal to `event`.
    #[must_use]
    pub fn position(&self, event: SimEvent) -> Option<usize> {
        self.lock().events.iter().position(|e| *e == event)
    }

    /// Events discarded because the log was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    /// Discards every retained event.
    pub fn clear(&self) {
        self.lock().events.clear();
    }
}
