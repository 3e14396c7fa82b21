// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-shot synchronization fences.
//!
//! A [`Fence`] starts unsignaled and is signaled exactly once. Clones share
//! state, so the worker keeps one copy and hands the other to the client.
//! Release fences tell a producer its buffer is no longer scanned out;
//! acquire fences tell the worker a producer has finished writing.
//!
//! A fence can also complete with an error (see [`Fence::signal_error`]).
//! Waiters wake up, but the guarantee the fence stands for does not hold.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Pending,
    Signaled,
    Errored,
}

struct Inner {
    status: Mutex<Status>,
    cond: Condvar,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, to: Status) {
        let mut status = self.lock();
        if *status == Status::Pending {
            *status = to;
            self.cond.notify_all();
        }
    }
}

/// A shareable, signal-once fence.
#[derive(Clone)]
pub struct Fence {
    inner: Arc<Inner>,
}

impl core::fmt::Debug for Fence {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Fence")
            .field("status", &*self.inner.lock())
            .finish_non_exhaustive()
    }
}

impl Default for Fence {
    fn default() -> Self {
        Self::new()
    }
}

impl Fence {
    /// Creates an unsignaled fence.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                status: Mutex::new(Status::Pending),
                cond: Condvar::new(),
            }),
        }
    }

    /// Creates a fence that is already signaled.
    #[must_use]
    pub fn signaled() -> Self {
        let fence = Self::new();
        fence.signal();
        fence
    }

    /// Signals the fence and wakes every waiter. Completing a fence twice
    /// is a no-op.
    pub fn signal(&self) {
        self.inner.complete(Status::Signaled);
    }

    /// Completes the fence with an error and wakes every waiter.
    pub fn signal_error(&self) {
        self.inner.complete(Status::Errored);
    }

    /// Returns `true` once the fence has completed, with or without an
    /// error.
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        *self.inner.lock() != Status::Pending
    }

    /// Returns `true` if the fence completed with an error.
    #[must_use]
    pub fn is_errored(&self) -> bool {
        *self.inner.lock() == Status::Errored
    }

    /// Blocks until the fence completes or `timeout` elapses.
    ///
    /// Returns `true` if the fence completed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut status = self.inner.lock();
        while *status == Status::Pending {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            status = self
                .inner
                .cond
                .wait_timeout(status, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Blocks until the fence completes.
    pub fn wait(&self) {
        let mut status = self.inner.lock();
        while *status == Status::Pending {
            status = self
                .inner
                .cond
                .wait(status)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Returns `true` if both values refer to the same fence.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn starts_unsignaled() {
        let fence = Fence::new();
        assert!(!fence.is_signaled(), "fresh fence");
        assert!(!fence.wait_timeout(Duration::from_millis(1)), "times out");
    }

    #[test]
    fn signal_is_shared_by_clones() {
        let fence = Fence::new();
        let other = fence.clone();
        other.signal();
        other.signal();
        assert!(fence.is_signaled(), "clone signaled the original");
        assert!(fence.same_as(&other), "same fence");
        assert!(!fence.same_as(&Fence::signaled()), "different fence");
    }

    #[test]
    fn wakes_waiter_on_another_thread() {
        let fence = Fence::new();
        let signaler = fence.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            signaler.signal();
        });
        assert!(fence.wait_timeout(Duration::from_secs(5)), "woken");
        fence.wait();
        handle.join().unwrap();
    }

    #[test]
    fn error_wakes_waiters_and_sticks() {
        let fence = Fence::new();
        let failer = fence.clone();
        let handle = thread::spawn(move || failer.signal_error());
        assert!(fence.wait_timeout(Duration::from_secs(5)), "woken");
        handle.join().unwrap();
        fence.signal();
        assert!(fence.is_signaled(), "completed");
        assert!(fence.is_errored(), "first completion wins");
    }
}
