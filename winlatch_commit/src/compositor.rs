// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The client-facing compositor handle.

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;
use winlatch_core::caps::{HardwareCapabilities, Panel};
use winlatch_core::resolve::resolve_frame;
use winlatch_core::validate::validate;
use winlatch_core::window::WindowConfig;

use crate::buffer::{BufferImporter, import_frame};
use crate::config::CommitConfig;
use crate::error::{CommitError, HardwareError};
use crate::fence::Fence;
use crate::frame::{FrameSeq, QueuedFrame};
use crate::hardware::DisplayHardware;
use crate::state::{CompositorSnapshot, DeviceState};
use crate::trace::{FrameQueuedEvent, NoopSink, TraceSink};
use crate::worker::{Command, PowerRequest, Shared, Worker};

/// Accepts frame submissions and owns the commit worker.
///
/// `submit` may be called from any number of threads; submissions are
/// serialized, numbered, and programmed in that order. Dropping the
/// compositor stops the worker and releases every buffer it still holds.
pub struct Compositor {
    caps: HardwareCapabilities,
    panel: Panel,
    importer: Arc<dyn BufferImporter>,
    shared: Arc<Shared>,
    tx: Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl core::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Compositor")
            .field("caps", &self.caps)
            .field("panel", &self.panel)
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl Compositor {
    /// Starts a compositor over `hardware`. The device starts
    /// [`Off`](DeviceState::Off); call [`power_on`](Self::power_on) before
    /// submitting.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::Spawn`] if the worker thread cannot start.
    pub fn new(
        caps: HardwareCapabilities,
        panel: Panel,
        config: CommitConfig,
        hardware: impl DisplayHardware + 'static,
        importer: Arc<dyn BufferImporter>,
    ) -> Result<Self, CommitError> {
        let shared = Arc::new(Shared::new(Box::new(NoopSink)));
        let (tx, rx) = mpsc::channel();
        let worker = Worker::new(Box::new(hardware), Arc::clone(&shared), config);
        let handle = thread::Builder::new()
            .name("winlatch-commit".into())
            .spawn(move || worker.run(&rx))?;

        Ok(Self {
            caps,
            panel,
            importer,
            shared,
            tx,
            worker: Some(handle),
        })
    }

    /// Hardware capabilities this compositor resolves against.
    #[must_use]
    pub fn caps(&self) -> &HardwareCapabilities {
        &self.caps
    }

    /// Panel this compositor drives.
    #[must_use]
    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    /// Replaces the trace sink.
    pub fn set_trace_sink(&self, sink: impl TraceSink + Send + 'static) {
        self.shared.set_sink(Box::new(sink));
    }

    /// Current scheduler state.
    #[must_use]
    pub fn snapshot(&self) -> CompositorSnapshot {
        self.shared.lock().snapshot()
    }

    // ---- Frames ----

    /// Validates, resolves and queues one frame.
    ///
    /// Returns the frame's release fence, signaled once the frame is on
    /// screen and every buffer of the frame before it has been released.
    /// While the device is off or handed to another owner, nothing is
    /// queued and the returned fence is already signaled.
    ///
    /// # Errors
    ///
    /// - [`CommitError::Validation`] if the submission is malformed. Nothing
    ///   was imported or queued.
    /// - [`CommitError::BufferImport`] if a buffer or fence cannot be
    ///   imported. Nothing stays imported and nothing was queued.
    /// - [`CommitError::Halted`] after a fatal hardware error.
    pub fn submit(&self, configs: &[WindowConfig]) -> Result<Fence, CommitError> {
        let request = validate(configs, &self.caps)?;

        let mut state = self.shared.lock();
        if state.halted {
            return Err(CommitError::Halted);
        }
        if state.secure_handoff || !state.device.accepts_frames() {
            debug!(
                device = ?state.device,
                handoff = state.secure_handoff,
                "display not owned; frame skipped"
            );
            return Ok(Fence::signaled());
        }

        let resolved = resolve_frame(&request, &self.caps, &self.panel);
        let bindings = import_frame(&self.importer, &resolved.windows)?;
        let mut regs = resolved.to_registers(&self.panel);
        for window in &bindings.windows {
            regs.bind_planes(window.slot, &window.addresses());
        }
        regs.update_changed = state.last_update != Some(regs.update);

        let seq = state.last_seq.next();
        let (enabled, update, bandwidth) = (regs.enabled_count, regs.update, regs.bandwidth);
        let release = Fence::new();
        let frame = QueuedFrame {
            seq,
            regs,
            bindings,
            release: release.clone(),
        };
        self.shared.trace(|t, at| {
            t.frame_queued(&FrameQueuedEvent {
                seq,
                enabled,
                update,
                bandwidth,
                at,
            });
        });
        state.queued += 1;
        if self.tx.send(Command::Frame(frame)).is_err() {
            state.queued -= 1;
            return Err(CommitError::WorkerGone);
        }
        state.last_seq = seq;
        state.last_update = Some(update);
        drop(state);

        debug!(
            seq = seq.0,
            enabled,
            ?update,
            blanked = resolved.blanked,
            bandwidth,
            "frame queued"
        );
        Ok(release)
    }

    /// Blocks until every frame submitted so far has been processed by the
    /// worker.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::Halted`] if the worker stopped after a fatal
    /// error.
    pub fn force_flush(&self) -> Result<(), CommitError> {
        let (ack, done) = mpsc::channel();
        self.send(Command::Flush(ack))?;
        done.recv().map_err(|_| self.gone())
    }

    /// Sequence number of the most recently queued frame.
    #[must_use]
    pub fn last_seq(&self) -> FrameSeq {
        self.shared.lock().last_seq
    }

    // ---- Power ----

    /// Powers the display up. Frames are accepted once this returns.
    ///
    /// # Errors
    ///
    /// Fails if the device is not off or does not come up.
    pub fn power_on(&self) -> Result<(), CommitError> {
        self.transition(DeviceState::Init, PowerRequest::On)
    }

    /// Powers the display down after every queued frame has been
    /// programmed, and releases the buffers on screen. Submissions made
    /// once this is called are not queued and get pre-signaled fences.
    ///
    /// # Errors
    ///
    /// Fails if the device is already off or being powered off.
    pub fn power_off(&self) -> Result<(), CommitError> {
        self.transition(DeviceState::Disabling, PowerRequest::Off)
    }

    /// Gates display clocks between frames. A later submission wakes the
    /// device on its own.
    ///
    /// # Errors
    ///
    /// Fails if the device is not on, or the transition fails.
    pub fn enter_low_power(&self) -> Result<(), CommitError> {
        self.transition(DeviceState::LowPowerEntering, PowerRequest::EnterLowPower)
    }

    /// Leaves low power.
    ///
    /// # Errors
    ///
    /// Fails if the device is not in low power, or the transition fails.
    pub fn exit_low_power(&self) -> Result<(), CommitError> {
        self.transition(DeviceState::LowPowerExiting, PowerRequest::ExitLowPower)
    }

    /// Hands the display to another owner, or takes it back. While handed
    /// off, submissions return pre-signaled fences and queue nothing.
    pub fn set_secure_handoff(&self, handed_off: bool) {
        self.shared.lock().secure_handoff = handed_off;
        debug!(handed_off, "secure handoff");
    }

    fn transition(&self, to: DeviceState, request: PowerRequest) -> Result<(), CommitError> {
        {
            let mut state = self.shared.lock();
            if state.halted {
                return Err(CommitError::Halted);
            }
            if !state.device.can_transition(to) {
                return Err(CommitError::InvalidTransition {
                    from: state.device,
                    to,
                });
            }
            state.device = to;
        }
        self.request(request)
    }

    fn request(&self, request: PowerRequest) -> Result<(), CommitError> {
        let (ack, done) = mpsc::channel::<Result<(), HardwareError>>();
        self.send(Command::Power(request, ack))?;
        done.recv().map_err(|_| self.gone())??;
        Ok(())
    }

    // ---- Plumbing ----

    fn send(&self, cmd: Command) -> Result<(), CommitError> {
        self.tx.send(cmd).map_err(|_| self.gone())
    }

    fn gone(&self) -> CommitError {
        if self.shared.lock().halted {
            CommitError::Halted
        } else {
            CommitError::WorkerGone
        }
    }
}

impl Drop for Compositor {
    fn drop(&mut self) {
        _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            _ = handle.join();
        }
    }
}
