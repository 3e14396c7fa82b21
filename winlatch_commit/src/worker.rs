// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The commit worker thread.
//!
//! One worker per compositor drains a FIFO of [`Command`]s. Frames are
//! programmed strictly in submission order and only one frame is ever being
//! programmed. Per frame:
//!
//! ```text
//!   Programming: wake ─► acquire fences ─► channel resets ─► protection
//!                ─► update region ─► window registers ─► shadow request
//!   Active:      vsync ─► shadow latched ─► previous frame Retiring/Freed
//!                ─► release fence signaled
//! ```
//!
//! A shadow-update timeout leaves the hardware in an unknown state and is
//! handled according to [`FatalPolicy`].

use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use winlatch_core::protection::{ChannelMask, ProtectionState};

use crate::buffer::FrameBindings;
use crate::config::{CommitConfig, FatalPolicy};
use crate::error::{HardwareError, WaitKind};
use crate::frame::{FrameSeq, FrameStage, QueuedFrame};
use crate::hardware::DisplayHardware;
use crate::state::{CompositorState, DeviceState};
use crate::trace::{
    FatalEvent, PowerEvent, ProtectionEvent, StageEvent, TraceSink, Tracer, UpdateRegionEvent,
    WaitTimeoutEvent, WindowFaultEvent,
};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared between the compositor handle and its worker.
///
/// Lock order is `state` before `sink`. The worker never holds both.
pub(crate) struct Shared {
    state: Mutex<CompositorState>,
    sink: Mutex<Box<dyn TraceSink + Send>>,
    epoch: Instant,
}

impl Shared {
    pub(crate) fn new(sink: Box<dyn TraceSink + Send>) -> Self {
        Self {
            state: Mutex::new(CompositorState::new()),
            sink: Mutex::new(sink),
            epoch: Instant::now(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, CompositorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_sink(&self, sink: Box<dyn TraceSink + Send>) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    /// Runs `f` with a tracer over the installed sink and the current
    /// timestamp.
    pub(crate) fn trace(&self, f: impl FnOnce(&mut Tracer<'_>, Duration)) {
        let at = self.epoch.elapsed();
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut Tracer::new(&mut **sink), at);
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Power transitions carried out on the worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PowerRequest {
    On,
    Off,
    EnterLowPower,
    ExitLowPower,
}

/// Work items, processed in the order they were sent.
#[derive(Debug)]
pub(crate) enum Command {
    Frame(QueuedFrame),
    /// Acknowledged once everything sent before it has been processed.
    Flush(Sender<()>),
    Power(PowerRequest, Sender<Result<(), HardwareError>>),
    Shutdown,
}

/// A frame whose registers never latched.
struct Fatal {
    frame: QueuedFrame,
    err: HardwareError,
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

pub(crate) struct Worker {
    hw: Box<dyn DisplayHardware>,
    shared: Arc<Shared>,
    config: CommitConfig,
    /// Frame on screen and the buffers it reads.
    active: Option<(FrameSeq, FrameBindings)>,
    /// Frame that failed to latch. Its buffers stay mapped until shutdown.
    stuck: Option<QueuedFrame>,
    /// Channels that faulted during the last frame, reset before the next.
    pending_reset: ChannelMask,
    /// Whether the hardware is powered.
    powered: bool,
    /// Whether the hardware is actually in low power.
    low_power: bool,
    /// The last update-region write failed.
    update_stale: bool,
}

impl Worker {
    pub(crate) fn new(
        hw: Box<dyn DisplayHardware>,
        shared: Arc<Shared>,
        config: CommitConfig,
    ) -> Self {
        Self {
            hw,
            shared,
            config,
            active: None,
            stuck: None,
            pending_reset: ChannelMask::EMPTY,
            powered: false,
            low_power: false,
            update_stale: false,
        }
    }

    /// Processes commands until shutdown or until the sending side is
    /// dropped.
    pub(crate) fn run(mut self, rx: &Receiver<Command>) {
        let span = tracing::debug_span!("commit_worker");
        let _enter = span.enter();
        debug!("commit worker started");

        while let Ok(cmd) = rx.recv() {
            match cmd {
                Command::Frame(frame) if !self.powered => self.discard(frame),
                Command::Frame(frame) => {
                    if let Err(fatal) = self.commit(frame) {
                        self.fatal(fatal);
                        break;
                    }
                }
                Command::Flush(ack) => {
                    _ = ack.send(());
                }
                Command::Power(request, ack) => {
                    _ = ack.send(self.power(request));
                }
                Command::Shutdown => {
                    debug!("commit worker shutting down");
                    return;
                }
            }
        }

        // Halted: keep every mapping the hardware may still read until the
        // compositor goes away. Flushes and power requests are dropped, so
        // their callers observe the halt. Frames still queued were never
        // programmed; their buffers go back and their fences fail.
        while let Ok(cmd) = rx.recv() {
            match cmd {
                Command::Frame(frame) => {
                    debug!(seq = frame.seq.0, "dropping frame queued before halt");
                    frame.release.signal_error();
                }
                Command::Shutdown => break,
                Command::Flush(_) | Command::Power(..) => {}
            }
        }
        if let Some(frame) = self.stuck.take() {
            debug!(seq = frame.seq.0, "releasing buffers of unlatched frame");
        }
    }

    fn stage(&self, seq: FrameSeq, stage: FrameStage) {
        self.shared
            .trace(|t, at| t.stage(&StageEvent { seq, stage, at }));
    }

    /// Logs and traces an expired non-fatal wait.
    fn note(&self, seq: FrameSeq, wait: WaitKind, result: Result<(), HardwareError>) {
        if let Err(err) = result {
            warn!(seq = seq.0, %err, "{} wait failed; continuing", wait.name());
            self.shared
                .trace(|t, at| t.wait_timeout(&WaitTimeoutEvent { seq, wait, at }));
        }
    }

    /// Records the state the hardware reached. A pending power-off stays
    /// visible to submitters until the device is actually off.
    fn set_device(&self, state: DeviceState) {
        {
            let mut shared = self.shared.lock();
            if shared.device != DeviceState::Disabling || state == DeviceState::Off {
                shared.device = state;
            }
        }
        self.shared.trace(|t, at| t.power(&PowerEvent { state, at }));
    }

    /// Drops a frame that reached the worker while the device is off. It was
    /// never programmed, so its buffers are released right away.
    fn discard(&self, frame: QueuedFrame) {
        debug!(seq = frame.seq.0, "device off; frame dropped");
        {
            let mut state = self.shared.lock();
            state.queued = state.queued.saturating_sub(1);
        }
        let QueuedFrame {
            bindings, release, ..
        } = frame;
        drop(bindings);
        release.signal();
    }

    // ---- Frame programming ----

    fn commit(&mut self, mut frame: QueuedFrame) -> Result<(), Fatal> {
        let seq = frame.seq;
        let span = tracing::debug_span!("frame", seq = seq.0);
        let _enter = span.enter();
        self.stage(seq, FrameStage::Programming);

        if self.low_power {
            self.wake(seq);
        }
        self.wait_acquire(seq, &frame.bindings);

        let reset = core::mem::take(&mut self.pending_reset);
        if !reset.is_empty() {
            for channel in reset.iter() {
                debug!(?channel, "resetting faulted channel");
                self.hw.reset_channel(channel);
            }
            let mut state = self.shared.lock();
            for channel in reset.iter() {
                state.errored.remove(channel);
            }
        }
        self.apply_protection(seq, frame.regs.protection, reset);

        if frame.regs.update_changed || self.update_stale {
            let drained = self.hw.wait_line_count_zero(self.config.line_count_timeout);
            self.note(seq, WaitKind::LineCount, drained);
            let update = frame.regs.update;
            match self.hw.set_update_region(update) {
                Ok(()) => {
                    self.update_stale = false;
                    self.shared
                        .trace(|t, at| t.update_region(&UpdateRegionEvent { seq, update, at }));
                }
                Err(err) => {
                    warn!(seq = seq.0, %err, "update region rejected; reprogramming next frame");
                    self.update_stale = true;
                    self.shared.lock().last_update = None;
                }
            }
        }

        for slot in 0..frame.regs.windows.len() {
            let regs = &frame.regs.windows[slot];
            self.hw.write_window(slot, regs);
            let Some(channel) = regs.channel.filter(|_| regs.is_enabled()) else {
                continue;
            };
            if let Err(err) = self.hw.configure_channel(channel, regs) {
                warn!(seq = seq.0, slot, ?channel, %err, "disabling window for this frame");
                frame.regs.disable(slot);
                self.hw.write_window(slot, &frame.regs.windows[slot]);
                self.pending_reset.insert(channel);
                self.shared.lock().errored.insert(channel);
                self.shared.trace(|t, at| {
                    t.window_fault(&WindowFaultEvent {
                        seq,
                        slot,
                        channel,
                        at,
                    });
                });
            }
        }

        self.hw.request_shadow_update();
        let vsync = self.hw.wait_vsync(self.config.vsync_timeout);
        self.note(seq, WaitKind::Vsync, vsync);
        if let Err(err) = self.hw.wait_shadow_update(self.config.shadow_timeout) {
            return Err(Fatal { frame, err });
        }

        self.stage(seq, FrameStage::Active);
        {
            let mut state = self.shared.lock();
            state.active = Some(seq);
            state.queued = state.queued.saturating_sub(1);
        }
        self.retire_active();
        self.active = Some((seq, frame.bindings));
        frame.release.signal();
        debug!(seq = seq.0, enabled = frame.regs.enabled_count, "frame active");
        Ok(())
    }

    /// Releases the buffers of the frame that was on screen.
    fn retire_active(&mut self) {
        if let Some((seq, bindings)) = self.active.take() {
            self.stage(seq, FrameStage::Retiring);
            drop(bindings);
            self.stage(seq, FrameStage::Freed);
        }
    }

    /// Waits for every acquire fence of the frame. After the first expiry
    /// the remaining fences are not waited on.
    fn wait_acquire(&self, seq: FrameSeq, bindings: &FrameBindings) {
        for (slot, fence) in bindings.acquire_fences() {
            if !fence.wait_timeout(self.config.acquire_timeout) {
                warn!(seq = seq.0, slot, "acquire fence not signaled; programming anyway");
                self.shared.trace(|t, at| {
                    t.wait_timeout(&WaitTimeoutEvent {
                        seq,
                        wait: WaitKind::AcquireFence,
                        at,
                    });
                });
                return;
            }
        }
    }

    /// Switches protection on every channel whose mode differs from
    /// `wanted`, plus the `force`d ones. Channels must stop fetching before
    /// they switch.
    fn apply_protection(&mut self, seq: FrameSeq, wanted: ChannelMask, force: ChannelMask) {
        let change = self.shared.lock().protection.plan(wanted, force);
        if change.is_empty() {
            return;
        }
        let drained = self.hw.wait_line_count_zero(self.config.line_count_timeout);
        self.note(seq, WaitKind::LineCount, drained);
        for channel in change.changed.iter() {
            let idle = self
                .hw
                .wait_channel_idle(channel, self.config.channel_idle_timeout);
            self.note(seq, WaitKind::ChannelIdle, idle);
            self.hw.set_channel_protection(channel, change.enables(channel));
        }
        self.shared.lock().protection.commit(&change);
        debug!(changed = ?change.changed, target = ?change.target, "protection switched");
        self.shared.trace(|t, at| {
            t.protection(&ProtectionEvent {
                seq,
                changed: change.changed,
                target: change.target,
                at,
            });
        });
    }

    fn fatal(&mut self, fatal: Fatal) {
        let seq = fatal.frame.seq;
        let wait = match fatal.err {
            HardwareError::Timeout { wait, .. } => wait,
            _ => WaitKind::ShadowUpdate,
        };
        let snapshot = self.shared.lock().snapshot();
        error!(
            seq = seq.0,
            err = %fatal.err,
            state = ?snapshot,
            frame = ?fatal.frame.regs,
            registers = %self.hw.dump(),
            "shadow registers did not latch; hardware state unknown"
        );
        self.shared
            .trace(|t, at| t.fatal(&FatalEvent { seq, wait, at }));

        match self.config.fatal_policy {
            FatalPolicy::Abort => std::process::abort(),
            FatalPolicy::Halt => {
                let mut state = self.shared.lock();
                state.halted = true;
                state.queued = 0;
                drop(state);
                fatal.frame.release.signal_error();
                self.stuck = Some(fatal.frame);
            }
        }
    }

    // ---- Power ----

    fn wake(&mut self, seq: FrameSeq) {
        self.set_device(DeviceState::LowPowerExiting);
        match self.hw.exit_low_power() {
            Ok(()) => {
                self.low_power = false;
                self.set_device(DeviceState::On);
            }
            Err(err) => {
                warn!(seq = seq.0, %err, "failed to leave low power");
                self.set_device(DeviceState::LowPower);
            }
        }
    }

    fn power(&mut self, request: PowerRequest) -> Result<(), HardwareError> {
        info!(?request, "power request");
        match request {
            PowerRequest::On => match self.hw.power_on() {
                Ok(()) => {
                    self.powered = true;
                    self.low_power = false;
                    self.shared.lock().last_update = None;
                    self.set_device(DeviceState::On);
                    Ok(())
                }
                Err(err) => {
                    self.set_device(DeviceState::Off);
                    Err(err)
                }
            },
            PowerRequest::Off => {
                self.hw.power_off();
                self.retire_active();
                self.powered = false;
                self.low_power = false;
                self.pending_reset = ChannelMask::EMPTY;
                {
                    let mut state = self.shared.lock();
                    state.protection = ProtectionState::new();
                    state.errored = ChannelMask::EMPTY;
                    state.last_update = None;
                    state.active = None;
                }
                self.set_device(DeviceState::Off);
                Ok(())
            }
            PowerRequest::EnterLowPower => {
                if self.low_power {
                    self.set_device(DeviceState::LowPower);
                    return Ok(());
                }
                match self.hw.enter_low_power() {
                    Ok(()) => {
                        self.low_power = true;
                        self.set_device(DeviceState::LowPower);
                        Ok(())
                    }
                    Err(err) => {
                        self.set_device(DeviceState::On);
                        Err(err)
                    }
                }
            }
            PowerRequest::ExitLowPower => {
                if !self.low_power {
                    self.set_device(DeviceState::On);
                    return Ok(());
                }
                match self.hw.exit_low_power() {
                    Ok(()) => {
                        self.low_power = false;
                        self.set_device(DeviceState::On);
                        Ok(())
                    }
                    Err(err) => {
                        self.set_device(DeviceState::LowPower);
                        Err(err)
                    }
                }
            }
        }
    }
}
