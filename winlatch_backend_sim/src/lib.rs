// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated backend for `winlatch_commit`.
//!
//! [`SimHardware`] implements [`DisplayHardware`](winlatch_commit::DisplayHardware)
//! and [`SimImporter`] implements
//! [`BufferImporter`](winlatch_commit::BufferImporter). Both append to a
//! shared [`EventLog`], so a test can assert on the exact order in which
//! registers were written, shadow updates latched, and buffers released.
//!
//! ```text
//!   Compositor ──► worker ──► SimHardware ──┐
//!        │                                  ├──► EventLog
//!        └──────► SimImporter ──────────────┘
//! ```
//!
//! [`Sim::start`] wires everything to a fresh compositor.

pub mod hardware;
pub mod importer;
pub mod log;

use std::sync::Arc;

pub use hardware::{SimControl, SimHardware};
pub use importer::SimImporter;
pub use log::{EventLog, SimEvent};
use winlatch_commit::{CommitConfig, CommitError, Compositor};
use winlatch_core::caps::{HardwareCapabilities, Panel};

/// A compositor running on simulated hardware, plus the handles to inspect
/// it.
#[derive(Debug)]
pub struct Sim {
    /// The compositor under test.
    pub compositor: Compositor,
    /// Device fault injection and register inspection.
    pub control: SimControl,
    /// Buffer importer shared with the compositor.
    pub importer: Arc<SimImporter>,
    /// Everything the device and importer did.
    pub log: EventLog,
}

impl Sim {
    /// Starts a compositor on simulated hardware. The device is still off.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot start.
    pub fn start(
        caps: HardwareCapabilities,
        panel: Panel,
        config: CommitConfig,
    ) -> Result<Self, CommitError> {
        let log = EventLog::default();
        let (hardware, control) = SimHardware::new(log.clone());
        let importer = Arc::new(SimImporter::new(log.clone()));
        let compositor = Compositor::new(caps, panel, config, hardware, importer.clone())?;
        Ok(Self {
            compositor,
            control,
            importer,
            log,
        })
    }

    /// Starts a command-mode 1080×1920 panel at 60 Hz with simulated
    /// timeouts, and powers it on.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker does not start or power-on fails.
    pub fn command_panel() -> Result<Self, CommitError> {
        let sim = Self::start(
            HardwareCapabilities::command_panel(),
            Panel::new(1080, 1920, 60),
            CommitConfig::simulated(),
        )?;
        sim.compositor.power_on()?;
        Ok(sim)
    }
}
