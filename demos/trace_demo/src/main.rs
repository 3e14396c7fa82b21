// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated compositor session that exercises the commit tracing pipeline.
//!
//! Drives 60 frames through a [`Compositor`](winlatch_commit::Compositor) on
//! simulated hardware: a scrolling partial update, a protected video window
//! that comes and goes, one channel fault, and a low-power idle period. Every
//! event goes to a [`PrettyPrintSink`] on stdout and to a [`RecorderSink`],
//! whose recording is decoded and summarized at the end.
//!
//! Set `RUST_LOG=winlatch_commit=debug` to see the worker's own log lines.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use winlatch_backend_sim::Sim;
use winlatch_commit::trace::{
    FatalEvent, FrameQueuedEvent, PowerEvent, ProtectionEvent, StageEvent, TraceSink,
    UpdateRegionEvent, WaitTimeoutEvent, WindowFaultEvent,
};
use winlatch_commit::{CommitError, Fence};
use winlatch_core::format::PixelFormat;
use winlatch_core::geometry::{Region, Size};
use winlatch_core::window::{BufferHandle, ChannelId, WindowConfig};
use winlatch_debug::pretty::PrettyPrintSink;
use winlatch_debug::recorder::{RecordedEvent, RecorderSink, decode};

const FRAME_COUNT: u64 = 60;
const VIDEO_FRAMES: std::ops::Range<u64> = 20..35;
const FAULT_FRAME: u64 = 30;
const IDLE_AFTER: u64 = 45;

/// Forwards every event to two sinks.
struct Tee<A, B>(A, B);

impl<A: TraceSink, B: TraceSink> TraceSink for Tee<A, B> {
    fn on_frame_queued(&mut self, e: &FrameQueuedEvent) {
        self.0.on_frame_queued(e);
        self.1.on_frame_queued(e);
    }

    fn on_stage(&mut self, e: &StageEvent) {
        self.0.on_stage(e);
        self.1.on_stage(e);
    }

    fn on_wait_timeout(&mut self, e: &WaitTimeoutEvent) {
        self.0.on_wait_timeout(e);
        self.1.on_wait_timeout(e);
    }

    fn on_window_fault(&mut self, e: &WindowFaultEvent) {
        self.0.on_window_fault(e);
        self.1.on_window_fault(e);
    }

    fn on_protection(&mut self, e: &ProtectionEvent) {
        self.0.on_protection(e);
        self.1.on_protection(e);
    }

    fn on_update_region(&mut self, e: &UpdateRegionEvent) {
        self.0.on_update_region(e);
        self.1.on_update_region(e);
    }

    fn on_fatal(&mut self, e: &FatalEvent) {
        self.0.on_fatal(e);
        self.1.on_fatal(e);
    }

    fn on_power(&mut self, e: &PowerEvent) {
        self.0.on_power(e);
        self.1.on_power(e);
    }
}

fn background(frame: u64) -> WindowConfig {
    WindowConfig::buffer(
        0,
        ChannelId(0),
        PixelFormat::Argb8888,
        Size::new(1080, 1920),
        Region::new(0, 0, 1080, 1920),
        vec![BufferHandle(1 + frame % 3)],
    )
}

fn video(frame: u64) -> WindowConfig {
    let mut window = WindowConfig::buffer(
        1,
        ChannelId(1),
        PixelFormat::Nv12M,
        Size::new(1920, 1080),
        Region::new(0, 640, 1080, 608),
        vec![BufferHandle(100 + frame % 4), BufferHandle(200 + frame % 4)],
    );
    window.protected = true;
    window
}

fn frame_configs(frame: u64) -> Vec<WindowConfig> {
    let mut configs = vec![background(frame)];
    if VIDEO_FRAMES.contains(&frame) {
        configs.push(video(frame));
    }
    // A 128-line band scrolling down the panel.
    let row = i32::try_from(frame % 15).unwrap_or(0) * 128;
    configs.push(WindowConfig::update_region(Region::new(0, row, 1080, 128)));
    configs
}

fn run(sim: &Sim) -> Result<Vec<Fence>, CommitError> {
    let mut fences = Vec::new();
    for frame in 0..FRAME_COUNT {
        if frame == FAULT_FRAME {
            sim.control.fail_channel(ChannelId(1));
        } else if frame == FAULT_FRAME + 1 {
            sim.control.heal_channel(ChannelId(1));
        }
        if frame == IDLE_AFTER {
            sim.compositor.force_flush()?;
            sim.compositor.enter_low_power()?;
            info!("idle; next frame wakes the panel");
        }
        fences.push(sim.compositor.submit(&frame_configs(frame))?);
    }
    sim.compositor.force_flush()?;
    Ok(fences)
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let sim = match Sim::command_panel() {
        Ok(sim) => sim,
        Err(err) => {
            warn!(%err, "compositor failed to start");
            return;
        }
    };

    let recorder = Arc::new(Mutex::new(RecorderSink::new()));
    sim.compositor.set_trace_sink(Tee(
        PrettyPrintSink::with_writer(std::io::stdout()),
        Arc::clone(&recorder),
    ));

    match run(&sim) {
        Ok(fences) => {
            let released = fences.iter().filter(|f| f.is_signaled()).count();
            info!(released, total = fences.len(), "session complete");
        }
        Err(err) => warn!(%err, "session aborted"),
    }
    if let Err(err) = sim.compositor.power_off() {
        warn!(%err, "power off failed");
    }

    // -- summary -----------------------------------------------------------
    let bytes = recorder
        .lock()
        .map(|rec| rec.as_bytes().to_vec())
        .unwrap_or_default();
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for event in decode(&bytes) {
        let kind = match event {
            RecordedEvent::FrameQueued(_) => "queued",
            RecordedEvent::Stage(e) => e.stage.name(),
            RecordedEvent::WaitTimeout(_) => "timeout",
            RecordedEvent::WindowFault(_) => "fault",
            RecordedEvent::Protection(_) => "protection",
            RecordedEvent::UpdateRegion(_) => "update",
            RecordedEvent::Fatal(_) => "fatal",
            RecordedEvent::Power(_) => "power",
        };
        *counts.entry(kind).or_default() += 1;
    }

    println!();
    println!("recorded {} bytes", bytes.len());
    for (kind, count) in &counts {
        println!("  {kind:<12} {count}");
    }
    println!("device log: {} events", sim.log.events().len());
}
