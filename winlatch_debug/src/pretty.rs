// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are printed in milliseconds since the compositor started.

use std::io::Write;
use std::time::Duration;

use winlatch_commit::trace::{
    FatalEvent, FrameQueuedEvent, PowerEvent, ProtectionEvent, StageEvent, TraceSink,
    UpdateRegionEvent, WaitTimeoutEvent, WindowFaultEvent,
};
use winlatch_core::partial::UpdateRegion;

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write + Send>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_writer(self) -> W {
        self.writer
    }
}

fn ms(at: Duration) -> f64 {
    at.as_secs_f64() * 1000.0
}

struct Update(UpdateRegion);

impl std::fmt::Display for Update {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            UpdateRegion::Full => f.write_str("full"),
            UpdateRegion::Partial(r) => write!(f, "{}x{}+{}+{}", r.w, r.h, r.x, r.y),
        }
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_frame_queued(&mut self, e: &FrameQueuedEvent) {
        let _ = writeln!(
            self.writer,
            "{:>10.3}ms [queued] frame={} windows={} update={} bw={}MB/s",
            ms(e.at),
            e.seq.0,
            e.enabled,
            Update(e.update),
            e.bandwidth / 1_000_000,
        );
    }

    fn on_stage(&mut self, e: &StageEvent) {
        let _ = writeln!(
            self.writer,
            "{:>10.3}ms [{}] frame={}",
            ms(e.at),
            e.stage.name(),
            e.seq.0,
        );
    }

    fn on_wait_timeout(&mut self, e: &WaitTimeoutEvent) {
        let _ = writeln!(
            self.writer,
            "{:>10.3}ms [timeout] frame={} {}",
            ms(e.at),
            e.seq.0,
            e.wait.name(),
        );
    }

    fn on_window_fault(&mut self, e: &WindowFaultEvent) {
        let _ = writeln!(
            self.writer,
            "{:>10.3}ms [fault] frame={} win{} channel={} disabled",
            ms(e.at),
            e.seq.0,
            e.slot,
            e.channel.0,
        );
    }

    fn on_protection(&mut self, e: &ProtectionEvent) {
        let _ = writeln!(
            self.writer,
            "{:>10.3}ms [protection] frame={} changed={:#x} now={:#x}",
            ms(e.at),
            e.seq.0,
            e.changed.bits(),
            e.target.bits(),
        );
    }

    fn on_update_region(&mut self, e: &UpdateRegionEvent) {
        let _ = writeln!(
            self.writer,
            "{:>10.3}ms [update] frame={} region={}",
            ms(e.at),
            e.seq.0,
            Update(e.update),
        );
    }

    fn on_fatal(&mut self, e: &FatalEvent) {
        let _ = writeln!(
            self.writer,
            "{:>10.3}ms [FATAL] frame={} {} timed out",
            ms(e.at),
            e.seq.0,
            e.wait.name(),
        );
    }

    fn on_power(&mut self, e: &PowerEvent) {
        let _ = writeln!(self.writer, "{:>10.3}ms [power] {:?}", ms(e.at), e.state);
    }
}

#[cfg(test)]
mod tests {
    use winlatch_commit::frame::{FrameSeq, FrameStage};
    use winlatch_core::geometry::Region;

    use super::*;

    #[test]
    fn pretty_print_stage() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_stage(&StageEvent {
            seq: FrameSeq(4),
            stage: FrameStage::Retiring,
            at: Duration::from_millis(16),
        });
        let output = String::from_utf8(sink.into_writer()).unwrap();
        assert!(output.contains("[retiring]"), "got: {output}");
        assert!(output.contains("frame=4"), "got: {output}");
        assert!(output.contains("16.000ms"), "got: {output}");
    }

    #[test]
    fn pretty_print_partial_update() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_update_region(&UpdateRegionEvent {
            seq: FrameSeq(2),
            update: UpdateRegion::Partial(Region::new(8, 16, 64, 32)),
            at: Duration::ZERO,
        });
        let output = String::from_utf8(sink.into_writer()).unwrap();
        assert!(output.contains("region=64x32+8+16"), "got: {output}");
    }
}
