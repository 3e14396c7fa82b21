// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as tagged little-endian records. [`decode`] reads them back as
//! an iterator of [`RecordedEvent`]. Decoding stops at the first truncated
//! record or unknown tag.

use std::time::Duration;

use winlatch_commit::DeviceState;
use winlatch_commit::WaitKind;
use winlatch_commit::frame::{FrameSeq, FrameStage};
use winlatch_commit::trace::{
    FatalEvent, FrameQueuedEvent, PowerEvent, ProtectionEvent, StageEvent, TraceSink,
    UpdateRegionEvent, WaitTimeoutEvent, WindowFaultEvent,
};
use winlatch_core::geometry::Region;
use winlatch_core::partial::UpdateRegion;
use winlatch_core::protection::ChannelMask;
use winlatch_core::window::ChannelId;

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_FRAME_QUEUED: u8 = 1;
const TAG_STAGE: u8 = 2;
const TAG_WAIT_TIMEOUT: u8 = 3;
const TAG_WINDOW_FAULT: u8 = 4;
const TAG_PROTECTION: u8 = 5;
const TAG_UPDATE_REGION: u8 = 6;
const TAG_FATAL: u8 = 7;
const TAG_POWER: u8 = 8;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_usize(&mut self, v: usize) {
        self.write_u32(u32::try_from(v).unwrap_or(u32::MAX));
    }

    fn write_at(&mut self, at: Duration) {
        self.write_u64(u64::try_from(at.as_nanos()).unwrap_or(u64::MAX));
    }

    fn write_update(&mut self, update: UpdateRegion) {
        match update {
            UpdateRegion::Full => {
                self.write_u8(0);
                self.buf.extend_from_slice(&[0; 16]);
            }
            UpdateRegion::Partial(r) => {
                self.write_u8(1);
                self.write_i32(r.x);
                self.write_i32(r.y);
                self.write_i32(r.w);
                self.write_i32(r.h);
            }
        }
    }

    fn write_stage(&mut self, stage: FrameStage) {
        self.write_u8(match stage {
            FrameStage::Queued => 0,
            FrameStage::Programming => 1,
            FrameStage::Active => 2,
            FrameStage::Retiring => 3,
            FrameStage::Freed => 4,
        });
    }

    fn write_wait(&mut self, wait: WaitKind) {
        self.write_u8(match wait {
            WaitKind::AcquireFence => 0,
            WaitKind::Vsync => 1,
            WaitKind::ShadowUpdate => 2,
            WaitKind::LineCount => 3,
            WaitKind::ChannelIdle => 4,
        });
    }

    fn write_device(&mut self, state: DeviceState) {
        self.write_u8(match state {
            DeviceState::Off => 0,
            DeviceState::Init => 1,
            DeviceState::On => 2,
            DeviceState::LowPowerEntering => 3,
            DeviceState::LowPower => 4,
            DeviceState::LowPowerExiting => 5,
            DeviceState::Disabling => 6,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_frame_queued(&mut self, e: &FrameQueuedEvent) {
        self.write_u8(TAG_FRAME_QUEUED);
        self.write_u64(e.seq.0);
        self.write_usize(e.enabled);
        self.write_update(e.update);
        self.write_u64(e.bandwidth);
        self.write_at(e.at);
    }

    fn on_stage(&mut self, e: &StageEvent) {
        self.write_u8(TAG_STAGE);
        self.write_u64(e.seq.0);
        self.write_stage(e.stage);
        self.write_at(e.at);
    }

    fn on_wait_timeout(&mut self, e: &WaitTimeoutEvent) {
        self.write_u8(TAG_WAIT_TIMEOUT);
        self.write_u64(e.seq.0);
        self.write_wait(e.wait);
        self.write_at(e.at);
    }

    fn on_window_fault(&mut self, e: &WindowFaultEvent) {
        self.write_u8(TAG_WINDOW_FAULT);
        self.write_u64(e.seq.0);
        self.write_usize(e.slot);
        self.write_u8(e.channel.0);
        self.write_at(e.at);
    }

    fn on_protection(&mut self, e: &ProtectionEvent) {
        self.write_u8(TAG_PROTECTION);
        self.write_u64(e.seq.0);
        self.write_u32(e.changed.bits());
        self.write_u32(e.target.bits());
        self.write_at(e.at);
    }

    fn on_update_region(&mut self, e: &UpdateRegionEvent) {
        self.write_u8(TAG_UPDATE_REGION);
        self.write_u64(e.seq.0);
        self.write_update(e.update);
        self.write_at(e.at);
    }

    fn on_fatal(&mut self, e: &FatalEvent) {
        self.write_u8(TAG_FATAL);
        self.write_u64(e.seq.0);
        self.write_wait(e.wait);
        self.write_at(e.at);
    }

    fn on_power(&mut self, e: &PowerEvent) {
        self.write_u8(TAG_POWER);
        self.write_device(e.state);
        self.write_at(e.at);
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// A decoded trace event.
#[derive(Clone, Copy, Debug)]
pub enum RecordedEvent {
    /// A [`FrameQueuedEvent`].
    FrameQueued(FrameQueuedEvent),
    /// A [`StageEvent`].
    Stage(StageEvent),
    /// A [`WaitTimeoutEvent`].
    WaitTimeout(WaitTimeoutEvent),
    /// A [`WindowFaultEvent`].
    WindowFault(WindowFaultEvent),
    /// A [`ProtectionEvent`].
    Protection(ProtectionEvent),
    /// An [`UpdateRegionEvent`].
    UpdateRegion(UpdateRegionEvent),
    /// A [`FatalEvent`].
    Fatal(FatalEvent),
    /// A [`PowerEvent`].
    Power(PowerEvent),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?;
        self.pos += N;
        bytes.try_into().ok()
    }

    fn read_u8(&mut self) -> Option<u8> {
        let [v] = self.take::<1>()?;
        Some(v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_i32(&mut self) -> Option<i32> {
        self.take().map(i32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_seq(&mut self) -> Option<FrameSeq> {
        self.read_u64().map(FrameSeq)
    }

    fn read_usize(&mut self) -> Option<usize> {
        usize::try_from(self.read_u32()?).ok()
    }

    fn read_at(&mut self) -> Option<Duration> {
        self.read_u64().map(Duration::from_nanos)
    }

    fn read_update(&mut self) -> Option<UpdateRegion> {
        let present = self.read_u8()?;
        let region = Region::new(
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
        );
        Some(if present != 0 {
            UpdateRegion::Partial(region)
        } else {
            UpdateRegion::Full
        })
    }

    fn read_stage(&mut self) -> Option<FrameStage> {
        Some(match self.read_u8()? {
            0 => FrameStage::Queued,
            1 => FrameStage::Programming,
            2 => FrameStage::Active,
            3 => FrameStage::Retiring,
            _ => FrameStage::Freed,
        })
    }

    fn read_wait(&mut self) -> Option<WaitKind> {
        Some(match self.read_u8()? {
            0 => WaitKind::AcquireFence,
            1 => WaitKind::Vsync,
            2 => WaitKind::ShadowUpdate,
            3 => WaitKind::LineCount,
            _ => WaitKind::ChannelIdle,
        })
    }

    fn read_device(&mut self) -> Option<DeviceState> {
        Some(match self.read_u8()? {
            0 => DeviceState::Off,
            1 => DeviceState::Init,
            2 => DeviceState::On,
            3 => DeviceState::LowPowerEntering,
            4 => DeviceState::LowPower,
            5 => DeviceState::LowPowerExiting,
            _ => DeviceState::Disabling,
        })
    }

    fn decode_frame_queued(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameQueued(FrameQueuedEvent {
            seq: self.read_seq()?,
            enabled: self.read_usize()?,
            update: self.read_update()?,
            bandwidth: self.read_u64()?,
            at: self.read_at()?,
        }))
    }

    fn decode_stage(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Stage(StageEvent {
            seq: self.read_seq()?,
            stage: self.read_stage()?,
            at: self.read_at()?,
        }))
    }

    fn decode_wait_timeout(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::WaitTimeout(WaitTimeoutEvent {
            seq: self.read_seq()?,
            wait: self.read_wait()?,
            at: self.read_at()?,
        }))
    }

    fn decode_window_fault(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::WindowFault(WindowFaultEvent {
            seq: self.read_seq()?,
            slot: self.read_usize()?,
            channel: ChannelId(self.read_u8()?),
            at: self.read_at()?,
        }))
    }

    fn decode_protection(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Protection(ProtectionEvent {
            seq: self.read_seq()?,
            changed: ChannelMask::from_bits(self.read_u32()?),
            target: ChannelMask::from_bits(self.read_u32()?),
            at: self.read_at()?,
        }))
    }

    fn decode_update_region(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::UpdateRegion(UpdateRegionEvent {
            seq: self.read_seq()?,
            update: self.read_update()?,
            at: self.read_at()?,
        }))
    }

    fn decode_fatal(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Fatal(FatalEvent {
            seq: self.read_seq()?,
            wait: self.read_wait()?,
            at: self.read_at()?,
        }))
    }

    fn decode_power(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Power(PowerEvent {
            state: self.read_device()?,
            at: self.read_at()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_u8()? {
            TAG_FRAME_QUEUED => self.decode_frame_queued(),
            TAG_STAGE => self.decode_stage(),
            TAG_WAIT_TIMEOUT => self.decode_wait_timeout(),
            TAG_WINDOW_FAULT => self.decode_window_fault(),
            TAG_PROTECTION => self.decode_protection(),
            TAG_UPDATE_REGION => self.decode_update_region(),
            TAG_FATAL => self.decode_fatal(),
            TAG_POWER => self.decode_power(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_update_survives_recording() {
        let mut rec = RecorderSink::new();
        rec.on_update_region(&UpdateRegionEvent {
            seq: FrameSeq(9),
            update: UpdateRegion::Partial(Region::new(0, 128, 1080, 256)),
            at: Duration::from_micros(1500),
        });
        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1, "one record");
        let RecordedEvent::UpdateRegion(e) = events[0] else {
            panic!("expected an update region event, got {:?}", events[0]);
        };
        assert_eq!(e.seq, FrameSeq(9), "seq");
        assert_eq!(
            e.update,
            UpdateRegion::Partial(Region::new(0, 128, 1080, 256)),
            "region"
        );
        assert_eq!(e.at, Duration::from_micros(1500), "timestamp");
    }

    #[test]
    fn unknown_tag_stops_decoding() {
        let mut rec = RecorderSink::new();
        rec.on_power(&PowerEvent {
            state: DeviceState::LowPower,
            at: Duration::ZERO,
        });
        let mut bytes = rec.into_bytes();
        bytes.push(0xee);
        bytes.extend_from_slice(&[0; 32]);
        let events: Vec<_> = decode(&bytes).collect();
        assert_eq!(events.len(), 1, "decoding stops at the unknown tag");
        assert!(
            matches!(
                events[0],
                RecordedEvent::Power(PowerEvent {
                    state: DeviceState::LowPower,
                    ..
                })
            ),
            "got {:?}",
            events[0]
        );
    }

    #[test]
    fn truncated_record_is_dropped() {
        let mut rec = RecorderSink::new();
        rec.on_fatal(&FatalEvent {
            seq: FrameSeq(3),
            wait: WaitKind::ShadowUpdate,
            at: Duration::ZERO,
        });
        let bytes = rec.into_bytes();
        assert_eq!(decode(&bytes[..bytes.len() - 1]).count(), 0, "truncated");
    }
}
