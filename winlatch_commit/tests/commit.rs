// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end commit scheduling against the simulated backend.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use winlatch_backend_sim::{Sim, SimEvent};
use winlatch_commit::{CommitConfig, CommitError, DeviceState};
use winlatch_core::caps::{HardwareCapabilities, Panel};
use winlatch_core::format::PixelFormat;
use winlatch_core::geometry::{Region, Size};
use winlatch_core::partial::UpdateRegion;
use winlatch_core::resolve::BLANK_COLOR;
use winlatch_core::window::{Blending, BufferHandle, ChannelId, FenceHandle, WindowConfig};

fn full(handle: u64) -> WindowConfig {
    WindowConfig::buffer(
        0,
        ChannelId(0),
        PixelFormat::Xrgb8888,
        Size::new(1080, 1920),
        Region::new(0, 0, 1080, 1920),
        vec![BufferHandle(handle)],
    )
}

fn half(slot: usize, channel: u8, x: i32, handle: u64) -> WindowConfig {
    WindowConfig::buffer(
        slot,
        ChannelId(channel),
        PixelFormat::Xrgb8888,
        Size::new(540, 960),
        Region::new(x, 0, 540, 960),
        vec![BufferHandle(handle)],
    )
}

fn nth(events: &[SimEvent], event: SimEvent, n: usize) -> Option<usize> {
    events
        .iter()
        .enumerate()
        .filter(|(_, e)| **e == event)
        .nth(n)
        .map(|(i, _)| i)
}

// ---- Release ordering ----

#[test]
fn previous_buffers_release_after_next_frame_is_active() {
    let sim = Sim::command_panel().unwrap();
    let (b1, b2, b3) = (BufferHandle(1), BufferHandle(2), BufferHandle(3));

    let f1 = sim.compositor.submit(&[full(1)]).unwrap();
    sim.compositor.force_flush().unwrap();
    assert!(f1.is_signaled(), "F1 active");
    assert!(sim.importer.is_live(b1), "B1 still scanned out");

    let f2 = sim.compositor.submit(&[full(2)]).unwrap();
    sim.compositor.force_flush().unwrap();
    assert!(f2.is_signaled(), "F2 active");
    assert!(!sim.importer.is_live(b1), "B1 released after F2");
    assert!(sim.importer.is_live(b2), "B2 held until F3");

    let events = sim.log.events();
    let f2_latched = nth(&events, SimEvent::ShadowLatched, 1).unwrap();
    let b1_released = nth(&events, SimEvent::Release(b1), 0).unwrap();
    assert!(b1_released > f2_latched, "B1 released only once F2 latched");
    assert_eq!(sim.log.count(|e| *e == SimEvent::Release(b1)), 1);

    sim.compositor.submit(&[full(3)]).unwrap();
    sim.compositor.force_flush().unwrap();
    assert!(!sim.importer.is_live(b2), "B2 released after F3");
    assert!(sim.importer.is_live(b3), "B3 on screen");
    assert_eq!(sim.importer.over_released(), None);
}

#[test]
fn same_buffer_in_consecutive_frames_stays_mapped() {
    let sim = Sim::command_panel().unwrap();
    for _ in 0..3 {
        sim.compositor.submit(&[full(7)]).unwrap();
    }
    sim.compositor.force_flush().unwrap();
    assert!(sim.importer.is_live(BufferHandle(7)), "on screen");
    assert_eq!(sim.importer.live_count(), 1, "only the active frame's mapping");
    assert_eq!(sim.importer.imports() - sim.importer.releases(), 1);
}

#[test]
fn frames_from_many_threads_are_numbered_and_drained() {
    let sim = Arc::new(Sim::command_panel().unwrap());
    let handles: Vec<_> = (0..4_u64)
        .map(|t| {
            let sim = Arc::clone(&sim);
            thread::spawn(move || {
                for i in 0..5 {
                    sim.compositor.submit(&[full(100 + t * 10 + i)]).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    sim.compositor.force_flush().unwrap();

    let snap = sim.compositor.snapshot();
    assert_eq!(snap.last_seq.0, 20);
    assert_eq!(snap.active, Some(snap.last_seq));
    assert_eq!(snap.queued, 0);
    assert_eq!(sim.log.count(|e| *e == SimEvent::ShadowLatched), 20);
    assert_eq!(sim.importer.live_count(), 1);
}

// ---- Atomic rejection ----

#[test]
fn invalid_submission_has_no_effect() {
    let sim = Sim::command_panel().unwrap();
    let mut base = full(1);
    base.blending = Blending::Premultiplied;

    let err = sim.compositor.submit(&[base, half(1, 1, 0, 2)]).unwrap_err();
    assert!(matches!(err, CommitError::Validation(_)), "got {err:?}");
    sim.compositor.force_flush().unwrap();
    assert_eq!(sim.importer.imports(), 0);
    assert_eq!(sim.compositor.last_seq().0, 0);
    assert_eq!(sim.log.count(|e| matches!(e, SimEvent::WriteWindow { .. })), 0);
}

#[test]
fn failed_import_unwinds_and_queues_nothing() {
    let sim = Sim::command_panel().unwrap();
    sim.importer.fail_handle(BufferHandle(2));

    let err = sim
        .compositor
        .submit(&[half(0, 0, 0, 1), half(1, 1, 540, 2)])
        .unwrap_err();
    assert!(matches!(err, CommitError::BufferImport { slot: 1, .. }), "got {err:?}");
    assert_eq!(sim.importer.imports(), 1, "slot 0 was imported");
    assert_eq!(sim.importer.live_count(), 0, "and unwound");
    assert_eq!(sim.compositor.last_seq().0, 0);
}

#[test]
fn unknown_acquire_fence_is_an_import_error() {
    let sim = Sim::command_panel().unwrap();
    let mut w = full(1);
    w.acquire_fence = Some(FenceHandle(42));
    let err = sim.compositor.submit(&[w]).unwrap_err();
    assert!(matches!(err, CommitError::BufferImport { slot: 0, .. }), "got {err:?}");
    assert_eq!(sim.importer.live_count(), 0);
}

// ---- Worker behavior ----

#[test]
fn channel_fault_disables_window_for_one_frame() {
    let sim = Sim::command_panel().unwrap();
    sim.control.fail_channel(ChannelId(1));

    let fence = sim
        .compositor
        .submit(&[half(0, 0, 0, 1), half(1, 1, 540, 2)])
        .unwrap();
    sim.compositor.force_flush().unwrap();
    assert!(fence.is_signaled(), "frame still committed");
    assert!(sim.control.window(0).unwrap().is_enabled(), "healthy slot shown");
    assert!(!sim.control.window(1).unwrap().is_enabled(), "faulted slot off");
    assert!(sim.compositor.snapshot().errored.contains(ChannelId(1)), "flagged");

    sim.control.heal_channel(ChannelId(1));
    sim.compositor
        .submit(&[half(0, 0, 0, 3), half(1, 1, 540, 4)])
        .unwrap();
    sim.compositor.force_flush().unwrap();
    assert_eq!(sim.log.count(|e| *e == SimEvent::ResetChannel(ChannelId(1))), 1);
    assert!(sim.control.window(1).unwrap().is_enabled(), "back next frame");
    assert!(sim.compositor.snapshot().errored.is_empty(), "cleared");
}

#[test]
fn protection_switches_only_on_change() {
    let sim = Sim::command_panel().unwrap();
    let secure = |handle| {
        let mut w = half(1, 3, 0, handle);
        w.protected = true;
        w
    };
    let ch = ChannelId(3);

    sim.compositor.submit(&[full(1), secure(2)]).unwrap();
    sim.compositor.force_flush().unwrap();
    assert!(sim.control.protection().contains(ch), "protected");
    let events = sim.log.events();
    let idle = nth(&events, SimEvent::WaitChannelIdle(ch), 0).unwrap();
    let on = nth(
        &events,
        SimEvent::SetProtection {
            channel: ch,
            protected: true,
        },
        0,
    )
    .unwrap();
    assert!(idle < on, "channel drained before switching");

    sim.compositor.submit(&[full(3), secure(4)]).unwrap();
    sim.compositor.force_flush().unwrap();
    assert_eq!(
        sim.log.count(|e| matches!(e, SimEvent::SetProtection { .. })),
        1,
        "unchanged mask switches nothing"
    );

    sim.compositor.submit(&[full(5), half(1, 3, 0, 6)]).unwrap();
    sim.compositor.force_flush().unwrap();
    assert!(!sim.control.protection().contains(ch), "unprotected");
    assert_eq!(sim.compositor.snapshot().protection.bits(), 0);
}

#[test]
fn update_region_written_only_when_changed() {
    let sim = Sim::command_panel().unwrap();
    let partial = || [full(1), WindowConfig::update_region(Region::new(0, 0, 128, 128))];
    let set_updates = || sim.log.count(|e| matches!(e, SimEvent::SetUpdate(_)));

    sim.compositor.submit(&partial()).unwrap();
    sim.compositor.force_flush().unwrap();
    assert_eq!(
        sim.control.update(),
        Some(UpdateRegion::Partial(Region::new(0, 0, 128, 128)))
    );
    assert_eq!(set_updates(), 1);

    sim.compositor.submit(&partial()).unwrap();
    sim.compositor.force_flush().unwrap();
    assert_eq!(set_updates(), 1, "same region not rewritten");

    sim.compositor.submit(&[full(2)]).unwrap();
    sim.compositor.force_flush().unwrap();
    assert_eq!(set_updates(), 2);
    assert_eq!(sim.control.update(), Some(UpdateRegion::Full));
}

#[test]
fn empty_frame_shows_blank_fill() {
    let sim = Sim::command_panel().unwrap();
    let fence = sim
        .compositor
        .submit(&[WindowConfig::disabled(0)])
        .unwrap();
    sim.compositor.force_flush().unwrap();
    assert!(fence.is_signaled(), "blank frame committed");
    let base = sim.control.window(0).unwrap();
    assert_eq!(base.color, Some(BLANK_COLOR));
    assert_eq!(base.channel, None);
    assert_eq!(sim.importer.imports(), 0);
}

#[test]
fn acquire_timeout_does_not_block_the_frame() {
    let sim = Sim::start(
        HardwareCapabilities::command_panel(),
        Panel::new(1080, 1920, 60),
        CommitConfig::simulated().with_acquire_timeout(Duration::from_millis(10)),
    )
    .unwrap();
    sim.compositor.power_on().unwrap();
    let never = sim.importer.fence(FenceHandle(1));

    let mut w = full(1);
    w.acquire_fence = Some(FenceHandle(1));
    let release = sim.compositor.submit(&[w]).unwrap();
    sim.compositor.force_flush().unwrap();
    assert!(!never.is_signaled(), "producer never finished");
    assert!(release.is_signaled(), "frame went active anyway");
}

#[test]
fn acquire_fence_is_waited_for() {
    let sim = Sim::command_panel().unwrap();
    let ready = sim.importer.fence(FenceHandle(5));
    let mut w = full(1);
    w.acquire_fence = Some(FenceHandle(5));
    let release = sim.compositor.submit(&[w]).unwrap();

    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        ready.signal();
    });
    assert!(release.wait_timeout(Duration::from_secs(5)), "active after producer");
    producer.join().unwrap();
    assert!(sim.importer.fence(FenceHandle(5)).is_signaled(), "signaled first");
}

// ---- Fatal errors ----

#[test]
fn shadow_timeout_halts_and_keeps_buffers() {
    let mut sim = Sim::command_panel().unwrap();
    sim.control.stall_shadow(true);

    let fence = sim.compositor.submit(&[full(1)]).unwrap();
    assert!(matches!(sim.compositor.force_flush(), Err(CommitError::Halted)), "halted");
    assert!(fence.is_errored(), "completed with an error, never active");
    assert!(sim.compositor.snapshot().halted, "halted flag");
    assert!(sim.importer.is_live(BufferHandle(1)), "hardware may still read it");
    assert!(matches!(sim.compositor.submit(&[full(2)]), Err(CommitError::Halted)), "rejects");

    let importer = Arc::clone(&sim.importer);
    sim = Sim::command_panel().unwrap();
    assert_eq!(importer.live_count(), 0, "released on teardown");
    assert_eq!(sim.compositor.snapshot().device, DeviceState::On);
}

#[test]
fn halt_fails_frames_queued_behind_the_stuck_one() {
    let sim = Sim::command_panel().unwrap();
    sim.control.stall_shadow(true);
    let ready = sim.importer.fence(FenceHandle(1));
    let mut first = full(1);
    first.acquire_fence = Some(FenceHandle(1));

    let stuck = sim.compositor.submit(&[first]).unwrap();
    let behind = sim.compositor.submit(&[full(2)]).unwrap();
    ready.signal();
    assert!(matches!(sim.compositor.force_flush(), Err(CommitError::Halted)), "halted");

    assert!(behind.wait_timeout(Duration::from_secs(5)), "waiters are woken");
    assert!(behind.is_errored(), "never programmed");
    assert!(stuck.is_errored(), "stuck frame failed");
    assert!(!sim.importer.is_live(BufferHandle(2)), "unprogrammed buffer returned");
    assert!(sim.importer.is_live(BufferHandle(1)), "hardware may still read it");
    assert_eq!(sim.log.count(|e| *e == SimEvent::RequestShadow), 1, "one frame programmed");
}

// ---- Device state ----

#[test]
fn off_device_presignals_without_queuing() {
    let sim = Sim::start(
        HardwareCapabilities::command_panel(),
        Panel::new(1080, 1920, 60),
        CommitConfig::simulated(),
    )
    .unwrap();
    let fence = sim.compositor.submit(&[full(1)]).unwrap();
    assert!(fence.is_signaled(), "pre-signaled");
    assert_eq!(sim.importer.imports(), 0);
    assert_eq!(sim.compositor.last_seq().0, 0);

    sim.compositor.power_on().unwrap();
    sim.compositor.set_secure_handoff(true);
    assert!(sim.compositor.submit(&[full(1)]).unwrap().is_signaled(), "handed off");
    assert_eq!(sim.importer.imports(), 0);
    sim.compositor.set_secure_handoff(false);
    sim.compositor.submit(&[full(1)]).unwrap();
    sim.compositor.force_flush().unwrap();
    assert_eq!(sim.importer.imports(), 1);
}

#[test]
fn low_power_is_left_for_the_next_frame() {
    let sim = Sim::command_panel().unwrap();
    sim.compositor.submit(&[full(1)]).unwrap();
    sim.compositor.enter_low_power().unwrap();
    assert_eq!(sim.compositor.snapshot().device, DeviceState::LowPower);
    assert!(sim.control.is_low_power(), "clocks gated");

    sim.compositor.submit(&[full(2)]).unwrap();
    sim.compositor.force_flush().unwrap();
    assert_eq!(sim.compositor.snapshot().device, DeviceState::On);
    let events = sim.log.events();
    let exit = nth(&events, SimEvent::ExitLowPower, 0).unwrap();
    let shadow = nth(&events, SimEvent::RequestShadow, 1).unwrap();
    assert!(exit < shadow, "woken before programming");
}

#[test]
fn power_off_drains_and_releases() {
    let sim = Sim::command_panel().unwrap();
    sim.compositor.submit(&[full(1)]).unwrap();
    sim.compositor.submit(&[full(2)]).unwrap();
    sim.compositor.power_off().unwrap();

    assert_eq!(sim.log.count(|e| *e == SimEvent::ShadowLatched), 2, "queue drained");
    assert_eq!(sim.importer.live_count(), 0);
    assert!(!sim.control.is_powered(), "off");
    let snap = sim.compositor.snapshot();
    assert_eq!(snap.device, DeviceState::Off);
    assert_eq!(snap.active, None);
}

#[test]
fn power_off_while_a_frame_waits_skips_later_submissions() {
    let sim = Arc::new(Sim::command_panel().unwrap());
    let ready = sim.importer.fence(FenceHandle(1));
    let mut first = full(1);
    first.acquire_fence = Some(FenceHandle(1));
    let f1 = sim.compositor.submit(&[first]).unwrap();

    let off = {
        let sim = Arc::clone(&sim);
        thread::spawn(move || sim.compositor.power_off())
    };
    while sim.compositor.snapshot().device == DeviceState::On {
        thread::yield_now();
    }

    let f2 = sim.compositor.submit(&[full(2)]).unwrap();
    assert!(f2.is_signaled(), "pre-signaled once power-off was requested");
    assert!(
        matches!(sim.compositor.power_on(), Err(CommitError::InvalidTransition { .. })),
        "power-off in progress"
    );

    ready.signal();
    off.join().unwrap().unwrap();
    assert!(f1.is_signaled(), "earlier frame drained");
    assert_eq!(sim.compositor.snapshot().device, DeviceState::Off);
    assert_eq!(sim.importer.imports(), 1, "second frame never imported");
    assert_eq!(sim.importer.live_count(), 0, "nothing mapped while off");

    let events = sim.log.events();
    let off_at = nth(&events, SimEvent::PowerOff, 0).unwrap();
    assert!(
        events[off_at..]
            .iter()
            .all(|e| !matches!(e, SimEvent::WriteWindow { .. } | SimEvent::RequestShadow)),
        "hardware programmed after power-off: {:?}",
        &events[off_at..]
    );
}

#[test]
fn power_transitions_are_checked() {
    let sim = Sim::start(
        HardwareCapabilities::command_panel(),
        Panel::new(1080, 1920, 60),
        CommitConfig::simulated(),
    )
    .unwrap();
    assert!(
        matches!(
            sim.compositor.enter_low_power(),
            Err(CommitError::InvalidTransition {
                from: DeviceState::Off,
                to: DeviceState::LowPowerEntering
            })
        ),
        "not powered"
    );

    sim.control.fail_power_on(true);
    assert!(matches!(sim.compositor.power_on(), Err(CommitError::Hardware(_))), "injected");
    assert_eq!(sim.compositor.snapshot().device, DeviceState::Off);

    sim.control.fail_power_on(false);
    sim.compositor.power_on().unwrap();
    assert!(
        matches!(sim.compositor.power_on(), Err(CommitError::InvalidTransition { .. })),
        "already on"
    );
}
