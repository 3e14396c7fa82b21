// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A display controller that records what it is told.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use winlatch_commit::{DisplayHardware, HardwareError, WaitKind};
use winlatch_core::partial::UpdateRegion;
use winlatch_core::protection::ChannelMask;
use winlatch_core::regs::WindowRegs;
use winlatch_core::window::ChannelId;

use crate::log::{EventLog, SimEvent};

#[derive(Debug, Default)]
struct Device {
    windows: Vec<WindowRegs>,
    update: Option<UpdateRegion>,
    protection: ChannelMask,
    powered: bool,
    low_power: bool,
    shadow_requested: bool,
    // Injected faults.
    failing_channels: ChannelMask,
    stall_shadow: bool,
    stall_vsync: bool,
    fail_power_on: bool,
    vsync_period: Duration,
}

/// Test-side handle to a [`SimHardware`]: fault injection and register
/// inspection.
#[derive(Clone, Debug)]
pub struct SimControl {
    device: Arc<Mutex<Device>>,
}

impl SimControl {
    fn lock(&self) -> MutexGuard<'_, Device> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `channel` reject every configuration until healed.
    pub fn fail_channel(&self, channel: ChannelId) {
        self.lock().failing_channels.insert(channel);
    }

    /// Lets `channel` accept configurations again.
    pub fn heal_channel(&self, channel: ChannelId) {
        self.lock().failing_channels.remove(channel);
    }

    /// Makes shadow updates never latch.
    pub fn stall_shadow(&self, stall: bool) {
        self.lock().stall_shadow = stall;
    }

    /// Makes vsync waits time out.
    pub fn stall_vsync(&self, stall: bool) {
        self.lock().stall_vsync = stall;
    }

    /// Makes the next power-on attempts fail.
    pub fn fail_power_on(&self, fail: bool) {
        self.lock().fail_power_on = fail;
    }

    /// Sleeps this long in every vsync wait.
    pub fn set_vsync_period(&self, period: Duration) {
        self.lock().vsync_period = period;
    }

    /// Last registers written to `slot`.
    #[must_use]
    pub fn window(&self, slot: usize) -> Option<WindowRegs> {
        self.lock().windows.get(slot).cloned()
    }

    /// Last update region written.
    #[must_use]
    pub fn update(&self) -> Option<UpdateRegion> {
        self.lock().update
    }

    /// Channels currently protected.
    #[must_use]
    pub fn protection(&self) -> ChannelMask {
        self.lock().protection
    }

    /// Whether the device is powered.
    #[must_use]
    pub fn is_powered(&self) -> bool {
        self.lock().powered
    }

    /// Whether the device is in low power.
    #[must_use]
    pub fn is_low_power(&self) -> bool {
        self.lock().low_power
    }
}

/// Simulated display controller.
///
/// Every wait returns immediately unless a stall was injected, in which
/// case it fails with a timeout without sleeping.
#[derive(Debug)]
pub struct SimHardware {
    device: Arc<Mutex<Device>>,
    log: EventLog,
}

impl SimHardware {
    /// Creates a powered-down device logging to `log`, and its control
    /// handle.
    #[must_use]
    pub fn new(log: EventLog) -> (Self, SimControl) {
        let device = Arc::new(Mutex::new(Device::default()));
        let control = SimControl {
            device: Arc::clone(&device),
        };
        (Self { device, log }, control)
    }

    fn lock(&self) -> MutexGuard<'_, Device> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DisplayHardware for SimHardware {
    fn write_window(&mut self, slot: usize, regs: &WindowRegs) {
        {
            let mut dev = self.lock();
            if dev.windows.len() <= slot {
                dev.windows.resize(slot + 1, WindowRegs::default());
            }
            dev.windows[slot] = regs.clone();
        }
        self.log.push(SimEvent::WriteWindow {
            slot,
            enabled: regs.is_enabled(),
        });
    }

    fn configure_channel(
        &mut self,
        channel: ChannelId,
        _regs: &WindowRegs,
    ) -> Result<(), HardwareError> {
        let ok = !self.lock().failing_channels.contains(channel);
        self.log.push(SimEvent::ConfigureChannel { channel, ok });
        if ok {
            Ok(())
        } else {
            Err(HardwareError::ChannelConfig {
                channel,
                reason: "injected fault".into(),
            })
        }
    }

    fn reset_channel(&mut self, channel: ChannelId) {
        self.log.push(SimEvent::ResetChannel(channel));
    }

    fn set_update_region(&mut self, region: UpdateRegion) -> Result<(), HardwareError> {
        self.lock().update = Some(region);
        self.log.push(SimEvent::SetUpdate(region));
        Ok(())
    }

    fn wait_line_count_zero(&mut self, _timeout: Duration) -> Result<(), HardwareError> {
        self.log.push(SimEvent::WaitLineCount);
        Ok(())
    }

    fn wait_channel_idle(
        &mut self,
        channel: ChannelId,
        _timeout: Duration,
    ) -> Result<(), HardwareError> {
        self.log.push(SimEvent::WaitChannelIdle(channel));
        Ok(())
    }

    fn set_channel_protection(&mut self, channel: ChannelId, protected: bool) {
        {
            let mut dev = self.lock();
            if protected {
                dev.protection.insert(channel);
            } else {
                dev.protection.remove(channel);
            }
        }
        self.log.push(SimEvent::SetProtection { channel, protected });
    }

    fn request_shadow_update(&mut self) {
        self.lock().shadow_requested = true;
        self.log.push(SimEvent::RequestShadow);
    }

    fn wait_shadow_update(&mut self, timeout: Duration) -> Result<(), HardwareError> {
        let mut dev = self.lock();
        if dev.stall_shadow || !dev.shadow_requested {
            return Err(HardwareError::Timeout {
                wait: WaitKind::ShadowUpdate,
                timeout,
            });
        }
        dev.shadow_requested = false;
        drop(dev);
        self.log.push(SimEvent::ShadowLatched);
        Ok(())
    }

    fn wait_vsync(&mut self, timeout: Duration) -> Result<(), HardwareError> {
        let (stall, period) = {
            let dev = self.lock();
            (dev.stall_vsync, dev.vsync_period)
        };
        if stall {
            return Err(HardwareError::Timeout {
                wait: WaitKind::Vsync,
                timeout,
            });
        }
        if !period.is_zero() {
            thread::sleep(period);
        }
        self.log.push(SimEvent::Vsync);
        Ok(())
    }

    fn power_on(&mut self) -> Result<(), HardwareError> {
        let mut dev = self.lock();
        if dev.fail_power_on {
            return Err(HardwareError::Device("injected power-on failure".into()));
        }
        dev.powered = true;
        dev.low_power = false;
        drop(dev);
        self.log.push(SimEvent::PowerOn);
        Ok(())
    }

    fn power_off(&mut self) {
        {
            let mut dev = self.lock();
            dev.powered = false;
            dev.low_power = false;
            dev.protection = ChannelMask::EMPTY;
            dev.update = None;
        }
        self.log.push(SimEvent::PowerOff);
    }

    fn enter_low_power(&mut self) -> Result<(), HardwareError> {
        self.lock().low_power = true;
        self.log.push(SimEvent::EnterLowPower);
        Ok(())
    }

    fn exit_low_power(&mut self) -> Result<(), HardwareError> {
        self.lock().low_power = false;
        self.log.push(SimEvent::ExitLowPower);
        Ok(())
    }

    fn dump(&self) -> String {
        let dev = self.lock();
        let mut out = format!(
            "powered={} low_power={} update={:?} protection={:?}\n",
            dev.powered, dev.low_power, dev.update, dev.protection
        );
        for (slot, regs) in dev.windows.iter().enumerate() {
            out.push_str(&format!(
                "  win{slot}: enabled={} channel={:?} dst={:?} control={:#010x}\n",
                regs.is_enabled(),
                regs.channel,
                regs.dst,
                regs.control.bits()
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadow_latches_only_after_request() {
        let (mut hw, _control) = SimHardware::new(EventLog::default());
        let timeout = Duration::from_millis(1);
        assert!(hw.wait_shadow_update(timeout).is_err(), "nothing requested");
        hw.request_shadow_update();
        hw.wait_shadow_update(timeout).unwrap();
    }

    #[test]
    fn injected_channel_fault() {
        let log = EventLog::default();
        let (mut hw, control) = SimHardware::new(log.clone());
        control.fail_channel(ChannelId(2));
        let regs = WindowRegs::default();
        assert!(hw.configure_channel(ChannelId(2), &regs).is_err(), "failing");
        hw.configure_channel(ChannelId(1), &regs).unwrap();
        control.heal_channel(ChannelId(2));
        hw.configure_channel(ChannelId(2), &regs).unwrap();
        assert_eq!(
            log.count(|e| matches!(e, SimEvent::ConfigureChannel { ok: false, .. })),
            1
        );
    }

    #[test]
    fn dump_lists_written_slots() {
        let (mut hw, control) = SimHardware::new(EventLog::default());
        hw.power_on().unwrap();
        hw.write_window(1, &WindowRegs::default());
        assert!(control.is_powered(), "powered");
        let dump = hw.dump();
        assert!(dump.contains("win0:"), "{dump}");
        assert!(dump.contains("win1:"), "{dump}");
    }
}
