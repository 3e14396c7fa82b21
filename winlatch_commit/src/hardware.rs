// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display controller abstraction.
//!
//! [`DisplayHardware`] is the only way the commit worker touches the device.
//! Register writes go to the shadow set and take effect once the worker
//! requests a shadow update and the hardware latches it at the next vertical
//! sync. Waits are bounded; each takes the timeout from
//! [`CommitConfig`](crate::CommitConfig) and reports expiry as
//! [`HardwareError::Timeout`].

use std::time::Duration;

use winlatch_core::partial::UpdateRegion;
use winlatch_core::regs::WindowRegs;
use winlatch_core::window::ChannelId;

use crate::error::HardwareError;

/// A display controller with shadowed registers.
///
/// The implementation is moved onto the commit worker thread and only ever
/// called from there.
pub trait DisplayHardware: Send {
    /// Writes the blender registers of one slot.
    fn write_window(&mut self, slot: usize, regs: &WindowRegs);

    /// Programs the DMA channel fetching a slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel rejects the configuration. The
    /// worker then disables the slot for this frame.
    fn configure_channel(&mut self, channel: ChannelId, regs: &WindowRegs)
    -> Result<(), HardwareError>;

    /// Puts a faulted channel back into a known state.
    fn reset_channel(&mut self, channel: ChannelId);

    /// Sets the area of the panel the next frame refreshes.
    ///
    /// # Errors
    ///
    /// Returns an error if the panel rejects the region.
    fn set_update_region(&mut self, region: UpdateRegion) -> Result<(), HardwareError>;

    /// Waits until scanout is between frames.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::Timeout`] on expiry.
    fn wait_line_count_zero(&mut self, timeout: Duration) -> Result<(), HardwareError>;

    /// Waits until `channel` has stopped fetching.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::Timeout`] on expiry.
    fn wait_channel_idle(&mut self, channel: ChannelId, timeout: Duration)
    -> Result<(), HardwareError>;

    /// Switches content protection of one channel.
    fn set_channel_protection(&mut self, channel: ChannelId, protected: bool);

    /// Asks the hardware to latch the shadow registers at the next vsync.
    fn request_shadow_update(&mut self);

    /// Waits until the last requested shadow update has latched.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::Timeout`] on expiry. The worker treats this
    /// as fatal.
    fn wait_shadow_update(&mut self, timeout: Duration) -> Result<(), HardwareError>;

    /// Waits for the next vertical sync.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::Timeout`] on expiry.
    fn wait_vsync(&mut self, timeout: Duration) -> Result<(), HardwareError>;

    /// Powers the controller up.
    ///
    /// # Errors
    ///
    /// Returns an error if the device does not come up.
    fn power_on(&mut self) -> Result<(), HardwareError>;

    /// Powers the controller down.
    fn power_off(&mut self);

    /// Enters the low-power idle state between frames.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition fails.
    fn enter_low_power(&mut self) -> Result<(), HardwareError>;

    /// Leaves the low-power idle state.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition fails.
    fn exit_low_power(&mut self) -> Result<(), HardwareError>;

    /// Human-readable register dump for fatal-error reports.
    fn dump(&self) -> String {
        String::from("<no register dump>")
    }
}
