//! # Bus Module
//!
//! Owns per-port bus state and drives transfers against a [`Transport`].
//!
//! This module handles:
//! - Port info (device type, plugged flag, player, rumble request)
//! - Status scans and player assignment
//! - The per-frame input poll and its response walk
//! - Emulated and serial-bridge transports
//!
//! [`Transport`]: transport::Transport

use serde::Serialize;
use tracing::debug;

use crate::controller::mapper::{ControllerPad, RemapThresholds};
use crate::controller::profile::DeviceType;
use crate::pif::protocol::MAX_CONTROLLERS;
use crate::rumble::motor::MotorState;

pub mod transport;
pub mod status;
pub mod poll;
pub mod virtual_pif;
pub mod serial;

/// Bus-level state for one controller channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PortInfo {
    pub device_type: DeviceType,
    /// Byte-swapped identifier from the last status scan
    pub type_raw: u16,
    /// Set only by a successful status response
    pub plugged: bool,
    /// Assigned player, if any
    pub player: Option<u8>,
    /// Pending motor state for GameCube controllers
    pub rumble: MotorState,
}

/// Everything the poll loop needs to know about the bus
///
/// # Examples
///
/// ```
/// use joybus_bridge::bus::BusState;
///
/// let mut bus = BusState::new(4);
/// bus.begin_status_polling();
/// assert!(bus.is_status_polling());
/// assert!(bus.ports().iter().all(|p| !p.plugged));
/// ```
#[derive(Debug, Clone)]
pub struct BusState {
    ports: [PortInfo; MAX_CONTROLLERS],
    pads: [ControllerPad; MAX_CONTROLLERS],
    status_polling: bool,
    last_command: Option<u8>,
    max_controllers: usize,
    analog_mode: u8,
    thresholds: RemapThresholds,
}

impl BusState {
    /// Default GameCube analog mode (full-precision C-stick and triggers)
    pub const DEFAULT_ANALOG_MODE: u8 = 3;

    /// Creates state for `max_controllers` channels (capped at four).
    pub fn new(max_controllers: usize) -> Self {
        Self {
            ports: [PortInfo::default(); MAX_CONTROLLERS],
            pads: [ControllerPad::default(); MAX_CONTROLLERS],
            status_polling: false,
            last_command: None,
            max_controllers: max_controllers.clamp(1, MAX_CONTROLLERS),
            analog_mode: Self::DEFAULT_ANALOG_MODE,
            thresholds: RemapThresholds::default(),
        }
    }

    #[must_use]
    pub fn with_analog_mode(mut self, analog_mode: u8) -> Self {
        self.analog_mode = analog_mode;
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: RemapThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn max_controllers(&self) -> usize {
        self.max_controllers
    }

    pub fn analog_mode(&self) -> u8 {
        self.analog_mode
    }

    pub fn thresholds(&self) -> &RemapThresholds {
        &self.thresholds
    }

    /// Port info for the active channels
    pub fn ports(&self) -> &[PortInfo] {
        &self.ports[..self.max_controllers]
    }

    pub fn port(&self, channel: usize) -> Option<&PortInfo> {
        self.ports().get(channel)
    }

    pub fn port_mut(&mut self, channel: usize) -> Option<&mut PortInfo> {
        self.ports[..self.max_controllers].get_mut(channel)
    }

    /// Controller records for the active channels, refreshed by every poll
    pub fn pads(&self) -> &[ControllerPad] {
        &self.pads[..self.max_controllers]
    }

    pub(crate) fn pads_mut(&mut self) -> &mut [ControllerPad] {
        &mut self.pads[..self.max_controllers]
    }

    pub fn is_status_polling(&self) -> bool {
        self.status_polling
    }

    /// Forgets every port and polls all plugged ports until the scan ends.
    pub fn begin_status_polling(&mut self) {
        debug!("Status polling started");
        self.ports = [PortInfo::default(); MAX_CONTROLLERS];
        self.status_polling = true;
        self.invalidate_poll();
    }

    pub fn end_status_polling(&mut self) {
        debug!("Status polling ended");
        self.status_polling = false;
        self.invalidate_poll();
    }

    /// Assigns (or clears) the player for a channel. Returns false if the
    /// channel is out of range.
    pub fn assign_player(&mut self, channel: usize, player: Option<u8>) -> bool {
        let Some(port) = self.port_mut(channel) else {
            return false;
        };
        port.player = player;
        self.invalidate_poll();
        true
    }

    /// Last command left in PIF RAM, if it is still valid
    pub fn last_command(&self) -> Option<u8> {
        self.last_command
    }

    pub(crate) fn set_last_command(&mut self, command: u8) {
        self.last_command = Some(command);
    }

    /// Forces the next poll to rewrite the command buffer.
    pub fn invalidate_poll(&mut self) {
        self.last_command = None;
    }
}

impl Default for BusState {
    fn default() -> Self {
        Self::new(MAX_CONTROLLERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pif::protocol::CONT_CMD_READ_BUTTON;

    #[test]
    fn test_new_caps_channel_count() {
        assert_eq!(BusState::new(9).max_controllers(), MAX_CONTROLLERS);
        assert_eq!(BusState::new(0).max_controllers(), 1);
        assert_eq!(BusState::new(2).ports().len(), 2);
        assert_eq!(BusState::new(2).pads().len(), 2);
    }

    #[test]
    fn test_begin_status_polling_zeroes_ports() {
        let mut bus = BusState::new(4);
        {
            let port = bus.port_mut(1).unwrap();
            port.plugged = true;
            port.player = Some(1);
            port.device_type = DeviceType::RichAnalog;
        }
        bus.set_last_command(CONT_CMD_READ_BUTTON);

        bus.begin_status_polling();

        assert!(bus.is_status_polling());
        assert_eq!(bus.port(1), Some(&PortInfo::default()));
        assert_eq!(bus.last_command(), None);
    }

    #[test]
    fn test_assign_player_invalidates_poll() {
        let mut bus = BusState::new(2);
        bus.set_last_command(CONT_CMD_READ_BUTTON);

        assert!(bus.assign_player(1, Some(2)));
        assert_eq!(bus.port(1).unwrap().player, Some(2));
        assert_eq!(bus.last_command(), None);

        assert!(!bus.assign_player(2, Some(3)));
    }

    #[test]
    fn test_end_status_polling() {
        let mut bus = BusState::default();
        bus.begin_status_polling();
        bus.set_last_command(CONT_CMD_READ_BUTTON);
        bus.end_status_polling();
        assert!(!bus.is_status_polling());
        assert_eq!(bus.last_command(), None);
    }
}
