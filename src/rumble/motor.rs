//! Rumble motor control
//!
//! N64 controllers rumble through a pak write to the motor block. GameCube
//! controllers carry the motor state in their poll command, so switching
//! them only updates bus state.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::pak::{self, ACCESSORY_ID_RUMBLE, ACCESSORY_ID_TRANSFER_OFF, CONT_BLOCK_DETECT, CONT_BLOCK_RUMBLE, PAK_WRITE_DATA_OFFSET};
use crate::bus::transport::{BusAccess, Transport};
use crate::bus::BusState;
use crate::controller::profile::DeviceProfile;
use crate::error::{JoybusError, PakError, Result};
use crate::pif::crc::data_crc;
use crate::pif::encoder::encode_pak_write;
use crate::pif::protocol::{ChannelStatus, PifFrame, BLOCK_SIZE};

/// Bits of the motor state an N64 rumble pak understands
pub const MOTOR_MASK_LEGACY: u8 = 0x01;

/// Requested motor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MotorState {
    #[default]
    Stop = 0,
    Start = 1,
    /// Active brake (GameCube only)
    StopHard = 2,
}

impl MotorState {
    /// State as seen by an N64 rumble pak: brake becomes a plain stop.
    pub fn masked_for_pak(self) -> MotorState {
        if self as u8 & MOTOR_MASK_LEGACY != 0 {
            MotorState::Start
        } else {
            MotorState::Stop
        }
    }
}

/// Rumble motor on one controller channel
#[derive(Debug, Clone)]
pub struct Motor {
    channel: usize,
    initialized: bool,
    /// Prebuilt pak write to the motor block (N64 only)
    template: Option<PifFrame>,
}

impl Motor {
    pub fn new(channel: usize) -> Self {
        Self {
            channel,
            initialized: false,
            template: None,
        }
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Probe the accessory and prepare motor writes
    ///
    /// GameCube controllers need no transfer. For N64 controllers the
    /// transfer pak is switched off, then the detect block must read back the
    /// rumble accessory id.
    ///
    /// # Errors
    ///
    /// - `WrongDevice` if a transfer pak or a non-rumble accessory answers
    /// - `CommunicationFault` if the pak is swapped during the probe
    /// - any [`pak::ram_read`] / [`pak::ram_write`] error
    pub fn init<T: Transport + ?Sized>(&mut self, transport: &mut T, bus: &mut BusState) -> Result<()> {
        self.initialized = false;
        self.template = None;

        let port = bus.port(self.channel).ok_or(JoybusError::InvalidChannel(self.channel))?;
        if DeviceProfile::from(port.device_type).rumble_in_poll() {
            info!("Port {}: motor ready (in-poll rumble)", self.channel);
            self.initialized = true;
            return Ok(());
        }

        let channel = self.channel;

        match pak::select_bank(transport, bus, channel, ACCESSORY_ID_TRANSFER_OFF) {
            Err(JoybusError::Pak(PakError::NewPack)) => pak::select_bank(transport, bus, channel, ACCESSORY_ID_RUMBLE)?,
            other => other?,
        }

        let data = pak::ram_read(transport, bus, channel, CONT_BLOCK_DETECT).map_err(new_pack_as_fault)?;
        if data[BLOCK_SIZE - 1] == ACCESSORY_ID_TRANSFER_OFF {
            warn!("Port {}: transfer pak found where a rumble pak was expected", channel);
            return Err(PakError::WrongDevice.into());
        }

        pak::select_bank(transport, bus, channel, ACCESSORY_ID_RUMBLE).map_err(new_pack_as_fault)?;

        let data = pak::ram_read(transport, bus, channel, CONT_BLOCK_DETECT).map_err(new_pack_as_fault)?;
        if data[BLOCK_SIZE - 1] != ACCESSORY_ID_RUMBLE {
            warn!("Port {}: accessory id 0x{:02X} is not a rumble pak", channel, data[BLOCK_SIZE - 1]);
            return Err(PakError::WrongDevice.into());
        }

        self.template = Some(encode_pak_write(channel, CONT_BLOCK_RUMBLE, &[0; BLOCK_SIZE])?);
        self.initialized = true;
        info!("Port {}: rumble pak initialized", channel);
        Ok(())
    }

    /// Switch the motor
    ///
    /// # Errors
    ///
    /// - `NotInitialized` before a successful [`Motor::init`] (no transfer is made)
    /// - `NoPack` when the controller stops answering
    /// - `CommunicationFault` when the pak acknowledges the wrong checksum
    pub fn set<T: Transport + ?Sized>(&mut self, transport: &mut T, bus: &mut BusState, state: MotorState) -> Result<()> {
        if !self.initialized {
            return Err(PakError::NotInitialized.into());
        }

        let port = bus.port_mut(self.channel).ok_or(JoybusError::InvalidChannel(self.channel))?;
        if DeviceProfile::from(port.device_type).rumble_in_poll() {
            port.rumble = state;
            bus.invalidate_poll();
            debug!("Port {}: rumble {:?} queued for next poll", self.channel, state);
            return Ok(());
        }

        let Some(template) = &self.template else {
            return Err(PakError::NotInitialized.into());
        };

        let state = state.masked_for_pak();
        let block = [state as u8; BLOCK_SIZE];
        let mut frame = template.clone();
        let at = self.channel + PAK_WRITE_DATA_OFFSET;
        frame.as_bytes_mut()[at..at + BLOCK_SIZE].copy_from_slice(&block);

        bus.invalidate_poll();
        {
            let mut access = BusAccess::new(transport)?;
            access.exchange(&mut frame)?;
        }

        let record = pak::channel_record(&frame, self.channel)?;
        match record.status {
            ChannelStatus::NoResponse => Err(PakError::NoPack.into()),
            ChannelStatus::Overrun => Err(PakError::CommunicationFault.into()),
            ChannelStatus::Success => {
                let expected = data_crc(&block);
                if record.recv.first() != Some(&expected) {
                    warn!("Port {}: motor write acknowledged with {:02X?}, expected 0x{:02X}", self.channel, record.recv.first(), expected);
                    return Err(PakError::CommunicationFault.into());
                }
                debug!("Port {}: rumble {:?}", self.channel, state);
                Ok(())
            }
        }
    }

    pub fn start<T: Transport + ?Sized>(&mut self, transport: &mut T, bus: &mut BusState) -> Result<()> {
        self.set(transport, bus, MotorState::Start)
    }

    pub fn stop<T: Transport + ?Sized>(&mut self, transport: &mut T, bus: &mut BusState) -> Result<()> {
        self.set(transport, bus, MotorState::Stop)
    }

    pub fn stop_hard<T: Transport + ?Sized>(&mut self, transport: &mut T, bus: &mut BusState) -> Result<()> {
        self.set(transport, bus, MotorState::StopHard)
    }
}

fn new_pack_as_fault(err: JoybusError) -> JoybusError {
    match err {
        JoybusError::Pak(PakError::NewPack) => PakError::CommunicationFault.into(),
        other => other,
    }
}
