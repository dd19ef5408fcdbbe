//! In-process PIF emulator
//!
//! Holds a copy of PIF RAM and a device per channel. A write stores the
//! command buffer; every read executes the stored commands against the
//! devices and copies the result back, so a poll can be repeated without
//! rewriting the buffer.

use tracing::trace;

use super::transport::{Direction, Transport};
use crate::controller::calibration::{AnalogS8, AnalogU8, Triggers};
use crate::controller::mapper::{GcnButtons, N64Buttons};
use crate::error::{JoybusError, Result};
use crate::pif::crc::{data_crc, decode_address};
use crate::pif::decoder::{Entry, FrameCursor};
use crate::pif::protocol::*;
use crate::rumble::pak::{CONT_BLOCK_DETECT, CONT_BLOCK_RUMBLE};

/// Accessory plugged into an emulated N64 controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VirtualPak {
    #[default]
    None,
    /// Rumble pak; `probe` is the last byte written to the detect block
    Rumble { probe: u8, motor: bool },
    /// Memory pak that reads back zeros
    Memory,
}

/// GameCube controller state, in raw (uncentered) units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualGcnInput {
    pub buttons: GcnButtons,
    pub stick: AnalogU8,
    pub c_stick: AnalogU8,
    pub trig: Triggers,
}

impl Default for VirtualGcnInput {
    fn default() -> Self {
        let center = AnalogU8 { x: 0x80, y: 0x80 };
        Self {
            buttons: GcnButtons::empty(),
            stick: center,
            c_stick: center,
            trig: Triggers::default(),
        }
    }
}

/// Device attached to one emulated channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VirtualDevice {
    #[default]
    None,
    N64 {
        buttons: N64Buttons,
        stick: AnalogS8,
        pak: VirtualPak,
    },
    Gcn {
        input: VirtualGcnInput,
        /// Rumble byte from the last poll
        rumble: u8,
        /// Analog mode from the last short poll
        mode: u8,
    },
}

impl VirtualDevice {
    pub fn n64(pak: VirtualPak) -> Self {
        VirtualDevice::N64 {
            buttons: N64Buttons::empty(),
            stick: AnalogS8::default(),
            pak,
        }
    }

    pub fn gcn() -> Self {
        VirtualDevice::Gcn {
            input: VirtualGcnInput::default(),
            rumble: 0,
            mode: 0,
        }
    }

    /// Answers one command, or `None` when nothing responds.
    fn respond(&mut self, command: u8, send: &[u8]) -> Option<Vec<u8>> {
        match self {
            VirtualDevice::None => None,
            VirtualDevice::N64 { buttons, stick, pak } => match command {
                CONT_CMD_REQUEST_STATUS | CONT_CMD_RESET => {
                    let card = if *pak == VirtualPak::None { 0 } else { CONT_CARD_ON };
                    Some(vec![0x05, 0x00, card])
                }
                CONT_CMD_READ_BUTTON => {
                    let [hi, lo] = buttons.bits().to_be_bytes();
                    Some(vec![hi, lo, stick.x as u8, stick.y as u8])
                }
                CONT_CMD_READ_MEMPAK => {
                    let block = decode_address([*send.get(1)?, *send.get(2)?]);
                    Some(pak_read(pak, block))
                }
                CONT_CMD_WRITE_MEMPAK => {
                    let block = decode_address([*send.get(1)?, *send.get(2)?]);
                    let data: &[u8; BLOCK_SIZE] = send.get(3..3 + BLOCK_SIZE)?.try_into().ok()?;
                    Some(vec![pak_write(pak, block, data)])
                }
                _ => None,
            },
            VirtualDevice::Gcn { input, rumble, mode } => match command {
                CONT_CMD_REQUEST_STATUS | CONT_CMD_RESET => Some(vec![0x09, 0x00, 0x00]),
                CONT_CMD_GCN_SHORT_POLL => {
                    *mode = *send.get(1)?;
                    *rumble = *send.get(2)?;
                    Some(pack_short_poll(input, *mode))
                }
                CONT_CMD_GCN_LONG_POLL => {
                    *rumble = *send.get(2)?;
                    let mut recv = pack_short_poll(input, 3);
                    recv.extend_from_slice(&[0, 0]);
                    Some(recv)
                }
                _ => None,
            },
        }
    }
}

fn pak_read(pak: &VirtualPak, block: u16) -> Vec<u8> {
    let fill = match pak {
        VirtualPak::Rumble { probe, .. } if block == CONT_BLOCK_DETECT && *probe == 0x80 => 0x80,
        _ => 0x00,
    };
    let data = [fill; BLOCK_SIZE];
    let crc = match pak {
        // Empty slot: the data line floats and the checksum never matches
        VirtualPak::None => 0xFF,
        _ => data_crc(&data),
    };

    let mut recv = data.to_vec();
    recv.push(crc);
    recv
}

fn pak_write(pak: &mut VirtualPak, block: u16, data: &[u8; BLOCK_SIZE]) -> u8 {
    match pak {
        VirtualPak::None => return 0xFF,
        VirtualPak::Rumble { probe, motor } => {
            if block == CONT_BLOCK_DETECT {
                *probe = data[BLOCK_SIZE - 1];
            } else if block == CONT_BLOCK_RUMBLE {
                *motor = data[0] & 0x01 != 0;
            }
        }
        VirtualPak::Memory => {}
    }
    data_crc(data)
}

fn pack_nibbles(hi: u8, lo: u8) -> u8 {
    (hi & 0xF0) | (lo >> 4)
}

fn pack_short_poll(input: &VirtualGcnInput, mode: u8) -> Vec<u8> {
    let [b0, b1] = input.buttons.bits().to_be_bytes();
    let (c, t) = (input.c_stick, input.trig);

    let tail = match mode {
        1 => [pack_nibbles(c.x, c.y), t.l, t.r, 0],
        2 => [pack_nibbles(c.x, c.y), pack_nibbles(t.l, t.r), 0, 0],
        3 => [c.x, c.y, t.l, t.r],
        4 => [c.x, c.y, 0, 0],
        _ => [c.x, c.y, pack_nibbles(t.l, t.r), 0],
    };

    let mut recv = vec![b0, b1, input.stick.x, input.stick.y];
    recv.extend_from_slice(&tail);
    recv
}

/// Emulated PIF with up to four attached devices
#[derive(Debug, Default)]
pub struct VirtualPif {
    ram: PifFrame,
    devices: [VirtualDevice; MAX_CONTROLLERS],
    held: bool,
    transfers: usize,
    failing_reads: usize,
}

impl VirtualPif {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_device(mut self, channel: usize, device: VirtualDevice) -> Self {
        self.set_device(channel, device);
        self
    }

    /// Plugs `device` into `channel`; out-of-range channels are ignored.
    pub fn set_device(&mut self, channel: usize, device: VirtualDevice) {
        if let Some(slot) = self.devices.get_mut(channel) {
            *slot = device;
        }
    }

    pub fn device(&self, channel: usize) -> Option<&VirtualDevice> {
        self.devices.get(channel)
    }

    pub fn device_mut(&mut self, channel: usize) -> Option<&mut VirtualDevice> {
        self.devices.get_mut(channel)
    }

    /// Number of DMA transfers started so far
    pub fn transfers(&self) -> usize {
        self.transfers
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Makes the next `count` reads fail after the PIF has executed the
    /// stored command buffer, as a dropped link would.
    pub fn fail_next_reads(&mut self, count: usize) {
        self.failing_reads = count;
    }

    /// Whether the motor on `channel` is currently running
    pub fn motor_running(&self, channel: usize) -> bool {
        match self.devices.get(channel) {
            Some(VirtualDevice::N64 {
                pak: VirtualPak::Rumble { motor, .. },
                ..
            }) => *motor,
            Some(VirtualDevice::Gcn { rumble, .. }) => *rumble & 0x01 != 0,
            _ => false,
        }
    }

    /// Runs every record in stored RAM against the attached devices.
    fn execute(&mut self) {
        let records: Vec<(usize, usize)> = FrameCursor::new(&self.ram)
            .map_while(|entry| entry.ok())
            .filter_map(|entry| match entry {
                Entry::Record(record) => Some((record.offset, record.channel)),
                _ => None,
            })
            .collect();

        for (offset, channel) in records {
            let ram = self.ram.as_bytes_mut();
            let tx = ram[offset] as usize;
            let rx = (ram[offset + 1] & CHNL_SIZE_MASK) as usize;
            let command = ram[offset + 2];
            let send = ram[offset + 2..offset + 2 + tx].to_vec();

            ram[offset + 1] &= CHNL_SIZE_MASK;
            let response = self
                .devices
                .get_mut(channel)
                .and_then(|device| device.respond(command, &send));

            let ram = self.ram.as_bytes_mut();
            match response {
                None => ram[offset + 1] |= CHNL_ERR_NORESP,
                Some(recv) => {
                    if recv.len() != rx {
                        ram[offset + 1] |= CHNL_ERR_OVERRUN;
                    }
                    let len = recv.len().min(rx);
                    let at = offset + 2 + tx;
                    ram[at..at + len].copy_from_slice(&recv[..len]);
                }
            }
            trace!("Channel {} command 0x{:02X} rx 0x{:02X}", channel, command, ram[offset + 1]);
        }
    }
}

impl Transport for VirtualPif {
    fn acquire(&mut self) -> Result<()> {
        if self.held {
            return Err(JoybusError::Transport("Bus already held".to_string()));
        }
        self.held = true;
        Ok(())
    }

    fn release(&mut self) {
        self.held = false;
    }

    fn start_dma(&mut self, direction: Direction, frame: &mut PifFrame) -> Result<()> {
        if !self.held {
            return Err(JoybusError::Transport("DMA started without bus access".to_string()));
        }

        self.transfers += 1;
        match direction {
            Direction::Write => self.ram = frame.clone(),
            Direction::Read => {
                self.execute();
                if self.failing_reads > 0 {
                    self.failing_reads -= 1;
                    return Err(JoybusError::Transport("Injected read failure".to_string()));
                }
                *frame = self.ram.clone();
            }
        }
        Ok(())
    }

    fn wait_complete(&mut self) -> Result<()> {
        Ok(())
    }
}
