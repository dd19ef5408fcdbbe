//! # PIF Command Encoder
//!
//! Builds outgoing command buffers: input polls, status requests and pak
//! block transfers.

use tracing::debug;

use super::crc::encode_address;
use super::protocol::*;
use crate::bus::PortInfo;
use crate::controller::profile::DeviceProfile;
use crate::error::{JoybusError, Result};

/// Sequential writer over a fresh command buffer
///
/// The buffer starts zero-filled with the execute bit set, so unwritten
/// padding reads as skip bytes rather than as a command. Response areas are
/// pre-filled with no-op bytes.
///
/// # Examples
///
/// ```
/// use joybus_bridge::pif::encoder::FrameWriter;
/// use joybus_bridge::pif::protocol::{CONT_CMD_READ_BUTTON, PIF_CMD_END};
///
/// let mut writer = FrameWriter::new();
/// writer.skip().unwrap();
/// writer.record(CONT_CMD_READ_BUTTON, &[], 4).unwrap();
/// let frame = writer.finish();
/// assert_eq!(&frame.as_bytes()[..9], &[0x00, 0x01, 0x04, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, PIF_CMD_END]);
/// ```
#[derive(Debug)]
pub struct FrameWriter {
    frame: PifFrame,
    pos: usize,
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameWriter {
    #[must_use]
    pub fn new() -> Self {
        let mut frame = PifFrame::new();
        frame.set_control(PIF_STATUS_EXE);
        Self { frame, pos: 0 }
    }

    /// Current write offset
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Fails unless `len` more bytes fit while leaving room for the end marker.
    fn reserve(&self, len: usize) -> Result<()> {
        if self.pos + len >= PIF_RAM_DATA_SIZE {
            return Err(JoybusError::CommandBuffer(format!(
                "{} byte record at offset {} does not fit in {} bytes",
                len, self.pos, PIF_RAM_DATA_SIZE
            )));
        }
        Ok(())
    }

    fn push(&mut self, byte: u8) -> Result<()> {
        self.reserve(1)?;
        self.frame.as_bytes_mut()[self.pos] = byte;
        self.pos += 1;
        Ok(())
    }

    /// Emits a skip-channel byte.
    pub fn skip(&mut self) -> Result<()> {
        self.push(PIF_CMD_SKIP_CHNL)
    }

    /// Emits a no-op filler byte.
    pub fn nop(&mut self) -> Result<()> {
        self.push(PIF_CMD_NOP)
    }

    /// Emits a command record: sizes, command id, arguments, then `rx` no-op
    /// bytes for the response.
    pub fn record(&mut self, command: u8, args: &[u8], rx: u8) -> Result<()> {
        let tx = 1 + args.len();
        let rx_len = (rx & CHNL_SIZE_MASK) as usize;
        self.reserve(2 + tx + rx_len)?;

        let pos = self.pos;
        let bytes = self.frame.as_bytes_mut();
        bytes[pos] = tx as u8;
        bytes[pos + 1] = rx;
        bytes[pos + 2] = command;
        bytes[pos + 3..pos + 2 + tx].copy_from_slice(args);
        bytes[pos + 2 + tx..pos + 2 + tx + rx_len].fill(PIF_CMD_NOP);

        self.pos += 2 + tx + rx_len;
        Ok(())
    }

    /// Writes the end marker and returns the frame.
    #[must_use]
    pub fn finish(mut self) -> PifFrame {
        // reserve() always keeps one byte free
        self.frame.as_bytes_mut()[self.pos] = PIF_CMD_END;
        self.frame
    }
}

/// Build the input poll frame for every channel
///
/// A channel gets a record only when it is plugged and either a status scan
/// is running or a player is assigned to it. Everything else gets a skip byte.
///
/// # Arguments
///
/// * `ports` - Per-channel port info, in channel order
/// * `status_polling` - Whether unassigned ports should be polled too
/// * `analog_mode` - Analog mode sent with GameCube short polls
pub fn encode_poll_frame(ports: &[PortInfo], status_polling: bool, analog_mode: u8) -> Result<PifFrame> {
    let mut writer = FrameWriter::new();

    for port in ports {
        if port.plugged && (status_polling || port.player.is_some()) {
            DeviceProfile::from(port.device_type).write_poll_record(&mut writer, port.rumble as u8, analog_mode)?;
        } else {
            writer.skip()?;
        }
    }

    debug!("Packed poll frame for {} channels ({} bytes)", ports.len(), writer.pos());
    Ok(writer.finish())
}

/// Build a status (or reset) request for the first `channels` channels
///
/// Each channel gets an aligned request: no-op, record, no-op.
pub fn encode_status_request(channels: usize, command: u8) -> Result<PifFrame> {
    let mut writer = FrameWriter::new();

    for _ in 0..channels {
        write_status_record(&mut writer, command)?;
    }

    Ok(writer.finish())
}

/// Build a status request addressed to a single channel
pub fn encode_channel_status_request(channel: usize, command: u8) -> Result<PifFrame> {
    let mut writer = FrameWriter::new();

    for _ in 0..channel {
        writer.skip()?;
    }
    write_status_record(&mut writer, command)?;

    Ok(writer.finish())
}

fn write_status_record(writer: &mut FrameWriter, command: u8) -> Result<()> {
    writer.nop()?;
    writer.record(command, &[], REQUEST_STATUS_RX)?;
    writer.nop()
}

/// Build a 32-byte pak block read for one channel
pub fn encode_pak_read(channel: usize, block: u16) -> Result<PifFrame> {
    let mut writer = FrameWriter::new();

    for _ in 0..channel {
        writer.skip()?;
    }
    writer.nop()?;
    writer.record(CONT_CMD_READ_MEMPAK, &encode_address(block), READ_MEMPAK_RX)?;

    Ok(writer.finish())
}

/// Build a 32-byte pak block write for one channel
pub fn encode_pak_write(channel: usize, block: u16, data: &[u8; BLOCK_SIZE]) -> Result<PifFrame> {
    let mut writer = FrameWriter::new();

    for _ in 0..channel {
        writer.skip()?;
    }

    let mut args = [0u8; 2 + BLOCK_SIZE];
    args[..2].copy_from_slice(&encode_address(block));
    args[2..].copy_from_slice(data);

    writer.nop()?;
    writer.record(CONT_CMD_WRITE_MEMPAK, &args, WRITE_MEMPAK_RX)?;

    Ok(writer.finish())
}
