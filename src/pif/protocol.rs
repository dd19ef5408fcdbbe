//! # PIF Protocol Constants and Types
//!
//! Core definitions for the joybus command buffer exchanged with the PIF.
//!
//! The buffer is a 64-byte image of PIF RAM. Bytes `0..60` carry one record
//! per channel, byte 63 is the control byte that tells the PIF to execute.

use std::fmt;

/// Size of the PIF RAM image in bytes
pub const PIF_RAM_SIZE: usize = 64;

/// Bytes available for channel records (the rest is control)
pub const PIF_RAM_DATA_SIZE: usize = 60;

/// Offset of the control byte
pub const PIF_STATUS_OFFSET: usize = PIF_RAM_SIZE - 1;

/// Control byte value requesting command execution
pub const PIF_STATUS_EXE: u8 = 0x01;

/// Skip this channel
pub const PIF_CMD_SKIP_CHNL: u8 = 0x00;
/// Reset this channel (consumes a channel like skip)
pub const PIF_CMD_RESET_CHNL: u8 = 0xFD;
/// End of command sequence
pub const PIF_CMD_END: u8 = 0xFE;
/// Filler byte, ignored by the PIF
pub const PIF_CMD_NOP: u8 = 0xFF;

/// Number of physical controller channels
pub const MAX_CONTROLLERS: usize = 4;

/// Request device identifier and status
pub const CONT_CMD_REQUEST_STATUS: u8 = 0x00;
/// Legacy controller button/stick read
pub const CONT_CMD_READ_BUTTON: u8 = 0x01;
/// Controller pak 32-byte block read
pub const CONT_CMD_READ_MEMPAK: u8 = 0x02;
/// Controller pak 32-byte block write
pub const CONT_CMD_WRITE_MEMPAK: u8 = 0x03;
/// GameCube controller short poll
pub const CONT_CMD_GCN_SHORT_POLL: u8 = 0x40;
/// GameCube controller long poll (all axes at full precision)
pub const CONT_CMD_GCN_LONG_POLL: u8 = 0x43;
/// Reset device, answers like a status request
pub const CONT_CMD_RESET: u8 = 0xFF;

/// Transmit/receive sizes per record shape
pub const READ_BUTTON_TX: u8 = 1;
pub const READ_BUTTON_RX: u8 = 4;
pub const GCN_SHORT_POLL_TX: u8 = 3;
pub const GCN_SHORT_POLL_RX: u8 = 8;
pub const GCN_LONG_POLL_TX: u8 = 3;
pub const GCN_LONG_POLL_RX: u8 = 10;
pub const REQUEST_STATUS_TX: u8 = 1;
pub const REQUEST_STATUS_RX: u8 = 3;
pub const READ_MEMPAK_TX: u8 = 3;
pub const READ_MEMPAK_RX: u8 = 33;
pub const WRITE_MEMPAK_TX: u8 = 35;
pub const WRITE_MEMPAK_RX: u8 = 1;

/// Full record sizes (header + tx + rx)
pub const READ_BUTTON_RECORD_SIZE: usize = record_size(READ_BUTTON_TX, READ_BUTTON_RX);
pub const GCN_SHORT_POLL_RECORD_SIZE: usize = record_size(GCN_SHORT_POLL_TX, GCN_SHORT_POLL_RX);
pub const GCN_LONG_POLL_RECORD_SIZE: usize = record_size(GCN_LONG_POLL_TX, GCN_LONG_POLL_RX);

/// Size of an aligned status request (no-op + record + no-op)
pub const REQUEST_STATUS_ALIGNED_SIZE: usize = 1 + record_size(REQUEST_STATUS_TX, REQUEST_STATUS_RX) + 1;

/// Size of an aligned pak read/write (no-op + record)
pub const MEMPAK_ALIGNED_SIZE: usize = 1 + record_size(WRITE_MEMPAK_TX, WRITE_MEMPAK_RX);

/// Mask of the channel error bits in the rx size byte
pub const CHNL_ERR_MASK: u8 = 0xC0;
/// Device did not answer
pub const CHNL_ERR_NORESP: u8 = 0x80;
/// Device answered with more or fewer bytes than requested
pub const CHNL_ERR_OVERRUN: u8 = 0x40;
/// Mask of the rx byte count
pub const CHNL_SIZE_MASK: u8 = 0x3F;

/// Normal legacy controller identifier
pub const CONT_TYPE_NORMAL: u16 = 0x0005;
/// Identifier some emulators report before their input plugin is ready
pub const CONT_TYPE_NULL: u16 = 0xFFFF;
/// Identifier bit set by GameCube-family devices
pub const CONT_CONSOLE_GCN: u16 = 0x0008;

/// Status byte: accessory inserted
pub const CONT_CARD_ON: u8 = 0x01;
/// Status byte: accessory removed since last status
pub const CONT_CARD_PULL: u8 = 0x02;
/// Status byte: last pak address had a CRC error
pub const CONT_ADDR_CRC_ER: u8 = 0x04;

/// Pak data block size
pub const BLOCK_SIZE: usize = 32;

/// Computes the byte size of a command record with the given tx/rx counts.
pub const fn record_size(tx: u8, rx: u8) -> usize {
    2 + tx as usize + (rx & CHNL_SIZE_MASK) as usize
}

/// Transport-reported outcome of one channel record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    #[default]
    Success,
    /// Size mismatch reported by the PIF
    Overrun,
    /// Nothing answered on the channel
    NoResponse,
}

impl ChannelStatus {
    /// Reads the channel status from an rx size byte.
    pub fn from_rx(rx: u8) -> Self {
        match rx & CHNL_ERR_MASK {
            0 => ChannelStatus::Success,
            CHNL_ERR_NORESP => ChannelStatus::NoResponse,
            _ => ChannelStatus::Overrun,
        }
    }

    /// Numeric error code (`(rx & 0xC0) >> 4` convention)
    pub fn code(self) -> u8 {
        match self {
            ChannelStatus::Success => 0,
            ChannelStatus::Overrun => CHNL_ERR_OVERRUN >> 4,
            ChannelStatus::NoResponse => CHNL_ERR_NORESP >> 4,
        }
    }

    pub fn is_success(self) -> bool {
        self == ChannelStatus::Success
    }
}

/// The 64-byte command buffer shared with the transport
#[derive(Clone, PartialEq, Eq)]
pub struct PifFrame {
    ram: [u8; PIF_RAM_SIZE],
}

impl Default for PifFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PifFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PifFrame({:02X?})", &self.ram[..])
    }
}

impl PifFrame {
    /// Creates a zero-filled frame.
    #[must_use]
    pub fn new() -> Self {
        Self { ram: [0; PIF_RAM_SIZE] }
    }

    /// Creates a frame from a raw PIF RAM image.
    #[must_use]
    pub fn from_bytes(ram: [u8; PIF_RAM_SIZE]) -> Self {
        Self { ram }
    }

    pub fn as_bytes(&self) -> &[u8; PIF_RAM_SIZE] {
        &self.ram
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; PIF_RAM_SIZE] {
        &mut self.ram
    }

    /// Record area (without the control bytes)
    pub fn data(&self) -> &[u8] {
        &self.ram[..PIF_RAM_DATA_SIZE]
    }

    pub fn control(&self) -> u8 {
        self.ram[PIF_STATUS_OFFSET]
    }

    pub fn set_control(&mut self, value: u8) {
        self.ram[PIF_STATUS_OFFSET] = value;
    }
}
