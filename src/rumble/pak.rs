//! Controller pak block transfers
//!
//! 32-byte reads and writes to the accessory slot of an N64 controller, plus
//! the single-channel status probe used to explain a failed checksum. Each
//! call overwrites PIF RAM and drops the cached poll command of `bus` before
//! the first transfer.

use tracing::warn;

use crate::bus::status::ContStatus;
use crate::bus::transport::{BusAccess, Transport};
use crate::bus::BusState;
use crate::error::{JoybusError, PakError, Result};
use crate::pif::crc::data_crc;
use crate::pif::decoder::{Entry, FrameCursor, Record};
use crate::pif::encoder::{encode_channel_status_request, encode_pak_read, encode_pak_write};
use crate::pif::protocol::*;

/// Block used to write and read back the accessory id (address 0x8000)
pub const CONT_BLOCK_DETECT: u16 = 0x0400;
/// Block that switches the rumble motor (address 0xC000)
pub const CONT_BLOCK_RUMBLE: u16 = 0x0600;

/// Accessory id of a rumble pak
pub const ACCESSORY_ID_RUMBLE: u8 = 0x80;
/// Probe value that switches a transfer pak off
pub const ACCESSORY_ID_TRANSFER_OFF: u8 = 0xFE;

/// Offset of the data bytes inside an aligned pak write, from the channel's
/// first byte (no-op, tx, rx, command, two address bytes)
pub const PAK_WRITE_DATA_OFFSET: usize = 6;

/// Finds the record addressed to `channel` in an executed frame.
pub(crate) fn channel_record(frame: &PifFrame, channel: usize) -> Result<Record<'_>> {
    for entry in FrameCursor::new(frame) {
        if let Entry::Record(record) = entry? {
            if record.channel == channel {
                return Ok(record);
            }
        }
    }
    Err(JoybusError::CommandBuffer(format!("No record for channel {}", channel)))
}

/// Read the status of a single channel
pub fn probe_status<T: Transport + ?Sized>(transport: &mut T, bus: &mut BusState, channel: usize) -> Result<ContStatus> {
    bus.invalidate_poll();
    let mut access = BusAccess::new(transport)?;
    read_channel_status(&mut access, channel)
}

fn read_channel_status<T: Transport + ?Sized>(access: &mut BusAccess<'_, T>, channel: usize) -> Result<ContStatus> {
    let mut frame = encode_channel_status_request(channel, CONT_CMD_REQUEST_STATUS)?;
    access.exchange(&mut frame)?;
    ContStatus::from_record(&channel_record(&frame, channel)?)
}

/// Works out why a pak transfer came back with a bad checksum.
fn classify_crc_fault<T: Transport + ?Sized>(access: &mut BusAccess<'_, T>, channel: usize) -> Result<PakError> {
    let status = read_channel_status(access, channel)?;
    let ok = status.error.is_success();

    let fault = if ok && status.card_on() && status.address_crc_error() {
        PakError::NewPack
    } else if !ok || !status.card_on() {
        PakError::NoPack
    } else {
        PakError::CommunicationFault
    };

    warn!("Pak checksum mismatch on channel {}: {} (status 0x{:02X})", channel, fault, status.status);
    Ok(fault)
}

/// Read one 32-byte block from the pak on `channel`
///
/// # Errors
///
/// - `NoPack` when the channel reports an error or no card is inserted
/// - `NewPack` when the pak was swapped since the last access
/// - `CommunicationFault` for any other checksum mismatch
pub fn ram_read<T: Transport + ?Sized>(transport: &mut T, bus: &mut BusState, channel: usize, block: u16) -> Result<[u8; BLOCK_SIZE]> {
    bus.invalidate_poll();
    let mut access = BusAccess::new(transport)?;
    let mut frame = encode_pak_read(channel, block)?;
    access.exchange(&mut frame)?;

    let record = channel_record(&frame, channel)?;
    if !record.status.is_success() {
        return Err(PakError::NoPack.into());
    }

    let (data, crc) = match record.recv.split_last() {
        Some((&crc, data)) if data.len() == BLOCK_SIZE => {
            let mut block_data = [0u8; BLOCK_SIZE];
            block_data.copy_from_slice(data);
            (block_data, crc)
        }
        _ => {
            return Err(JoybusError::CommandBuffer(format!(
                "Pak read returned {} bytes",
                record.recv.len()
            )))
        }
    };

    if data_crc(&data) != crc {
        return Err(classify_crc_fault(&mut access, channel)?.into());
    }
    Ok(data)
}

/// Write one 32-byte block to the pak on `channel`
///
/// Errors as for [`ram_read`], checked against the acknowledged checksum.
pub fn ram_write<T: Transport + ?Sized>(
    transport: &mut T,
    bus: &mut BusState,
    channel: usize,
    block: u16,
    data: &[u8; BLOCK_SIZE],
) -> Result<()> {
    bus.invalidate_poll();
    let mut access = BusAccess::new(transport)?;
    let mut frame = encode_pak_write(channel, block, data)?;
    access.exchange(&mut frame)?;

    let record = channel_record(&frame, channel)?;
    if !record.status.is_success() {
        return Err(PakError::NoPack.into());
    }

    if record.recv.first() != Some(&data_crc(data)) {
        return Err(classify_crc_fault(&mut access, channel)?.into());
    }
    Ok(())
}

/// Write `bank` to every byte of the detect block
pub fn select_bank<T: Transport + ?Sized>(transport: &mut T, bus: &mut BusState, channel: usize, bank: u8) -> Result<()> {
    ram_write(transport, bus, channel, CONT_BLOCK_DETECT, &[bank; BLOCK_SIZE])
}
