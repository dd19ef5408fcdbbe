//! Controller status scan
//!
//! Sends an aligned status (or reset) request to every channel and records
//! which ports answered and what kind of device is on them.

use serde::Serialize;
use tracing::{debug, info};

use super::transport::{BusAccess, Transport};
use super::BusState;
use crate::controller::profile::DeviceType;
use crate::error::{JoybusError, Result};
use crate::pif::decoder::{Entry, FrameCursor, Record};
use crate::pif::encoder::encode_status_request;
use crate::pif::protocol::*;

/// One channel's answer to a status request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ContStatus {
    /// Byte-swapped device identifier, as reported
    pub identifier: u16,
    /// Accessory status bits (`CONT_CARD_ON` and friends)
    pub status: u8,
    pub error: ChannelStatus,
}

impl ContStatus {
    /// Reads a status response record.
    ///
    /// Identifier and status bits are only filled in on success.
    pub fn from_record(record: &Record<'_>) -> Result<Self> {
        let mut status = ContStatus {
            error: record.status,
            ..ContStatus::default()
        };
        if !record.status.is_success() {
            return Ok(status);
        }

        let [typeh, typel, bits] = *<&[u8; 3]>::try_from(record.recv).map_err(|_| {
            JoybusError::CommandBuffer(format!(
                "Status response at offset {} is {} bytes",
                record.offset,
                record.recv.len()
            ))
        })?;
        status.identifier = u16::from(typel) << 8 | u16::from(typeh);
        status.status = bits;
        Ok(status)
    }

    pub fn card_on(&self) -> bool {
        self.status & CONT_CARD_ON != 0
    }

    pub fn address_crc_error(&self) -> bool {
        self.status & CONT_ADDR_CRC_ER != 0
    }
}

/// Result of a full status scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusReport {
    /// Bit `n` set when channel `n` answered
    pub bitpattern: u8,
    pub statuses: [ContStatus; MAX_CONTROLLERS],
}

impl StatusReport {
    pub fn is_plugged(&self, channel: usize) -> bool {
        channel < MAX_CONTROLLERS && self.bitpattern & (1 << channel) != 0
    }
}

/// Decode an executed status request into `bus`
///
/// Ports that answered are marked plugged and get their device type set.
/// The null identifier is stored as a normal N64 controller. Ports that did
/// not answer are left untouched.
pub fn decode_status_response(frame: &PifFrame, bus: &mut BusState) -> Result<StatusReport> {
    let mut report = StatusReport::default();

    for entry in FrameCursor::new(frame) {
        let Entry::Record(record) = entry? else {
            continue;
        };
        if record.channel >= bus.max_controllers() {
            break;
        }

        let status = ContStatus::from_record(&record)?;
        report.statuses[record.channel] = status;

        if status.error.is_success() {
            let identifier = if status.identifier == CONT_TYPE_NULL {
                CONT_TYPE_NORMAL
            } else {
                status.identifier
            };

            if let Some(port) = bus.port_mut(record.channel) {
                port.type_raw = identifier;
                port.device_type = DeviceType::from_identifier(identifier);
                port.plugged = true;
            }
            report.bitpattern |= 1 << record.channel;
        }
    }

    Ok(report)
}

/// Run a status scan over every active channel
///
/// `command` is either `CONT_CMD_REQUEST_STATUS` or `CONT_CMD_RESET`.
pub fn query_status<T: Transport + ?Sized>(transport: &mut T, bus: &mut BusState, command: u8) -> Result<StatusReport> {
    // PIF RAM stops holding the poll as soon as the write lands
    bus.invalidate_poll();

    let mut frame = encode_status_request(bus.max_controllers(), command)?;
    {
        let mut access = BusAccess::new(transport)?;
        access.exchange(&mut frame)?;
    }

    let report = decode_status_response(&frame, bus)?;
    info!("Status scan: bitpattern 0b{:04b}", report.bitpattern);
    for (channel, port) in bus.ports().iter().enumerate().filter(|(_, p)| p.plugged) {
        debug!("  Port {}: {:?} (0x{:04X})", channel, port.device_type, port.type_raw);
    }

    Ok(report)
}
