//! Input poll dispatch
//!
//! Issues the per-frame input poll and walks the executed frame, handing
//! each record to its device profile.

use serde::Serialize;
use tracing::{debug, error, warn};

use super::transport::{BusAccess, RescanTrigger, Transport};
use super::BusState;
use crate::controller::profile::DeviceProfile;
use crate::error::Result;
use crate::pif::decoder::{Entry, FrameCursor};
use crate::pif::encoder::encode_poll_frame;
use crate::pif::protocol::{ChannelStatus, PifFrame, CONT_CMD_READ_BUTTON};

/// How a response walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    /// Reached the end marker
    Complete { decoded: usize },
    /// A polled port stopped answering; a rescan was requested
    Disconnected { port: usize },
    /// A record carried a command no profile decodes
    UnknownCommand { port: usize, command: u8 },
    /// The frame itself could not be walked
    Malformed,
}

/// Walk an executed poll frame into the pads of `bus`
///
/// The first no-response record fires `rescan` once and stops the walk, so
/// later ports keep their previous records.
pub fn decode_poll_response<R: RescanTrigger + ?Sized>(frame: &PifFrame, bus: &mut BusState, rescan: &mut R) -> PollOutcome {
    let thresholds = *bus.thresholds();
    let mut decoded = 0;

    for entry in FrameCursor::new(frame) {
        let record = match entry {
            Ok(Entry::Record(record)) => record,
            Ok(Entry::Skip | Entry::Nop) => continue,
            Err(e) => {
                error!("Poll response walk failed: {}", e);
                return PollOutcome::Malformed;
            }
        };

        let port = record.channel;
        let Some(pad) = bus.pads_mut().get_mut(port) else {
            break;
        };
        pad.errno = record.status;

        if record.status == ChannelStatus::NoResponse {
            warn!("Controller on port {} stopped responding, rescanning", port);
            pad.origins.invalidate();
            rescan.begin_rescan();
            return PollOutcome::Disconnected { port };
        }

        let profile = match DeviceProfile::for_command(record.command) {
            Ok(profile) => profile,
            Err(e) => {
                error!("Port {}: {}", port, e);
                return PollOutcome::UnknownCommand {
                    port,
                    command: record.command,
                };
            }
        };

        if let Err(e) = profile.decode_record(&record, pad, &thresholds) {
            error!("Port {}: {}", port, e);
            return PollOutcome::Malformed;
        }
        decoded += 1;
    }

    PollOutcome::Complete { decoded }
}

/// Poll every assigned port once
///
/// The command buffer is only rewritten when something else has been run on
/// the PIF since the last poll or the port setup changed. Otherwise the PIF
/// re-executes the commands it still holds.
pub fn poll_controllers<T, R>(transport: &mut T, bus: &mut BusState, rescan: &mut R) -> Result<PollOutcome>
where
    T: Transport + ?Sized,
    R: RescanTrigger + ?Sized,
{
    let mut frame = PifFrame::new();
    {
        let mut access = BusAccess::new(transport)?;

        if bus.last_command() != Some(CONT_CMD_READ_BUTTON) {
            frame = encode_poll_frame(bus.ports(), bus.is_status_polling(), bus.analog_mode())?;
            access.write(&mut frame)?;
            bus.set_last_command(CONT_CMD_READ_BUTTON);
        }

        access.read(&mut frame)?;
    }

    let outcome = decode_poll_response(&frame, bus, rescan);
    debug!("Poll: {:?}", outcome);
    Ok(outcome)
}
