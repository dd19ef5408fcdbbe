//! # Device Profiles
//!
//! The two controller families differ in poll record shape, response decoding
//! and rumble path. Each port picks one [`DeviceProfile`] from its device type
//! and every family-specific decision goes through it.

use serde::Serialize;
use tracing::debug;

use super::calibration::{unpack_long_poll, unpack_short_poll};
use super::mapper::{ControllerPad, RemapThresholds};
use crate::error::{JoybusError, Result};
use crate::pif::decoder::Record;
use crate::pif::encoder::FrameWriter;
use crate::pif::protocol::*;

/// Device family reported by a status scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Nothing identified on this port yet.
    #[default]
    Unassigned,
    /// N64 controller (digital buttons, one stick, pak slot).
    LegacyDigital,
    /// GameCube controller (two sticks, analog triggers, built-in motor).
    RichAnalog,
}

impl DeviceType {
    /// Classifies a (byte-swapped) device identifier.
    ///
    /// The null identifier is treated as a normal N64 controller.
    pub fn from_identifier(identifier: u16) -> Self {
        if identifier == CONT_TYPE_NULL {
            DeviceType::LegacyDigital
        } else if identifier & CONT_CONSOLE_GCN != 0 {
            DeviceType::RichAnalog
        } else {
            DeviceType::LegacyDigital
        }
    }
}

/// Per-family strategy for framing, decoding and rumble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceProfile {
    Legacy,
    RichAnalog,
}

impl From<DeviceType> for DeviceProfile {
    fn from(device_type: DeviceType) -> Self {
        match device_type {
            DeviceType::RichAnalog => DeviceProfile::RichAnalog,
            DeviceType::LegacyDigital | DeviceType::Unassigned => DeviceProfile::Legacy,
        }
    }
}

impl DeviceProfile {
    /// Returns the profile able to decode a response to `command`.
    ///
    /// # Errors
    ///
    /// `UnknownCommand` when no controller family answers `command` in a poll.
    pub fn for_command(command: u8) -> Result<Self> {
        match command {
            CONT_CMD_READ_BUTTON => Ok(DeviceProfile::Legacy),
            CONT_CMD_GCN_SHORT_POLL | CONT_CMD_GCN_LONG_POLL => Ok(DeviceProfile::RichAnalog),
            _ => Err(JoybusError::UnknownCommand(command)),
        }
    }

    /// Whether rumble state rides inside the poll command instead of a pak write.
    pub fn rumble_in_poll(&self) -> bool {
        matches!(self, DeviceProfile::RichAnalog)
    }

    /// Appends this family's input poll record.
    pub fn write_poll_record(&self, writer: &mut FrameWriter, rumble: u8, analog_mode: u8) -> Result<()> {
        match self {
            DeviceProfile::Legacy => writer.record(CONT_CMD_READ_BUTTON, &[], READ_BUTTON_RX),
            DeviceProfile::RichAnalog => writer.record(
                CONT_CMD_GCN_SHORT_POLL,
                &[analog_mode, rumble],
                GCN_SHORT_POLL_RX,
            ),
        }
    }

    /// Decodes one poll record into `pad`.
    ///
    /// Only successful records overwrite pad fields. A failed GameCube record
    /// drops the calibration origin.
    pub fn decode_record(&self, record: &Record<'_>, pad: &mut ControllerPad, thresholds: &RemapThresholds) -> Result<()> {
        match self {
            DeviceProfile::Legacy => {
                if record.status.is_success() {
                    let recv = fixed::<{ READ_BUTTON_RX as usize }>(record)?;
                    pad.apply_legacy(recv);
                }
            }
            DeviceProfile::RichAnalog => {
                if !record.status.is_success() {
                    debug!("Dropping origin after {:?} on GameCube record", record.status);
                    pad.origins.invalidate();
                    return Ok(());
                }

                let input = match record.command {
                    CONT_CMD_GCN_SHORT_POLL => {
                        let mode = record.send.get(1).copied().unwrap_or(0);
                        unpack_short_poll(mode, fixed::<{ GCN_SHORT_POLL_RX as usize }>(record)?)
                    }
                    _ => unpack_long_poll(fixed::<{ GCN_LONG_POLL_RX as usize }>(record)?),
                };
                pad.apply_rich(&input, thresholds);
            }
        }
        Ok(())
    }
}

/// Views a record's response bytes as a fixed-size array.
fn fixed<'a, const N: usize>(record: &Record<'a>) -> Result<&'a [u8; N]> {
    record.recv.try_into().map_err(|_| {
        JoybusError::CommandBuffer(format!(
            "command 0x{:02X} at offset {} returned {} bytes, expected {}",
            record.command,
            record.offset,
            record.recv.len(),
            N
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::calibration::AnalogS8;
    use crate::controller::mapper::N64Buttons;
    use crate::pif::decoder::{Entry, FrameCursor};
    use crate::pif::protocol::PifFrame;

    fn single_record(profile: DeviceProfile, rumble: u8, mode: u8, recv: &[u8], rx_flags: u8) -> PifFrame {
        let mut writer = FrameWriter::new();
        profile.write_poll_record(&mut writer, rumble, mode).unwrap();
        let mut frame = writer.finish();
        let bytes = frame.as_bytes_mut();
        let tx = bytes[0] as usize;
        bytes[1] |= rx_flags;
        bytes[2 + tx..2 + tx + recv.len()].copy_from_slice(recv);
        frame
    }

    fn first_record(frame: &PifFrame) -> Record<'_> {
        match FrameCursor::new(frame).next() {
            Some(Ok(Entry::Record(record))) => record,
            other => panic!("expected a record, got {:?}", other),
        }
    }

    #[test]
    fn test_device_type_from_identifier() {
        assert_eq!(DeviceType::from_identifier(0x0005), DeviceType::LegacyDigital);
        assert_eq!(DeviceType::from_identifier(0x0009), DeviceType::RichAnalog);
        assert_eq!(DeviceType::from_identifier(CONT_TYPE_NULL), DeviceType::LegacyDigital);
    }

    #[test]
    fn test_profile_from_device_type() {
        assert_eq!(DeviceProfile::from(DeviceType::RichAnalog), DeviceProfile::RichAnalog);
        assert_eq!(DeviceProfile::from(DeviceType::LegacyDigital), DeviceProfile::Legacy);
        assert_eq!(DeviceProfile::from(DeviceType::Unassigned), DeviceProfile::Legacy);
    }

    #[test]
    fn test_profile_for_command() {
        assert_eq!(DeviceProfile::for_command(CONT_CMD_READ_BUTTON).unwrap(), DeviceProfile::Legacy);
        assert_eq!(DeviceProfile::for_command(CONT_CMD_GCN_SHORT_POLL).unwrap(), DeviceProfile::RichAnalog);
        assert_eq!(DeviceProfile::for_command(CONT_CMD_GCN_LONG_POLL).unwrap(), DeviceProfile::RichAnalog);
        assert!(matches!(
            DeviceProfile::for_command(CONT_CMD_READ_MEMPAK),
            Err(JoybusError::UnknownCommand(CONT_CMD_READ_MEMPAK))
        ));
    }

    #[test]
    fn test_legacy_record_shape() {
        let frame = single_record(DeviceProfile::Legacy, 0, 3, &[], 0);
        assert_eq!(&frame.as_bytes()[..8], &[0x01, 0x04, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, PIF_CMD_END]);
    }

    #[test]
    fn test_rich_record_carries_mode_and_rumble() {
        let frame = single_record(DeviceProfile::RichAnalog, 1, 3, &[], 0);
        assert_eq!(&frame.as_bytes()[..5], &[0x03, 0x08, 0x40, 0x03, 0x01]);
        assert_eq!(frame.as_bytes()[13], PIF_CMD_END);
    }

    #[test]
    fn test_decode_legacy_success() {
        let frame = single_record(DeviceProfile::Legacy, 0, 0, &[0x80, 0x00, 0x10, 0xF0], 0);
        let mut pad = ControllerPad::default();
        DeviceProfile::Legacy
            .decode_record(&first_record(&frame), &mut pad, &RemapThresholds::default())
            .unwrap();
        assert_eq!(pad.button, N64Buttons::A);
        assert_eq!(pad.stick, AnalogS8 { x: 16, y: -16 });
    }

    #[test]
    fn test_decode_rich_uses_mode_from_send_bytes() {
        // Mode 4 sends no trigger data, so a full left trigger byte must be ignored
        let recv = [0x00, 0x80, 0x80, 0x80, 0x80, 0x80, 0xFF, 0xFF];
        let frame = single_record(DeviceProfile::RichAnalog, 0, 4, &recv, 0);
        let mut pad = ControllerPad::default();
        DeviceProfile::RichAnalog
            .decode_record(&first_record(&frame), &mut pad, &RemapThresholds::default())
            .unwrap();
        assert!(pad.origins.initialized);
        assert_eq!(pad.origins.trig.l, 0);
        assert!(!pad.button.contains(N64Buttons::Z));
    }

    #[test]
    fn test_decode_rich_failure_drops_origin_only() {
        let frame = single_record(DeviceProfile::RichAnalog, 0, 3, &[], CHNL_ERR_OVERRUN);
        let mut pad = ControllerPad::default();
        pad.origins.initialized = true;
        pad.button = N64Buttons::B;

        DeviceProfile::RichAnalog
            .decode_record(&first_record(&frame), &mut pad, &RemapThresholds::default())
            .unwrap();

        assert!(!pad.origins.initialized);
        assert_eq!(pad.button, N64Buttons::B);
    }

    #[test]
    fn test_decode_wrong_length_is_error() {
        let mut writer = FrameWriter::new();
        writer.record(CONT_CMD_READ_BUTTON, &[], 2).unwrap();
        let frame = writer.finish();
        let mut pad = ControllerPad::default();

        let result = DeviceProfile::Legacy.decode_record(&first_record(&frame), &mut pad, &RemapThresholds::default());
        assert!(matches!(result, Err(JoybusError::CommandBuffer(_))));
    }
}
