//! # PIF Response Decoder
//!
//! Walks a command buffer after the transport has executed it. Only the size
//! headers and sentinel bytes are trusted; response payloads are handed out
//! as slices for the device profiles to interpret.

use super::protocol::*;
use crate::error::{JoybusError, Result};

/// One executed command record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    /// Byte offset of the tx header
    pub offset: usize,
    /// Channel the record was addressed to
    pub channel: usize,
    /// Command id (first tx byte)
    pub command: u8,
    pub status: ChannelStatus,
    /// All tx bytes, command id first
    pub send: &'a [u8],
    /// Response bytes, `rx & 0x3F` long
    pub recv: &'a [u8],
}

/// Item produced while walking a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry<'a> {
    /// Skip or reset byte; the channel is consumed without a record
    Skip,
    /// Filler byte
    Nop,
    Record(Record<'a>),
}

/// Iterator over the records of a command buffer
///
/// Stops at the end marker or at the end of the data area. A record whose
/// declared size runs past the data area yields one `CommandBuffer` error and
/// ends the walk.
///
/// # Examples
///
/// ```
/// use joybus_bridge::pif::decoder::{Entry, FrameCursor};
/// use joybus_bridge::pif::protocol::PifFrame;
///
/// let mut ram = [0u8; 64];
/// ram[..8].copy_from_slice(&[0x01, 0x04, 0x01, 0x80, 0x00, 0x10, 0xF0, 0xFE]);
/// let frame = PifFrame::from_bytes(ram);
///
/// let entries: Vec<_> = FrameCursor::new(&frame).collect::<Result<_, _>>().unwrap();
/// assert_eq!(entries.len(), 1);
/// assert!(matches!(entries[0], Entry::Record(r) if r.recv == [0x80, 0x00, 0x10, 0xF0]));
/// ```
#[derive(Debug)]
pub struct FrameCursor<'a> {
    data: &'a [u8],
    pos: usize,
    channel: usize,
    done: bool,
}

impl<'a> FrameCursor<'a> {
    pub fn new(frame: &'a PifFrame) -> Self {
        Self {
            data: frame.data(),
            pos: 0,
            channel: 0,
            done: false,
        }
    }

    /// Current byte offset into the data area
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Number of channels consumed so far
    pub fn channel(&self) -> usize {
        self.channel
    }

    fn fail(&mut self, message: String) -> Option<Result<Entry<'a>>> {
        self.done = true;
        Some(Err(JoybusError::CommandBuffer(message)))
    }
}

impl<'a> Iterator for FrameCursor<'a> {
    type Item = Result<Entry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.data.len() {
            return None;
        }

        let byte = self.data[self.pos];
        match byte {
            PIF_CMD_END => {
                self.done = true;
                None
            }
            PIF_CMD_NOP => {
                self.pos += 1;
                Some(Ok(Entry::Nop))
            }
            PIF_CMD_SKIP_CHNL | PIF_CMD_RESET_CHNL => {
                self.pos += 1;
                self.channel += 1;
                Some(Ok(Entry::Skip))
            }
            tx => {
                let offset = self.pos;
                let Some(&rx) = self.data.get(offset + 1) else {
                    return self.fail(format!("Truncated record header at offset {}", offset));
                };

                let size = record_size(tx, rx);
                if offset + size > self.data.len() {
                    return self.fail(format!(
                        "Record at offset {} declares {} bytes, past the {}-byte data area",
                        offset,
                        size,
                        self.data.len()
                    ));
                }

                let send_end = offset + 2 + tx as usize;
                let record = Record {
                    offset,
                    channel: self.channel,
                    command: self.data[offset + 2],
                    status: ChannelStatus::from_rx(rx),
                    send: &self.data[offset + 2..send_end],
                    recv: &self.data[send_end..offset + size],
                };

                self.pos += size;
                self.channel += 1;
                Some(Ok(Entry::Record(record)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pif::encoder::{encode_status_request, FrameWriter};

    fn frame_with(prefix: &[u8]) -> PifFrame {
        let mut ram = [0u8; PIF_RAM_SIZE];
        ram[..prefix.len()].copy_from_slice(prefix);
        PifFrame::from_bytes(ram)
    }

    fn records(frame: &PifFrame) -> Vec<Record<'_>> {
        FrameCursor::new(frame)
            .filter_map(|entry| match entry.unwrap() {
                Entry::Record(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    // ==================== Sentinels ====================

    #[test]
    fn test_skip_reset_and_nop() {
        let frame = frame_with(&[0x00, 0xFD, 0xFF, 0xFE]);
        let mut cursor = FrameCursor::new(&frame);
        assert_eq!(cursor.next().unwrap().unwrap(), Entry::Skip);
        assert_eq!(cursor.next().unwrap().unwrap(), Entry::Skip);
        assert_eq!(cursor.next().unwrap().unwrap(), Entry::Nop);
        assert!(cursor.next().is_none());
        assert_eq!(cursor.channel(), 2);
        assert_eq!(cursor.pos(), 3);
    }

    #[test]
    fn test_stops_at_end_of_data_area() {
        // No end marker: sixty skip bytes, then control bytes that must be ignored
        let mut ram = [0u8; PIF_RAM_SIZE];
        ram[PIF_RAM_DATA_SIZE..].copy_from_slice(&[0x01, 0x04, 0x01, 0x01]);
        let frame = PifFrame::from_bytes(ram);

        let entries: Vec<_> = FrameCursor::new(&frame).collect();
        assert_eq!(entries.len(), PIF_RAM_DATA_SIZE);
        assert!(entries.iter().all(|e| matches!(e, Ok(Entry::Skip))));
    }

    #[test]
    fn test_end_marker_stops_iteration_for_good() {
        let frame = frame_with(&[0xFE, 0x01, 0x04, 0x01]);
        let mut cursor = FrameCursor::new(&frame);
        assert!(cursor.next().is_none());
        assert!(cursor.next().is_none());
    }

    // ==================== Records ====================

    #[test]
    fn test_record_fields() {
        let frame = frame_with(&[0x00, 0x03, 0x48, 0x40, 0x03, 0x01, 1, 2, 3, 4, 5, 6, 7, 8, 0xFE]);
        let recs = records(&frame);
        assert_eq!(recs.len(), 1);

        let record = recs[0];
        assert_eq!(record.offset, 1);
        assert_eq!(record.channel, 1);
        assert_eq!(record.command, CONT_CMD_GCN_SHORT_POLL);
        assert_eq!(record.status, ChannelStatus::Overrun);
        assert_eq!(record.send, &[0x40, 0x03, 0x01]);
        assert_eq!(record.recv, &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_error_bits_do_not_change_size() {
        let frame = frame_with(&[0x01, 0x84, 0x01, 0, 0, 0, 0, 0x01, 0x04, 0x01, 0, 0, 0, 0, 0xFE]);
        let recs = records(&frame);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].status, ChannelStatus::NoResponse);
        assert_eq!(recs[1].status, ChannelStatus::Success);
        assert_eq!(recs[1].offset, READ_BUTTON_RECORD_SIZE);
        assert_eq!(recs[1].channel, 1);
    }

    #[test]
    fn test_aligned_status_request() {
        let frame = encode_status_request(MAX_CONTROLLERS, CONT_CMD_REQUEST_STATUS).unwrap();
        let recs = records(&frame);
        assert_eq!(recs.len(), MAX_CONTROLLERS);
        for (channel, record) in recs.iter().enumerate() {
            assert_eq!(record.channel, channel);
            assert_eq!(record.offset, channel * REQUEST_STATUS_ALIGNED_SIZE + 1);
            assert_eq!(record.recv.len(), REQUEST_STATUS_RX as usize);
        }
    }

    #[test]
    fn test_writer_output_round_trips() {
        let mut writer = FrameWriter::new();
        writer.skip().unwrap();
        writer.record(CONT_CMD_READ_BUTTON, &[], READ_BUTTON_RX).unwrap();
        writer.record(CONT_CMD_GCN_SHORT_POLL, &[0x03, 0x00], GCN_SHORT_POLL_RX).unwrap();
        let frame = writer.finish();

        let recs = records(&frame);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].channel, 1);
        assert_eq!(recs[1].channel, 2);
        assert_eq!(recs[1].offset, 1 + READ_BUTTON_RECORD_SIZE);
    }

    // ==================== Malformed input ====================

    #[test]
    fn test_overrunning_record_is_error() {
        let mut ram = [0u8; PIF_RAM_SIZE];
        ram[50] = 0x03;
        ram[51] = 0x21;
        let frame = PifFrame::from_bytes(ram);

        let mut cursor = FrameCursor::new(&frame);
        for _ in 0..50 {
            assert!(matches!(cursor.next(), Some(Ok(Entry::Skip))));
        }
        assert!(matches!(cursor.next(), Some(Err(JoybusError::CommandBuffer(_)))));
        assert!(cursor.next().is_none());
    }

    #[test]
    fn test_truncated_header_is_error() {
        let mut ram = [0u8; PIF_RAM_SIZE];
        ram[PIF_RAM_DATA_SIZE - 1] = 0x01;
        let frame = PifFrame::from_bytes(ram);

        let last = FrameCursor::new(&frame).last();
        assert!(matches!(last, Some(Err(JoybusError::CommandBuffer(_)))));
    }
}
