//! # Calibration Module
//!
//! Normalizes raw analog samples from GameCube-family controllers.
//!
//! ## Origin
//!
//! The first successful poll of a plug session is taken as the resting
//! position of both sticks and both triggers. Every later sample is reported
//! relative to that origin, so the first sample of a session always centers
//! to zero. The origin is dropped when a poll of that port fails, which makes
//! a reconnected controller capture a fresh one.
//!
//! ## Analog Modes
//!
//! A short poll returns 8 bytes. Buttons and the main stick always take the
//! first 4; the remaining 4 carry the C-stick and triggers at a precision
//! chosen by the analog mode sent with the poll:
//!
//! | Mode | C-stick | Triggers |
//! |------|---------|----------|
//! | 0, 5, 6, 7 | 8-bit | 4-bit |
//! | 1 | 4-bit | 8-bit |
//! | 2 | 4-bit | 4-bit |
//! | 3 | 8-bit | 8-bit |
//! | 4 | 8-bit | not sent |
//!
//! 4-bit values are widened with [`expand_nibble`].
//!
//! ## Usage
//!
//! ```
//! use joybus_bridge::controller::calibration::{center_stick, AnalogU8};
//!
//! let origin = AnalogU8 { x: 0x80, y: 0x7E };
//! let centered = center_stick(AnalogU8 { x: 0x90, y: 0x70 }, origin);
//! assert_eq!((centered.x, centered.y), (16, -14));
//! ```

use serde::Serialize;

use super::mapper::GcnButtons;
use crate::pif::protocol::{GCN_LONG_POLL_RX, GCN_SHORT_POLL_RX};

/// Unsigned 2-axis sample (raw stick data, 0x80 is nominal center)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AnalogU8 {
    pub x: u8,
    pub y: u8,
}

/// Signed 2-axis sample centered on the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AnalogS8 {
    pub x: i8,
    pub y: i8,
}

/// Left/right analog trigger pair (unsigned)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Triggers {
    pub l: u8,
    pub r: u8,
}

/// Calibration origin captured on the first poll of a plug session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Origins {
    pub initialized: bool,
    pub stick: AnalogU8,
    pub c_stick: AnalogU8,
    pub trig: Triggers,
}

impl Origins {
    /// Stores the given samples as the origin unless one is already held.
    ///
    /// Returns `true` when a capture happened.
    pub fn capture_if_first_use(&mut self, stick: AnalogU8, c_stick: AnalogU8, trig: Triggers) -> bool {
        if self.initialized {
            return false;
        }

        // TODO: repoll the origin (0x41) when the controller raises GET_ORIGIN
        self.initialized = true;
        self.stick = stick;
        self.c_stick = c_stick;
        self.trig = trig;
        true
    }

    /// Forgets the origin so the next successful poll captures a new one.
    pub fn invalidate(&mut self) {
        self.initialized = false;
    }
}

/// Raw GameCube report after analog mode unpacking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RichInput {
    pub buttons: GcnButtons,
    pub stick: AnalogU8,
    pub c_stick: AnalogU8,
    pub trig: Triggers,
}

/// Centers a stick sample on its origin.
///
/// The subtraction wraps instead of clamping, matching the device's own
/// signed arithmetic.
#[must_use]
pub fn center_stick(raw: AnalogU8, origin: AnalogU8) -> AnalogS8 {
    AnalogS8 {
        x: raw.x.wrapping_sub(origin.x) as i8,
        y: raw.y.wrapping_sub(origin.y) as i8,
    }
}

/// Centers a trigger sample on its origin, flooring at zero.
#[must_use]
pub fn center_triggers(raw: Triggers, origin: Triggers) -> Triggers {
    Triggers {
        l: raw.l.saturating_sub(origin.l),
        r: raw.r.saturating_sub(origin.r),
    }
}

/// Widens a 4-bit sample to 8 bits by shifting left and replicating.
///
/// | Nibble | Byte |
/// |--------|------|
/// | 0x0 | 0x00 |
/// | 0x1 | 0x11 |
/// | 0x8 | 0x88 |
/// | 0xF | 0xFF |
///
/// Bits above the low nibble are ignored.
#[inline]
#[must_use]
pub fn expand_nibble(nibble: u8) -> u8 {
    let n = nibble & 0x0F;
    (n << 4) | n
}

/// Expands a packed byte holding two 4-bit axes (first axis in the high nibble).
#[must_use]
pub fn expand_nibble_pair(packed: u8) -> (u8, u8) {
    (expand_nibble(packed >> 4), expand_nibble(packed))
}

fn expand_analog(packed: u8) -> AnalogU8 {
    let (x, y) = expand_nibble_pair(packed);
    AnalogU8 { x, y }
}

fn expand_triggers(packed: u8) -> Triggers {
    let (l, r) = expand_nibble_pair(packed);
    Triggers { l, r }
}

/// Unpacks an 8-byte short poll response according to `mode`.
#[must_use]
pub fn unpack_short_poll(mode: u8, recv: &[u8; GCN_SHORT_POLL_RX as usize]) -> RichInput {
    let buttons = GcnButtons::from_bits_retain(u16::from_be_bytes([recv[0], recv[1]]));
    let stick = AnalogU8 { x: recv[2], y: recv[3] };

    let (c_stick, trig) = match mode {
        1 => (expand_analog(recv[4]), Triggers { l: recv[5], r: recv[6] }),
        2 => (expand_analog(recv[4]), expand_triggers(recv[5])),
        3 => (
            AnalogU8 { x: recv[4], y: recv[5] },
            Triggers { l: recv[6], r: recv[7] },
        ),
        4 => (AnalogU8 { x: recv[4], y: recv[5] }, Triggers::default()),
        // Modes 0, 5, 6 and 7 share one layout
        _ => (AnalogU8 { x: recv[4], y: recv[5] }, expand_triggers(recv[6])),
    };

    RichInput {
        buttons,
        stick,
        c_stick,
        trig,
    }
}

/// Unpacks a 10-byte long poll response (every axis at full precision).
#[must_use]
pub fn unpack_long_poll(recv: &[u8; GCN_LONG_POLL_RX as usize]) -> RichInput {
    RichInput {
        buttons: GcnButtons::from_bits_retain(u16::from_be_bytes([recv[0], recv[1]])),
        stick: AnalogU8 { x: recv[2], y: recv[3] },
        c_stick: AnalogU8 { x: recv[4], y: recv[5] },
        trig: Triggers { l: recv[6], r: recv[7] },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Nibble Expansion Tests ====================

    #[test]
    fn test_expand_nibble_table() {
        let expected: [u8; 16] = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77,
            0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF,
        ];
        for (nibble, &byte) in expected.iter().enumerate() {
            assert_eq!(expand_nibble(nibble as u8), byte, "nibble 0x{:X}", nibble);
            // Same input, same output
            assert_eq!(expand_nibble(nibble as u8), expand_nibble(nibble as u8));
        }
    }

    #[test]
    fn test_expand_nibble_ignores_high_bits() {
        assert_eq!(expand_nibble(0xA3), 0x33);
    }

    #[test]
    fn test_expand_nibble_pair_order() {
        assert_eq!(expand_nibble_pair(0x2D), (0x22, 0xDD));
    }

    // ==================== Centering Tests ====================

    #[test]
    fn test_center_stick_at_origin_is_zero() {
        let origin = AnalogU8 { x: 0x83, y: 0x7A };
        assert_eq!(center_stick(origin, origin), AnalogS8 { x: 0, y: 0 });
    }

    #[test]
    fn test_center_stick_signed() {
        let origin = AnalogU8 { x: 0x80, y: 0x80 };
        let centered = center_stick(AnalogU8 { x: 0x30, y: 0xD0 }, origin);
        assert_eq!(centered, AnalogS8 { x: -80, y: 80 });
    }

    #[test]
    fn test_center_triggers_floors_at_zero() {
        let origin = Triggers { l: 0x20, r: 0x18 };
        let centered = center_triggers(Triggers { l: 0x10, r: 0x80 }, origin);
        assert_eq!(centered, Triggers { l: 0, r: 0x68 });
    }

    // ==================== Origin Tests ====================

    #[test]
    fn test_origin_captured_once() {
        let mut origins = Origins::default();
        let first = AnalogU8 { x: 0x81, y: 0x7F };

        assert!(origins.capture_if_first_use(first, first, Triggers { l: 0x1E, r: 0x1F }));
        assert!(origins.initialized);

        let second = AnalogU8 { x: 0xF0, y: 0x10 };
        assert!(!origins.capture_if_first_use(second, second, Triggers::default()));
        assert_eq!(origins.stick, first);
        assert_eq!(origins.trig, Triggers { l: 0x1E, r: 0x1F });
    }

    #[test]
    fn test_origin_recaptured_after_invalidate() {
        let mut origins = Origins::default();
        origins.capture_if_first_use(AnalogU8 { x: 1, y: 2 }, AnalogU8::default(), Triggers::default());
        origins.invalidate();
        assert!(!origins.initialized);

        let fresh = AnalogU8 { x: 0x90, y: 0x91 };
        assert!(origins.capture_if_first_use(fresh, fresh, Triggers::default()));
        assert_eq!(origins.stick, fresh);
    }

    // ==================== Analog Mode Tests ====================

    const RECV: [u8; 8] = [0x01, 0x80, 0x85, 0x7B, 0x4C, 0xB2, 0x3A, 0x91];

    #[test]
    fn test_unpack_mode_3_full_precision() {
        let input = unpack_short_poll(3, &RECV);
        assert_eq!(input.buttons.bits(), 0x0180);
        assert_eq!(input.stick, AnalogU8 { x: 0x85, y: 0x7B });
        assert_eq!(input.c_stick, AnalogU8 { x: 0x4C, y: 0xB2 });
        assert_eq!(input.trig, Triggers { l: 0x3A, r: 0x91 });
    }

    #[test]
    fn test_unpack_default_family_expands_triggers() {
        for mode in [0, 5, 6, 7] {
            let input = unpack_short_poll(mode, &RECV);
            assert_eq!(input.c_stick, AnalogU8 { x: 0x4C, y: 0xB2 }, "mode {}", mode);
            assert_eq!(input.trig, Triggers { l: 0x33, r: 0xAA }, "mode {}", mode);
        }
    }

    #[test]
    fn test_unpack_mode_1_expands_c_stick() {
        let input = unpack_short_poll(1, &RECV);
        assert_eq!(input.c_stick, AnalogU8 { x: 0x44, y: 0xCC });
        assert_eq!(input.trig, Triggers { l: 0xB2, r: 0x3A });
    }

    #[test]
    fn test_unpack_mode_2_expands_both() {
        let input = unpack_short_poll(2, &RECV);
        assert_eq!(input.c_stick, AnalogU8 { x: 0x44, y: 0xCC });
        assert_eq!(input.trig, Triggers { l: 0xBB, r: 0x22 });
    }

    #[test]
    fn test_unpack_mode_4_has_no_triggers() {
        let input = unpack_short_poll(4, &RECV);
        assert_eq!(input.c_stick, AnalogU8 { x: 0x4C, y: 0xB2 });
        assert_eq!(input.trig, Triggers::default());
    }

    #[test]
    fn test_unpack_long_poll() {
        let recv = [0x00, 0x80, 0x80, 0x80, 0x7F, 0x81, 0x22, 0x23, 0x00, 0x00];
        let input = unpack_long_poll(&recv);
        assert_eq!(input.stick, AnalogU8 { x: 0x80, y: 0x80 });
        assert_eq!(input.c_stick, AnalogU8 { x: 0x7F, y: 0x81 });
        assert_eq!(input.trig, Triggers { l: 0x22, r: 0x23 });
    }
}
