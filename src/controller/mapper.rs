//! # Controller Input Mapper Module
//!
//! Converts decoded poll responses into the unified [`ControllerPad`] record.
//!
//! Every controller is reported in the N64 button layout. GameCube buttons are
//! folded onto it as follows:
//!
//! | GameCube | Unified | Notes |
//! |----------|---------|-------|
//! | A, B, Start | A, B, Start | |
//! | D-Pad | D-Pad | |
//! | L (digital) or left trigger past threshold | Z | L and Z swap places |
//! | Z | L | |
//! | R | R | |
//! | X | Reset | the bit set by L+R+Start on an N64 pad |
//! | Y | reserved bit | passed through, no meaning assigned |
//! | C-stick | C-Up/Down/Left/Right | per-axis threshold |
//!
//! ## Usage
//!
//! ```
//! use joybus_bridge::controller::calibration::{AnalogS8, Triggers};
//! use joybus_bridge::controller::mapper::{remap, GcnButtons, N64Buttons, RemapThresholds};
//!
//! let buttons = remap(
//!     GcnButtons::A | GcnButtons::Z,
//!     Triggers::default(),
//!     AnalogS8 { x: 0, y: 90 },
//!     &RemapThresholds::default(),
//! );
//! assert_eq!(buttons, N64Buttons::A | N64Buttons::L | N64Buttons::C_UP);
//! ```

use bitflags::bitflags;
use serde::Serialize;

use super::calibration::{center_stick, center_triggers, AnalogS8, Origins, RichInput, Triggers};
use crate::pif::protocol::{ChannelStatus, READ_BUTTON_RX};

/// Default C-stick deflection needed to press a virtual C button.
pub const GCN_C_STICK_THRESHOLD: u8 = 38;

/// Default analog trigger pressure that also presses the digital Z button.
pub const GCN_TRIGGER_THRESHOLD: u8 = 100;

bitflags! {
    /// N64 controller buttons (unified layout), big-endian word order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
    pub struct N64Buttons: u16 {
        const A       = 0x8000;
        const B       = 0x4000;
        const Z       = 0x2000;
        const START   = 0x1000;
        const D_UP    = 0x0800;
        const D_DOWN  = 0x0400;
        const D_LEFT  = 0x0200;
        const D_RIGHT = 0x0100;
        /// Set by the controller on L+R+Start (stick recalibration)
        const RESET   = 0x0080;
        /// Never set by an N64 controller
        const UNUSED  = 0x0040;
        const L       = 0x0020;
        const R       = 0x0010;
        const C_UP    = 0x0008;
        const C_DOWN  = 0x0004;
        const C_LEFT  = 0x0002;
        const C_RIGHT = 0x0001;
    }
}

bitflags! {
    /// GameCube controller buttons, big-endian word order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GcnButtons: u16 {
        const ERRSTAT    = 0x8000;
        const ERRLATCH   = 0x4000;
        const GET_ORIGIN = 0x2000;
        const START      = 0x1000;
        const Y          = 0x0800;
        const X          = 0x0400;
        const B          = 0x0200;
        const A          = 0x0100;
        const USE_ORIGIN = 0x0080;
        const L          = 0x0040;
        const R          = 0x0020;
        const Z          = 0x0010;
        const D_UP       = 0x0008;
        const D_DOWN     = 0x0004;
        const D_RIGHT    = 0x0002;
        const D_LEFT     = 0x0001;
    }
}

/// Thresholds used when synthesizing digital buttons from analog axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemapThresholds {
    /// Centered C-stick deflection that must be exceeded on one axis.
    pub c_stick: u8,
    /// Raw left trigger pressure that must be exceeded to press Z.
    pub trigger: u8,
}

impl Default for RemapThresholds {
    fn default() -> Self {
        Self {
            c_stick: GCN_C_STICK_THRESHOLD,
            trigger: GCN_TRIGGER_THRESHOLD,
        }
    }
}

/// Maps GameCube buttons and C-stick onto the unified layout.
///
/// `trig` is the raw (uncentered) trigger sample and `c_stick` the centered
/// C-stick. Both directions on one axis can never be set together.
#[must_use]
pub fn remap(gcn: GcnButtons, trig: Triggers, c_stick: AnalogS8, thresholds: &RemapThresholds) -> N64Buttons {
    let mut n64 = N64Buttons::empty();
    let t = i16::from(thresholds.c_stick);
    let (cx, cy) = (i16::from(c_stick.x), i16::from(c_stick.y));

    n64.set(N64Buttons::A, gcn.contains(GcnButtons::A));
    n64.set(N64Buttons::B, gcn.contains(GcnButtons::B));
    // L and Z swap places
    n64.set(N64Buttons::Z, gcn.contains(GcnButtons::L) || trig.l > thresholds.trigger);
    n64.set(N64Buttons::START, gcn.contains(GcnButtons::START));
    n64.set(N64Buttons::D_UP, gcn.contains(GcnButtons::D_UP));
    n64.set(N64Buttons::D_DOWN, gcn.contains(GcnButtons::D_DOWN));
    n64.set(N64Buttons::D_LEFT, gcn.contains(GcnButtons::D_LEFT));
    n64.set(N64Buttons::D_RIGHT, gcn.contains(GcnButtons::D_RIGHT));
    n64.set(N64Buttons::RESET, gcn.contains(GcnButtons::X));
    n64.set(N64Buttons::UNUSED, gcn.contains(GcnButtons::Y));
    n64.set(N64Buttons::L, gcn.contains(GcnButtons::Z));
    n64.set(N64Buttons::R, gcn.contains(GcnButtons::R));

    n64.set(N64Buttons::C_UP, cy > t);
    n64.set(N64Buttons::C_DOWN, cy < -t);
    n64.set(N64Buttons::C_LEFT, cx < -t);
    n64.set(N64Buttons::C_RIGHT, cx > t);

    n64
}

/// Per-port controller state, refreshed once per poll.
///
/// # Examples
///
/// ```
/// use joybus_bridge::controller::mapper::ControllerPad;
///
/// let pad = ControllerPad::default();
/// assert!(pad.button.is_empty());
/// assert!(!pad.origins.initialized);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ControllerPad {
    /// Unified button bitfield.
    pub button: N64Buttons,
    /// Main stick, centered.
    pub stick: AnalogS8,
    /// C-stick, centered (always zero for N64 controllers).
    pub c_stick: AnalogS8,
    /// Analog triggers, centered (always zero for N64 controllers).
    pub trig: Triggers,
    /// Channel status of the last record decoded for this port.
    pub errno: ChannelStatus,
    /// Calibration origin for GameCube controllers.
    #[serde(skip)]
    pub origins: Origins,
}

impl ControllerPad {
    /// Writes a 4-byte N64 read response into the pad.
    pub fn apply_legacy(&mut self, recv: &[u8; READ_BUTTON_RX as usize]) {
        self.button = N64Buttons::from_bits_retain(u16::from_be_bytes([recv[0], recv[1]]));
        self.stick = AnalogS8 {
            x: recv[2] as i8,
            y: recv[3] as i8,
        };
        self.c_stick = AnalogS8::default();
        self.trig = Triggers::default();
    }

    /// Writes a GameCube report into the pad, capturing the origin first if needed.
    pub fn apply_rich(&mut self, input: &RichInput, thresholds: &RemapThresholds) {
        // TODO: honor USE_ORIGIN once origin repolling exists
        self.origins.capture_if_first_use(input.stick, input.c_stick, input.trig);

        self.stick = center_stick(input.stick, self.origins.stick);
        self.c_stick = center_stick(input.c_stick, self.origins.c_stick);
        self.trig = center_triggers(input.trig, self.origins.trig);

        self.button = remap(input.buttons, input.trig, self.c_stick, thresholds);
    }
}
