//! # Controller Module
//!
//! Turns raw poll responses into one controller record per port.
//!
//! This module handles:
//! - GameCube analog origin capture and centering
//! - Analog mode unpacking and nibble expansion
//! - Folding GameCube buttons and C-stick onto the N64 layout
//! - Per-family poll framing and decoding

pub mod calibration;
pub mod mapper;
pub mod profile;
