//! # PIF Command Buffer Module
//!
//! Codec for the 64-byte PIF RAM image that carries joybus commands to every
//! controller channel in one transfer.
//!
//! This module handles:
//! - Frame layout constants and channel status bits
//! - Poll, status and pak command encoding
//! - Walking executed frames record by record
//! - Pak address and data checksums

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod crc;
