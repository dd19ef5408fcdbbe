//! # Rumble Module
//!
//! Rumble motor support for both controller families.
//!
//! This module handles:
//! - Controller pak block reads and writes with checksum checks
//! - Rumble pak detection through the accessory id probe
//! - Motor start, stop and brake requests

pub mod pak;
pub mod motor;
