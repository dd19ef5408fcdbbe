//! # Joybus Bridge Library
//!
//! Poll N64 and GameCube controllers through one PIF command buffer.
//!
//! This library packs per-port joybus commands into the 64-byte PIF RAM image,
//! walks the executed image back into normalized controller records, remaps
//! GameCube layouts onto the N64 button set and drives rumble for both
//! controller families.

pub mod config;
pub mod error;
pub mod pif;
pub mod controller;
pub mod bus;
pub mod rumble;
