//! # Controller Pak CRCs
//!
//! Checksums used by pak block reads and writes.
//!
//! - **Data CRC**: CRC-8, polynomial 0x85 (x^8 + x^7 + x^2 + 1), initial value 0x00,
//!   computed over one 32-byte block. The device echoes it after a write and
//!   appends it after a read.
//! - **Address CRC**: 5-bit CRC, polynomial 0x15 (x^5 + x^4 + x^2 + 1), over the
//!   11-bit block number. It occupies the low 5 bits of the address field.

use super::protocol::BLOCK_SIZE;

/// Pak data CRC polynomial
const DATA_CRC_POLY: u8 = 0x85;

/// Address CRC polynomial (5-bit)
const ADDRESS_CRC_POLY: u8 = 0x15;

/// Precomputed data CRC lookup table
const DATA_CRC_TABLE: [u8; 256] = generate_data_crc_table();

/// Generate the data CRC lookup table at compile time
const fn generate_data_crc_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ DATA_CRC_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Calculate the data CRC of one pak block
///
/// # Examples
///
/// ```
/// use joybus_bridge::pif::crc::data_crc;
///
/// assert_eq!(data_crc(&[0x01; 32]), 0xEB);
/// assert_eq!(data_crc(&[0x00; 32]), 0x00);
/// ```
pub fn data_crc(block: &[u8; BLOCK_SIZE]) -> u8 {
    let mut crc: u8 = 0;

    for &byte in block {
        crc = DATA_CRC_TABLE[(crc ^ byte) as usize];
    }

    crc
}

/// Bit-serial data CRC, shifting the message through an augmented register
///
/// Slower than the table version. Kept to cross-check the table in tests.
#[allow(dead_code)]
fn data_crc_slow(block: &[u8]) -> u8 {
    let mut crc: u16 = 0;

    for &byte in block {
        for bit in (0..8).rev() {
            crc = (crc << 1) & 0x1FF;
            if byte & (1 << bit) != 0 {
                crc |= 1;
            }
            if crc & 0x100 != 0 {
                crc ^= 0x100 | DATA_CRC_POLY as u16;
            }
        }
    }

    // Flush eight zero bits
    for _ in 0..8 {
        crc = (crc << 1) & 0x1FF;
        if crc & 0x100 != 0 {
            crc ^= 0x100 | DATA_CRC_POLY as u16;
        }
    }

    crc as u8
}

/// Calculate the 5-bit CRC of an 11-bit pak block number
///
/// # Examples
///
/// ```
/// use joybus_bridge::pif::crc::address_crc;
///
/// assert_eq!(address_crc(0x0600), 0x1B);
/// ```
pub fn address_crc(block: u16) -> u8 {
    let mut crc: u8 = 0;

    for bit in (0..11).rev() {
        crc = (crc << 1) & 0x3F;
        if block & (1 << bit) != 0 {
            crc |= 1;
        }
        if crc & 0x20 != 0 {
            crc ^= 0x20 | ADDRESS_CRC_POLY;
        }
    }

    for _ in 0..5 {
        crc = (crc << 1) & 0x3F;
        if crc & 0x20 != 0 {
            crc ^= 0x20 | ADDRESS_CRC_POLY;
        }
    }

    crc & 0x1F
}

/// Encode a block number into the two address bytes of a pak command
///
/// High byte carries block bits 10..3, low byte carries block bits 2..0
/// followed by the address CRC.
pub fn encode_address(block: u16) -> [u8; 2] {
    [(block >> 3) as u8, ((block << 5) as u8) | address_crc(block)]
}

/// Decode the block number from the two address bytes of a pak command
pub fn decode_address(address: [u8; 2]) -> u16 {
    (((address[0] as u16) << 8) | (address[1] & 0xE0) as u16) >> 5
}
