// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Image checksum engine.
//!
//! Reflected CRC-8: fold a byte into the remainder, then divide modulo 2
//! bit by bit, LSB first. The bootloader runs this over program memory at
//! reset; the burner runs the identical loop over its flash shadow before
//! committing the footer, so the two ends must never diverge.

/// Project-wide CRC-8 polynomial, reversed (LSB-first) representation.
pub const CRC8_POLY: u8 = 0x8C;

/// Folds one byte into a running remainder.
#[inline]
pub fn crc8_step(remainder: u8, byte: u8) -> u8 {
    let mut remainder = remainder ^ byte;
    for _ in 0..8 {
        remainder = if remainder & 0x01 != 0 {
            (remainder >> 1) ^ CRC8_POLY
        } else {
            remainder >> 1
        };
    }
    remainder
}

/// CRC-8 of a whole buffer, low address first, initial remainder 0.
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0, |remainder, &byte| crc8_step(remainder, byte))
}
