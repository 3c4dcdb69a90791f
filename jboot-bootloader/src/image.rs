// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot-time image validation and the bootloader-entry decision.

use embedded_hal::digital::InputPin;
use jboot_common::crc8::crc8_step;

use crate::hw::FlashProgrammer;

/// Application image geometry.
///
/// `app_end` is the first byte above the application region. The CRC
/// footer occupies the two bytes below it: the checksum complement, then
/// the checksum itself at the very top.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageLayout {
    pub app_end: u32,
}

impl ImageLayout {
    pub const fn new(flash_size: u32, boot_pages: u16, page_size: u16) -> Self {
        Self {
            app_end: flash_size - boot_pages as u32 * page_size as u32,
        }
    }

    /// Address of the stored checksum byte.
    pub const fn crc_address(&self) -> u32 {
        self.app_end - 1
    }

    /// Address of the stored checksum complement.
    pub const fn crc_inv_address(&self) -> u32 {
        self.app_end - 2
    }
}

/// Walks the application bytes and checks them against the stored footer.
///
/// Runs before any interrupts are enabled. The image is valid iff the
/// running checksum matches the stored byte and its one's complement
/// matches the stored complement.
pub fn image_is_valid<F: FlashProgrammer>(flash: &F, layout: &ImageLayout) -> bool {
    let mut remainder = 0u8;
    let mut address = 0u32;
    while address < layout.crc_inv_address() {
        remainder = crc8_step(remainder, flash.read_byte(address));
        address += 1;
    }

    let stored = flash.read_byte(layout.crc_address());
    let stored_inv = flash.read_byte(layout.crc_inv_address());

    remainder == stored && !remainder == stored_inv
}

/// What to run after the reset-time check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootAction {
    /// Transfer control to the application reset vector at address 0.
    RunApplication,
    /// Stay resident and serve the update protocol.
    EnterBootloader,
}

/// Boot policy: the bootloader keeps control when the activation input is
/// asserted or the image fails its checksum.
pub fn boot_action(image_valid: bool, activation_asserted: bool) -> BootAction {
    if activation_asserted || !image_valid {
        BootAction::EnterBootloader
    } else {
        BootAction::RunApplication
    }
}

/// Samples the activation input. The input is asserted when pulled low.
pub fn activation_asserted<P: InputPin>(pin: &mut P) -> bool {
    pin.is_low().unwrap_or(false)
}
