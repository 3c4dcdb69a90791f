// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Hardware seams consumed by the bootloader core.
//!
//! All flash addresses are byte addresses counted from the start of
//! program memory.

/// Self-programming engine for the code memory.
///
/// A page-write sequence is erase, N fills, write, busy-wait, RWW
/// re-enable. Callers serialize with the silicon by going through
/// [`FlashProgrammer::busy_wait`] before every erase, fill and write.
pub trait FlashProgrammer {
    /// Blocks until the self-programming engine is idle.
    fn busy_wait(&mut self);

    /// Erases the page containing `address`.
    fn page_erase(&mut self, address: u32);

    /// Latches one little-endian word into the page buffer at a
    /// page-local byte offset.
    fn page_fill(&mut self, offset: u16, word: u16);

    /// Programs the latched page buffer into the page containing `address`.
    fn page_write(&mut self, address: u32);

    /// Re-enables the read-while-write section after programming.
    fn rww_enable(&mut self);

    /// Reads one byte of program memory.
    fn read_byte(&self, address: u32) -> u8;
}

/// Byte-addressable non-volatile memory exposed over NVRAM_READ/NVRAM_WRITE.
///
/// Implementations block until any previous write cycle has finished.
pub trait Nvram {
    fn read(&mut self, address: u16) -> u8;
    fn write(&mut self, address: u16, value: u8);
}

/// Watchdog windows the bootloader uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchdogTimeout {
    /// Deadman window for the protocol poll loop, about one second.
    Protocol,
    /// Shortest available window, armed to force the reboot.
    Reset,
}

pub trait Watchdog {
    fn enable(&mut self, timeout: WatchdogTimeout);
    fn feed(&mut self);
}

/// Global interrupt gate.
pub trait InterruptControl {
    fn enable(&mut self);
    fn disable(&mut self);
}

/// Interrupt vector base selection.
pub trait VectorSelect {
    /// Routes interrupt vectors into the bootloader section.
    fn to_bootloader(&mut self);

    /// Routes interrupt vectors back to the application at address 0.
    fn to_application(&mut self);
}

/// The black-box USB device stack.
pub trait UsbDriver {
    fn init(&mut self);

    /// Services the USB engine. SETUP and data-stage callbacks fire under
    /// this call.
    fn poll(&mut self);

    fn disconnect(&mut self);
    fn connect(&mut self);

    /// Masks the USB interrupt source so no handler runs during shutdown.
    fn disable_interrupt(&mut self);
}
