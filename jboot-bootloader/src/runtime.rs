// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Bootloader entry, poll loop and shutdown sequencing.
//!
//! The ordering in [`Board::shutdown`] is load-bearing: interrupts go off
//! and the USB interrupt source is masked before the vector base moves
//! back to the application, so no handler can run with the vectors in an
//! inconsistent location.

use embedded_hal::delay::DelayNs;

use crate::hw::{InterruptControl, UsbDriver, VectorSelect, Watchdog, WatchdogTimeout};

/// Minimum time the USB disconnect is held to force re-enumeration.
pub const DISCONNECT_HOLD_MS: u32 = 250;

/// The MCU facilities the runtime sequences.
pub struct Board<U, W, I, V, D> {
    pub usb: U,
    pub watchdog: W,
    pub irq: I,
    pub vectors: V,
    pub delay: D,
}

impl<U, W, I, V, D> Board<U, W, I, V, D>
where
    U: UsbDriver,
    W: Watchdog,
    I: InterruptControl,
    V: VectorSelect,
    D: DelayNs,
{
    /// Brings the bootloader up: deadman watchdog, vectors into the boot
    /// section, then a forced USB re-enumeration with the disconnect held
    /// for at least [`DISCONNECT_HOLD_MS`] while the watchdog stays fed.
    /// Interrupts come on last.
    pub fn enter_bootloader(&mut self) {
        self.watchdog.enable(WatchdogTimeout::Protocol);
        self.vectors.to_bootloader();
        self.usb.init();

        self.usb.disconnect();
        let mut held = 0;
        while held < DISCONNECT_HOLD_MS {
            self.watchdog.feed();
            self.delay.delay_ms(1);
            held += 1;
        }
        self.usb.connect();

        self.irq.enable();
    }

    /// One poll-loop iteration: feed the watchdog, service USB.
    pub fn poll_once(&mut self) {
        self.watchdog.feed();
        self.usb.poll();
    }

    /// Tears USB down and arms the watchdog for the hardware reset. The
    /// caller spins until the watchdog fires.
    pub fn shutdown(&mut self) {
        self.irq.disable();
        self.usb.disconnect();
        self.usb.disable_interrupt();
        self.vectors.to_application();
        self.watchdog.enable(WatchdogTimeout::Reset);
    }
}

/// Drives the poll loop until `reset_armed` reports that a REBOOT was
/// accepted, then runs the shutdown sequence.
pub fn serve<U, W, I, V, D>(board: &mut Board<U, W, I, V, D>, mut reset_armed: impl FnMut() -> bool)
where
    U: UsbDriver,
    W: Watchdog,
    I: InterruptControl,
    V: VectorSelect,
    D: DelayNs,
{
    while !reset_armed() {
        board.poll_once();
    }
    log::debug!("reboot armed, shutting down");
    board.shutdown();
}
