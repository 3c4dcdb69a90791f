// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Multi-transfer session state.

/// The device's position between a SETUP packet and the final data-stage
/// byte. Exactly one session exists at a time: SETUP transitions into a
/// variant that owns its per-state fields and the data-stage handlers
/// consume it, so a data-stage callback in the wrong state has nothing to
/// act on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Session {
    /// No transfer in flight.
    Idle,
    /// Streaming a page out to the host.
    PageRead { address: u32, remaining: u16 },
    /// Receiving a page from the host into the page buffer.
    PageWrite {
        page_address: u32,
        fill_offset: u16,
        remaining: u16,
    },
    /// Reboot armed; the poll loop runs the shutdown sequence next cycle.
    Reset,
}

impl Session {
    pub fn is_reset(&self) -> bool {
        matches!(self, Session::Reset)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Session::Idle)
    }
}
