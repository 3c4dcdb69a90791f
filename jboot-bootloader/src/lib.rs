// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Device-side core of the jboot USB bootloader.
//!
//! Everything hardware-specific lives behind the traits in [`hw`]: the
//! self-programming engine, the NVRAM cells, the watchdog, the interrupt
//! gate, the vector base and the USB device stack. An MCU port implements
//! those traits and wires the USB stack's SETUP and data-stage callbacks
//! to [`server::ProtocolServer`]; its reset handler runs the checksum walk
//! in [`image`] and either jumps to the application or hands control to
//! [`runtime`].

#![no_std]

pub mod hw;
pub mod image;
pub mod runtime;
pub mod server;
pub mod session;

pub use image::{activation_asserted, boot_action, image_is_valid, BootAction, ImageLayout};
pub use server::{DeviceConfig, ProtocolServer, SetupPacket, SetupReply};
pub use session::Session;

/// Version reported in the GET_INFO reply.
pub const VERSION_MAJOR: u8 = 0;
pub const VERSION_MINOR: u8 = 3;
