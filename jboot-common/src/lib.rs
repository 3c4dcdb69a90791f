// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Common types and constants for the jboot firmware-update system.
//!
//! Both peers depend on this crate: the device-side bootloader core
//! (`jboot-bootloader`) and the host-side burner (`jboot-burner`). Keeping
//! the wire protocol and the image checksum in one place is what makes the
//! two ends agree byte for byte.

#![no_std]

pub mod crc8;
pub mod protocol;

pub use crc8::{crc8, crc8_step, CRC8_POLY};
pub use protocol::{Request, Status, TargetInfo};
pub use protocol::{CRC_FOOTER_LEN, INFO_REPLY_LEN, MULTI_TRANSFER};
pub use protocol::{USB_PRODUCT_ID, USB_PRODUCT_STRING, USB_VENDOR_ID, USB_VENDOR_STRING};
