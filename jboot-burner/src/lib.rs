// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Host-side burner for the jboot USB bootloader.
//!
//! The burner finds the bootloader on the USB buses, identifies the MCU
//! behind it, and drives page-granular erase, dump, write-with-verify and
//! checksum-commit operations over vendor control transfers.

pub mod cli;
pub mod enumerate;
pub mod error;
pub mod link;
pub mod mcu;
pub mod pipeline;
pub mod shadow;
