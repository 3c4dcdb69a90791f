// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Burner error taxonomy.
//!
//! Every kind carries a stable process exit code so scripts can tell a
//! missing device from a verify failure.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// USB transfer trouble below the protocol layer.
    #[error("USB error: {0}")]
    Usb(rusb::Error),

    /// File I/O trouble around the input or output path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A written page read back different bytes.
    #[error("flash verify failed on page {page}")]
    Verify { page: u32 },

    /// Enumeration or a control transfer exceeded its deadline.
    #[error("operation timed out")]
    Timeout,

    /// A documented precondition was violated, or the device rejected the
    /// request with an error status.
    #[error("{0}")]
    BadParameter(String),

    /// Shadow sizing failed.
    #[error("cannot size memory shadow: {0}")]
    NoFreeResources(String),

    /// No device matched, or its signature is not in the MCU table.
    #[error("no matching device found")]
    NoDevice,
}

impl Error {
    /// Stable process exit code for this kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Usb(_) | Error::Io(_) | Error::Verify { .. } => 1,
            Error::Timeout => 2,
            Error::BadParameter(_) => 3,
            Error::NoFreeResources(_) => 4,
            Error::NoDevice => 5,
        }
    }
}

impl From<rusb::Error> for Error {
    fn from(err: rusb::Error) -> Self {
        match err {
            rusb::Error::Timeout => Error::Timeout,
            other => Error::Usb(other),
        }
    }
}
