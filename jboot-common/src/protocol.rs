// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Wire protocol shared between bootloader and burner.
//!
//! Commands travel as USB vendor control requests: the request code is
//! `bRequest`, `wIndex` carries a page number or NVRAM address and the low
//! byte of `wValue` carries a data byte where applicable. Short replies
//! are raw status-prefixed byte strings; page transfers continue as
//! multi-transfer data stages after SETUP.

/// USB vendor id of the bootloader (shared obdev.at id space).
pub const USB_VENDOR_ID: u16 = 0x16C0;

/// USB product id of the bootloader.
pub const USB_PRODUCT_ID: u16 = 0x05DC;

/// Manufacturer string descriptor, matched exactly by the burner.
pub const USB_VENDOR_STRING: &str = "obdev.at";

/// Product string descriptor, matched exactly by the burner.
pub const USB_PRODUCT_STRING: &str = "USB jboot";

/// Request codes, stable on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Request {
    Connect = 0x01,
    GetInfo = 0x02,
    FlashErasePage = 0x03,
    FlashReadPage = 0x04,
    FlashWritePage = 0x05,
    NvramRead = 0x06,
    NvramWrite = 0x07,
    Reboot = 0x08,
}

impl Request {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(Self::Connect),
            0x02 => Some(Self::GetInfo),
            0x03 => Some(Self::FlashErasePage),
            0x04 => Some(Self::FlashReadPage),
            0x05 => Some(Self::FlashWritePage),
            0x06 => Some(Self::NvramRead),
            0x07 => Some(Self::NvramWrite),
            0x08 => Some(Self::Reboot),
            _ => None,
        }
    }
}

impl From<Request> for u8 {
    fn from(request: Request) -> Self {
        request as u8
    }
}

/// Status byte leading every short reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    Error = 0x01,
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status as u8
    }
}

/// SETUP reply length sentinel telling the USB stack to keep calling the
/// data-stage handlers instead of sending a buffered reply.
pub const MULTI_TRANSFER: u8 = 0xFF;

/// Length of the GET_INFO reply.
pub const INFO_REPLY_LEN: usize = 7;

/// Bytes the image CRC footer occupies at the top of application flash.
pub const CRC_FOOTER_LEN: usize = 2;

/// Target identification returned by GET_INFO.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetInfo {
    pub version_major: u8,
    pub version_minor: u8,
    pub boot_pages: u8,
    pub signature: [u8; 3],
}

impl TargetInfo {
    /// Encodes the 7-byte GET_INFO reply, status byte included.
    pub fn encode(&self) -> [u8; INFO_REPLY_LEN] {
        [
            Status::Ok as u8,
            self.version_major,
            self.version_minor,
            self.boot_pages,
            self.signature[0],
            self.signature[1],
            self.signature[2],
        ]
    }

    /// Decodes a GET_INFO reply. `None` on wrong length or error status.
    pub fn decode(raw: &[u8]) -> Option<Self> {
        if raw.len() != INFO_REPLY_LEN || raw[0] != Status::Ok as u8 {
            return None;
        }
        Some(Self {
            version_major: raw[1],
            version_minor: raw[2],
            boot_pages: raw[3],
            signature: [raw[4], raw[5], raw[6]],
        })
    }
}
