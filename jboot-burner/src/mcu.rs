// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! MCU identification.

use jboot_common::protocol::TargetInfo;

use crate::error::{Error, Result};

/// Static parameters of one supported MCU type.
#[derive(Debug)]
pub struct McuParameters {
    pub signature: [u8; 3],
    pub name: &'static str,
    pub flash_size: u32,
    pub page_size: u32,
    pub nvram_size: u32,
}

/// Parts the bootloader is known to run on.
pub static MCU_TABLE: &[McuParameters] = &[
    McuParameters {
        signature: [0x1E, 0x93, 0x07],
        name: "ATmega8",
        flash_size: 8 * 1024,
        page_size: 64,
        nvram_size: 512,
    },
    McuParameters {
        signature: [0x1E, 0x93, 0x0A],
        name: "ATmega88",
        flash_size: 8 * 1024,
        page_size: 64,
        nvram_size: 512,
    },
    McuParameters {
        signature: [0x1E, 0x94, 0x06],
        name: "ATmega168",
        flash_size: 16 * 1024,
        page_size: 128,
        nvram_size: 512,
    },
    McuParameters {
        signature: [0x1E, 0x95, 0x0F],
        name: "ATmega328P",
        flash_size: 32 * 1024,
        page_size: 128,
        nvram_size: 1024,
    },
    McuParameters {
        signature: [0x1E, 0x96, 0x09],
        name: "ATmega644",
        flash_size: 64 * 1024,
        page_size: 256,
        nvram_size: 2 * 1024,
    },
];

pub fn find_by_signature(signature: [u8; 3]) -> Option<&'static McuParameters> {
    MCU_TABLE.iter().find(|mcu| mcu.signature == signature)
}

/// Everything the pipeline needs to know about the connected target.
#[derive(Debug)]
pub struct TargetParameters {
    pub mcu: &'static McuParameters,
    pub version_major: u8,
    pub version_minor: u8,
    pub boot_pages: u32,
    pub page_size: u32,
    pub app_page_count: u32,
    pub nvram_size: u32,
}

impl TargetParameters {
    /// Maps a GET_INFO reply through the MCU table.
    pub fn resolve(info: &TargetInfo) -> Result<Self> {
        let Some(mcu) = find_by_signature(info.signature) else {
            log::error!(
                "unsupported MCU signature {:02x} {:02x} {:02x}",
                info.signature[0],
                info.signature[1],
                info.signature[2]
            );
            return Err(Error::NoDevice);
        };

        let total_pages = mcu.flash_size / mcu.page_size;
        let boot_pages = u32::from(info.boot_pages);
        if boot_pages == 0 || boot_pages >= total_pages {
            return Err(Error::BadParameter(format!(
                "implausible bootloader size: {} of {} pages",
                boot_pages, total_pages
            )));
        }

        Ok(Self {
            mcu,
            version_major: info.version_major,
            version_minor: info.version_minor,
            boot_pages,
            page_size: mcu.page_size,
            app_page_count: total_pages - boot_pages,
            nvram_size: mcu.nvram_size,
        })
    }
}
