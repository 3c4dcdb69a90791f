// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The burner's page pipeline.
//!
//! Turns one user operation into the protocol call sequence: dumps read
//! whole pages into the flash shadow, writes read-modify-merge partial
//! pages and verify every programmed page by readback, commit fills the
//! CRC footer so the bootloader accepts the image at the next reset.
//! Pages are strictly ordered; a page's erase, write and verify finish
//! before the next page starts.

use indicatif::{ProgressBar, ProgressStyle};

use jboot_common::crc8::crc8;
use jboot_common::protocol::CRC_FOOTER_LEN;

use crate::error::{Error, Result};
use crate::link::Bootloader;
use crate::mcu::TargetParameters;
use crate::shadow::{page_span, FlashShadow};

/// Which memory an operation addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryType {
    Flash,
    Nvram,
}

pub struct Burner<B> {
    link: B,
    target: TargetParameters,
    flash: FlashShadow,
    nvram: Vec<u8>,
}

impl<B: Bootloader> Burner<B> {
    /// Handshakes with an open link, identifies the MCU and sizes the
    /// shadows for one burner session.
    pub fn start(mut link: B) -> Result<Self> {
        link.connect()?;
        let info = link.get_info()?;
        let target = TargetParameters::resolve(&info)?;

        log::info!(
            "found {} with bootloader version {}.{}",
            target.mcu.name,
            target.version_major,
            target.version_minor
        );
        log::info!(
            "flash: {} application pages of {} bytes, nvram: {} bytes",
            target.app_page_count,
            target.page_size,
            target.nvram_size
        );

        let flash = FlashShadow::new(target.page_size, target.app_page_count)?;
        let nvram = vec![0u8; target.nvram_size as usize];
        Ok(Self {
            link,
            target,
            flash,
            nvram,
        })
    }

    pub fn target(&self) -> &TargetParameters {
        &self.target
    }

    /// Addressable size of the selected memory.
    pub fn memory_size(&self, memory: MemoryType) -> u32 {
        match memory {
            MemoryType::Flash => self.flash.len() as u32,
            MemoryType::Nvram => self.nvram.len() as u32,
        }
    }

    /// Reads `[offset, offset + size)` from the selected memory.
    pub fn dump(&mut self, memory: MemoryType, offset: u32, size: u32) -> Result<Vec<u8>> {
        let memory_size = self.memory_size(memory);
        if u64::from(offset) + u64::from(size) > u64::from(memory_size) {
            return Err(Error::BadParameter(format!(
                "dump range {}+{} exceeds memory size {}",
                offset, size, memory_size
            )));
        }
        if size == 0 {
            return Ok(Vec::new());
        }

        let range = offset as usize..(offset + size) as usize;
        match memory {
            MemoryType::Flash => {
                let (page_start, page_end) = page_span(
                    self.target.page_size,
                    self.target.app_page_count,
                    offset,
                    size,
                )
                .ok_or_else(|| Error::BadParameter("dump range maps to no page".into()))?;

                log::debug!("reading pages {}..={}", page_start, page_end);
                let progress = page_progress("reading", u64::from(page_end - page_start) + 1);
                for page in page_start..=page_end {
                    self.read_page_into_shadow(page)?;
                    progress.inc(1);
                }
                progress.finish_and_clear();

                Ok(self.flash.bytes()[range].to_vec())
            }
            MemoryType::Nvram => {
                let progress = page_progress("reading", u64::from(size));
                for address in offset..offset + size {
                    self.nvram[address as usize] = self.link.nvram_read(address)?;
                    progress.inc(1);
                }
                progress.finish_and_clear();

                Ok(self.nvram[range].to_vec())
            }
        }
    }

    /// Erases an inclusive page range; both ends default to the full
    /// application span.
    pub fn erase(&mut self, page_start: Option<u32>, page_end: Option<u32>) -> Result<()> {
        let page_start = page_start.unwrap_or(0);
        let page_end = page_end.unwrap_or(self.target.app_page_count - 1);
        if page_end >= self.target.app_page_count || page_start > page_end {
            return Err(Error::BadParameter(format!(
                "erase range {}..={} outside the {} application pages",
                page_start, page_end, self.target.app_page_count
            )));
        }

        log::debug!("erasing pages {}..={}", page_start, page_end);
        let progress = page_progress("erasing", u64::from(page_end - page_start) + 1);
        for page in page_start..=page_end {
            self.link.erase_page(page)?;
            progress.inc(1);
        }
        progress.finish_and_clear();
        Ok(())
    }

    /// Writes `data` at `offset` into the selected memory.
    pub fn write(&mut self, memory: MemoryType, offset: u32, data: &[u8]) -> Result<()> {
        match memory {
            MemoryType::Flash => self.write_flash(offset, data),
            MemoryType::Nvram => self.write_nvram(offset, data),
        }
    }

    fn write_flash(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        // The last two bytes of the application region belong to the CRC
        // footer and are never written directly.
        let writable = self.flash.len() - CRC_FOOTER_LEN;
        if offset as usize + data.len() > writable {
            return Err(Error::BadParameter(format!(
                "write range {}+{} exceeds writable size {}",
                offset,
                data.len(),
                writable
            )));
        }
        if data.is_empty() {
            return Ok(());
        }

        let page_size = self.target.page_size;
        let (page_start, page_end) = page_span(
            page_size,
            self.target.app_page_count,
            offset,
            data.len() as u32,
        )
        .ok_or_else(|| Error::BadParameter("write range maps to no page".into()))?;

        // Partially covered boundary pages keep their existing bytes, so
        // their device copy has to be in the shadow first.
        let end = offset + data.len() as u32;
        if offset % page_size != 0 {
            self.read_page_into_shadow(page_start)?;
        }
        if end % page_size != 0 && (page_end != page_start || offset % page_size == 0) {
            self.read_page_into_shadow(page_end)?;
        }

        self.flash.bytes_mut()[offset as usize..end as usize].copy_from_slice(data);

        log::debug!("programming pages {}..={}", page_start, page_end);
        let progress = page_progress("writing", u64::from(page_end - page_start) + 1);
        for page in page_start..=page_end {
            self.program_page(page)?;
            progress.inc(1);
        }
        progress.finish_and_clear();
        Ok(())
    }

    fn write_nvram(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        if offset as usize + data.len() > self.nvram.len() {
            return Err(Error::BadParameter(format!(
                "write range {}+{} exceeds nvram size {}",
                offset,
                data.len(),
                self.nvram.len()
            )));
        }

        let progress = page_progress("writing", data.len() as u64);
        for (i, &value) in data.iter().enumerate() {
            let address = offset + i as u32;
            self.link.nvram_write(address, value)?;
            self.nvram[address as usize] = value;
            progress.inc(1);
        }
        progress.finish_and_clear();
        Ok(())
    }

    /// Fills the CRC footer and reprograms the last application page so
    /// the boot-time check accepts the image. Pages never observed this
    /// session are read first so the checksum covers the real contents.
    pub fn commit(&mut self) -> Result<()> {
        let unread = self.flash.unread_pages();
        if !unread.is_empty() {
            log::debug!("refreshing {} unread pages before commit", unread.len());
            let progress = page_progress("reading", unread.len() as u64);
            for page in unread {
                self.read_page_into_shadow(page as u32)?;
                progress.inc(1);
            }
            progress.finish_and_clear();
        }

        let len = self.flash.len();
        let crc = crc8(&self.flash.bytes()[..len - CRC_FOOTER_LEN]);
        self.flash.bytes_mut()[len - 2] = !crc;
        self.flash.bytes_mut()[len - 1] = crc;

        let last_page = self.flash.page_count() - 1;
        log::info!("committing image checksum {:#04x} to page {}", crc, last_page);
        self.link.erase_page(last_page as u32)?;
        self.link
            .write_page(last_page as u32, self.flash.page(last_page))?;
        Ok(())
    }

    /// Reboots the target into the freshly written image.
    pub fn reset(&mut self) -> Result<()> {
        log::info!("resetting target");
        self.link.reboot()
    }

    fn read_page_into_shadow(&mut self, page: u32) -> Result<()> {
        let buffer = self.flash.page_mut(page as usize);
        self.link.read_page(page, buffer)?;
        self.flash.mark_read(page as usize);
        Ok(())
    }

    /// One page: erase, write the shadow bytes, verify by readback.
    fn program_page(&mut self, page: u32) -> Result<()> {
        self.link.erase_page(page)?;
        self.link.write_page(page, self.flash.page(page as usize))?;

        let mut readback = vec![0u8; self.flash.page_size()];
        self.link.read_page(page, &mut readback)?;
        if readback != self.flash.page(page as usize) {
            return Err(Error::Verify { page });
        }

        self.flash.mark_read(page as usize);
        Ok(())
    }
}

fn page_progress(label: &str, count: u64) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    let bar = ProgressBar::new(count);
    bar.set_style(style);
    bar.set_message(label.to_string());
    bar
}
