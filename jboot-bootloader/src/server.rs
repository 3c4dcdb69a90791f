// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Vendor control-request server.
//!
//! The USB stack hands every vendor SETUP packet to
//! [`ProtocolServer::handle_setup`]. Short commands are answered from a
//! bounded response buffer; FLASH_READ_PAGE and FLASH_WRITE_PAGE answer
//! with the multi-transfer sentinel and stream the page through
//! [`ProtocolServer::handle_in_data`] / [`ProtocolServer::handle_out_data`]
//! until the session returns to idle. Page-index bounds are enforced here,
//! not in the flash primitives.

use heapless::Vec;
use jboot_common::protocol::{Request, Status, TargetInfo, MULTI_TRANSFER};

use crate::hw::{FlashProgrammer, Nvram};
use crate::session::Session;

const REQUEST_TYPE_MASK: u8 = 0x60;
const REQUEST_TYPE_VENDOR: u8 = 0x40;
const DIRECTION_MASK: u8 = 0x80;
const DIRECTION_DEVICE_TO_HOST: u8 = 0x80;

/// Short replies fit an 8-byte response buffer.
pub const RESPONSE_BUFFER_LEN: usize = 8;

pub type ResponseBuffer = Vec<u8, RESPONSE_BUFFER_LEN>;

/// A decoded SETUP packet as delivered by the USB stack.
#[derive(Clone, Copy, Debug)]
pub struct SetupPacket {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

/// Reply to a SETUP packet.
#[derive(Debug, PartialEq, Eq)]
pub enum SetupReply {
    /// Buffered short response, sent in the data stage.
    Data(ResponseBuffer),
    /// The transfer continues through the data-stage handlers.
    MultiTransfer,
    /// Nothing to send; unrecognized requests fall here.
    Empty,
}

impl SetupReply {
    /// Length value the USB stack's SETUP callback returns: the buffered
    /// data length, or the sentinel that requests data-stage callbacks.
    pub fn wire_len(&self) -> u8 {
        match self {
            SetupReply::Data(buffer) => buffer.len() as u8,
            SetupReply::MultiTransfer => MULTI_TRANSFER,
            SetupReply::Empty => 0,
        }
    }
}

/// Static parameters the server reports and enforces.
#[derive(Clone, Copy, Debug)]
pub struct DeviceConfig {
    pub version_major: u8,
    pub version_minor: u8,
    pub signature: [u8; 3],
    pub page_size: u16,
    pub boot_pages: u8,
    pub app_page_count: u16,
}

impl DeviceConfig {
    fn info(&self) -> TargetInfo {
        TargetInfo {
            version_major: self.version_major,
            version_minor: self.version_minor,
            boot_pages: self.boot_pages,
            signature: self.signature,
        }
    }
}

pub struct ProtocolServer<F, N> {
    flash: F,
    nvram: N,
    config: DeviceConfig,
    session: Session,
}

impl<F: FlashProgrammer, N: Nvram> ProtocolServer<F, N> {
    pub fn new(flash: F, nvram: N, config: DeviceConfig) -> Self {
        Self {
            flash,
            nvram,
            config,
            session: Session::Idle,
        }
    }

    pub fn session(&self) -> Session {
        self.session
    }

    /// True once REBOOT has been accepted; the poll loop shuts down then.
    pub fn reset_armed(&self) -> bool {
        self.session.is_reset()
    }

    /// SETUP-phase dispatch.
    pub fn handle_setup(&mut self, setup: &SetupPacket) -> SetupReply {
        if setup.request_type & REQUEST_TYPE_MASK != REQUEST_TYPE_VENDOR {
            return SetupReply::Empty;
        }
        let Some(request) = Request::from_u8(setup.request) else {
            return SetupReply::Empty;
        };

        log::trace!("setup {:?} index={} value={}", request, setup.index, setup.value);

        if setup.request_type & DIRECTION_MASK == DIRECTION_DEVICE_TO_HOST {
            match request {
                Request::Connect => reply_status(Status::Ok),
                Request::GetInfo => reply_bytes(&self.config.info().encode()),
                Request::FlashErasePage => self.erase_page(setup.index),
                Request::FlashReadPage => self.setup_page_read(setup.index),
                Request::NvramRead => self.nvram_read(setup.index),
                Request::NvramWrite => self.nvram_write(setup.index, setup.value as u8),
                Request::Reboot => {
                    self.session = Session::Reset;
                    reply_status(Status::Ok)
                }
                Request::FlashWritePage => SetupReply::Empty,
            }
        } else {
            match request {
                Request::FlashWritePage => self.setup_page_write(setup.index),
                _ => SetupReply::Empty,
            }
        }
    }

    fn erase_page(&mut self, page: u16) -> SetupReply {
        if page >= self.config.app_page_count {
            return reply_status(Status::Error);
        }
        let address = u32::from(page) * u32::from(self.config.page_size);
        self.flash.busy_wait();
        self.flash.page_erase(address);
        reply_status(Status::Ok)
    }

    fn setup_page_read(&mut self, page: u16) -> SetupReply {
        if page >= self.config.app_page_count {
            return reply_status(Status::Error);
        }
        self.session = Session::PageRead {
            address: u32::from(page) * u32::from(self.config.page_size),
            remaining: self.config.page_size,
        };
        SetupReply::MultiTransfer
    }

    fn setup_page_write(&mut self, page: u16) -> SetupReply {
        if page >= self.config.app_page_count {
            return reply_status(Status::Error);
        }
        self.session = Session::PageWrite {
            page_address: u32::from(page) * u32::from(self.config.page_size),
            fill_offset: 0,
            remaining: self.config.page_size,
        };
        SetupReply::MultiTransfer
    }

    fn nvram_read(&mut self, address: u16) -> SetupReply {
        let value = self.nvram.read(address);
        reply_bytes(&[Status::Ok as u8, value])
    }

    fn nvram_write(&mut self, address: u16, value: u8) -> SetupReply {
        self.nvram.write(address, value);
        reply_status(Status::Ok)
    }

    /// Device-to-host data stage: fills `buf` from program memory and
    /// returns the number of bytes produced. The session returns to idle
    /// once the page is exhausted.
    pub fn handle_in_data(&mut self, buf: &mut [u8]) -> usize {
        let Session::PageRead {
            mut address,
            mut remaining,
        } = self.session
        else {
            return 0;
        };

        let mut produced = 0;
        while produced < buf.len() && remaining > 0 {
            buf[produced] = self.flash.read_byte(address);
            address += 1;
            remaining -= 1;
            produced += 1;
        }

        self.session = if remaining == 0 {
            Session::Idle
        } else {
            Session::PageRead { address, remaining }
        };
        produced
    }

    /// Host-to-device data stage: latches incoming bytes pairwise into the
    /// page buffer. When the buffer is full the page is programmed and the
    /// session returns to idle; returns true on that final chunk.
    pub fn handle_out_data(&mut self, data: &[u8]) -> bool {
        let Session::PageWrite {
            page_address,
            mut fill_offset,
            mut remaining,
        } = self.session
        else {
            return false;
        };

        for pair in data.chunks_exact(2) {
            if remaining == 0 {
                break;
            }
            let word = u16::from_le_bytes([pair[0], pair[1]]);
            self.flash.busy_wait();
            self.flash.page_fill(fill_offset, word);
            fill_offset += 2;
            remaining -= 2;
        }

        if remaining == 0 {
            log::trace!("page complete, programming {:#06x}", page_address);
            self.flash.busy_wait();
            self.flash.page_write(page_address);
            self.flash.busy_wait();
            self.flash.rww_enable();
            self.session = Session::Idle;
            true
        } else {
            self.session = Session::PageWrite {
                page_address,
                fill_offset,
                remaining,
            };
            false
        }
    }
}

fn reply_status(status: Status) -> SetupReply {
    reply_bytes(&[status as u8])
}

fn reply_bytes(bytes: &[u8]) -> SetupReply {
    let mut buffer = ResponseBuffer::new();
    let _ = buffer.extend_from_slice(bytes);
    SetupReply::Data(buffer)
}
