// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Control-transfer command layer.
//!
//! One method per request code. The pipeline is generic over
//! [`Bootloader`] so the tests can drive it against a software target.

use std::time::Duration;

use rusb::{Context, DeviceHandle, Direction, Recipient, RequestType};

use jboot_common::protocol::{Request, Status, TargetInfo, INFO_REPLY_LEN};

use crate::error::{Error, Result};

/// Bootloader command set.
pub trait Bootloader {
    fn connect(&mut self) -> Result<()>;
    fn get_info(&mut self) -> Result<TargetInfo>;
    fn erase_page(&mut self, page: u32) -> Result<()>;
    fn read_page(&mut self, page: u32, buffer: &mut [u8]) -> Result<()>;
    fn write_page(&mut self, page: u32, data: &[u8]) -> Result<()>;
    fn nvram_read(&mut self, address: u32) -> Result<u8>;
    fn nvram_write(&mut self, address: u32, value: u8) -> Result<()>;
    fn reboot(&mut self) -> Result<()>;
}

/// rusb-backed target talking over the default control endpoint.
pub struct UsbTarget {
    handle: DeviceHandle<Context>,
    timeout: Duration,
}

impl UsbTarget {
    pub fn new(handle: DeviceHandle<Context>, timeout: Duration) -> Self {
        Self { handle, timeout }
    }

    fn control_in(
        &self,
        request: Request,
        index: u16,
        value: u16,
        buffer: &mut [u8],
    ) -> Result<usize> {
        let request_type =
            rusb::request_type(Direction::In, RequestType::Vendor, Recipient::Device);
        Ok(self
            .handle
            .read_control(request_type, request.into(), value, index, buffer, self.timeout)?)
    }

    fn control_out(&self, request: Request, index: u16, value: u16, data: &[u8]) -> Result<usize> {
        let request_type =
            rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device);
        Ok(self
            .handle
            .write_control(request_type, request.into(), value, index, data, self.timeout)?)
    }

    /// Issues an IN command that answers with a bare status byte.
    fn status_in(&self, request: Request, index: u16, value: u16) -> Result<()> {
        let mut response = [0u8; 1];
        let len = self.control_in(request, index, value, &mut response)?;
        expect_status(request, &response[..len])
    }
}

fn expect_status(request: Request, raw: &[u8]) -> Result<()> {
    match raw {
        [status] if *status == Status::Ok as u8 => Ok(()),
        [status] => Err(Error::BadParameter(format!(
            "{:?}: device reported status {:#04x}",
            request, status
        ))),
        _ => Err(Error::BadParameter(format!(
            "{:?}: bad response length {}",
            request,
            raw.len()
        ))),
    }
}

impl Bootloader for UsbTarget {
    fn connect(&mut self) -> Result<()> {
        self.status_in(Request::Connect, 0, 0)
    }

    fn get_info(&mut self) -> Result<TargetInfo> {
        let mut response = [0u8; 8];
        let len = self.control_in(Request::GetInfo, 0, 0, &mut response)?;
        if len != INFO_REPLY_LEN {
            return Err(Error::BadParameter(format!(
                "GetInfo: bad response length {}",
                len
            )));
        }
        TargetInfo::decode(&response[..len])
            .ok_or_else(|| Error::BadParameter("GetInfo: device reported an error".into()))
    }

    fn erase_page(&mut self, page: u32) -> Result<()> {
        self.status_in(Request::FlashErasePage, page as u16, 0)
    }

    fn read_page(&mut self, page: u32, buffer: &mut [u8]) -> Result<()> {
        let len = self.control_in(Request::FlashReadPage, page as u16, 0, buffer)?;
        if len != buffer.len() {
            return Err(Error::BadParameter(format!(
                "FlashReadPage: short page read ({} of {})",
                len,
                buffer.len()
            )));
        }
        Ok(())
    }

    fn write_page(&mut self, page: u32, data: &[u8]) -> Result<()> {
        let written = self.control_out(Request::FlashWritePage, page as u16, 0, data)?;
        if written != data.len() {
            return Err(Error::BadParameter(format!(
                "FlashWritePage: short page write ({} of {})",
                written,
                data.len()
            )));
        }
        Ok(())
    }

    fn nvram_read(&mut self, address: u32) -> Result<u8> {
        let mut response = [0u8; 2];
        let len = self.control_in(Request::NvramRead, address as u16, 0, &mut response)?;
        match response[..len] {
            [status, value] if status == Status::Ok as u8 => Ok(value),
            _ => Err(Error::BadParameter("NvramRead: bad response".into())),
        }
    }

    fn nvram_write(&mut self, address: u32, value: u8) -> Result<()> {
        self.status_in(Request::NvramWrite, address as u16, u16::from(value))
    }

    fn reboot(&mut self) -> Result<()> {
        self.status_in(Request::Reboot, 0, 0)
    }
}
