// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! End-to-end pipeline tests.
//!
//! The burner pipeline runs against the real device-side protocol server
//! through an in-memory control-transfer shim that delivers data stages in
//! the 8-byte chunks a low-speed control pipe produces. Flash is a plain
//! byte vector behind the device's programming primitives, so every test
//! can assert the exact bytes a real MCU would hold afterwards.

use std::cell::RefCell;
use std::rc::Rc;

use jboot_bootloader::hw::{FlashProgrammer, Nvram};
use jboot_bootloader::image::{boot_action, image_is_valid, BootAction, ImageLayout};
use jboot_bootloader::server::{DeviceConfig, ProtocolServer, SetupPacket, SetupReply};
use jboot_bootloader::{VERSION_MAJOR, VERSION_MINOR};
use jboot_burner::error::{Error, Result};
use jboot_burner::link::Bootloader;
use jboot_burner::pipeline::{Burner, MemoryType};
use jboot_common::crc8;
use jboot_common::protocol::{Request, Status, TargetInfo};

const PAGE_SIZE: u16 = 128;
const FLASH_SIZE: u32 = 32 * 1024;
const BOOT_PAGES: u8 = 16;
const APP_PAGES: u16 = (FLASH_SIZE / PAGE_SIZE as u32) as u16 - BOOT_PAGES as u16;
const APP_SIZE: usize = PAGE_SIZE as usize * APP_PAGES as usize;
const SIGNATURE: [u8; 3] = [0x1E, 0x95, 0x0F];

/// Data-stage chunk size of the simulated control pipe.
const CHUNK: usize = 8;

const VENDOR_IN: u8 = 0xC0;
const VENDOR_OUT: u8 = 0x40;

// --- Simulated device hardware ---

struct SimFlash {
    memory: Vec<u8>,
    page_buffer: Vec<u8>,
    /// Page whose next write gets one bit flipped, for verify tests.
    corrupt_page: Option<u32>,
}

impl SimFlash {
    fn blank() -> Self {
        Self {
            memory: vec![0xFF; FLASH_SIZE as usize],
            page_buffer: vec![0xFF; PAGE_SIZE as usize],
            corrupt_page: None,
        }
    }

    /// Application region pre-filled with a deterministic pattern.
    fn patterned() -> Self {
        let mut sim = Self::blank();
        for (i, byte) in sim.memory[..APP_SIZE].iter_mut().enumerate() {
            *byte = (i * 31 + 7) as u8;
        }
        sim
    }

    fn page_base(address: u32) -> usize {
        address as usize / PAGE_SIZE as usize * PAGE_SIZE as usize
    }
}

#[derive(Clone)]
struct SharedFlash(Rc<RefCell<SimFlash>>);

impl FlashProgrammer for SharedFlash {
    fn busy_wait(&mut self) {}

    fn page_erase(&mut self, address: u32) {
        let mut sim = self.0.borrow_mut();
        let base = SimFlash::page_base(address);
        sim.memory[base..base + PAGE_SIZE as usize].fill(0xFF);
    }

    fn page_fill(&mut self, offset: u16, word: u16) {
        let mut sim = self.0.borrow_mut();
        let offset = usize::from(offset);
        sim.page_buffer[offset..offset + 2].copy_from_slice(&word.to_le_bytes());
    }

    fn page_write(&mut self, address: u32) {
        let mut sim = self.0.borrow_mut();
        let base = SimFlash::page_base(address);
        let buffer = sim.page_buffer.clone();
        sim.memory[base..base + PAGE_SIZE as usize].copy_from_slice(&buffer);
        if sim.corrupt_page == Some(address / u32::from(PAGE_SIZE)) {
            sim.memory[base] ^= 0x01;
        }
    }

    fn rww_enable(&mut self) {}

    fn read_byte(&self, address: u32) -> u8 {
        self.0.borrow().memory[address as usize]
    }
}

struct SimNvram {
    cells: Vec<u8>,
}

impl Nvram for SimNvram {
    fn read(&mut self, address: u16) -> u8 {
        self.cells[usize::from(address)]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.cells[usize::from(address)] = value;
    }
}

// --- In-memory control-transfer shim ---

struct SimTarget {
    server: ProtocolServer<SharedFlash, SimNvram>,
}

impl SimTarget {
    fn new(flash: SharedFlash) -> Self {
        Self {
            server: ProtocolServer::new(
                flash,
                SimNvram {
                    cells: vec![0; 1024],
                },
                DeviceConfig {
                    version_major: VERSION_MAJOR,
                    version_minor: VERSION_MINOR,
                    signature: SIGNATURE,
                    page_size: PAGE_SIZE,
                    boot_pages: BOOT_PAGES,
                    app_page_count: APP_PAGES,
                },
            ),
        }
    }

    fn setup(&mut self, request_type: u8, request: Request, index: u16, value: u16) -> SetupReply {
        self.server.handle_setup(&SetupPacket {
            request_type,
            request: request.into(),
            value,
            index,
            length: 0,
        })
    }

    /// IN control transfer: short replies come from the SETUP response
    /// buffer, multi-transfer replies stream through the data stage.
    fn control_in(
        &mut self,
        request: Request,
        index: u16,
        value: u16,
        buffer: &mut [u8],
    ) -> usize {
        match self.setup(VENDOR_IN, request, index, value) {
            SetupReply::Data(reply) => {
                let n = reply.len().min(buffer.len());
                buffer[..n].copy_from_slice(&reply[..n]);
                n
            }
            SetupReply::MultiTransfer => {
                let mut filled = 0;
                while filled < buffer.len() {
                    let end = (filled + CHUNK).min(buffer.len());
                    let produced = self.server.handle_in_data(&mut buffer[filled..end]);
                    if produced == 0 {
                        break;
                    }
                    filled += produced;
                }
                filled
            }
            SetupReply::Empty => 0,
        }
    }

    fn status_in(&mut self, request: Request, index: u16, value: u16) -> Result<()> {
        let mut response = [0u8; 1];
        let len = self.control_in(request, index, value, &mut response);
        if len == 1 && response[0] == Status::Ok as u8 {
            Ok(())
        } else {
            Err(Error::BadParameter(format!(
                "{:?}: device reported an error",
                request
            )))
        }
    }
}

impl Bootloader for SimTarget {
    fn connect(&mut self) -> Result<()> {
        self.status_in(Request::Connect, 0, 0)
    }

    fn get_info(&mut self) -> Result<TargetInfo> {
        let mut response = [0u8; 8];
        let len = self.control_in(Request::GetInfo, 0, 0, &mut response);
        TargetInfo::decode(&response[..len])
            .ok_or_else(|| Error::BadParameter("GetInfo: bad reply".into()))
    }

    fn erase_page(&mut self, page: u32) -> Result<()> {
        self.status_in(Request::FlashErasePage, page as u16, 0)
    }

    fn read_page(&mut self, page: u32, buffer: &mut [u8]) -> Result<()> {
        let len = self.control_in(Request::FlashReadPage, page as u16, 0, buffer);
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
        match self.setup(VENDOR_OUT, Request::FlashWritePage, page as u16, 0) {
            SetupReply::MultiTransfer => {
                let mut complete = false;
                for chunk in data.chunks(CHUNK) {
                    complete = self.server.handle_out_data(chunk);
                }
                if complete {
                    Ok(())
                } else {
                    Err(Error::BadParameter("FlashWritePage: short page write".into()))
                }
            }
            _ => Err(Error::BadParameter(
                "FlashWritePage: device rejected the page".into(),
            )),
        }
    }

    fn nvram_read(&mut self, address: u32) -> Result<u8> {
        let mut response = [0u8; 2];
        let len = self.control_in(Request::NvramRead, address as u16, 0, &mut response);
        match response[..len] {
            [status, value] if status == Status::Ok as u8 => Ok(value),
            _ => Err(Error::BadParameter("NvramRead: bad reply".into())),
        }
    }

    fn nvram_write(&mut self, address: u32, value: u8) -> Result<()> {
        self.status_in(Request::NvramWrite, address as u16, u16::from(value))
    }

    fn reboot(&mut self) -> Result<()> {
        self.status_in(Request::Reboot, 0, 0)
    }
}

// --- Fixtures ---

struct Fixture {
    flash: Rc<RefCell<SimFlash>>,
    burner: Burner<SimTarget>,
}

fn fixture_with(sim: SimFlash) -> Fixture {
    let flash = Rc::new(RefCell::new(sim));
    let burner = Burner::start(SimTarget::new(SharedFlash(flash.clone()))).unwrap();
    Fixture { flash, burner }
}

fn blank_fixture() -> Fixture {
    fixture_with(SimFlash::blank())
}

fn patterned_fixture() -> Fixture {
    fixture_with(SimFlash::patterned())
}

fn layout() -> ImageLayout {
    ImageLayout::new(FLASH_SIZE, u16::from(BOOT_PAGES), PAGE_SIZE)
}

// --- Identification ---

#[test]
fn test_start_identifies_target() {
    let fixture = blank_fixture();
    let target = fixture.burner.target();
    assert_eq!(target.mcu.name, "ATmega328P");
    assert_eq!(target.page_size, u32::from(PAGE_SIZE));
    assert_eq!(target.app_page_count, u32::from(APP_PAGES));
    assert_eq!(target.nvram_size, 1024);
}

// --- Dump ---

#[test]
fn test_blank_device_dump_is_all_ff() {
    let mut fixture = patterned_fixture();
    fixture.burner.erase(None, None).unwrap();
    let data = fixture
        .burner
        .dump(MemoryType::Flash, 0, APP_SIZE as u32)
        .unwrap();
    assert_eq!(data, vec![0xFF; APP_SIZE]);
}

#[test]
fn test_dump_is_idempotent() {
    let mut fixture = patterned_fixture();
    let first = fixture.burner.dump(MemoryType::Flash, 100, 500).unwrap();
    let second = fixture.burner.dump(MemoryType::Flash, 100, 500).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_dump_rejects_out_of_bounds_range() {
    let mut fixture = blank_fixture();
    let result = fixture
        .burner
        .dump(MemoryType::Flash, APP_SIZE as u32 - 4, 8);
    assert!(matches!(result, Err(Error::BadParameter(_))));

    let result = fixture.burner.dump(MemoryType::Nvram, 1020, 8);
    assert!(matches!(result, Err(Error::BadParameter(_))));
}

// --- Write ---

#[test]
fn test_round_trip_patch_with_commit() {
    let mut fixture = blank_fixture();
    fixture.burner.erase(None, None).unwrap();
    fixture
        .burner
        .write(MemoryType::Flash, 5, &[0xDE, 0xAD, 0xBE])
        .unwrap();
    fixture.burner.commit().unwrap();

    let head = fixture.burner.dump(MemoryType::Flash, 0, 8).unwrap();
    assert_eq!(head, vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xDE, 0xAD, 0xBE]);

    // The footer holds the checksum of everything below it, complement first.
    let mut expected_body = vec![0xFF; APP_SIZE - 2];
    expected_body[5..8].copy_from_slice(&[0xDE, 0xAD, 0xBE]);
    let crc = crc8(&expected_body);

    let footer = fixture
        .burner
        .dump(MemoryType::Flash, APP_SIZE as u32 - 2, 2)
        .unwrap();
    assert_eq!(footer, vec![!crc, crc]);
}

#[test]
fn test_committed_image_passes_boot_validation() {
    let mut fixture = blank_fixture();
    fixture.burner.erase(None, None).unwrap();
    fixture
        .burner
        .write(MemoryType::Flash, 0, &[0x12, 0x34, 0x56, 0x78])
        .unwrap();
    fixture.burner.commit().unwrap();

    let flash = SharedFlash(fixture.flash.clone());
    assert!(image_is_valid(&flash, &layout()));

    // Valid image boots the application unless the activation input holds
    // the bootloader resident.
    assert_eq!(boot_action(true, false), BootAction::RunApplication);
    assert_eq!(boot_action(true, true), BootAction::EnterBootloader);
}

#[test]
fn test_uncommitted_image_fails_boot_validation() {
    let mut fixture = blank_fixture();
    fixture.burner.erase(None, None).unwrap();
    fixture
        .burner
        .write(MemoryType::Flash, 0, &[0x12, 0x34, 0x56, 0x78])
        .unwrap();

    let flash = SharedFlash(fixture.flash.clone());
    assert!(!image_is_valid(&flash, &layout()));
}

#[test]
fn test_misaligned_write_preserves_surrounding_bytes() {
    let mut fixture = patterned_fixture();
    let before = fixture.flash.borrow().memory.clone();

    let input: Vec<u8> = (0..200u32).map(|i| (i as u8) ^ 0x5A).collect();
    fixture
        .burner
        .write(MemoryType::Flash, 100, &input)
        .unwrap();

    let after = fixture.flash.borrow().memory.clone();
    assert_eq!(&after[100..300], &input[..]);
    assert_eq!(&after[..100], &before[..100]);
    // The write touched pages 0..=2; everything from byte 300 up to the
    // end of page 2 kept its old contents, as did the rest of flash.
    assert_eq!(&after[300..], &before[300..]);
}

#[test]
fn test_aligned_short_write_preserves_page_tail() {
    let mut fixture = patterned_fixture();
    let before = fixture.flash.borrow().memory.clone();

    fixture
        .burner
        .write(MemoryType::Flash, 0, &[0xAA; 10])
        .unwrap();

    let after = fixture.flash.borrow().memory.clone();
    assert_eq!(&after[..10], &[0xAA; 10]);
    assert_eq!(&after[10..PAGE_SIZE as usize], &before[10..PAGE_SIZE as usize]);
}

#[test]
fn test_write_rejects_footer_region() {
    let mut fixture = blank_fixture();
    let writable = APP_SIZE as u32 - 2;
    let result = fixture
        .burner
        .write(MemoryType::Flash, writable - 1, &[0x00, 0x00]);
    assert!(matches!(result, Err(Error::BadParameter(_))));
}

#[test]
fn test_verify_failure_names_the_page() {
    let mut fixture = blank_fixture();
    fixture.flash.borrow_mut().corrupt_page = Some(1);

    let data = vec![0x42; 3 * PAGE_SIZE as usize];
    let result = fixture.burner.write(MemoryType::Flash, 0, &data);
    assert!(matches!(result, Err(Error::Verify { page: 1 })));
}

// --- Erase ---

#[test]
fn test_erase_range_is_bounds_checked() {
    let mut fixture = blank_fixture();
    let result = fixture.burner.erase(Some(0), Some(u32::from(APP_PAGES)));
    assert!(matches!(result, Err(Error::BadParameter(_))));

    let result = fixture.burner.erase(Some(5), Some(2));
    assert!(matches!(result, Err(Error::BadParameter(_))));
}

#[test]
fn test_device_rejects_out_of_range_page_untouched() {
    let flash = Rc::new(RefCell::new(SimFlash::patterned()));
    let mut target = SimTarget::new(SharedFlash(flash.clone()));
    let before = flash.borrow().memory.clone();

    assert!(matches!(
        target.erase_page(u32::from(APP_PAGES)),
        Err(Error::BadParameter(_))
    ));
    assert!(matches!(
        target.write_page(u32::from(APP_PAGES), &vec![0u8; PAGE_SIZE as usize]),
        Err(Error::BadParameter(_))
    ));
    let mut buffer = vec![0u8; PAGE_SIZE as usize];
    assert!(matches!(
        target.read_page(u32::from(APP_PAGES), &mut buffer),
        Err(Error::BadParameter(_))
    ));

    assert_eq!(flash.borrow().memory, before);
}

#[test]
fn test_partial_erase_leaves_other_pages() {
    let mut fixture = patterned_fixture();
    let before = fixture.flash.borrow().memory.clone();

    fixture.burner.erase(Some(1), Some(2)).unwrap();

    let after = fixture.flash.borrow().memory.clone();
    let page = PAGE_SIZE as usize;
    assert_eq!(&after[..page], &before[..page]);
    assert_eq!(&after[page..3 * page], &vec![0xFF; 2 * page][..]);
    assert_eq!(&after[3 * page..], &before[3 * page..]);
}

// --- Commit ---

#[test]
fn test_commit_refreshes_unread_pages_first() {
    // A fresh session has an empty shadow; commit must read the device
    // contents before computing the checksum, or the footer would match
    // the shadow's zeros instead of the real image.
    let mut fixture = patterned_fixture();
    fixture.burner.commit().unwrap();

    let flash = SharedFlash(fixture.flash.clone());
    assert!(image_is_valid(&flash, &layout()));
}

#[test]
fn test_commit_is_idempotent() {
    let mut fixture = patterned_fixture();
    fixture.burner.commit().unwrap();
    let first = fixture.flash.borrow().memory[APP_SIZE - PAGE_SIZE as usize..APP_SIZE].to_vec();

    fixture.burner.commit().unwrap();
    let second = fixture.flash.borrow().memory[APP_SIZE - PAGE_SIZE as usize..APP_SIZE].to_vec();

    assert_eq!(first, second);
}

// --- NVRAM ---

#[test]
fn test_nvram_write_then_dump() {
    let mut fixture = blank_fixture();
    fixture
        .burner
        .write(MemoryType::Nvram, 10, &[1, 2, 3])
        .unwrap();

    let data = fixture.burner.dump(MemoryType::Nvram, 9, 5).unwrap();
    assert_eq!(data, vec![0, 1, 2, 3, 0]);
}

// --- Reboot ---

#[test]
fn test_reboot_arms_device_reset() {
    let flash = Rc::new(RefCell::new(SimFlash::blank()));
    let mut target = SimTarget::new(SharedFlash(flash));
    target.reboot().unwrap();
    assert!(target.server.reset_armed());
}
