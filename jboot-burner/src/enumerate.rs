// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Device discovery.
//!
//! Polls the USB buses until a device with the bootloader's VID/PID shows
//! up whose manufacturer and product string descriptors match exactly, or
//! until the deadline passes. The clock is injected so the deadline logic
//! is testable.

use std::time::{Duration, Instant};

use rusb::{
    Context, Device, DeviceDescriptor, DeviceHandle, Direction, Recipient, RequestType, UsbContext,
};

use jboot_common::protocol::{
    USB_PRODUCT_ID, USB_PRODUCT_STRING, USB_VENDOR_ID, USB_VENDOR_STRING,
};

use crate::error::{Error, Result};

/// Interval between enumeration passes.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Timeout for descriptor reads while matching a candidate.
const DESCRIPTOR_TIMEOUT: Duration = Duration::from_millis(5000);

const DESCRIPTOR_TYPE_STRING: u8 = 0x03;
const LANGID_EN_US: u16 = 0x0409;

/// Injected time source.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock used by the real burner.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Runs `scan` every [`POLL_INTERVAL`] until it yields a value or the
/// deadline passes.
pub fn poll_until<T>(
    timeout: Duration,
    clock: &impl Clock,
    mut scan: impl FnMut() -> Result<Option<T>>,
) -> Result<T> {
    let start = clock.now();
    loop {
        if let Some(found) = scan()? {
            return Ok(found);
        }
        if clock.now().duration_since(start) >= timeout {
            return Err(Error::Timeout);
        }
        clock.sleep(POLL_INTERVAL);
    }
}

/// Polls the buses for the bootloader and returns an open handle to the
/// first device passing every test.
pub fn find_device(
    context: &Context,
    timeout: Duration,
    clock: &impl Clock,
) -> Result<DeviceHandle<Context>> {
    poll_until(timeout, clock, || scan_once(context))
}

fn scan_once(context: &Context) -> Result<Option<DeviceHandle<Context>>> {
    for device in context.devices().map_err(Error::from)?.iter() {
        let Ok(descriptor) = device.device_descriptor() else {
            continue;
        };
        if descriptor.vendor_id() != USB_VENDOR_ID || descriptor.product_id() != USB_PRODUCT_ID {
            continue;
        }
        log::debug!(
            "candidate at bus {} address {}",
            device.bus_number(),
            device.address()
        );
        match open_matching(&device, &descriptor) {
            Ok(Some(handle)) => return Ok(Some(handle)),
            Ok(None) => log::debug!("descriptor strings do not match, skipping"),
            Err(err) => log::debug!("cannot probe candidate: {}", err),
        }
    }
    Ok(None)
}

/// Opens a VID/PID match and checks its descriptor strings. Non-matching
/// handles are dropped, which closes them.
fn open_matching(
    device: &Device<Context>,
    descriptor: &DeviceDescriptor,
) -> Result<Option<DeviceHandle<Context>>> {
    let handle = device.open().map_err(Error::from)?;

    if let Some(index) = descriptor.manufacturer_string_index() {
        if read_string_ascii(&handle, index)? != USB_VENDOR_STRING {
            return Ok(None);
        }
    }
    if let Some(index) = descriptor.product_string_index() {
        if read_string_ascii(&handle, index)? != USB_PRODUCT_STRING {
            return Ok(None);
        }
    }

    Ok(Some(handle))
}

/// Reads a string descriptor and decodes it to 7-bit-clean ASCII.
fn read_string_ascii(handle: &DeviceHandle<Context>, index: u8) -> Result<String> {
    let mut buffer = [0u8; 256];
    let request_type = rusb::request_type(Direction::In, RequestType::Standard, Recipient::Device);
    let len = handle.read_control(
        request_type,
        rusb::constants::LIBUSB_REQUEST_GET_DESCRIPTOR,
        (u16::from(DESCRIPTOR_TYPE_STRING) << 8) | u16::from(index),
        LANGID_EN_US,
        &mut buffer,
        DESCRIPTOR_TIMEOUT,
    )?;
    Ok(decode_string_descriptor(&buffer[..len]))
}

/// Decodes a 16-bit string descriptor. Descriptors that are not of type
/// STRING decode to the empty string; any UTF-16LE unit with a non-zero
/// high byte becomes `'?'`.
fn decode_string_descriptor(raw: &[u8]) -> String {
    if raw.len() < 2 || raw[1] != DESCRIPTOR_TYPE_STRING {
        return String::new();
    }
    let reported = usize::from(raw[0]).min(raw.len());
    raw[2..reported]
        .chunks_exact(2)
        .map(|unit| if unit[1] != 0 { '?' } else { char::from(unit[0]) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Clock whose time only moves when something sleeps on it.
    struct FakeClock {
        start: Instant,
        elapsed: Cell<Duration>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self {
                start: Instant::now(),
                elapsed: Cell::new(Duration::ZERO),
            }
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.start + self.elapsed.get()
        }

        fn sleep(&self, duration: Duration) {
            self.elapsed.set(self.elapsed.get() + duration);
        }
    }

    #[test]
    fn test_poll_until_times_out_within_one_interval() {
        let clock = FakeClock::new();
        let timeout = Duration::from_millis(3000);

        let result: Result<()> = poll_until(timeout, &clock, || Ok(None));
        assert!(matches!(result, Err(Error::Timeout)));

        let elapsed = clock.elapsed.get();
        assert!(elapsed >= timeout);
        assert!(elapsed <= timeout + POLL_INTERVAL);
    }

    #[test]
    fn test_poll_until_returns_first_match() {
        let clock = FakeClock::new();
        let mut calls = 0;
        let result = poll_until(Duration::from_millis(3000), &clock, || {
            calls += 1;
            Ok((calls == 3).then_some(calls))
        });
        assert_eq!(result.unwrap(), 3);
        assert_eq!(clock.elapsed.get(), 2 * POLL_INTERVAL);
    }

    #[test]
    fn test_poll_until_propagates_scan_errors() {
        let clock = FakeClock::new();
        let result: Result<()> =
            poll_until(Duration::from_millis(3000), &clock, || Err(Error::NoDevice));
        assert!(matches!(result, Err(Error::NoDevice)));
    }

    #[test]
    fn test_decode_plain_ascii() {
        let raw = [8, DESCRIPTOR_TYPE_STRING, b'a', 0, b'b', 0, b'c', 0];
        assert_eq!(decode_string_descriptor(&raw), "abc");
    }

    #[test]
    fn test_decode_substitutes_non_ascii() {
        // U+0142 (latin small l with stroke) has a non-zero high byte.
        let raw = [6, DESCRIPTOR_TYPE_STRING, b'x', 0, 0x42, 0x01];
        assert_eq!(decode_string_descriptor(&raw), "x?");
    }

    #[test]
    fn test_decode_rejects_non_string_descriptor() {
        let raw = [4, 0x01, b'x', 0];
        assert_eq!(decode_string_descriptor(&raw), "");
    }

    #[test]
    fn test_decode_honors_reported_length() {
        // Descriptor claims 4 bytes even though the buffer holds more.
        let raw = [4, DESCRIPTOR_TYPE_STRING, b'y', 0, b'z', 0];
        assert_eq!(decode_string_descriptor(&raw), "y");
    }
}
