// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Parser, ValueEnum};
use pretty_hex::{config_hex, HexConfig};

use crate::enumerate::{self, SystemClock};
use crate::error::{Error, Result};
use crate::link::UsbTarget;
use crate::pipeline::{Burner, MemoryType};

/// Default deadline for finding and talking to the target.
const DEFAULT_TIMEOUT_MS: u64 = 3000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MemoryTypeArg {
    Flash,
    E2prom,
}

impl From<MemoryTypeArg> for MemoryType {
    fn from(arg: MemoryTypeArg) -> Self {
        match arg {
            MemoryTypeArg::Flash => MemoryType::Flash,
            MemoryTypeArg::E2prom => MemoryType::Nvram,
        }
    }
}

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "jboot-burner")]
#[command(about = "USB burner tool for the jboot bootloader")]
#[command(group = ArgGroup::new("operation").required(true).args(["erase", "dump", "write"]))]
pub struct Cli {
    /// Erase flash pages
    #[arg(short = 'e', long)]
    pub erase: bool,

    /// First page to erase
    #[arg(long, value_name = "N", requires = "erase")]
    pub page_start: Option<u32>,

    /// Last page to erase (inclusive)
    #[arg(long, value_name = "N", requires = "erase")]
    pub page_end: Option<u32>,

    /// Dump memory
    #[arg(short = 'd', long)]
    pub dump: bool,

    /// Start offset for dump or write
    #[arg(long, value_name = "N")]
    pub offset: Option<u32>,

    /// Number of bytes to dump
    #[arg(long, value_name = "N", requires = "dump")]
    pub size: Option<u32>,

    /// Write memory from the input file
    #[arg(short = 'w', long)]
    pub write: bool,

    /// Input file path
    #[arg(short = 'i', long = "in", value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output file path; dumps go to stdout as hex when absent
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Memory to operate on
    #[arg(short = 'm', long, value_enum, default_value_t = MemoryTypeArg::Flash)]
    pub memory_type: MemoryTypeArg,

    /// Reset the MCU after all operations
    #[arg(short = 'r', long)]
    pub reset: bool,

    /// Write the image checksum footer so the bootloader starts the application
    #[arg(short = 'c', long)]
    pub commit: bool,

    /// Enumeration and transfer timeout in milliseconds
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout: u64,
}

/// Connects to the target and executes the parsed operation.
pub fn run(cli: Cli) -> Result<()> {
    let memory = MemoryType::from(cli.memory_type);
    let timeout = Duration::from_millis(cli.timeout);

    log::info!("waiting for the bootloader...");
    let context = rusb::Context::new().map_err(Error::from)?;
    let handle = enumerate::find_device(&context, timeout, &SystemClock)?;
    let mut burner = Burner::start(UsbTarget::new(handle, timeout))?;

    if cli.erase {
        if memory != MemoryType::Flash {
            return Err(Error::BadParameter("--erase applies to flash only".into()));
        }
        burner.erase(cli.page_start, cli.page_end)?;
    } else if cli.dump {
        let offset = cli.offset.unwrap_or(0);
        let size = cli.size.unwrap_or_else(|| burner.memory_size(memory));
        let data = burner.dump(memory, offset, size)?;
        match &cli.output {
            Some(path) => fs::write(path, &data)?,
            None => print_hex(&data),
        }
    } else if cli.write {
        let input = cli
            .input
            .as_ref()
            .ok_or_else(|| Error::BadParameter("--write needs an input file (--in)".into()))?;
        let data = fs::read(input)?;
        burner.write(memory, cli.offset.unwrap_or(0), &data)?;
    }

    if cli.commit {
        burner.commit()?;
    }
    if cli.reset {
        burner.reset()?;
    }

    Ok(())
}

fn print_hex(data: &[u8]) {
    let config = HexConfig {
        title: false,
        width: 16,
        group: 8,
        ..HexConfig::default()
    };
    println!("{}", config_hex(&data, config));
}
