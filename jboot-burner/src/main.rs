// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! USB burner tool for the jboot bootloader.
//!
//! Usage:
//!   jboot-burner --dump --size 256
//!   jboot-burner --write --in firmware.bin --commit --reset
//!   jboot-burner --erase --page-start 0 --page-end 31

use std::process::ExitCode;

use clap::Parser;

use jboot_burner::cli;

fn main() -> ExitCode {
    env_logger::init();

    let args = cli::Cli::parse();
    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::from(err.exit_code())
        }
    }
}
