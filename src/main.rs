//! fpgaflash - FPGA configuration flash programmer
//!
//! Writes an FPGA bitstream into the SPI NOR flash the FPGA boots from, then
//! reads it back to confirm.
//!
//! # Architecture
//!
//! The programmer backend (dummy emulator or Linux GPIO bitbang) provides a
//! raw `SpiBus`. `fpgaflash-core` frames SPI25 commands on it, plans erase
//! and page writes, and runs the erase/program/verify workflow; this binary
//! only selects the backend and chip and draws progress.

mod cli;
mod commands;
mod programmers;
mod progress;

use clap::Parser;
use cli::{Cli, Commands};
use fpgaflash_core::chip::ChipDatabase;
use std::path::{Path, PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let db = match load_chip_database(cli.chip_db.as_deref()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load chip database: {}", e);
            std::process::exit(1);
        }
    };

    log::debug!("Loaded {} chip definitions", db.len());

    match cli.command {
        Commands::Probe { target } => commands::run_probe(&target, &db),
        Commands::Program {
            target,
            input,
            chip_erase,
            no_verify,
        } => commands::run_program(&target, &db, &input, chip_erase, !no_verify),
        Commands::Verify { target, input } => commands::run_verify(&target, &db, &input),
        Commands::Read {
            target,
            output,
            length,
        } => commands::run_read(&target, &db, &output, length),
        Commands::Erase {
            target,
            start,
            length,
        } => commands::run_erase(&target, &db, start, length),
        Commands::Plan {
            input,
            length,
            chip,
            chip_erase,
            detailed,
        } => commands::run_plan(
            &db,
            input.as_deref(),
            length,
            chip.as_deref(),
            chip_erase,
            detailed,
        ),
        Commands::ListChips { vendor } => {
            commands::list_chips(&db, vendor.as_deref());
            Ok(())
        }
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
    }
}

/// Load the chip database
///
/// The built-in W25Q16JV is always present. Definitions from the given path,
/// or else from the default locations, are layered on top.
fn load_chip_database(path: Option<&Path>) -> Result<ChipDatabase, Box<dyn std::error::Error>> {
    let mut db = ChipDatabase::builtin();

    if let Some(path) = path {
        // User specified a path
        if path.is_dir() {
            db.load_dir(path)?;
        } else if path.is_file() {
            db.load_file(path)?;
        } else {
            return Err(format!("Chip database path not found: {}", path.display()).into());
        }
    } else {
        // Try default locations
        let default_paths = [
            PathBuf::from("chips/vendors"),
            PathBuf::from("/usr/share/fpgaflash/chips"),
            PathBuf::from("/usr/local/share/fpgaflash/chips"),
        ];

        for dir in &default_paths {
            if dir.is_dir() {
                match db.load_dir(dir) {
                    Ok(count) => log::debug!("Loaded {} chips from {}", count, dir.display()),
                    Err(e) => log::warn!("Failed to load chips from {}: {}", dir.display(), e),
                }
            }
        }
    }

    Ok(db)
}
