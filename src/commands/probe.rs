//! Probe command implementation

use fpgaflash_core::chip::ChipDatabase;

use super::{format_size, open_target};
use crate::cli::TargetArgs;

/// Identify the flash and print what we know about it
pub fn run_probe(args: &TargetArgs, db: &ChipDatabase) -> Result<(), Box<dyn std::error::Error>> {
    let mut target = open_target(args, db)?;
    let status = target.device.read_status()?;
    let geometry = *target.device.geometry();

    println!("Flash Chip Information");
    println!("======================");
    println!();
    println!("Chip:            {}", target.describe());
    println!("JEDEC ID:        {}", target.jedec_id);
    println!(
        "Size:            {} bytes ({})",
        geometry.total_size,
        format_size(geometry.total_size as u64)
    );
    println!("Page size:       {} bytes", geometry.page_size);
    println!("Sector size:     {}", format_size(geometry.sector_size as u64));
    println!("Block size:      {}", format_size(geometry.block_size as u64));
    println!("Status:          {}", status);

    if status.write_protected() {
        println!();
        println!("Warning: block protection bits are set; erase and program will be ignored");
    }

    Ok(())
}
