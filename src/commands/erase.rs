//! Erase command implementation

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use fpgaflash_core::chip::ChipDatabase;
use fpgaflash_core::plan::plan_erase_range;

use super::{format_size, open_target, Device};
use crate::cli::TargetArgs;

/// Run the erase command
pub fn run_erase(
    args: &TargetArgs,
    db: &ChipDatabase,
    start: Option<u32>,
    length: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut target = open_target(args, db)?;
    println!("Found: {}", target.describe());

    match (start, length) {
        (Some(start_addr), Some(len)) => {
            erase_range_with_progress(&mut target.device, start_addr, len)?;
            println!("Erased {} bytes starting at 0x{:08X}", len, start_addr);
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err("Both --start and --length must be specified for partial erase".into());
        }
        (None, None) => {
            chip_erase_with_progress(&mut target.device)?;
            println!("Chip erase complete");
        }
    }

    Ok(())
}

/// Erase entire chip with progress spinner
pub fn chip_erase_with_progress(device: &mut Device) -> Result<(), Box<dyn std::error::Error>> {
    let total_size = device.geometry().total_size;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!(
        "Erasing {} (this may take a while)...",
        format_size(total_size as u64)
    ));
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = device.erase_chip();
    pb.finish_and_clear();
    Ok(result?)
}

/// Erase a sector-aligned range with a progress bar
pub fn erase_range_with_progress(
    device: &mut Device,
    start: u32,
    len: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let geometry = *device.geometry();
    let plan = plan_erase_range(start, len, &geometry).map_err(|e| {
        format!(
            "Cannot erase 0x{:08X}+0x{:X}: {} (range must be {}-aligned and inside the chip)",
            start,
            len,
            e,
            format_size(geometry.sector_size as u64)
        )
    })?;

    let pb = ProgressBar::new(plan.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ops {msg}")?
            .progress_chars("#>-"),
    );

    for op in plan.iter() {
        pb.set_message(format!("{} @ 0x{:06X}", op.granularity, op.address));
        device.erase(op)?;
        pb.inc(1);
    }

    pb.finish_with_message("Erase complete");
    Ok(())
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::commands::dummy_target;

    #[test]
    fn test_erase_dummy() {
        let db = ChipDatabase::builtin();
        run_erase(&dummy_target(""), &db, Some(0xF000), Some(0x12000)).unwrap();
        run_erase(&dummy_target(""), &db, None, None).unwrap();
        assert!(run_erase(&dummy_target(""), &db, Some(0x800), Some(0x1000)).is_err());
    }
}
