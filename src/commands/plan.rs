//! Plan command implementation
//!
//! Shows what `program` would do for an image without opening a programmer.

use std::path::Path;

use fpgaflash_core::chip::{ChipDatabase, FlashGeometry};
use fpgaflash_core::plan::{plan_erase, EraseGranularity, EraseStrategy, ErasePlan};

use super::{format_size, geometry_by_name};

/// Print the erase plan and page count for an image
pub fn run_plan(
    db: &ChipDatabase,
    input: Option<&Path>,
    length: Option<u32>,
    chip: Option<&str>,
    chip_erase: bool,
    detailed: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let geometry = geometry_by_name(db, chip)?;
    let len = match (input, length) {
        (_, Some(len)) => len as usize,
        (Some(path), None) => usize::try_from(std::fs::metadata(path)?.len())?,
        (None, None) => return Err("Either an input file or --length is required".into()),
    };

    if len as u64 > geometry.total_size as u64 {
        return Err(format!(
            "Image is {} bytes but the flash holds only {}",
            len, geometry.total_size
        )
        .into());
    }

    let strategy = if chip_erase {
        EraseStrategy::Chip
    } else {
        EraseStrategy::Blocks
    };
    let plan = plan_erase(len, &geometry, strategy);

    println!("Image:           {} bytes", len);
    println!("Erase:           {}", summarize(&plan, &geometry));
    println!(
        "Erased bytes:    {} ({})",
        plan.covered_len(),
        format_size(plan.covered_len())
    );
    println!("Page programs:   {}", geometry.pages_for(len));

    if detailed {
        println!();
        for op in plan.iter() {
            println!(
                "  {:<9} 0x{:06X} - 0x{:06X}",
                op.granularity,
                op.address,
                op.end(&geometry) - 1
            );
        }
    }

    Ok(())
}

fn summarize(plan: &ErasePlan, geometry: &FlashGeometry) -> String {
    if plan.is_empty() {
        return "nothing to erase".to_string();
    }
    let parts: Vec<String> = [
        (EraseGranularity::Chip, "chip erase".to_string()),
        (
            EraseGranularity::Block64K,
            format!("{} block(s)", format_size(geometry.block_size as u64)),
        ),
        (
            EraseGranularity::Sector,
            format!("{} sector(s)", format_size(geometry.sector_size as u64)),
        ),
    ]
    .iter()
    .filter_map(|(g, label)| match plan.count(*g) {
        0 => None,
        n => Some(format!("{} {}", n, label)),
    })
    .collect();
    parts.join(" + ")
}
