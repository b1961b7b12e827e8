//! List commands implementation

use fpgaflash_core::chip::ChipDatabase;

use super::format_size;
use crate::programmers;

/// List all supported programmers
pub fn list_programmers() {
    let programmers = programmers::available_programmers();
    if programmers.is_empty() {
        println!("No programmers available (recompile with programmer features enabled)");
        return;
    }

    println!("Supported programmers:");
    println!();
    for p in &programmers {
        let root = if p.requires_root { " [root]" } else { "" };
        println!("  {:12} - {}{}", p.name, p.description, root);
        if !p.aliases.is_empty() {
            println!("  {:12}   aliases: {}", "", p.aliases.join(", "));
        }
    }
}

/// List all chips in the database
pub fn list_chips(db: &ChipDatabase, vendor_filter: Option<&str>) {
    println!("Supported flash chips:");
    println!();
    println!(
        "{:<12} {:<20} {:>10} {:>10}",
        "Vendor", "Name", "Size", "JEDEC ID"
    );
    println!("{}", "-".repeat(60));

    let vendor_filter = vendor_filter.map(str::to_lowercase);
    for chip in db.iter() {
        if let Some(vendor) = &vendor_filter {
            if !chip.vendor.to_lowercase().contains(vendor) {
                continue;
            }
        }

        println!(
            "{:<12} {:<20} {:>10} {:>10}",
            chip.vendor,
            chip.name,
            format_size(chip.geometry.total_size as u64),
            chip.jedec_id.to_string()
        );
    }
}
