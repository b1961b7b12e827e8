//! Verify command implementation

use std::path::Path;

use fpgaflash_core::chip::ChipDatabase;
use fpgaflash_core::workflow::{verify_image, MAX_MISMATCHES};

use super::open_target;
use crate::cli::TargetArgs;
use crate::progress::IndicatifProgress;

/// Compare the flash from offset 0 against `input`
pub fn run_verify(
    args: &TargetArgs,
    db: &ChipDatabase,
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = std::fs::read(input).map_err(|e| format!("Failed to read {:?}: {}", input, e))?;

    let mut target = open_target(args, db)?;
    let capacity = target.device.geometry().total_size;
    if image.len() as u64 > capacity as u64 {
        return Err(format!(
            "Image is {} bytes but {} holds only {}",
            image.len(),
            target.describe(),
            capacity
        )
        .into());
    }

    println!("Verifying {:?} ({} bytes)", input, image.len());
    let mut progress = IndicatifProgress::new();
    let report = verify_image(&mut target.device, &image, &mut progress)?;
    progress.finish();

    if report.is_clean() {
        println!("Verified {} chunk(s): flash matches", report.chunks_verified);
        Ok(())
    } else if report.aborted() {
        Err(format!(
            "Verification stopped after {} mismatching chunks",
            MAX_MISMATCHES
        )
        .into())
    } else {
        Err(format!(
            "Verification failed: {} mismatching chunk(s)",
            report.mismatches.len()
        )
        .into())
    }
}
