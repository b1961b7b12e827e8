//! Program command implementation

use std::fs::File;
use std::path::Path;

use fpgaflash_core::chip::ChipDatabase;
use fpgaflash_core::plan::EraseStrategy;
use fpgaflash_core::workflow::{ProgramReport, Workflow, WorkflowError, WorkflowOptions};

use super::{format_size, open_target};
use crate::cli::TargetArgs;
use crate::progress::IndicatifProgress;

/// Erase, program and verify `input` at offset 0
pub fn run_program(
    args: &TargetArgs,
    db: &ChipDatabase,
    input: &Path,
    chip_erase: bool,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::open(input).map_err(|e| format!("Failed to open {:?}: {}", input, e))?;
    let len = usize::try_from(file.metadata()?.len())?;

    let mut target = open_target(args, db)?;
    println!(
        "Programming {:?} ({} bytes) into {}",
        input,
        len,
        target.describe()
    );

    let options = WorkflowOptions {
        erase_strategy: if chip_erase {
            EraseStrategy::Chip
        } else {
            EraseStrategy::Blocks
        },
        verify,
        ..Default::default()
    };
    let mut progress = IndicatifProgress::new();
    let result =
        Workflow::new(&mut target.device, options).run_from_reader(file, len, &mut progress);

    match result {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            print_failure(&e);
            Err(e.into())
        }
    }
}

fn print_report(report: &ProgramReport) {
    println!(
        "Erased {} in {} operation(s) ({} ms)",
        format_size(report.bytes_erased),
        report.erase_ops,
        report.erase_ms
    );
    println!(
        "Wrote {} bytes in {} page(s) ({} ms)",
        report.image_len, report.pages_written, report.program_ms
    );
    if report.chunks_verified > 0 {
        println!(
            "Verified {} chunk(s) ({} ms)",
            report.chunks_verified, report.verify_ms
        );
    } else {
        println!("Verification skipped");
    }
    println!("Done.");
}

fn print_failure(error: &WorkflowError) {
    if error.kind.leaves_flash_inconsistent() {
        eprintln!("The flash was left partially written.");
        eprintln!("Retry with --chip-erase to start from a fully erased chip.");
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::commands::{dummy_target, temp_file};

    #[test]
    fn test_program_into_dummy() {
        let image: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let input = temp_file(&image);
        let db = ChipDatabase::builtin();

        run_program(&dummy_target(""), &db, input.path(), false, true).unwrap();
        run_program(&dummy_target(""), &db, input.path(), true, false).unwrap();
    }

    #[test]
    fn test_oversized_image_rejected() {
        let input = temp_file(&vec![0u8; 2 * 1024 * 1024 + 1]);
        let db = ChipDatabase::builtin();

        let err = run_program(&dummy_target(""), &db, input.path(), false, true).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
