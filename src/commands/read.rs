//! Read command implementation

use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use fpgaflash_core::chip::ChipDatabase;

use super::{open_target, Device};
use crate::cli::TargetArgs;

/// Default chunk size for reading (4 KiB)
const READ_CHUNK_SIZE: usize = 4096;

/// Run the read command
pub fn run_read(
    args: &TargetArgs,
    db: &ChipDatabase,
    output: &Path,
    length: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut target = open_target(args, db)?;
    let total_size = target.device.geometry().total_size;
    let len = length.unwrap_or(total_size);
    if len > total_size {
        return Err(format!(
            "Requested {} bytes but {} holds only {}",
            len,
            target.describe(),
            total_size
        )
        .into());
    }

    println!("Reading {} bytes from {}", len, target.describe());
    let data = read_flash_with_progress(&mut target.device, len as usize)?;

    let mut file = File::create(output)?;
    file.write_all(&data)?;

    println!("Wrote {} bytes to {:?}", data.len(), output);

    Ok(())
}

/// Read `len` bytes from offset 0 with a progress bar
pub fn read_flash_with_progress(
    device: &mut Device,
    len: usize,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut data = vec![0u8; len];

    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );

    for (i, chunk) in data.chunks_mut(READ_CHUNK_SIZE).enumerate() {
        let offset = i * READ_CHUNK_SIZE;
        device.read_into(offset as u32, chunk)?;
        pb.set_position((offset + chunk.len()) as u64);
    }

    pb.finish_with_message("Read complete");
    Ok(data)
}
