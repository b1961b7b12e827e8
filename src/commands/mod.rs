//! CLI command implementations
//!
//! Every hardware command opens the programmer, identifies the chip and
//! picks its geometry the same way, through [`open_target`]. The geometry
//! comes from `--chip` if given, otherwise from the chip database entry
//! matching the JEDEC ID, otherwise the built-in W25Q16JV is assumed.

mod erase;
mod list;
mod plan;
mod probe;
mod program;
mod read;
mod verify;

pub use erase::run_erase;
pub use list::{list_chips, list_programmers};
pub use plan::run_plan;
pub use probe::run_probe;
pub use program::run_program;
pub use read::run_read;
pub use verify::run_verify;

use fpgaflash_core::chip::{ChipDatabase, FlashChip, FlashGeometry};
use fpgaflash_core::flash::FlashDevice;
use fpgaflash_core::programmer::{SpiTransport, StdClock};
use fpgaflash_core::protocol::JedecId;

use crate::cli::TargetArgs;
use crate::programmers::{self, DynBus};

/// Flash driver on a runtime-selected programmer
pub type Device = FlashDevice<SpiTransport<DynBus, StdClock>>;

/// An opened and identified flash
pub struct Target {
    pub device: Device,
    pub jedec_id: JedecId,
    /// Database entry the geometry was taken from, if any
    pub chip: Option<FlashChip>,
}

impl Target {
    /// Human-readable chip name for messages
    pub fn describe(&self) -> String {
        match &self.chip {
            Some(chip) => format!("{} {}", chip.vendor, chip.name),
            None => format!("unknown chip (assuming {})", DEFAULT_CHIP),
        }
    }
}

/// Chip assumed when neither `--chip` nor the JEDEC ID names one
pub const DEFAULT_CHIP: &str = "W25Q16JV";

/// Open the programmer, read the JEDEC ID and select the geometry
pub fn open_target(
    args: &TargetArgs,
    db: &ChipDatabase,
) -> Result<Target, Box<dyn std::error::Error>> {
    let bus = programmers::open_programmer(&args.programmer)?;
    let mut device = FlashDevice::new(bus, StdClock::new(), FlashGeometry::W25Q16JV);

    let jedec_id = device.identify()?;
    let chip = select_chip(db, args.chip.as_deref(), jedec_id)?;
    if let Some(chip) = &chip {
        device.set_geometry(chip.geometry);
    }

    log::info!(
        "Flash: {} [{}], {} bytes",
        chip.as_ref().map_or(DEFAULT_CHIP, |c| c.name.as_str()),
        jedec_id,
        device.geometry().total_size
    );

    Ok(Target {
        device,
        jedec_id,
        chip,
    })
}

/// Pick the chip definition for a probed id
///
/// An explicit name must exist in the database; a mismatching id is only
/// warned about. Without a name the id is looked up, and `None` means the
/// default geometry applies.
pub fn select_chip(
    db: &ChipDatabase,
    name: Option<&str>,
    id: JedecId,
) -> Result<Option<FlashChip>, Box<dyn std::error::Error>> {
    if let Some(name) = name {
        let chip = db
            .find_by_name(name)
            .ok_or_else(|| format!("Unknown chip: {} (see 'fpgaflash list-chips')", name))?;
        if !chip.matches_jedec_id(id) {
            log::warn!(
                "{} expects JEDEC ID {} but the flash answered {}",
                chip.name,
                chip.jedec_id,
                id
            );
        }
        return Ok(Some(chip.clone()));
    }

    if id.looks_absent() {
        log::warn!("JEDEC ID {} looks like no chip is connected", id);
    }

    match db.find_by_jedec_id(id) {
        Some(chip) => Ok(Some(chip.clone())),
        None => {
            log::warn!(
                "JEDEC ID {} is not in the chip database, assuming {}",
                id,
                DEFAULT_CHIP
            );
            Ok(None)
        }
    }
}

/// Geometry for commands that do not touch hardware
pub fn geometry_by_name(
    db: &ChipDatabase,
    name: Option<&str>,
) -> Result<FlashGeometry, Box<dyn std::error::Error>> {
    match name {
        Some(name) => db
            .find_by_name(name)
            .map(|c| c.geometry)
            .ok_or_else(|| format!("Unknown chip: {} (see 'fpgaflash list-chips')", name).into()),
        None => Ok(FlashGeometry::W25Q16JV),
    }
}

/// Temporary file holding `data`, removed when dropped
#[cfg(test)]
pub(crate) fn temp_file(data: &[u8]) -> tempfile::NamedTempFile {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

#[cfg(all(test, feature = "dummy"))]
pub(crate) fn dummy_target(options: &str) -> TargetArgs {
    TargetArgs {
        programmer: format!("dummy{}", options),
        chip: None,
    }
}

/// Format a byte count with binary units
pub fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTRA: &str = r#"
        (
            vendor: "Winbond",
            manufacturer_id: 0xEF,
            chips: [
                (name: "W25Q32JV", device_id: 0x4016, total_size: MiB(4)),
            ],
        )
    "#;

    fn db() -> ChipDatabase {
        let mut db = ChipDatabase::builtin();
        db.load_ron(EXTRA).unwrap();
        db
    }

    #[test]
    fn test_select_by_jedec_id() {
        let id = JedecId::from_bytes([0xEF, 0x40, 0x16]);
        let chip = select_chip(&db(), None, id).unwrap().unwrap();
        assert_eq!(chip.name, "W25Q32JV");
        assert_eq!(chip.geometry.total_size, 4 * 1024 * 1024);
    }

    #[test]
    fn test_select_by_name_overrides_id() {
        let id = JedecId::from_bytes([0xEF, 0x40, 0x16]);
        let chip = select_chip(&db(), Some("w25q16jv"), id).unwrap().unwrap();
        assert_eq!(chip.name, "W25Q16JV");
    }

    #[test]
    fn test_unknown_id_falls_back() {
        let id = JedecId::from_bytes([0xC2, 0x20, 0x15]);
        assert!(select_chip(&db(), None, id).unwrap().is_none());
        assert!(select_chip(&db(), Some("MX25L1605"), id).is_err());
    }

    #[test]
    fn test_geometry_by_name() {
        assert_eq!(geometry_by_name(&db(), None).unwrap(), FlashGeometry::W25Q16JV);
        assert_eq!(
            geometry_by_name(&db(), Some("W25Q32JV")).unwrap().total_size,
            4 * 1024 * 1024
        );
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(2 * 1024 * 1024), "2 MiB");
        assert_eq!(format_size(4096), "4 KiB");
        assert_eq!(format_size(4097), "4097 B");
    }
}
