//! Chip database for runtime loading and lookup
//!
//! This module provides the `ChipDatabase` type for loading chip definitions
//! from RON files at runtime. One file describes one vendor:
//!
//! ```ron
//! (
//!     vendor: "Winbond",
//!     manufacturer_id: 0xEF,
//!     chips: [
//!         (
//!             name: "W25Q16JV",
//!             device_id: 0x4015,
//!             total_size: MiB(2),
//!         ),
//!     ],
//! )
//! ```
//!
//! `page_size`, `sector_size` and `block_size` default to 256 B, 4 KiB and
//! 64 KiB.

use alloc::{string::String, vec::Vec};
use std::fs;
use std::io;
use std::path::Path;

use super::FlashGeometry;
use crate::protocol::JedecId;

/// Error type for chip database operations
#[derive(Debug, thiserror::Error)]
pub enum ChipDbError {
    /// I/O error reading files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// RON parsing error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// A chip's geometry is inconsistent
    #[error("Validation error: {0}")]
    Validation(String),
}

// ============================================================================
// RON deserialization types (intermediate format)
// ============================================================================

/// Size specification with human-readable units (for RON parsing)
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub enum Size {
    /// Size in bytes
    B(u32),
    /// Size in kibibytes (1024 bytes)
    KiB(u32),
    /// Size in mebibytes (1024 * 1024 bytes)
    MiB(u32),
}

impl Size {
    /// Convert to bytes, `None` if the result does not fit in 32 bits
    pub fn to_bytes(self) -> Option<u32> {
        match self {
            Size::B(n) => Some(n),
            Size::KiB(n) => n.checked_mul(1024),
            Size::MiB(n) => n.checked_mul(1024 * 1024),
        }
    }
}

fn size_bytes(chip: &str, field: &str, size: Size) -> Result<u32, ChipDbError> {
    size.to_bytes().ok_or_else(|| {
        ChipDbError::Validation(alloc::format!("{}: {} {:?} overflows 32 bits", chip, field, size))
    })
}

/// Single chip definition in RON format
#[derive(Debug, Clone, serde::Deserialize)]
struct ChipDef {
    name: String,
    device_id: u16,
    total_size: Size,
    #[serde(default = "default_page_size")]
    page_size: Size,
    #[serde(default = "default_sector_size")]
    sector_size: Size,
    #[serde(default = "default_block_size")]
    block_size: Size,
}

fn default_page_size() -> Size {
    Size::B(256)
}

fn default_sector_size() -> Size {
    Size::KiB(4)
}

fn default_block_size() -> Size {
    Size::KiB(64)
}

/// Vendor definition containing multiple chips
#[derive(Debug, Clone, serde::Deserialize)]
struct VendorDef {
    vendor: String,
    manufacturer_id: u8,
    chips: Vec<ChipDef>,
}

// ============================================================================
// Chip database
// ============================================================================

/// A known flash chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashChip {
    /// Vendor name
    pub vendor: String,
    /// Chip name
    pub name: String,
    /// Identification returned by RDID
    pub jedec_id: JedecId,
    /// Page, erase unit and capacity sizes
    pub geometry: FlashGeometry,
}

impl FlashChip {
    /// Check whether this chip answers RDID with `id`
    pub fn matches_jedec_id(&self, id: JedecId) -> bool {
        self.jedec_id == id
    }
}

/// Runtime chip database
///
/// Holds a collection of flash chip definitions that can be loaded from RON files.
#[derive(Debug, Clone, Default)]
pub struct ChipDatabase {
    chips: Vec<FlashChip>,
}

impl ChipDatabase {
    /// Create an empty chip database
    pub fn new() -> Self {
        Self { chips: Vec::new() }
    }

    /// Database holding only the built-in W25Q16JV
    pub fn builtin() -> Self {
        Self {
            chips: alloc::vec![FlashChip {
                vendor: "Winbond".into(),
                name: "W25Q16JV".into(),
                jedec_id: JedecId {
                    manufacturer: 0xEF,
                    device: 0x4015,
                },
                geometry: FlashGeometry::W25Q16JV,
            }],
        }
    }

    /// Load chip definitions from a single RON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, ChipDbError> {
        let content = fs::read_to_string(path)?;
        self.load_ron(&content)
    }

    /// Load chip definitions from a RON string
    ///
    /// A chip already present under the same name is replaced.
    pub fn load_ron(&mut self, content: &str) -> Result<usize, ChipDbError> {
        let vendor_def: VendorDef = ron::from_str(content)?;
        let count = vendor_def.chips.len();

        for chip_def in vendor_def.chips {
            let geometry = FlashGeometry {
                page_size: size_bytes(&chip_def.name, "page_size", chip_def.page_size)?,
                sector_size: size_bytes(&chip_def.name, "sector_size", chip_def.sector_size)?,
                block_size: size_bytes(&chip_def.name, "block_size", chip_def.block_size)?,
                total_size: size_bytes(&chip_def.name, "total_size", chip_def.total_size)?,
            };
            geometry.validate().map_err(|e| {
                ChipDbError::Validation(alloc::format!("{}: {}", chip_def.name, e))
            })?;

            let chip = FlashChip {
                vendor: vendor_def.vendor.clone(),
                name: chip_def.name,
                jedec_id: JedecId {
                    manufacturer: vendor_def.manufacturer_id,
                    device: chip_def.device_id,
                },
                geometry,
            };
            log::debug!("chip db: {} {} ({})", chip.vendor, chip.name, chip.jedec_id);

            self.chips.retain(|c| !c.name.eq_ignore_ascii_case(&chip.name));
            self.chips.push(chip);
        }

        Ok(count)
    }

    /// Load all RON files from a directory
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, ChipDbError> {
        let mut total = 0;

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "ron") {
                total += self.load_file(&path)?;
            }
        }

        Ok(total)
    }

    /// Get all chips in the database
    pub fn chips(&self) -> &[FlashChip] {
        &self.chips
    }

    /// Get the number of chips in the database
    pub fn len(&self) -> usize {
        self.chips.len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }

    /// Find a chip by its JEDEC ID
    pub fn find_by_jedec_id(&self, id: JedecId) -> Option<&FlashChip> {
        self.chips.iter().find(|c| c.matches_jedec_id(id))
    }

    /// Find a chip by exact name, ignoring case
    pub fn find_by_name(&self, name: &str) -> Option<&FlashChip> {
        self.chips
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Iterate over all chips
    pub fn iter(&self) -> impl Iterator<Item = &FlashChip> {
        self.chips.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINBOND: &str = r#"
        (
            vendor: "Winbond",
            manufacturer_id: 0xEF,
            chips: [
                (
                    name: "W25Q16JV",
                    device_id: 0x4015,
                    total_size: MiB(2),
                ),
                (
                    name: "W25Q128JV",
                    device_id: 0x4018,
                    total_size: MiB(16),
                    page_size: B(256),
                    sector_size: KiB(4),
                    block_size: KiB(64),
                ),
            ],
        )
    "#;

    #[test]
    fn test_load_ron() {
        let mut db = ChipDatabase::new();
        let count = db.load_ron(WINBOND).unwrap();

        assert_eq!(count, 2);
        assert_eq!(db.len(), 2);

        let chip = db
            .find_by_jedec_id(JedecId {
                manufacturer: 0xEF,
                device: 0x4018,
            })
            .unwrap();
        assert_eq!(chip.name, "W25Q128JV");
        assert_eq!(chip.vendor, "Winbond");
        assert_eq!(chip.geometry.total_size, 16 * 1024 * 1024);
    }

    #[test]
    fn test_defaults_match_builtin() {
        let mut db = ChipDatabase::new();
        db.load_ron(WINBOND).unwrap();
        let loaded = db.find_by_name("w25q16jv").unwrap();
        let builtin = ChipDatabase::builtin();
        assert_eq!(loaded, &builtin.chips()[0]);
    }

    #[test]
    fn test_reload_replaces_by_name() {
        let mut db = ChipDatabase::builtin();
        db.load_ron(WINBOND).unwrap();
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn test_bad_geometry_rejected() {
        let ron = r#"
            (
                vendor: "Acme",
                manufacturer_id: 0x01,
                chips: [(name: "BAD", device_id: 0x0001, total_size: KiB(32))],
            )
        "#;
        let mut db = ChipDatabase::new();
        assert!(matches!(
            db.load_ron(ron),
            Err(ChipDbError::Validation(_))
        ));
        assert!(db.is_empty());
    }

    #[test]
    fn test_oversized_chips_rejected() {
        // Beyond the reach of 3-byte addresses
        let ron = r#"
            (
                vendor: "Winbond",
                manufacturer_id: 0xEF,
                chips: [(name: "W25Q256JV", device_id: 0x4019, total_size: MiB(32))],
            )
        "#;
        let mut db = ChipDatabase::new();
        assert!(matches!(db.load_ron(ron), Err(ChipDbError::Validation(_))));
        assert!(db.is_empty());

        // Does not fit in u32 at all
        let ron = r#"
            (
                vendor: "Acme",
                manufacturer_id: 0x01,
                chips: [(name: "HUGE", device_id: 0x0002, total_size: MiB(4096))],
            )
        "#;
        match db.load_ron(ron) {
            Err(ChipDbError::Validation(msg)) => assert!(msg.contains("HUGE")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(db.is_empty());
    }

    #[test]
    fn test_shipped_vendor_files_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../chips/vendors");
        let mut db = ChipDatabase::builtin();
        let count = db.load_dir(&dir).unwrap();
        assert!(count >= 5);

        // The shipped W25Q16JV replaces the builtin one with identical contents
        assert_eq!(db.iter().filter(|c| c.name == "W25Q16JV").count(), 1);
        let gd = db
            .find_by_jedec_id(JedecId {
                manufacturer: 0xC8,
                device: 0x4015,
            })
            .unwrap();
        assert_eq!(gd.geometry, FlashGeometry::W25Q16JV);
    }

    #[test]
    fn test_size_conversion() {
        assert_eq!(Size::B(256).to_bytes(), Some(256));
        assert_eq!(Size::KiB(4).to_bytes(), Some(4096));
        assert_eq!(Size::KiB(64).to_bytes(), Some(65536));
        assert_eq!(Size::MiB(2).to_bytes(), Some(2097152));
        assert_eq!(Size::MiB(4096).to_bytes(), None);
    }
}
