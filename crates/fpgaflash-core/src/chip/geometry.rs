//! Flash geometry

use crate::error::{Error, Result};
use crate::spi::AddressWidth;

/// Page, sector, block and total sizes of a SPI NOR flash
///
/// Geometry is configuration rather than protocol: a different chip supplies
/// different constants without changing the driver or planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    /// Page program granularity in bytes
    pub page_size: u32,
    /// Smallest erase unit (SE 0x20) in bytes
    pub sector_size: u32,
    /// Large erase unit (BE 0xD8) in bytes
    pub block_size: u32,
    /// Total capacity in bytes
    pub total_size: u32,
}

impl FlashGeometry {
    /// Winbond W25Q16JV, 16 Mbit
    pub const W25Q16JV: Self = Self {
        page_size: 256,
        sector_size: 4096,
        block_size: 65536,
        total_size: 2 * 1024 * 1024,
    };

    /// Check `page < sector < block <= total`, all powers of two
    ///
    /// The total must also fit the 3-byte address phase.
    pub fn validate(&self) -> Result<()> {
        if self.total_size > AddressWidth::ThreeByte.max_size() {
            return Err(Error::InvalidGeometry);
        }
        let sizes = [
            self.page_size,
            self.sector_size,
            self.block_size,
            self.total_size,
        ];
        if sizes.iter().any(|s| !s.is_power_of_two()) {
            return Err(Error::InvalidGeometry);
        }
        if self.page_size < self.sector_size
            && self.sector_size < self.block_size
            && self.block_size <= self.total_size
        {
            Ok(())
        } else {
            Err(Error::InvalidGeometry)
        }
    }

    /// Whether `[address, address + len)` lies inside the device
    pub fn contains(&self, address: u32, len: usize) -> bool {
        (address as u64) + (len as u64) <= self.total_size as u64
    }

    /// Number of page writes needed for `len` bytes starting at offset 0
    pub fn pages_for(&self, len: usize) -> usize {
        len.div_ceil(self.page_size as usize)
    }
}

impl Default for FlashGeometry {
    fn default() -> Self {
        Self::W25Q16JV
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_w25q16jv_is_valid() {
        assert_eq!(FlashGeometry::W25Q16JV.validate(), Ok(()));
        assert_eq!(FlashGeometry::W25Q16JV.total_size, 0x20_0000);
    }

    #[test]
    fn test_invalid_geometries() {
        let mut g = FlashGeometry::W25Q16JV;
        g.sector_size = 3000;
        assert_eq!(g.validate(), Err(Error::InvalidGeometry));

        let mut g = FlashGeometry::W25Q16JV;
        g.block_size = g.sector_size;
        assert_eq!(g.validate(), Err(Error::InvalidGeometry));

        let mut g = FlashGeometry::W25Q16JV;
        g.total_size = 32 * 1024;
        assert_eq!(g.validate(), Err(Error::InvalidGeometry));

        // block == total is allowed
        let mut g = FlashGeometry::W25Q16JV;
        g.total_size = g.block_size;
        assert_eq!(g.validate(), Ok(()));
    }

    #[test]
    fn test_capacity_limited_to_three_byte_addressing() {
        let mut g = FlashGeometry::W25Q16JV;
        g.total_size = 16 * 1024 * 1024;
        assert_eq!(g.validate(), Ok(()));

        g.total_size = 32 * 1024 * 1024;
        assert_eq!(g.validate(), Err(Error::InvalidGeometry));
    }

    #[test]
    fn test_contains_and_pages() {
        let g = FlashGeometry::W25Q16JV;
        assert!(g.contains(0, g.total_size as usize));
        assert!(!g.contains(0, g.total_size as usize + 1));
        assert!(!g.contains(g.total_size - 1, 2));
        assert_eq!(g.pages_for(0), 0);
        assert_eq!(g.pages_for(1), 1);
        assert_eq!(g.pages_for(256), 1);
        assert_eq!(g.pages_for(257), 2);
    }
}
