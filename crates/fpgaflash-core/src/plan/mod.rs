//! Erase and program planning
//!
//! Pure functions from an image length and a [`FlashGeometry`] to the ordered
//! list of erase operations and page writes needed to place the image at
//! offset 0. No device access happens here.
//!
//! Full large blocks at the start of the image are erased with 64 KiB block
//! erase; the tail that does not fill a block is covered with 4 KiB sector
//! erases. Page writes partition the image into page-sized slices.

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::chip::FlashGeometry;
#[cfg(feature = "alloc")]
use crate::error::{Error, Result};

/// Size class of an erase command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EraseGranularity {
    /// 4 KiB sector erase (0x20)
    Sector,
    /// 64 KiB block erase (0xD8)
    Block64K,
    /// Whole-chip erase (0xC7)
    Chip,
}

impl EraseGranularity {
    /// Bytes erased by one operation of this class on `geometry`
    pub fn size(self, geometry: &FlashGeometry) -> u32 {
        match self {
            Self::Sector => geometry.sector_size,
            Self::Block64K => geometry.block_size,
            Self::Chip => geometry.total_size,
        }
    }
}

impl core::fmt::Display for EraseGranularity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Sector => write!(f, "sector"),
            Self::Block64K => write!(f, "block64k"),
            Self::Chip => write!(f, "chip"),
        }
    }
}

/// One erase command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseOp {
    /// First byte erased (aligned to the granularity)
    pub address: u32,
    /// Which erase command to issue
    pub granularity: EraseGranularity,
}

impl EraseOp {
    /// One past the last byte erased
    pub fn end(&self, geometry: &FlashGeometry) -> u64 {
        self.address as u64 + self.granularity.size(geometry) as u64
    }
}

/// How the erase plan covers the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EraseStrategy {
    /// Full 64 KiB blocks, then 4 KiB sectors for the tail
    #[default]
    Blocks,
    /// A single chip erase
    Chip,
}

/// Ordered, non-overlapping erase operations
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErasePlan {
    ops: Vec<EraseOp>,
    covered_len: u64,
}

#[cfg(feature = "alloc")]
impl ErasePlan {
    /// Operations in execution order
    pub fn ops(&self) -> &[EraseOp] {
        &self.ops
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True if nothing needs erasing
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Bytes erased by the whole plan, starting at 0
    pub fn covered_len(&self) -> u64 {
        self.covered_len
    }

    /// Count operations of one granularity
    pub fn count(&self, granularity: EraseGranularity) -> usize {
        self.ops
            .iter()
            .filter(|op| op.granularity == granularity)
            .count()
    }

    /// Iterate over operations
    pub fn iter(&self) -> core::slice::Iter<'_, EraseOp> {
        self.ops.iter()
    }
}

/// One page program: at most one page, page aligned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWrite<'a> {
    /// Page-aligned target address
    pub address: u32,
    /// Bytes to program
    pub data: &'a [u8],
}

/// Page writes partitioning an image
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgramPlan<'a> {
    pages: Vec<PageWrite<'a>>,
}

#[cfg(feature = "alloc")]
impl<'a> ProgramPlan<'a> {
    /// Page writes in execution order
    pub fn pages(&self) -> &[PageWrite<'a>] {
        &self.pages
    }

    /// Number of page writes
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// True for an empty image
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Iterate over page writes
    pub fn iter(&self) -> core::slice::Iter<'_, PageWrite<'a>> {
        self.pages.iter()
    }
}

/// Plan the erase operations covering `[0, len)`
///
/// With [`EraseStrategy::Blocks`] one block erase is emitted per full block
/// at `0, block, 2*block, ...` and the remainder is covered by
/// `ceil(rem / sector)` sector erases starting at `full_blocks * block`.
/// A zero-length image needs no erase under either strategy.
#[cfg(feature = "alloc")]
pub fn plan_erase(len: usize, geometry: &FlashGeometry, strategy: EraseStrategy) -> ErasePlan {
    let len = len as u64;
    if len == 0 {
        return ErasePlan::default();
    }

    if strategy == EraseStrategy::Chip {
        return ErasePlan {
            ops: alloc::vec![EraseOp {
                address: 0,
                granularity: EraseGranularity::Chip,
            }],
            covered_len: geometry.total_size as u64,
        };
    }

    let block = geometry.block_size as u64;
    let sector = geometry.sector_size as u64;

    let full_blocks = len / block;
    let tail_start = full_blocks * block;
    let tail_sectors = (len - tail_start).div_ceil(sector);

    let mut ops = Vec::with_capacity((full_blocks + tail_sectors) as usize);
    ops.extend((0..full_blocks).map(|i| EraseOp {
        address: (i * block) as u32,
        granularity: EraseGranularity::Block64K,
    }));
    ops.extend((0..tail_sectors).map(|i| EraseOp {
        address: (tail_start + i * sector) as u32,
        granularity: EraseGranularity::Sector,
    }));

    ErasePlan {
        ops,
        covered_len: tail_start + tail_sectors * sector,
    }
}

/// Plan the erase operations covering exactly `[start, start + len)`
///
/// Both ends must be sector aligned. Block erases are used wherever a whole
/// aligned block fits, sector erases elsewhere.
#[cfg(feature = "alloc")]
pub fn plan_erase_range(start: u32, len: u32, geometry: &FlashGeometry) -> Result<ErasePlan> {
    if !geometry.contains(start, len as usize) {
        return Err(Error::AddressOutOfBounds);
    }
    if start % geometry.sector_size != 0 || len % geometry.sector_size != 0 {
        return Err(Error::InvalidArgument);
    }

    let block = geometry.block_size as u64;
    let sector = geometry.sector_size as u64;
    let end = start as u64 + len as u64;

    let mut ops = Vec::new();
    let mut addr = start as u64;
    while addr < end {
        let granularity = if addr % block == 0 && addr + block <= end {
            EraseGranularity::Block64K
        } else {
            EraseGranularity::Sector
        };
        ops.push(EraseOp {
            address: addr as u32,
            granularity,
        });
        addr += if granularity == EraseGranularity::Block64K {
            block
        } else {
            sector
        };
    }

    Ok(ErasePlan {
        ops,
        covered_len: len as u64,
    })
}

/// Split `image` into page writes starting at address 0
#[cfg(feature = "alloc")]
pub fn plan_program<'a>(image: &'a [u8], geometry: &FlashGeometry) -> ProgramPlan<'a> {
    let page = geometry.page_size as usize;
    let pages = image
        .chunks(page)
        .enumerate()
        .map(|(i, data)| PageWrite {
            address: (i * page) as u32,
            data,
        })
        .collect();
    ProgramPlan { pages }
}
