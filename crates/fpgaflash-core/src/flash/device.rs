//! SPI NOR flash device driver
//!
//! [`FlashDevice`] owns the command channel and sequences the SPI25
//! primitives into safe operations: every mutating operation waits for the
//! chip to be idle, sets the write enable latch immediately before the
//! command, and then waits again with an operation-specific timeout.

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::chip::FlashGeometry;
use crate::error::{Error, Result};
use crate::flash::DeviceStatus;
use crate::plan::{EraseGranularity, EraseOp};
use crate::programmer::{Clock, SpiBus, SpiMaster, SpiTransport};
use crate::protocol::{self, JedecId, POLL_INTERVAL_MS};
use crate::spi::opcodes;

/// Readiness timeouts per operation, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Wait before any command and after status writes
    pub default_ms: u32,
    /// Page program completion
    pub program_ms: u32,
    /// 4 KiB sector erase completion
    pub sector_erase_ms: u32,
    /// 64 KiB block erase completion
    pub block_erase_ms: u32,
    /// Chip erase completion
    pub chip_erase_ms: u32,
    /// Sleep between status polls
    pub poll_interval_ms: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default_ms: 5000,
            program_ms: 5000,
            sector_erase_ms: 1000,
            block_erase_ms: 3000,
            chip_erase_ms: 20000,
            poll_interval_ms: POLL_INTERVAL_MS,
        }
    }
}

/// Driver for a single SPI NOR flash
///
/// The device is the only user of its command channel. It holds no state
/// between operations apart from configuration and is reusable once an
/// operation has returned, whether it succeeded or not.
pub struct FlashDevice<M> {
    master: M,
    geometry: FlashGeometry,
    timeouts: Timeouts,
}

impl<B: SpiBus, C: Clock> FlashDevice<SpiTransport<B, C>> {
    /// Build a driver on a host bus and clock
    pub fn new(bus: B, clock: C, geometry: FlashGeometry) -> Self {
        Self::with_master(SpiTransport::new(bus, clock), geometry)
    }
}

impl<M: SpiMaster> FlashDevice<M> {
    /// Build a driver on an existing command channel
    pub fn with_master(master: M, geometry: FlashGeometry) -> Self {
        Self {
            master,
            geometry,
            timeouts: Timeouts::default(),
        }
    }

    /// Geometry the driver checks bounds against
    pub fn geometry(&self) -> &FlashGeometry {
        &self.geometry
    }

    /// Switch to another geometry, e.g. after identifying the chip
    pub fn set_geometry(&mut self, geometry: FlashGeometry) {
        self.geometry = geometry;
    }

    /// Shared access to the command channel
    pub fn master(&self) -> &M {
        &self.master
    }

    /// Exclusive access to the command channel
    pub fn master_mut(&mut self) -> &mut M {
        &mut self.master
    }

    /// Current time from the channel's clock
    pub fn now_ms(&self) -> u64 {
        self.master.now_ms()
    }

    /// Read manufacturer and device id (RDID)
    pub fn identify(&mut self) -> Result<JedecId> {
        let id = protocol::read_jedec_id(&mut self.master)?;
        log::debug!("RDID: {}", id);
        Ok(id)
    }

    /// Poll the status register until the busy bit clears
    pub fn wait_ready(&mut self, timeout_ms: u32) -> Result<()> {
        protocol::wait_ready(&mut self.master, timeout_ms, self.timeouts.poll_interval_ms)
    }

    /// Set the write enable latch
    pub fn write_enable(&mut self) -> Result<()> {
        protocol::write_enable(&mut self.master)
    }

    /// Clear the write enable latch
    pub fn write_disable(&mut self) -> Result<()> {
        protocol::write_disable(&mut self.master)
    }

    /// Read status register 1
    pub fn read_status(&mut self) -> Result<DeviceStatus> {
        let raw = protocol::read_status1(&mut self.master)?;
        Ok(DeviceStatus::from_bits_retain(raw))
    }

    /// Write status register 1 (WRSR), e.g. to clear block protection
    pub fn write_status(&mut self, value: u8) -> Result<()> {
        self.wait_ready(self.timeouts.default_ms)?;
        self.write_enable()?;
        protocol::write_status1(&mut self.master, value)?;
        self.wait_ready(self.timeouts.default_ms)
    }

    /// Read `buf.len()` bytes starting at `address`
    pub fn read_into(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        if !self.geometry.contains(address, buf.len()) {
            return Err(Error::AddressOutOfBounds);
        }
        if buf.is_empty() {
            return Ok(());
        }
        self.wait_ready(self.timeouts.default_ms)?;
        protocol::read_3b(&mut self.master, address, buf)
    }

    /// Read `len` bytes starting at `address`
    #[cfg(feature = "alloc")]
    pub fn read_range(&mut self, address: u32, len: usize) -> Result<Vec<u8>> {
        let mut buf = alloc::vec![0u8; len];
        self.read_into(address, &mut buf)?;
        Ok(buf)
    }

    /// Program up to one page at `address`
    ///
    /// The driver does not split or realign: bytes past the end of the page
    /// wrap on the device, so callers pass page-aligned slices.
    pub fn write_page(&mut self, address: u32, data: &[u8]) -> Result<()> {
        if data.len() > self.geometry.page_size as usize {
            return Err(Error::InvalidArgument);
        }
        if data.is_empty() {
            return Ok(());
        }
        if !self.geometry.contains(address, data.len()) {
            return Err(Error::AddressOutOfBounds);
        }

        self.wait_ready(self.timeouts.default_ms)?;
        self.write_enable()?;
        protocol::program_page_3b(&mut self.master, address, data)?;
        self.wait_ready(self.timeouts.program_ms)
    }

    /// Erase the 4 KiB sector containing `address`
    pub fn erase_sector(&mut self, address: u32) -> Result<()> {
        self.erase_addressed(opcodes::SE_20, address, self.timeouts.sector_erase_ms)
    }

    /// Erase the 64 KiB block containing `address`
    pub fn erase_block_64k(&mut self, address: u32) -> Result<()> {
        self.erase_addressed(opcodes::BE_D8, address, self.timeouts.block_erase_ms)
    }

    /// Erase the whole chip
    pub fn erase_chip(&mut self) -> Result<()> {
        self.wait_ready(self.timeouts.default_ms)?;
        self.write_enable()?;
        protocol::chip_erase(&mut self.master)?;
        self.wait_ready(self.timeouts.chip_erase_ms)
    }

    /// Execute one planned erase operation
    pub fn erase(&mut self, op: &EraseOp) -> Result<()> {
        match op.granularity {
            EraseGranularity::Sector => self.erase_sector(op.address),
            EraseGranularity::Block64K => self.erase_block_64k(op.address),
            EraseGranularity::Chip => self.erase_chip(),
        }
    }

    fn erase_addressed(&mut self, opcode: u8, address: u32, timeout_ms: u32) -> Result<()> {
        if address >= self.geometry.total_size {
            return Err(Error::AddressOutOfBounds);
        }
        self.wait_ready(self.timeouts.default_ms)?;
        self.write_enable()?;
        protocol::erase_3b(&mut self.master, opcode, address)?;
        self.wait_ready(timeout_ms)
    }
}
