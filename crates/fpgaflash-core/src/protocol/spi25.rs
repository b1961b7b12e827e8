//! SPI25 protocol implementation
//!
//! This module implements the common SPI flash command sequences
//! as defined by JEDEC. Each function issues exactly the transactions it
//! names; sequencing (write enable, readiness waits, bounds) belongs to
//! [`FlashDevice`](crate::flash::FlashDevice).

use crate::error::{Error, Result};
use crate::programmer::SpiMaster;
use crate::spi::{opcodes, SpiCommand};

/// Interval between status polls while waiting for WIP to clear
pub const POLL_INTERVAL_MS: u32 = 1;

/// Manufacturer and device identification read with RDID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JedecId {
    /// JEDEC manufacturer byte
    pub manufacturer: u8,
    /// Memory type and capacity bytes
    pub device: u16,
}

impl JedecId {
    /// Build an id from the three RDID response bytes
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self {
            manufacturer: bytes[0],
            device: u16::from_be_bytes([bytes[1], bytes[2]]),
        }
    }

    /// The three bytes as they appear on the wire
    pub fn to_bytes(self) -> [u8; 3] {
        let [hi, lo] = self.device.to_be_bytes();
        [self.manufacturer, hi, lo]
    }

    /// True for the all-zero / all-one responses of a floating or missing chip
    pub fn looks_absent(&self) -> bool {
        matches!(
            (self.manufacturer, self.device),
            (0x00, 0x0000) | (0xFF, 0xFFFF)
        )
    }
}

impl core::fmt::Display for JedecId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02X} {:04X}", self.manufacturer, self.device)
    }
}

/// Read the JEDEC ID from a flash chip
pub fn read_jedec_id<M: SpiMaster + ?Sized>(master: &mut M) -> Result<JedecId> {
    let mut buf = [0u8; 3];
    let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut buf);
    master.execute(&mut cmd)?;
    Ok(JedecId::from_bytes(buf))
}

/// Read the status register 1
pub fn read_status1<M: SpiMaster + ?Sized>(master: &mut M) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(opcodes::RDSR, &mut buf);
    master.execute(&mut cmd)?;
    Ok(buf[0])
}

/// Send the Write Enable command
pub fn write_enable<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WREN);
    master.execute(&mut cmd)
}

/// Send the Write Disable command
pub fn write_disable<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WRDI);
    master.execute(&mut cmd)
}

/// Send WRSR with a new status register 1 value
///
/// The caller is responsible for write enable and for waiting afterwards.
pub fn write_status1<M: SpiMaster + ?Sized>(master: &mut M, value: u8) -> Result<()> {
    let data = [value];
    let mut cmd = SpiCommand::write_reg(opcodes::WRSR, &data);
    master.execute(&mut cmd)
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// The status register is read on every poll; nothing is cached. Between
/// polls the master sleeps `poll_ms`. Fails with [`Error::BusyTimeout`] on
/// the first busy poll taken after more than `timeout_ms` have elapsed, so a
/// chip that never finishes costs at least `timeout_ms` and at most one poll
/// interval more.
pub fn wait_ready<M: SpiMaster + ?Sized>(
    master: &mut M,
    timeout_ms: u32,
    poll_ms: u32,
) -> Result<()> {
    let start = master.now_ms();
    loop {
        let status = read_status1(master)?;
        if status & opcodes::SR1_WIP == 0 {
            return Ok(());
        }
        let elapsed = master.now_ms().saturating_sub(start);
        if elapsed > timeout_ms as u64 {
            log::debug!("WIP still set after {} ms (status {:#04x})", elapsed, status);
            return Err(Error::BusyTimeout { timeout_ms });
        }
        master.sleep_ms(poll_ms);
    }
}

/// Read data from flash using 3-byte addressing
pub fn read_3b<M: SpiMaster + ?Sized>(master: &mut M, addr: u32, buf: &mut [u8]) -> Result<()> {
    let mut cmd = SpiCommand::read_3b(opcodes::READ, addr, buf);
    master.execute(&mut cmd)
}

/// Issue Page Program with 3-byte addressing
///
/// Addresses wrap within the page on the device side; the caller keeps
/// `data` inside one page.
pub fn program_page_3b<M: SpiMaster + ?Sized>(
    master: &mut M,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    let mut cmd = SpiCommand::write_3b(opcodes::PP, addr, data);
    master.execute(&mut cmd)
}

/// Issue an addressed erase command (sector or block)
pub fn erase_3b<M: SpiMaster + ?Sized>(master: &mut M, opcode: u8, addr: u32) -> Result<()> {
    let mut cmd = SpiCommand::erase_3b(opcode, addr);
    master.execute(&mut cmd)
}

/// Issue Chip Erase
pub fn chip_erase<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::CE_C7);
    master.execute(&mut cmd)
}
