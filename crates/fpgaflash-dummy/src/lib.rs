//! fpgaflash-dummy - In-memory SPI NOR flash emulator
//!
//! This crate provides a dummy programmer that emulates a SPI NOR flash chip
//! at the byte level behind the [`SpiBus`] trait. It's useful for testing and
//! development without real hardware.
//!
//! The emulation follows NOR semantics: erase sets every byte of the aligned
//! region to `0xFF`, page program ANDs data into the array (bits only go from
//! 1 to 0) and wraps within the page. Commands that modify the array need the
//! write enable latch and complete when chip select is released. The busy bit
//! stays set for a configurable number of status polls afterwards.
//!
//! Faults can be injected for tests: failing transfers, a chip that never
//! leaves busy, and read-back corruption at chosen addresses.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use fpgaflash_core::error::{Error, Result};
use fpgaflash_core::programmer::SpiBus;
use fpgaflash_core::spi::opcodes;

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC device ID
    pub device_id: u16,
    /// Flash size in bytes
    pub size: usize,
    /// Page size for programming
    pub page_size: usize,
    /// Sector size for SE (0x20)
    pub sector_size: usize,
    /// Block size for BE (0xD8)
    pub block_size: usize,
    /// Status polls that report busy after a program, erase or status write
    pub busy_polls: u32,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            manufacturer_id: 0xEF, // Winbond
            device_id: 0x4015,     // W25Q16JV
            size: 2 * 1024 * 1024,
            page_size: 256,
            sector_size: 4096,
            block_size: 65536,
            busy_polls: 1,
        }
    }
}

/// Array-modifying or reading operation seen by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOp {
    /// RDID answered
    Identify,
    /// READ of `len` bytes
    Read {
        /// Start address
        address: u32,
        /// Bytes clocked out
        len: usize,
    },
    /// Page program accepted
    Program {
        /// Start address
        address: u32,
        /// Bytes received
        len: usize,
    },
    /// Sector or block erase accepted
    Erase {
        /// Aligned start address
        address: u32,
        /// Bytes erased
        size: usize,
    },
    /// Chip erase accepted
    ChipErase,
    /// Status register written
    WriteStatus(u8),
}

impl FlashOp {
    /// True for erase and program operations
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Program { .. } | Self::Erase { .. } | Self::ChipErase | Self::WriteStatus(_)
        )
    }
}

/// Dummy flash chip
///
/// Emulates a flash chip in memory for testing purposes.
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    /// Non-volatile status bits (BP, TB, SEC, SRP0)
    status: u8,
    write_enabled: bool,
    busy_remaining: u32,
    stuck_busy: bool,
    selected: bool,
    frame: Vec<u8>,
    clocked_out: usize,
    fail_next_transfer: bool,
    fail_opcode: Option<u8>,
    corrupt: Vec<u32>,
    log: Vec<FlashOp>,
}

impl DummyFlash {
    /// Create a new dummy flash with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            status: 0,
            write_enabled: false,
            busy_remaining: 0,
            stuck_busy: false,
            selected: false,
            frame: Vec::new(),
            clocked_out: 0,
            fail_next_transfer: false,
            fail_opcode: None,
            corrupt: Vec::new(),
            log: Vec::new(),
        }
    }

    /// Create a new dummy flash with default configuration (W25Q16JV)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy flash with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Operations executed so far
    pub fn ops(&self) -> &[FlashOp] {
        &self.log
    }

    /// Whether chip select is currently asserted
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Keep the busy bit set forever
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    /// Fail the next transfer with a communication error
    pub fn fail_next_transfer(&mut self) {
        self.fail_next_transfer = true;
    }

    /// Fail every transfer of transactions starting with `opcode`
    pub fn fail_opcode(&mut self, opcode: Option<u8>) {
        self.fail_opcode = opcode;
    }

    /// Invert the byte at `address` whenever it is read
    pub fn corrupt_reads_at(&mut self, address: u32) {
        self.corrupt.push(address);
    }

    fn is_busy(&self) -> bool {
        self.stuck_busy || self.busy_remaining > 0
    }

    fn status_byte(&self) -> u8 {
        let mut sr = self.status;
        if self.write_enabled {
            sr |= opcodes::SR1_WEL;
        }
        if self.is_busy() {
            sr |= opcodes::SR1_WIP;
        }
        sr
    }

    fn frame_address(&self) -> Option<u32> {
        let bytes = self.frame.get(1..4)?;
        Some(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    fn next_out_byte(&mut self) -> u8 {
        let index = self.clocked_out;
        self.clocked_out += 1;

        let Some(&opcode) = self.frame.first() else {
            return 0xFF;
        };
        if opcode == opcodes::RDSR {
            return self.status_byte();
        }
        if self.is_busy() {
            return 0xFF;
        }
        match opcode {
            opcodes::RDID => {
                let [hi, lo] = self.config.device_id.to_be_bytes();
                [self.config.manufacturer_id, hi, lo]
                    .get(index)
                    .copied()
                    .unwrap_or(0xFF)
            }
            opcodes::READ => match self.frame_address() {
                Some(address) => {
                    let pos = (address as usize + index) % self.data.len();
                    let byte = self.data[pos];
                    if self.corrupt.contains(&(pos as u32)) {
                        byte ^ 0xFF
                    } else {
                        byte
                    }
                }
                None => 0xFF,
            },
            _ => 0xFF,
        }
    }

    fn take_write_enable(&mut self, what: &str) -> bool {
        if !self.write_enabled {
            log::warn!("dummy: {} without WREN ignored", what);
            return false;
        }
        self.write_enabled = false;
        true
    }

    fn erase_region(&mut self, address: u32, size: usize) {
        let start = (address as usize) & !(size - 1);
        if start + size > self.data.len() {
            log::warn!("dummy: erase at {:#08x} beyond end of array ignored", address);
            return;
        }
        self.data[start..start + size].fill(0xFF);
        self.busy_remaining = self.config.busy_polls;
        self.log.push(FlashOp::Erase {
            address: start as u32,
            size,
        });
    }

    fn page_program(&mut self, address: u32, payload: &[u8]) {
        let page = self.config.page_size;
        let base = (address as usize % self.data.len()) & !(page - 1);
        let offset = address as usize & (page - 1);
        // Flash programming: can only change 1 -> 0
        for (i, &byte) in payload.iter().enumerate() {
            self.data[base + (offset + i) % page] &= byte;
        }
        self.busy_remaining = self.config.busy_polls;
        self.log.push(FlashOp::Program {
            address,
            len: payload.len(),
        });
    }

    /// Execute the transaction collected while chip select was low
    fn complete_frame(&mut self) {
        let frame = core::mem::take(&mut self.frame);
        let clocked_out = core::mem::take(&mut self.clocked_out);
        let Some(&opcode) = frame.first() else {
            return;
        };

        if opcode == opcodes::RDSR {
            if clocked_out > 0 && self.busy_remaining > 0 {
                self.busy_remaining -= 1;
            }
            return;
        }
        if self.is_busy() {
            log::warn!(
                "dummy: {} ignored while busy",
                opcodes::mnemonic(opcode)
            );
            return;
        }

        let address = frame
            .get(1..4)
            .map(|b| u32::from_be_bytes([0, b[0], b[1], b[2]]));

        match (opcode, address) {
            (opcodes::RDID, _) => self.log.push(FlashOp::Identify),
            (opcodes::WREN, _) => self.write_enabled = true,
            (opcodes::WRDI, _) => self.write_enabled = false,
            (opcodes::WRSR, _) if frame.len() >= 2 => {
                if self.take_write_enable("WRSR") {
                    self.status = frame[1] & !(opcodes::SR1_WIP | opcodes::SR1_WEL);
                    self.busy_remaining = self.config.busy_polls;
                    self.log.push(FlashOp::WriteStatus(self.status));
                }
            }
            (opcodes::READ, Some(address)) => self.log.push(FlashOp::Read {
                address,
                len: clocked_out,
            }),
            (opcodes::PP, Some(address)) => {
                if self.take_write_enable("PP") {
                    self.page_program(address, &frame[4..]);
                }
            }
            (opcodes::SE_20, Some(address)) => {
                if self.take_write_enable("SE") {
                    self.erase_region(address, self.config.sector_size);
                }
            }
            (opcodes::BE_D8, Some(address)) => {
                if self.take_write_enable("BE64") {
                    self.erase_region(address, self.config.block_size);
                }
            }
            (opcodes::CE_C7, _) => {
                if self.take_write_enable("CE") {
                    self.data.fill(0xFF);
                    self.busy_remaining = self.config.busy_polls;
                    self.log.push(FlashOp::ChipErase);
                }
            }
            _ => log::warn!(
                "dummy: unsupported or truncated command {:#04x} ({} bytes)",
                opcode,
                frame.len()
            ),
        }
    }
}

impl Default for DummyFlash {
    fn default() -> Self {
        Self::new_default()
    }
}

impl SpiBus for DummyFlash {
    fn select(&mut self) -> Result<()> {
        if self.selected {
            log::warn!("dummy: chip select asserted twice");
        }
        self.selected = true;
        self.frame.clear();
        self.clocked_out = 0;
        Ok(())
    }

    fn deselect(&mut self) -> Result<()> {
        if self.selected {
            self.selected = false;
            self.complete_frame();
        }
        Ok(())
    }

    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        if !self.selected {
            log::warn!("dummy: transfer without chip select");
            return Err(Error::Communication);
        }
        if core::mem::take(&mut self.fail_next_transfer) {
            // A broken transfer leaves the transaction unusable
            self.frame.clear();
            return Err(Error::Communication);
        }

        self.frame.extend_from_slice(write);
        if self.fail_opcode.is_some() && self.fail_opcode == self.frame.first().copied() {
            self.frame.clear();
            return Err(Error::Communication);
        }

        for byte in read.iter_mut() {
            *byte = self.next_out_byte();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpgaflash_core::chip::FlashGeometry;
    use fpgaflash_core::flash::FlashDevice;
    use fpgaflash_core::programmer::{ManualClock, SpiTransport};
    use fpgaflash_core::workflow::{
        BitstreamImage, FailureKind, NoProgress, Workflow, WorkflowOptions, MAX_MISMATCHES,
        VERIFY_CHUNK_SIZE,
    };

    const G: FlashGeometry = FlashGeometry::W25Q16JV;

    type Device<'a> = FlashDevice<SpiTransport<&'a mut DummyFlash, ManualClock>>;

    fn device(flash: &mut DummyFlash) -> Device<'_> {
        FlashDevice::new(flash, ManualClock::new(), G)
    }

    fn image(len: usize) -> BitstreamImage {
        BitstreamImage::new((0..len).map(|i| (i.wrapping_mul(31) >> 3) as u8).collect())
    }

    fn count(flash: &DummyFlash, pred: impl Fn(&FlashOp) -> bool) -> usize {
        flash.ops().iter().filter(|op| pred(op)).count()
    }

    #[test]
    fn test_read_jedec_id() {
        let mut flash = DummyFlash::new_default();
        let id = device(&mut flash).identify().unwrap();
        assert_eq!(id.manufacturer, 0xEF);
        assert_eq!(id.device, 0x4015);
        assert_eq!(flash.ops(), &[FlashOp::Identify]);
    }

    #[test]
    fn test_read_write() {
        let mut flash = DummyFlash::new_default();
        let mut dev = device(&mut flash);

        let data = [0x12, 0x34, 0x56, 0x78];
        dev.write_page(0x1000, &data).unwrap();
        assert_eq!(dev.read_range(0x1000, 4).unwrap(), data);
    }

    #[test]
    fn test_program_without_wren_is_ignored() {
        let mut flash = DummyFlash::new_default();
        flash.select().unwrap();
        flash.transfer(&[opcodes::PP, 0, 0, 0, 0x00], &mut []).unwrap();
        flash.deselect().unwrap();
        assert_eq!(flash.data()[0], 0xFF);
        assert!(flash.ops().is_empty());
    }

    #[test]
    fn test_page_program_wraps_within_page() {
        let mut flash = DummyFlash::new_default();
        device(&mut flash).write_page(0x1FE, &[0x01, 0x02, 0x03]).unwrap();
        assert_eq!(flash.data()[0x1FE], 0x01);
        assert_eq!(flash.data()[0x1FF], 0x02);
        assert_eq!(flash.data()[0x100], 0x03);
        assert_eq!(flash.data()[0x200], 0xFF);
    }

    #[test]
    fn test_erase() {
        let mut flash = DummyFlash::new_default();
        let mut dev = device(&mut flash);

        dev.write_page(0, &[0x00u8; 256]).unwrap();
        assert!(dev.read_range(0, 256).unwrap().iter().all(|&b| b == 0));

        dev.erase_sector(0x80).unwrap();
        assert!(dev.read_range(0, 256).unwrap().iter().all(|&b| b == 0xFF));
        drop(dev);
        assert!(flash.ops().contains(&FlashOp::Erase {
            address: 0,
            size: 4096
        }));
    }

    #[test]
    fn test_busy_bit_is_polled() {
        let mut flash = DummyFlash::new(DummyConfig {
            busy_polls: 3,
            ..Default::default()
        });
        let mut dev = device(&mut flash);
        dev.erase_sector(0).unwrap();
        // Commands issued right after would be ignored if the driver had not waited
        dev.write_page(0, &[0xA5]).unwrap();
        assert_eq!(dev.read_range(0, 1).unwrap(), [0xA5]);
    }

    #[test]
    fn test_commands_while_busy_are_ignored() {
        let mut flash = DummyFlash::new(DummyConfig {
            busy_polls: 5,
            ..Default::default()
        });
        {
            let mut transport = SpiTransport::new(&mut flash, ManualClock::new());
            fpgaflash_core::protocol::write_enable(&mut transport).unwrap();
            fpgaflash_core::protocol::erase_3b(&mut transport, opcodes::SE_20, 0).unwrap();
            fpgaflash_core::protocol::write_enable(&mut transport).unwrap();
            fpgaflash_core::protocol::program_page_3b(&mut transport, 0, &[0]).unwrap();
        }
        assert_eq!(flash.data()[0], 0xFF);
        assert_eq!(count(&flash, |op| matches!(op, FlashOp::Program { .. })), 0);
    }

    #[test]
    fn test_transfer_failure_releases_chip_select() {
        let mut flash = DummyFlash::new_default();
        flash.fail_next_transfer();
        {
            let mut dev = device(&mut flash);
            assert_eq!(dev.identify(), Err(Error::Communication));
            assert!(dev.identify().is_ok());
        }
        assert!(!flash.is_selected());
    }

    // ------------------------------------------------------------------
    // Workflow against the emulator
    // ------------------------------------------------------------------

    #[test]
    fn test_round_trip() {
        for len in [1, 255, 256, 4097, 65536 + 300, 3 * 65536] {
            let mut flash = DummyFlash::new_default();
            let img = image(len);
            let report = Workflow::new(&mut device(&mut flash), WorkflowOptions::default())
                .run(&img, &mut NoProgress)
                .unwrap();
            assert_eq!(report.image_len, len);
            assert_eq!(&flash.data()[..len], img.as_bytes());
        }
    }

    #[test]
    fn test_programming_without_erase_is_detected() {
        // Flash holds 0x00 where the new image wants 0xFF: bits cannot be set
        let mut flash = DummyFlash::with_data(DummyConfig::default(), &[0x00; 64]);
        let img = BitstreamImage::new(vec![0xFF; 64]);
        {
            let mut dev = device(&mut flash);
            dev.write_page(0, img.as_bytes()).unwrap();
            let report =
                fpgaflash_core::workflow::verify_image(&mut dev, img.as_bytes(), &mut NoProgress)
                    .unwrap();
            assert_eq!(report.mismatches.len(), 1);
            assert_eq!(report.mismatches[0].offset, 0);
            assert_eq!(&report.mismatches[0].actual[..], &[0u8; 16]);
        }
        assert!(flash.data()[..64].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_capacity_boundary() {
        let mut flash = DummyFlash::new_default();
        let full = image(G.total_size as usize);
        Workflow::new(&mut device(&mut flash), WorkflowOptions::default())
            .run(&full, &mut NoProgress)
            .unwrap();

        let mut flash = DummyFlash::new_default();
        let err = Workflow::new(&mut device(&mut flash), WorkflowOptions::default())
            .run(&image(G.total_size as usize + 1), &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err.kind, FailureKind::SizeExceeded { .. }));
        assert!(flash.ops().is_empty());
    }

    #[test]
    fn test_timeout_is_measured_on_injected_clock() {
        let mut flash = DummyFlash::new_default();
        flash.set_stuck_busy(true);
        let clock = ManualClock::new();
        let mut dev = FlashDevice::new(&mut flash, clock.clone(), G);

        assert_eq!(
            dev.wait_ready(100),
            Err(Error::BusyTimeout { timeout_ms: 100 })
        );
        let elapsed_us = clock.now_us();
        assert!(elapsed_us >= 100_000, "gave up early: {elapsed_us} us");
        assert!(elapsed_us < 103_000, "waited too long: {elapsed_us} us");
    }

    /// Run `erase` against a flash that stays busy once the command lands,
    /// returning the error and the simulated milliseconds spent
    fn erase_never_finishes(erase: impl FnOnce(&mut Device<'_>) -> Result<()>) -> (Error, u64) {
        let mut flash = DummyFlash::new(DummyConfig {
            busy_polls: u32::MAX,
            ..Default::default()
        });
        let clock = ManualClock::new();
        let mut dev = FlashDevice::new(&mut flash, clock.clone(), G);
        let err = erase(&mut dev).unwrap_err();
        (err, clock.now_us() / 1000)
    }

    #[test]
    fn test_erase_waits_use_operation_timeouts() {
        let cases: [(fn(&mut Device<'_>) -> Result<()>, u32); 3] = [
            (|dev| dev.erase_sector(0x1000), 1000),
            (|dev| dev.erase_block_64k(0x10000), 3000),
            (|dev| dev.erase_chip(), 20000),
        ];

        for (erase, timeout_ms) in cases {
            let (err, elapsed_ms) = erase_never_finishes(erase);
            assert_eq!(err, Error::BusyTimeout { timeout_ms });
            assert!(elapsed_ms >= timeout_ms as u64, "gave up early: {elapsed_ms} ms");
            assert!(
                elapsed_ms < (timeout_ms + timeout_ms / 20) as u64,
                "waited too long: {elapsed_ms} ms for {timeout_ms} ms"
            );
        }
    }

    #[test]
    fn test_scenario_two_byte_image() {
        let mut flash = DummyFlash::new_default();
        let img = BitstreamImage::new(vec![0xDE, 0xAD]);
        let report = Workflow::new(&mut device(&mut flash), WorkflowOptions::default())
            .run(&img, &mut NoProgress)
            .unwrap();

        assert_eq!(report.chunks_verified, 1);
        assert_eq!(
            flash
                .ops()
                .iter()
                .filter(|op| op.is_mutation())
                .copied()
                .collect::<Vec<_>>(),
            [
                FlashOp::Erase {
                    address: 0,
                    size: 4096
                },
                FlashOp::Program { address: 0, len: 2 },
            ]
        );
        assert_eq!(&flash.data()[..3], &[0xDE, 0xAD, 0xFF]);
    }

    #[test]
    fn test_scenario_one_block_image() {
        let mut flash = DummyFlash::new_default();
        let img = image(65536);
        Workflow::new(&mut device(&mut flash), WorkflowOptions::default())
            .run(&img, &mut NoProgress)
            .unwrap();

        assert_eq!(
            count(&flash, |op| matches!(op, FlashOp::Erase { size: 65536, .. })),
            1
        );
        assert_eq!(
            count(&flash, |op| matches!(op, FlashOp::Erase { size: 4096, .. })),
            0
        );
        assert_eq!(
            count(&flash, |op| matches!(op, FlashOp::Program { len: 256, .. })),
            256
        );
        assert_eq!(&flash.data()[..65536], img.as_bytes());
    }

    #[test]
    fn test_scenario_oversize_image() {
        let mut flash = DummyFlash::new_default();
        let err = Workflow::new(&mut device(&mut flash), WorkflowOptions::default())
            .run(&image(2 * 1024 * 1024 + 1), &mut NoProgress)
            .unwrap_err();
        assert_eq!(
            err.kind,
            FailureKind::SizeExceeded {
                len: 2 * 1024 * 1024 + 1,
                capacity: G.total_size
            }
        );
        assert!(flash.ops().is_empty());
    }

    #[test]
    fn test_scenario_six_bad_chunks() {
        let mut flash = DummyFlash::new_default();
        let bad_chunks = [1usize, 3, 4, 6, 8, 9];
        for chunk in bad_chunks {
            flash.corrupt_reads_at((chunk * VERIFY_CHUNK_SIZE + 17) as u32);
        }

        let img = image(12 * VERIFY_CHUNK_SIZE);
        let err = Workflow::new(&mut device(&mut flash), WorkflowOptions::default())
            .run(&img, &mut NoProgress)
            .unwrap_err();

        assert_eq!(
            err.kind,
            FailureKind::VerificationFailed {
                mismatches: MAX_MISMATCHES
            }
        );
        let offsets: Vec<u32> = err.mismatches.iter().map(|m| m.offset).collect();
        let expected: Vec<u32> = bad_chunks[..5]
            .iter()
            .map(|&c| (c * VERIFY_CHUNK_SIZE) as u32)
            .collect();
        assert_eq!(offsets, expected);

        // Reading stopped at the fifth bad chunk
        let last_read = flash
            .ops()
            .iter()
            .filter_map(|op| match op {
                FlashOp::Read { address, .. } => Some(*address),
                _ => None,
            })
            .max();
        assert_eq!(last_read, Some((8 * VERIFY_CHUNK_SIZE) as u32));
    }
}
