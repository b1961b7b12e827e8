//! Command-level NOR flash model for unit tests

use std::vec::Vec;

use crate::chip::FlashGeometry;
use crate::error::{Error, Result};
use crate::programmer::SpiMaster;
use crate::spi::{opcodes, SpiCommand};

pub(crate) struct MemFlash {
    pub memory: Vec<u8>,
    pub geometry: FlashGeometry,
    /// Opcodes in the order they were executed
    pub commands: Vec<u8>,
    /// READ transactions as (address, length)
    pub reads: Vec<(u32, usize)>,
    pub id: [u8; 3],
    pub status: u8,
    pub stuck_busy: bool,
    pub fail_opcode: Option<u8>,
    /// Addresses whose read-back byte is inverted
    pub corrupt: Vec<u32>,
    pub now: u64,
}

impl MemFlash {
    pub fn new(geometry: FlashGeometry) -> Self {
        Self {
            memory: std::vec![0xFF; geometry.total_size as usize],
            geometry,
            commands: Vec::new(),
            reads: Vec::new(),
            id: [0xEF, 0x40, 0x15],
            status: 0,
            stuck_busy: false,
            fail_opcode: None,
            corrupt: Vec::new(),
            now: 0,
        }
    }

    pub fn count(&self, opcode: u8) -> usize {
        self.commands.iter().filter(|&&op| op == opcode).count()
    }

    fn take_wel(&mut self) -> bool {
        let wel = self.status & opcodes::SR1_WEL != 0;
        self.status &= !opcodes::SR1_WEL;
        wel
    }

    fn fill(&mut self, address: u32, size: u32) {
        let start = (address & !(size - 1)) as usize;
        self.memory[start..start + size as usize].fill(0xFF);
    }
}

impl SpiMaster for MemFlash {
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        self.commands.push(cmd.opcode);
        if self.fail_opcode == Some(cmd.opcode) {
            return Err(Error::Communication);
        }
        let addr = cmd.address.unwrap_or(0);

        match cmd.opcode {
            opcodes::RDID => cmd.read_buf.copy_from_slice(&self.id),
            opcodes::RDSR => {
                let wip = if self.stuck_busy { opcodes::SR1_WIP } else { 0 };
                cmd.read_buf[0] = self.status | wip;
            }
            opcodes::WREN => self.status |= opcodes::SR1_WEL,
            opcodes::WRDI => self.status &= !opcodes::SR1_WEL,
            opcodes::WRSR => {
                if self.take_wel() {
                    self.status = cmd.write_data[0] & !(opcodes::SR1_WIP | opcodes::SR1_WEL);
                }
            }
            opcodes::READ => {
                self.reads.push((addr, cmd.read_buf.len()));
                let start = addr as usize;
                cmd.read_buf
                    .copy_from_slice(&self.memory[start..start + cmd.read_buf.len()]);
                for &c in &self.corrupt {
                    if let Some(i) = (c as usize).checked_sub(start) {
                        if i < cmd.read_buf.len() {
                            cmd.read_buf[i] ^= 0xFF;
                        }
                    }
                }
            }
            opcodes::PP => {
                if self.take_wel() {
                    let page = self.geometry.page_size as usize;
                    let base = addr as usize & !(page - 1);
                    let offset = addr as usize - base;
                    for (i, &b) in cmd.write_data.iter().enumerate() {
                        self.memory[base + (offset + i) % page] &= b;
                    }
                }
            }
            opcodes::SE_20 => {
                if self.take_wel() {
                    self.fill(addr, self.geometry.sector_size);
                }
            }
            opcodes::BE_D8 => {
                if self.take_wel() {
                    self.fill(addr, self.geometry.block_size);
                }
            }
            opcodes::CE_C7 => {
                if self.take_wel() {
                    self.memory.fill(0xFF);
                }
            }
            other => panic!("unexpected opcode {other:#04x}"),
        }
        Ok(())
    }

    fn now_ms(&self) -> u64 {
        self.now
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.now += ms as u64;
    }
}
