//! SPI types and command structures
//!
//! This module provides types for representing SPI transactions and the
//! fixed opcode table of the supported flash command set.

mod address;
mod command;
pub mod opcodes;

pub use address::AddressWidth;
pub use command::{SpiCommand, MAX_HEADER_LEN};
pub use opcodes::*;
