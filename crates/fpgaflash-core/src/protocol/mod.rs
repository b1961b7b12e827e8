//! Protocol implementations
//!
//! This module contains the SPI25 command sequences used by the driver.

mod spi25;

pub use spi25::*;
