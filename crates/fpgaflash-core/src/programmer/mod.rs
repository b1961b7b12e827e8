//! Programmer traits and abstractions
//!
//! This module defines the bus, clock and command-execution traits that
//! connect the flash driver to a host programmer.

pub mod bitbang;
mod chip_select;
mod clock;
mod traits;

pub use bitbang::{BitbangBus, BitbangSpi};
pub use chip_select::{ChipSelect, SpiTransport, DEFAULT_SETTLE_US};
#[cfg(feature = "alloc")]
pub use clock::ManualClock;
#[cfg(feature = "std")]
pub use clock::StdClock;
pub use traits::*;
