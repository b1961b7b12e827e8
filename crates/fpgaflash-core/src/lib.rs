//! fpgaflash-core - SPI NOR flash driver and programming workflow
//!
//! This crate turns an FPGA configuration bitstream into a verified sequence
//! of SPI NOR flash transactions. It is designed to be `no_std` compatible;
//! the planner and workflow need `alloc`.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`), the RON chip
//!   database and [`programmer::StdClock`]
//! - `alloc` - Enable heap allocation for plans, read buffers and the workflow
//!
//! # Example
//!
//! ```ignore
//! use fpgaflash_core::chip::FlashGeometry;
//! use fpgaflash_core::flash::FlashDevice;
//! use fpgaflash_core::programmer::StdClock;
//! use fpgaflash_core::workflow::{BitstreamImage, NoProgress, Workflow, WorkflowOptions};
//!
//! let mut device = FlashDevice::new(bus, StdClock::new(), FlashGeometry::W25Q16JV);
//! let image = BitstreamImage::new(std::fs::read("top.bin")?);
//! let report = Workflow::new(&mut device, WorkflowOptions::default())
//!     .run(&image, &mut NoProgress)?;
//! println!("wrote {} pages", report.pages_written);
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod chip;
pub mod error;
pub mod flash;
pub mod plan;
pub mod programmer;
pub mod protocol;
pub mod spi;
#[cfg(all(test, feature = "std"))]
mod testing;
#[cfg(feature = "alloc")]
pub mod workflow;

pub use error::{Error, Result};
