//! fpgaflash-linux-gpio - Linux GPIO bitbang SPI support
//!
//! This crate provides SPI flash access via GPIO bitbanging using the Linux
//! character device GPIO interface (gpiocdev). It is the usual way to reach
//! the configuration flash of an FPGA board wired to a Raspberry Pi or a
//! similar SBC header.
//!
//! # Example
//!
//! ```no_run
//! use fpgaflash_core::chip::FlashGeometry;
//! use fpgaflash_core::flash::FlashDevice;
//! use fpgaflash_core::programmer::StdClock;
//! use fpgaflash_linux_gpio::{LinuxGpioSpi, LinuxGpioSpiConfig};
//!
//! // Configure GPIO pins for SPI
//! let config = LinuxGpioSpiConfig::new("/dev/gpiochip0", 25, 11, 10, 9);
//! //                                    device          CS  SCK MOSI MISO
//!
//! let bus = LinuxGpioSpi::open(&config)?.into_bus();
//! let mut flash = FlashDevice::new(bus, StdClock::new(), FlashGeometry::W25Q16JV);
//! println!("JEDEC ID: {}", flash.identify()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with the fpgaflash CLI
//!
//! ```bash
//! fpgaflash probe -p linux_gpio:dev=/dev/gpiochip0,cs=25,sck=11,mosi=10,miso=9
//! fpgaflash program -p linux_gpio:gpiochip=0,cs=25,sck=11,mosi=10,miso=9,spispeed=500 top.bin
//! ```
//!
//! # GPIO Pin Wiring
//!
//! | Flash Pin | GPIO Function | Description |
//! |-----------|---------------|-------------|
//! | CS#       | CS (output)   | Chip Select |
//! | CLK       | SCK (output)  | Serial Clock |
//! | DI        | MOSI (output) | Master Out Slave In |
//! | DO        | MISO (input)  | Master In Slave Out |
//! | WP#       | 3.3V          | Write Protect (tie high to disable) |
//! | HOLD#     | 3.3V          | Hold (tie high to disable) |
//!
//! Keep the FPGA in reset (CRESET_B low on iCE40) while programming so it
//! does not drive the SPI lines itself.

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, LinuxGpioSpi, LinuxGpioSpiConfig};
pub use error::{LinuxGpioError, Result};

use fpgaflash_core::programmer::SpiBus;

/// Open a Linux GPIO SPI device and return a boxed SpiBus
///
/// This is a convenience function for use in the CLI programmer dispatch.
/// See [`parse_options`] for the accepted keys.
pub fn open_linux_gpio_spi(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn SpiBus + Send>, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let spi = LinuxGpioSpi::open(&config)?;
    Ok(Box::new(spi.into_bus()))
}
