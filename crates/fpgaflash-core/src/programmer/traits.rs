//! Programmer trait definitions
//!
//! Two layers are defined here:
//!
//! - [`SpiBus`] is the host-provided primitive: chip-select control plus a
//!   half-duplex byte transfer. Backends (GPIO bitbang, the in-memory
//!   emulator) implement this.
//! - [`SpiMaster`] executes whole [`SpiCommand`]s and owns the notion of
//!   time. The protocol layer is written against this trait.
//!
//! [`SpiTransport`](super::SpiTransport) joins the two: it frames every
//! command in a chip-select bracket on an `SpiBus` and takes time from a
//! [`Clock`].

use crate::error::Result;
use crate::spi::SpiCommand;

/// Host SPI bus with a dedicated chip-select line
///
/// The driver is the only user of the bus for the duration of a
/// transaction. Implementations are not expected to be reentrant.
pub trait SpiBus {
    /// Assert chip select (drive CS# low)
    fn select(&mut self) -> Result<()>;

    /// Deassert chip select (drive CS# high), ending the transaction
    fn deselect(&mut self) -> Result<()>;

    /// Clock out all of `write`, then clock in `read.len()` bytes
    ///
    /// Either slice may be empty. The transfer is half-duplex: bytes received
    /// while writing are discarded.
    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> Result<()>;
}

/// Monotonic time source and sleeper
///
/// Injected so that readiness polling and timeouts can be simulated
/// deterministically.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin
    fn now_ms(&self) -> u64;

    /// Block for `ms` milliseconds
    fn sleep_ms(&mut self, ms: u32);

    /// Block for `us` microseconds (chip-select settle delays)
    fn delay_us(&mut self, us: u32);
}

/// SPI Master trait
///
/// This trait represents something that can execute complete SPI flash
/// commands and measure time. All protocol functions are generic over it.
pub trait SpiMaster {
    /// Execute a single SPI command as one chip-select framed transaction
    ///
    /// The command contains all the information needed for the transaction:
    /// - `opcode`: The SPI command opcode
    /// - `address`: Optional address (with width)
    /// - `write_data`: Data to write after the header
    /// - `read_buf`: Buffer to read data into
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()>;

    /// Current time in milliseconds
    fn now_ms(&self) -> u64;

    /// Sleep between status polls
    fn sleep_ms(&mut self, ms: u32);
}

impl<M: SpiMaster + ?Sized> SpiMaster for &mut M {
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        (**self).execute(cmd)
    }

    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    fn sleep_ms(&mut self, ms: u32) {
        (**self).sleep_ms(ms)
    }
}

impl<B: SpiBus + ?Sized> SpiBus for &mut B {
    fn select(&mut self) -> Result<()> {
        (**self).select()
    }

    fn deselect(&mut self) -> Result<()> {
        (**self).deselect()
    }

    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        (**self).transfer(write, read)
    }
}

// Blanket impl for boxed buses to allow trait objects chosen at runtime
#[cfg(feature = "alloc")]
impl SpiBus for alloc::boxed::Box<dyn SpiBus + Send> {
    fn select(&mut self) -> Result<()> {
        (**self).select()
    }

    fn deselect(&mut self) -> Result<()> {
        (**self).deselect()
    }

    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        (**self).transfer(write, read)
    }
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    fn sleep_ms(&mut self, ms: u32) {
        (**self).sleep_ms(ms)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// Information about a programmer backend
#[derive(Debug, Clone)]
pub struct ProgrammerInfo {
    /// Name of the programmer
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Description
    pub description: &'static str,
    /// Whether this programmer requires elevated privileges
    pub requires_root: bool,
}
