//! Bitbang SPI support
//!
//! Programmers that drive SPI through software-controlled pins (for example
//! `linux_gpio`) implement [`BitbangSpi`] and wrap themselves in a
//! [`BitbangBus`], which provides the [`SpiBus`] the driver needs.
//!
//! Only single-wire (1-1-1) mode 0 transfers are supported: data is shifted
//! out MSB first on the falling edge and sampled on the rising edge.

use super::SpiBus;
use crate::error::{Error, Result};

/// Trait for low-level bitbang SPI operations
///
/// Pin operations are infallible from the caller's point of view. An
/// implementation that can fail should remember the failure and report it
/// through [`take_fault`](Self::take_fault), which the bus checks after every
/// chip-select change and transfer.
pub trait BitbangSpi {
    /// Set chip select (CS is active low, so `active=true` means CS=0)
    fn set_cs(&mut self, active: bool);

    /// Set clock line value
    fn set_sck(&mut self, high: bool);

    /// Set MOSI line value
    fn set_mosi(&mut self, high: bool);

    /// Get MISO line value
    fn get_miso(&self) -> bool;

    /// Delay for half a clock period
    fn half_period_delay(&self);

    /// Optional: Set SCK and MOSI atomically (optimization)
    ///
    /// Default implementation calls `set_sck` then `set_mosi`.
    fn set_sck_set_mosi(&mut self, sck: bool, mosi: bool) {
        self.set_sck(sck);
        self.set_mosi(mosi);
    }

    /// Optional: Set SCK and get MISO atomically (optimization)
    ///
    /// Default implementation calls `set_sck` then `get_miso`.
    fn set_sck_get_miso(&mut self, sck: bool) -> bool {
        self.set_sck(sck);
        self.get_miso()
    }

    /// Return and clear any pin failure seen since the last call
    fn take_fault(&mut self) -> bool {
        false
    }
}

/// Bitbang helper functions for single-wire I/O
pub mod single {
    use super::BitbangSpi;

    /// Write a byte in single-wire mode (MSB first)
    pub fn write_byte<M: BitbangSpi + ?Sized>(master: &mut M, byte: u8) {
        for i in (0..8).rev() {
            let bit = (byte >> i) & 1 != 0;
            master.set_sck_set_mosi(false, bit);
            master.half_period_delay();
            master.set_sck(true);
            master.half_period_delay();
        }
    }

    /// Read a byte in single-wire mode (MSB first)
    pub fn read_byte<M: BitbangSpi + ?Sized>(master: &mut M) -> u8 {
        let mut byte = 0u8;
        for _ in 0..8 {
            master.set_sck(false);
            master.half_period_delay();
            byte <<= 1;
            if master.set_sck_get_miso(true) {
                byte |= 1;
            }
            master.half_period_delay();
        }
        byte
    }

    /// Write multiple bytes in single-wire mode
    pub fn write_bytes<M: BitbangSpi + ?Sized>(master: &mut M, bytes: &[u8]) {
        for &byte in bytes {
            write_byte(master, byte);
        }
    }

    /// Read multiple bytes in single-wire mode
    pub fn read_bytes<M: BitbangSpi + ?Sized>(master: &mut M, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte = read_byte(master);
        }
    }
}

/// Adapter turning a set of bitbang pins into an [`SpiBus`]
#[derive(Debug)]
pub struct BitbangBus<P> {
    pins: P,
}

impl<P: BitbangSpi> BitbangBus<P> {
    /// Wrap a pin driver
    pub fn new(pins: P) -> Self {
        Self { pins }
    }

    /// Access the underlying pin driver
    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Unwrap the pin driver
    pub fn into_inner(self) -> P {
        self.pins
    }

    fn check(&mut self) -> Result<()> {
        if self.pins.take_fault() {
            Err(Error::Communication)
        } else {
            Ok(())
        }
    }
}

impl<P: BitbangSpi> SpiBus for BitbangBus<P> {
    fn select(&mut self) -> Result<()> {
        self.pins.set_sck(false);
        self.pins.set_cs(true);
        self.pins.half_period_delay();
        self.check()
    }

    fn deselect(&mut self) -> Result<()> {
        self.pins.set_sck(false);
        self.pins.half_period_delay();
        self.pins.set_cs(false);
        self.pins.half_period_delay();
        self.check()
    }

    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        single::write_bytes(&mut self.pins, write);
        single::read_bytes(&mut self.pins, read);
        self.check()
    }
}
