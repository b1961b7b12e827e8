//! Chip-select framing
//!
//! Every flash command is one transaction: CS# is asserted, the header and
//! data are clocked, and CS# is released. [`ChipSelect`] is a guard that
//! releases the line on every exit path, including early returns on transfer
//! errors.

use super::{Clock, SpiBus, SpiMaster};
use crate::error::Result;
use crate::spi::{self, SpiCommand, MAX_HEADER_LEN};

/// Default settle time between chip-select edges and clocking
pub const DEFAULT_SETTLE_US: u32 = 1;

/// An asserted chip-select line
///
/// Dropping the guard without calling [`release`](Self::release) still
/// deasserts chip select; the error from that path can only be logged.
pub struct ChipSelect<'a, B: SpiBus + ?Sized, C: Clock + ?Sized> {
    bus: &'a mut B,
    clock: &'a mut C,
    settle_us: u32,
    active: bool,
}

impl<'a, B: SpiBus + ?Sized, C: Clock + ?Sized> ChipSelect<'a, B, C> {
    /// Assert chip select and wait for the line to settle
    pub fn assert(bus: &'a mut B, clock: &'a mut C, settle_us: u32) -> Result<Self> {
        if let Err(e) = bus.select() {
            // Leave the line in a known state before reporting
            let _ = bus.deselect();
            return Err(e);
        }
        clock.delay_us(settle_us);
        Ok(Self {
            bus,
            clock,
            settle_us,
            active: true,
        })
    }

    /// Clock `write` out and then `read.len()` bytes in
    pub fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        self.bus.transfer(write, read)
    }

    /// Wait for the settle time and deassert chip select
    pub fn release(mut self) -> Result<()> {
        self.active = false;
        self.clock.delay_us(self.settle_us);
        self.bus.deselect()
    }
}

impl<B: SpiBus + ?Sized, C: Clock + ?Sized> Drop for ChipSelect<'_, B, C> {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = self.bus.deselect() {
                log::warn!("Failed to deassert chip select: {}", e);
            }
        }
    }
}

/// [`SpiMaster`] built from a host [`SpiBus`] and a [`Clock`]
///
/// Each executed command becomes exactly one chip-select bracket.
pub struct SpiTransport<B, C> {
    bus: B,
    clock: C,
    settle_us: u32,
}

impl<B: SpiBus, C: Clock> SpiTransport<B, C> {
    /// Create a transport with the default settle delay
    pub fn new(bus: B, clock: C) -> Self {
        Self::with_settle_us(bus, clock, DEFAULT_SETTLE_US)
    }

    /// Create a transport with an explicit settle delay
    pub fn with_settle_us(bus: B, clock: C, settle_us: u32) -> Self {
        Self {
            bus,
            clock,
            settle_us,
        }
    }

    /// Shared access to the bus
    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<B: SpiBus, C: Clock> SpiMaster for SpiTransport<B, C> {
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        let mut header = [0u8; MAX_HEADER_LEN];
        let header_len = cmd.encode_header(&mut header);

        log::trace!(
            "spi: {} addr={:?} write={} read={}",
            spi::mnemonic(cmd.opcode),
            cmd.address,
            cmd.write_data.len(),
            cmd.read_buf.len()
        );

        let mut cs = ChipSelect::assert(&mut self.bus, &mut self.clock, self.settle_us)?;
        cs.transfer(&header[..header_len], &mut [])?;
        if cmd.has_write() || cmd.has_read() {
            cs.transfer(cmd.write_data, cmd.read_buf)?;
        }
        cs.release()
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.clock.sleep_ms(ms)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::programmer::ManualClock;
    use std::vec::Vec;

    #[derive(Debug, PartialEq, Eq)]
    enum Event {
        Select,
        Deselect,
        Transfer(Vec<u8>, usize),
    }

    #[derive(Default)]
    struct RecordingBus {
        events: Vec<Event>,
        fail_transfer: bool,
        fail_select: bool,
    }

    impl SpiBus for RecordingBus {
        fn select(&mut self) -> Result<()> {
            self.events.push(Event::Select);
            if self.fail_select {
                return Err(Error::Communication);
            }
            Ok(())
        }

        fn deselect(&mut self) -> Result<()> {
            self.events.push(Event::Deselect);
            Ok(())
        }

        fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
            self.events.push(Event::Transfer(write.to_vec(), read.len()));
            if self.fail_transfer {
                return Err(Error::Communication);
            }
            read.fill(0xA5);
            Ok(())
        }
    }

    #[test]
    fn test_command_is_one_bracket() {
        let mut transport = SpiTransport::new(RecordingBus::default(), ManualClock::new());
        let mut buf = [0u8; 2];
        let mut cmd = SpiCommand::read_3b(spi::READ, 0x001000, &mut buf);
        transport.execute(&mut cmd).unwrap();

        assert_eq!(buf, [0xA5, 0xA5]);
        assert_eq!(
            transport.bus().events,
            [
                Event::Select,
                Event::Transfer(std::vec![0x03, 0x00, 0x10, 0x00], 0),
                Event::Transfer(Vec::new(), 2),
                Event::Deselect,
            ]
        );
    }

    #[test]
    fn test_settle_delay_on_both_edges() {
        let clock = ManualClock::new();
        let mut transport =
            SpiTransport::with_settle_us(RecordingBus::default(), clock.clone(), 5);
        transport
            .execute(&mut SpiCommand::simple(spi::WREN))
            .unwrap();
        assert_eq!(clock.now_us(), 10);
    }

    #[test]
    fn test_chip_select_released_on_transfer_error() {
        let bus = RecordingBus {
            fail_transfer: true,
            ..Default::default()
        };
        let mut transport = SpiTransport::new(bus, ManualClock::new());
        let err = transport
            .execute(&mut SpiCommand::simple(spi::WREN))
            .unwrap_err();

        assert_eq!(err, Error::Communication);
        assert_eq!(transport.bus().events.last(), Some(&Event::Deselect));
    }

    #[test]
    fn test_chip_select_released_on_select_error() {
        let bus = RecordingBus {
            fail_select: true,
            ..Default::default()
        };
        let mut transport = SpiTransport::new(bus, ManualClock::new());
        assert!(transport.execute(&mut SpiCommand::simple(spi::WREN)).is_err());
        assert_eq!(
            transport.bus().events,
            [Event::Select, Event::Deselect]
        );
    }
}
