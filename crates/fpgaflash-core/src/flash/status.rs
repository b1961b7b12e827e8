//! Status register 1 decoding

use bitflags::bitflags;

use crate::spi::opcodes;

bitflags! {
    /// Status register 1 as read by RDSR
    ///
    /// A snapshot only: the driver reads the register fresh on every poll.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceStatus: u8 {
        /// Write in progress
        const BUSY = opcodes::SR1_WIP;
        /// Write enable latch
        const WEL  = opcodes::SR1_WEL;
        /// Block protect bit 0
        const BP0  = opcodes::SR1_BP0;
        /// Block protect bit 1
        const BP1  = opcodes::SR1_BP1;
        /// Block protect bit 2
        const BP2  = opcodes::SR1_BP2;
        /// Top/bottom protect
        const TB   = opcodes::SR1_TB;
        /// Sector/block protect
        const SEC  = opcodes::SR1_SEC;
        /// Status register protect 0
        const SRP0 = opcodes::SR1_SRP0;
    }
}

impl DeviceStatus {
    /// Block-protect bits
    pub const BP_MASK: Self = Self::BP0.union(Self::BP1).union(Self::BP2);

    /// Internal operation still running
    pub fn is_busy(self) -> bool {
        self.contains(Self::BUSY)
    }

    /// Write enable latch set
    pub fn write_enabled(self) -> bool {
        self.contains(Self::WEL)
    }

    /// Any block-protect bit set, so some range rejects erase/program
    pub fn write_protected(self) -> bool {
        self.intersects(Self::BP_MASK)
    }
}

impl core::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#04x}", self.bits())?;
        for (name, _) in self.iter_names() {
            write!(f, " {}", name)?;
        }
        Ok(())
    }
}
