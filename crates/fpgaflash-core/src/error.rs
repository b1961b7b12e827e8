//! Error types for fpgaflash-core
//!
//! This module provides a no_std compatible error type for the driver layer.
//! Workflow-level failures are described by
//! [`FailureKind`](crate::workflow::FailureKind), which wraps these.

use core::fmt;

/// Driver error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The transfer channel (bus or chip-select line) failed
    Communication,
    /// The busy bit did not clear within the allowed time
    BusyTimeout {
        /// Timeout that elapsed, in milliseconds
        timeout_ms: u32,
    },
    /// An argument violates a device constraint (e.g. oversized page write)
    InvalidArgument,
    /// Address range extends beyond the device capacity
    AddressOutOfBounds,
    /// Geometry constants violate page < sector < block <= total (powers of
    /// two), or the total exceeds 3-byte addressing
    InvalidGeometry,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Communication => write!(f, "SPI transfer failed"),
            Self::BusyTimeout { timeout_ms } => {
                write!(f, "flash still busy after {} ms", timeout_ms)
            }
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::InvalidGeometry => write!(f, "invalid flash geometry"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
