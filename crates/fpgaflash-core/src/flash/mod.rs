//! Flash device driver
//!
//! This module provides [`FlashDevice`], which sequences SPI25 commands into
//! identify, read, page program and erase operations with readiness polling
//! and bounded timeouts.

mod device;
mod status;

pub use device::{FlashDevice, Timeouts};
pub use status::DeviceStatus;
