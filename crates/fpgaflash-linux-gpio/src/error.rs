//! Errors raised while setting up the GPIO lines that carry SPI

use gpiocdev::line::Offset;
use thiserror::Error;

/// Why the bitbanged SPI bus could not be set up
#[derive(Debug, Error)]
pub enum LinuxGpioError {
    /// The kernel refused the line request, e.g. a line is already claimed
    #[error("cannot claim SPI lines on {device}: {source}")]
    LineRequest {
        device: String,
        #[source]
        source: gpiocdev::Error,
    },

    /// Neither `dev` nor `gpiochip` was given
    #[error("no GPIO chip given, use dev=/dev/gpiochipN or gpiochip=N")]
    NoChip,

    /// Both `dev` and `gpiochip` were given
    #[error("give either dev= or gpiochip=, not both")]
    ConflictingChip,

    /// One of the four SPI signals has no line assigned
    #[error("no GPIO line given for the SPI {0} signal ({0}=N)")]
    MissingLine(&'static str),

    /// Two SPI signals were mapped onto the same line
    #[error("GPIO line {0} is used for more than one SPI signal")]
    SharedLine(Offset),

    /// An option value is not a number
    #[error("{key}={value} is not a valid number")]
    BadNumber { key: &'static str, value: String },

    /// `spispeed=0`
    #[error("spispeed must be at least 1 kHz")]
    ZeroSpeed,
}

/// Result type for GPIO SPI setup
pub type Result<T> = std::result::Result<T, LinuxGpioError>;
