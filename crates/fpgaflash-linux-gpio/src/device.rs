//! Linux GPIO SPI bitbanging device implementation
//!
//! This module provides the `LinuxGpioSpi` struct, which drives CS#, SCK,
//! MOSI and MISO through Linux's GPIO character device interface (gpiocdev).
//! Wrapped in a [`BitbangBus`] it becomes the `SpiBus` the flash driver
//! talks to.
//!
//! Chip select is a dedicated output line, independent of the clock and
//! data lines, so it can be held low across several transfers of one
//! command.

use std::cell::Cell;

use crate::error::{LinuxGpioError, Result};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use fpgaflash_core::programmer::{BitbangBus, BitbangSpi};

/// GPIO line indices
#[derive(Debug, Clone, Copy)]
enum Line {
    Cs = 0,
    Sck = 1,
    Mosi = 2,
    Miso = 3,
}

/// Number of GPIO lines we use
const NUM_LINES: usize = 4;

/// Default half-period delay in nanoseconds (for ~100 kHz SPI clock)
const DEFAULT_HALF_PERIOD_NS: u64 = 5000;

/// Configuration for opening a Linux GPIO SPI device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxGpioSpiConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// CS (Chip Select) GPIO line offset
    pub cs: Offset,
    /// SCK (Clock) GPIO line offset
    pub sck: Offset,
    /// MOSI (Master Out Slave In) GPIO line offset
    pub mosi: Offset,
    /// MISO (Master In Slave Out) GPIO line offset
    pub miso: Offset,
    /// Half-period delay in nanoseconds
    pub half_period_ns: u64,
}

impl Default for LinuxGpioSpiConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            cs: 0,
            sck: 0,
            mosi: 0,
            miso: 0,
            half_period_ns: DEFAULT_HALF_PERIOD_NS,
        }
    }
}

impl LinuxGpioSpiConfig {
    /// Create a new configuration with the given device path and pins
    pub fn new(
        device: impl Into<String>,
        cs: Offset,
        sck: Offset,
        mosi: Offset,
        miso: Offset,
    ) -> Self {
        Self {
            device: device.into(),
            cs,
            sck,
            mosi,
            miso,
            ..Default::default()
        }
    }

    /// Set the half-period delay in nanoseconds
    pub fn with_half_period_ns(mut self, ns: u64) -> Self {
        self.half_period_ns = ns;
        self
    }

    /// Set SPI speed in Hz (approximate, via half-period calculation)
    pub fn with_speed_hz(mut self, hz: u32) -> Self {
        // half_period = 1 / (2 * frequency) in seconds
        if hz > 0 {
            self.half_period_ns = 500_000_000 / hz as u64;
        }
        self
    }

    fn check_distinct_lines(&self) -> Result<()> {
        let lines = [self.cs, self.sck, self.mosi, self.miso];
        for (i, a) in lines.iter().enumerate() {
            if lines[i + 1..].contains(a) {
                return Err(LinuxGpioError::SharedLine(*a));
            }
        }
        Ok(())
    }
}

/// Linux GPIO SPI pins driven by bitbanging
pub struct LinuxGpioSpi {
    /// GPIO line request handle
    request: Request,
    /// GPIO line offsets indexed by Line enum
    offsets: [Offset; NUM_LINES],
    /// Half-period delay in nanoseconds
    half_period_ns: u64,
    /// Set when a line operation failed, cleared by `take_fault`
    fault: Cell<bool>,
}

impl LinuxGpioSpi {
    /// Open a Linux GPIO SPI device with the given configuration
    pub fn open(config: &LinuxGpioSpiConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxGpioError::NoChip);
        }
        config.check_distinct_lines()?;

        log::debug!("linux_gpio: Opening device {}", config.device);

        let mut offsets = [0u32; NUM_LINES];
        offsets[Line::Cs as usize] = config.cs;
        offsets[Line::Sck as usize] = config.sck;
        offsets[Line::Mosi as usize] = config.mosi;
        offsets[Line::Miso as usize] = config.miso;

        // Initial state: CS=1 (high/inactive), SCK=0 (low), MOSI=0, MISO=input
        let mut req_config = Config::default();
        req_config.with_line(config.cs).as_output(Value::Active);
        req_config.with_line(config.sck).as_output(Value::Inactive);
        req_config.with_line(config.mosi).as_output(Value::Inactive);
        req_config.with_line(config.miso).as_input();

        let request = Request::from_config(req_config)
            .on_chip(&config.device)
            .with_consumer("fpgaflash")
            .request()
            .map_err(|source| LinuxGpioError::LineRequest {
                device: config.device.clone(),
                source,
            })?;

        log::info!(
            "linux_gpio: Opened {} (cs={}, sck={}, mosi={}, miso={}, half period {} ns)",
            config.device,
            config.cs,
            config.sck,
            config.mosi,
            config.miso,
            config.half_period_ns
        );

        Ok(Self {
            request,
            offsets,
            half_period_ns: config.half_period_ns,
            fault: Cell::new(false),
        })
    }

    /// Wrap the pins in an `SpiBus`
    pub fn into_bus(self) -> BitbangBus<Self> {
        BitbangBus::new(self)
    }

    fn set_line(&self, line: Line, high: bool) {
        let value = if high { Value::Active } else { Value::Inactive };
        if let Err(e) = self.request.set_value(self.offsets[line as usize], value) {
            log::error!("linux_gpio: Failed to set {:?}: {}", line, e);
            self.fault.set(true);
        }
    }
}

impl BitbangSpi for LinuxGpioSpi {
    fn set_cs(&mut self, active: bool) {
        // CS is active low
        self.set_line(Line::Cs, !active);
    }

    fn set_sck(&mut self, high: bool) {
        self.set_line(Line::Sck, high);
    }

    fn set_mosi(&mut self, high: bool) {
        self.set_line(Line::Mosi, high);
    }

    fn get_miso(&self) -> bool {
        match self.request.value(self.offsets[Line::Miso as usize]) {
            Ok(Value::Active) => true,
            Ok(Value::Inactive) => false,
            Err(e) => {
                log::error!("linux_gpio: Failed to get MISO: {}", e);
                self.fault.set(true);
                false
            }
        }
    }

    fn half_period_delay(&self) {
        if self.half_period_ns > 0 {
            std::thread::sleep(std::time::Duration::from_nanos(self.half_period_ns));
        }
    }

    fn take_fault(&mut self) -> bool {
        self.fault.replace(false)
    }
}

/// Parse programmer options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path (required, or use gpiochip)
/// - `gpiochip=N` - GPIO chip number (alternative to dev)
/// - `cs=N` - CS (chip select) GPIO line offset (required)
/// - `sck=N` - SCK (clock) GPIO line offset (required)
/// - `mosi=N` - MOSI GPIO line offset (required)
/// - `miso=N` - MISO GPIO line offset (required)
/// - `spispeed=N` - SPI speed in kHz (optional, default ~100 kHz)
pub fn parse_options(options: &[(&str, &str)]) -> Result<LinuxGpioSpiConfig> {
    let mut config = LinuxGpioSpiConfig::default();
    let mut cs = None;
    let mut sck = None;
    let mut mosi = None;
    let mut miso = None;
    let mut gpiochip: Option<u32> = None;

    fn number(key: &'static str, value: &str) -> Result<u32> {
        value.parse().map_err(|_| LinuxGpioError::BadNumber {
            key,
            value: value.to_string(),
        })
    }

    for (key, value) in options {
        match *key {
            "dev" => config.device = value.to_string(),
            "gpiochip" => {
                gpiochip = Some(number("gpiochip", value)?);
            }
            "cs" => cs = Some(number("cs", value)?),
            "sck" => sck = Some(number("sck", value)?),
            "mosi" => mosi = Some(number("mosi", value)?),
            "miso" => miso = Some(number("miso", value)?),
            "spispeed" => {
                let speed_khz = number("spispeed", value)?;
                if speed_khz == 0 {
                    return Err(LinuxGpioError::ZeroSpeed);
                }
                config = config.with_speed_hz(speed_khz.saturating_mul(1000));
            }
            _ => {
                log::warn!("linux_gpio: Unknown option: {}={}", key, value);
            }
        }
    }

    // Handle dev vs gpiochip
    if config.device.is_empty() {
        match gpiochip {
            Some(n) => config.device = format!("/dev/gpiochip{}", n),
            None => return Err(LinuxGpioError::NoChip),
        }
    } else if gpiochip.is_some() {
        return Err(LinuxGpioError::ConflictingChip);
    }

    config.cs = cs.ok_or(LinuxGpioError::MissingLine("cs"))?;
    config.sck = sck.ok_or(LinuxGpioError::MissingLine("sck"))?;
    config.mosi = mosi.ok_or(LinuxGpioError::MissingLine("mosi"))?;
    config.miso = miso.ok_or(LinuxGpioError::MissingLine("miso"))?;
    config.check_distinct_lines()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_options() {
        let config = parse_options(&[
            ("dev", "/dev/gpiochip0"),
            ("cs", "25"),
            ("sck", "11"),
            ("mosi", "10"),
            ("miso", "9"),
            ("spispeed", "500"),
        ])
        .unwrap();
        assert_eq!(config.device, "/dev/gpiochip0");
        assert_eq!((config.cs, config.sck, config.mosi, config.miso), (25, 11, 10, 9));
        assert_eq!(config.half_period_ns, 1000);
    }

    #[test]
    fn test_gpiochip_number() {
        let config = parse_options(&[
            ("gpiochip", "2"),
            ("cs", "1"),
            ("sck", "2"),
            ("mosi", "3"),
            ("miso", "4"),
        ])
        .unwrap();
        assert_eq!(config.device, "/dev/gpiochip2");
        assert_eq!(config.half_period_ns, DEFAULT_HALF_PERIOD_NS);
    }

    #[test]
    fn test_missing_and_bad_options() {
        assert!(matches!(
            parse_options(&[("cs", "1")]),
            Err(LinuxGpioError::NoChip)
        ));
        assert!(matches!(
            parse_options(&[("dev", "/dev/gpiochip0"), ("cs", "1"), ("sck", "2"), ("mosi", "3")]),
            Err(LinuxGpioError::MissingLine("miso"))
        ));
        assert!(matches!(
            parse_options(&[("dev", "/dev/gpiochip0"), ("cs", "x")]),
            Err(LinuxGpioError::BadNumber { key: "cs", .. })
        ));
        assert!(matches!(
            parse_options(&[("gpiochip", "0"), ("dev", "/dev/gpiochip0")]),
            Err(LinuxGpioError::ConflictingChip)
        ));
        assert!(matches!(
            parse_options(&[("gpiochip", "0"), ("spispeed", "0")]),
            Err(LinuxGpioError::ZeroSpeed)
        ));
    }

    #[test]
    fn test_shared_line_rejected() {
        let result = parse_options(&[
            ("dev", "/dev/gpiochip0"),
            ("cs", "4"),
            ("sck", "11"),
            ("mosi", "10"),
            ("miso", "4"),
        ]);
        assert!(matches!(result, Err(LinuxGpioError::SharedLine(4))));
    }
}
