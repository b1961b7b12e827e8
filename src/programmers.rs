//! Programmer registration and dispatch
//!
//! This module provides a centralized registry for the programmer backends,
//! with feature-gated inclusion, and turns a `name:key=value,...` string into
//! an open [`SpiBus`].

use fpgaflash_core::programmer::{ProgrammerInfo, SpiBus};
use thiserror::Error;

/// A boxed bus selected at runtime
pub type DynBus = Box<dyn SpiBus + Send>;

/// Errors from programmer selection
#[derive(Debug, Error)]
pub enum ProgrammerError {
    /// No backend with that name is compiled in
    #[error("Unknown programmer: {0}\nUse 'fpgaflash list-programmers' to see what is available")]
    Unknown(String),

    /// An option value could not be parsed
    #[error("Invalid value for {programmer} option '{key}': {value}")]
    InvalidOption {
        programmer: &'static str,
        key: &'static str,
        value: String,
    },

    /// The backend failed to open
    #[error("Failed to open {programmer}: {source}")]
    Open {
        programmer: &'static str,
        #[source]
        source: Box<dyn std::error::Error>,
    },
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory flash emulator for testing (size=<bytes>,busy=<polls>)",
        requires_root: false,
    });

    #[cfg(feature = "linux-gpio")]
    programmers.push(ProgrammerInfo {
        name: "linux_gpio",
        aliases: &["linux-gpio", "gpio"],
        description: "Linux GPIO bitbang SPI (dev=/dev/gpiochipN,cs=,sck=,mosi=,miso=[,spispeed=<kHz>])",
        requires_root: false,
    });

    programmers
}

/// Resolve a name or alias to the canonical programmer name
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// Parse a programmer string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_programmer_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Open the programmer described by `programmer`
pub fn open_programmer(programmer: &str) -> Result<DynBus, ProgrammerError> {
    let (name, options) = parse_programmer_string(programmer);
    let canonical = find_programmer(name).ok_or_else(|| ProgrammerError::Unknown(name.into()))?;
    log::debug!("Opening programmer {} with {:?}", canonical, options);

    match canonical {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&options),

        #[cfg(feature = "linux-gpio")]
        "linux_gpio" => {
            log::info!("Opening Linux GPIO programmer...");
            fpgaflash_linux_gpio::open_linux_gpio_spi(&options).map_err(|source| {
                ProgrammerError::Open {
                    programmer: "linux_gpio",
                    source,
                }
            })
        }

        _ => Err(ProgrammerError::Unknown(name.into())),
    }
}

/// Build the dummy flash configuration from its options
///
/// `size` must be a power of two; the emulated chip then answers RDID with
/// the Winbond W25Q id of that capacity so that the chip database finds
/// matching geometry.
#[cfg(feature = "dummy")]
pub fn dummy_config(options: &[(&str, &str)]) -> Result<fpgaflash_dummy::DummyConfig, ProgrammerError> {
    let mut config = fpgaflash_dummy::DummyConfig::default();

    for (key, value) in options {
        match *key {
            "size" => {
                let size = crate::cli::parse_hex_u32(value)
                    .ok()
                    .filter(|s| s.is_power_of_two() && *s >= config.block_size as u32)
                    .ok_or_else(|| ProgrammerError::InvalidOption {
                        programmer: "dummy",
                        key: "size",
                        value: value.to_string(),
                    })?;
                config.size = size as usize;
                config.device_id = 0x4000 | size.trailing_zeros() as u16;
            }
            "busy" => {
                config.busy_polls = value.parse().map_err(|_| ProgrammerError::InvalidOption {
                    programmer: "dummy",
                    key: "busy",
                    value: value.to_string(),
                })?;
            }
            _ => log::warn!("dummy: Unknown option: {}={}", key, value),
        }
    }

    Ok(config)
}

#[cfg(feature = "dummy")]
fn open_dummy(options: &[(&str, &str)]) -> Result<DynBus, ProgrammerError> {
    let config = dummy_config(options)?;
    log::info!(
        "Using dummy flash ({} bytes, JEDEC {:02X} {:04X})",
        config.size,
        config.manufacturer_id,
        config.device_id
    );
    Ok(Box::new(fpgaflash_dummy::DummyFlash::new(config)))
}
