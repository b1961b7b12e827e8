//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

const PROGRAMMER_HELP: &str = "Programmer to use, as name[:key=value,...] \
    (e.g. dummy, dummy:size=4194304, linux_gpio:dev=/dev/gpiochip0,cs=25,sck=11,mosi=10,miso=9)";

#[derive(Parser)]
#[command(name = "fpgaflash")]
#[command(author, version, about = "FPGA configuration flash programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to chip database directory or file (.ron)
    /// Defaults to looking in ./chips/vendors/ and /usr/share/fpgaflash/chips/
    #[arg(long, global = true)]
    pub chip_db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Programmer and chip selection shared by every command touching hardware
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    #[arg(short, long, help = PROGRAMMER_HELP)]
    pub programmer: String,

    /// Chip name (optional, auto-detected from the JEDEC ID if not specified)
    #[arg(short, long)]
    pub chip: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify the flash chip
    Probe {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Erase, program and verify a bitstream at offset 0
    Program {
        #[command(flatten)]
        target: TargetArgs,

        /// Bitstream file
        input: PathBuf,

        /// Erase the whole chip instead of only the blocks the image covers
        #[arg(long)]
        chip_erase: bool,

        /// Skip read-back verification
        #[arg(long)]
        no_verify: bool,
    },

    /// Compare flash contents against a file
    Verify {
        #[command(flatten)]
        target: TargetArgs,

        /// File to compare against
        input: PathBuf,
    },

    /// Read flash contents to a file
    Read {
        #[command(flatten)]
        target: TargetArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Number of bytes to read from offset 0 (hex or decimal, default: whole chip)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Erase the whole chip or a sector-aligned range
    Erase {
        #[command(flatten)]
        target: TargetArgs,

        /// Start address for partial erase (hex, e.g., 0x10000)
        #[arg(long, value_parser = parse_hex_u32, requires = "length")]
        start: Option<u32>,

        /// Length of region to erase (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, requires = "start")]
        length: Option<u32>,
    },

    /// Show the erase and program plan for an image without touching hardware
    Plan {
        /// Bitstream file
        #[arg(required_unless_present = "length")]
        input: Option<PathBuf>,

        /// Plan for an image of this many bytes instead of a file
        #[arg(long, value_parser = parse_hex_u32, conflicts_with = "input")]
        length: Option<u32>,

        /// Chip name to take the geometry from (default: W25Q16JV)
        #[arg(short, long)]
        chip: Option<String>,

        /// Plan a single chip erase
        #[arg(long)]
        chip_erase: bool,

        /// Print every operation
        #[arg(long)]
        detailed: bool,
    },

    /// List supported chips
    ListChips {
        /// Filter by vendor
        #[arg(long)]
        vendor: Option<String>,
    },

    /// List supported programmers
    ListProgrammers,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_programmer_help_names_gpio_chip_by_path() {
        assert!(PROGRAMMER_HELP.contains("linux_gpio:dev=/dev/gpiochip0,"));
        assert!(!PROGRAMMER_HELP.contains("gpiochip="));
    }

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x10000"), Ok(0x10000));
        assert_eq!(parse_hex_u32("0X1f"), Ok(0x1F));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert!(parse_hex_u32("ten").is_err());
    }

    #[test]
    fn test_program_args() {
        let cli = Cli::try_parse_from([
            "fpgaflash",
            "-vv",
            "program",
            "-p",
            "dummy",
            "--chip-erase",
            "top.bin",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Program {
                target,
                input,
                chip_erase,
                no_verify,
            } => {
                assert_eq!(target.programmer, "dummy");
                assert_eq!(input, PathBuf::from("top.bin"));
                assert!(chip_erase);
                assert!(!no_verify);
            }
            _ => panic!("expected program"),
        }
    }

    #[test]
    fn test_erase_range_needs_both_ends() {
        assert!(
            Cli::try_parse_from(["fpgaflash", "erase", "-p", "dummy", "--start", "0x1000"])
                .is_err()
        );
        assert!(Cli::try_parse_from([
            "fpgaflash",
            "erase",
            "-p",
            "dummy",
            "--start",
            "0x1000",
            "--length",
            "0x1000"
        ])
        .is_ok());
    }
}
