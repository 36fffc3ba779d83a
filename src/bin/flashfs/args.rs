//! Command line for the flash file system builder.
//!
//! ```text
//! flashfs [START_ADDRESS_HEX [DIRECTORY]] [-o FILE] [--list IMAGE]
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use flashfs::{BuildError, BuildOptions, IntelHex, OUTPUT_FILE_NAME};
use log::info;

#[derive(Debug, Parser)]
#[command(name = "flashfs", version, about = "flashfs - flash file system builder")]
pub struct Args {
    /// Start address of the flash file system area, hexadecimal (0x optional)
    #[arg(value_name = "START_ADDRESS_HEX", default_value = "40000", value_parser = parse_hex_u32)]
    pub start_address: u32,

    /// Directory holding the input .hex files
    #[arg(value_name = "DIRECTORY", default_value = ".")]
    pub directory: PathBuf,

    /// Output image
    #[arg(short, long, value_name = "FILE", default_value = OUTPUT_FILE_NAME)]
    pub output: PathBuf,

    /// Data bytes per Intel HEX record in the output
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u8).range(1..))]
    pub bytes_per_line: u8,

    /// Print the header table of an existing image instead of building one
    #[arg(long, value_name = "IMAGE")]
    pub list: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    fn build_options(&self) -> BuildOptions {
        BuildOptions {
            base_address: self.start_address,
            input_dir: self.directory.clone(),
            output: self.output.clone(),
            bytes_per_line: self.bytes_per_line,
        }
    }
}

/// Parse a hexadecimal u32, with or without a `0x` prefix.
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hex address '{s}': {e}"))
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

pub fn run() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let result = match args.list {
        Some(ref image) => list(image, args.start_address),
        None => flashfs::run(&args.build_options()).map(|_| ()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn list(image: &Path, base_address: u32) -> Result<(), BuildError> {
    info!("reading header of {} at {base_address:#X}", image.display());
    let header = flashfs::read_image_header(image, base_address, &IntelHex::default())?;
    println!("count: {}", header.count());
    for (index, entry) in header.entries().iter().enumerate() {
        println!(
            "{index}: addr 0x{:08X} len {}",
            entry.address, entry.length
        );
    }
    Ok(())
}
