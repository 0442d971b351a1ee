use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod inspect;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode JSON documents as MessagePack.
    Encode(EncodeArgs),
    /// Decode MessagePack and print it as JSON.
    Decode(DecodeArgs),
    /// Summarize the top-level values of a MessagePack stream.
    Inspect(InspectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args),
        Command::Decode(args) => decode::run(args, format),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// JSON input file. Reads stdin when omitted or `-`.
    pub input: Option<PathBuf>,
    /// Encode every JSON document in the input, back to back.
    #[arg(long)]
    pub multi: bool,
    /// Write to this file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
    /// Write hex text instead of raw bytes.
    #[arg(long)]
    pub hex: bool,
    /// Emit map keys in sorted order.
    #[arg(long)]
    pub sort_keys: bool,
    /// Write floats as float32.
    #[arg(long)]
    pub float32: bool,
    /// Write every integer as a float.
    #[arg(long)]
    pub ints_as_floats: bool,
    /// Write integers beyond 32 bits as int64/uint64 instead of float64.
    #[arg(long)]
    pub big_int64: bool,
    /// Maximum nesting depth.
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Decode consecutive values until the input ends.
    #[arg(long)]
    pub multi: bool,
    #[command(flatten)]
    pub limits: LimitArgs,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub limits: LimitArgs,
}

#[derive(Args, Debug)]
pub struct SourceArgs {
    /// MessagePack input file. Reads stdin when omitted or `-`.
    pub input: Option<PathBuf>,
    /// Input is hex text; whitespace is ignored.
    #[arg(long)]
    pub hex: bool,
}

#[derive(Args, Debug, Default)]
pub struct LimitArgs {
    /// Maximum UTF-8 byte length of a string.
    #[arg(long, value_name = "N")]
    pub max_str_length: Option<usize>,
    /// Maximum binary length.
    #[arg(long, value_name = "N")]
    pub max_bin_length: Option<usize>,
    /// Maximum array length.
    #[arg(long, value_name = "N")]
    pub max_array_length: Option<usize>,
    /// Maximum map length.
    #[arg(long, value_name = "N")]
    pub max_map_length: Option<usize>,
    /// Maximum nesting depth.
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,
}

impl LimitArgs {
    pub fn decoder_options(&self) -> objpack::DecoderOptions {
        let defaults = objpack::DecoderOptions::default();
        objpack::DecoderOptions {
            max_str_length: self.max_str_length.unwrap_or(defaults.max_str_length),
            max_bin_length: self.max_bin_length.unwrap_or(defaults.max_bin_length),
            max_array_length: self.max_array_length.unwrap_or(defaults.max_array_length),
            max_map_length: self.max_map_length.unwrap_or(defaults.max_map_length),
            max_depth: self.max_depth.unwrap_or(defaults.max_depth),
            map_key_converter: None,
        }
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open the input file, or stdin for `None` and `-`.
pub fn open_input(path: Option<&PathBuf>) -> CliResult<Box<dyn Read>> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
            Ok(Box::new(BufReader::new(file)))
        }
        _ => Ok(Box::new(io::stdin().lock())),
    }
}

/// Read the whole MessagePack input, decoding hex text if requested.
pub fn read_source(source: &SourceArgs) -> CliResult<Vec<u8>> {
    let mut data = Vec::new();
    open_input(source.input.as_ref())?
        .read_to_end(&mut data)
        .map_err(|err| io_error("failed reading input", err))?;
    if source.hex {
        return parse_hex(&data);
    }
    Ok(data)
}

pub fn parse_hex(text: &[u8]) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = text
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex input has an odd number of digits"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| {
                    CliError::new(
                        USAGE,
                        format!("invalid hex digits: {}", String::from_utf8_lossy(pair)),
                    )
                })
        })
        .collect()
}
