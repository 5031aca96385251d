//! smelter-explode: Promote a nested blob column to top-level columns
//!
//! Usage:
//!   # Read from file, output to stdout
//!   smelter-explode data/locations.csv
//!
//!   # Write to a file, blob column named "location"
//!   smelter-explode data/locations.csv --blob-column location -o data/locations_exploded.csv
//!
//!   # Semicolon-delimited export from stdin
//!   cat export.csv | smelter-explode --delimiter ';'

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use smelter::logging::init_logging;
use smelter::{explode, ExplodeConfig};
use std::fs::File;
use std::io::{stdin, stdout, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "smelter-explode")]
#[command(
    about = "Flatten a semi-structured blob column into top-level columns",
    long_about = None
)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file (use stdout if omitted)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Column holding the nested blob (default: "address")
    #[arg(long)]
    blob_column: Option<String>,

    /// Field delimiter for input and output (default: ",")
    #[arg(long)]
    delimiter: Option<char>,

    /// Column name for blobs that decode to a non-mapping value (default: "value")
    #[arg(long)]
    scalar_key: Option<String>,

    /// Separator used when renaming colliding keys (default: "_")
    #[arg(long)]
    separator: Option<String>,

    /// Exit non-zero if any blob failed to parse
    #[arg(long)]
    fail_on_parse_error: bool,

    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Build config
    let mut config = ExplodeConfig::default();
    if let Some(column) = args.blob_column {
        config.blob_column = column;
    }
    if let Some(delimiter) = args.delimiter {
        if !delimiter.is_ascii() {
            bail!("delimiter must be a single ASCII character");
        }
        config.delimiter = delimiter as u8;
    }
    if let Some(key) = args.scalar_key {
        config.scalar_key = key;
    }
    if let Some(sep) = args.separator {
        config.separator = sep;
    }

    let input: Box<dyn Read> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open input {}", path.display()))?,
        )),
        None => Box::new(stdin()),
    };

    // Exploding fully in memory first means a fatal error never leaves a partial file
    let mut buffer = Vec::new();
    let report = explode(input, &mut buffer, &config).context("explode failed")?;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&buffer)?;
            writer.flush()?;
            eprintln!(
                "Exploded {} rows ({} flattened columns) to {}",
                report.rows,
                report.schema.len(),
                path.display()
            );
        }
        None => {
            let mut out = stdout().lock();
            out.write_all(&buffer)?;
            out.flush()?;
        }
    }

    if args.fail_on_parse_error && !report.parse_failures.is_empty() {
        bail!("{} blobs could not be parsed", report.parse_failures.len());
    }

    Ok(())
}
