//! smelter-load: Bulk-load a flat file into a PostgreSQL table
//!
//! The whole file goes in with one COPY inside one transaction: either every
//! row lands or none do. Loading the same file twice duplicates its rows.
//!
//! Usage:
//!   # Connection from DB_HOST / DB_PORT / DB_NAME / DB_USER / DB_PASSWORD (or .env)
//!   smelter-load data/locations_exploded.csv --table locations \
//!       --columns name,tenant_id,location_id,country,postal_code,locality
//!
//!   # Validate and encode without touching the database
//!   smelter-load data/locations_exploded.csv --table locations --columns name,locality --dry-run

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use smelter::logging::init_logging;
use smelter::{BulkLoader, DatabaseSettings, DryRunSink, PgCopySink};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "smelter-load")]
#[command(about = "Bulk-load a flat file into a table in one transaction", long_about = None)]
struct Args {
    /// Flat file with a header row
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Target table, optionally schema-qualified
    #[arg(long, short = 't')]
    table: String,

    /// Comma-separated destination columns, in order
    #[arg(long, short = 'c')]
    columns: String,

    /// Field delimiter of the file (default: ",")
    #[arg(long)]
    delimiter: Option<char>,

    /// Records per COPY data message (default: 1000)
    #[arg(long)]
    chunk_rows: Option<usize>,

    /// TOML file with connection settings; DB_* variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run the load against an in-memory sink instead of the database
    #[arg(long)]
    dry_run: bool,

    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let columns: Vec<String> = args
        .columns
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let mut loader = BulkLoader::new(args.table.clone(), columns);
    if let Some(delimiter) = args.delimiter {
        if !delimiter.is_ascii() {
            bail!("delimiter must be a single ASCII character");
        }
        loader = loader.with_delimiter(delimiter as u8);
    }
    if let Some(chunk_rows) = args.chunk_rows {
        loader = loader.with_chunk_rows(chunk_rows);
    }

    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let reader = BufReader::new(file);

    let report = if args.dry_run {
        let mut sink = DryRunSink::new();
        loader.load(reader, &mut sink).await.context("dry-run load failed")?
    } else {
        let settings = DatabaseSettings::load(args.config.as_deref())
            .context("Failed to load database settings")?;
        let mut sink = PgCopySink::connect(&settings)
            .await
            .context("Failed to connect to database")?;
        loader.load(reader, &mut sink).await.context("bulk load failed")?
    };

    eprintln!(
        "{} {} rows from {} into {}",
        if args.dry_run { "Validated" } else { "Loaded" },
        report.rows,
        args.input.display(),
        report.table
    );

    Ok(())
}
