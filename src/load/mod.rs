//! Bulk relational loading
//!
//! A finalized flat file is streamed into one table with a single
//! `COPY ... FROM STDIN` inside one transaction. Any failure after the
//! transaction opens rolls it back, so a table never holds half a batch.
//!
//! Loading is not idempotent: loading the same file twice inserts its rows
//! twice. Clearing the table first is the caller's job.

pub mod dry_run;
pub mod postgres;

pub use dry_run::DryRunSink;
pub use postgres::PgCopySink;

use crate::error::{Result, SmelterError};
use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use std::collections::HashSet;
use std::io::Read;
use tracing::{debug, error, info, warn};

/// A stream of encoded COPY payload chunks
pub type ChunkStream<'a> = &'a mut (dyn Iterator<Item = Result<Vec<u8>>> + Send);

/// Transport seam for the loader
#[async_trait]
pub trait CopySink: Send {
    /// Open the transaction
    async fn begin(&mut self) -> Result<()>;

    /// Run one COPY statement, sending every chunk. Returns the rows copied.
    ///
    /// A chunk error must abort the COPY and be returned unchanged.
    async fn copy_in(&mut self, statement: &str, chunks: ChunkStream<'_>) -> Result<u64>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}

/// How file columns map onto destination columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnMapping {
    /// File column positions, in destination order
    ByName(Vec<usize>),
    /// File columns are sent as they are
    Positional,
}

impl ColumnMapping {
    /// Names win when every destination column is in the header. Otherwise
    /// the counts must match and the caller's ordering is trusted, unless a
    /// destination name sits in the header at a different position.
    pub fn resolve(header: &[String], destination: &[String]) -> Result<Self> {
        let found: Vec<Option<usize>> = destination
            .iter()
            .map(|column| header.iter().position(|h| h == column))
            .collect();

        if found.iter().all(Option::is_some) {
            let positions: Vec<usize> = found.into_iter().flatten().collect();
            let identity = positions.len() == header.len()
                && positions.iter().enumerate().all(|(i, p)| i == *p);
            return Ok(if identity {
                ColumnMapping::Positional
            } else {
                ColumnMapping::ByName(positions)
            });
        }

        let missing: Vec<&str> = destination
            .iter()
            .filter(|c| !header.contains(c))
            .map(String::as_str)
            .collect();

        if header.len() != destination.len() {
            return Err(SmelterError::ColumnMismatch(format!(
                "file has {} columns but {} destination columns were given, \
                 and [{}] are not in the header",
                header.len(),
                destination.len(),
                missing.join(", ")
            )));
        }

        let displaced: Vec<String> = found
            .iter()
            .enumerate()
            .filter_map(|(i, p)| match p {
                Some(p) if *p != i => Some(format!(
                    "{} (file column {}, destination {})",
                    destination[i],
                    p + 1,
                    i + 1
                )),
                _ => None,
            })
            .collect();
        if !displaced.is_empty() {
            return Err(SmelterError::ColumnMismatch(format!(
                "[{}] are not in the header and [{}] are at different positions, \
                 so the file cannot be loaded positionally",
                missing.join(", "),
                displaced.join(", ")
            )));
        }

        warn!(
            header = ?header,
            destination = ?destination,
            "destination columns do not match the file header by name, loading positionally"
        );
        Ok(ColumnMapping::Positional)
    }

    fn project<'r>(&self, record: &'r StringRecord) -> Vec<&'r str> {
        match self {
            ColumnMapping::Positional => record.iter().collect(),
            ColumnMapping::ByName(positions) => {
                positions.iter().map(|&p| record.get(p).unwrap_or("")).collect()
            }
        }
    }
}

/// Summary of one load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub table: String,
    pub rows: u64,
    pub mapping: ColumnMapping,
}

/// Streams a flat file into one table
#[derive(Debug, Clone)]
pub struct BulkLoader {
    table: String,
    columns: Vec<String>,
    chunk_rows: usize,
    delimiter: u8,
}

impl BulkLoader {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        BulkLoader {
            table: table.into(),
            columns,
            chunk_rows: 1000,
            delimiter: b',',
        }
    }

    /// Records per COPY data message
    pub fn with_chunk_rows(mut self, chunk_rows: usize) -> Self {
        self.chunk_rows = chunk_rows.max(1);
        self
    }

    /// Delimiter of the file being loaded
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// The COPY statement, with every identifier quoted
    pub fn copy_statement(&self) -> Result<String> {
        self.validate()?;

        let table = self
            .table
            .split('.')
            .map(quote_identifier)
            .collect::<Vec<_>>()
            .join(".");
        let columns = self
            .columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("COPY {} ({}) FROM STDIN WITH (FORMAT csv)", table, columns))
    }

    fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() || self.table.split('.').any(str::is_empty) {
            return Err(SmelterError::ColumnMismatch(format!(
                "invalid table name '{}'",
                self.table
            )));
        }
        if self.columns.is_empty() {
            return Err(SmelterError::ColumnMismatch(String::from("no destination columns given")));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.as_str()) {
                return Err(SmelterError::ColumnMismatch(format!(
                    "destination column '{}' listed twice",
                    column
                )));
            }
        }
        Ok(())
    }

    /// Load a flat file (with header) through `sink` in one transaction
    pub async fn load<R, S>(&self, reader: R, sink: &mut S) -> Result<LoadReport>
    where
        R: Read + Send,
        S: CopySink + ?Sized,
    {
        let statement = self.copy_statement()?;

        let mut csv_reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(reader);
        let header: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();

        sink.begin().await?;
        debug!(table = %self.table, "transaction opened");

        match self.stream(&statement, &header, csv_reader, sink).await {
            Ok(report) => {
                sink.commit().await?;
                info!(table = %report.table, rows = report.rows, "bulk load committed");
                Ok(report)
            }
            Err(e) => {
                if let Err(rollback_error) = sink.rollback().await {
                    error!(error = %rollback_error, "rollback failed");
                }
                error!(table = %self.table, error = %e, "bulk load rolled back");
                Err(e)
            }
        }
    }

    async fn stream<R, S>(
        &self,
        statement: &str,
        header: &[String],
        csv_reader: csv::Reader<R>,
        sink: &mut S,
    ) -> Result<LoadReport>
    where
        R: Read + Send,
        S: CopySink + ?Sized,
    {
        let mapping = ColumnMapping::resolve(header, &self.columns)?;
        debug!(statement = %statement, mapping = ?mapping, "starting COPY");

        let mut chunks = ChunkEncoder {
            records: csv_reader.into_records(),
            mapping: mapping.clone(),
            width: header.len(),
            chunk_rows: self.chunk_rows,
            sent: 0,
            done: false,
        };
        let rows = sink.copy_in(statement, &mut chunks).await?;

        if rows != chunks.sent {
            warn!(
                sent = chunks.sent,
                copied = rows,
                "row count reported by the sink differs from rows sent"
            );
        }

        Ok(LoadReport {
            table: self.table.clone(),
            rows,
            mapping,
        })
    }
}

/// Re-encodes file records as COPY csv payload, `chunk_rows` records at a time
struct ChunkEncoder<R> {
    records: StringRecordsIntoIter<R>,
    mapping: ColumnMapping,
    width: usize,
    chunk_rows: usize,
    sent: u64,
    done: bool,
}

impl<R: Read> Iterator for ChunkEncoder<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut buffer = Vec::new();
        let mut in_chunk = 0;
        while in_chunk < self.chunk_rows {
            let record = match self.records.next() {
                None => {
                    self.done = true;
                    break;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(SmelterError::MalformedRecord {
                        record: self.sent + 1,
                        reason: e.to_string(),
                    }));
                }
                Some(Ok(record)) => record,
            };

            if record.len() != self.width {
                self.done = true;
                return Some(Err(SmelterError::MalformedRecord {
                    record: self.sent + 1,
                    reason: format!("expected {} fields, found {}", self.width, record.len()),
                }));
            }

            encode_record(&mut buffer, &self.mapping.project(&record));
            self.sent += 1;
            in_chunk += 1;
        }

        if buffer.is_empty() {
            None
        } else {
            Some(Ok(buffer))
        }
    }
}

/// Append one COPY csv line. Empty fields stay unquoted so they load as NULL.
fn encode_record(buffer: &mut Vec<u8>, fields: &[&str]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            buffer.push(b',');
        }
        let needs_quotes = *field == "\\."
            || field
                .bytes()
                .any(|b| matches!(b, b',' | b'"' | b'\n' | b'\r'));
        if needs_quotes {
            buffer.push(b'"');
            buffer.extend_from_slice(field.replace('"', "\"\"").as_bytes());
            buffer.push(b'"');
        } else {
            buffer.extend_from_slice(field.as_bytes());
        }
    }
    buffer.push(b'\n');
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
