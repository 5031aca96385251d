//! Read a delimited export into a [`Table`]
//!
//! Exports arrive as UTF-8 (sometimes with a BOM) or, from older spreadsheet
//! tools, as Windows-1252. Bytes are decoded up front and then parsed with the
//! `csv` crate, which handles quoted fields spanning several lines.

use crate::error::{Result, SmelterError};
use crate::types::{Cell, Row, Table};
use csv::{ReaderBuilder, StringRecord, Trim};
use encoding_rs::{UTF_8, WINDOWS_1252};
use std::io::Read;
use tracing::{debug, warn};

/// Options for [`read_table`]
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub delimiter: u8,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions { delimiter: b',' }
    }
}

/// Decode raw bytes, preferring UTF-8 and falling back to Windows-1252
pub fn decode_bytes(bytes: &[u8]) -> String {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return text.into_owned();
    }

    warn!("input is not valid UTF-8, decoding as Windows-1252");
    let (text, _, _) = WINDOWS_1252.decode(bytes);
    text.into_owned()
}

/// Read a whole table. Empty fields become null cells.
pub fn read_table<R: Read>(mut reader: R, options: &ReadOptions) -> Result<Table> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let content = decode_bytes(&bytes);

    let mut csv_reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .trim(Trim::None)
        .flexible(true)
        .from_reader(content.as_bytes());

    let header: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    if header.is_empty() || header.iter().all(String::is_empty) {
        return Err(SmelterError::Config(String::from("input file has no header row")));
    }

    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    while csv_reader.read_record(&mut record)? {
        let index = rows.len();
        if record.len() != header.len() {
            warn!(
                row = index,
                fields = record.len(),
                expected = header.len(),
                "row width differs from header, padding or truncating"
            );
        }
        rows.push(Row::new(index, to_cells(&record, header.len())));
    }

    debug!(rows = rows.len(), columns = header.len(), "input table read");
    Ok(Table::new(header, rows))
}

fn to_cells(record: &StringRecord, width: usize) -> Vec<Cell> {
    (0..width)
        .map(|i| match record.get(i) {
            Some("") | None => None,
            Some(value) => Some(value.to_string()),
        })
        .collect()
}
