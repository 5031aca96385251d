//! The explode pipeline: read, normalize, parse, flatten, merge, write

use crate::error::{Result, SmelterError};
use crate::flatten::ColumnFlattener;
use crate::merge::TableMerger;
use crate::normalize::normalize_blob;
use crate::parse::StructureParser;
use crate::reader::{read_table, ReadOptions};
use crate::types::{ExplodeConfig, FlatTable, ParseFailure, Structure, Table};
use crate::writer::FlatWriter;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use tracing::info;

/// Summary of one explode run
#[derive(Debug, Clone, Default)]
pub struct ExplodeReport {
    pub rows: usize,

    /// Names of the appended columns, in output order
    pub schema: Vec<String>,

    pub parse_failures: Vec<ParseFailure>,

    /// Rows decoded per strategy name
    pub decoded_by: BTreeMap<&'static str, usize>,

    /// Rows whose blob was null or empty
    pub empty_blobs: usize,
}

/// Explode an in-memory table. Nothing here touches I/O.
pub fn explode_table(table: &Table, config: &ExplodeConfig) -> Result<(FlatTable, ExplodeReport)> {
    let blob_column = table
        .column_index(&config.blob_column)
        .ok_or_else(|| SmelterError::MissingColumn(config.blob_column.clone()))?;

    let parser = StructureParser::new(config.scalar_key.clone());
    let mut report = ExplodeReport {
        rows: table.len(),
        ..Default::default()
    };

    // Pass 1 needs every structure before the schema is final
    let structures: Vec<Structure> = table
        .rows
        .iter()
        .map(|row| {
            let normalized = normalize_blob(row.get(blob_column));
            let outcome = parser.parse(normalized.as_deref());

            match (outcome.decoded_by, &outcome.failure) {
                (Some(name), _) => *report.decoded_by.entry(name).or_insert(0) += 1,
                (None, Some(reason)) => report.parse_failures.push(ParseFailure {
                    row: row.index,
                    raw: normalized.clone().unwrap_or_default(),
                    reason: reason.clone(),
                }),
                (None, None) => report.empty_blobs += 1,
            }

            outcome.structure
        })
        .collect();

    let flattened = ColumnFlattener::new().flatten(&structures);
    let merged = TableMerger::new(blob_column, config.separator.clone()).merge(table, &flattened)?;

    report.schema = merged.header[table.header.len() - 1..].to_vec();
    Ok((merged, report))
}

/// Read an export, explode its blob column and write the flat file.
///
/// Output is only written once the whole batch has merged.
pub fn explode<R: Read, W: Write>(
    input: R,
    output: W,
    config: &ExplodeConfig,
) -> Result<ExplodeReport> {
    let table = read_table(
        input,
        &ReadOptions {
            delimiter: config.delimiter,
        },
    )?;

    let (merged, report) = explode_table(&table, config)?;

    let mut writer = FlatWriter::new(output, config.delimiter);
    writer.write_table(&merged)?;
    writer.flush()?;

    info!(
        rows = report.rows,
        columns = merged.header.len(),
        flattened = report.schema.len(),
        failures = report.parse_failures.len(),
        empty = report.empty_blobs,
        "explode complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
name,tenant_id,address,industry
North,t1,\"{\"\"city\"\": \"\"Reno\"\", \"\"zip\"\": \"\"89501\"\"}\",retail
South,t1,\"{'city': 'Sparks',
   'region': 'NV'}\",food
West,t2,not a structure at all,retail
East,t2,,services
";

    #[test]
    fn test_explode_mixed_encodings() {
        let mut output = Vec::new();
        let report = explode(EXPORT.as_bytes(), &mut output, &ExplodeConfig::default()).unwrap();

        assert_eq!(report.rows, 4);
        assert_eq!(report.schema, vec!["city", "zip", "region"]);
        assert_eq!(report.decoded_by.get("json"), Some(&1));
        assert_eq!(report.decoded_by.get("literal"), Some(&1));
        assert_eq!(report.empty_blobs, 1);
        assert_eq!(report.parse_failures.len(), 1);
        assert_eq!(report.parse_failures[0].row, 2);
        assert_eq!(report.parse_failures[0].raw, "not a structure at all");

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "name,tenant_id,industry,city,zip,region",
                "North,t1,retail,Reno,89501,",
                "South,t1,food,Sparks,,NV",
                "West,t2,retail,,,",
                "East,t2,services,,,",
            ]
        );
    }

    #[test]
    fn test_missing_blob_column_is_fatal() {
        let config = ExplodeConfig {
            blob_column: "location".into(),
            ..Default::default()
        };
        let mut output = Vec::new();
        let err = explode(EXPORT.as_bytes(), &mut output, &config).unwrap_err();

        assert!(matches!(err, SmelterError::MissingColumn(ref c) if c == "location"));
        assert!(output.is_empty());
    }

    #[test]
    fn test_all_blobs_empty_keeps_rows() {
        let input = "id,address\n1,\n2,\n";
        let mut output = Vec::new();
        let report = explode(input.as_bytes(), &mut output, &ExplodeConfig::default()).unwrap();

        assert!(report.schema.is_empty());
        assert_eq!(String::from_utf8(output).unwrap(), "id\n1\n2\n");
    }
}
