use crate::error::{Result, SmelterError};
use crate::flatten::Flattened;
use crate::types::{FlatTable, Table};
use std::collections::HashSet;
use tracing::warn;

/// Reattaches flattened columns to the rest of each row
///
/// Alignment is strictly positional: fragment `i` belongs to row `i`.
pub struct TableMerger {
    blob_column: usize,
    separator: String,
}

impl TableMerger {
    /// `blob_column` is the header position of the column being replaced
    pub fn new(blob_column: usize, separator: impl Into<String>) -> Self {
        TableMerger {
            blob_column,
            separator: separator.into(),
        }
    }

    /// Output header: retained input columns, then schema columns.
    ///
    /// A schema key that collides with a retained column is renamed
    /// `<blob><separator><key>` (with a numeric suffix if that still collides).
    pub fn header(&self, table: &Table, flattened: &Flattened) -> Vec<String> {
        let blob_name = table.header.get(self.blob_column).map(String::as_str).unwrap_or("blob");

        let mut header: Vec<String> = table
            .header
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.blob_column)
            .map(|(_, name)| name.clone())
            .collect();
        let mut taken: HashSet<String> = header.iter().cloned().collect();

        for key in flattened.schema.keys() {
            let name = if taken.contains(key) {
                let base = format!("{}{}{}", blob_name, self.separator, key);
                let mut candidate = base.clone();
                let mut n = 2;
                while taken.contains(&candidate) {
                    candidate = format!("{}{}{}", base, self.separator, n);
                    n += 1;
                }
                warn!(
                    key = %key,
                    column = %candidate,
                    "flattened key collides with an existing column, renamed"
                );
                candidate
            } else {
                key.clone()
            };
            taken.insert(name.clone());
            header.push(name);
        }

        header
    }

    /// Merge rows with their fragments. A count mismatch aborts the batch.
    pub fn merge(&self, table: &Table, flattened: &Flattened) -> Result<FlatTable> {
        if table.rows.len() != flattened.fragments.len() {
            return Err(SmelterError::Alignment {
                rows: table.rows.len(),
                fragments: flattened.fragments.len(),
            });
        }

        let header = self.header(table, flattened);
        let retained = table.header.len().saturating_sub(1);

        let records = table
            .rows
            .iter()
            .zip(flattened.fragments.iter())
            .map(|(row, fragment)| {
                let mut record = Vec::with_capacity(retained + fragment.len());
                for column in 0..table.header.len() {
                    if column != self.blob_column {
                        record.push(row.cells.get(column).cloned().flatten());
                    }
                }
                record.extend(fragment.iter().cloned());
                record
            })
            .collect();

        Ok(FlatTable { header, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::ColumnFlattener;
    use crate::types::{Row, Structure};
    use serde_json::json;

    fn cell(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    fn sample_table() -> Table {
        Table::new(
            vec!["name".into(), "address".into(), "tenant_id".into()],
            vec![
                Row::new(0, vec![cell("North"), cell("{}"), cell("t1")]),
                Row::new(1, vec![cell("South"), None, cell("t2")]),
            ],
        )
    }

    fn flattened(values: Vec<serde_json::Value>) -> Flattened {
        let structures: Vec<Structure> = values
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect();
        ColumnFlattener::new().flatten(&structures)
    }

    #[test]
    fn test_merge_drops_blob_and_appends_schema() {
        let table = sample_table();
        let flat = flattened(vec![json!({"city": "Reno"}), json!({"zip": "89501"})]);

        let merged = TableMerger::new(1, "_").merge(&table, &flat).unwrap();

        assert_eq!(merged.header, vec!["name", "tenant_id", "city", "zip"]);
        assert_eq!(
            merged.records,
            vec![
                vec![cell("North"), cell("t1"), cell("Reno"), None],
                vec![cell("South"), cell("t2"), None, cell("89501")],
            ]
        );
    }

    #[test]
    fn test_merge_rejects_fragment_mismatch() {
        let table = sample_table();
        let flat = flattened(vec![json!({"city": "Reno"})]);

        let err = TableMerger::new(1, "_").merge(&table, &flat).unwrap_err();

        assert!(matches!(err, SmelterError::Alignment { rows: 2, fragments: 1 }));
        assert!(err.to_string().contains("Merge stage"));
    }

    #[test]
    fn test_colliding_keys_are_renamed() {
        let table = sample_table();
        let flat = flattened(vec![json!({"name": "HQ", "tenant_id": "x"}), json!({})]);

        let merged = TableMerger::new(1, "_").merge(&table, &flat).unwrap();

        assert_eq!(
            merged.header,
            vec!["name", "tenant_id", "address_name", "address_tenant_id"]
        );
        assert_eq!(merged.records[0][2], cell("HQ"));
    }

    #[test]
    fn test_short_rows_fill_with_null() {
        let table = Table::new(
            vec!["name".into(), "address".into(), "tenant_id".into()],
            vec![Row::new(0, vec![cell("Only")])],
        );
        let flat = flattened(vec![json!({})]);

        let merged = TableMerger::new(1, "_").merge(&table, &flat).unwrap();

        assert_eq!(merged.records, vec![vec![cell("Only"), None]]);
    }
}
