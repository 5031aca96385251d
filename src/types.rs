use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single scalar cell; `None` is the null marker
pub type Cell = Option<String>;

/// A decoded blob: insertion-ordered key/value pairs
pub type Structure = Map<String, Value>;

/// One row's values reindexed onto a [`crate::ColumnSchema`]
pub type Fragment = Vec<Cell>;

/// One input record - positional identity plus cells aligned to the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 0-based data row index in the source file
    pub index: usize,

    /// Cells in header order
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(index: usize, cells: Vec<Cell>) -> Self {
        Row { index, cells }
    }

    /// Get a cell by column position, treating missing positions as null
    pub fn get(&self, column: usize) -> Option<&str> {
        self.cells.get(column).and_then(|c| c.as_deref())
    }
}

/// A decoded input file
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(header: Vec<String>, rows: Vec<Row>) -> Self {
        Table { header, rows }
    }

    /// Position of a column in the header
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The merged output: retained columns followed by schema columns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatTable {
    pub header: Vec<String>,
    pub records: Vec<Vec<Cell>>,
}

/// A row whose blob could not be decoded by any strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    /// Row index in the source file
    pub row: usize,

    /// The normalized blob text that was rejected
    pub raw: String,

    /// One reason per strategy, in priority order
    pub reason: String,
}

/// Configuration for the explode pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplodeConfig {
    /// Name of the column holding the nested blob
    pub blob_column: String,

    /// Field delimiter for both the input and the output file
    pub delimiter: u8,

    /// Key used when a blob decodes to a value that is not a mapping
    pub scalar_key: String,

    /// Separator between the blob column name and a colliding key
    pub separator: String,
}

impl Default for ExplodeConfig {
    fn default() -> Self {
        ExplodeConfig {
            blob_column: String::from("address"),
            delimiter: b',',
            scalar_key: String::from("value"),
            separator: String::from("_"),
        }
    }
}

/// Render a structure value as a flat cell
pub fn value_to_cell(value: &Value) -> Cell {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        // Nested containers stay in one cell as compact JSON
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_to_cell() {
        assert_eq!(value_to_cell(&json!(null)), None);
        assert_eq!(value_to_cell(&json!("Reno")), Some("Reno".to_string()));
        assert_eq!(value_to_cell(&json!(89501)), Some("89501".to_string()));
        assert_eq!(value_to_cell(&json!(1.5)), Some("1.5".to_string()));
        assert_eq!(value_to_cell(&json!(true)), Some("true".to_string()));
        assert_eq!(
            value_to_cell(&json!({"b": 1, "a": [2, 3]})),
            Some(r#"{"b":1,"a":[2,3]}"#.to_string())
        );
    }

    #[test]
    fn test_row_get_out_of_range() {
        let row = Row::new(0, vec![Some("x".to_string()), None]);
        assert_eq!(row.get(0), Some("x"));
        assert_eq!(row.get(1), None);
        assert_eq!(row.get(7), None);
    }
}
