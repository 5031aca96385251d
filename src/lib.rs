//! # Smelter - Blob Explode and Bulk Load Toolkit
//!
//! Turns tabular exports carrying a semi-structured blob column (JSON,
//! literal-dict text, or garbage) into flat files with one column per
//! observed key, and bulk-loads those files into PostgreSQL.
//!
//! ## Modules
//!
//! - **normalize**: Collapse whitespace noise in raw blobs
//! - **parse**: Decode blobs with ordered, pluggable strategies
//! - **flatten**: Union of keys in first-seen order, one fragment per row
//! - **merge**: Reattach flattened columns to the remaining row fields
//! - **load**: Transactional `COPY ... FROM STDIN` into a target table
//!
//! ## Quick Start
//!
//! ```rust
//! use smelter::{explode, ExplodeConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let input = "name,address\nNorth,\"{'city': 'Reno', 'zip': '89501'}\"\n";
//! let mut output = Vec::new();
//!
//! let report = explode(input.as_bytes(), &mut output, &ExplodeConfig::default())?;
//!
//! assert_eq!(report.schema, vec!["city", "zip"]);
//! assert_eq!(String::from_utf8(output)?, "name,city,zip\nNorth,Reno,89501\n");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod flatten;
pub mod load;
pub mod logging;
pub mod merge;
pub mod normalize;
pub mod parse;
pub mod pipeline;
pub mod reader;
pub mod types;
pub mod writer;

// Re-export commonly used types for convenience
pub use config::DatabaseSettings;
pub use error::{Result, SmelterError};
pub use flatten::{ColumnFlattener, ColumnSchema, Flattened};
pub use load::{BulkLoader, ColumnMapping, CopySink, DryRunSink, LoadReport, PgCopySink};
pub use merge::TableMerger;
pub use normalize::normalize_blob;
pub use parse::{DecodeError, DecodeStrategy, ParseOutcome, StructureParser};
pub use pipeline::{explode, explode_table, ExplodeReport};
pub use types::{Cell, ExplodeConfig, FlatTable, ParseFailure, Row, Structure, Table};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_explode() {
        let input = "\
id,address
1,\"{\"\"a\"\": 1, \"\"b\"\": 2}\"
2,\"{'b': 3, 'c': 4}\"
3,\"{'a': 5}\"
";
        let mut output = Vec::new();
        let report = explode(input.as_bytes(), &mut output, &ExplodeConfig::default()).unwrap();

        assert_eq!(report.schema, vec!["a", "b", "c"]);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "id,a,b,c\n1,1,2,\n2,,3,4\n3,5,,\n"
        );
    }
}
