use thiserror::Error;

/// Fatal failures of the explode and load stages.
///
/// Per-row parse failures are not represented here: they degrade the row to
/// an empty structure and are reported through [`crate::ParseFailure`].
#[derive(Error, Debug)]
pub enum SmelterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error during {stage}: {source}")]
    Database {
        stage: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Read stage failed: column '{0}' not found in input header")]
    MissingColumn(String),

    #[error("Merge stage failed: {rows} rows but {fragments} flattened fragments")]
    Alignment { rows: usize, fragments: usize },

    #[error("Load stage failed: {0}")]
    ColumnMismatch(String),

    #[error("Load stage failed: malformed record {record}: {reason}")]
    MalformedRecord { record: u64, reason: String },

    #[error("Load stage failed: {0}")]
    Transaction(String),
}

impl SmelterError {
    pub(crate) fn database(stage: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| SmelterError::Database { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, SmelterError>;
