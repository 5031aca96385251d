use super::{ChunkStream, CopySink};
use crate::error::{Result, SmelterError};
use async_trait::async_trait;
use csv::ReaderBuilder;
use tracing::info;

/// An in-memory sink with the same transaction contract as the database
///
/// Payload is staged while the transaction is open and only published on
/// commit; rollback discards it.
#[derive(Debug, Default)]
pub struct DryRunSink {
    staged: Option<Staged>,
    committed: Vec<u8>,
    committed_rows: u64,
    statements: Vec<String>,
    rollbacks: usize,
}

#[derive(Debug, Default)]
struct Staged {
    payload: Vec<u8>,
    rows: u64,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every COPY statement received, committed or not
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Payload of all committed transactions
    pub fn committed_payload(&self) -> &[u8] {
        &self.committed
    }

    pub fn committed_rows(&self) -> u64 {
        self.committed_rows
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }

    pub fn in_transaction(&self) -> bool {
        self.staged.is_some()
    }
}

#[async_trait]
impl CopySink for DryRunSink {
    async fn begin(&mut self) -> Result<()> {
        if self.staged.is_some() {
            return Err(SmelterError::Transaction(String::from("transaction already open")));
        }
        self.staged = Some(Staged::default());
        Ok(())
    }

    async fn copy_in(&mut self, statement: &str, chunks: ChunkStream<'_>) -> Result<u64> {
        let staged = self
            .staged
            .as_mut()
            .ok_or_else(|| SmelterError::Transaction(String::from("COPY outside a transaction")))?;
        self.statements.push(statement.to_string());

        let mut payload = Vec::new();
        for chunk in chunks {
            payload.extend_from_slice(&chunk?);
        }

        // Count the way the server would: csv records, not lines
        let rows = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(payload.as_slice())
            .records()
            .count() as u64;

        staged.payload.extend_from_slice(&payload);
        staged.rows += rows;
        Ok(rows)
    }

    async fn commit(&mut self) -> Result<()> {
        let staged = self
            .staged
            .take()
            .ok_or_else(|| {
                SmelterError::Transaction(String::from("commit without a transaction"))
            })?;
        info!(
            rows = staged.rows,
            bytes = staged.payload.len(),
            "dry run: transaction committed"
        );
        self.committed.extend_from_slice(&staged.payload);
        self.committed_rows += staged.rows;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if self.staged.take().is_some() {
            self.rollbacks += 1;
        }
        Ok(())
    }
}
