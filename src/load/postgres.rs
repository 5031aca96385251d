use super::{ChunkStream, CopySink};
use crate::config::DatabaseSettings;
use crate::error::{Result, SmelterError};
use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::{Pool, Postgres, Transaction};
use std::time::Duration;
use tracing::{error, info};

/// PostgreSQL sink: one connection, one transaction, one `COPY ... FROM STDIN`
///
/// Connection failures are surfaced, never retried; a COPY cannot be resumed
/// half way.
pub struct PgCopySink {
    pool: Pool<Postgres>,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgCopySink {
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let options = settings.connect_options()?;

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Failed to connect to PostgreSQL: {}", e);
                SmelterError::Database {
                    stage: "connect",
                    source: e,
                }
            })?;

        info!(
            host = %settings.host,
            port = settings.port,
            database = settings.name.as_deref().unwrap_or(""),
            "connected to PostgreSQL"
        );

        Ok(PgCopySink { pool, tx: None })
    }

    fn transaction(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| SmelterError::Transaction(String::from("COPY outside a transaction")))
    }
}

#[async_trait]
impl CopySink for PgCopySink {
    async fn begin(&mut self) -> Result<()> {
        if self.tx.is_some() {
            return Err(SmelterError::Transaction(String::from("transaction already open")));
        }
        let tx = self.pool.begin().await.map_err(SmelterError::database("begin"))?;
        self.tx = Some(tx);
        Ok(())
    }

    async fn copy_in(&mut self, statement: &str, chunks: ChunkStream<'_>) -> Result<u64> {
        let conn: &mut PgConnection = self.transaction()?;
        let mut copy = conn
            .copy_in_raw(statement)
            .await
            .map_err(SmelterError::database("copy"))?;

        for chunk in chunks {
            match chunk {
                Ok(bytes) => {
                    // A failed send leaves the COPY unusable; dropping it fails the COPY
                    copy.send(bytes).await.map_err(SmelterError::database("copy"))?;
                }
                Err(e) => {
                    if let Err(abort_error) = copy.abort(e.to_string()).await {
                        error!(error = %abort_error, "failed to abort COPY");
                    }
                    return Err(e);
                }
            }
        }

        copy.finish().await.map_err(SmelterError::database("copy"))
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| {
                SmelterError::Transaction(String::from("commit without a transaction"))
            })?;
        tx.commit().await.map_err(SmelterError::database("commit"))
    }

    async fn rollback(&mut self) -> Result<()> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(SmelterError::database("rollback")),
            None => Ok(()),
        }
    }
}
