// SQLite persistence gateway. One row per reading; value kept as its two-decimal text.

use crate::error::StoreError;
use crate::fanout::MetricStore;
use crate::models::{Category, MetricRecord, Reading, format_value, value::parse_value};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

pub struct MetricRepo {
    pool: SqlitePool,
    retention_ms: i64,
}

impl MetricRepo {
    pub async fn connect(path: &str, retention_days: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        let retention_ms = (retention_days as i64) * 24 * 60 * 60 * 1000;
        Ok(Self { pool, retention_ms })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                value TEXT NOT NULL,
                category TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                entity TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_metrics_category ON metrics(category)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_metrics_timestamp ON metrics(timestamp)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[instrument(skip(self, reading), fields(repo = "metrics", operation = "append", category = %reading.category))]
    pub async fn append(&self, reading: &Reading) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO metrics (name, value, category, timestamp, entity) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&reading.name)
        .bind(format_value(reading.value))
        .bind(reading.category.as_str())
        .bind(reading.timestamp.timestamp_millis())
        .bind(reading.entity.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All records, or those of one category, oldest first.
    #[instrument(skip(self), fields(repo = "metrics", operation = "query"))]
    pub async fn query(&self, category: Option<&Category>) -> Result<Vec<MetricRecord>, StoreError> {
        let rows = match category {
            Some(c) => {
                sqlx::query(
                    "SELECT id, name, value, category, timestamp, entity FROM metrics
                     WHERE category = $1 ORDER BY timestamp ASC, id ASC",
                )
                .bind(c.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, name, value, category, timestamp, entity FROM metrics
                     ORDER BY timestamp ASC, id ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(parse_row).collect()
    }

    /// Deletes records older than the retention window. Returns the number removed.
    #[instrument(skip(self), fields(repo = "metrics", operation = "prune_old_data"))]
    pub async fn prune_old_data(&self) -> Result<u64, StoreError> {
        let cutoff = Utc::now().timestamp_millis() - self.retention_ms;
        let r = sqlx::query("DELETE FROM metrics WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// Closes the pool; later calls fail with `StoreError::Unavailable`.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Reclaim space after deletes (run periodically after pruning).
    #[instrument(skip(self), fields(repo = "metrics", operation = "vacuum"))]
    pub async fn vacuum(&self) -> Result<(), StoreError> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

fn parse_row(row: &SqliteRow) -> Result<MetricRecord, StoreError> {
    let id: i64 = row.try_get("id")?;
    let name: String = row.try_get("name")?;
    let raw_value: String = row.try_get("value")?;
    let raw_category: String = row.try_get("category")?;
    let ts_ms: i64 = row.try_get("timestamp")?;
    let entity: Option<String> = row.try_get("entity")?;

    let value = parse_value(&raw_value)
        .map_err(|e| StoreError::InvalidRecord(format!("id {}: value {:?}: {}", id, raw_value, e)))?;
    let category = Category::parse(&raw_category)
        .ok_or_else(|| StoreError::InvalidRecord(format!("id {}: empty category", id)))?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(ts_ms)
        .ok_or_else(|| StoreError::InvalidRecord(format!("id {}: timestamp {}", id, ts_ms)))?;

    Ok(MetricRecord {
        id,
        name,
        category,
        value,
        timestamp,
        entity,
    })
}

#[async_trait]
impl MetricStore for MetricRepo {
    async fn append(&self, reading: &Reading) -> Result<(), StoreError> {
        MetricRepo::append(self, reading).await
    }

    async fn query(&self, category: Option<&Category>) -> Result<Vec<MetricRecord>, StoreError> {
        MetricRepo::query(self, category).await
    }
}
