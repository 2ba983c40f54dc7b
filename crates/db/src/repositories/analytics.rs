use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use dealerdesk_core::domain::analytics::AnalyticsRecord;

use super::{AnalyticsRepository, RepositoryError};
use crate::DbPool;

/// Append-only store for token-cost rows. Costs travel as decimal strings
/// because the SQLite driver has no native decimal column type.
pub struct SqlAnalyticsRepository {
    pool: DbPool,
}

impl SqlAnalyticsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AnalyticsRepository for SqlAnalyticsRepository {
    async fn record(&self, record: &AnalyticsRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO analytics_data \
             (date, model, prompt_tokens, completion_tokens, total_tokens, \
              prompt_cost, completion_cost, total_cost) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(record.date)
        .bind(&record.model)
        .bind(record.prompt_tokens)
        .bind(record.completion_tokens)
        .bind(record.total_tokens)
        .bind(record.prompt_cost.to_string())
        .bind(record.completion_cost.to_string())
        .bind(record.total_cost.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<AnalyticsRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT date, model, prompt_tokens, completion_tokens, total_tokens, \
             prompt_cost, completion_cost, total_cost \
             FROM analytics_data ORDER BY date ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn reset(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM analytics_data").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

fn record_from_row(row: sqlx::sqlite::SqliteRow) -> Result<AnalyticsRecord, RepositoryError> {
    let date: DateTime<Utc> = row.try_get("date")?;
    Ok(AnalyticsRecord {
        date,
        model: row.try_get("model")?,
        prompt_tokens: row.try_get("prompt_tokens")?,
        completion_tokens: row.try_get("completion_tokens")?,
        total_tokens: row.try_get("total_tokens")?,
        prompt_cost: decimal_column(&row, "prompt_cost")?,
        completion_cost: decimal_column(&row, "completion_cost")?,
        total_cost: decimal_column(&row, "total_cost")?,
    })
}

fn decimal_column(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<Decimal, RepositoryError> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|error| {
        RepositoryError::Decode(format!("column `{column}` is not a decimal: {error}"))
    })
}
