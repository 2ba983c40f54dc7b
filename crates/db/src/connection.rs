use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use dealerdesk_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Opens the showroom database described by the validated configuration.
/// Config validation already rejects a zero pool size or timeout.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(timeout_secs))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Summaries and analytics are written mid-request while the
                // health check reads; WAL plus a busy timeout keeps those
                // from tripping over each other on SQLite.
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}
