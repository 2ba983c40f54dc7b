use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Deterministic showroom stock for local development and end-to-end runs.
///
/// The rows use `INSERT OR REPLACE`, so loading is idempotent and safe to
/// run on every startup of a development server.
pub struct DemoInventory;

impl DemoInventory {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_inventory.sql");

    /// Load the demo stock into the database, replacing rows that share a
    /// stock number. Returns the number of vehicles now present.
    pub async fn load(pool: &DbPool) -> Result<i64, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM car_inventory").fetch_one(pool).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!DemoInventory::SQL.is_empty());
    }

    #[tokio::test]
    async fn loading_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = DemoInventory::load(&pool).await.expect("load demo stock");
        let second = DemoInventory::load(&pool).await.expect("reload demo stock");
        assert_eq!(first, second);
        assert!(first >= 10);
    }

    #[tokio::test]
    async fn demo_stock_covers_multiple_makes() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        DemoInventory::load(&pool).await.expect("load demo stock");

        let makes: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT make) FROM car_inventory")
                .fetch_one(&pool)
                .await
                .expect("count makes");
        assert!(makes >= 4);
    }
}
