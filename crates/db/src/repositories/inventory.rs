use sqlx::{QueryBuilder, Row, Sqlite};

use dealerdesk_core::domain::inventory::{InventoryFilter, Vehicle};

use super::{InventoryRepository, RepositoryError};
use crate::DbPool;

pub struct SqlInventoryRepository {
    pool: DbPool,
}

impl SqlInventoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl InventoryRepository for SqlInventoryRepository {
    async fn search(&self, filter: &InventoryFilter) -> Result<Vec<Vehicle>, RepositoryError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT stock_number, vin, make, model, year, price, mileage, color, description, \
             created_at FROM car_inventory WHERE 1 = 1",
        );

        // SQLite LIKE is case-insensitive for ASCII, matching the intended
        // substring semantics for descriptive fields.
        if !filter.make.is_empty() {
            builder.push(" AND make LIKE ").push_bind(format!("%{}%", filter.make));
        }
        if !filter.model.is_empty() {
            builder.push(" AND model LIKE ").push_bind(format!("%{}%", filter.model));
        }
        if !filter.color.is_empty() {
            builder.push(" AND color LIKE ").push_bind(format!("%{}%", filter.color));
        }
        // Identifiers match exactly.
        if !filter.stock_number.is_empty() {
            builder.push(" AND stock_number = ").push_bind(filter.stock_number.clone());
        }
        if !filter.vin.is_empty() {
            builder.push(" AND vin = ").push_bind(filter.vin.clone());
        }

        if filter.has_year_min() {
            builder.push(" AND year >= ").push_bind(filter.year_min);
        }
        if filter.has_year_max() {
            builder.push(" AND year <= ").push_bind(filter.year_max);
        }
        if filter.has_price_min() {
            builder.push(" AND price >= ").push_bind(filter.price_min);
        }
        if filter.has_price_max() {
            builder.push(" AND price <= ").push_bind(filter.price_max);
        }
        if filter.has_mileage_max() {
            builder.push(" AND mileage <= ").push_bind(filter.mileage_max);
        }

        builder.push(" ORDER BY stock_number");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(vehicle_from_row).collect()
    }
}

fn vehicle_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Vehicle, RepositoryError> {
    Ok(Vehicle {
        stock_number: row.try_get("stock_number")?,
        vin: row.try_get("vin")?,
        make: row.try_get("make")?,
        model: row.try_get("model")?,
        year: row.try_get("year")?,
        price: row.try_get("price")?,
        mileage: row.try_get("mileage")?,
        color: row.try_get("color")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use dealerdesk_core::domain::inventory::InventoryFilter;

    use super::*;
    use crate::{connect_with_settings, migrations};

    async fn seeded_repository() -> SqlInventoryRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");

        let rows: &[(&str, &str, &str, &str, i64, f64, i64, &str)] = &[
            ("A100", "1N4BL4BV4KC117001", "Nissan", "Altima", 2019, 18500.0, 42000, "Silver"),
            ("A101", "1N4BL4CV2LC118002", "Nissan", "Altima", 2021, 24900.0, 15500, "Pearl White"),
            ("R200", "JN8AT3MV6LW119003", "Nissan", "Rogue", 2020, 22900.0, 30100, "Gun Metallic"),
            ("F300", "1FTEW1EP5MF120004", "Ford", "F-150", 2021, 38900.0, 25800, "Blue"),
            ("C400", "1G1ZD5ST1LF121005", "Chevrolet", "Malibu", 2020, 17900.0, 38700, "Black"),
        ];
        for (stock, vin, make, model, year, price, mileage, color) in rows {
            sqlx::query(
                "INSERT INTO car_inventory \
                 (stock_number, vin, make, model, year, price, mileage, color, description) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(stock)
            .bind(vin)
            .bind(make)
            .bind(model)
            .bind(year)
            .bind(price)
            .bind(mileage)
            .bind(color)
            .bind(format!("{year} {make} {model} in {color}"))
            .execute(&pool)
            .await
            .expect("seed row");
        }

        SqlInventoryRepository::new(pool)
    }

    #[tokio::test]
    async fn unfiltered_search_returns_everything() {
        let repo = seeded_repository().await;
        let vehicles = repo.search(&InventoryFilter::default()).await.expect("search");
        assert_eq!(vehicles.len(), 5);
    }

    #[tokio::test]
    async fn make_matches_as_case_insensitive_substring() {
        let repo = seeded_repository().await;
        let filter = InventoryFilter { make: "niss".to_string(), ..InventoryFilter::default() };
        let vehicles = repo.search(&filter).await.expect("search");
        assert_eq!(vehicles.len(), 3);
        assert!(vehicles.iter().all(|v| v.make == "Nissan"));
    }

    #[tokio::test]
    async fn color_substring_matches_compound_names() {
        let repo = seeded_repository().await;
        let filter = InventoryFilter { color: "white".to_string(), ..InventoryFilter::default() };
        let vehicles = repo.search(&filter).await.expect("search");
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].stock_number, "A101");
    }

    #[tokio::test]
    async fn stock_number_requires_exact_match() {
        let repo = seeded_repository().await;

        let exact =
            InventoryFilter { stock_number: "A100".to_string(), ..InventoryFilter::default() };
        assert_eq!(repo.search(&exact).await.expect("search").len(), 1);

        let partial =
            InventoryFilter { stock_number: "A10".to_string(), ..InventoryFilter::default() };
        assert!(repo.search(&partial).await.expect("search").is_empty());
    }

    #[tokio::test]
    async fn numeric_bounds_are_inclusive_and_sentinels_are_ignored() {
        let repo = seeded_repository().await;

        let filter = InventoryFilter {
            year_min: 2020,
            price_max: 24_900.0,
            ..InventoryFilter::default()
        };
        let vehicles = repo.search(&filter).await.expect("search");
        let stock: Vec<&str> = vehicles.iter().map(|v| v.stock_number.as_str()).collect();
        assert_eq!(stock, ["A101", "C400", "R200"]);
    }

    #[tokio::test]
    async fn mileage_filter_is_an_upper_bound() {
        let repo = seeded_repository().await;
        let filter = InventoryFilter { mileage_max: 26_000, ..InventoryFilter::default() };
        let vehicles = repo.search(&filter).await.expect("search");
        let stock: Vec<&str> = vehicles.iter().map(|v| v.stock_number.as_str()).collect();
        assert_eq!(stock, ["A101", "F300"]);
    }

    #[tokio::test]
    async fn combined_filters_intersect() {
        let repo = seeded_repository().await;
        let filter = InventoryFilter {
            make: "Nissan".to_string(),
            model: "Altima".to_string(),
            year_min: 2020,
            ..InventoryFilter::default()
        };
        let vehicles = repo.search(&filter).await.expect("search");
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].stock_number, "A101");
    }
}
