use std::sync::Mutex;

use chrono::Utc;

use dealerdesk_core::domain::analytics::AnalyticsRecord;
use dealerdesk_core::domain::inventory::{InventoryFilter, Vehicle};
use dealerdesk_core::domain::summary::ConversationSummary;

use super::{AnalyticsRepository, InventoryRepository, RepositoryError, SummaryRepository};

/// In-memory fakes mirroring the SQL repositories' observable semantics.
/// Used by orchestration and handler tests that do not need a database.
#[derive(Default)]
pub struct InMemoryInventoryRepository {
    vehicles: Mutex<Vec<Vehicle>>,
}

impl InMemoryInventoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vehicles(vehicles: Vec<Vehicle>) -> Self {
        Self { vehicles: Mutex::new(vehicles) }
    }

    pub fn insert(&self, vehicle: Vehicle) {
        if let Ok(mut vehicles) = self.vehicles.lock() {
            vehicles.push(vehicle);
        }
    }
}

fn substring_match(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn matches_filter(vehicle: &Vehicle, filter: &InventoryFilter) -> bool {
    substring_match(&vehicle.make, &filter.make)
        && substring_match(&vehicle.model, &filter.model)
        && substring_match(&vehicle.color, &filter.color)
        && (filter.stock_number.is_empty() || vehicle.stock_number == filter.stock_number)
        && (filter.vin.is_empty() || vehicle.vin == filter.vin)
        && (!filter.has_year_min() || vehicle.year >= filter.year_min)
        && (!filter.has_year_max() || vehicle.year <= filter.year_max)
        && (!filter.has_price_min() || vehicle.price >= filter.price_min)
        && (!filter.has_price_max() || vehicle.price <= filter.price_max)
        && (!filter.has_mileage_max() || vehicle.mileage <= filter.mileage_max)
}

#[async_trait::async_trait]
impl InventoryRepository for InMemoryInventoryRepository {
    async fn search(&self, filter: &InventoryFilter) -> Result<Vec<Vehicle>, RepositoryError> {
        let vehicles = self
            .vehicles
            .lock()
            .map_err(|_| RepositoryError::Decode("inventory lock poisoned".to_string()))?;

        let mut matched: Vec<Vehicle> =
            vehicles.iter().filter(|v| matches_filter(v, filter)).cloned().collect();
        matched.sort_by(|a, b| a.stock_number.cmp(&b.stock_number));
        Ok(matched)
    }
}

#[derive(Default)]
pub struct InMemorySummaryRepository {
    summaries: Mutex<Vec<ConversationSummary>>,
}

impl InMemorySummaryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<ConversationSummary> {
        self.summaries.lock().map(|summaries| summaries.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl SummaryRepository for InMemorySummaryRepository {
    async fn save(&self, summary: &ConversationSummary) -> Result<(), RepositoryError> {
        let mut summaries = self
            .summaries
            .lock()
            .map_err(|_| RepositoryError::Decode("summary lock poisoned".to_string()))?;

        let mut stored = summary.clone();
        if stored.created_at.is_none() {
            stored.created_at = Some(Utc::now());
        }
        summaries.push(stored);
        Ok(())
    }

    async fn find_by_conversation_id(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationSummary>, RepositoryError> {
        let summaries = self
            .summaries
            .lock()
            .map_err(|_| RepositoryError::Decode("summary lock poisoned".to_string()))?;

        Ok(summaries
            .iter()
            .filter(|s| s.conversation_id == conversation_id)
            .max_by_key(|s| s.created_at)
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryAnalyticsRepository {
    records: Mutex<Vec<AnalyticsRecord>>,
}

impl InMemoryAnalyticsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AnalyticsRepository for InMemoryAnalyticsRepository {
    async fn record(&self, record: &AnalyticsRecord) -> Result<(), RepositoryError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| RepositoryError::Decode("analytics lock poisoned".to_string()))?;
        records.push(record.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<AnalyticsRecord>, RepositoryError> {
        let records = self
            .records
            .lock()
            .map_err(|_| RepositoryError::Decode("analytics lock poisoned".to_string()))?;
        let mut sorted = records.clone();
        sorted.sort_by_key(|r| r.date);
        Ok(sorted)
    }

    async fn reset(&self) -> Result<u64, RepositoryError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| RepositoryError::Decode("analytics lock poisoned".to_string()))?;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }
}
