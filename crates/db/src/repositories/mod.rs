use async_trait::async_trait;
use thiserror::Error;

use dealerdesk_core::domain::analytics::AnalyticsRecord;
use dealerdesk_core::domain::inventory::{InventoryFilter, Vehicle};
use dealerdesk_core::domain::summary::ConversationSummary;

pub mod analytics;
pub mod inventory;
pub mod memory;
pub mod summary;

pub use analytics::SqlAnalyticsRepository;
pub use inventory::SqlInventoryRepository;
pub use memory::{
    InMemoryAnalyticsRepository, InMemoryInventoryRepository, InMemorySummaryRepository,
};
pub use summary::SqlSummaryRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Matching vehicles for a tool-supplied filter. An unfiltered filter
    /// returns the whole inventory.
    async fn search(&self, filter: &InventoryFilter) -> Result<Vec<Vehicle>, RepositoryError>;
}

#[async_trait]
pub trait SummaryRepository: Send + Sync {
    async fn save(&self, summary: &ConversationSummary) -> Result<(), RepositoryError>;

    /// Most recent summary stored for a conversation, if any.
    async fn find_by_conversation_id(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationSummary>, RepositoryError>;
}

#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn record(&self, record: &AnalyticsRecord) -> Result<(), RepositoryError>;

    async fn list_all(&self) -> Result<Vec<AnalyticsRecord>, RepositoryError>;

    /// Deletes every analytics row, returning how many were removed.
    async fn reset(&self) -> Result<u64, RepositoryError>;
}
