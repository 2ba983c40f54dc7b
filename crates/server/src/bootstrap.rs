use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use dealerdesk_agent::{
    ConversationEngine, FetchCarsTool, FindCarReviewVideosTool, LlmError, OpenAiChatClient,
    ReviewVideoSearch, SummaryGenerator, ToolRegistry,
};
use dealerdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use dealerdesk_core::detector::ClosingPhraseDetector;
use dealerdesk_core::domain::analytics::ModelPricing;
use dealerdesk_db::repositories::{
    InventoryRepository, SqlAnalyticsRepository, SqlInventoryRepository, SqlSummaryRepository,
};
use dealerdesk_db::{connect, migrations, DbPool, DemoInventory};

use crate::analytics::AnalyticsState;
use crate::chat::ChatState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub chat_state: ChatState,
    pub analytics_state: AnalyticsState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("fixture load failed: {0}")]
    Fixtures(#[source] dealerdesk_db::repositories::RepositoryError),
    #[error("completion client setup failed: {0}")]
    LlmClient(#[source] LlmError),
    #[error("video search client setup failed: {0}")]
    VideoClient(#[source] reqwest::Error),
    #[error("llm.api_key is not configured")]
    MissingLlmKey,
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let inventory: Arc<dyn InventoryRepository> =
        Arc::new(SqlInventoryRepository::new(db_pool.clone()));
    let summaries = Arc::new(SqlSummaryRepository::new(db_pool.clone()));
    let analytics = Arc::new(SqlAnalyticsRepository::new(db_pool.clone()));

    seed_if_empty(&db_pool).await?;

    // Validation already requires the key; the Option is unwrapped here so
    // the client type never has to model a keyless state.
    let api_key = config.llm.api_key.clone().ok_or(BootstrapError::MissingLlmKey)?;
    let client = Arc::new(
        OpenAiChatClient::new(
            api_key,
            config.llm.base_url.clone(),
            config.llm.model.clone(),
            Duration::from_secs(config.llm.timeout_secs),
        )
        .map_err(BootstrapError::LlmClient)?,
    );

    let videos = Arc::new(
        ReviewVideoSearch::new(
            config.youtube.api_key.clone(),
            Duration::from_secs(config.youtube.timeout_secs),
        )
        .map_err(BootstrapError::VideoClient)?,
    );

    let pricing = ModelPricing::default();
    let mut registry = ToolRegistry::default();
    registry.register(FetchCarsTool::new(inventory.clone()));
    registry.register(FindCarReviewVideosTool::new(videos.clone()));

    let summarizer = Arc::new(SummaryGenerator::new(
        client.clone(),
        summaries.clone(),
        analytics.clone(),
        pricing,
    ));
    let engine = Arc::new(ConversationEngine::new(
        client.clone(),
        registry,
        Arc::new(ClosingPhraseDetector),
        SummaryGenerator::new(client.clone(), summaries.clone(), analytics.clone(), pricing),
        analytics.clone(),
        pricing,
    ));

    let chat_state = ChatState::new(engine, summarizer, summaries, videos, inventory);
    let analytics_state = AnalyticsState::new(analytics, pricing, config.llm.model.clone());

    info!(event_name = "system.bootstrap.complete", "application bootstrap complete");
    Ok(Application { config, db_pool, chat_state, analytics_state })
}

/// Development convenience: a fresh database gets the demo showroom so the
/// assistant has something to sell.
async fn seed_if_empty(pool: &DbPool) -> Result<(), BootstrapError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM car_inventory")
        .fetch_one(pool)
        .await
        .map_err(BootstrapError::DatabaseConnect)?;
    if count == 0 {
        let loaded = DemoInventory::load(pool).await.map_err(BootstrapError::Fixtures)?;
        info!(event_name = "system.bootstrap.inventory_seeded", vehicles = loaded);
    }
    Ok(())
}
