use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::Row;

use dealerdesk_core::domain::summary::{ConversationSummary, SummaryInsights};

use super::{RepositoryError, SummaryRepository};
use crate::DbPool;

pub struct SqlSummaryRepository {
    pool: DbPool,
}

impl SqlSummaryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SummaryRepository for SqlSummaryRepository {
    async fn save(&self, summary: &ConversationSummary) -> Result<(), RepositoryError> {
        let keywords_json = serde_json::to_string(&summary.keywords)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let created_at = summary.created_at.unwrap_or_else(Utc::now);

        sqlx::query(
            "INSERT INTO conversation_summaries \
             (conversation_id, sentiment, keywords_json, summary, department, \
              urgency, upsell_opportunity, customer_interest, notes, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&summary.conversation_id)
        .bind(enum_to_str(&summary.sentiment)?)
        .bind(keywords_json)
        .bind(&summary.summary_text)
        .bind(enum_to_str(&summary.department)?)
        .bind(enum_to_str(&summary.insights.urgency)?)
        .bind(summary.insights.upsell_opportunity)
        .bind(enum_to_str(&summary.insights.customer_interest)?)
        .bind(&summary.insights.notes)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_conversation_id(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationSummary>, RepositoryError> {
        let row = sqlx::query(
            "SELECT conversation_id, sentiment, keywords_json, summary, department, \
             urgency, upsell_opportunity, customer_interest, notes, created_at \
             FROM conversation_summaries \
             WHERE conversation_id = ?1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(summary_from_row).transpose()
    }
}

fn summary_from_row(row: sqlx::sqlite::SqliteRow) -> Result<ConversationSummary, RepositoryError> {
    let keywords_json: String = row.try_get("keywords_json")?;
    let keywords: Vec<String> = serde_json::from_str(&keywords_json)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(ConversationSummary {
        conversation_id: row.try_get("conversation_id")?,
        sentiment: enum_from_str(row.try_get("sentiment")?)?,
        keywords,
        summary_text: row.try_get("summary")?,
        department: enum_from_str(row.try_get("department")?)?,
        insights: SummaryInsights {
            urgency: enum_from_str(row.try_get("urgency")?)?,
            upsell_opportunity: row.try_get("upsell_opportunity")?,
            customer_interest: enum_from_str(row.try_get("customer_interest")?)?,
            notes: row.try_get("notes")?,
        },
        created_at: Some(created_at),
    })
}

/// Columns hold the same string forms the JSON wire format uses, so the
/// serde representation is the single source of truth for enum spelling.
fn enum_to_str<T: Serialize>(value: &T) -> Result<String, RepositoryError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(text)) => Ok(text),
        Ok(other) => Err(RepositoryError::Decode(format!("expected string form, got {other}"))),
        Err(error) => Err(RepositoryError::Decode(error.to_string())),
    }
}

fn enum_from_str<T: DeserializeOwned>(text: String) -> Result<T, RepositoryError> {
    serde_json::from_value(serde_json::Value::String(text))
        .map_err(|error| RepositoryError::Decode(error.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use dealerdesk_core::domain::summary::{
        ConversationSummary, Department, Level, Sentiment, SummaryInsights,
    };

    use super::*;
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlSummaryRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        SqlSummaryRepository::new(pool)
    }

    fn sample(conversation_id: &str, summary_text: &str) -> ConversationSummary {
        ConversationSummary {
            conversation_id: conversation_id.to_string(),
            sentiment: Sentiment::Positive,
            keywords: vec!["altima".to_string(), "test drive".to_string()],
            summary_text: summary_text.to_string(),
            department: Department::Sales,
            insights: SummaryInsights {
                urgency: Level::Medium,
                upsell_opportunity: true,
                customer_interest: Level::High,
                notes: "Wants financing details".to_string(),
            },
            created_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn save_and_find_preserves_fields() {
        let repo = repository().await;
        repo.save(&sample("conv-1", "Customer asked about Altima trims."))
            .await
            .expect("save summary");

        let found = repo
            .find_by_conversation_id("conv-1")
            .await
            .expect("find summary")
            .expect("summary present");

        assert_eq!(found.conversation_id, "conv-1");
        assert_eq!(found.sentiment, Sentiment::Positive);
        assert_eq!(found.keywords, ["altima", "test drive"]);
        assert_eq!(found.department, Department::Sales);
        assert!(found.insights.upsell_opportunity);
        assert_eq!(found.insights.notes, "Wants financing details");
    }

    #[tokio::test]
    async fn unknown_conversation_yields_none() {
        let repo = repository().await;
        let found = repo.find_by_conversation_id("missing").await.expect("find");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn lookup_returns_the_most_recent_summary() {
        let repo = repository().await;

        let mut earlier = sample("conv-2", "First pass.");
        earlier.created_at = Some(Utc::now() - Duration::minutes(10));
        repo.save(&earlier).await.expect("save earlier");

        let later = sample("conv-2", "Second pass.");
        repo.save(&later).await.expect("save later");

        let found = repo
            .find_by_conversation_id("conv-2")
            .await
            .expect("find summary")
            .expect("summary present");
        assert_eq!(found.summary_text, "Second pass.");
    }
}
