use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use dealerdesk_core::domain::analytics::{AnalyticsRecord, ModelPricing, TokenUsage};
use dealerdesk_core::domain::message::Message;
use dealerdesk_core::domain::summary::ConversationSummary;
use dealerdesk_db::repositories::{AnalyticsRepository, SummaryRepository};

use crate::llm::ChatClient;

/// Instructions for the analyst pass that turns a finished conversation into
/// a structured summary. Must stay in lockstep with `ConversationSummary`'s
/// wire shape.
const ANALYST_PROMPT: &str = "You are a conversation analyst for a car dealership. \
You will receive the transcript of a finished chat between a customer and the dealership's \
support assistant. Respond with a single JSON object and nothing else, using exactly these keys:\n\
{\n\
  \"sentiment\": \"positive\" | \"neutral\" | \"negative\",\n\
  \"keywords\": [up to 8 short lowercase phrases],\n\
  \"summary\": \"2-3 sentence recap of what the customer wanted and what happened\",\n\
  \"department\": \"Sales\" | \"Service\" | \"Management\" | \"HR\" | \"Finance\" | \"Parts\",\n\
  \"insights\": {\n\
    \"urgency\": \"high\" | \"medium\" | \"low\",\n\
    \"upsell_opportunity\": true | false,\n\
    \"customer_interest\": \"high\" | \"medium\" | \"low\",\n\
    \"additional_notes\": \"anything a follow-up agent should know\"\n\
  }\n\
}\n\
Choose the department a human should route the follow-up to. Base every field only on the transcript.";

/// Generates, records, and persists end-of-conversation summaries.
///
/// Summarization is best-effort by contract: every failure mode degrades to
/// [`ConversationSummary::fallback`] so the chat response itself never fails
/// because analysis did.
pub struct SummaryGenerator {
    client: Arc<dyn ChatClient>,
    summaries: Arc<dyn SummaryRepository>,
    analytics: Arc<dyn AnalyticsRepository>,
    pricing: ModelPricing,
}

impl SummaryGenerator {
    pub fn new(
        client: Arc<dyn ChatClient>,
        summaries: Arc<dyn SummaryRepository>,
        analytics: Arc<dyn AnalyticsRepository>,
        pricing: ModelPricing,
    ) -> Self {
        Self { client, summaries, analytics, pricing }
    }

    pub async fn summarize(
        &self,
        transcript: &[Message],
        conversation_id: Option<&str>,
    ) -> ConversationSummary {
        let conversation_id = conversation_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let dialogue = render_dialogue(transcript);
        if dialogue.is_empty() {
            warn!(event_name = "summary_empty_transcript", conversation_id = %conversation_id);
            return self
                .finalize(ConversationSummary::fallback(
                    conversation_id,
                    "transcript has no dialogue to summarize",
                ))
                .await;
        }

        let request = vec![
            Message::system(ANALYST_PROMPT),
            Message::user(format!("Conversation transcript:\n{dialogue}")),
        ];

        let completion = match self.client.complete_json(&request).await {
            Ok(completion) => completion,
            Err(error) => {
                warn!(event_name = "summary_completion_failed", error = %error);
                return self.finalize(ConversationSummary::fallback(conversation_id, error)).await;
            }
        };

        record_usage(self.analytics.as_ref(), self.client.model(), &self.pricing, completion.usage)
            .await;

        let content = completion.message.content().unwrap_or_default();
        let summary = match serde_json::from_str::<ConversationSummary>(content) {
            Ok(mut parsed) => {
                parsed.conversation_id = conversation_id;
                info!(
                    event_name = "summary_generated",
                    conversation_id = %parsed.conversation_id,
                    department = ?parsed.department,
                );
                parsed
            }
            Err(error) => {
                warn!(event_name = "summary_parse_failed", error = %error);
                ConversationSummary::fallback(conversation_id, error)
            }
        };

        self.finalize(summary).await
    }

    /// Stamp, persist, and return. A storage failure is logged and swallowed;
    /// the caller still gets the summary it asked for.
    async fn finalize(&self, mut summary: ConversationSummary) -> ConversationSummary {
        if summary.created_at.is_none() {
            summary.created_at = Some(Utc::now());
        }
        if let Err(error) = self.summaries.save(&summary).await {
            warn!(
                event_name = "summary_persist_failed",
                conversation_id = %summary.conversation_id,
                error = %error,
            );
        }
        summary
    }
}

/// Customer and assistant dialogue only. System context, tool requests, and
/// tool payloads would skew the analysis and waste tokens.
fn render_dialogue(transcript: &[Message]) -> String {
    let mut lines = Vec::new();
    for message in transcript {
        match message {
            Message::User { content } => lines.push(format!("Customer: {content}")),
            Message::Assistant { content: Some(content), tool_calls } if tool_calls.is_empty() => {
                lines.push(format!("Assistant: {content}"));
            }
            _ => {}
        }
    }
    lines.join("\n")
}

pub(crate) async fn record_usage(
    analytics: &dyn AnalyticsRepository,
    model: &str,
    pricing: &ModelPricing,
    usage: TokenUsage,
) {
    let record = AnalyticsRecord::from_usage(model, usage, pricing.cost_for(&usage));
    if let Err(error) = analytics.record(&record).await {
        warn!(event_name = "analytics_record_failed", model, error = %error);
    }
}

#[cfg(test)]
mod tests {
    use dealerdesk_core::domain::summary::{Department, Sentiment};
    use dealerdesk_db::repositories::{InMemoryAnalyticsRepository, InMemorySummaryRepository};

    use super::*;
    use crate::llm::LlmError;
    use crate::testing::{usage, ScriptedChatClient};

    struct Fixture {
        client: Arc<ScriptedChatClient>,
        summaries: Arc<InMemorySummaryRepository>,
        analytics: Arc<InMemoryAnalyticsRepository>,
        generator: SummaryGenerator,
    }

    fn fixture() -> Fixture {
        let client = Arc::new(ScriptedChatClient::new("o3-mini"));
        let summaries = Arc::new(InMemorySummaryRepository::new());
        let analytics = Arc::new(InMemoryAnalyticsRepository::new());
        let generator = SummaryGenerator::new(
            client.clone(),
            summaries.clone(),
            analytics.clone(),
            ModelPricing::default(),
        );
        Fixture { client, summaries, analytics, generator }
    }

    fn transcript() -> Vec<Message> {
        vec![
            Message::system("persona"),
            Message::user("Do you have a 2021 Altima?"),
            Message::assistant("We do! Would you like to schedule a test drive?"),
            Message::user("No thanks, goodbye"),
            Message::assistant("Thank you for chatting with us. Have a great day!"),
        ]
    }

    #[tokio::test]
    async fn parses_and_persists_a_structured_summary() {
        let fx = fixture();
        fx.client.push_reply(
            r#"{
                "sentiment": "positive",
                "keywords": ["altima", "test drive"],
                "summary": "Customer asked about a 2021 Altima.",
                "department": "Sales",
                "insights": {
                    "urgency": "low",
                    "upsell_opportunity": true,
                    "customer_interest": "high",
                    "additional_notes": "follow up next week"
                }
            }"#,
            usage(800, 120),
        );

        let summary = fx.generator.summarize(&transcript(), Some("conv-9")).await;

        assert_eq!(summary.conversation_id, "conv-9");
        assert_eq!(summary.sentiment, Sentiment::Positive);
        assert_eq!(summary.department, Department::Sales);
        assert!(summary.created_at.is_some());

        let saved = fx.summaries.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].conversation_id, "conv-9");

        let rows = fx.analytics.list_all().await.expect("list analytics");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_tokens, 920);
    }

    #[tokio::test]
    async fn analyst_request_excludes_tool_traffic() {
        let fx = fixture();
        fx.client.push_error(LlmError::Parse("unused".to_string()));

        let mut messages = transcript();
        messages.insert(
            3,
            Message::Assistant {
                content: None,
                tool_calls: vec![dealerdesk_core::domain::message::ToolCall::function(
                    "c1",
                    "fetch_cars",
                    "{}",
                )],
            },
        );
        messages.insert(4, Message::tool("c1", r#"{"count":0,"cars":[]}"#));

        fx.generator.summarize(&messages, None).await;

        let requests = fx.client.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].json_mode);
        let body = requests[0].messages[1].content().expect("user content");
        assert!(!body.contains("fetch_cars"));
        assert!(body.contains("Customer: Do you have a 2021 Altima?"));
    }

    #[tokio::test]
    async fn completion_failure_degrades_to_the_fallback_summary() {
        let fx = fixture();
        fx.client.push_error(LlmError::Status { status: 500, body: "overloaded".to_string() });

        let summary = fx.generator.summarize(&transcript(), None).await;

        assert_eq!(summary.sentiment, Sentiment::Neutral);
        assert_eq!(summary.keywords, ["error"]);
        assert!(summary.insights.notes.contains("overloaded"));
        assert!(!summary.conversation_id.is_empty());
        assert_eq!(fx.summaries.saved().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_model_output_degrades_to_the_fallback_summary() {
        let fx = fixture();
        fx.client.push_reply("this is not json", usage(100, 10));

        let summary = fx.generator.summarize(&transcript(), Some("conv-3")).await;

        assert_eq!(summary.conversation_id, "conv-3");
        assert_eq!(summary.summary_text, "Error generating summary. Please try again.");

        // Usage is still recorded; the completion itself succeeded.
        let rows = fx.analytics.list_all().await.expect("list analytics");
        assert_eq!(rows.len(), 1);
    }
}
