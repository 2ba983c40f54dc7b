use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use tracing::{info, warn};

use dealerdesk_core::detector::EndOfConversationDetector;
use dealerdesk_core::domain::analytics::ModelPricing;
use dealerdesk_core::domain::message::Message;
use dealerdesk_core::domain::summary::ConversationSummary;
use dealerdesk_core::errors::ChatApiError;
use dealerdesk_db::repositories::AnalyticsRepository;

use crate::llm::ChatClient;
use crate::summary::{record_usage, SummaryGenerator};
use crate::tools::{ToolError, ToolRegistry};

/// Sentinel the frontend shows while tool results are being resolved.
pub const PROCESSING_PLACEHOLDER: &str = "Processing your request...";

const PERSONA_MARKER: &str = "You are Harper";
const TIME_MARKER: &str = "Current time:";

const PERSONA_PROMPT: &str = "You are Harper, the friendly customer support assistant for a car \
dealership. Help customers browse inventory, answer questions about specific vehicles, and point \
them at review videos when they want a second opinion.\n\
\n\
Guidelines:\n\
- Use the fetch_cars tool whenever the customer asks about available vehicles, prices, mileage, \
colors, or a specific stock number or VIN. Never invent inventory.\n\
- Use the find_car_review_videos tool when the customer wants reviews or videos of a vehicle.\n\
- Keep answers short, warm, and concrete. Mention price, year, mileage, and color when you \
describe a vehicle.\n\
- For trade-ins, financing, or service appointments, collect the customer's details and let them \
know the right team will follow up.\n\
- When the customer is done, close politely. End with a phrase like \"Thank you for chatting\" or \
\"Have a great day\" so the conversation can be wrapped up.";

/// One orchestrated turn of the conversation.
#[derive(Clone, Debug)]
pub struct ChatTurn {
    pub reply: String,
    /// Full transcript after this turn, ready to be sent back verbatim.
    pub transcript: Vec<Message>,
    /// True when the transcript ends with a pending tool-call message and
    /// the reply is [`PROCESSING_PLACEHOLDER`]; the caller must resubmit
    /// the transcript to obtain the real answer.
    pub tool_call_detected: bool,
    /// Present only when this turn ended the conversation.
    pub summary: Option<ConversationSummary>,
}

/// Drives the two-round tool-call protocol over a stateless transcript.
///
/// The backend keeps no conversation state; the caller sends the transcript
/// with every request and receives the extended transcript back.
pub struct ConversationEngine {
    client: Arc<dyn ChatClient>,
    registry: ToolRegistry,
    detector: Arc<dyn EndOfConversationDetector>,
    summarizer: SummaryGenerator,
    analytics: Arc<dyn AnalyticsRepository>,
    pricing: ModelPricing,
}

impl ConversationEngine {
    pub fn new(
        client: Arc<dyn ChatClient>,
        registry: ToolRegistry,
        detector: Arc<dyn EndOfConversationDetector>,
        summarizer: SummaryGenerator,
        analytics: Arc<dyn AnalyticsRepository>,
        pricing: ModelPricing,
    ) -> Self {
        Self { client, registry, detector, summarizer, analytics, pricing }
    }

    /// Idempotently installs the persona and timestamp system messages. The
    /// transcript is append-only, so once both markers are present a resent
    /// transcript passes through untouched.
    pub fn ensure_system_context(transcript: &mut Vec<Message>, now: DateTime<Utc>) {
        let has_persona = transcript.iter().any(|message| {
            message.is_system()
                && message.content().is_some_and(|content| content.starts_with(PERSONA_MARKER))
        });
        if !has_persona {
            transcript.insert(0, Message::system(PERSONA_PROMPT));
        }

        let has_time = transcript.iter().any(|message| {
            message.is_system()
                && message.content().is_some_and(|content| content.starts_with(TIME_MARKER))
        });
        if !has_time {
            transcript.insert(1, Message::system(format!("{TIME_MARKER} {}", showroom_time(now))));
        }
    }

    /// One customer message in, one turn out. When the model calls tools,
    /// the turn comes back with the placeholder reply and the pending calls
    /// still attached; the caller resubmits the transcript to
    /// [`Self::resume_with_tool_results`] to obtain the real answer.
    pub async fn chat(
        &self,
        mut transcript: Vec<Message>,
        user_message: &str,
    ) -> Result<ChatTurn, ChatApiError> {
        let trimmed = user_message.trim();
        if trimmed.is_empty() {
            return Err(ChatApiError::Validation("message must not be empty".to_string()));
        }

        Self::ensure_system_context(&mut transcript, Utc::now());
        transcript.push(Message::user(trimmed));

        let definitions = self.registry.definitions();
        let completion = self
            .client
            .complete(&transcript, &definitions)
            .await
            .map_err(|error| ChatApiError::Upstream(error.to_string()))?;
        record_usage(self.analytics.as_ref(), self.client.model(), &self.pricing, completion.usage)
            .await;

        let assistant = completion.message;
        let tool_calls = assistant.tool_calls().to_vec();

        if !tool_calls.is_empty() {
            // Tools run in the second round; this round only records what
            // the model asked for.
            transcript.push(Message::assistant_with_tool_calls(PROCESSING_PLACEHOLDER, tool_calls));
            info!(event_name = "tool_calls_detected", turns = transcript.len());

            return Ok(ChatTurn {
                reply: PROCESSING_PLACEHOLDER.to_string(),
                transcript,
                tool_call_detected: true,
                summary: None,
            });
        }

        transcript.push(assistant.clone());
        let reply = assistant.content().unwrap_or_default().to_string();
        let summary = self.maybe_summarize(&transcript).await;
        Ok(ChatTurn { reply, transcript, tool_call_detected: false, summary })
    }

    /// Second round of the protocol: the transcript must end with the
    /// pending assistant tool-call message. Executes each call in order,
    /// appends the results, then runs the final completion without tool
    /// schemas so the model has to answer in prose.
    pub async fn resume_with_tool_results(
        &self,
        mut transcript: Vec<Message>,
    ) -> Result<ChatTurn, ChatApiError> {
        let pending = transcript.last().map(|message| message.tool_calls().to_vec());
        let Some(pending) = pending.filter(|calls| !calls.is_empty()) else {
            return Err(ChatApiError::Validation(
                "transcript does not end with a pending tool-call assistant message".to_string(),
            ));
        };

        for call in &pending {
            let output = self
                .registry
                .dispatch(&call.function.name, &call.function.arguments)
                .await
                .map_err(tool_error_to_api)?;
            transcript.push(Message::tool(call.id.clone(), output.to_string()));
        }
        info!(event_name = "tool_calls_executed", count = pending.len());

        let completion = self
            .client
            .complete(&transcript, &[])
            .await
            .map_err(|error| ChatApiError::Upstream(error.to_string()))?;
        record_usage(self.analytics.as_ref(), self.client.model(), &self.pricing, completion.usage)
            .await;

        let reply = completion.message.content().unwrap_or_default().to_string();
        transcript.push(completion.message);

        let summary = self.maybe_summarize(&transcript).await;
        Ok(ChatTurn { reply, transcript, tool_call_detected: false, summary })
    }

    async fn maybe_summarize(&self, transcript: &[Message]) -> Option<ConversationSummary> {
        if !self.detector.detect(transcript) {
            return None;
        }
        info!(event_name = "conversation_end_detected", turns = transcript.len());
        Some(self.summarizer.summarize(transcript, None).await)
    }
}

fn tool_error_to_api(error: ToolError) -> ChatApiError {
    match error {
        ToolError::UnknownTool(name) => ChatApiError::UnknownTool(name),
        ToolError::InvalidArguments { message, .. } => ChatApiError::InvalidToolArguments(message),
        ToolError::Execution { tool, message } => {
            warn!(event_name = "tool_execution_failed", tool = %tool, error = %message);
            ChatApiError::Storage(format!("tool `{tool}` failed: {message}"))
        }
    }
}

/// Showroom wall-clock time. The dealership advertises Eastern hours, so the
/// timestamp uses a fixed EST offset rather than the server's locale.
fn showroom_time(now: DateTime<Utc>) -> String {
    match FixedOffset::west_opt(5 * 3600) {
        Some(eastern) => now.with_timezone(&eastern).format("%Y-%m-%d %I:%M %p EST").to_string(),
        None => now.format("%Y-%m-%d %I:%M %p UTC").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use dealerdesk_core::detector::ClosingPhraseDetector;
    use dealerdesk_core::domain::inventory::Vehicle;
    use dealerdesk_db::repositories::{
        InMemoryAnalyticsRepository, InMemoryInventoryRepository, InMemorySummaryRepository,
    };

    use super::*;
    use crate::testing::{usage, ScriptedChatClient};
    use crate::tools::FetchCarsTool;

    struct Fixture {
        client: Arc<ScriptedChatClient>,
        analytics: Arc<InMemoryAnalyticsRepository>,
        summaries: Arc<InMemorySummaryRepository>,
        engine: ConversationEngine,
    }

    fn fixture() -> Fixture {
        let client = Arc::new(ScriptedChatClient::new("o3-mini"));
        let analytics = Arc::new(InMemoryAnalyticsRepository::new());
        let summaries = Arc::new(InMemorySummaryRepository::new());

        let inventory = Arc::new(InMemoryInventoryRepository::with_vehicles(vec![Vehicle {
            stock_number: "N1002".to_string(),
            vin: "1N4BL4CV2LC118002".to_string(),
            make: "Nissan".to_string(),
            model: "Altima".to_string(),
            year: 2021,
            price: 24_900.0,
            mileage: 15_480,
            color: "Pearl White".to_string(),
            description: "Certified 2021 Altima SR.".to_string(),
            created_at: None,
        }]));
        let mut registry = ToolRegistry::default();
        registry.register(FetchCarsTool::new(inventory));

        let summarizer = SummaryGenerator::new(
            client.clone(),
            summaries.clone(),
            analytics.clone(),
            ModelPricing::default(),
        );
        let engine = ConversationEngine::new(
            client.clone(),
            registry,
            Arc::new(ClosingPhraseDetector),
            summarizer,
            analytics.clone(),
            ModelPricing::default(),
        );

        Fixture { client, analytics, summaries, engine }
    }

    #[tokio::test]
    async fn plain_turn_returns_the_assistant_reply() {
        let fx = fixture();
        fx.client.push_reply("We have one 2021 Altima in Pearl White.", usage(500, 40));

        let turn = fx.engine.chat(Vec::new(), "Any Altimas?").await.expect("chat");

        assert_eq!(turn.reply, "We have one 2021 Altima in Pearl White.");
        assert!(!turn.tool_call_detected);
        assert!(turn.summary.is_none());

        // persona + time + user + assistant
        assert_eq!(turn.transcript.len(), 4);
        assert!(turn.transcript[0].content().is_some_and(|c| c.starts_with("You are Harper")));
        assert!(turn.transcript[1].content().is_some_and(|c| c.starts_with("Current time:")));
    }

    #[tokio::test]
    async fn system_context_insertion_is_idempotent() {
        let fx = fixture();
        fx.client.push_reply("First answer", usage(10, 5));
        fx.client.push_reply("Second answer", usage(10, 5));

        let first = fx.engine.chat(Vec::new(), "hello").await.expect("first chat");
        let second = fx.engine.chat(first.transcript, "another question").await.expect("second");

        let system_count = second.transcript.iter().filter(|m| m.is_system()).count();
        assert_eq!(system_count, 2, "persona and one time header, never more");
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let fx = fixture();
        let error = fx.engine.chat(Vec::new(), "   ").await.expect_err("should fail");
        assert!(matches!(error, ChatApiError::Validation(_)));
    }

    #[tokio::test]
    async fn tool_round_returns_the_pending_call_without_executing() {
        let fx = fixture();
        fx.client.push_tool_call(
            "call_1",
            "fetch_cars",
            r#"{"make":"Nissan","model":"Altima"}"#,
            usage(600, 30),
        );

        let turn = fx.engine.chat(Vec::new(), "Do you have Altimas?").await.expect("chat");

        assert!(turn.tool_call_detected);
        assert_eq!(turn.reply, PROCESSING_PLACEHOLDER);

        // The transcript ends with the pending assistant message; nothing
        // has been dispatched yet.
        let last = turn.transcript.last().expect("assistant message");
        assert_eq!(last.tool_calls().len(), 1);
        assert_eq!(last.tool_calls()[0].id, "call_1");
        assert!(!turn.transcript.iter().any(|m| matches!(m, Message::Tool { .. })));
    }

    #[tokio::test]
    async fn resume_executes_tools_and_completes_without_definitions() {
        let fx = fixture();
        fx.client.push_tool_call(
            "call_1",
            "fetch_cars",
            r#"{"make":"Nissan","model":"Altima"}"#,
            usage(600, 30),
        );
        fx.client.push_reply("One match: the 2021 Altima SR at $24,900.", usage(700, 50));

        let first = fx.engine.chat(Vec::new(), "Do you have Altimas?").await.expect("chat");
        let turn = fx.engine.resume_with_tool_results(first.transcript).await.expect("resume");

        assert_eq!(turn.reply, "One match: the 2021 Altima SR at $24,900.");
        assert!(!turn.tool_call_detected);

        let tool_message = turn
            .transcript
            .iter()
            .find(|m| matches!(m, Message::Tool { .. }))
            .expect("tool result message");
        assert!(matches!(tool_message, Message::Tool { tool_call_id, .. } if tool_call_id == "call_1"));
        assert!(tool_message.content().is_some_and(|c| c.contains("N1002")));

        let requests = fx.client.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].tool_definitions > 0, "first round advertises tools");
        assert_eq!(requests[1].tool_definitions, 0, "final round must answer in prose");

        // Both completions produced analytics rows.
        assert_eq!(fx.analytics.list_all().await.expect("list").len(), 2);
    }

    #[tokio::test]
    async fn resume_without_pending_tool_results_is_rejected() {
        let fx = fixture();
        let transcript = vec![
            Message::system("persona"),
            Message::user("hello"),
            Message::assistant("hi there"),
        ];
        let error =
            fx.engine.resume_with_tool_results(transcript).await.expect_err("should fail");
        assert!(matches!(error, ChatApiError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_tool_from_the_model_is_a_client_error() {
        let fx = fixture();
        fx.client.push_tool_call("call_1", "schedule_rocket_launch", "{}", usage(100, 10));

        let first = fx.engine.chat(Vec::new(), "launch it").await.expect("first round");
        assert!(first.tool_call_detected);

        let error = fx
            .engine
            .resume_with_tool_results(first.transcript)
            .await
            .expect_err("dispatch should fail");
        assert!(matches!(error, ChatApiError::UnknownTool(name) if name == "schedule_rocket_launch"));
    }

    #[tokio::test]
    async fn closing_reply_triggers_summary_generation() {
        let fx = fixture();
        fx.client.push_reply("Happy to help!", usage(50, 10));
        fx.client.push_reply(
            "Thank you for chatting with us today. Have a great day!",
            usage(60, 12),
        );
        fx.client.push_reply(
            r#"{
                "sentiment": "positive",
                "keywords": ["altima"],
                "summary": "Customer asked about Altimas and left satisfied.",
                "department": "Sales",
                "insights": {
                    "urgency": "low",
                    "upsell_opportunity": false,
                    "customer_interest": "medium",
                    "additional_notes": ""
                }
            }"#,
            usage(300, 80),
        );

        let first = fx.engine.chat(Vec::new(), "Any Altimas?").await.expect("first");
        let second = fx.engine.chat(first.transcript, "thanks, bye").await.expect("second");

        let summary = second.summary.expect("summary should be generated");
        assert_eq!(summary.summary_text, "Customer asked about Altimas and left satisfied.");
        assert_eq!(fx.summaries.saved().len(), 1);
    }

    #[test]
    fn existing_time_header_is_left_untouched() {
        let first_now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 6, 1, 14, 0, 0)
            .single()
            .expect("valid time");
        let mut transcript = Vec::new();
        ConversationEngine::ensure_system_context(&mut transcript, first_now);
        let stamp = transcript[1].content().expect("time header").to_string();

        let later = chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 6, 2, 9, 30, 0)
            .single()
            .expect("valid time");
        ConversationEngine::ensure_system_context(&mut transcript, later);

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].content(), Some(stamp.as_str()));
    }

    #[test]
    fn showroom_time_is_eastern() {
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 6, 1, 18, 30, 0)
            .single()
            .expect("valid time");
        let stamp = showroom_time(now);
        assert_eq!(stamp, "2025-06-01 01:30 PM EST");
    }
}
