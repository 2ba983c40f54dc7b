use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// Follow-up routing target for a finished conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Department {
    Sales,
    Service,
    Management,
    #[serde(rename = "HR")]
    Hr,
    Finance,
    Parts,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Medium,
    Low,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryInsights {
    pub urgency: Level,
    pub upsell_opportunity: bool,
    pub customer_interest: Level,
    #[serde(default, alias = "additional_notes")]
    pub notes: String,
}

/// Model-generated analysis of one finished conversation, persisted once per
/// detected conversation end and retrieved by `conversation_id`.
///
/// `conversation_id` and `created_at` are attached by the backend after the
/// structured-output response parses, so both tolerate being absent in the
/// raw model JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(default)]
    pub conversation_id: String,
    pub sentiment: Sentiment,
    pub keywords: Vec<String>,
    #[serde(rename = "summary")]
    pub summary_text: String,
    pub department: Department,
    pub insights: SummaryInsights,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ConversationSummary {
    /// Well-formed stand-in returned when summary generation fails for any
    /// reason. The orchestration layer must never crash on summarization, so
    /// the failure text travels inside `insights.notes` instead of an error.
    pub fn fallback(conversation_id: impl Into<String>, failure: impl std::fmt::Display) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sentiment: Sentiment::Neutral,
            keywords: vec!["error".to_string()],
            summary_text: "Error generating summary. Please try again.".to_string(),
            department: Department::Sales,
            insights: SummaryInsights {
                urgency: Level::Low,
                upsell_opportunity: false,
                customer_interest: Level::Low,
                notes: format!("Error: {failure}"),
            },
            created_at: Some(Utc::now()),
        }
    }
}
