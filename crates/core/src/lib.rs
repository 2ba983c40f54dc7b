//! Core domain types for the DealerDesk chatbot backend.
//!
//! This crate holds everything the other crates agree on:
//! - the chat `Message` transcript model and `ToolCall` shapes exchanged
//!   with the completion API,
//! - persisted entities (`ConversationSummary`, `AnalyticsRecord`, vehicle
//!   inventory records and their filter),
//! - the end-of-conversation detection policy,
//! - configuration loading and the request-level error taxonomy.
//!
//! The transcript is client-held: the server never stores a running
//! conversation, so every type here is a pure value that round-trips
//! through JSON unchanged.

pub mod config;
pub mod detector;
pub mod domain;
pub mod errors;

pub use detector::{ClosingPhraseDetector, EndOfConversationDetector};
pub use domain::analytics::{
    AnalyticsAggregate, AnalyticsRecord, CostBreakdown, ModelAggregate, ModelPricing, TokenUsage,
};
pub use domain::inventory::{InventoryFilter, Vehicle, NUMERIC_UNSET};
pub use domain::message::{FunctionCall, Message, ToolCall};
pub use domain::summary::{
    ConversationSummary, Department, Level, Sentiment, SummaryInsights,
};
pub use errors::ChatApiError;
