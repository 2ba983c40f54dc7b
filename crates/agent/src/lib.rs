//! Conversation orchestration for the dealership assistant: the completion
//! client, the tool registry, end-of-conversation summarization, and the
//! engine that ties them together.

pub mod conversation;
pub mod llm;
pub mod summary;
pub mod tools;
pub mod videos;

#[cfg(test)]
pub(crate) mod testing;

pub use conversation::{ChatTurn, ConversationEngine};
pub use llm::{ChatClient, ChatCompletion, LlmError, OpenAiChatClient};
pub use summary::SummaryGenerator;
pub use tools::{FetchCarsTool, Tool, ToolError, ToolRegistry};
pub use videos::{FindCarReviewVideosTool, ReviewVideo, ReviewVideoSearch, VideoSearchResult};
