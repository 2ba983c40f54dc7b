//! Scripted collaborators shared by the orchestration tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use dealerdesk_core::domain::analytics::TokenUsage;
use dealerdesk_core::domain::message::{Message, ToolCall};

use crate::llm::{ChatClient, ChatCompletion, LlmError};

/// Chat client that replays a fixed queue of turns. Both `complete` and
/// `complete_json` drain the same queue, matching call order in the engine.
pub struct ScriptedChatClient {
    model: String,
    turns: Mutex<VecDeque<Result<ChatCompletion, LlmError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tool_definitions: usize,
    pub json_mode: bool,
}

impl ScriptedChatClient {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            turns: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, content: &str, usage: TokenUsage) {
        self.push(Ok(ChatCompletion { message: Message::assistant(content), usage }));
    }

    pub fn push_tool_call(&self, id: &str, name: &str, arguments: &str, usage: TokenUsage) {
        self.push(Ok(ChatCompletion {
            message: Message::Assistant {
                content: None,
                tool_calls: vec![ToolCall::function(id, name, arguments)],
            },
            usage,
        }));
    }

    pub fn push_error(&self, error: LlmError) {
        self.push(Err(error));
    }

    pub fn push(&self, turn: Result<ChatCompletion, LlmError>) {
        self.turns.lock().expect("turns lock").push_back(turn);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    fn next_turn(
        &self,
        messages: &[Message],
        tool_definitions: usize,
        json_mode: bool,
    ) -> Result<ChatCompletion, LlmError> {
        self.requests.lock().expect("requests lock").push(RecordedRequest {
            messages: messages.to_vec(),
            tool_definitions,
            json_mode,
        });
        self.turns
            .lock()
            .expect("turns lock")
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Parse("script exhausted".to_string())))
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Value],
    ) -> Result<ChatCompletion, LlmError> {
        self.next_turn(messages, tools.len(), false)
    }

    async fn complete_json(&self, messages: &[Message]) -> Result<ChatCompletion, LlmError> {
        self.next_turn(messages, 0, true)
    }
}

pub fn usage(prompt: i64, completion: i64) -> TokenUsage {
    TokenUsage { prompt_tokens: prompt, completion_tokens: completion, total_tokens: prompt + completion }
}
