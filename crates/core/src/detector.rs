use crate::domain::message::Message;

/// Policy deciding whether a transcript has reached its natural end.
///
/// Kept behind a trait so the heuristic can be tightened or replaced without
/// touching the conversation engine.
pub trait EndOfConversationDetector: Send + Sync {
    fn detect(&self, transcript: &[Message]) -> bool;
}

/// Closing phrases the assistant is prompted to emit when wrapping up.
const CLOSING_PHRASES: &[&str] = &[
    "goodbye",
    "bye",
    "thank you for chatting",
    "have a great day",
    "is there anything else",
    "anything else i can help",
    "end of conversation",
    "conversation is complete",
    "conversation has ended",
    "wrapping up",
    "summarizing our conversation",
    "conversation summary",
];

/// Case-insensitive substring scan over recent assistant messages.
///
/// Deterministic and intentionally imprecise: an assistant message that
/// merely mentions one of the phrases also fires. That false-positive mode
/// is accepted; the phrase list is what the persona prompt instructs the
/// model to say when closing.
#[derive(Clone, Debug, Default)]
pub struct ClosingPhraseDetector;

impl EndOfConversationDetector for ClosingPhraseDetector {
    fn detect(&self, transcript: &[Message]) -> bool {
        if transcript.len() < 3 {
            return false;
        }

        let window_start = transcript.len().saturating_sub(5);
        for message in transcript[window_start..].iter().rev() {
            if !message.is_assistant() {
                continue;
            }
            let content = message.content().unwrap_or_default().to_lowercase();
            if CLOSING_PHRASES.iter().any(|phrase| content.contains(phrase)) {
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::{ClosingPhraseDetector, EndOfConversationDetector};
    use crate::domain::message::{Message, ToolCall};

    fn detector() -> ClosingPhraseDetector {
        ClosingPhraseDetector
    }

    #[test]
    fn short_transcripts_never_fire() {
        let transcript = vec![Message::system("persona"), Message::assistant("Goodbye!")];
        assert!(!detector().detect(&transcript));
    }

    #[test]
    fn fires_on_explicit_closing_message() {
        let transcript = vec![
            Message::system("persona"),
            Message::user("thanks, that's all"),
            Message::assistant(
                "Thank you for chatting with me today... Have a great day!",
            ),
        ];
        assert!(detector().detect(&transcript));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let transcript = vec![
            Message::system("persona"),
            Message::user("bye"),
            Message::assistant("GOODBYE and take care"),
        ];
        assert!(detector().detect(&transcript));
    }

    #[test]
    fn ignores_closing_phrases_outside_the_recent_window() {
        let mut transcript = vec![
            Message::system("persona"),
            Message::assistant("Goodbye!"),
        ];
        for turn in 0..6 {
            transcript.push(Message::user(format!("question {turn}")));
            transcript.push(Message::assistant(format!("answer {turn}")));
        }
        assert!(!detector().detect(&transcript));
    }

    #[test]
    fn user_farewells_do_not_fire() {
        let transcript = vec![
            Message::system("persona"),
            Message::assistant("Anything I can look up?"),
            Message::user("no thanks, goodbye"),
        ];
        // "anything else" is not in the assistant message; the user farewell
        // alone must not trigger summarization.
        assert!(!detector().detect(&transcript));
    }

    #[test]
    fn tolerates_assistant_messages_without_content() {
        let transcript = vec![
            Message::system("persona"),
            Message::user("show me reviews"),
            Message::Assistant {
                content: None,
                tool_calls: vec![ToolCall::function("c1", "find_car_review_videos", "{}")],
            },
        ];
        assert!(!detector().detect(&transcript));
    }
}
