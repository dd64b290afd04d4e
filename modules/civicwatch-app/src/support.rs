use std::sync::Arc;

use ai_client::{truncate_to_char_boundary, GenerativeModel, Message};
use tracing::warn;

pub const SUPPORT_SYSTEM_PROMPT: &str = "\
You are the CivicWatch support assistant. CivicWatch lets citizens report civic \
issues such as potholes, garbage and broken streetlights with a photo and an \
address. Each report is checked by an AI audit before it is published, and \
local authorities track it from New to In Progress to Resolved. Citizens can \
support or dispute other reports once and earn points for contributing.

Answer questions about using the app briefly and politely. If asked about a \
specific report's status, tell the user to check the Public Reports page. Do \
not invent policies, phone numbers or deadlines.";

pub const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble answering right now. Please try again in a moment.";

/// Longest user message forwarded to the model, in bytes.
pub const MAX_INPUT_BYTES: usize = 2_000;

/// Messages kept as context (user and assistant turns together).
pub const MAX_HISTORY: usize = 20;

pub struct SupportChat {
    model: Arc<dyn GenerativeModel>,
    history: Vec<Message>,
}

impl SupportChat {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            model,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// One conversational turn. Never fails: model errors become an apology.
    pub async fn send(&mut self, input: &str) -> String {
        let input = truncate_to_char_boundary(input.trim(), MAX_INPUT_BYTES);
        if input.is_empty() {
            return String::new();
        }

        let reply = match self.model.converse(SUPPORT_SYSTEM_PROMPT, &self.history, input).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => {
                warn!("Support model returned an empty reply");
                return FALLBACK_REPLY.to_string();
            }
            Err(e) => {
                warn!(error = %e, "Support chat failed");
                return FALLBACK_REPLY.to_string();
            }
        };

        self.history.push(Message::user(input));
        self.history.push(Message::assistant(reply.clone()));
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use ai_client::MessageRole;

    #[tokio::test]
    async fn replies_build_history() {
        let model = Arc::new(ScriptedModel::new().chat("Use the New Report page.").chat("Yes."));
        let mut chat = SupportChat::new(model.clone());

        assert_eq!(chat.send("How do I report a pothole?").await, "Use the New Report page.");
        assert_eq!(chat.send("  Do I need a photo?  ").await, "Yes.");

        assert_eq!(chat.history().len(), 4);
        assert_eq!(chat.history()[2].role, MessageRole::User);
        assert_eq!(chat.history()[2].content, "Do I need a photo?");

        let histories = model.histories();
        assert!(histories[0].is_empty());
        assert_eq!(histories[1].len(), 2);
    }

    #[tokio::test]
    async fn failures_apologise_without_recording() {
        let model = Arc::new(ScriptedModel::new().chat_error("503"));
        let mut chat = SupportChat::new(model);
        assert_eq!(chat.send("hello").await, FALLBACK_REPLY);
        assert!(chat.history().is_empty());
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let model = Arc::new(ScriptedModel::new());
        let mut chat = SupportChat::new(model.clone());
        assert_eq!(chat.send("   ").await, "");
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let mut model = ScriptedModel::new();
        for i in 0..15 {
            model = model.chat(format!("reply {i}"));
        }
        let mut chat = SupportChat::new(Arc::new(model));
        for i in 0..15 {
            chat.send(&format!("question {i}")).await;
        }
        assert_eq!(chat.history().len(), MAX_HISTORY);
        assert_eq!(chat.history()[MAX_HISTORY - 1].content, "reply 14");
        assert_eq!(chat.history()[0].content, "question 5");
    }

    #[tokio::test]
    async fn long_input_is_truncated() {
        let model = Arc::new(ScriptedModel::new().chat("ok"));
        let mut chat = SupportChat::new(model.clone());
        chat.send(&"é".repeat(MAX_INPUT_BYTES)).await;
        assert!(model.prompts()[0].len() <= MAX_INPUT_BYTES);
    }
}
