//! Chat-completion provider trait used to answer grounded questions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions that frame the conversation.
    System,
    /// The end user.
    User,
    /// The model.
    Assistant,
}

/// One message of a chat-style request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
}

/// A language model that turns an ordered list of messages into an answer.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Generate the next assistant message for `messages`.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}
