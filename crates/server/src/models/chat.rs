//! Chat turn wire models.

use serde::{Deserialize, Serialize};

use shoptalk_core::ChatRole;

/// One message of the client-held conversation history.
///
/// The chat endpoint accepts the full ordered history as a JSON array of
/// these; the server never stores conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurnMessage {
    /// Who authored the message.
    pub role: ChatRole,
    /// Plain text content.
    pub content: String,
}

impl ChatTurnMessage {
    /// Convenience constructor for a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Convenience constructor for an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}
