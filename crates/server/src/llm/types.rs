//! Wire types for the Anthropic Messages API.
//!
//! Only the shapes this service actually sends and receives are modeled.
//! Requests carry plain-text history (tool results are never fed back, so
//! content blocks never appear in requests); responses arrive exclusively as
//! a stream of server-sent events.

use serde::{Deserialize, Serialize};

/// A message in the conversation history sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender ("user" or "assistant").
    pub role: String,
    /// Plain text content.
    pub content: String,
}

impl Message {
    fn tagged(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }

    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::tagged("user", content)
    }

    /// Build an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::tagged("assistant", content)
    }
}

/// A tool definition advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Name the model invokes the tool by.
    pub name: String,
    /// What the tool does, phrased for the model.
    pub description: String,
    /// JSON Schema describing the tool's input object.
    pub input_schema: serde_json::Value,
}

/// Request body for `POST /v1/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model ID.
    pub model: String,
    /// Generation cap.
    pub max_tokens: u32,
    /// Full conversation history, oldest first.
    pub messages: Vec<Message>,
    /// System prompt, sent as a top-level field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Tools the model may call this turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    /// Request SSE streaming.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    /// The model wants a tool executed.
    ToolUse,
}

/// Token counts reported by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// One server-sent event of a streaming turn.
///
/// Events for a single content block arrive bracketed: a
/// `content_block_start` with the block's index, any number of deltas for
/// that index, then a `content_block_stop`. Text arrives via `text_delta`;
/// tool input arrives as `input_json_delta` fragments that only form valid
/// JSON once the block stops.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: StreamMessage },
    #[serde(rename = "content_block_start")]
    ContentBlockStart {
        index: usize,
        content_block: ContentBlockStart,
    },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta {
        index: usize,
        delta: ContentBlockDelta,
    },
    #[serde(rename = "content_block_stop")]
    ContentBlockStop { index: usize },
    #[serde(rename = "message_delta")]
    MessageDelta { delta: MessageDelta },
    #[serde(rename = "message_stop")]
    MessageStop,
    /// Keep-alive; carries nothing.
    #[serde(rename = "ping")]
    Ping,
    /// In-stream error from the API.
    #[serde(rename = "error")]
    Error { error: StreamError },
}

/// The skeleton message announced by `message_start`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamMessage {
    pub id: String,
    pub model: String,
    pub usage: Usage,
}

/// Opening of one content block.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlockStart {
    /// A text block; `text` is usually empty here.
    #[serde(rename = "text")]
    Text { text: String },
    /// A tool invocation; `input` is usually an empty object here, with the
    /// real input following as JSON fragments.
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

/// Incremental content for one block.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlockDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    /// A fragment of the tool input object. Fragments concatenate; parse
    /// only after `content_block_stop`.
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
}

/// Message-level update, carrying the stop reason once known.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDelta {
    pub stop_reason: Option<StopReason>,
}

/// Error payload of an in-stream `error` event.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}
