//! Language model transport.
//!
//! The conversation orchestrator talks to the model exclusively through the
//! [`ModelProvider`] trait, so turn assembly can be tested against a scripted
//! event stream. [`AnthropicClient`] is the production implementation.

pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use client::AnthropicClient;
pub use error::ModelError;
pub use types::{
    ChatRequest, ContentBlockDelta, ContentBlockStart, Message, MessageDelta, StopReason,
    StreamError, StreamEvent, StreamMessage, Tool, Usage,
};

/// Stream of events for one model turn.
pub type EventStream = BoxStream<'static, Result<StreamEvent, ModelError>>;

/// A model backend capable of streaming one conversation turn.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Start one streaming turn.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be started. Errors after the
    /// stream begins are surfaced as stream items.
    async fn stream_turn(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Option<Vec<Tool>>,
    ) -> Result<EventStream, ModelError>;
}
