//! Conversation orchestrator.
//!
//! Runs one chat turn: load the persona, invoke the model once in streaming
//! mode with the tool declarations, execute tool calls as their blocks
//! complete, and assemble the final text in arrival order. Tool calls run
//! on detached tasks, so a client disconnect never aborts an order already
//! dispatched. The server keeps no conversation state; the client sends the
//! full history every turn.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tracing::instrument;

use crate::db::{OrderRepository, ProductRepository, RepositoryError};
use crate::llm::{
    ContentBlockDelta, ContentBlockStart, Message, ModelError, ModelProvider, StreamEvent,
};
use crate::models::ChatTurnMessage;
use crate::services::fulfillment::FulfillmentEngine;
use crate::services::persona::PersonaService;
use crate::tools::{ToolExecutor, storefront_tools};

/// Returned when a turn produced neither text nor tool output.
pub const NO_RESPONSE_FALLBACK: &str = "No response could be generated at this time.";

/// Errors from a chat turn.
///
/// Tool-level failures never appear here; the executor renders those as text
/// inside the turn.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request carried no messages.
    #[error("chat history must contain at least one message")]
    EmptyHistory,

    /// Persona lookup failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The model transport or API failed.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// A tool-use block still being streamed. Input JSON arrives as fragments
/// and is parsed only once the block stops.
struct PendingTool {
    name: String,
    initial_input: serde_json::Value,
    partial_json: String,
}

impl PendingTool {
    fn into_input(self) -> serde_json::Value {
        if self.partial_json.trim().is_empty() {
            return self.initial_input;
        }
        match serde_json::from_str(&self.partial_json) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(tool = %self.name, %error, "tool input JSON did not assemble");
                serde_json::Value::Null
            }
        }
    }
}

/// Drives chat turns.
#[derive(Clone)]
pub struct ChatService {
    provider: Arc<dyn ModelProvider>,
    persona: PersonaService,
    products: ProductRepository,
    orders: OrderRepository,
    fulfillment: FulfillmentEngine,
}

impl ChatService {
    #[must_use]
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        persona: PersonaService,
        products: ProductRepository,
        orders: OrderRepository,
        fulfillment: FulfillmentEngine,
    ) -> Self {
        Self {
            provider,
            persona,
            products,
            orders,
            fulfillment,
        }
    }

    /// Run one turn over the supplied history and return the response text.
    ///
    /// The model is invoked exactly once. Text deltas accumulate as they
    /// arrive; each completed tool call executes immediately and its output
    /// is appended unless that exact text is already present. Every tool
    /// execution finishes before the turn returns, and each runs on a task
    /// of its own: a dispatched call completes and its effects stand even
    /// when this future is dropped mid-turn. The result is never empty: an
    /// empty accumulation falls back to the first tool output, then to
    /// [`NO_RESPONSE_FALLBACK`].
    ///
    /// # Errors
    ///
    /// [`ChatError::EmptyHistory`] for an empty request,
    /// [`ChatError::Repository`] when the persona cannot be loaded, and
    /// [`ChatError::Model`] when the model transport or stream fails.
    #[instrument(skip(self, history), fields(history_len = history.len()))]
    pub async fn run_turn(&self, history: &[ChatTurnMessage]) -> Result<String, ChatError> {
        if history.is_empty() {
            return Err(ChatError::EmptyHistory);
        }

        let persona = self.persona.persona_or_default().await?;
        let messages: Vec<Message> = history
            .iter()
            .map(|m| Message {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect();

        let mut stream = self
            .provider
            .stream_turn(messages, Some(persona.system_prompt()), Some(storefront_tools()))
            .await?;

        let executor = ToolExecutor::new(
            self.products.clone(),
            self.orders.clone(),
            self.fulfillment.clone(),
        );

        let mut response = String::new();
        let mut first_tool_output: Option<String> = None;
        let mut pending: HashMap<usize, PendingTool> = HashMap::new();

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::ContentBlockStart {
                    index,
                    content_block: ContentBlockStart::ToolUse { name, input, .. },
                } => {
                    pending.insert(
                        index,
                        PendingTool {
                            name,
                            initial_input: input,
                            partial_json: String::new(),
                        },
                    );
                }
                StreamEvent::ContentBlockStart {
                    content_block: ContentBlockStart::Text { text },
                    ..
                } => {
                    response.push_str(&text);
                }
                StreamEvent::ContentBlockDelta {
                    delta: ContentBlockDelta::TextDelta { text },
                    ..
                } => {
                    response.push_str(&text);
                }
                StreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentBlockDelta::InputJsonDelta { partial_json },
                } => {
                    if let Some(tool) = pending.get_mut(&index) {
                        tool.partial_json.push_str(&partial_json);
                    }
                }
                StreamEvent::ContentBlockStop { index } => {
                    if let Some(tool) = pending.remove(&index) {
                        let name = tool.name.clone();
                        let input = tool.into_input();
                        let output = executor.execute_detached(name, input).await;

                        if first_tool_output.is_none() && !output.is_empty() {
                            first_tool_output = Some(output.clone());
                        }
                        append_unless_present(&mut response, &output);
                    }
                }
                StreamEvent::Error { error } => {
                    return Err(ChatError::Model(ModelError::Api {
                        error_type: error.error_type,
                        message: error.message,
                    }));
                }
                StreamEvent::MessageStart { .. }
                | StreamEvent::MessageDelta { .. }
                | StreamEvent::MessageStop
                | StreamEvent::Ping => {}
            }
        }

        if response.trim().is_empty() {
            return Ok(first_tool_output.unwrap_or_else(|| NO_RESPONSE_FALLBACK.to_string()));
        }
        Ok(response)
    }
}

/// Append `output` unless that exact text already appears in the response.
fn append_unless_present(response: &mut String, output: &str) {
    if output.is_empty() || response.contains(output) {
        return;
    }
    if !response.is_empty() {
        response.push_str("\n\n");
    }
    response.push_str(output);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::db::{PersonaRepository, create_pool_with, run_migrations};
    use crate::llm::{EventStream, Tool};
    use crate::models::NewProduct;

    use super::*;

    /// Replays a canned event script instead of calling a real model.
    struct ScriptedProvider {
        script: Mutex<Option<Vec<Result<StreamEvent, ModelError>>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<StreamEvent, ModelError>>) -> Self {
            Self {
                script: Mutex::new(Some(script)),
            }
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn stream_turn(
            &self,
            _messages: Vec<Message>,
            _system: Option<String>,
            _tools: Option<Vec<Tool>>,
        ) -> Result<EventStream, ModelError> {
            let events = self
                .script
                .lock()
                .unwrap()
                .take()
                .expect("script already consumed");
            Ok(futures::stream::iter(events).boxed())
        }
    }

    fn text(s: &str) -> Result<StreamEvent, ModelError> {
        Ok(StreamEvent::ContentBlockDelta {
            index: 0,
            delta: ContentBlockDelta::TextDelta {
                text: s.to_string(),
            },
        })
    }

    fn tool_start(index: usize, name: &str) -> Result<StreamEvent, ModelError> {
        Ok(StreamEvent::ContentBlockStart {
            index,
            content_block: ContentBlockStart::ToolUse {
                id: format!("toolu_{index}"),
                name: name.to_string(),
                input: json!({}),
            },
        })
    }

    fn json_delta(index: usize, fragment: &str) -> Result<StreamEvent, ModelError> {
        Ok(StreamEvent::ContentBlockDelta {
            index,
            delta: ContentBlockDelta::InputJsonDelta {
                partial_json: fragment.to_string(),
            },
        })
    }

    fn block_stop(index: usize) -> Result<StreamEvent, ModelError> {
        Ok(StreamEvent::ContentBlockStop { index })
    }

    fn stop() -> Result<StreamEvent, ModelError> {
        Ok(StreamEvent::MessageStop)
    }

    async fn service_with(script: Vec<Result<StreamEvent, ModelError>>) -> ChatService {
        let pool = create_pool_with("sqlite::memory:", 1, 30).await.expect("connect");
        run_migrations(&pool).await.expect("migrate");

        let products = ProductRepository::new(pool.clone());
        products
            .create(&NewProduct {
                name: "MacBook Pro M2".to_string(),
                description: "Apple laptop".to_string(),
                price: "1299.00".parse().unwrap(),
                stock: 5,
                category: "Laptops".to_string(),
                image_url: None,
            })
            .await
            .expect("seed");

        ChatService::new(
            Arc::new(ScriptedProvider::new(script)),
            PersonaService::new(PersonaRepository::new(pool.clone())),
            products,
            OrderRepository::new(pool.clone()),
            FulfillmentEngine::new(pool),
        )
    }

    fn history() -> Vec<ChatTurnMessage> {
        vec![ChatTurnMessage::user("do you have laptops?")]
    }

    #[tokio::test]
    async fn test_text_only_turn() {
        let service = service_with(vec![
            text("We have several "),
            text("laptops in stock."),
            stop(),
        ])
        .await;

        let out = service.run_turn(&history()).await.unwrap();
        assert_eq!(out, "We have several laptops in stock.");
    }

    #[tokio::test]
    async fn test_tool_output_appends_after_text() {
        let service = service_with(vec![
            text("Let me check the catalog."),
            tool_start(1, "searchProducts"),
            json_delta(1, "{\"query\":"),
            json_delta(1, "\"laptop\"}"),
            block_stop(1),
            stop(),
        ])
        .await;

        let out = service.run_turn(&history()).await.unwrap();
        assert!(out.starts_with("Let me check the catalog.\n\n"));
        assert!(out.contains("- MacBook Pro M2: $1299.00 (stock: 5)"));
    }

    #[tokio::test]
    async fn test_duplicate_tool_output_not_appended_twice() {
        let service = service_with(vec![
            tool_start(0, "searchProducts"),
            json_delta(0, "{\"query\":\"laptop\"}"),
            block_stop(0),
            tool_start(1, "searchProducts"),
            json_delta(1, "{\"query\":\"laptop\"}"),
            block_stop(1),
            stop(),
        ])
        .await;

        let out = service.run_turn(&history()).await.unwrap();
        assert_eq!(out.matches("Products found:").count(), 1);
    }

    #[tokio::test]
    async fn test_empty_text_falls_back_to_tool_output() {
        let service = service_with(vec![
            tool_start(0, "searchProducts"),
            json_delta(0, "{\"query\":\"laptop\"}"),
            block_stop(0),
            stop(),
        ])
        .await;

        let out = service.run_turn(&history()).await.unwrap();
        assert!(out.starts_with("Products found:"));
    }

    #[tokio::test]
    async fn test_empty_turn_uses_fixed_fallback() {
        let service = service_with(vec![stop()]).await;
        let out = service.run_turn(&history()).await.unwrap();
        assert_eq!(out, NO_RESPONSE_FALLBACK);
    }

    #[tokio::test]
    async fn test_malformed_tool_input_becomes_text() {
        let service = service_with(vec![
            tool_start(0, "searchProducts"),
            json_delta(0, "{\"query\": \"lap"),
            block_stop(0),
            stop(),
        ])
        .await;

        let out = service.run_turn(&history()).await.unwrap();
        assert!(out.starts_with("Invalid input for searchProducts:"));
    }

    #[tokio::test]
    async fn test_tool_start_input_used_when_no_fragments_arrive() {
        let service = service_with(vec![
            Ok(StreamEvent::ContentBlockStart {
                index: 0,
                content_block: ContentBlockStart::ToolUse {
                    id: "toolu_0".to_string(),
                    name: "searchProducts".to_string(),
                    input: json!({ "query": "laptop" }),
                },
            }),
            block_stop(0),
            stop(),
        ])
        .await;

        let out = service.run_turn(&history()).await.unwrap();
        assert!(out.starts_with("Products found:"));
    }

    #[tokio::test]
    async fn test_error_event_fails_the_turn() {
        let service = service_with(vec![
            text("partial"),
            Ok(StreamEvent::Error {
                error: crate::llm::StreamError {
                    error_type: "overloaded_error".to_string(),
                    message: "Overloaded".to_string(),
                },
            }),
        ])
        .await;

        let err = service.run_turn(&history()).await.expect_err("should fail");
        assert!(matches!(err, ChatError::Model(ModelError::Api { .. })));
    }

    #[tokio::test]
    async fn test_stream_failure_fails_the_turn() {
        let service = service_with(vec![
            text("partial"),
            Err(ModelError::Stream("connection reset".to_string())),
        ])
        .await;

        let err = service.run_turn(&history()).await.expect_err("should fail");
        assert!(matches!(err, ChatError::Model(ModelError::Stream(_))));
    }

    #[tokio::test]
    async fn test_empty_history_rejected() {
        let service = service_with(vec![stop()]).await;
        let err = service.run_turn(&[]).await.expect_err("should fail");
        assert!(matches!(err, ChatError::EmptyHistory));
    }

    #[tokio::test]
    async fn test_dropped_turn_still_completes_dispatched_order() {
        // Persona reads get a database of their own, so holding the store
        // pool's single connection parks the turn only inside the
        // dispatched order.
        let persona_pool = create_pool_with("sqlite::memory:", 1, 30).await.expect("connect");
        run_migrations(&persona_pool).await.expect("migrate");
        let store_pool = create_pool_with("sqlite::memory:", 1, 30).await.expect("connect");
        run_migrations(&store_pool).await.expect("migrate");

        let products = ProductRepository::new(store_pool.clone());
        products
            .create(&NewProduct {
                name: "MacBook Pro M2".to_string(),
                description: "Apple laptop".to_string(),
                price: "1299.00".parse().unwrap(),
                stock: 5,
                category: "Laptops".to_string(),
                image_url: None,
            })
            .await
            .expect("seed");

        let service = ChatService::new(
            Arc::new(ScriptedProvider::new(vec![
                tool_start(0, "createOrder"),
                json_delta(0, "{\"customerEmail\":\"shopper@example.com\","),
                json_delta(0, "\"items\":[{\"productName\":\"MacBook Pro M2\",\"quantity\":2}]}"),
                block_stop(0),
                stop(),
            ])),
            PersonaService::new(PersonaRepository::new(persona_pool)),
            products.clone(),
            OrderRepository::new(store_pool.clone()),
            FulfillmentEngine::new(store_pool.clone()),
        );

        // Park the order mid-flight by holding the store's only connection.
        let gate = store_pool.acquire().await.expect("hold the store connection");

        let history = history();
        let mut turn = Box::pin(service.run_turn(&history));
        let parked = tokio::time::timeout(Duration::from_secs(1), &mut turn).await;
        assert!(parked.is_err(), "turn should be waiting on the parked order");

        // The client disconnects: the turn future goes away while the order
        // is still in flight. Releasing the connection must let the order
        // finish anyway.
        drop(turn);
        drop(gate);

        let orders = OrderRepository::new(store_pool.clone());
        let mut placed = Vec::new();
        for _ in 0..50 {
            placed = orders
                .find_by_email("shopper@example.com", None)
                .await
                .expect("query orders");
            if !placed.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(placed.len(), 1, "the dispatched order must still land");
        let stock = products
            .find_by_name("MacBook Pro M2")
            .await
            .expect("query product")
            .expect("product exists")
            .stock;
        assert_eq!(stock, 3, "the order's stock decrement must stand");
    }
}
