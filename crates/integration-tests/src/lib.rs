//! Shared harness for black-box tests.
//!
//! Tests in this crate exercise the full service in process: real router,
//! real handlers, real repositories, over a fresh in-memory SQLite database
//! per test. The only seam is the model transport, which is replaced by
//! [`ScriptedProvider`] so conversation turns replay a canned event stream
//! instead of calling the Anthropic API.
//!
//! Requests go through `tower::ServiceExt::oneshot` rather than a listening
//! socket, so the suite runs without any network access.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use async_trait::async_trait;
use futures::StreamExt;
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use shoptalk_server::build_router;
use shoptalk_server::config::{ModelConfig, ServerConfig};
use shoptalk_server::db::{create_pool_with, run_migrations};
use shoptalk_server::llm::{
    ContentBlockDelta, ContentBlockStart, EventStream, Message, MessageDelta, ModelError,
    ModelProvider, StopReason, StreamError, StreamEvent, StreamMessage, Tool, Usage,
};
use shoptalk_server::models::Product;
use shoptalk_server::state::AppState;

/// One scripted model turn: the events the stream will yield, in order.
pub type TurnScript = Vec<Result<StreamEvent, ModelError>>;

/// A [`ModelProvider`] that replays queued event scripts.
///
/// Each call to `stream_turn` consumes the next queued script. When the
/// queue is empty the stream ends immediately, which the orchestrator
/// renders as its fixed no-response message.
#[derive(Default)]
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<TurnScript>>,
}

impl ScriptedProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the event script for the next model turn.
    pub fn push_turn(&self, script: TurnScript) {
        self.turns
            .lock()
            .expect("script queue poisoned")
            .push_back(script);
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
            .turns
            .lock()
            .expect("script queue poisoned")
            .pop_front()
            .unwrap_or_default();
        Ok(futures::stream::iter(events).boxed())
    }
}

// Event constructors for building turn scripts.

pub fn message_start() -> Result<StreamEvent, ModelError> {
    Ok(StreamEvent::MessageStart {
        message: StreamMessage {
            id: "msg_01".to_string(),
            model: "claude-test".to_string(),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 0,
            },
        },
    })
}

pub fn text(s: &str) -> Result<StreamEvent, ModelError> {
    Ok(StreamEvent::ContentBlockDelta {
        index: 0,
        delta: ContentBlockDelta::TextDelta {
            text: s.to_string(),
        },
    })
}

pub fn tool_start(index: usize, name: &str) -> Result<StreamEvent, ModelError> {
    Ok(StreamEvent::ContentBlockStart {
        index,
        content_block: ContentBlockStart::ToolUse {
            id: format!("toolu_{index}"),
            name: name.to_string(),
            input: json!({}),
        },
    })
}

pub fn json_delta(index: usize, fragment: &str) -> Result<StreamEvent, ModelError> {
    Ok(StreamEvent::ContentBlockDelta {
        index,
        delta: ContentBlockDelta::InputJsonDelta {
            partial_json: fragment.to_string(),
        },
    })
}

pub fn block_stop(index: usize) -> Result<StreamEvent, ModelError> {
    Ok(StreamEvent::ContentBlockStop { index })
}

pub fn message_delta(stop_reason: StopReason) -> Result<StreamEvent, ModelError> {
    Ok(StreamEvent::MessageDelta {
        delta: MessageDelta {
            stop_reason: Some(stop_reason),
        },
    })
}

pub fn ping() -> Result<StreamEvent, ModelError> {
    Ok(StreamEvent::Ping)
}

pub fn stop() -> Result<StreamEvent, ModelError> {
    Ok(StreamEvent::MessageStop)
}

/// An in-stream `error` event, as the API sends for overloads.
pub fn stream_error(error_type: &str, message: &str) -> Result<StreamEvent, ModelError> {
    Ok(StreamEvent::Error {
        error: StreamError {
            error_type: error_type.to_string(),
            message: message.to_string(),
        },
    })
}

/// A transport-level failure mid-stream.
pub fn transport_error(message: &str) -> Result<StreamEvent, ModelError> {
    Err(ModelError::Stream(message.to_string()))
}

/// The service under test plus handles for seeding and scripting.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub provider: Arc<ScriptedProvider>,
}

impl TestApp {
    /// Bring up a fresh service over an empty in-memory database.
    pub async fn spawn() -> Self {
        let pool = create_pool_with("sqlite::memory:", 1, 30)
            .await
            .expect("connect to in-memory database");
        run_migrations(&pool).await.expect("run migrations");

        let provider = Arc::new(ScriptedProvider::new());
        let state = AppState::with_provider(test_config(), pool, provider.clone());
        let router = build_router(state.clone());

        Self {
            router,
            state,
            provider,
        }
    }

    /// Insert a catalog row directly through the repository.
    pub async fn seed_product(&self, name: &str, price: &str, stock: i64, category: &str) -> Product {
        self.state
            .products()
            .create(&shoptalk_server::models::NewProduct {
                name: name.to_string(),
                description: format!("Demo listing for {name}"),
                price: price.parse().expect("well-formed price"),
                stock,
                category: category.to_string(),
                image_url: None,
            })
            .await
            .expect("seed product")
    }

    /// Send one request through the router and decode the JSON body.
    ///
    /// Responses without a body decode as `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                builder.body(Body::from(
                    serde_json::to_vec(value).expect("serialize request body"),
                ))
            }
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router never fails");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read response body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is JSON")
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None).await
    }
}

fn test_config() -> ServerConfig {
    ServerConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        model: ModelConfig {
            api_key: SecretString::from("sk-test-0000"),
            model: "claude-test".to_string(),
        },
    }
}
