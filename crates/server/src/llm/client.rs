//! Streaming client for the Anthropic Messages API.

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::instrument;

use crate::config::ModelConfig;

use super::error::{ApiErrorResponse, ModelError};
use super::types::{ChatRequest, Message, StreamEvent, Tool};
use super::{EventStream, ModelProvider};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Client for the Anthropic Messages API.
///
/// Cheap to clone (`reqwest::Client` is reference-counted); all turns stream.
#[derive(Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    model: String,
}

impl AnthropicClient {
    /// Create a new client with the API key and version baked into the
    /// default headers.
    ///
    /// # Panics
    ///
    /// Panics if the API key contains invalid header characters.
    #[must_use]
    pub fn new(config: &ModelConfig) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(config.api_key.expose_secret())
                .expect("Invalid API key for header"),
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        Self {
            http: reqwest::Client::builder()
                .default_headers(headers)
                .build()
                .expect("Failed to build HTTP client"),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicClient {
    #[instrument(skip(self, messages, system, tools), fields(model = %self.model))]
    async fn stream_turn(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Option<Vec<Tool>>,
    ) -> Result<EventStream, ModelError> {
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
            messages,
            system,
            tools,
            stream: Some(true),
        };

        let response = self
            .http
            .post(MESSAGES_URL)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let events = stream! {
            let mut decoder = SseDecoder::default();
            let mut body = std::pin::pin!(response.bytes_stream());

            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => match std::str::from_utf8(&bytes) {
                        Ok(text) => {
                            decoder.push(text);
                            while let Some(event) = decoder.next_event() {
                                yield event;
                            }
                        }
                        Err(e) => {
                            yield Err(ModelError::Parse(format!("invalid UTF-8 in stream: {e}")));
                        }
                    },
                    Err(e) => yield Err(ModelError::Stream(e.to_string())),
                }
            }
        };

        Ok(events.boxed())
    }
}

/// Map a non-success response to a `ModelError`, consuming the body.
async fn error_from_response(response: reqwest::Response) -> ModelError {
    match response.status() {
        reqwest::StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            ModelError::RateLimited(retry_after)
        }
        reqwest::StatusCode::UNAUTHORIZED => {
            ModelError::Unauthorized("Invalid API key".to_string())
        }
        _ => match response.text().await {
            Ok(body) => match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(parsed) => ModelError::Api {
                    error_type: parsed.error.error_type,
                    message: parsed.error.message,
                },
                Err(_) => ModelError::Api {
                    error_type: "unknown".to_string(),
                    message: body,
                },
            },
            Err(e) => ModelError::Http(e),
        },
    }
}

/// Incremental decoder for the SSE framing.
///
/// Frames are separated by blank lines and may span chunk boundaries, so
/// undecoded input stays buffered. Only `data:` lines carry events; frames
/// without one (comments, keep-alives) are dropped.
#[derive(Default)]
struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    fn push(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
    }

    /// Next decoded event, if a complete frame is buffered.
    fn next_event(&mut self) -> Option<Result<StreamEvent, ModelError>> {
        while let Some(end) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..end + 2).collect();
            let Some(data) = data_payload(&frame) else {
                continue;
            };
            if data == "[DONE]" {
                continue;
            }
            return Some(
                serde_json::from_str::<StreamEvent>(data)
                    .map_err(|e| ModelError::Parse(format!("bad stream event: {e}"))),
            );
        }
        None
    }
}

/// The `data:` payload of one SSE frame (the last data line wins).
fn data_payload(frame: &str) -> Option<&str> {
    frame
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix("data: "))
}
