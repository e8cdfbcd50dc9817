//! OpenAI chat completions provider (streaming)

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{retry, Error as EventSourceError, Event, EventSource, RequestBuilderExt};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use crate::generation::{GenerationProvider, GenerationRequest, TextStream};
use crate::{GateError, OpenAiConfig};

const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage; 2],
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

/// OpenAI-compatible streaming provider
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    /// Create a new provider
    pub fn new(config: OpenAiConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(config, client)
    }

    /// Create a provider with a shared HTTP client
    pub fn with_client(config: OpenAiConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn body<'a>(&'a self, request: &GenerationRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: request.system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: request.user_prompt(),
                },
            ],
            stream: true,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }
}

/// Text carried by one SSE data payload, if any
fn chunk_text(data: &str) -> Option<String> {
    match serde_json::from_str::<ChatChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .filter_map(|c| c.delta.content)
            .reduce(|mut acc, s| {
                acc.push_str(&s);
                acc
            })
            .filter(|s| !s.is_empty()),
        Err(e) => {
            warn!(error = %e, "Skipping unparseable completion chunk");
            None
        }
    }
}

fn stream_failure(e: EventSourceError) -> GateError {
    match e {
        EventSourceError::InvalidStatusCode(status, _) => {
            GateError::GenerationStreamFailure(format!("provider returned {status}"))
        }
        other => GateError::GenerationStreamFailure(other.to_string()),
    }
}

fn into_text_stream(mut source: EventSource, pending: Option<String>) -> TextStream {
    Box::pin(stream! {
        if let Some(text) = pending {
            yield Ok(text);
        }

        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => continue,
                Ok(Event::Message(msg)) => {
                    if msg.data.trim() == DONE_MARKER {
                        debug!("Completion stream finished");
                        break;
                    }
                    if let Some(text) = chunk_text(&msg.data) {
                        yield Ok(text);
                    }
                }
                Err(EventSourceError::StreamEnded) => break,
                Err(e) => {
                    error!(error = %e, "Completion stream failed mid-response");
                    yield Err(stream_failure(e));
                    break;
                }
            }
        }
        source.close();
    })
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    #[instrument(skip_all, fields(content_type = %request.content_type, article_id = %request.article.id))]
    async fn stream(&self, request: &GenerationRequest) -> Result<TextStream, GateError> {
        let mut source = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&self.body(request))
            .eventsource()
            .map_err(|e| GateError::GenerationStreamFailure(e.to_string()))?;
        source.set_retry_policy(Box::new(retry::Never));

        // Wait for the connection so status failures surface before any
        // bytes reach the client.
        let pending = match source.next().await {
            Some(Ok(Event::Open)) => None,
            Some(Ok(Event::Message(msg))) if msg.data.trim() == DONE_MARKER => {
                source.close();
                return Ok(Box::pin(futures::stream::empty()));
            }
            Some(Ok(Event::Message(msg))) => chunk_text(&msg.data),
            Some(Err(e)) => {
                source.close();
                error!(error = %e, "Completion request failed");
                return Err(stream_failure(e));
            }
            None => {
                return Err(GateError::GenerationStreamFailure(
                    "provider closed the connection".to_string(),
                ));
            }
        };

        debug!(model = %self.config.model, "Completion stream opened");
        Ok(into_text_stream(source, pending))
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}
