//! HTTP-backed generator for messages-style model APIs.
//!
//! Features:
//! - Connection pooling and reuse (via reqwest::Client)
//! - Exponential backoff retry logic for transient errors
//! - Proper error classification (transient vs permanent)

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::retry::RetryPolicy;
use crate::domain::models::{
    GenerationChunk, GenerationRequest, GenerationResponse, RequestPart,
};
use crate::domain::ports::{Generator, ProviderError, ProviderResult};

/// Configuration for the API generator.
#[derive(Debug, Clone)]
pub struct ApiGeneratorConfig {
    /// Provider label, e.g. "anthropic".
    pub provider: String,
    /// Default model identifier.
    pub model: String,
    pub base_url: String,
    /// Credential, read from the environment by the caller. Only presence
    /// is interpreted here.
    pub api_key: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for ApiGeneratorConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            timeout_secs: 300,
            retry: RetryPolicy::default(),
        }
    }
}

/// HTTP client for a messages-style completion API.
pub struct ApiGenerator {
    http_client: reqwest::Client,
    config: ApiGeneratorConfig,
}

impl ApiGenerator {
    pub fn new(config: ApiGeneratorConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn build_body(&self, request: &GenerationRequest, stream: bool) -> WireRequest {
        let content = request
            .parts
            .iter()
            .map(|part| match part {
                RequestPart::Text { text } => WireContent::Text { text: text.clone() },
                RequestPart::Image { mime_type, data } => WireContent::Image {
                    source: WireImageSource {
                        source_type: "base64".to_string(),
                        media_type: mime_type.clone(),
                        data: data.clone(),
                    },
                },
            })
            .collect();

        WireRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            max_tokens: request.max_tokens.unwrap_or(4096),
            system: request.system.clone(),
            temperature: request.temperature,
            messages: vec![WireMessage {
                role: "user".to_string(),
                content,
            }],
            stream: if stream { Some(true) } else { None },
        }
    }

    async fn send(&self, body: &WireRequest) -> ProviderResult<WireResponse> {
        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(e, self.config.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(ProviderError::from_status(status.as_u16(), text));
        }

        response
            .json::<WireResponse>()
            .await
            .map_err(|e| ProviderError::InvalidRequest(format!("malformed response: {}", e)))
    }
}

fn classify_reqwest_error(e: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout_secs * 1000)
    } else {
        ProviderError::Network(e.to_string())
    }
}

#[async_trait]
impl Generator for ApiGenerator {
    fn name(&self) -> &str {
        &self.config.provider
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<GenerationResponse> {
        let body = self.build_body(request, false);
        let wire = self.config.retry.execute(|| self.send(&body)).await?;

        let text = wire
            .content
            .iter()
            .filter_map(|block| match block {
                WireContent::Text { text } => Some(text.as_str()),
                WireContent::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(GenerationResponse {
            text,
            model: wire.model,
            input_tokens: wire.usage.input_tokens,
            output_tokens: wire.usage.output_tokens,
            stop_reason: wire.stop_reason,
        })
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> ProviderResult<mpsc::Receiver<GenerationChunk>> {
        let body = self.build_body(request, true);
        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(e, self.config.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), text));
        }

        let (tx, rx) = mpsc::channel(64);
        let mut stream = response.bytes_stream();
        tokio::spawn(async move {
            let mut buffer = String::new();
            while let Some(Ok(bytes)) = stream.next().await {
                buffer.push_str(&String::from_utf8_lossy(&bytes));
                // SSE events are separated by blank lines.
                while let Some(pos) = buffer.find("\n\n") {
                    let event: String = buffer.drain(..pos + 2).collect();
                    for line in event.lines() {
                        let Some(data) = line.strip_prefix("data: ") else {
                            continue;
                        };
                        if let Ok(delta) = serde_json::from_str::<WireStreamEvent>(data) {
                            match delta {
                                WireStreamEvent::ContentBlockDelta { delta } => {
                                    if tx
                                        .send(GenerationChunk {
                                            delta: delta.text,
                                            done: false,
                                        })
                                        .await
                                        .is_err()
                                    {
                                        return;
                                    }
                                }
                                WireStreamEvent::MessageStop => {
                                    let _ = tx
                                        .send(GenerationChunk {
                                            delta: String::new(),
                                            done: true,
                                        })
                                        .await;
                                    return;
                                }
                                WireStreamEvent::Other => {}
                            }
                        }
                    }
                }
            }
            let _ = tx
                .send(GenerationChunk {
                    delta: String::new(),
                    done: true,
                })
                .await;
        });

        Ok(rx)
    }

    async fn count_tokens(&self, request: &GenerationRequest) -> ProviderResult<u64> {
        let body = self.build_body(request, false);
        let response = self
            .http_client
            .post(format!("{}/v1/messages/count_tokens", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "model": body.model,
                "system": body.system,
                "messages": body.messages,
            }))
            .send()
            .await
            .map_err(|e| classify_reqwest_error(e, self.config.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), text));
        }

        let counted: WireTokenCount = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidRequest(format!("malformed response: {}", e)))?;
        Ok(counted.input_tokens)
    }

    async fn embed(&self, _text: &str) -> ProviderResult<Vec<f32>> {
        Err(ProviderError::Unsupported(format!(
            "provider '{}' exposes no embeddings endpoint",
            self.config.provider
        )))
    }
}

// Wire types for the messages API.

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: Vec<WireContent>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireContent {
    Text { text: String },
    Image { source: WireImageSource },
}

#[derive(Debug, Serialize, Deserialize)]
struct WireImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    model: String,
    content: Vec<WireContent>,
    usage: WireUsage,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct WireTokenCount {
    input_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireStreamEvent {
    ContentBlockDelta { delta: WireTextDelta },
    MessageStop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireTextDelta {
    #[serde(default)]
    text: String,
}
