//! Mock generator for testing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::models::{GenerationChunk, GenerationRequest, GenerationResponse};
use crate::domain::ports::{Generator, ProviderError, ProviderResult};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Success(String),
    Failure(ProviderError),
}

/// Mock generator with scripted replies.
///
/// Replies are consumed in order; once the script is exhausted the default
/// reply is returned forever. `MockGenerator::failing_then_success(n, ..)`
/// builds the fail-n-times-then-succeed shape the retry tests need.
pub struct MockGenerator {
    name: String,
    model: String,
    script: Mutex<Vec<MockReply>>,
    default_reply: MockReply,
    calls: AtomicU64,
    delay: Option<std::time::Duration>,
}

impl MockGenerator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            name: "mock".to_string(),
            model: model.into(),
            script: Mutex::new(vec![]),
            default_reply: MockReply::Success("Mock task completed successfully.".to_string()),
            calls: AtomicU64::new(0),
            delay: None,
        }
    }

    pub fn with_default_reply(mut self, reply: MockReply) -> Self {
        self.default_reply = reply;
        self
    }

    /// Simulate generation latency.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Always succeed with the given text.
    pub fn succeeding(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(model).with_default_reply(MockReply::Success(text.into()))
    }

    /// Always fail with the given error.
    pub fn failing(model: impl Into<String>, error: ProviderError) -> Self {
        Self::new(model).with_default_reply(MockReply::Failure(error))
    }

    /// Fail `failures` times with a transient error, then succeed forever.
    pub fn failing_then_success(
        model: impl Into<String>,
        failures: usize,
        text: impl Into<String>,
    ) -> Self {
        let generator = Self::succeeding(model, text);
        {
            let mut script = generator.script.lock().unwrap_or_else(|e| e.into_inner());
            for _ in 0..failures {
                script.push(MockReply::Failure(ProviderError::ServerError(
                    503,
                    "mock overload".to_string(),
                )));
            }
        }
        generator
    }

    /// Queue an explicit reply.
    pub fn push_reply(&self, reply: MockReply) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(reply);
    }

    /// Number of `generate` calls observed so far.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> MockReply {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        if script.is_empty() {
            self.default_reply.clone()
        } else {
            script.remove(0)
        }
    }
}

#[async_trait]
impl Generator for MockGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<GenerationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_reply() {
            MockReply::Success(text) => Ok(GenerationResponse {
                text,
                model: request.model.clone().unwrap_or_else(|| self.model.clone()),
                input_tokens: (request.text().len() / 4) as u64,
                output_tokens: 50,
                stop_reason: Some("end_turn".to_string()),
            }),
            MockReply::Failure(error) => Err(error),
        }
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> ProviderResult<mpsc::Receiver<GenerationChunk>> {
        let response = self.generate(request).await?;
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for word in response.text.split_whitespace() {
                let _ = tx
                    .send(GenerationChunk {
                        delta: format!("{} ", word),
                        done: false,
                    })
                    .await;
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
        Ok((request.text().len() / 4) as u64)
    }

    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        // Deterministic toy embedding, good enough for routing tests.
        let mut v = vec![0.0f32; 8];
        for (i, b) in text.bytes().enumerate() {
            v[i % 8] += f32::from(b) / 255.0;
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_success() {
        let generator = MockGenerator::new("mock-model");
        let response = generator
            .generate(&GenerationRequest::from_text("hello"))
            .await
            .unwrap();
        assert!(response.text.contains("completed"));
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_then_success() {
        let generator = MockGenerator::failing_then_success("m", 2, "done");
        let request = GenerationRequest::from_text("go");

        assert!(generator.generate(&request).await.is_err());
        assert!(generator.generate(&request).await.is_err());
        let response = generator.generate(&request).await.unwrap();
        assert_eq!(response.text, "done");
        assert_eq!(generator.call_count(), 3);
    }

    #[tokio::test]
    async fn test_streaming_chunks_end_with_done() {
        let generator = MockGenerator::succeeding("m", "a b c");
        let mut rx = generator
            .generate_stream(&GenerationRequest::from_text("x"))
            .await
            .unwrap();

        let mut chunks = vec![];
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        assert!(chunks.len() >= 2);
        assert!(chunks.last().unwrap().done);
    }
}
