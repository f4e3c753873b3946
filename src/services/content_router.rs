//! Content-generation routing layer.
//!
//! Abstracts the choice between a text model and a vision model per
//! request, with an ordered fallback chain for provider failures. The
//! router never mutates the request it is given.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::models::{GenerationChunk, GenerationRequest, GenerationResponse};
use crate::domain::ports::{Generator, ProviderError, ProviderResult};

/// Phrases that force vision under the `explicit` strategy (and contribute
/// to `auto`).
const VISION_PHRASES: &[&str] = &[
    "analyze this image",
    "describe the screenshot",
    "describe this image",
    "look at the screenshot",
    "what does this image",
];

/// Tool names that indicate a vision-capable context.
const VISION_TOOLS: &[&str] = &["screenshot", "snapshot", "capture", "browser_screenshot"];

/// Browser-context vocabulary for `auto` routing.
const BROWSER_WORDS: &[&str] = &[
    "webpage", "browser", "ui", "dom", "element", "css", "viewport", "render",
];

/// Screenshot-context vocabulary for `auto` routing.
const SCREENSHOT_WORDS: &[&str] = &["screenshot", "screengrab", "snapshot", "image"];

/// How the router decides between text and vision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingStrategy {
    /// Vision only on an enumerated vision phrase.
    Explicit,
    /// Vision when a vision-related tool is active.
    ToolBased,
    /// Vision on image parts, vision tools, or browser/screenshot vocabulary.
    Auto,
}

impl RoutingStrategy {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "explicit" => Some(Self::Explicit),
            "tool-based" => Some(Self::ToolBased),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

/// Which model class served (or would serve) a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelChoice {
    Text,
    Vision,
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct ContentRouterConfig {
    pub strategy: RoutingStrategy,
    /// Retry once via the text model when a vision call fails. The
    /// opposite direction is never allowed.
    pub fallback_to_text: bool,
}

impl Default for ContentRouterConfig {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategy::Auto,
            fallback_to_text: true,
        }
    }
}

/// Summary of the router's configuration, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct RouterInfo {
    pub strategy: RoutingStrategy,
    pub text_model: String,
    pub vision_model: String,
    pub fallback_models: Vec<String>,
    pub fallback_to_text: bool,
}

/// Routes each generation request to the text or vision generator.
pub struct ContentRouter {
    text: Arc<dyn Generator>,
    vision: Arc<dyn Generator>,
    /// Ordered secondary generators, each tried once on model fallback.
    fallback_chain: Vec<Arc<dyn Generator>>,
    config: ContentRouterConfig,
}

impl ContentRouter {
    pub fn new(
        text: Arc<dyn Generator>,
        vision: Arc<dyn Generator>,
        config: ContentRouterConfig,
    ) -> Self {
        Self {
            text,
            vision,
            fallback_chain: vec![],
            config,
        }
    }

    pub fn with_fallback_chain(mut self, chain: Vec<Arc<dyn Generator>>) -> Self {
        self.fallback_chain = chain;
        self
    }

    /// Decide which model class a request routes to. Pure with respect to
    /// the request.
    pub fn route(&self, request: &GenerationRequest) -> ModelChoice {
        let text = request.text().to_lowercase();
        match self.config.strategy {
            RoutingStrategy::Explicit => {
                if VISION_PHRASES.iter().any(|p| text.contains(p)) {
                    ModelChoice::Vision
                } else {
                    ModelChoice::Text
                }
            }
            RoutingStrategy::ToolBased => {
                if Self::has_vision_tool(request) {
                    ModelChoice::Vision
                } else {
                    ModelChoice::Text
                }
            }
            RoutingStrategy::Auto => {
                let words: Vec<&str> = text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                    .collect();
                let has_vocab = BROWSER_WORDS
                    .iter()
                    .chain(SCREENSHOT_WORDS.iter())
                    .any(|w| words.contains(w));
                if request.has_image_parts() || Self::has_vision_tool(request) || has_vocab {
                    ModelChoice::Vision
                } else {
                    ModelChoice::Text
                }
            }
        }
    }

    fn has_vision_tool(request: &GenerationRequest) -> bool {
        request
            .active_tools
            .iter()
            .any(|t| VISION_TOOLS.contains(&t.to_lowercase().as_str()))
    }

    fn generator_for(&self, choice: ModelChoice) -> &Arc<dyn Generator> {
        match choice {
            ModelChoice::Text => &self.text,
            ModelChoice::Vision => &self.vision,
        }
    }

    /// Generate a response, routing per strategy. A failed vision call is
    /// retried once through the text model when `fallback_to_text` is on.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> ProviderResult<GenerationResponse> {
        let choice = self.route(request);
        match self.generator_for(choice).generate(request).await {
            Ok(response) => Ok(response),
            Err(error) if choice == ModelChoice::Vision && self.config.fallback_to_text => {
                tracing::warn!(
                    error = %error,
                    "Vision model failed; falling back to text model"
                );
                self.text.generate(request).await
            }
            Err(error) => Err(error),
        }
    }

    /// Streaming variant of [`generate`](Self::generate).
    pub async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> ProviderResult<mpsc::Receiver<GenerationChunk>> {
        let choice = self.route(request);
        match self.generator_for(choice).generate_stream(request).await {
            Ok(rx) => Ok(rx),
            Err(error) if choice == ModelChoice::Vision && self.config.fallback_to_text => {
                tracing::warn!(
                    error = %error,
                    "Vision model failed to stream; falling back to text model"
                );
                self.text.generate_stream(request).await
            }
            Err(error) => Err(error),
        }
    }

    /// Force the vision model regardless of strategy.
    pub async fn generate_with_vision(
        &self,
        request: &GenerationRequest,
    ) -> ProviderResult<GenerationResponse> {
        match self.vision.generate(request).await {
            Ok(response) => Ok(response),
            Err(error) if self.config.fallback_to_text => {
                tracing::warn!(
                    error = %error,
                    "Vision model failed; falling back to text model"
                );
                self.text.generate(request).await
            }
            Err(error) => Err(error),
        }
    }

    /// Walk the fallback chain after the primary choice is exhausted: each
    /// secondary generator is tried once, in order.
    pub async fn generate_with_fallback(
        &self,
        request: &GenerationRequest,
    ) -> ProviderResult<GenerationResponse> {
        let mut last_error = ProviderError::Unsupported("empty fallback chain".to_string());
        for generator in &self.fallback_chain {
            tracing::info!(model = generator.model(), "Trying fallback model");
            match generator.generate(request).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    tracing::warn!(
                        model = generator.model(),
                        error = %error,
                        "Fallback model failed"
                    );
                    last_error = error;
                }
            }
        }
        Err(last_error)
    }

    /// Token counting always goes through the text model.
    pub async fn count_tokens(&self, request: &GenerationRequest) -> ProviderResult<u64> {
        self.text.count_tokens(request).await
    }

    /// Embeddings never touch the vision model.
    pub async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        self.text.embed(text).await
    }

    pub fn text_model(&self) -> &str {
        self.text.model()
    }

    pub fn vision_model(&self) -> &str {
        self.vision.model()
    }

    pub fn info(&self) -> RouterInfo {
        RouterInfo {
            strategy: self.config.strategy,
            text_model: self.text.model().to_string(),
            vision_model: self.vision.model().to_string(),
            fallback_models: self
                .fallback_chain
                .iter()
                .map(|g| g.model().to_string())
                .collect(),
            fallback_to_text: self.config.fallback_to_text,
        }
    }
}
