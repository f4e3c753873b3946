//! Provider adapters: generator implementations and their registry.

pub mod api;
pub mod mock;
pub mod retry;

pub use api::{ApiGenerator, ApiGeneratorConfig};
pub use mock::{MockGenerator, MockReply};
pub use retry::RetryPolicy;

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::ports::{Generator, ProviderError, ProviderResult};

/// Constructor for a generator bound to a concrete model identifier.
pub type GeneratorFactory = Box<dyn Fn(&str) -> ProviderResult<Arc<dyn Generator>> + Send + Sync>;

/// Plain map from provider identifier to generator constructor.
pub struct GeneratorRegistry {
    factories: HashMap<String, GeneratorFactory>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in providers.
    ///
    /// `api_key` is an opaque credential from the environment; only its
    /// presence matters here — an empty key registers the mock provider
    /// as "anthropic" so offline sessions still run.
    pub fn with_builtins(api_key: &str) -> Self {
        let mut registry = Self::new();

        registry.register("mock", |model| {
            Ok(Arc::new(MockGenerator::new(model)) as Arc<dyn Generator>)
        });

        if api_key.is_empty() {
            tracing::warn!("No provider credential present; using mock generators");
            registry.register("anthropic", |model| {
                Ok(Arc::new(MockGenerator::new(model)) as Arc<dyn Generator>)
            });
        } else {
            let key = api_key.to_string();
            registry.register("anthropic", move |model| {
                let config = ApiGeneratorConfig {
                    model: model.to_string(),
                    api_key: key.clone(),
                    ..Default::default()
                };
                Ok(Arc::new(ApiGenerator::new(config)?) as Arc<dyn Generator>)
            });
        }

        registry
    }

    pub fn register<F>(&mut self, provider: impl Into<String>, factory: F)
    where
        F: Fn(&str) -> ProviderResult<Arc<dyn Generator>> + Send + Sync + 'static,
    {
        self.factories.insert(provider.into(), Box::new(factory));
    }

    /// Build a generator for `provider` serving `model`.
    pub fn create(&self, provider: &str, model: &str) -> ProviderResult<Arc<dyn Generator>> {
        let factory = self.factories.get(provider).ok_or_else(|| {
            ProviderError::Unsupported(format!("unknown provider '{}'", provider))
        })?;
        factory(model)
    }

    pub fn available(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
