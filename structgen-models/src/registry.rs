//! Resolving `provider:modelTag` identifiers to models.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ModelError, ModelResult};
use crate::model::{BoxedModel, Model};

/// A parsed `provider:modelTag` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelId {
    /// Provider, e.g. `openai`.
    pub provider: String,
    /// Model tag within the provider, e.g. `gpt-4o-mini`.
    pub tag: String,
}

impl ModelId {
    /// Create an identifier.
    pub fn new(provider: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            tag: tag.into(),
        }
    }
}

impl FromStr for ModelId {
    type Err = ModelError;

    /// Parse `provider:modelTag`; a bare tag is taken as an OpenAI model.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (provider, tag) = s.split_once(':').unwrap_or(("openai", s));
        if provider.is_empty() || tag.is_empty() {
            return Err(ModelError::configuration(format!(
                "invalid model identifier '{s}', expected provider:modelTag"
            )));
        }
        Ok(Self::new(provider.to_ascii_lowercase(), tag))
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.tag)
    }
}

/// Builds a model for a tag of one provider.
pub type ProviderFactory = Arc<dyn Fn(&str) -> ModelResult<BoxedModel> + Send + Sync>;

/// Read-only lookup from identifiers to models.
///
/// Explicitly registered models win over provider factories.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, BoxedModel>,
    providers: HashMap<String, ProviderFactory>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut models: Vec<_> = self.models.keys().collect();
        models.sort();
        let mut providers: Vec<_> = self.providers.keys().collect();
        providers.sort();
        f.debug_struct("ModelRegistry")
            .field("models", &models)
            .field("providers", &providers)
            .finish()
    }
}

impl ModelRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in providers.
    #[must_use]
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "openai")]
        {
            registry = registry.with_provider("openai", |tag| {
                let model = crate::openai::OpenAIChatModel::from_env(tag)?;
                Ok(Arc::new(model) as BoxedModel)
            });
        }
        registry
    }

    /// Register a model under its own identifier.
    #[must_use]
    pub fn with_model(self, model: impl Model + 'static) -> Self {
        self.with_shared_model(Arc::new(model))
    }

    /// Register a shared model under its own identifier.
    #[must_use]
    pub fn with_shared_model(mut self, model: BoxedModel) -> Self {
        self.models.insert(model.identifier(), model);
        self
    }

    /// Register a model under an explicit identifier.
    pub fn with_alias(mut self, id: &str, model: BoxedModel) -> ModelResult<Self> {
        let id: ModelId = id.parse()?;
        self.models.insert(id.to_string(), model);
        Ok(self)
    }

    /// Register a provider factory.
    #[must_use]
    pub fn with_provider<F>(mut self, provider: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&str) -> ModelResult<BoxedModel> + Send + Sync + 'static,
    {
        self.providers
            .insert(provider.into().to_ascii_lowercase(), Arc::new(factory));
        self
    }

    /// Resolve an identifier.
    pub fn resolve(&self, id: &str) -> ModelResult<BoxedModel> {
        let id: ModelId = id.parse()?;
        if let Some(model) = self.models.get(&id.to_string()) {
            return Ok(Arc::clone(model));
        }
        match self.providers.get(&id.provider) {
            Some(factory) => factory(&id.tag),
            None => Err(ModelError::NotFound(format!(
                "no model or provider registered for '{id}'"
            ))),
        }
    }

    /// Whether the identifier resolves without building anything.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        id.parse::<ModelId>()
            .map(|id| self.models.contains_key(&id.to_string()) || self.providers.contains_key(&id.provider))
            .unwrap_or(false)
    }
}

/// Resolve an identifier with the built-in providers.
///
/// ```rust,ignore
/// let model = structgen_models::infer_model("openai:gpt-4o-mini")?;
/// ```
pub fn infer_model(id: &str) -> ModelResult<BoxedModel> {
    ModelRegistry::with_defaults().resolve(id)
}
