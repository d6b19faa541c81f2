//! Provider router — selects the model provider based on config.
//!
//! Handles provider creation and hands out the chat, transcription and
//! vision capabilities of the configured default.

use std::collections::HashMap;
use std::sync::Arc;
use medintake_core::media::{ImageDescriber, Transcriber};
use medintake_core::provider::Provider;
use crate::openai_compat::OpenAiCompatProvider;

/// Routes model requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    compat: HashMap<String, Arc<OpenAiCompatProvider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            compat: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a chat-only provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Register an OpenAI-compatible provider, including its media endpoints.
    pub fn register_compat(&mut self, name: impl Into<String>, provider: Arc<OpenAiCompatProvider>) {
        let name = name.into();
        self.providers.insert(name.clone(), provider.clone());
        self.compat.insert(name, provider);
    }

    /// Get the default provider.
    pub fn default_provider(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Speech-to-text from the default provider, if it has one.
    pub fn transcriber(&self) -> Option<Arc<dyn Transcriber>> {
        self.compat
            .get(&self.default_provider)
            .map(|p| p.clone() as Arc<dyn Transcriber>)
    }

    /// Image understanding from the default provider, if it has one.
    pub fn describer(&self) -> Option<Arc<dyn ImageDescriber>> {
        self.compat
            .get(&self.default_provider)
            .map(|p| p.clone() as Arc<dyn ImageDescriber>)
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration.
pub fn build_from_config(config: &medintake_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);
    let vision_model = &config.preprocess.vision_model;
    let vision_max_tokens = config.preprocess.vision_max_tokens;

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));

        let provider = OpenAiCompatProvider::new(name, &base_url, &api_key)
            .with_vision(vision_model, vision_max_tokens);
        router.register_compat(name.clone(), Arc::new(provider));
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        let base_url = default_base_url(&config.default_provider);
        let provider = OpenAiCompatProvider::new(&config.default_provider, &base_url, &api_key)
            .with_vision(vision_model, vision_max_tokens);
        router.register_compat(config.default_provider.clone(), Arc::new(provider));
    }

    router
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "groq" => "https://api.groq.com/openai/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
