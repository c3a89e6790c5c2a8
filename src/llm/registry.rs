use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Adapter, AppConfig, ProviderEntry};
use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::ollama::OllamaProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;

/// Registry of all available model providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
}

impl ProviderRegistry {
    pub fn new(active: String) -> Self {
        Self {
            providers: HashMap::new(),
            active,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> PilotResult<Arc<dyn LlmProvider>> {
        self.providers
            .get(&self.active)
            .cloned()
            .ok_or_else(|| PilotError::Config(format!("Active provider '{}' not found in registry", self.active)))
    }

    pub fn set_active(&mut self, name: String) -> PilotResult<()> {
        if self.providers.contains_key(&name) {
            self.active = name;
            Ok(())
        } else {
            Err(PilotError::Config(format!("Provider '{name}' not registered")))
        }
    }

    pub fn active_name(&self) -> &str {
        &self.active
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build a registry from the loaded app config.
    /// API keys are read from environment variables named `VISIONPILOT_<ID>_API_KEY`,
    /// falling back to the `api_key` stored in config.toml.
    pub fn from_config(config: &AppConfig) -> PilotResult<Self> {
        let mut registry = Self::new(config.llm.active_provider.clone());
        for (id, entry) in &config.llm.providers {
            let provider = build_provider(id, entry, resolve_api_key(id, entry))?;
            tracing::debug!(provider = %id, adapter = ?entry.adapter, model = %entry.model, "provider registered");
            registry.register(provider);
        }
        Ok(registry)
    }
}

fn resolve_api_key(id: &str, entry: &ProviderEntry) -> Option<String> {
    std::env::var(api_key_var(id))
        .ok()
        .filter(|k| !k.is_empty())
        .or_else(|| entry.api_key.clone())
}

fn api_key_var(id: &str) -> String {
    format!("VISIONPILOT_{}_API_KEY", id.to_uppercase())
}

fn build_provider(id: &str, entry: &ProviderEntry, api_key: Option<String>) -> PilotResult<Arc<dyn LlmProvider>> {
    let timeout = Duration::from_secs(entry.timeout_secs);
    Ok(match entry.adapter {
        Adapter::Ollama => Arc::new(OllamaProvider::new(
            id.to_string(),
            entry.api_base.clone(),
            entry.model.clone(),
            api_key,
            timeout,
        )?),
        Adapter::Openai => Arc::new(OpenAiCompatibleProvider::new(
            id.to_string(),
            entry.api_base.clone(),
            entry.model.clone(),
            api_key.unwrap_or_default(),
            timeout,
        )?),
    })
}
