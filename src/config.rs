use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent_engine::action::ActionProtocol;
use crate::agent_engine::state::LoopConfig;
use crate::errors::{PilotError, PilotResult};

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub active_provider: String,
    pub providers: HashMap<String, ProviderEntry>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert("ollama".to_string(), ProviderEntry::default());
        Self {
            active_provider: "ollama".to_string(),
            providers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    /// Full endpoint URL (e.g. `http://localhost:11434/api/chat`).
    pub api_base: String,
    pub model: String,
    #[serde(default)]
    pub adapter: Adapter,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Optional API key stored in config.toml (falls back to env var VISIONPILOT_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ProviderEntry {
    fn default() -> Self {
        Self {
            display_name: "Ollama (local)".to_string(),
            api_base: "http://localhost:11434/api/chat".to_string(),
            model: "llava".to_string(),
            adapter: Adapter::Ollama,
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

/// Wire format spoken by a provider endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Adapter {
    #[default]
    Ollama,
    #[serde(alias = "openai_compatible")]
    Openai,
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub protocol: ActionProtocol,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Pause before each screen capture.
    #[serde(default = "default_capture_delay_ms")]
    pub capture_delay_ms: u64,
    /// Pause after each dispatch so the UI can finish rendering.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            protocol: ActionProtocol::default(),
            max_steps: default_max_steps(),
            capture_delay_ms: default_capture_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl AgentConfig {
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            protocol: self.protocol,
            max_steps: self.max_steps,
            capture_delay: Duration::from_millis(self.capture_delay_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }
}

fn default_max_steps() -> u32 {
    10
}

fn default_capture_delay_ms() -> u64 {
    250
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(CONFIG_FILE);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Some(candidate);
            }
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        let candidate = cwd.join(CONFIG_FILE);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in working directory");
            return Some(candidate);
        }
    }

    let candidate = dirs::config_dir()?.join("visionpilot").join(CONFIG_FILE);
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in user config dir");
        return Some(candidate);
    }
    None
}

/// Loads `config.toml` from the usual search locations, or the built-in
/// defaults when none exists.
pub fn load_config() -> PilotResult<AppConfig> {
    match resolve_config_path() {
        Some(path) => load_config_from(&path),
        None => {
            tracing::warn!("config.toml not found; using built-in defaults");
            Ok(AppConfig::default())
        }
    }
}

pub fn load_config_from(path: &Path) -> PilotResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    if !config.llm.providers.contains_key(&config.llm.active_provider) {
        return Err(PilotError::Config(format!(
            "active provider '{}' has no [llm.providers.{}] entry",
            config.llm.active_provider, config.llm.active_provider
        )));
    }
    tracing::info!(
        path = %path.display(),
        provider = %config.llm.active_provider,
        protocol = ?config.agent.protocol,
        "config loaded"
    );
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> PilotResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
