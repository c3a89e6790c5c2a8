pub mod agent_engine;
pub mod commands;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use crate::agent_engine::engine::AgentEngine;
use crate::config::AppConfig;
use crate::errors::PilotResult;
use crate::executor::input::EnigoInput;
use crate::llm::registry::ProviderRegistry;
use crate::perception::screenshot::PrimaryScreen;
use crate::perception::ui_automation::LiveAccessibility;

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides the
/// default `info` filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Wires the platform collaborators (primary screen, live accessibility
/// tree, enigo input) and the configured active provider into an engine.
pub fn build_engine(config: &AppConfig) -> PilotResult<AgentEngine> {
    let registry = ProviderRegistry::from_config(config)?;
    let provider = registry.get_active()?;
    tracing::info!(
        provider = %provider.name(),
        available = ?registry.list_names(),
        "model provider selected"
    );

    Ok(AgentEngine::new(
        provider,
        Arc::new(PrimaryScreen),
        Arc::new(LiveAccessibility::platform()),
        Arc::new(EnigoInput),
        config.agent.loop_config(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds_an_engine() {
        let engine = build_engine(&AppConfig::default()).unwrap();
        assert_eq!(engine.config().max_steps, 10);
    }

    #[test]
    fn unknown_active_provider_is_a_config_error() {
        let mut config = AppConfig::default();
        config.llm.active_provider = "missing".into();
        assert!(matches!(
            build_engine(&config),
            Err(crate::errors::PilotError::Config(_))
        ));
    }
}
