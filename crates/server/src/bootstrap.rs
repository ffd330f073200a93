use std::sync::Arc;

use helpline_agent::llm::{CompletionError, HttpCompletionClient};
use helpline_agent::{AgentRuntime, ModelChain, ToolExecutor};
use helpline_core::config::{AppConfig, ConfigError};
use helpline_core::domain::agent::{AgentConfig, LanguageMode, SafetyMode};
use helpline_core::store::MemoryStore;
use thiserror::Error;
use tracing::info;

use crate::admission::SessionAdmission;
use crate::api::{ApiState, TracingConversationLogger};

pub struct Application {
    pub config: AppConfig,
    pub api: ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("completion client setup failed: {0}")]
    CompletionClient(#[source] CompletionError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let store = Arc::new(MemoryStore::new());
    seed_store(&store, &config);

    let completions = Arc::new(
        HttpCompletionClient::from_config(&config.llm).map_err(BootstrapError::CompletionClient)?,
    );
    let chain = ModelChain::new(config.llm.model.clone(), &config.llm.fallback_models);

    let runtime = AgentRuntime::new(store, completions, chain, ToolExecutor::new());
    let admission = SessionAdmission::new(config.admission.max_concurrent_sessions);

    info!(
        event_name = "system.bootstrap.ready",
        model = %config.llm.model,
        max_concurrent_sessions = config.admission.max_concurrent_sessions,
        "application wired"
    );

    Ok(Application {
        config,
        api: ApiState {
            runtime: Arc::new(runtime),
            admission,
            logger: Arc::new(TracingConversationLogger),
        },
    })
}

/// Seed agents and FAQs from configuration. An empty seed still yields one
/// usable strict agent so a fresh deployment answers requests.
fn seed_store(store: &MemoryStore, config: &AppConfig) {
    if config.seed.agents.is_empty() {
        store.upsert_agent(default_agent());
    }
    for agent in &config.seed.agents {
        store.upsert_agent(agent.clone());
    }
    for faq in &config.seed.faqs {
        store.add_faq(faq.clone());
    }

    info!(
        event_name = "system.bootstrap.store_seeded",
        agents = config.seed.agents.len().max(1),
        faqs = config.seed.faqs.len(),
        "in-memory config store seeded"
    );
}

fn default_agent() -> AgentConfig {
    AgentConfig {
        agent_id: "default-agent".to_string(),
        name: "Helpline Support".to_string(),
        persona: "You are a polite, concise customer support agent for an online store."
            .to_string(),
        language_mode: LanguageMode::English,
        safety_mode: SafetyMode::Strict,
        confidence_threshold: 0.7,
    }
}
