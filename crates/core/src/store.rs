//! Configuration store abstraction.
//!
//! Agent, tool, and FAQ records are owned by an external CRUD store; the
//! pipeline consumes them read-only through [`ConfigStore`]. The in-process
//! [`MemoryStore`] backs the server and the tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::agent::AgentConfig;
use crate::domain::faq::Faq;
use crate::domain::tool::{ToolConfig, ToolName, ToolParameter};
use crate::errors::StoreError;

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentConfig>, StoreError>;

    /// Look up one tool config. If the agent has no tool configs at all yet,
    /// the two defaults are populated first and the lookup retried.
    async fn get_tool_config(
        &self,
        agent_id: &str,
        name: ToolName,
    ) -> Result<Option<ToolConfig>, StoreError>;

    async fn get_faqs(&self, agent_id: &str) -> Result<Vec<Faq>, StoreError>;
}

/// The tool records seeded for an agent on first use.
pub fn default_tool_configs(agent_id: &str) -> Vec<ToolConfig> {
    vec![
        ToolConfig {
            agent_id: agent_id.to_string(),
            name: ToolName::OrderLookup,
            enabled: true,
            description: "Look up order status and location by order ID".to_string(),
            parameters: vec![ToolParameter {
                name: "orderId".to_string(),
                kind: "string".to_string(),
                required: true,
                description: "Order number to lookup (e.g., 1234)".to_string(),
            }],
        },
        ToolConfig {
            agent_id: agent_id.to_string(),
            name: ToolName::CreateTicket,
            enabled: true,
            description: "Create a customer support ticket".to_string(),
            parameters: vec![
                ToolParameter {
                    name: "category".to_string(),
                    kind: "string".to_string(),
                    required: true,
                    description: "Ticket category (e.g., refund, account, product)".to_string(),
                },
                ToolParameter {
                    name: "description".to_string(),
                    kind: "string".to_string(),
                    required: true,
                    description: "Issue description (min 10 characters)".to_string(),
                },
            ],
        },
    ]
}

#[derive(Default)]
struct MemoryState {
    agents: HashMap<String, AgentConfig>,
    tools: HashMap<(String, ToolName), ToolConfig>,
    faqs: Vec<Faq>,
}

/// In-memory store. Interior mutability keeps the trait object shareable
/// across request tasks; the mutex only guards short map operations.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_agent(&self, agent: AgentConfig) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.agents.insert(agent.agent_id.clone(), agent);
    }

    pub fn upsert_tool_config(&self, tool: ToolConfig) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.tools.insert((tool.agent_id.clone(), tool.name), tool);
    }

    pub fn add_faq(&self, faq: Faq) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.faqs.push(faq);
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentConfig>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.agents.get(agent_id).cloned())
    }

    async fn get_tool_config(
        &self,
        agent_id: &str,
        name: ToolName,
    ) -> Result<Option<ToolConfig>, StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");

        let has_any = state.tools.keys().any(|(id, _)| id == agent_id);
        if !has_any {
            for tool in default_tool_configs(agent_id) {
                state.tools.entry((agent_id.to_string(), tool.name)).or_insert(tool);
            }
        }

        Ok(state.tools.get(&(agent_id.to_string(), name)).cloned())
    }

    async fn get_faqs(&self, agent_id: &str) -> Result<Vec<Faq>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.faqs.iter().filter(|faq| faq.agent_id == agent_id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigStore, MemoryStore};
    use crate::domain::faq::Faq;
    use crate::domain::tool::ToolName;

    #[tokio::test]
    async fn unknown_agent_is_absent_not_an_error() {
        let store = MemoryStore::new();
        assert!(store.get_agent("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_tool_lookup_populates_both_defaults() {
        let store = MemoryStore::new();

        let lookup = store.get_tool_config("default-agent", ToolName::OrderLookup).await.unwrap();
        let lookup = lookup.expect("default order_lookup config");
        assert!(lookup.enabled);
        assert_eq!(lookup.parameters.len(), 1);

        let ticket = store.get_tool_config("default-agent", ToolName::CreateTicket).await.unwrap();
        let ticket = ticket.expect("default create_ticket config");
        assert_eq!(ticket.parameters.len(), 2);
    }

    #[tokio::test]
    async fn explicit_tool_config_survives_default_population() {
        let store = MemoryStore::new();
        let mut disabled = super::default_tool_configs("default-agent").remove(0);
        disabled.enabled = false;
        store.upsert_tool_config(disabled);

        // Population only fills gaps; the explicit record wins.
        let lookup = store.get_tool_config("default-agent", ToolName::OrderLookup).await.unwrap();
        assert!(!lookup.expect("configured tool").enabled);
    }

    #[tokio::test]
    async fn faqs_are_scoped_by_agent() {
        let store = MemoryStore::new();
        store.add_faq(Faq {
            agent_id: "a".to_string(),
            question: "What is your return policy?".to_string(),
            answer: "30 days.".to_string(),
        });
        store.add_faq(Faq {
            agent_id: "b".to_string(),
            question: "Do you ship internationally?".to_string(),
            answer: "Yes.".to_string(),
        });

        let faqs = store.get_faqs("a").await.unwrap();
        assert_eq!(faqs.len(), 1);
        assert_eq!(faqs[0].agent_id, "a");
    }
}
