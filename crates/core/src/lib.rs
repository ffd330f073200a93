//! Domain types and deterministic policy logic for the helpline pipeline.
//!
//! This crate holds everything the decision pipeline needs that does not
//! talk to the network: the closed intent/action/safety enums, agent and
//! tool configuration records, the hallucination guard, keyword FAQ
//! matching, configuration loading, and the store abstraction the external
//! CRUD surface is consumed through.

pub mod config;
pub mod domain;
pub mod errors;
pub mod guard;
pub mod store;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::agent::{AgentConfig, LanguageMode, SafetyMode};
pub use domain::faq::{find_answer, Faq};
pub use domain::intent::{Intent, IntentClassification};
pub use domain::response::{ActionType, AgentResponse, AnswerSource, SafetyStatus, Timing};
pub use domain::tool::{ToolConfig, ToolExecution, ToolName, ToolParameter};
pub use errors::{PipelineError, StoreError};
pub use guard::{GuardVerdict, HallucinationGuard};
pub use store::{default_tool_configs, ConfigStore, MemoryStore};
