//! Decision engine for helpline agents.
//!
//! [`runtime::AgentRuntime`] drives one message through classification,
//! safety gates, simulated tools, and answer generation. The model side is
//! abstracted behind [`llm::CompletionClient`] so the whole pipeline runs
//! against scripted doubles in tests.

pub mod classifier;
pub mod failures;
pub mod llm;
pub mod runtime;
pub mod tools;

pub use classifier::IntentClassifier;
pub use failures::FailureTracker;
pub use llm::{CompletionClient, CompletionError, HttpCompletionClient, ModelChain};
pub use runtime::{determine_action, AgentRuntime};
pub use tools::{ThreadRngSim, ToolExecutor, ToolSim};
