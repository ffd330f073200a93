use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The two tools the executor knows how to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    OrderLookup,
    CreateTicket,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderLookup => "order_lookup",
            Self::CreateTicket => "create_ticket",
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub kind: String,
    pub required: bool,
    pub description: String,
}

/// Per-agent tool record. The pipeline only checks `enabled` before invoking
/// a tool; the description and parameter list exist for the admin surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub agent_id: String,
    pub name: ToolName,
    pub enabled: bool,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

/// Outcome of one tool invocation, success or failure, with observed latency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecution {
    pub tool_name: String,
    pub arguments: Value,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

impl ToolExecution {
    pub fn succeeded(tool_name: &str, arguments: Value, result: Value, latency_ms: u64) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            arguments,
            success: true,
            result: Some(result),
            error: None,
            latency_ms,
        }
    }

    pub fn failed(
        tool_name: &str,
        arguments: Value,
        error: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            arguments,
            success: false,
            result: None,
            error: Some(error.into()),
            latency_ms,
        }
    }
}
