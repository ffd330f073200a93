use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::intent::Intent;
use crate::domain::tool::ToolExecution;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Answer,
    ToolCall,
    Escalate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Faq,
    Tool,
    Generated,
    Escalated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyStatus {
    Safe,
    Blocked,
    Escalated,
}

/// Per-stage latency breakdown, measured in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    #[serde(rename = "intentClassification")]
    pub intent_classification_ms: u64,
    #[serde(rename = "toolExecution", skip_serializing_if = "Option::is_none")]
    pub tool_execution_ms: Option<u64>,
    #[serde(rename = "answerGeneration")]
    pub answer_generation_ms: u64,
    #[serde(rename = "total")]
    pub total_ms: u64,
}

/// The sole externally observed artifact of one pipeline run.
///
/// Invariant: `hallucination_blocked` implies `safety_status == Blocked` and
/// `action == Escalate`. Constructed only through the orchestrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub intent: Intent,
    pub confidence: f64,
    pub action: ActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_execution: Option<ToolExecution>,
    pub answer: String,
    pub answer_source: AnswerSource,
    pub safety_status: SafetyStatus,
    pub hallucination_blocked: bool,
    pub timing: Timing,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl AgentResponse {
    /// Standard escalation shape shared by every gate in the pipeline. The
    /// machine-readable reason travels in `metadata.escalationReason`.
    pub fn escalation(intent: Intent, confidence: f64, reason: &str, timing: Timing) -> Self {
        Self {
            intent,
            confidence,
            action: ActionType::Escalate,
            tool_execution: None,
            answer: "I need to connect you with a human agent for better assistance.".to_string(),
            answer_source: AnswerSource::Escalated,
            safety_status: SafetyStatus::Escalated,
            hallucination_blocked: false,
            timing,
            metadata: Some(serde_json::json!({ "escalationReason": reason })),
        }
    }

    pub fn escalation_reason(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("escalationReason")?.as_str()
    }
}
