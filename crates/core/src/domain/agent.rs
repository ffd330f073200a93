use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageMode {
    English,
    Hinglish,
}

impl LanguageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Hinglish => "hinglish",
        }
    }
}

/// Strict agents answer only from verified sources (FAQ, tool output).
/// Balanced agents may free-generate but must cite where the answer came
/// from, with the citation repaired by the orchestrator when missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyMode {
    Strict,
    Balanced,
}

impl SafetyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Balanced => "balanced",
        }
    }
}

/// Per-agent settings, owned by the configuration store. The pipeline reads
/// one of these per request and never mutates it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub name: String,
    pub persona: String,
    pub language_mode: LanguageMode,
    pub safety_mode: SafetyMode,
    /// Exclusive lower bound on classifier confidence; below it the request
    /// escalates. Valid range 0.5..=0.9.
    pub confidence_threshold: f64,
}
