use serde::{Deserialize, Serialize};

/// Closed set of intent categories the classifier can produce.
///
/// Kept exhaustive on purpose: action determination matches on every variant
/// so a new intent cannot silently fall through to a default branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    OrderStatus,
    CreateTicket,
    GeneralQuery,
    Greeting,
    Complaint,
    RefundRequest,
    ProductInquiry,
    AccountIssue,
    Feedback,
    Abusive,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderStatus => "order_status",
            Self::CreateTicket => "create_ticket",
            Self::GeneralQuery => "general_query",
            Self::Greeting => "greeting",
            Self::Complaint => "complaint",
            Self::RefundRequest => "refund_request",
            Self::ProductInquiry => "product_inquiry",
            Self::AccountIssue => "account_issue",
            Self::Feedback => "feedback",
            Self::Abusive => "abusive",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a model-supplied intent label. Labels outside the closed set map
    /// to `Unknown` so a creative model reply degrades instead of erroring.
    pub fn parse_lenient(label: &str) -> Self {
        match label.trim() {
            "order_status" => Self::OrderStatus,
            "create_ticket" => Self::CreateTicket,
            "general_query" => Self::GeneralQuery,
            "greeting" => Self::Greeting,
            "complaint" => Self::Complaint,
            "refund_request" => Self::RefundRequest,
            "product_inquiry" => Self::ProductInquiry,
            "account_issue" => Self::AccountIssue,
            "feedback" => Self::Feedback,
            "abusive" => Self::Abusive,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classification outcome. Produced once per request and discarded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    pub intent: Intent,
    pub confidence: f64,
    pub reasoning: Option<String>,
}

impl IntentClassification {
    pub fn new(intent: Intent, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self { intent, confidence, reasoning: Some(reasoning.into()) }
    }
}
