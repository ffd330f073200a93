//! Intent classification.
//!
//! Primary path: ask the completion service to label the message and parse
//! the first JSON object out of the reply. Every failure mode, from an
//! unreachable service to an unparsable reply, degrades instead of erroring:
//! a bad reply becomes `{unknown, 0.5}`, an exhausted model chain lands on
//! the deterministic keyword fallback. `classify` therefore never fails.

use std::sync::{Arc, OnceLock};

use helpline_core::domain::agent::LanguageMode;
use helpline_core::domain::intent::{Intent, IntentClassification};
use regex::Regex;
use serde_json::Value;
use tracing::info;

use crate::llm::{CompletionClient, ModelChain};

const CLASSIFICATION_TEMPERATURE: f64 = 0.3;

pub struct IntentClassifier {
    client: Arc<dyn CompletionClient>,
    chain: ModelChain,
}

impl IntentClassifier {
    pub fn new(client: Arc<dyn CompletionClient>, chain: ModelChain) -> Self {
        Self { client, chain }
    }

    pub async fn classify(&self, message: &str, language: LanguageMode) -> IntentClassification {
        let system_prompt = classification_prompt(language);

        match self
            .chain
            .complete(self.client.as_ref(), &system_prompt, message, CLASSIFICATION_TEMPERATURE)
            .await
        {
            Ok(reply) => parse_classification(&reply),
            Err(error) => {
                info!(
                    event_name = "classifier.remote_degraded",
                    error = %error,
                    "completion service unavailable, using keyword fallback"
                );
                keyword_classify(message)
            }
        }
    }
}

fn classification_prompt(language: LanguageMode) -> String {
    format!(
        "You are an intent classifier for a customer support agent. Classify the user message into one of these intents:\n\
         - order_status: User asking about their order location/status\n\
         - create_ticket: User wants to create a support ticket\n\
         - general_query: General questions about products/services\n\
         - greeting: Simple greetings or hello\n\
         - complaint: User is complaining about something\n\
         - refund_request: User wants a refund\n\
         - product_inquiry: Asking about product details\n\
         - account_issue: Problems with their account\n\
         - feedback: Providing feedback\n\
         - abusive: Abusive, offensive, or inappropriate language\n\
         - unknown: Cannot determine intent\n\n\
         Respond ONLY with valid JSON in this exact format:\n\
         {{\n  \"intent\": \"intent_name\",\n  \"confidence\": 0.85,\n  \"reasoning\": \"brief explanation\"\n}}\n\n\
         Language context: {}",
        language.as_str()
    )
}

/// Extract the first JSON object from a completion reply. Anything that is
/// not a well-formed object with the required fields degrades to
/// `{unknown, 0.5, "parse failure"}`.
fn parse_classification(reply: &str) -> IntentClassification {
    let parse_failure =
        || IntentClassification::new(Intent::Unknown, 0.5, "parse failure".to_string());

    let start = match reply.find('{') {
        Some(index) => index,
        None => return parse_failure(),
    };
    let end = match reply.rfind('}') {
        Some(index) if index >= start => index,
        _ => return parse_failure(),
    };

    let parsed: Value = match serde_json::from_str(&reply[start..=end]) {
        Ok(value) => value,
        Err(_) => return parse_failure(),
    };

    let intent_label = match parsed.get("intent").and_then(Value::as_str) {
        Some(label) => label,
        None => return parse_failure(),
    };
    let confidence = match parsed.get("confidence").and_then(Value::as_f64) {
        Some(confidence) => confidence.clamp(0.0, 1.0),
        None => return parse_failure(),
    };
    let reasoning = parsed
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or("model classification")
        .to_string();

    IntentClassification::new(Intent::parse_lenient(intent_label), confidence, reasoning)
}

/// Deterministic keyword fallback, first matching rule wins. The keyword
/// sets cover both English and Hinglish phrasings since the supported
/// traffic is bilingual.
pub fn keyword_classify(message: &str) -> IntentClassification {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return IntentClassification::new(Intent::Unknown, 0.4, "empty message");
    }

    let lower = trimmed.to_lowercase();
    let contains_any =
        |keywords: &[&str]| keywords.iter().any(|keyword| lower.contains(keyword));

    if contains_any(&[
        "fuck", "shit", "bitch", "asshole", "idiot", "stupid", "moron", "bloody useless",
    ]) {
        return IntentClassification::new(Intent::Abusive, 0.9, "abusive language pattern");
    }

    if contains_any(&["hello", "hi there", "hey", "namaste", "good morning", "good evening"])
        || lower == "hi"
    {
        return IntentClassification::new(Intent::Greeting, 0.85, "greeting pattern");
    }

    let order_keywords =
        contains_any(&["order", "parcel", "package", "shipment", "track", "tracking"]);
    if order_keywords {
        let has_order_number = order_number_pattern().is_match(&lower);
        let confidence = if has_order_number { 0.85 } else { 0.65 };
        return IntentClassification::new(Intent::OrderStatus, confidence, "order keyword pattern");
    }

    if contains_any(&["ticket", "support", "complaint", "raise a"]) {
        return IntentClassification::new(Intent::CreateTicket, 0.75, "ticket keyword pattern");
    }

    if contains_any(&["refund", "return", "cancel", "paise wapas", "money back"]) {
        return IntentClassification::new(Intent::RefundRequest, 0.75, "refund keyword pattern");
    }

    if contains_any(&[
        "unacceptable",
        "disappointed",
        "terrible",
        "worst",
        "bad experience",
        "kharab",
        "bura",
        "pathetic",
    ]) {
        return IntentClassification::new(Intent::Complaint, 0.70, "complaint sentiment pattern");
    }

    if contains_any(&["account", "login", "log in", "password", "sign in", "otp"]) {
        return IntentClassification::new(Intent::AccountIssue, 0.70, "account keyword pattern");
    }

    if contains_any(&["product", "item", "price", "size", "colour", "color", "warranty"]) {
        return IntentClassification::new(Intent::ProductInquiry, 0.65, "product keyword pattern");
    }

    if contains_any(&["hours", "policy", "shipping", "deliver", "store", "open", "location"]) {
        return IntentClassification::new(Intent::GeneralQuery, 0.60, "business info pattern");
    }

    IntentClassification::new(Intent::Unknown, 0.45, "no pattern matched")
}

fn order_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d{4,}").expect("order number pattern must compile"))
}
