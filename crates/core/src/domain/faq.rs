use serde::{Deserialize, Serialize};

/// One curated question/answer pair owned by an agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faq {
    pub agent_id: String,
    pub question: String,
    pub answer: String,
}

/// Keyword-overlap FAQ lookup.
///
/// A FAQ question is reduced to its keywords (whitespace tokens longer than
/// three characters, lowercased). It matches when at least half of them,
/// rounded up, appear as substrings of the lowercased message. The first
/// match in stored order wins; no match is not an error.
pub fn find_answer<'a>(faqs: &'a [Faq], message: &str) -> Option<&'a Faq> {
    let message_lower = message.to_lowercase();

    faqs.iter().find(|faq| {
        let question_lower = faq.question.to_lowercase();
        let keywords: Vec<&str> =
            question_lower.split_whitespace().filter(|token| token.len() > 3).collect();
        if keywords.is_empty() {
            return false;
        }

        let matched = keywords.iter().filter(|keyword| message_lower.contains(**keyword)).count();
        matched >= keywords.len().div_ceil(2)
    })
}
