//! Per-session, per-intent tool-failure counting.
//!
//! The counter only moves on tool execution outcomes: incremented on
//! failure, reset on success. Guard blocks and other escalations do not
//! touch it. Two recorded failures force the next request for the same
//! (session, intent) pair to escalate before any tool is attempted.
//!
//! Concurrent requests on the same session share a counter and may race on
//! it; that is an accepted limitation of the session model, not a guarantee.

use std::collections::HashMap;
use std::sync::Mutex;

use helpline_core::domain::intent::Intent;

pub const ESCALATION_FAILURE_THRESHOLD: u32 = 2;

#[derive(Default)]
pub struct FailureTracker {
    counts: Mutex<HashMap<(String, Intent), u32>>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, session_id: &str, intent: Intent) -> u32 {
        let counts = self.counts.lock().expect("failure tracker mutex poisoned");
        counts.get(&(session_id.to_string(), intent)).copied().unwrap_or(0)
    }

    /// Record one tool failure and return the new streak length.
    pub fn record_failure(&self, session_id: &str, intent: Intent) -> u32 {
        let mut counts = self.counts.lock().expect("failure tracker mutex poisoned");
        let entry = counts.entry((session_id.to_string(), intent)).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn reset(&self, session_id: &str, intent: Intent) {
        let mut counts = self.counts.lock().expect("failure tracker mutex poisoned");
        counts.insert((session_id.to_string(), intent), 0);
    }

    pub fn should_escalate(&self, session_id: &str, intent: Intent) -> bool {
        self.count(session_id, intent) >= ESCALATION_FAILURE_THRESHOLD
    }
}
