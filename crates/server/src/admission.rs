//! Bounded-concurrency session admission.
//!
//! At most `capacity` distinct sessions may be in flight at once. A session
//! that is already active is always re-admitted so a second request on the
//! same session cannot deadlock against its own slot.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionDenied {
    pub active: usize,
    pub capacity: usize,
}

#[derive(Debug)]
pub struct SessionAdmission {
    capacity: usize,
    active: Mutex<HashSet<String>>,
}

impl SessionAdmission {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self { capacity, active: Mutex::new(HashSet::new()) })
    }

    /// Admit `session_id` or refuse with the current occupancy. The returned
    /// permit releases the slot when dropped, on every exit path.
    pub fn admit(self: &Arc<Self>, session_id: &str) -> Result<AdmissionPermit, AdmissionDenied> {
        let mut active = self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if active.contains(session_id) {
            // Re-admission: the earlier request owns the slot, this permit
            // must not free it.
            return Ok(AdmissionPermit { admission: Arc::clone(self), owned_session: None });
        }

        if active.len() >= self.capacity {
            return Err(AdmissionDenied { active: active.len(), capacity: self.capacity });
        }

        active.insert(session_id.to_string());
        Ok(AdmissionPermit {
            admission: Arc::clone(self),
            owned_session: Some(session_id.to_string()),
        })
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

#[derive(Debug)]
pub struct AdmissionPermit {
    admission: Arc<SessionAdmission>,
    owned_session: Option<String>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        if let Some(session_id) = self.owned_session.take() {
            let mut active = self
                .admission
                .active
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            active.remove(&session_id);
        }
    }
}
