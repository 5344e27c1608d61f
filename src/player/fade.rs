//! Deferred background pause after a fade-out
//!
//! Scheduled against the audio clock and fired from `MixSession::tick`.
//! Any contradicting action cancels it, so a stale pause never lands on a
//! session that has moved on.

/// One-shot timer keyed on audio-clock seconds
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FadeTimer {
    due: Option<f64>,
}

impl FadeTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule for `due_at`, replacing any pending deadline
    pub fn arm(&mut self, due_at: f64) {
        self.due = Some(due_at);
    }

    /// Returns whether something was pending
    pub fn cancel(&mut self) -> bool {
        self.due.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    pub fn due_at(&self) -> Option<f64> {
        self.due
    }

    /// Fire once when `now` reaches the deadline
    pub fn poll(&mut self, now: f64) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}
