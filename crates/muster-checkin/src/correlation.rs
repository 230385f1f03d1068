//! In-memory correlation state: which outstanding prompt maps to which date,
//! and which users owe a follow-up reply.
//!
//! Owned and injectable — constructed fresh per orchestrator (and per test),
//! never global. Each operation is a single critical section, so two
//! concurrent reactions from the same user cannot interleave an
//! open/overwrite.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

use muster_core::types::MessageId;

/// A detail request awaiting the user's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFollowUp {
    pub user_id: String,
    /// Outbound id of the detail prompt DM; the reply must quote it.
    pub token: MessageId,
    /// The status chosen by the reaction that opened this follow-up.
    pub status: String,
    pub date: NaiveDate,
}

#[derive(Default)]
struct Inner {
    /// Outstanding prompt id → the date it mustered. Entries are never
    /// expired: a reaction to a days-old prompt is a valid late check-in
    /// for that prompt's original date.
    prompts: HashMap<MessageId, NaiveDate>,
    /// At most one pending follow-up per user.
    pending: HashMap<String, PendingFollowUp>,
}

/// The correlation store.
#[derive(Default)]
pub struct CorrelationStore {
    inner: Mutex<Inner>,
}

impl CorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly posted daily prompt.
    pub fn register_prompt(&self, prompt_id: MessageId, date: NaiveDate) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.prompts.insert(prompt_id, date);
    }

    /// The date a prompt mustered, or `None` when the message is not a
    /// check-in prompt at all.
    pub fn resolve_prompt_date(&self, prompt_id: MessageId) -> Option<NaiveDate> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.prompts.get(&prompt_id).copied()
    }

    /// Open a follow-up for `user_id`, silently replacing any earlier one.
    /// Last reaction wins; the replaced entry's token can no longer finalize
    /// anything. The replaced entry is returned for the caller's logs.
    pub fn open_follow_up(
        &self,
        user_id: &str,
        token: MessageId,
        status: &str,
        date: NaiveDate,
    ) -> Option<PendingFollowUp> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pending.insert(
            user_id.to_string(),
            PendingFollowUp {
                user_id: user_id.to_string(),
                token,
                status: status.to_string(),
                date,
            },
        )
    }

    /// Consume the pending follow-up for `user_id` regardless of what the
    /// reply quotes. Matching on "any DM from this user" swallows unrelated
    /// messages; prefer [`take_follow_up_quoting`](Self::take_follow_up_quoting).
    pub fn take_follow_up(&self, user_id: &str) -> Option<PendingFollowUp> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pending.remove(user_id)
    }

    /// Consume the pending follow-up for `user_id` only when the reply quotes
    /// the expected token. A reply that quotes nothing, or quotes some other
    /// message, is not a match and leaves the entry in place.
    pub fn take_follow_up_quoting(
        &self,
        user_id: &str,
        token: MessageId,
    ) -> Option<PendingFollowUp> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.pending.get(user_id) {
            Some(pending) if pending.token == token => inner.pending.remove(user_id),
            _ => None,
        }
    }

    /// Snapshot of the pending follow-up for a user, if any.
    pub fn pending_for(&self, user_id: &str) -> Option<PendingFollowUp> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pending.get(user_id).cloned()
    }
}
