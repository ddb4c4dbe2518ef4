// Timed confirm/cancel prompts keyed by the interaction that opened them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::lock;
use crate::metrics;
use crate::store::models::{CharacterChoice, TeamMember};

/// Window for register and team confirmations.
pub const CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

/// What a confirmation commits when accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmKind {
    Register {
        choice: CharacterChoice,
        username: String,
    },
    CreateTeam {
        name: String,
        leader: TeamMember,
    },
    DeleteTeam {
        team_id: String,
        name: String,
    },
}

impl ConfirmKind {
    /// Command the user re-runs after expiry.
    pub fn command(&self) -> &'static str {
        match self {
            ConfirmKind::Register { .. } => "register",
            ConfirmKind::CreateTeam { .. } => "teams create",
            ConfirmKind::DeleteTeam { .. } => "teams delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingConfirmation {
    pub requester: String,
    pub kind: ConfirmKind,
    pub deadline: Instant,
    /// Interaction token, used to edit the prompt once it expires.
    pub token: String,
}

/// Outcome of a button press against the book.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Confirmed(PendingConfirmation),
    Cancelled(PendingConfirmation),
    Expired(PendingConfirmation),
    /// Someone other than the requester pressed; nothing changes.
    Ignored,
    /// No prompt under this correlation id (already settled or never opened).
    Unknown,
}

/// Thread-safe table of outstanding confirmations.
#[derive(Debug, Clone)]
pub struct ConfirmationBook {
    inner: Arc<Mutex<HashMap<String, PendingConfirmation>>>,
}

impl ConfirmationBook {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a prompt. A second prompt under the same correlation replaces
    /// the first.
    pub fn open(
        &self,
        correlation: &str,
        requester: &str,
        kind: ConfirmKind,
        token: &str,
        now: Instant,
    ) -> Instant {
        let deadline = now + CONFIRM_TIMEOUT;
        let mut book = lock(&self.inner);
        book.insert(
            correlation.to_string(),
            PendingConfirmation {
                requester: requester.to_string(),
                kind,
                deadline,
                token: token.to_string(),
            },
        );
        metrics::PENDING_CONFIRMATIONS.set(book.len() as i64);
        deadline
    }

    /// Resolve a confirm (`accept = true`) or cancel press.
    pub fn settle(
        &self,
        correlation: &str,
        user_id: &str,
        accept: bool,
        now: Instant,
    ) -> Settlement {
        let mut book = lock(&self.inner);
        let Some(pending) = book.get(correlation) else {
            return Settlement::Unknown;
        };
        let expired = now >= pending.deadline;
        if !expired && pending.requester != user_id {
            return Settlement::Ignored;
        }
        let Some(pending) = book.remove(correlation) else {
            return Settlement::Unknown;
        };
        metrics::PENDING_CONFIRMATIONS.set(book.len() as i64);
        if expired {
            metrics::EXPIRED_FLOWS_TOTAL
                .with_label_values(&["confirmation"])
                .inc();
            Settlement::Expired(pending)
        } else if accept {
            Settlement::Confirmed(pending)
        } else {
            Settlement::Cancelled(pending)
        }
    }

    /// Drop every prompt past its deadline, returning them for notification.
    pub fn sweep_expired(&self, now: Instant) -> Vec<(String, PendingConfirmation)> {
        let mut book = lock(&self.inner);
        let expired: Vec<String> = book
            .iter()
            .filter(|(_, p)| now >= p.deadline)
            .map(|(k, _)| k.clone())
            .collect();
        let out: Vec<_> = expired
            .into_iter()
            .filter_map(|k| book.remove(&k).map(|p| (k, p)))
            .collect();
        if !out.is_empty() {
            metrics::PENDING_CONFIRMATIONS.set(book.len() as i64);
            metrics::EXPIRED_FLOWS_TOTAL
                .with_label_values(&["confirmation"])
                .inc_by(out.len() as u64);
        }
        out
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConfirmationBook {
    fn default() -> Self {
        Self::new()
    }
}
