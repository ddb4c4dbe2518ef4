// Scoring-panel locks: at most one operator per team, one team per operator.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

use super::lock;
use crate::metrics;

/// A held scoring session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSession {
    pub team_id: String,
    pub operator: String,
    /// Interaction id that opened the panel; stale controls carry another.
    pub correlation: String,
    /// Token of the opening interaction, for editing the panel out of band.
    pub token: String,
    pub last_activity: Instant,
    /// Showing the knock-down member picker instead of the controls.
    pub knock_select: bool,
}

/// Why a session could not be entered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("This team is already being managed by <@{0}>")]
    HeldByOther(String),

    #[error("You are already managing a team")]
    AlreadyManaging(String),
}

#[derive(Debug, Default)]
struct Locks {
    by_team: HashMap<String, PanelSession>,
    by_operator: HashMap<String, String>,
}

impl Locks {
    fn publish_gauge(&self) {
        metrics::ACTIVE_PANEL_SESSIONS.set(self.by_team.len() as i64);
    }

    fn remove_team(&mut self, team_id: &str) -> Option<PanelSession> {
        let session = self.by_team.remove(team_id)?;
        self.by_operator.remove(&session.operator);
        self.publish_gauge();
        Some(session)
    }
}

/// Thread-safe registry of scoring sessions. Each coordinator owns one.
#[derive(Debug, Clone)]
pub struct PanelSessions {
    inner: Arc<Mutex<Locks>>,
}

impl PanelSessions {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Locks::default())),
        }
    }

    /// Bind `operator` to `team_id`. All-or-nothing: on error nothing changes.
    /// Re-entering one's own team rebinds it to the new correlation.
    pub fn try_enter(
        &self,
        team_id: &str,
        operator: &str,
        correlation: &str,
        token: &str,
        now: Instant,
    ) -> Result<PanelSession, EntryError> {
        let mut locks = lock(&self.inner);
        if let Some(held) = locks.by_team.get(team_id) {
            if held.operator != operator {
                return Err(EntryError::HeldByOther(held.operator.clone()));
            }
        }
        if let Some(other) = locks.by_operator.get(operator) {
            if other != team_id {
                return Err(EntryError::AlreadyManaging(other.clone()));
            }
        }
        let session = PanelSession {
            team_id: team_id.to_string(),
            operator: operator.to_string(),
            correlation: correlation.to_string(),
            token: token.to_string(),
            last_activity: now,
            knock_select: false,
        };
        locks.by_team.insert(team_id.to_string(), session.clone());
        locks
            .by_operator
            .insert(operator.to_string(), team_id.to_string());
        locks.publish_gauge();
        tracing::info!(team_id, operator, "Scoring session entered");
        Ok(session)
    }

    /// Session `operator` holds, if `correlation` is still its live panel.
    pub fn active(&self, operator: &str, correlation: &str) -> Option<PanelSession> {
        let locks = lock(&self.inner);
        let team_id = locks.by_operator.get(operator)?;
        locks
            .by_team
            .get(team_id)
            .filter(|s| s.correlation == correlation)
            .cloned()
    }

    pub fn holder(&self, team_id: &str) -> Option<String> {
        lock(&self.inner)
            .by_team
            .get(team_id)
            .map(|s| s.operator.clone())
    }

    /// Record activity and set the picker mode.
    pub fn touch(&self, team_id: &str, knock_select: bool, now: Instant) {
        let mut locks = lock(&self.inner);
        if let Some(session) = locks.by_team.get_mut(team_id) {
            session.last_activity = now;
            session.knock_select = knock_select;
        }
    }

    pub fn release(&self, team_id: &str) -> Option<PanelSession> {
        let released = lock(&self.inner).remove_team(team_id);
        if let Some(s) = &released {
            tracing::info!(team_id, operator = %s.operator, "Scoring session released");
        }
        released
    }

    /// Release every session idle for at least `timeout`.
    pub fn expire_idle(&self, now: Instant, timeout: Duration) -> Vec<PanelSession> {
        let mut locks = lock(&self.inner);
        let idle: Vec<String> = locks
            .by_team
            .values()
            .filter(|s| now.duration_since(s.last_activity) >= timeout)
            .map(|s| s.team_id.clone())
            .collect();
        let out: Vec<PanelSession> = idle.iter().filter_map(|t| locks.remove_team(t)).collect();
        if !out.is_empty() {
            metrics::EXPIRED_FLOWS_TOTAL
                .with_label_values(&["panel"])
                .inc_by(out.len() as u64);
        }
        out
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).by_team.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PanelSessions {
    fn default() -> Self {
        Self::new()
    }
}

/// A form value that is not a signed integer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("`{0}` is not a whole number like +5 or -3")]
pub struct InvalidDelta(pub String);

/// Parse a `[+-]?\d+` delta. Blank input means "leave unchanged".
pub fn parse_stat_delta(raw: &str) -> Result<Option<i64>, InvalidDelta> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let digits = trimmed
        .strip_prefix('+')
        .or_else(|| trimmed.strip_prefix('-'))
        .unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InvalidDelta(raw.to_string()));
    }
    let magnitude: i64 = digits.parse().map_err(|_| InvalidDelta(raw.to_string()))?;
    Ok(Some(if trimmed.starts_with('-') {
        -magnitude
    } else {
        magnitude
    }))
}
