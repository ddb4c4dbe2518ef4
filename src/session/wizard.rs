// Setup wizard as an explicit state machine.
//
// `transition` is pure: it takes the current state, one event and the clock,
// and returns the next state, the screen to show and the side effect the
// caller must perform. The registry only stores states between events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::lock;
use crate::metrics;
use crate::ui::views::{self, SetupTarget};
use crate::ui::View;

/// Each step must be answered within this window.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Discord permission bits checked on candidate channels.
const VIEW_CHANNEL: u64 = 1 << 10;
const SEND_MESSAGES: u64 = 1 << 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Intro,
    HostRoleSelect,
    HostRoleConfirm,
    PanelChannelSelect,
    PanelChannelConfirm,
    LeaderboardChannelSelect,
    LeaderboardChannelConfirm,
    Complete,
}

impl WizardStep {
    /// Selection target of a select/confirm step.
    pub fn target(self) -> Option<SetupTarget> {
        match self {
            WizardStep::HostRoleSelect | WizardStep::HostRoleConfirm => Some(SetupTarget::HostRole),
            WizardStep::PanelChannelSelect | WizardStep::PanelChannelConfirm => {
                Some(SetupTarget::PanelChannel)
            }
            WizardStep::LeaderboardChannelSelect | WizardStep::LeaderboardChannelConfirm => {
                Some(SetupTarget::LeaderboardChannel)
            }
            WizardStep::Intro | WizardStep::Complete => None,
        }
    }

    fn select_step(target: SetupTarget) -> Self {
        match target {
            SetupTarget::HostRole => WizardStep::HostRoleSelect,
            SetupTarget::PanelChannel => WizardStep::PanelChannelSelect,
            SetupTarget::LeaderboardChannel => WizardStep::LeaderboardChannelSelect,
        }
    }

    fn confirm_step(target: SetupTarget) -> Self {
        match target {
            SetupTarget::HostRole => WizardStep::HostRoleConfirm,
            SetupTarget::PanelChannel => WizardStep::PanelChannelConfirm,
            SetupTarget::LeaderboardChannel => WizardStep::LeaderboardChannelConfirm,
        }
    }

    fn next_after_confirm(target: SetupTarget) -> Self {
        match target {
            SetupTarget::HostRole => WizardStep::PanelChannelSelect,
            SetupTarget::PanelChannel => WizardStep::LeaderboardChannelSelect,
            SetupTarget::LeaderboardChannel => WizardStep::Complete,
        }
    }
}

/// A raw selector value with the resolved data needed to validate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Role {
        id: String,
        name: String,
        /// Integration- or bot-owned roles cannot be assigned by hand.
        managed: bool,
    },
    Channel {
        id: String,
        name: String,
        channel_type: u8,
        permissions: u64,
    },
}

impl Candidate {
    fn id(&self) -> &str {
        match self {
            Candidate::Role { id, .. } | Candidate::Channel { id, .. } => id,
        }
    }

    fn label(&self) -> String {
        match self {
            Candidate::Role { name, .. } => format!("@{name}"),
            Candidate::Channel { name, .. } => format!("#{name}"),
        }
    }

    /// Whether this candidate is acceptable for `target` in `guild_id`.
    pub fn is_valid_for(&self, target: SetupTarget, guild_id: &str) -> bool {
        use crate::ui::channel_types::*;
        match (target, self) {
            (SetupTarget::HostRole, Candidate::Role { id, managed, .. }) => {
                // The @everyone role shares the guild's id.
                !managed && id != guild_id
            }
            (
                SetupTarget::PanelChannel,
                Candidate::Channel {
                    channel_type,
                    permissions,
                    ..
                },
            ) => *channel_type == GUILD_TEXT && sendable(*permissions),
            (
                SetupTarget::LeaderboardChannel,
                Candidate::Channel {
                    channel_type,
                    permissions,
                    ..
                },
            ) => {
                matches!(*channel_type, GUILD_TEXT | GUILD_ANNOUNCEMENT | PUBLIC_THREAD)
                    && sendable(*permissions)
            }
            _ => false,
        }
    }
}

fn sendable(permissions: u64) -> bool {
    permissions & (VIEW_CHANNEL | SEND_MESSAGES) == VIEW_CHANNEL | SEND_MESSAGES
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    Continue,
    Selected(Candidate),
    Confirm,
}

/// A confirmed or pending selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardState {
    pub correlation: String,
    pub requester: String,
    pub guild_id: String,
    pub step: WizardStep,
    pub invalid: bool,
    /// Selected but not yet confirmed.
    pub pending: Option<Selection>,
    pub host_role: Option<String>,
    pub panel_channel: Option<String>,
    pub leaderboard_channel: Option<String>,
    pub deadline: Instant,
    /// Interaction token of the `/setup` call, for editing on expiry.
    pub token: String,
}

impl WizardState {
    pub fn start(
        correlation: &str,
        requester: &str,
        guild_id: &str,
        token: &str,
        now: Instant,
    ) -> Self {
        Self {
            correlation: correlation.to_string(),
            requester: requester.to_string(),
            guild_id: guild_id.to_string(),
            step: WizardStep::Intro,
            invalid: false,
            pending: None,
            host_role: None,
            panel_channel: None,
            leaderboard_channel: None,
            deadline: now + STEP_TIMEOUT,
            token: token.to_string(),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Screen for the current step.
    pub fn render(&self) -> View {
        match self.step {
            WizardStep::Intro => views::setup_intro(&self.correlation),
            WizardStep::Complete => views::setup_complete(
                self.host_role.as_deref().unwrap_or_default(),
                self.panel_channel.as_deref().unwrap_or_default(),
                self.leaderboard_channel.as_deref().unwrap_or_default(),
                None,
            ),
            step => {
                let Some(target) = step.target() else {
                    return views::expired("setup");
                };
                match (&self.pending, step == WizardStep::confirm_step(target)) {
                    (Some(sel), true) => {
                        views::setup_confirm(target, &self.correlation, &sel.id, &sel.label)
                    }
                    _ => views::setup_select(target, &self.correlation, self.invalid),
                }
            }
        }
    }

    fn commit(&mut self, target: SetupTarget, value: String) {
        match target {
            SetupTarget::HostRole => self.host_role = Some(value),
            SetupTarget::PanelChannel => self.panel_channel = Some(value),
            SetupTarget::LeaderboardChannel => self.leaderboard_channel = Some(value),
        }
    }
}

/// Side effect the caller performs after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEffect {
    None,
    /// A selection was confirmed; persist it now.
    Persist { target: SetupTarget, value: String },
    /// Persist all three values, flip `setup`, then publish the panel.
    Complete {
        host_role: String,
        panel_channel: String,
        leaderboard_channel: String,
    },
    /// The step window elapsed; drop the wizard.
    Expired,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub state: WizardState,
    pub view: View,
    pub effect: WizardEffect,
}

/// Advance the wizard by one event. Events that do not fit the current step
/// re-render it unchanged.
pub fn transition(mut state: WizardState, event: WizardEvent, now: Instant) -> Transition {
    if state.is_expired(now) {
        return Transition {
            view: views::expired("setup"),
            state,
            effect: WizardEffect::Expired,
        };
    }

    let effect = match (state.step, state.step.target(), event) {
        (WizardStep::Intro, _, WizardEvent::Continue) => {
            state.step = WizardStep::HostRoleSelect;
            WizardEffect::None
        }
        (_, Some(target), WizardEvent::Selected(candidate)) => {
            if candidate.is_valid_for(target, &state.guild_id) {
                state.step = WizardStep::confirm_step(target);
                state.invalid = false;
                state.pending = Some(Selection {
                    id: candidate.id().to_string(),
                    label: candidate.label(),
                });
            } else {
                state.step = WizardStep::select_step(target);
                state.invalid = true;
                state.pending = None;
            }
            WizardEffect::None
        }
        (step, Some(target), WizardEvent::Confirm)
            if step == WizardStep::confirm_step(target) && state.pending.is_some() =>
        {
            let value = state.pending.take().map(|s| s.id).unwrap_or_default();
            state.commit(target, value.clone());
            state.step = WizardStep::next_after_confirm(target);
            state.invalid = false;
            if state.step == WizardStep::Complete {
                WizardEffect::Complete {
                    host_role: state.host_role.clone().unwrap_or_default(),
                    panel_channel: state.panel_channel.clone().unwrap_or_default(),
                    leaderboard_channel: state.leaderboard_channel.clone().unwrap_or_default(),
                }
            } else {
                WizardEffect::Persist { target, value }
            }
        }
        _ => {
            return Transition {
                view: state.render(),
                state,
                effect: WizardEffect::None,
            }
        }
    };

    state.deadline = now + STEP_TIMEOUT;
    tracing::debug!(
        correlation = %state.correlation,
        step = ?state.step,
        invalid = state.invalid,
        "Wizard transition"
    );
    Transition {
        view: state.render(),
        state,
        effect,
    }
}

/// Live wizards keyed by the `/setup` interaction id.
#[derive(Debug, Clone)]
pub struct WizardRegistry {
    inner: Arc<Mutex<HashMap<String, WizardState>>>,
}

impl WizardRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn insert(&self, state: WizardState) {
        let mut map = lock(&self.inner);
        map.insert(state.correlation.clone(), state);
        metrics::ACTIVE_WIZARDS.set(map.len() as i64);
    }

    pub fn get(&self, correlation: &str) -> Option<WizardState> {
        lock(&self.inner).get(correlation).cloned()
    }

    pub fn remove(&self, correlation: &str) -> Option<WizardState> {
        let mut map = lock(&self.inner);
        let removed = map.remove(correlation);
        metrics::ACTIVE_WIZARDS.set(map.len() as i64);
        removed
    }

    /// Store the outcome of a transition, dropping finished or expired wizards.
    pub fn apply(&self, transition: &Transition) {
        match (&transition.effect, transition.state.step) {
            (WizardEffect::Expired, _) | (_, WizardStep::Complete) => {
                self.remove(&transition.state.correlation);
            }
            _ => self.insert(transition.state.clone()),
        }
    }

    pub fn sweep_expired(&self, now: Instant) -> Vec<WizardState> {
        let mut map = lock(&self.inner);
        let expired: Vec<String> = map
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.correlation.clone())
            .collect();
        let out: Vec<WizardState> = expired.iter().filter_map(|k| map.remove(k)).collect();
        if !out.is_empty() {
            metrics::ACTIVE_WIZARDS.set(map.len() as i64);
            metrics::EXPIRED_FLOWS_TOTAL
                .with_label_values(&["wizard"])
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

impl Default for WizardRegistry {
    fn default() -> Self {
        Self::new()
    }
}
