// Scoring sessions and the public points panel.

use std::time::Instant;

use serde_json::json;

use super::{Bot, FlowError, FlowResult};
use crate::catalog::{self, KNOCK_POINT_ID, LOSS_POINT_ID};
use crate::custom_id::CustomId;
use crate::discord::{EventContext, Reply};
use crate::metrics;
use crate::session::{parse_stat_delta, PanelSession};
use crate::store::models::{StatField, Team};
use crate::store::PANEL_MESSAGE;
use crate::ui::views::{
    self, StatForm, ACTION_BACK, ACTION_EDIT, ACTION_END, ACTION_KNOCK, ACTION_POINT,
};

const NO_HOST_ROLE: &str = "You don't have the proper role required to use the points panel.";
const INVALID_TEAM: &str = "The chosen team was invalid.";

impl StatForm {
    fn field(self) -> StatField {
        match self {
            StatForm::Kills => StatField::Kills,
            StatForm::Runes => StatField::RunesTotal,
            StatForm::Downs => StatField::Downs,
        }
    }
}

impl Bot {
    /// Team picked on the public panel: take the team lock and show the controls.
    pub(super) async fn open_session(&self, ctx: &EventContext, values: &[String]) -> FlowResult {
        let config = self.store.snapshot()?.config;
        let authorized = config
            .roles
            .host
            .as_deref()
            .is_some_and(|role| ctx.actor.has_role(role));
        if !authorized {
            return Err(FlowError::rejected(NO_HOST_ROLE));
        }
        let team = match values.first() {
            Some(team_id) => self.store.team(team_id)?,
            None => None,
        }
        .ok_or_else(|| FlowError::rejected(INVALID_TEAM))?;

        self.panels
            .try_enter(
                &team.id,
                &ctx.actor.id,
                &ctx.interaction_id,
                &ctx.token,
                Instant::now(),
            )
            .map_err(|e| FlowError::rejected(e.to_string()))?;
        Ok(Reply::ephemeral(views::scoring_panel(
            &team,
            &ctx.interaction_id,
            false,
        )))
    }

    /// The live session behind a control, and its team.
    fn live_session(
        &self,
        ctx: &EventContext,
        id: &CustomId,
    ) -> Result<Option<(PanelSession, Team)>, FlowError> {
        let Some(session) = self.panels.active(&ctx.actor.id, &id.correlation_id) else {
            return Ok(None);
        };
        match self.store.team(&session.team_id)? {
            Some(team) => Ok(Some((session, team))),
            None => {
                self.panels.release(&session.team_id);
                Ok(None)
            }
        }
    }

    pub(super) async fn handle_control(&self, ctx: &EventContext, id: &CustomId) -> FlowResult {
        let Some((session, team)) = self.live_session(ctx, id)? else {
            return Ok(Reply::Update(views::session_stale()));
        };
        let team_id = session.team_id.as_str();
        let mut knock_select = session.knock_select;

        match id.action_parts() {
            (ACTION_POINT, Some(source_id)) => {
                let source = catalog::point_source(source_id)
                    .ok_or_else(|| FlowError::rejected("Unknown point source."))?;
                let amount = source.signed_amount();
                if amount < 0.0 {
                    self.store.remove_points(team_id, -amount)?;
                } else {
                    self.store.add_points(team_id, amount)?;
                }
                if source.id == LOSS_POINT_ID {
                    self.store.record_loss(team_id)?;
                }
                metrics::POINT_CHANGES_TOTAL
                    .with_label_values(&[source.group.label()])
                    .inc();
                knock_select = source.id == KNOCK_POINT_ID && !team.members.is_empty();
            }
            (ACTION_KNOCK, Some(user_id)) => {
                self.store
                    .adjust_member_stat(team_id, user_id, StatField::Downs, 1)?;
                knock_select = false;
            }
            (ACTION_BACK, None) => knock_select = false,
            (ACTION_EDIT, Some(tag)) => {
                let form = StatForm::from_tag(tag)
                    .ok_or_else(|| FlowError::rejected("Unknown statistic."))?;
                self.panels.touch(team_id, knock_select, Instant::now());
                return Ok(Reply::Modal(views::stat_modal(
                    &team,
                    form,
                    &session.correlation,
                )));
            }
            (ACTION_END, None) => {
                self.panels.release(team_id);
                self.refresh_panel().await;
                return Ok(Reply::Update(views::session_ended()));
            }
            _ => return Err(FlowError::rejected("This interaction is no longer valid.")),
        }

        self.panels.touch(team_id, knock_select, Instant::now());
        let team = self
            .store
            .team(team_id)?
            .ok_or_else(|| FlowError::rejected(INVALID_TEAM))?;
        Ok(Reply::Update(views::scoring_panel(
            &team,
            &session.correlation,
            knock_select,
        )))
    }

    /// Bulk stat form. Every value is checked before any is applied.
    pub(super) async fn handle_stat_form(
        &self,
        ctx: &EventContext,
        id: &CustomId,
        fields: &[(String, String)],
    ) -> FlowResult {
        let Some((session, team)) = self.live_session(ctx, id)? else {
            return Ok(Reply::Update(views::session_stale()));
        };
        let form = match id.action_parts() {
            (views::ACTION_STATS, Some(tag)) => StatForm::from_tag(tag),
            _ => None,
        }
        .ok_or_else(|| FlowError::rejected("This form is no longer valid."))?;

        let mut deltas = Vec::with_capacity(fields.len());
        for (member_id, raw) in fields {
            if raw.trim().chars().count() > form.max_length() {
                return Err(FlowError::rejected(format!(
                    "`{}` is longer than {} characters.",
                    raw.trim(),
                    form.max_length()
                )));
            }
            let delta = parse_stat_delta(raw).map_err(|e| FlowError::rejected(e.to_string()))?;
            if let Some(delta) = delta {
                if team.member(member_id).is_some() {
                    deltas.push((member_id.as_str(), delta));
                }
            }
        }

        if !deltas.is_empty() {
            self.store
                .adjust_member_stats(&team.id, form.field(), &deltas)?;
        }
        if form == StatForm::Runes && !deltas.is_empty() {
            self.store.compute_rune_average(&team.id)?;
        }
        tracing::info!(
            team_id = %team.id,
            stat = form.tag(),
            changed = deltas.len(),
            "Bulk stat edit applied"
        );

        self.panels
            .touch(&team.id, session.knock_select, Instant::now());
        let team = self
            .store
            .team(&team.id)?
            .ok_or_else(|| FlowError::rejected(INVALID_TEAM))?;
        Ok(Reply::Update(views::scoring_panel(
            &team,
            &session.correlation,
            session.knock_select,
        )))
    }

    /// Replace the public panel: delete the previous message, post a fresh one.
    pub async fn publish_panel(&self) -> Result<(), FlowError> {
        let config = self.store.snapshot()?.config;
        let Some(channel) = config.channels.panel else {
            tracing::debug!("No panel channel configured; skipping publish");
            return Ok(());
        };
        if let Some(old) = &config.messages.panel {
            if let Err(e) = self.messenger().delete_message(&channel, old).await {
                tracing::warn!(
                    channel_id = %channel,
                    message_id = %old,
                    "Failed to delete old panel: {e}"
                );
            }
        }
        let view = views::public_panel(&self.store.teams()?)?;
        let message_id = self.messenger().send_message(&channel, &view).await?;
        self.store.set_config_value(PANEL_MESSAGE, json!(message_id))?;
        tracing::info!(channel_id = %channel, message_id = %message_id, "Points panel published");
        Ok(())
    }

    /// Best-effort publish after roster or score changes.
    pub(crate) async fn refresh_panel(&self) {
        if let Err(e) = self.publish_panel().await {
            tracing::warn!("Points panel refresh failed: {e}");
        }
    }
}
