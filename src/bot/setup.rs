// Drives the setup wizard and performs its side effects.

use std::time::Instant;

use serde_json::json;

use super::{Bot, FlowError, FlowResult};
use crate::custom_id::{ComponentKind, CustomId};
use crate::discord::{EventContext, Reply, Resolved};
use crate::session::wizard::{transition, Candidate};
use crate::session::{WizardEffect, WizardEvent, WizardState};
use crate::store::{HOST_ROLE, LEADERBOARD_CHANNEL, PANEL_CHANNEL};
use crate::ui::views::{self, SetupTarget, ACTION_CONFIRM, ACTION_CONTINUE, ACTION_SELECT};

fn config_path(target: SetupTarget) -> &'static str {
    match target {
        SetupTarget::HostRole => HOST_ROLE,
        SetupTarget::PanelChannel => PANEL_CHANNEL,
        SetupTarget::LeaderboardChannel => LEADERBOARD_CHANNEL,
    }
}

/// Turn a select submission into a candidate using Discord's resolved data.
/// Ids missing from the resolved map are treated as nonexistent.
fn candidate(id: &CustomId, values: &[String], resolved: &Resolved) -> Option<Candidate> {
    let value = values.first()?;
    match id.kind {
        Some(ComponentKind::RoleSelect) => {
            let role = resolved.roles.get(value)?;
            Some(Candidate::Role {
                id: value.clone(),
                name: role.name.clone(),
                managed: role.managed,
            })
        }
        Some(ComponentKind::ChannelSelect) => {
            let channel = resolved.channels.get(value)?;
            Some(Candidate::Channel {
                id: value.clone(),
                name: channel.name.clone(),
                channel_type: channel.channel_type,
                permissions: channel.permissions,
            })
        }
        _ => None,
    }
}

/// Stand-in for a selection that resolved to nothing; always invalid.
fn missing(kind: Option<ComponentKind>) -> Candidate {
    match kind {
        Some(ComponentKind::RoleSelect) => Candidate::Role {
            id: String::new(),
            name: String::new(),
            managed: true,
        },
        _ => Candidate::Channel {
            id: String::new(),
            name: String::new(),
            channel_type: u8::MAX,
            permissions: 0,
        },
    }
}

impl Bot {
    pub(super) fn start_wizard(&self, ctx: &EventContext) -> FlowResult {
        if self.store.snapshot()?.config.setup {
            return Ok(Reply::ephemeral(views::setup_already_complete()));
        }
        let guild_id = ctx.guild_id.as_deref().unwrap_or(self.guild_id());
        let state = WizardState::start(
            &ctx.interaction_id,
            &ctx.actor.id,
            guild_id,
            &ctx.token,
            Instant::now(),
        );
        let view = state.render();
        self.wizards.insert(state);
        tracing::info!(user_id = %ctx.actor.id, "Setup wizard started");
        Ok(Reply::ephemeral(view))
    }

    pub(super) async fn advance_wizard(
        &self,
        ctx: &EventContext,
        id: &CustomId,
        values: &[String],
        resolved: &Resolved,
    ) -> FlowResult {
        let Some(state) = self.wizards.get(&id.correlation_id) else {
            return Ok(Reply::Update(views::expired("setup")));
        };
        if state.requester != ctx.actor.id {
            return Ok(Reply::Acknowledge);
        }
        let event = match id.action.as_str() {
            ACTION_CONTINUE => WizardEvent::Continue,
            ACTION_CONFIRM => WizardEvent::Confirm,
            ACTION_SELECT => WizardEvent::Selected(
                candidate(id, values, resolved).unwrap_or_else(|| missing(id.kind)),
            ),
            _ => return Err(FlowError::rejected("This interaction is no longer valid.")),
        };

        let mut t = transition(state, event, Instant::now());
        match &t.effect {
            WizardEffect::None => {}
            WizardEffect::Expired => {
                tracing::info!(correlation = %id.correlation_id, "Setup wizard expired");
            }
            WizardEffect::Persist { target, value } => {
                self.store
                    .set_config_value(config_path(*target), json!(value))?;
            }
            WizardEffect::Complete {
                host_role,
                panel_channel,
                leaderboard_channel,
            } => {
                self.store.set_config_value(HOST_ROLE, json!(host_role))?;
                self.store.set_config_value(PANEL_CHANNEL, json!(panel_channel))?;
                self.store
                    .set_config_value(LEADERBOARD_CHANNEL, json!(leaderboard_channel))?;
                if !self.store.snapshot()?.config.setup {
                    self.store.toggle_setup()?;
                }
                // A failed publish is reported but the saved config stays.
                let publish_error = self.publish_panel().await.err().map(|e| {
                    tracing::warn!("Initial points panel publish failed: {e}");
                    e.to_string()
                });
                t.view = views::setup_complete(
                    host_role,
                    panel_channel,
                    leaderboard_channel,
                    publish_error.as_deref(),
                );
                tracing::info!(user_id = %ctx.actor.id, "Setup complete");
            }
        }
        self.wizards.apply(&t);
        Ok(Reply::Update(t.view))
    }
}
