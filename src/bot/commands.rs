// Slash commands, autocomplete and the timed confirmations they open.

use std::collections::HashMap;
use std::time::Instant;

use super::{unix_in, Bot, FlowError, FlowResult};
use crate::catalog;
use crate::custom_id::CustomId;
use crate::discord::{Choice, EventContext, Reply};
use crate::error::ErrorKind;
use crate::roster;
use crate::session::confirm::CONFIRM_TIMEOUT;
use crate::session::{ConfirmKind, Settlement};
use crate::store::models::MAX_TEAM_NAME_LEN;
use crate::ui::views::{self, ACTION_CANCEL, ACTION_CONFIRM};

/// Most suggestions returned to one autocomplete request.
pub const AUTOCOMPLETE_LIMIT: usize = 6;

/// Case-insensitive subsequence match: `"alp"` and `"aph"` both match `"Alpha"`.
pub fn fuzzy_match(query: &str, candidate: &str) -> bool {
    let candidate = candidate.to_lowercase();
    let mut chars = candidate.chars();
    query
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .all(|q| chars.any(|c| c == q))
}

fn option<'a>(options: &'a HashMap<String, String>, name: &str) -> Result<&'a str, FlowError> {
    options
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| FlowError::rejected(format!("Missing option `{name}`.")))
}

impl Bot {
    pub(super) async fn handle_command(
        &self,
        ctx: &EventContext,
        name: &str,
        subcommand: Option<&str>,
        options: &HashMap<String, String>,
    ) -> FlowResult {
        tracing::debug!(user_id = %ctx.actor.id, command = name, ?subcommand, "Command");
        match (name, subcommand) {
            ("register", _) => self.register(ctx, options),
            ("unregister", _) => self.unregister(ctx),
            ("setup", _) => self.start_wizard(ctx),
            ("teams", Some("create")) => self.prompt_create_team(ctx, options),
            ("teams", Some("add-member")) => {
                let team = roster::add_member(
                    &self.store,
                    option(options, "team")?,
                    option(options, "user")?,
                )?;
                self.refresh_panel().await;
                Ok(Reply::ephemeral(views::member_added(&team)))
            }
            ("teams", Some("remove-member")) => {
                let team = roster::remove_member(&self.store, option(options, "user")?)?;
                self.refresh_panel().await;
                Ok(Reply::ephemeral(views::member_removed(&team)))
            }
            ("teams", Some("edit-name")) => {
                let team = self
                    .store
                    .rename_team(option(options, "team")?, option(options, "name")?)?;
                self.refresh_panel().await;
                Ok(Reply::ephemeral(views::team_renamed(&team)))
            }
            ("teams", Some("delete")) => self.prompt_delete_team(ctx, options),
            _ => Err(FlowError::rejected(format!("Unknown command /{name}."))),
        }
    }

    fn register(&self, ctx: &EventContext, options: &HashMap<String, String>) -> FlowResult {
        let choice = roster::check_choice(option(options, "character")?, option(options, "skin")?)?;
        roster::check_can_register(&self.store, &ctx.actor.id)?;
        self.confirmations.open(
            &ctx.interaction_id,
            &ctx.actor.id,
            ConfirmKind::Register {
                choice: choice.clone(),
                username: ctx.actor.username.clone(),
            },
            &ctx.token,
            Instant::now(),
        );
        Ok(Reply::ephemeral(views::register_confirm(
            &choice,
            &ctx.interaction_id,
            unix_in(CONFIRM_TIMEOUT),
        )))
    }

    fn unregister(&self, ctx: &EventContext) -> FlowResult {
        match self.store.unregister(&ctx.actor.id) {
            Ok(()) => Ok(Reply::ephemeral(views::unregister_success())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(FlowError::rejected("You are not registered."))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn prompt_create_team(
        &self,
        ctx: &EventContext,
        options: &HashMap<String, String>,
    ) -> FlowResult {
        let name = option(options, "name")?.trim().to_string();
        if name.is_empty() {
            return Err(FlowError::rejected("Team names can not be blank."));
        }
        if name.chars().count() > MAX_TEAM_NAME_LEN {
            return Err(FlowError::rejected(format!(
                "Team names can be at most {MAX_TEAM_NAME_LEN} characters."
            )));
        }
        let leader = roster::prepare_leader(&self.store, option(options, "leader")?)?;
        self.confirmations.open(
            &ctx.interaction_id,
            &ctx.actor.id,
            ConfirmKind::CreateTeam {
                name: name.clone(),
                leader: leader.clone(),
            },
            &ctx.token,
            Instant::now(),
        );
        Ok(Reply::ephemeral(views::team_create_confirm(
            &name,
            &leader,
            &ctx.interaction_id,
            unix_in(CONFIRM_TIMEOUT),
        )))
    }

    fn prompt_delete_team(
        &self,
        ctx: &EventContext,
        options: &HashMap<String, String>,
    ) -> FlowResult {
        let team = self
            .store
            .team(option(options, "team")?)?
            .ok_or_else(|| FlowError::rejected("The chosen team was invalid."))?;
        self.confirmations.open(
            &ctx.interaction_id,
            &ctx.actor.id,
            ConfirmKind::DeleteTeam {
                team_id: team.id.clone(),
                name: team.name.clone(),
            },
            &ctx.token,
            Instant::now(),
        );
        Ok(Reply::ephemeral(views::team_delete_confirm(
            &team,
            &ctx.interaction_id,
            unix_in(CONFIRM_TIMEOUT),
        )))
    }

    pub(super) async fn settle_confirmation(
        &self,
        ctx: &EventContext,
        id: &CustomId,
    ) -> FlowResult {
        let accept = match id.action.as_str() {
            ACTION_CONFIRM => true,
            ACTION_CANCEL => false,
            _ => return Err(FlowError::rejected("This interaction is no longer valid.")),
        };
        let settlement =
            self.confirmations
                .settle(&id.correlation_id, &ctx.actor.id, accept, Instant::now());
        match settlement {
            Settlement::Ignored => Ok(Reply::Acknowledge),
            Settlement::Unknown => Ok(Reply::Update(views::expired(
                id.command.as_deref().unwrap_or("register"),
            ))),
            Settlement::Expired(p) => Ok(Reply::Update(views::expired(p.kind.command()))),
            Settlement::Cancelled(p) => Ok(Reply::Update(match p.kind {
                ConfirmKind::Register { .. } => views::register_cancelled(),
                ConfirmKind::CreateTeam { .. } => views::team_create_cancelled(),
                ConfirmKind::DeleteTeam { .. } => views::team_delete_cancelled(),
            })),
            Settlement::Confirmed(p) => self.commit(&p.requester, p.kind).await,
        }
    }

    async fn commit(&self, requester: &str, kind: ConfirmKind) -> FlowResult {
        match kind {
            ConfirmKind::Register { choice, username } => {
                roster::register(&self.store, requester, &username, choice.clone())?;
                Ok(Reply::Update(views::register_success(&choice)))
            }
            ConfirmKind::CreateTeam { name, leader } => {
                let team = roster::create_team(&self.store, &leader.id, &name)?;
                self.refresh_panel().await;
                Ok(Reply::Update(views::team_created(&team)))
            }
            ConfirmKind::DeleteTeam { team_id, name } => {
                self.store.delete_team(&team_id)?;
                if let Some(session) = self.panels.release(&team_id) {
                    if let Err(e) = self
                        .messenger()
                        .edit_original(&session.token, &views::session_stale())
                        .await
                    {
                        tracing::warn!(
                            team_id = %team_id,
                            "Failed to close panel of deleted team: {e}"
                        );
                    }
                }
                self.refresh_panel().await;
                Ok(Reply::Update(views::team_deleted(&name)))
            }
        }
    }

    pub(super) fn autocomplete(
        &self,
        name: &str,
        _subcommand: Option<&str>,
        focused: &str,
        value: &str,
        options: &HashMap<String, String>,
    ) -> FlowResult {
        let choices: Vec<Choice> = match (name, focused) {
            ("register", "character") => catalog::CHARACTERS
                .iter()
                .filter(|c| fuzzy_match(value, c.name))
                .map(|c| Choice {
                    name: c.name.to_string(),
                    value: c.id.to_string(),
                })
                .collect(),
            ("register", "skin") => {
                let character = options
                    .get("character")
                    .and_then(|id| catalog::character_by_id(id));
                match character {
                    Some(c) => c
                        .skins
                        .iter()
                        .filter(|s| fuzzy_match(value, s.name))
                        .map(|s| Choice {
                            name: s.name.to_string(),
                            value: s.id.to_string(),
                        })
                        .collect(),
                    None => vec![Choice {
                        name: "Please choose a character first".into(),
                        value: "none".into(),
                    }],
                }
            }
            ("teams", "team") => self
                .store
                .teams()?
                .into_iter()
                .filter(|t| value.is_empty() || fuzzy_match(value, &t.name))
                .map(|t| Choice {
                    name: t.name,
                    value: t.id,
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(Reply::Choices(
            choices.into_iter().take(AUTOCOMPLETE_LIMIT).collect(),
        ))
    }
}
