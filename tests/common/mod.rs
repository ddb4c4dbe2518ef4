// Shared fixtures: a recording messenger and event builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use tower_maiden::bot::Bot;
use tower_maiden::discord::{
    Actor, EventContext, InboundEvent, Messenger, Reply, Resolved, RestError,
};
use tower_maiden::store::models::CharacterChoice;
use tower_maiden::store::Store;
use tower_maiden::ui::View;

pub const GUILD: &str = "g1";
pub const HOST_ROLE: &str = "host-role";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Send { channel: String, text: String },
    Delete { channel: String, message: String },
    Edit { token: String, text: String },
}

/// Records every outbound call; message ids are `m1`, `m2`, ...
#[derive(Default)]
pub struct RecordingMessenger {
    pub calls: Mutex<Vec<Call>>,
    pub fail_sends: bool,
}

impl RecordingMessenger {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sends(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Send { .. }))
            .count()
    }

    pub fn edits(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Edit { token, text } => Some((token, text)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, channel_id: &str, view: &View) -> Result<String, RestError> {
        if self.fail_sends {
            return Err(RestError::Rejected {
                status: 403,
                body: "Missing Access".into(),
            });
        }
        let mut calls = self.calls.lock().unwrap();
        calls.push(Call::Send {
            channel: channel_id.to_string(),
            text: view.plain_text(),
        });
        let n = calls
            .iter()
            .filter(|c| matches!(c, Call::Send { .. }))
            .count();
        Ok(format!("m{n}"))
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), RestError> {
        self.calls.lock().unwrap().push(Call::Delete {
            channel: channel_id.to_string(),
            message: message_id.to_string(),
        });
        Ok(())
    }

    async fn edit_original(&self, token: &str, view: &View) -> Result<(), RestError> {
        self.calls.lock().unwrap().push(Call::Edit {
            token: token.to_string(),
            text: view.plain_text(),
        });
        Ok(())
    }
}

pub struct Harness {
    pub bot: Bot,
    pub messenger: Arc<RecordingMessenger>,
    _dir: tempfile::TempDir,
}

pub fn harness() -> Harness {
    harness_with(RecordingMessenger::default())
}

pub fn harness_with(messenger: RecordingMessenger) -> Harness {
    build(messenger, None)
}

/// Harness whose scoring sessions are released after `timeout` idle.
pub fn harness_idle(timeout: Duration) -> Harness {
    build(RecordingMessenger::default(), Some(timeout))
}

fn build(messenger: RecordingMessenger, idle: Option<Duration>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let messenger = Arc::new(messenger);
    let bot = Bot::new(store, messenger.clone(), GUILD).with_idle_timeout(idle);
    Harness {
        bot,
        messenger,
        _dir: dir,
    }
}

pub fn ctx(user: &str, interaction: &str) -> EventContext {
    ctx_with_roles(user, interaction, &[])
}

pub fn ctx_with_roles(user: &str, interaction: &str, roles: &[&str]) -> EventContext {
    EventContext {
        interaction_id: interaction.to_string(),
        token: format!("tok-{interaction}"),
        guild_id: Some(GUILD.to_string()),
        actor: Actor {
            id: user.to_string(),
            username: format!("{user}-name"),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        },
    }
}

pub fn command(
    ctx: EventContext,
    name: &str,
    sub: Option<&str>,
    options: &[(&str, &str)],
) -> InboundEvent {
    InboundEvent::Command {
        ctx,
        name: name.to_string(),
        subcommand: sub.map(str::to_string),
        options: options
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
    }
}

pub fn press(ctx: EventContext, custom_id: &str) -> InboundEvent {
    select(ctx, custom_id, &[], Resolved::default())
}

pub fn select(
    ctx: EventContext,
    custom_id: &str,
    values: &[&str],
    resolved: Resolved,
) -> InboundEvent {
    InboundEvent::Component {
        ctx,
        custom_id: custom_id.to_string(),
        values: values.iter().map(|v| v.to_string()).collect(),
        resolved,
    }
}

pub fn choice(character: &str, skin: &str) -> CharacterChoice {
    CharacterChoice {
        character_id: character.to_string(),
        skin_id: skin.to_string(),
    }
}

/// The view of an ephemeral message or in-place update.
pub fn view_of(reply: &Reply) -> &View {
    match reply {
        Reply::Message { view, .. } | Reply::Update(view) => view,
        other => panic!("expected a view, got {other:?}"),
    }
}

pub fn text_of(reply: &Reply) -> String {
    view_of(reply).plain_text()
}

/// First custom id in the reply ending with `.{action}#...`.
pub fn id_for(reply: &Reply, action: &str) -> String {
    let needle = format!(".{action}#");
    view_of(reply)
        .custom_ids()
        .into_iter()
        .find(|id| id.contains(&needle))
        .unwrap_or_else(|| panic!("no `{action}` control in {reply:?}"))
}
