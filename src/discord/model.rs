// Interaction payloads in, interaction responses out.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

use crate::ui::{Modal, View};

/// Message flags: ephemeral.
pub const FLAG_EPHEMERAL: u64 = 1 << 6;
/// Message flags: components v2 layout.
pub const FLAG_COMPONENTS_V2: u64 = 1 << 15;

const ATTACHMENT_SCHEME: &str = "attachment://";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("malformed interaction: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported interaction type {0}")]
    UnsupportedType(u8),

    #[error("interaction has no invoking user")]
    MissingUser,

    #[error("interaction is missing `{0}`")]
    MissingField(&'static str),
}

// ── Inbound ──────────────────────────────────────────────────────────

/// Who triggered an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub username: String,
    /// Role ids in the guild; empty outside a guild.
    pub roles: Vec<String>,
}

impl Actor {
    pub fn has_role(&self, role_id: &str) -> bool {
        self.roles.iter().any(|r| r == role_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext {
    pub interaction_id: String,
    pub token: String,
    pub guild_id: Option<String>,
    pub actor: Actor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRole {
    pub name: String,
    pub managed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChannel {
    pub name: String,
    pub channel_type: u8,
    pub permissions: u64,
}

/// Entities Discord resolved for a select submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    pub roles: HashMap<String, ResolvedRole>,
    pub channels: HashMap<String, ResolvedChannel>,
}

/// Typed event handed to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Command {
        ctx: EventContext,
        name: String,
        subcommand: Option<String>,
        options: HashMap<String, String>,
    },
    Autocomplete {
        ctx: EventContext,
        name: String,
        subcommand: Option<String>,
        /// Name of the option being typed.
        focused: String,
        /// Partial value typed so far.
        value: String,
        options: HashMap<String, String>,
    },
    Component {
        ctx: EventContext,
        custom_id: String,
        values: Vec<String>,
        resolved: Resolved,
    },
    ModalSubmit {
        ctx: EventContext,
        custom_id: String,
        /// Field id to submitted text, in form order.
        fields: Vec<(String, String)>,
    },
}

impl InboundEvent {
    pub fn ctx(&self) -> &EventContext {
        match self {
            InboundEvent::Command { ctx, .. }
            | InboundEvent::Autocomplete { ctx, .. }
            | InboundEvent::Component { ctx, .. }
            | InboundEvent::ModalSubmit { ctx, .. } => ctx,
        }
    }

    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Command { .. } => "command",
            InboundEvent::Autocomplete { .. } => "autocomplete",
            InboundEvent::Component { .. } => "component",
            InboundEvent::ModalSubmit { .. } => "modal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Ping,
    Event(InboundEvent),
}

#[derive(Deserialize)]
struct RawInteraction {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    token: String,
    guild_id: Option<String>,
    member: Option<RawMember>,
    user: Option<RawUser>,
    data: Option<RawData>,
}

#[derive(Deserialize)]
struct RawMember {
    user: RawUser,
    #[serde(default)]
    roles: Vec<String>,
    nick: Option<String>,
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
    username: String,
    global_name: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawData {
    name: Option<String>,
    #[serde(default)]
    options: Vec<RawOption>,
    custom_id: Option<String>,
    #[serde(default)]
    values: Vec<String>,
    resolved: Option<RawResolved>,
    #[serde(default)]
    components: Vec<RawRow>,
}

#[derive(Deserialize)]
struct RawOption {
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    value: Option<Value>,
    #[serde(default)]
    options: Vec<RawOption>,
    #[serde(default)]
    focused: bool,
}

#[derive(Deserialize, Default)]
struct RawResolved {
    #[serde(default)]
    roles: HashMap<String, RawRole>,
    #[serde(default)]
    channels: HashMap<String, RawChannel>,
}

#[derive(Deserialize)]
struct RawRole {
    name: String,
    #[serde(default)]
    managed: bool,
}

#[derive(Deserialize)]
struct RawChannel {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    permissions: Option<String>,
}

/// Modal rows: classic action rows or label wrappers.
#[derive(Deserialize)]
struct RawRow {
    #[serde(default)]
    components: Vec<RawInput>,
    component: Option<RawInput>,
}

#[derive(Deserialize)]
struct RawInput {
    custom_id: Option<String>,
    value: Option<String>,
}

const SUBCOMMAND: u8 = 1;
const SUBCOMMAND_GROUP: u8 = 2;

fn option_text(value: &Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Flatten options into (subcommand, leaf options, focused option).
fn flatten_options(
    options: Vec<RawOption>,
) -> (Option<String>, HashMap<String, String>, Option<(String, String)>) {
    let mut subcommand = None;
    let mut leaves = options;
    while let Some(first) = leaves.first() {
        if first.kind != SUBCOMMAND && first.kind != SUBCOMMAND_GROUP {
            break;
        }
        let first = leaves.remove(0);
        if first.kind == SUBCOMMAND {
            subcommand = Some(first.name);
        }
        leaves = first.options;
    }
    let mut focused = None;
    let mut map = HashMap::new();
    for opt in leaves {
        let text = option_text(&opt.value);
        if opt.focused {
            focused = Some((opt.name.clone(), text.clone()));
        }
        map.insert(opt.name, text);
    }
    (subcommand, map, focused)
}

/// Parse a raw interaction body.
pub fn parse_interaction(body: &[u8]) -> Result<Interaction, ModelError> {
    let raw: RawInteraction = serde_json::from_slice(body)?;
    if raw.kind == 1 {
        return Ok(Interaction::Ping);
    }

    let (user, roles, nick) = match (raw.member, raw.user) {
        (Some(m), _) => (m.user, m.roles, m.nick),
        (None, Some(u)) => (u, Vec::new(), None),
        (None, None) => return Err(ModelError::MissingUser),
    };
    let username = nick.or(user.global_name).unwrap_or(user.username);
    let ctx = EventContext {
        interaction_id: raw.id,
        token: raw.token,
        guild_id: raw.guild_id,
        actor: Actor {
            id: user.id,
            username,
            roles,
        },
    };
    let data = raw.data.unwrap_or_default();

    let event = match raw.kind {
        2 => {
            let (subcommand, options, _) = flatten_options(data.options);
            InboundEvent::Command {
                ctx,
                name: data.name.ok_or(ModelError::MissingField("data.name"))?,
                subcommand,
                options,
            }
        }
        4 => {
            let (subcommand, options, focused) = flatten_options(data.options);
            let (focused, value) = focused.unwrap_or_default();
            InboundEvent::Autocomplete {
                ctx,
                name: data.name.ok_or(ModelError::MissingField("data.name"))?,
                subcommand,
                focused,
                value,
                options,
            }
        }
        3 => {
            let resolved = data.resolved.unwrap_or_default();
            InboundEvent::Component {
                ctx,
                custom_id: data
                    .custom_id
                    .ok_or(ModelError::MissingField("data.custom_id"))?,
                values: data.values,
                resolved: Resolved {
                    roles: resolved
                        .roles
                        .into_iter()
                        .map(|(id, r)| {
                            let role = ResolvedRole {
                                name: r.name,
                                managed: r.managed,
                            };
                            (id, role)
                        })
                        .collect(),
                    channels: resolved
                        .channels
                        .into_iter()
                        .map(|(id, c)| {
                            let channel = ResolvedChannel {
                                name: c.name,
                                channel_type: c.kind,
                                permissions: c
                                    .permissions
                                    .and_then(|p| p.parse().ok())
                                    .unwrap_or(0),
                            };
                            (id, channel)
                        })
                        .collect(),
                },
            }
        }
        5 => {
            let fields = data
                .components
                .into_iter()
                .flat_map(|row| row.components.into_iter().chain(row.component))
                .filter_map(|input| Some((input.custom_id?, input.value.unwrap_or_default())))
                .collect();
            InboundEvent::ModalSubmit {
                ctx,
                custom_id: data
                    .custom_id
                    .ok_or(ModelError::MissingField("data.custom_id"))?,
                fields,
            }
        }
        other => return Err(ModelError::UnsupportedType(other)),
    };
    Ok(Interaction::Event(event))
}

// ── Outbound ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub name: String,
    pub value: String,
}

/// What the bot answers an interaction with.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Pong,
    /// New message; ephemeral ones are only visible to the actor.
    Message { view: View, ephemeral: bool },
    /// Replace the message the component lives on.
    Update(View),
    /// Acknowledge without changing anything.
    Acknowledge,
    Modal(Modal),
    Choices(Vec<Choice>),
}

impl Reply {
    pub fn ephemeral(view: View) -> Self {
        Reply::Message {
            view,
            ephemeral: true,
        }
    }

    /// Interaction response body. Attachment media is resolved against
    /// `media_base`.
    pub fn to_json(&self, media_base: Option<&Url>) -> Value {
        match self {
            Reply::Pong => json!({ "type": 1 }),
            Reply::Message { view, ephemeral } => {
                let mut flags = FLAG_COMPONENTS_V2;
                if *ephemeral {
                    flags |= FLAG_EPHEMERAL;
                }
                json!({
                    "type": 4,
                    "data": { "flags": flags, "components": components(view, media_base) },
                })
            }
            Reply::Update(view) => json!({
                "type": 7,
                "data": { "flags": FLAG_COMPONENTS_V2, "components": components(view, media_base) },
            }),
            Reply::Acknowledge => json!({ "type": 6 }),
            Reply::Modal(modal) => json!({ "type": 9, "data": modal.to_value() }),
            Reply::Choices(choices) => json!({
                "type": 8,
                "data": {
                    "choices": choices
                        .iter()
                        .map(|c| json!({ "name": c.name, "value": c.value }))
                        .collect::<Vec<_>>(),
                },
            }),
        }
    }
}

/// Components of a view with media resolved, as sent in message bodies.
pub fn components(view: &View, media_base: Option<&Url>) -> Vec<Value> {
    resolve_media(view.to_components(), media_base)
}

fn resolve_attachment(url: &str, base: Option<&Url>) -> Option<String> {
    match url.strip_prefix(ATTACHMENT_SCHEME) {
        None => Some(url.to_string()),
        Some(name) => base?.join(name).ok().map(String::from),
    }
}

/// Rewrite `attachment://` media against `base`. Where no base is configured,
/// thumbnail sections degrade to their text and gallery items are dropped.
pub fn resolve_media(components: Vec<Value>, base: Option<&Url>) -> Vec<Value> {
    components
        .into_iter()
        .flat_map(|c| resolve_component(c, base))
        .collect()
}

fn resolve_component(mut c: Value, base: Option<&Url>) -> Vec<Value> {
    match c["type"].as_u64() {
        Some(9) if c["accessory"]["type"] == 11 => {
            let url = c["accessory"]["media"]["url"].as_str().unwrap_or_default();
            match resolve_attachment(url, base) {
                Some(resolved) => {
                    c["accessory"]["media"]["url"] = json!(resolved);
                    vec![c]
                }
                None => match c["components"].take() {
                    Value::Array(texts) => texts,
                    _ => Vec::new(),
                },
            }
        }
        Some(12) => {
            let items: Vec<Value> = match c["items"].take() {
                Value::Array(items) => items
                    .into_iter()
                    .filter_map(|mut item| {
                        let url = item["media"]["url"].as_str()?;
                        let resolved = resolve_attachment(url, base)?;
                        item["media"]["url"] = json!(resolved);
                        Some(item)
                    })
                    .collect(),
                _ => Vec::new(),
            };
            if items.is_empty() {
                return Vec::new();
            }
            c["items"] = json!(items);
            vec![c]
        }
        // Files must be uploaded with the message and nothing is uploaded here.
        Some(13) => Vec::new(),
        Some(17) => {
            if let Value::Array(children) = c["components"].take() {
                c["components"] = json!(resolve_media(children, base));
            }
            vec![c]
        }
        _ => vec![c],
    }
}
