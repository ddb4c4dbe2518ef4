// Declarative UI tree builder emitting Discord Components V2 JSON.

pub mod views;

use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

use crate::custom_id::CustomId;

// ── Colours ──────────────────────────────────────────────────────────

pub const DEFAULT_COLOR: u32 = 0x2b2d31;
pub const BLURPLE: u32 = 0x5865f2;
pub const GREEN: u32 = 0x57f287;
pub const YELLOW: u32 = 0xfee75c;
pub const RED: u32 = 0xed4245;
pub const GOLD: u32 = 0xf1c40f;

/// Discord allows at most five buttons per action row.
pub const MAX_ROW_BUTTONS: usize = 5;
/// And at most 25 options per string select.
pub const MAX_SELECT_OPTIONS: usize = 25;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UiError {
    #[error("invalid URL `{0}`")]
    InvalidUrl(String),

    #[error("a select menu takes 1 to {MAX_SELECT_OPTIONS} options, got {0}")]
    SelectOptions(usize),

    #[error("file components need an attachment reference, got `{0}`")]
    NotAnAttachment(String),
}

/// Where a piece of media lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    Url(Url),
    /// Logical attachment name, resolved by the transport.
    Attachment(String),
}

impl MediaRef {
    pub fn url(raw: &str) -> Result<Self, UiError> {
        parse_url(raw).map(MediaRef::Url)
    }

    pub fn attachment(name: impl Into<String>) -> Self {
        MediaRef::Attachment(name.into())
    }

    fn to_value(&self) -> Value {
        match self {
            MediaRef::Url(url) => json!({ "url": url.as_str() }),
            MediaRef::Attachment(name) => json!({ "url": format!("attachment://{name}") }),
        }
    }
}

fn parse_url(raw: &str) -> Result<Url, UiError> {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
        _ => Err(UiError::InvalidUrl(raw.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary = 1,
    Secondary = 2,
    Success = 3,
    Danger = 4,
    Link = 5,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    target: ButtonTarget,
    label: String,
    style: ButtonStyle,
    disabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum ButtonTarget {
    Custom(String),
    Link(Url),
}

impl Button {
    pub fn new(id: &CustomId, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            target: ButtonTarget::Custom(id.encode()),
            label: label.into(),
            style,
            disabled: false,
        }
    }

    /// Link-style button; fails on an unparsable URL.
    pub fn link(url: &str, label: impl Into<String>) -> Result<Self, UiError> {
        Ok(Self {
            target: ButtonTarget::Link(parse_url(url)?),
            label: label.into(),
            style: ButtonStyle::Link,
            disabled: false,
        })
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    fn to_value(&self) -> Value {
        let mut v = json!({
            "type": 2,
            "style": self.style as u8,
            "label": self.label,
            "disabled": self.disabled,
        });
        match &self.target {
            ButtonTarget::Custom(id) => v["custom_id"] = json!(id),
            ButtonTarget::Link(url) => v["url"] = json!(url.as_str()),
        }
        v
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    pub description: Option<String>,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Discord channel types the selectors filter on.
pub mod channel_types {
    pub const GUILD_TEXT: u8 = 0;
    pub const GUILD_ANNOUNCEMENT: u8 = 5;
    pub const PUBLIC_THREAD: u8 = 11;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Select {
    String {
        custom_id: String,
        placeholder: String,
        options: Vec<SelectOption>,
    },
    Role {
        custom_id: String,
        placeholder: String,
    },
    Channel {
        custom_id: String,
        placeholder: String,
        channel_types: Vec<u8>,
    },
    User {
        custom_id: String,
        placeholder: String,
    },
}

impl Select {
    pub fn string(
        id: &CustomId,
        placeholder: impl Into<String>,
        options: Vec<SelectOption>,
    ) -> Result<Self, UiError> {
        if options.is_empty() || options.len() > MAX_SELECT_OPTIONS {
            return Err(UiError::SelectOptions(options.len()));
        }
        Ok(Select::String {
            custom_id: id.encode(),
            placeholder: placeholder.into(),
            options,
        })
    }

    pub fn role(id: &CustomId, placeholder: impl Into<String>) -> Self {
        Select::Role {
            custom_id: id.encode(),
            placeholder: placeholder.into(),
        }
    }

    pub fn channel(id: &CustomId, placeholder: impl Into<String>, channel_types: &[u8]) -> Self {
        Select::Channel {
            custom_id: id.encode(),
            placeholder: placeholder.into(),
            channel_types: channel_types.to_vec(),
        }
    }

    pub fn user(id: &CustomId, placeholder: impl Into<String>) -> Self {
        Select::User {
            custom_id: id.encode(),
            placeholder: placeholder.into(),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Select::String {
                custom_id,
                placeholder,
                options,
            } => {
                let options: Vec<Value> = options
                    .iter()
                    .map(|o| {
                        let mut v = json!({ "label": o.label, "value": o.value });
                        if let Some(d) = &o.description {
                            v["description"] = json!(d);
                        }
                        v
                    })
                    .collect();
                json!({ "type": 3, "custom_id": custom_id, "placeholder": placeholder, "options": options })
            }
            Select::Role {
                custom_id,
                placeholder,
            } => json!({ "type": 6, "custom_id": custom_id, "placeholder": placeholder }),
            Select::Channel {
                custom_id,
                placeholder,
                channel_types,
            } => json!({
                "type": 8,
                "custom_id": custom_id,
                "placeholder": placeholder,
                "channel_types": channel_types,
            }),
            Select::User {
                custom_id,
                placeholder,
            } => json!({ "type": 5, "custom_id": custom_id, "placeholder": placeholder }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accessory {
    Button(Button),
    Thumbnail(MediaRef),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text(String),
    Separator { divider: bool, large: bool },
    Section { text: String, accessory: Accessory },
    Buttons(Vec<Button>),
    Select(Select),
    Gallery(Vec<MediaRef>),
    File(MediaRef),
    Container { accent: Option<u32>, children: Vec<Element> },
}

impl Element {
    fn to_value(&self) -> Value {
        match self {
            Element::Text(content) => json!({ "type": 10, "content": content }),
            Element::Separator { divider, large } => json!({
                "type": 14,
                "divider": divider,
                "spacing": if *large { 2 } else { 1 },
            }),
            Element::Section { text, accessory } => {
                let accessory = match accessory {
                    Accessory::Button(b) => b.to_value(),
                    Accessory::Thumbnail(m) => json!({ "type": 11, "media": m.to_value() }),
                };
                json!({
                    "type": 9,
                    "components": [{ "type": 10, "content": text }],
                    "accessory": accessory,
                })
            }
            Element::Buttons(buttons) => json!({
                "type": 1,
                "components": buttons.iter().map(Button::to_value).collect::<Vec<_>>(),
            }),
            Element::Select(select) => json!({ "type": 1, "components": [select.to_value()] }),
            Element::Gallery(items) => json!({
                "type": 12,
                "items": items.iter().map(|m| json!({ "media": m.to_value() })).collect::<Vec<_>>(),
            }),
            Element::File(m) => json!({ "type": 13, "file": m.to_value() }),
            Element::Container { accent, children } => {
                let mut v = json!({
                    "type": 17,
                    "components": children.iter().map(Element::to_value).collect::<Vec<_>>(),
                });
                if let Some(accent) = accent {
                    v["accent_color"] = json!(accent);
                }
                v
            }
        }
    }
}

/// Fluent accumulator of top-level elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct View {
    elements: Vec<Element>,
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn push(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    pub fn text(self, content: impl Into<String>) -> Self {
        self.push(Element::Text(content.into()))
    }

    pub fn separator(self) -> Self {
        self.push(Element::Separator {
            divider: true,
            large: false,
        })
    }

    /// Blank vertical gap with no rule.
    pub fn spacer(self) -> Self {
        self.push(Element::Separator {
            divider: false,
            large: true,
        })
    }

    pub fn section(self, text: impl Into<String>, button: Button) -> Self {
        self.push(Element::Section {
            text: text.into(),
            accessory: Accessory::Button(button),
        })
    }

    pub fn thumbnail_section(self, text: impl Into<String>, media: MediaRef) -> Self {
        self.push(Element::Section {
            text: text.into(),
            accessory: Accessory::Thumbnail(media),
        })
    }

    /// Section with a link button; fails on an unparsable URL.
    pub fn link_section(
        self,
        text: impl Into<String>,
        label: impl Into<String>,
        url: &str,
    ) -> Result<Self, UiError> {
        let button = Button::link(url, label)?;
        Ok(self.section(text, button))
    }

    /// Buttons, split into rows of at most five.
    pub fn buttons(mut self, buttons: Vec<Button>) -> Self {
        for row in buttons.chunks(MAX_ROW_BUTTONS) {
            self.elements.push(Element::Buttons(row.to_vec()));
        }
        self
    }

    pub fn select(self, select: Select) -> Self {
        self.push(Element::Select(select))
    }

    pub fn gallery(self, items: Vec<MediaRef>) -> Self {
        self.push(Element::Gallery(items))
    }

    /// File component; Discord only accepts uploaded attachments here.
    pub fn file(self, media: MediaRef) -> Result<Self, UiError> {
        match media {
            MediaRef::Attachment(_) => Ok(self.push(Element::File(media))),
            MediaRef::Url(url) => Err(UiError::NotAnAttachment(url.to_string())),
        }
    }

    /// Wrap another view as an accented container.
    pub fn container(self, accent: Option<u32>, inner: View) -> Self {
        self.push(Element::Container {
            accent,
            children: inner.elements,
        })
    }

    pub fn to_components(&self) -> Vec<Value> {
        self.elements.iter().map(Element::to_value).collect()
    }

    /// All text content, depth-first. Handy for assertions and logs.
    pub fn plain_text(&self) -> String {
        fn walk(elements: &[Element], out: &mut Vec<String>) {
            for e in elements {
                match e {
                    Element::Text(t) | Element::Section { text: t, .. } => out.push(t.clone()),
                    Element::Container { children, .. } => walk(children, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.elements, &mut out);
        out.join("\n")
    }

    /// Every custom id in the tree, depth-first.
    pub fn custom_ids(&self) -> Vec<String> {
        fn collect(v: &Value, out: &mut Vec<String>) {
            match v {
                Value::Object(map) => {
                    if let Some(Value::String(id)) = map.get("custom_id") {
                        out.push(id.clone());
                    }
                    map.values().for_each(|v| collect(v, out));
                }
                Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
                _ => {}
            }
        }
        let mut out = Vec::new();
        self.to_components().iter().for_each(|v| collect(v, &mut out));
        out
    }
}

/// Single-line text input inside a modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextInput {
    pub custom_id: String,
    pub label: String,
    pub placeholder: String,
    pub required: bool,
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modal {
    pub custom_id: String,
    pub title: String,
    pub inputs: Vec<TextInput>,
    pub max_length: Option<usize>,
}

impl Modal {
    pub fn new(id: &CustomId, title: impl Into<String>) -> Self {
        Self {
            custom_id: id.encode(),
            title: title.into(),
            inputs: Vec::new(),
            max_length: None,
        }
    }

    /// Length cap for every input added after this call.
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn input(
        mut self,
        field: impl Into<String>,
        label: impl Into<String>,
        placeholder: impl Into<String>,
    ) -> Self {
        self.inputs.push(TextInput {
            custom_id: field.into(),
            label: label.into(),
            placeholder: placeholder.into(),
            required: false,
            max_length: self.max_length,
        });
        self
    }

    pub fn to_value(&self) -> Value {
        let rows: Vec<Value> = self
            .inputs
            .iter()
            .map(|i| {
                let mut input = json!({
                    "type": 4,
                    "custom_id": i.custom_id,
                    "label": i.label,
                    "placeholder": i.placeholder,
                    "style": 1,
                    "required": i.required,
                });
                if let Some(len) = i.max_length {
                    input["max_length"] = json!(len);
                }
                json!({ "type": 1, "components": [input] })
            })
            .collect();
        json!({ "custom_id": self.custom_id, "title": self.title, "components": rows })
    }
}

// ── Common cards ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Warning,
    Fail,
    Info,
}

impl Tone {
    pub fn color(self) -> u32 {
        match self {
            Tone::Success => GREEN,
            Tone::Warning => YELLOW,
            Tone::Fail => RED,
            Tone::Info => BLURPLE,
        }
    }
}

/// Red card with the standard failure heading.
pub fn error_card(message: impl AsRef<str>) -> View {
    View::new().container(
        Some(RED),
        View::new()
            .text("## Something Went Wrong")
            .separator()
            .text(message.as_ref()),
    )
}

/// Single-text card in the given tone.
pub fn notice_card(tone: Tone, message: impl Into<String>) -> View {
    View::new().container(Some(tone.color()), View::new().text(message))
}
