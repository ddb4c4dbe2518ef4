// Custom-id codec: the routing token carried round-trip by every component.
//
// Wire form: `command.group.subcommand.Kind.action#correlation`. The five
// header positions are fixed; absent fields are empty segments.

use std::fmt;

use thiserror::Error;

const FIELD_SEP: char = '.';
const CORRELATION_SEP: char = '#';
const HEADER_FIELDS: usize = 5;

/// Discord's hard limit on custom id length.
pub const MAX_LEN: usize = 100;

/// UI element category, encoded on the wire by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    ActionRow,
    Button,
    StringSelect,
    TextInput,
    UserSelect,
    RoleSelect,
    MentionableSelect,
    ChannelSelect,
    Section,
    TextDisplay,
    Thumbnail,
    MediaGallery,
    File,
    Separator,
    ContentInventoryEntry,
    Container,
}

impl ComponentKind {
    const ALL: [ComponentKind; 16] = [
        ComponentKind::ActionRow,
        ComponentKind::Button,
        ComponentKind::StringSelect,
        ComponentKind::TextInput,
        ComponentKind::UserSelect,
        ComponentKind::RoleSelect,
        ComponentKind::MentionableSelect,
        ComponentKind::ChannelSelect,
        ComponentKind::Section,
        ComponentKind::TextDisplay,
        ComponentKind::Thumbnail,
        ComponentKind::MediaGallery,
        ComponentKind::File,
        ComponentKind::Separator,
        ComponentKind::ContentInventoryEntry,
        ComponentKind::Container,
    ];

    /// Discord's numeric component type.
    pub fn code(self) -> u8 {
        match self {
            ComponentKind::ActionRow => 1,
            ComponentKind::Button => 2,
            ComponentKind::StringSelect => 3,
            ComponentKind::TextInput => 4,
            ComponentKind::UserSelect => 5,
            ComponentKind::RoleSelect => 6,
            ComponentKind::MentionableSelect => 7,
            ComponentKind::ChannelSelect => 8,
            ComponentKind::Section => 9,
            ComponentKind::TextDisplay => 10,
            ComponentKind::Thumbnail => 11,
            ComponentKind::MediaGallery => 12,
            ComponentKind::File => 13,
            ComponentKind::Separator => 14,
            ComponentKind::ContentInventoryEntry => 16,
            ComponentKind::Container => 17,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::ActionRow => "ActionRow",
            ComponentKind::Button => "Button",
            ComponentKind::StringSelect => "StringSelect",
            ComponentKind::TextInput => "TextInput",
            ComponentKind::UserSelect => "UserSelect",
            ComponentKind::RoleSelect => "RoleSelect",
            ComponentKind::MentionableSelect => "MentionableSelect",
            ComponentKind::ChannelSelect => "ChannelSelect",
            ComponentKind::Section => "Section",
            ComponentKind::TextDisplay => "TextDisplay",
            ComponentKind::Thumbnail => "Thumbnail",
            ComponentKind::MediaGallery => "MediaGallery",
            ComponentKind::File => "File",
            ComponentKind::Separator => "Separator",
            ComponentKind::ContentInventoryEntry => "ContentInventoryEntry",
            ComponentKind::Container => "Container",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidToken {
    #[error("custom id has no correlation separator")]
    MissingCorrelation,

    #[error("custom id header has {0} fields, expected {HEADER_FIELDS}")]
    FieldCount(usize),

    #[error("custom id has an empty action")]
    MissingAction,

    #[error("unknown component kind `{0}`")]
    UnknownKind(String),
}

/// Decoded routing information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomId {
    pub command: Option<String>,
    pub subcommand_group: Option<String>,
    pub subcommand: Option<String>,
    pub kind: Option<ComponentKind>,
    pub action: String,
    pub correlation_id: String,
}

impl CustomId {
    pub fn new(action: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            command: None,
            subcommand_group: None,
            subcommand: None,
            kind: None,
            action: action.into(),
            correlation_id: correlation_id.into(),
        }
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.subcommand_group = Some(group.into());
        self
    }

    pub fn subcommand(mut self, subcommand: impl Into<String>) -> Self {
        self.subcommand = Some(subcommand.into());
        self
    }

    pub fn kind(mut self, kind: ComponentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Same routing header with a different action tag.
    pub fn with_action(&self, action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..self.clone()
        }
    }

    /// No delimiter inside any field, and the required fields are present.
    pub fn is_well_formed(&self) -> bool {
        let clean = |s: &str| !s.contains(FIELD_SEP) && !s.contains(CORRELATION_SEP);
        !self.action.is_empty()
            && !self.correlation_id.is_empty()
            && clean(&self.action)
            && !self.correlation_id.contains(CORRELATION_SEP)
            && [&self.command, &self.subcommand_group, &self.subcommand]
                .into_iter()
                .flatten()
                .all(|s| clean(s))
    }

    pub fn encode(&self) -> String {
        debug_assert!(self.is_well_formed(), "malformed custom id {self:?}");
        let token = format!(
            "{}.{}.{}.{}.{}#{}",
            self.command.as_deref().unwrap_or_default(),
            self.subcommand_group.as_deref().unwrap_or_default(),
            self.subcommand.as_deref().unwrap_or_default(),
            self.kind.map(ComponentKind::name).unwrap_or_default(),
            self.action,
            self.correlation_id,
        );
        debug_assert!(token.len() <= MAX_LEN, "custom id too long: {token}");
        token
    }

    /// Strict decode: exactly five header fields and a non-empty action.
    pub fn decode(token: &str) -> Result<Self, InvalidToken> {
        let (header, correlation) = token
            .rsplit_once(CORRELATION_SEP)
            .ok_or(InvalidToken::MissingCorrelation)?;
        let fields: Vec<&str> = header.split(FIELD_SEP).collect();
        if fields.len() != HEADER_FIELDS {
            return Err(InvalidToken::FieldCount(fields.len()));
        }
        Self::from_fields(&fields, correlation)
    }

    /// Lenient decode: tolerates a short header, where the last field is the
    /// action and earlier ones fill positions from the left.
    pub fn try_decode(token: &str) -> Option<Self> {
        let (header, correlation) = token.rsplit_once(CORRELATION_SEP)?;
        let mut fields: Vec<&str> = header.split(FIELD_SEP).collect();
        if fields.len() > HEADER_FIELDS {
            return None;
        }
        let action = fields.pop()?;
        fields.resize(HEADER_FIELDS - 1, "");
        fields.push(action);
        Self::from_fields(&fields, correlation).ok()
    }

    fn from_fields(fields: &[&str], correlation: &str) -> Result<Self, InvalidToken> {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        let kind = match fields[3] {
            "" => None,
            name => Some(
                ComponentKind::from_name(name)
                    .ok_or_else(|| InvalidToken::UnknownKind(name.to_string()))?,
            ),
        };
        if fields[4].is_empty() {
            return Err(InvalidToken::MissingAction);
        }
        Ok(Self {
            command: opt(fields[0]),
            subcommand_group: opt(fields[1]),
            subcommand: opt(fields[2]),
            kind,
            action: fields[4].to_string(),
            correlation_id: correlation.to_string(),
        })
    }

    /// Split a parametrised action such as `point-boss` into `("point", "boss")`.
    pub fn action_parts(&self) -> (&str, Option<&str>) {
        match self.action.split_once('-') {
            Some((verb, arg)) => (verb, Some(arg)),
            None => (&self.action, None),
        }
    }
}

impl fmt::Display for CustomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
