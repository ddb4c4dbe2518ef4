// Interaction routing: decode, consult session state, mutate, render.

mod commands;
mod points;
mod setup;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::custom_id::{CustomId, InvalidToken};
use crate::discord::{InboundEvent, Messenger, Reply, RestError};
use crate::error::{ErrorKind, StoreError};
use crate::metrics;
use crate::roster::RosterError;
use crate::session::{ConfirmationBook, PanelSessions, WizardRegistry};
use crate::store::Store;
use crate::ui::views::{self, CMD_PANEL, CMD_POINTS, CMD_REGISTER, CMD_SETUP, CMD_TEAMS};
use crate::ui::{error_card, UiError};

pub use commands::{fuzzy_match, AUTOCOMPLETE_LIMIT};

/// Anything that stops a flow. Rendered to the user as an ephemeral card.
#[derive(Error, Debug)]
pub enum FlowError {
    /// A precondition failed; the message is shown verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ui(#[from] UiError),

    #[error(transparent)]
    Token(#[from] InvalidToken),

    #[error(transparent)]
    Rest(#[from] RestError),
}

impl FlowError {
    pub(crate) fn rejected(msg: impl Into<String>) -> Self {
        FlowError::Rejected(msg.into())
    }

    /// Text shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            FlowError::Rejected(msg) => msg.clone(),
            FlowError::Roster(RosterError::Store(e)) | FlowError::Store(e) => match e.kind() {
                ErrorKind::Io => views::GENERIC_FAILURE.to_string(),
                ErrorKind::NotFound => "That no longer exists. It may have been removed.".into(),
                ErrorKind::Validation | ErrorKind::Conflict => e.to_string(),
            },
            FlowError::Roster(e) => e.to_string(),
            FlowError::Token(_) => "This interaction is no longer valid.".into(),
            FlowError::Ui(_) | FlowError::Rest(_) => views::GENERIC_FAILURE.to_string(),
        }
    }
}

pub type FlowResult = Result<Reply, FlowError>;

/// The coordinator. Owns all in-memory session state; the store owns the rest.
pub struct Bot {
    pub store: Store,
    pub confirmations: ConfirmationBook,
    pub wizards: WizardRegistry,
    pub panels: PanelSessions,
    messenger: Arc<dyn Messenger>,
    guild_id: String,
    panel_idle_timeout: Option<Duration>,
}

impl Bot {
    pub fn new(store: Store, messenger: Arc<dyn Messenger>, guild_id: impl Into<String>) -> Self {
        Self {
            store,
            confirmations: ConfirmationBook::new(),
            wizards: WizardRegistry::new(),
            panels: PanelSessions::new(),
            messenger,
            guild_id: guild_id.into(),
            panel_idle_timeout: None,
        }
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.panel_idle_timeout = timeout;
        self
    }

    pub fn messenger(&self) -> &dyn Messenger {
        self.messenger.as_ref()
    }

    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    pub fn panel_idle_timeout(&self) -> Option<Duration> {
        self.panel_idle_timeout
    }

    /// Answer one interaction. Never fails: errors become ephemeral cards.
    pub async fn handle(&self, event: InboundEvent) -> Reply {
        let timer = metrics::INTERACTION_DURATION_SECONDS.start_timer();
        metrics::INTERACTIONS_TOTAL
            .with_label_values(&[event.kind()])
            .inc();
        let user_id = event.ctx().actor.id.clone();

        let result = match event {
            InboundEvent::Command {
                ctx,
                name,
                subcommand,
                options,
            } => {
                self.handle_command(&ctx, &name, subcommand.as_deref(), &options)
                    .await
            }
            InboundEvent::Autocomplete {
                name,
                subcommand,
                focused,
                value,
                options,
                ..
            } => self.autocomplete(&name, subcommand.as_deref(), &focused, &value, &options),
            InboundEvent::Component {
                ctx,
                custom_id,
                values,
                resolved,
            } => match decode(&custom_id) {
                Ok(id) => self.handle_component(&ctx, id, &values, &resolved).await,
                Err(e) => Err(e.into()),
            },
            InboundEvent::ModalSubmit {
                ctx,
                custom_id,
                fields,
            } => match decode(&custom_id) {
                Ok(id) => self.handle_stat_form(&ctx, &id, &fields).await,
                Err(e) => Err(e.into()),
            },
        };

        timer.observe_duration();
        result.unwrap_or_else(|e| {
            match &e {
                FlowError::Rejected(msg) => tracing::debug!(user_id = %user_id, "Rejected: {msg}"),
                other => tracing::warn!(user_id = %user_id, "Interaction failed: {other}"),
            }
            Reply::ephemeral(error_card(e.user_message()))
        })
    }

    async fn handle_component(
        &self,
        ctx: &crate::discord::EventContext,
        id: CustomId,
        values: &[String],
        resolved: &crate::discord::Resolved,
    ) -> FlowResult {
        match id.command.as_deref() {
            Some(CMD_REGISTER) | Some(CMD_TEAMS) => self.settle_confirmation(ctx, &id).await,
            Some(CMD_SETUP) => self.advance_wizard(ctx, &id, values, resolved).await,
            Some(CMD_POINTS) => self.open_session(ctx, values).await,
            Some(CMD_PANEL) => self.handle_control(ctx, &id).await,
            other => {
                tracing::warn!(command = ?other, "Component with unknown command");
                Err(FlowError::rejected("This interaction is no longer valid."))
            }
        }
    }
}

/// Strict decode with a lenient fallback for short legacy headers.
fn decode(raw: &str) -> Result<CustomId, InvalidToken> {
    CustomId::decode(raw).or_else(|e| CustomId::try_decode(raw).ok_or(e))
}

/// Seconds since the epoch, for Discord's relative timestamps.
pub(crate) fn unix_in(after: Duration) -> i64 {
    chrono::Utc::now().timestamp() + after.as_secs() as i64
}
