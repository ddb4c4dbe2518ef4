// Outbound Discord REST calls the bot makes outside a request/response cycle.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use url::Url;

use super::model::{components, FLAG_COMPONENTS_V2};
use crate::config::Config;
use crate::ui::View;

#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Discord rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound messaging seam. Tests substitute a recording fake.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Post a new message, returning its id.
    async fn send_message(&self, channel_id: &str, view: &View) -> Result<String, RestError>;

    /// Delete a message. Deleting one that is already gone succeeds.
    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), RestError>;

    /// Replace the original response of an earlier interaction.
    async fn edit_original(&self, token: &str, view: &View) -> Result<(), RestError>;
}

#[derive(Deserialize)]
struct CreatedMessage {
    id: String,
}

/// `Messenger` over Discord's HTTP API.
#[derive(Debug, Clone)]
pub struct RestMessenger {
    client: Client,
    api_base: String,
    application_id: String,
    bot_token: String,
    media_base: Option<Url>,
}

impl RestMessenger {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.clone(),
            application_id: config.application_id.clone(),
            bot_token: config.bot_token.clone(),
            media_base: config.media_base_url.clone(),
        }
    }

    fn body(&self, view: &View) -> serde_json::Value {
        json!({
            "flags": FLAG_COMPONENTS_V2,
            "components": components(view, self.media_base.as_ref()),
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RestError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RestError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Messenger for RestMessenger {
    async fn send_message(&self, channel_id: &str, view: &View) -> Result<String, RestError> {
        let response = self
            .client
            .post(format!("{}/channels/{channel_id}/messages", self.api_base))
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&self.body(view))
            .send()
            .await?;
        let created: CreatedMessage = Self::check(response).await?.json().await?;
        tracing::debug!(channel_id, message_id = %created.id, "Message sent");
        Ok(created.id)
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), RestError> {
        let response = self
            .client
            .delete(format!(
                "{}/channels/{channel_id}/messages/{message_id}",
                self.api_base
            ))
            .header("Authorization", format!("Bot {}", self.bot_token))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn edit_original(&self, token: &str, view: &View) -> Result<(), RestError> {
        let response = self
            .client
            .patch(format!(
                "{}/webhooks/{}/{token}/messages/@original",
                self.api_base, self.application_id
            ))
            .json(&json!({ "components": components(view, self.media_base.as_ref()) }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
