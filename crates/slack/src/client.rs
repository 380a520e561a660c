use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::blocks::MessageTemplate;

const DEFAULT_BASE_URL: &str = "https://slack.com/api";

#[derive(Debug, Error)]
pub enum ChatApiError {
    #[error("transport failure calling `{method}`: {source}")]
    Transport { method: &'static str, source: reqwest::Error },
    #[error("`{method}` returned an unreadable response: {source}")]
    Malformed { method: &'static str, source: reqwest::Error },
    #[error("`{method}` was rejected: {reason}")]
    Rejected { method: &'static str, reason: String },
}

/// Outbound chat operations the scheduling flow needs. The flow only sees
/// this trait, so tests drive it with a recording fake instead of a network.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Posts to a channel, returning the new message's timestamp id.
    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<String, ChatApiError>;

    /// Posts a message only the given user can see.
    async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), ChatApiError>;

    /// Replaces the blocks of an existing message in place.
    async fn update_message(
        &self,
        channel_id: &str,
        message_ts: &str,
        message: &MessageTemplate,
    ) -> Result<(), ChatApiError>;

    async fn delete_message(&self, channel_id: &str, message_ts: &str)
        -> Result<(), ChatApiError>;
}

/// Profile lookups, kept separate from [`ChatGateway`] because they use a
/// different OAuth token with a different scope.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Avatar URL for the user, or `None` when the profile has none.
    async fn profile_image(&self, user_id: &str) -> Result<Option<String>, ChatApiError>;
}

#[derive(Clone)]
pub struct SlackApiClient {
    http: Client,
    bot_token: SecretString,
    directory_token: SecretString,
    base_url: String,
}

impl SlackApiClient {
    pub fn new(bot_token: SecretString, directory_token: SecretString) -> Self {
        Self {
            http: Client::new(),
            bot_token,
            directory_token,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Points the client at a different API root, for exercising against a
    /// local stub server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call(
        &self,
        method: &'static str,
        token: &SecretString,
        body: serde_json::Value,
    ) -> Result<ApiResponse, ChatApiError> {
        let url = format!("{}/{method}", self.base_url);
        debug!(method, "calling chat api");

        let response = self
            .http
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|source| ChatApiError::Transport { method, source })?;

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|source| ChatApiError::Malformed { method, source })?;

        if !parsed.ok {
            return Err(ChatApiError::Rejected {
                method,
                reason: parsed.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        Ok(parsed)
    }
}

#[async_trait]
impl ChatGateway for SlackApiClient {
    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<String, ChatApiError> {
        let response = self
            .call(
                "chat.postMessage",
                &self.bot_token,
                json!({
                    "channel": channel_id,
                    "text": message.fallback_text,
                    "blocks": message.blocks,
                }),
            )
            .await?;

        response.ts.ok_or(ChatApiError::Rejected {
            method: "chat.postMessage",
            reason: "response carried no message timestamp".to_string(),
        })
    }

    async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), ChatApiError> {
        self.call(
            "chat.postEphemeral",
            &self.bot_token,
            json!({
                "channel": channel_id,
                "user": user_id,
                "text": message.fallback_text,
                "blocks": message.blocks,
            }),
        )
        .await?;
        Ok(())
    }

    async fn update_message(
        &self,
        channel_id: &str,
        message_ts: &str,
        message: &MessageTemplate,
    ) -> Result<(), ChatApiError> {
        self.call(
            "chat.update",
            &self.bot_token,
            json!({
                "channel": channel_id,
                "ts": message_ts,
                "text": message.fallback_text,
                "blocks": message.blocks,
            }),
        )
        .await?;
        Ok(())
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<(), ChatApiError> {
        self.call(
            "chat.delete",
            &self.bot_token,
            json!({
                "channel": channel_id,
                "ts": message_ts,
            }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for SlackApiClient {
    async fn profile_image(&self, user_id: &str) -> Result<Option<String>, ChatApiError> {
        let response = self
            .call("users.info", &self.directory_token, json!({ "user": user_id }))
            .await?;

        Ok(response
            .user
            .and_then(|user| user.profile)
            .and_then(|profile| profile.image_192.or(profile.image_72)))
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
    ts: Option<String>,
    user: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    profile: Option<ApiProfile>,
}

#[derive(Debug, Deserialize)]
struct ApiProfile {
    image_192: Option<String>,
    image_72: Option<String>,
}
