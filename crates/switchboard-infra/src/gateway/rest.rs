//! DiscordRest -- the two REST calls the gateway bus needs: endpoint
//! discovery (`GET /gateway`) and posting a message to a channel.
//!
//! The bot token is wrapped in [`secrecy::SecretString`] and only exposed
//! while building the `Authorization` header.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use switchboard_core::gateway::Discovery;
use switchboard_types::error::GatewayError;
use switchboard_types::gateway::GatewayInfo;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

#[derive(Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

pub struct DiscordRest {
    client: reqwest::Client,
    token: SecretString,
    api_base: String,
}

impl DiscordRest {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(token: SecretString) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Http(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            token,
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Override the API base URL (useful for testing or proxies).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), path)
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.token.expose_secret())
    }

    /// Ask the platform for the gateway base URL.
    pub async fn fetch_gateway_url(&self) -> Result<String, GatewayError> {
        let response = self
            .client
            .get(self.url("/gateway"))
            .send()
            .await
            .map_err(|e| GatewayError::Connect(format!("gateway discovery failed: {e}")))?
            .error_for_status()
            .map_err(|e| GatewayError::Connect(format!("gateway discovery failed: {e}")))?;

        let info: GatewayInfo = response
            .json()
            .await
            .map_err(|e| GatewayError::Connect(format!("bad gateway discovery response: {e}")))?;

        debug!(url = %info.url, "discovered gateway endpoint");
        Ok(info.url)
    }

    /// Post `text` to `channel_id`.
    pub async fn create_message(&self, channel_id: &str, text: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.url(&format!("/channels/{channel_id}/messages")))
            .header("Authorization", self.authorization())
            .json(&CreateMessage { content: text })
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Http(format!(
                "POST /channels/{channel_id}/messages returned {status}: {body}"
            )));
        }

        debug!(channel = channel_id, "message posted");
        Ok(())
    }
}

impl Discovery for DiscordRest {
    async fn gateway_url(&self) -> Result<String, GatewayError> {
        self.fetch_gateway_url().await
    }
}

impl std::fmt::Debug for DiscordRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordRest")
            .field("api_base", &self.api_base)
            .field("token", &"[REDACTED]")
            .finish()
    }
}
