//! DiscordBus -- the gateway-backed bus.
//!
//! Chat messages arrive over the gateway session and are published to the
//! hub; replies go out through the REST API. The gateway session and the
//! bus loop are polled side by side, so a slow REST post never stalls frame
//! reading.

use secrecy::SecretString;
use serde::Deserialize;
use switchboard_core::bus::Bus;
use switchboard_core::event::Event;
use switchboard_core::gateway::{GatewayClient, GatewayConfig};
use switchboard_core::hub::BusChannels;
use switchboard_types::config::ComponentOptions;
use switchboard_types::error::{GatewayError, HubError};
use switchboard_types::gateway::Message;
use switchboard_types::hub::{Address, BusName, Reply};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::BusConfigError;
use crate::gateway::{DiscordRest, WsDialer};

const MESSAGE_BUFFER: usize = 64;
const ERROR_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DiscordOptions {
    api_token: String,
    #[serde(default)]
    api_base: Option<String>,
    /// Skip discovery and dial this endpoint directly.
    #[serde(default)]
    gateway_url: Option<String>,
    #[serde(default)]
    intents: Option<u64>,
    #[serde(default)]
    resume_attempts: Option<u32>,
}

pub struct DiscordBus {
    name: BusName,
    client: GatewayClient<WsDialer, DiscordRest>,
}

impl DiscordBus {
    /// Options: `api_token` (required), `api_base`, `gateway_url`,
    /// `intents`, `resume_attempts`.
    pub fn from_options(name: BusName, options: &ComponentOptions) -> Result<Self, BusConfigError> {
        let opts: DiscordOptions = serde_json::from_value(serde_json::Value::Object(options.clone()))?;
        if opts.api_token.trim().is_empty() {
            return Err(BusConfigError::Invalid("api_token must not be empty".to_string()));
        }

        let mut config = GatewayConfig::default();
        if let Some(intents) = opts.intents {
            config.intents = intents;
        }
        if let Some(attempts) = opts.resume_attempts {
            if attempts == 0 {
                return Err(BusConfigError::Invalid("resume_attempts must be at least 1".to_string()));
            }
            config.resume.max_attempts = attempts;
        }

        let mut rest = DiscordRest::new(SecretString::from(opts.api_token.clone()))?;
        if let Some(api_base) = opts.api_base {
            rest = rest.with_api_base(api_base);
        }

        let token = SecretString::from(opts.api_token);
        let mut client = GatewayClient::new(token, WsDialer::new(), rest, config);
        if let Some(url) = opts.gateway_url {
            client = client.with_gateway_url(url);
        }

        Ok(Self { name, client })
    }

    pub fn client(&self) -> &GatewayClient<WsDialer, DiscordRest> {
        &self.client
    }

    fn rest(&self) -> &DiscordRest {
        self.client.discovery()
    }

    /// Bus loop. Replies keep draining while an event waits for room in the
    /// hub's event channel, since the hub may itself be blocked handing us a
    /// reply.
    async fn pump(
        &self,
        cancel: &CancellationToken,
        channels: &mut BusChannels,
        messages: &mut mpsc::Receiver<Message>,
        errors: &mut mpsc::Receiver<GatewayError>,
    ) -> Result<(), HubError> {
        let mut messages_open = true;
        let mut errors_open = true;
        let mut pending: Option<Event> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(bus = %self.name, "shutting down discord bus");
                    return Err(HubError::ShuttingDown);
                }
                reply = channels.replies.recv() => {
                    let Some(reply) = reply else {
                        return Err(HubError::ShuttingDown);
                    };
                    self.deliver(channels, reply).await;
                }
                permit = channels.events.reserve(), if pending.is_some() => {
                    let Ok(permit) = permit else {
                        return Err(HubError::ShuttingDown);
                    };
                    if let Some(event) = pending.take() {
                        debug!(bus = %self.name, event_id = event.id(), "publishing message");
                        permit.send(event);
                    }
                }
                message = messages.recv(), if messages_open && pending.is_none() => {
                    match message {
                        Some(message) => pending = self.to_event(channels, message),
                        None => messages_open = false,
                    }
                }
                err = errors.recv(), if errors_open => {
                    match err {
                        Some(err) => channels.report(err.into()).await,
                        None => errors_open = false,
                    }
                }
            }
        }
    }

    fn to_event(&self, channels: &BusChannels, message: Message) -> Option<Event> {
        if message.author.bot {
            debug!(bus = %self.name, author = %message.author.username, "ignoring bot message");
            return None;
        }
        Some(channels.new_event(message.content, Address::new(message.channel_id)))
    }

    async fn deliver(&self, channels: &BusChannels, reply: Reply) {
        if let Err(err) = self.rest().create_message(reply.address.as_str(), &reply.text).await {
            warn!(bus = %self.name, event_id = reply.event_id, error = %err, "failed to post reply");
            channels.report(err.into()).await;
        }
    }
}

impl Bus for DiscordBus {
    fn name(&self) -> &BusName {
        &self.name
    }

    async fn run(&self, cancel: CancellationToken, mut channels: BusChannels) -> Result<(), HubError> {
        let (message_tx, mut message_rx) = mpsc::channel(MESSAGE_BUFFER);
        let (error_tx, mut error_rx) = mpsc::channel(ERROR_BUFFER);
        let session_cancel = cancel.child_token();

        let session = self.client.run(session_cancel.clone(), message_tx, error_tx);
        tokio::pin!(session);

        let pumped = tokio::select! {
            result = &mut session => {
                return match result {
                    Ok(()) => Err(HubError::ShuttingDown),
                    Err(err) => {
                        error!(bus = %self.name, error = %err, "gateway session ended");
                        Err(err.into())
                    }
                };
            }
            result = self.pump(&cancel, &mut channels, &mut message_rx, &mut error_rx) => result,
        };

        session_cancel.cancel();
        if let Err(err) = session.await {
            debug!(bus = %self.name, error = %err, "gateway session failed while stopping");
        }
        pumped
    }

    async fn send_message(&self, address: &Address, text: &str) -> Result<(), HubError> {
        self.rest()
            .create_message(address.as_str(), text)
            .await
            .map_err(HubError::from)
    }
}

impl std::fmt::Debug for DiscordBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordBus")
            .field("name", &self.name)
            .field("client", &self.client)
            .finish()
    }
}
