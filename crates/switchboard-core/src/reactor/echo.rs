use serde::Deserialize;
use switchboard_types::config::ComponentOptions;
use switchboard_types::error::HubError;
use switchboard_types::hub::ReactorName;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Reactor;
use crate::hub::ReactorChannels;

#[derive(Debug, Default, Deserialize)]
struct EchoOptions {
    #[serde(default)]
    upper: bool,
}

/// Replies to every event with its own text.
#[derive(Debug)]
pub struct EchoReactor {
    name: ReactorName,
    upper: bool,
}

impl EchoReactor {
    pub fn new(name: ReactorName, upper: bool) -> Self {
        Self { name, upper }
    }

    /// Options: `upper` (bool, default false).
    pub fn from_options(name: ReactorName, options: &ComponentOptions) -> Result<Self, serde_json::Error> {
        let opts: EchoOptions = serde_json::from_value(serde_json::Value::Object(options.clone()))?;
        Ok(Self::new(name, opts.upper))
    }

    fn transform(&self, text: &str) -> String {
        if self.upper {
            text.to_uppercase()
        } else {
            text.to_string()
        }
    }
}

impl Reactor for EchoReactor {
    async fn run(&self, cancel: CancellationToken, mut channels: ReactorChannels) -> Result<(), HubError> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(reactor = %self.name, "shutting down echo reactor");
                    return Err(HubError::ShuttingDown);
                }
                event = channels.events.recv() => {
                    let Some(event) = event else { return Ok(()) };
                    debug!(reactor = %self.name, event_id = event.id(), "echoing");
                    let reply = event.reply(self.transform(&event.text));
                    channels.send_reply(&cancel, reply).await?;
                }
            }
        }
    }
}
