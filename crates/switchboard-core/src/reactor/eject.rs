use std::time::Duration;

use serde::Deserialize;
use switchboard_types::config::ComponentOptions;
use switchboard_types::error::HubError;
use switchboard_types::hub::ReactorName;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::Reactor;
use crate::hub::ReactorChannels;

const TRIGGER: &str = "eject warp core";

/// Default time given to the farewell reply before the hub is stopped.
const DEFAULT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct EjectOptions {
    #[serde(default)]
    grace_ms: Option<u64>,
}

/// Stops the whole hub cleanly when told to eject the warp core.
#[derive(Debug)]
pub struct EjectReactor {
    name: ReactorName,
    grace: Duration,
}

impl EjectReactor {
    pub fn new(name: ReactorName) -> Self {
        Self {
            name,
            grace: DEFAULT_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Options: `grace_ms` (integer, default 2000).
    pub fn from_options(name: ReactorName, options: &ComponentOptions) -> Result<Self, serde_json::Error> {
        let opts: EjectOptions = serde_json::from_value(serde_json::Value::Object(options.clone()))?;
        let reactor = Self::new(name);
        Ok(match opts.grace_ms {
            Some(ms) => reactor.with_grace(Duration::from_millis(ms)),
            None => reactor,
        })
    }
}

fn is_trigger(text: &str) -> bool {
    text.trim_start()
        .get(..TRIGGER.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(TRIGGER))
}

impl Reactor for EjectReactor {
    async fn run(&self, cancel: CancellationToken, mut channels: ReactorChannels) -> Result<(), HubError> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(reactor = %self.name, "shutting down eject reactor");
                    return Err(HubError::ShuttingDown);
                }
                event = channels.events.recv() => {
                    let Some(event) = event else { return Ok(()) };
                    if !is_trigger(&event.text) {
                        continue;
                    }

                    event.mark_handled();
                    channels.send_reply(&cancel, event.reply("so long!")).await?;
                    info!(reactor = %self.name, "warp core ejected, stopping hub");

                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(self.grace) => {}
                    }
                    return Err(HubError::ShuttingDown);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use switchboard_types::hub::{Address, BusName};
    use tokio::sync::mpsc;

    #[test]
    fn trigger_is_case_insensitive_prefix() {
        assert!(is_trigger("eject warp core"));
        assert!(is_trigger("EJECT Warp Core now!"));
        assert!(is_trigger("  eject warp core"));
        assert!(!is_trigger("please eject warp core"));
        assert!(!is_trigger("eject"));
        assert!(!is_trigger("éject warp core"));
    }

    #[test]
    fn grace_option_is_read() {
        let mut options = ComponentOptions::new();
        options.insert("grace_ms".into(), 50.into());
        let reactor = EjectReactor::from_options(ReactorName::from("eject"), &options).unwrap();
        assert_eq!(reactor.grace, Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn replies_then_returns_shutdown_sentinel() {
        let reactor = EjectReactor::new(ReactorName::from("eject"));
        let (event_tx, event_rx) = mpsc::channel(1);
        let (reply_tx, mut reply_rx) = mpsc::channel(4);
        let (err_tx, _err_rx) = mpsc::channel(4);

        let task = tokio::spawn(async move {
            reactor
                .run(
                    CancellationToken::new(),
                    ReactorChannels::new(event_rx, reply_tx, err_tx),
                )
                .await
        });

        event_tx
            .send(Event::new(1, BusName::from("term"), "ignore me", Address::default()))
            .await
            .unwrap();
        event_tx
            .send(Event::new(2, BusName::from("term"), "Eject warp core", Address::default()))
            .await
            .unwrap();

        let reply = reply_rx.recv().await.unwrap();
        assert_eq!(reply.text, "so long!");
        assert_eq!(reply.event_id, 2);

        let result = task.await.unwrap();
        assert!(result.unwrap_err().is_shutdown());
    }
}
