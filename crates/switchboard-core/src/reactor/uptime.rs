use std::time::Duration;

use switchboard_types::error::HubError;
use switchboard_types::hub::ReactorName;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::Reactor;
use crate::hub::ReactorChannels;

/// Answers `uptime` with how long the reactor has been running.
#[derive(Debug)]
pub struct UptimeReactor {
    name: ReactorName,
}

impl UptimeReactor {
    pub fn new(name: ReactorName) -> Self {
        Self { name }
    }
}

impl Reactor for UptimeReactor {
    async fn run(&self, cancel: CancellationToken, mut channels: ReactorChannels) -> Result<(), HubError> {
        let started = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(reactor = %self.name, "shutting down uptime reactor");
                    return Err(HubError::ShuttingDown);
                }
                event = channels.events.recv() => {
                    let Some(event) = event else { return Ok(()) };
                    if !event.text.trim().eq_ignore_ascii_case("uptime") {
                        continue;
                    }

                    event.mark_handled();
                    let text = format!("Online for {}", format_uptime(started.elapsed()));
                    channels.send_reply(&cancel, event.reply(text)).await?;
                }
            }
        }
    }
}

/// Seconds precision under an hour, minutes precision above.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{hours}h{minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
