//! ConsoleBus -- a bus over a line-oriented reader and a writer (stdin and
//! stdout by default).
//!
//! Each line becomes one event. The bus waits for that event to be answered
//! before prompting for the next line, so replies and prompts stay in order
//! for interactive use. The line `error` reports an induced non-fatal error
//! instead of publishing. End of input stops the bus with the shutdown
//! sentinel.

use switchboard_core::bus::Bus;
use switchboard_core::event::Event;
use switchboard_core::hub::BusChannels;
use switchboard_types::error::HubError;
use switchboard_types::hub::{Address, BusName};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const PROMPT: &str = "> ";
const INDUCED_ERROR: &str = "error";

pub struct ConsoleBus<R, W> {
    name: BusName,
    lines: Mutex<Lines<R>>,
    out: Mutex<W>,
}

impl ConsoleBus<BufReader<Stdin>, Stdout> {
    pub fn stdio(name: BusName) -> Self {
        Self::new(name, BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleBus<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(name: BusName, reader: R, writer: W) -> Self {
        Self {
            name,
            lines: Mutex::new(reader.lines()),
            out: Mutex::new(writer),
        }
    }

    async fn write(&self, text: &str) -> Result<(), HubError> {
        let mut out = self.out.lock().await;
        out.write_all(text.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }

    async fn print_line(&self, text: &str) -> Result<(), HubError> {
        self.write(&format!("{text}\n")).await
    }

    /// Handle one input line, returning the event it produced, if any.
    async fn handle_line(
        &self,
        cancel: &CancellationToken,
        channels: &BusChannels,
        line: &str,
    ) -> Result<Option<Event>, HubError> {
        let text = line.trim();
        match text {
            "" => Ok(None),
            INDUCED_ERROR => {
                channels
                    .report(HubError::component(self.name.as_str(), "induced error"))
                    .await;
                Ok(None)
            }
            _ => {
                let event = channels.new_event(text, Address::default());
                debug!(bus = %self.name, event_id = event.id(), "publishing line");
                channels.publish(cancel, event.clone()).await?;
                Ok(Some(event))
            }
        }
    }
}

impl<R, W> Bus for ConsoleBus<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &BusName {
        &self.name
    }

    async fn run(&self, cancel: CancellationToken, mut channels: BusChannels) -> Result<(), HubError> {
        let mut lines = self.lines.lock().await;
        let mut pending: Option<Event> = None;
        self.write(PROMPT).await?;

        loop {
            if let Some(event) = pending.take() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!(bus = %self.name, "shutting down console bus");
                        return Err(HubError::ShuttingDown);
                    }
                    _ = event.done() => self.write(PROMPT).await?,
                    Some(reply) = channels.replies.recv() => {
                        self.print_line(&reply.text).await?;
                        pending = Some(event);
                    }
                }
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(bus = %self.name, "shutting down console bus");
                    return Err(HubError::ShuttingDown);
                }
                Some(reply) = channels.replies.recv() => self.print_line(&reply.text).await?,
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        info!(bus = %self.name, "end of input, shutting down");
                        return Err(HubError::ShuttingDown);
                    };
                    match self.handle_line(&cancel, &channels, &line).await? {
                        Some(event) => pending = Some(event),
                        None => self.write(PROMPT).await?,
                    }
                }
            }
        }
    }

    async fn send_message(&self, _address: &Address, text: &str) -> Result<(), HubError> {
        self.print_line(text).await
    }
}
