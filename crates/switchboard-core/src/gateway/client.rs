//! The gateway session state machine.
//!
//! `GatewayClient::run` owns the frame-read loop. It connects (discovering
//! and caching the primary endpoint once), answers Hello by starting the
//! heartbeat task, identifies on the first heartbeat acknowledgement, and
//! surfaces `MESSAGE_CREATE` dispatches. Dropped connections are resumed
//! against the endpoint from `READY`; invalidated sessions are rebuilt from
//! scratch. Non-resumable close codes and exhausted resume attempts end the
//! client through its fatal signal.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use switchboard_types::error::GatewayError;
use switchboard_types::gateway::{
    ConnectionProperties, DispatchKind, GATEWAY_VERSION, GatewayFrame, HelloPayload,
    IdentifyPayload, Message, OpCode, PresenceUpdate, Ready, ResumePayload, close_code,
};
use tokio::sync::mpsc;
use tokio::time::error::Elapsed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::GatewayConfig;
use super::heartbeat::{Control, Heartbeat};
use super::session::{ConnectionPhase, FatalSignal, SessionState};
use super::transport::{CloseInfo, Dialer, Discovery, FrameStream, Incoming};
use super::writer::FrameWriter;

/// Dial URL for a gateway base URL, pinned to the protocol version and JSON
/// encoding.
pub fn gateway_endpoint(base: &str) -> String {
    format!(
        "{}/?v={}&encoding=json",
        base.trim_end_matches('/'),
        GATEWAY_VERSION
    )
}

/// A persistent gateway session.
pub struct GatewayClient<D, R> {
    token: SecretString,
    dialer: D,
    discovery: R,
    config: GatewayConfig,
    properties: ConnectionProperties,
    session: Arc<SessionState>,
    fatal: FatalSignal,
}

impl<D: Dialer, R: Discovery> GatewayClient<D, R> {
    pub fn new(token: SecretString, dialer: D, discovery: R, config: GatewayConfig) -> Self {
        Self {
            token,
            dialer,
            discovery,
            config,
            properties: ConnectionProperties {
                os: std::env::consts::OS.to_string(),
                browser: "switchboard".to_string(),
                device: "switchboard".to_string(),
            },
            session: Arc::new(SessionState::new()),
            fatal: FatalSignal::new(),
        }
    }

    /// Use `url` as the primary endpoint instead of asking discovery.
    pub fn with_gateway_url(self, url: impl Into<String>) -> Self {
        self.session.cache_gateway_url(url.into());
        self
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn fatal(&self) -> &FatalSignal {
        &self.fatal
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The discovery collaborator, for adapters that share it with other calls.
    pub fn discovery(&self) -> &R {
        &self.discovery
    }

    /// Run the session until `cancel` fires or a fatal error occurs.
    ///
    /// Chat messages are pushed to `messages`; recoverable problems go to
    /// `errors`. A fatal error is both returned and recorded in
    /// [`GatewayClient::fatal`]. Once fatal, the client never runs again.
    pub async fn run(
        &self,
        cancel: CancellationToken,
        messages: mpsc::Sender<Message>,
        errors: mpsc::Sender<GatewayError>,
    ) -> Result<(), GatewayError> {
        if let Some(err) = self.fatal.error() {
            return Err(err.clone());
        }

        let mut driver = Driver::new(self, cancel, messages, errors);
        let result = driver.pump().await;
        driver.teardown().await;

        match &result {
            Ok(()) => {
                self.session.set_phase(ConnectionPhase::Disconnected);
                info!("gateway client stopped");
            }
            Err(err) => {
                error!(error = %err, "gateway client failed");
                self.session.set_phase(ConnectionPhase::Fatal);
                self.fatal.trigger(err.clone());
            }
        }
        result
    }
}

impl<D, R> std::fmt::Debug for GatewayClient<D, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

enum Step {
    Continue,
    Resume,
    Reconnect,
    Stop,
}

enum Wake {
    Cancelled,
    Control(Control),
    Read(Result<Option<Result<Incoming, GatewayError>>, Elapsed>),
    Orphaned,
}

/// Per-run state of the frame loop.
struct Driver<'a, D: Dialer, R> {
    client: &'a GatewayClient<D, R>,
    cancel: CancellationToken,
    writer: FrameWriter<D::Sink>,
    stream: Option<D::Stream>,
    heartbeat: Option<Heartbeat>,
    control_tx: mpsc::Sender<Control>,
    control_rx: mpsc::Receiver<Control>,
    messages: mpsc::Sender<Message>,
    errors: mpsc::Sender<GatewayError>,
}

impl<'a, D: Dialer, R: Discovery> Driver<'a, D, R> {
    fn new(
        client: &'a GatewayClient<D, R>,
        cancel: CancellationToken,
        messages: mpsc::Sender<Message>,
        errors: mpsc::Sender<GatewayError>,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::channel(1);
        Self {
            client,
            cancel,
            writer: FrameWriter::new(client.config.write_timeout),
            stream: None,
            heartbeat: None,
            control_tx,
            control_rx,
            messages,
            errors,
        }
    }

    fn session(&self) -> &SessionState {
        &self.client.session
    }

    async fn pump(&mut self) -> Result<(), GatewayError> {
        if !self.connect().await? {
            return Ok(());
        }

        loop {
            let live = match self.next_step().await? {
                Step::Continue => true,
                Step::Stop => return Ok(()),
                Step::Resume => self.resume().await?,
                Step::Reconnect => self.reconnect().await?,
            };
            if !live {
                return Ok(());
            }
        }
    }

    async fn next_step(&mut self) -> Result<Step, GatewayError> {
        let read_timeout = self.client.config.read_timeout;
        let wake = match self.stream.as_mut() {
            None => Wake::Orphaned,
            Some(stream) => tokio::select! {
                _ = self.cancel.cancelled() => Wake::Cancelled,
                Some(control) = self.control_rx.recv() => Wake::Control(control),
                read = tokio::time::timeout(read_timeout, stream.next_frame()) => Wake::Read(read),
            },
        };

        match wake {
            Wake::Cancelled => Ok(Step::Stop),
            Wake::Orphaned => Ok(Step::Reconnect),
            Wake::Control(Control::Zombied) => {
                self.report(GatewayError::Session(
                    "heartbeat was not acknowledged, connection is zombied".to_string(),
                ));
                Ok(Step::Resume)
            }
            Wake::Read(Err(_)) => {
                self.report(GatewayError::Read(format!(
                    "no frame received within {}s",
                    read_timeout.as_secs()
                )));
                Ok(Step::Resume)
            }
            Wake::Read(Ok(None)) => {
                self.report(GatewayError::Read("stream ended".to_string()));
                Ok(Step::Resume)
            }
            Wake::Read(Ok(Some(Err(err)))) => {
                self.report(err);
                Ok(Step::Resume)
            }
            Wake::Read(Ok(Some(Ok(incoming)))) => self.on_incoming(incoming).await,
        }
    }

    async fn on_incoming(&mut self, incoming: Incoming) -> Result<Step, GatewayError> {
        match incoming {
            Incoming::Text(text) => Ok(self.on_text(&text).await),
            Incoming::Binary(len) => {
                self.report(GatewayError::Decode(format!(
                    "unexpected binary frame ({len} bytes)"
                )));
                Ok(Step::Continue)
            }
            Incoming::Close(Some(CloseInfo { code, reason })) if close_code::is_fatal(code) => {
                Err(GatewayError::FatalClose { code, reason })
            }
            Incoming::Close(close) => {
                let code = close.as_ref().map(|c| c.code);
                info!(code = ?code, "gateway closed the connection, resuming");
                Ok(Step::Resume)
            }
        }
    }

    async fn on_text(&mut self, text: &str) -> Step {
        let frame = match GatewayFrame::decode(text) {
            Ok(frame) => frame,
            Err(err) => {
                self.report(GatewayError::Decode(err.to_string()));
                return Step::Continue;
            }
        };

        if let Some(seq) = frame.s {
            self.session().observe_seq(seq);
        }
        debug!(op = frame.op, seq = ?frame.s, t = ?frame.t, "gateway frame");

        match frame.opcode() {
            Some(OpCode::Hello) => self.on_hello(&frame).await,
            Some(OpCode::Heartbeat) => {
                let beat = GatewayFrame::heartbeat(self.session().sequence());
                self.send(&beat).await;
                Step::Continue
            }
            Some(OpCode::HeartbeatAck) => {
                self.session().mark_acked();
                if self.session().begin_handshake() {
                    self.identify().await;
                }
                Step::Continue
            }
            Some(OpCode::Reconnect) => {
                info!("gateway asked us to reconnect");
                Step::Resume
            }
            Some(OpCode::InvalidSession) => {
                let resumable = frame.d.as_bool().unwrap_or(false);
                warn!(resumable, "gateway invalidated the session");
                if resumable { Step::Resume } else { Step::Reconnect }
            }
            Some(OpCode::Dispatch) => self.on_dispatch(&frame).await,
            _ => {
                debug!(op = frame.op, "ignoring opcode");
                Step::Continue
            }
        }
    }

    async fn on_hello(&mut self, frame: &GatewayFrame) -> Step {
        let hello: HelloPayload = match frame.payload() {
            Ok(hello) => hello,
            Err(err) => {
                self.report(GatewayError::Decode(format!("bad hello: {err}")));
                return Step::Continue;
            }
        };
        if hello.heartbeat_interval == 0 {
            self.report(GatewayError::Decode("hello with zero heartbeat interval".to_string()));
            return Step::Continue;
        }

        let interval = Duration::from_millis(hello.heartbeat_interval);
        debug!(interval_ms = hello.heartbeat_interval, "got hello");
        self.session().set_heartbeat_interval(interval);
        self.stop_heartbeat().await;
        self.heartbeat = Some(Heartbeat::spawn(
            interval,
            Arc::clone(&self.client.session),
            self.writer.clone(),
            self.control_tx.clone(),
            self.errors.clone(),
            &self.cancel,
        ));
        Step::Continue
    }

    async fn identify(&mut self) {
        let payload = IdentifyPayload {
            token: self.client.token.expose_secret().to_string(),
            intents: self.client.config.intents,
            properties: self.client.properties.clone(),
            presence: PresenceUpdate::online(),
        };
        match GatewayFrame::identify(&payload) {
            Ok(frame) => {
                info!(intents = payload.intents, "identifying");
                self.session().set_phase(ConnectionPhase::Identifying);
                self.send(&frame).await;
            }
            Err(err) => self.report(GatewayError::Write(format!("could not encode identify: {err}"))),
        }
    }

    async fn on_dispatch(&mut self, frame: &GatewayFrame) -> Step {
        let Some(event_type) = frame.t.as_deref() else {
            debug!("dispatch without an event type");
            return Step::Continue;
        };

        match DispatchKind::parse(event_type) {
            DispatchKind::Ready => match frame.payload::<Ready>() {
                Ok(ready) => {
                    info!(user = %ready.user.username, session_id = %ready.session_id, "gateway session ready");
                    self.session().set_ready(ready.session_id, ready.resume_gateway_url);
                    self.session().set_phase(ConnectionPhase::Steady);
                }
                Err(err) => self.report(GatewayError::Decode(format!("bad READY: {err}"))),
            },
            DispatchKind::MessageCreate => match frame.payload::<Message>() {
                Ok(message) => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Step::Stop,
                        sent = self.messages.send(message) => {
                            if sent.is_err() {
                                info!("message receiver dropped, stopping gateway client");
                                return Step::Stop;
                            }
                        }
                    }
                }
                Err(err) => self.report(GatewayError::Decode(format!("bad MESSAGE_CREATE: {err}"))),
            },
            DispatchKind::Resumed => {
                info!("gateway session resumed");
                self.session().set_phase(ConnectionPhase::Steady);
            }
            DispatchKind::Other(other) => debug!(event_type = %other, "ignoring dispatch"),
        }
        Step::Continue
    }

    /// Connect to the primary endpoint as a brand-new session.
    ///
    /// Returns `false` when cancelled before the connection was up.
    async fn connect(&mut self) -> Result<bool, GatewayError> {
        self.session().set_phase(ConnectionPhase::Connecting);

        let base = match self.session().gateway_url() {
            Some(url) => url,
            None => {
                let url = tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(false),
                    url = self.client.discovery.gateway_url() => url?,
                };
                debug!(url = %url, "discovered gateway endpoint");
                self.session().cache_gateway_url(url.clone());
                url
            }
        };

        let url = gateway_endpoint(&base);
        info!(url = %url, "connecting to gateway");
        if !self.dial_and_install(&url).await? {
            return Ok(false);
        }
        self.session().set_phase(ConnectionPhase::AwaitingHandshake);
        Ok(true)
    }

    /// Resume the current session on a fresh stream, retrying per the
    /// resume policy. Falls back to a full reconnect when there is nothing
    /// to resume.
    async fn resume(&mut self) -> Result<bool, GatewayError> {
        let Some((session_id, resume_url)) = self.session().resume_target() else {
            info!("no session to resume, reconnecting from scratch");
            return self.reconnect().await;
        };

        self.stop_heartbeat().await;
        self.session().set_phase(ConnectionPhase::Resuming);

        let policy = self.client.config.resume.clone();
        let attempts = policy.max_attempts.max(1);
        let url = gateway_endpoint(&resume_url);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let delay = policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(false),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            info!(attempt, url = %url, "resuming gateway session");
            match self.dial_and_install(&url).await {
                Ok(true) => {
                    let payload = ResumePayload {
                        token: self.client.token.expose_secret().to_string(),
                        session_id: session_id.clone(),
                        seq: self.session().sequence(),
                    };
                    match GatewayFrame::resume(&payload) {
                        Ok(frame) => self.send(&frame).await,
                        Err(err) => self.report(GatewayError::Write(format!("could not encode resume: {err}"))),
                    }
                    return Ok(true);
                }
                Ok(false) => return Ok(false),
                Err(err) => {
                    warn!(attempt, error = %err, "resume attempt failed");
                    self.report(err.clone());
                    last_error = Some(err);
                }
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(GatewayError::Session(format!(
            "resume failed after {attempts} attempt(s): {reason}"
        )))
    }

    /// Drop the session and start over from Hello/Identify.
    async fn reconnect(&mut self) -> Result<bool, GatewayError> {
        self.stop_heartbeat().await;
        self.writer.close().await;
        self.stream = None;
        self.session().reset();
        self.session().set_phase(ConnectionPhase::Reconnecting);
        info!("reconnecting to gateway as a new session");
        self.connect().await
    }

    async fn dial_and_install(&mut self, url: &str) -> Result<bool, GatewayError> {
        let dial_timeout = self.client.config.dial_timeout;
        let dialed = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(false),
            dialed = tokio::time::timeout(dial_timeout, self.client.dialer.dial(url)) => dialed,
        };

        let (sink, stream) = match dialed {
            Ok(conn) => conn?,
            Err(_) => {
                return Err(GatewayError::Connect(format!(
                    "dial to {url} timed out after {}s",
                    dial_timeout.as_secs()
                )));
            }
        };

        self.writer.replace(sink).await;
        self.stream = Some(stream);
        Ok(true)
    }

    async fn send(&self, frame: &GatewayFrame) {
        if let Err(err) = self.writer.send(frame).await {
            warn!(op = frame.op, error = %err, "gateway write failed");
            self.report(err);
        }
    }

    async fn stop_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop().await;
        }
        // Drop a zombie notice from the task that was just stopped.
        while self.control_rx.try_recv().is_ok() {}
    }

    async fn teardown(&mut self) {
        self.stop_heartbeat().await;
        self.writer.close().await;
        self.stream = None;
    }

    fn report(&self, err: GatewayError) {
        if let Err(e) = self.errors.try_send(err) {
            warn!(error = %e, "gateway error sink unavailable, dropping error");
        }
    }
}

#[cfg(test)]
mod tests {
    use switchboard_types::gateway::intents;

    use super::*;
    use crate::gateway::config::ResumePolicy;
    use crate::gateway::scripted::{ScriptedDialer, ScriptedDiscovery, ServerEnd};

    const PRIMARY: &str = "wss://gateway.test/?v=10&encoding=json";
    const RESUME: &str = "wss://resume.test/?v=10&encoding=json";

    type TestClient = GatewayClient<ScriptedDialer, ScriptedDiscovery>;

    struct Harness {
        client: Arc<TestClient>,
        dialer: ScriptedDialer,
        discovery: ScriptedDiscovery,
        cancel: CancellationToken,
        messages: mpsc::Receiver<Message>,
        errors: mpsc::Receiver<GatewayError>,
        task: tokio::task::JoinHandle<Result<(), GatewayError>>,
    }

    fn quiet_config() -> GatewayConfig {
        GatewayConfig {
            read_timeout: Duration::from_secs(3600),
            ..GatewayConfig::default()
        }
    }

    fn start(config: GatewayConfig) -> (Harness, ServerEnd) {
        let dialer = ScriptedDialer::new();
        let server = dialer.expect_connection();
        let discovery = ScriptedDiscovery::new("wss://gateway.test");
        let client = Arc::new(GatewayClient::new(
            SecretString::from("tok".to_string()),
            dialer.clone(),
            discovery.clone(),
            config,
        ));

        let cancel = CancellationToken::new();
        let (msg_tx, messages) = mpsc::channel(16);
        let (err_tx, errors) = mpsc::channel(16);
        let task = {
            let client = Arc::clone(&client);
            let cancel = cancel.clone();
            tokio::spawn(async move { client.run(cancel, msg_tx, err_tx).await })
        };

        let harness = Harness {
            client,
            dialer,
            discovery,
            cancel,
            messages,
            errors,
            task,
        };
        (harness, server)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn count_op(frames: &[GatewayFrame], op: OpCode) -> usize {
        frames.iter().filter(|f| f.opcode() == Some(op)).count()
    }

    #[test]
    fn endpoint_pins_version_and_encoding() {
        assert_eq!(gateway_endpoint("wss://gateway.test"), PRIMARY);
        assert_eq!(gateway_endpoint("wss://gateway.test/"), PRIMARY);
    }

    #[tokio::test(start_paused = true)]
    async fn identify_is_sent_once_on_the_first_ack() {
        let (h, mut server) = start(quiet_config());
        server.hello(45_000);
        settle().await;
        assert_eq!(count_op(&server.drain(), OpCode::Identify), 0, "hello alone must not identify");

        server.ack();
        let identify = server.next_op(OpCode::Identify).await;
        let payload: IdentifyPayload = identify.payload().unwrap();
        assert_eq!(payload.token, "tok");
        assert_eq!(payload.intents, intents::DEFAULT);
        assert_eq!(payload.properties.browser, "switchboard");
        assert_eq!(payload.presence.status, "online");

        server.ack();
        server.ack();
        settle().await;
        assert_eq!(count_op(&server.drain(), OpCode::Identify), 0);
        assert_eq!(h.client.session().phase(), ConnectionPhase::Identifying);
        assert_eq!(h.discovery.calls(), 1);
        assert_eq!(h.dialer.dialed(), vec![PRIMARY.to_string()]);

        h.cancel.cancel();
        assert_eq!(h.task.await.unwrap(), Ok(()));
        assert_eq!(h.client.session().phase(), ConnectionPhase::Disconnected);
        assert!(!h.client.fatal().is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_only_moves_forward_and_messages_surface() {
        let (mut h, mut server) = start(quiet_config());
        server.hello(45_000);
        server.ready(1, "sess-1", "wss://resume.test");
        server.message(2, "first", false);
        server.message(5, "second", false);
        server.dispatch("TYPING_START", 3, serde_json::json!({}));
        server.message(4, "third", false);

        assert_eq!(h.messages.recv().await.unwrap().content, "first");
        assert_eq!(h.messages.recv().await.unwrap().content, "second");
        let third = h.messages.recv().await.unwrap();
        assert_eq!(third.content, "third");
        assert_eq!(third.channel_id, "chan-1");
        assert_eq!(h.client.session().sequence(), Some(5));

        // A server-requested heartbeat carries the highest sequence seen.
        server.send_frame(&GatewayFrame::new(OpCode::Heartbeat, serde_json::Value::Null));
        settle().await;
        let frames = server.drain();
        let last_beat = frames
            .iter()
            .rev()
            .find(|f| f.opcode() == Some(OpCode::Heartbeat))
            .expect("heartbeat sent on request");
        assert_eq!(last_beat.d, 5);

        let snapshot = h.client.session().snapshot();
        assert_eq!(snapshot.session_id.as_deref(), Some("sess-1"));
        assert_eq!(snapshot.phase, ConnectionPhase::Steady);
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn missed_ack_resumes_exactly_once_against_the_resume_endpoint() {
        let (mut h, mut first) = start(quiet_config());
        let mut resumed = h.dialer.expect_connection();

        first.hello(30_000);
        first.ready(1, "sess-1", "wss://resume.test");

        let beat = first.next_op(OpCode::Heartbeat).await;
        assert_eq!(beat.d, 1);

        // No ack: the next tick declares the connection zombied.
        let resume = resumed.next_op(OpCode::Resume).await;
        let payload: ResumePayload = resume.payload().unwrap();
        assert_eq!(payload.session_id, "sess-1");
        assert_eq!(payload.seq, Some(1));
        assert_eq!(payload.token, "tok");

        let leftover = first.drain();
        assert_eq!(count_op(&leftover, OpCode::Heartbeat), 0, "one heartbeat before the resume");
        assert_eq!(count_op(&leftover, OpCode::Identify), 0);
        assert_eq!(h.dialer.dialed(), vec![PRIMARY.to_string(), RESUME.to_string()]);
        assert!(matches!(h.errors.recv().await, Some(GatewayError::Session(_))));
        assert_eq!(h.client.session().phase(), ConnectionPhase::Resuming);

        // The resumed stream completes the handshake without identifying again.
        resumed.hello(30_000);
        resumed.dispatch("RESUMED", 2, serde_json::Value::Null);
        resumed.ack();
        settle().await;
        assert_eq!(count_op(&resumed.drain(), OpCode::Identify), 0);
        assert_eq!(h.client.session().phase(), ConnectionPhase::Steady);
        h.cancel.cancel();
    }

    async fn assert_close_is_fatal(code: u16) {
        let (h, mut server) = start(quiet_config());
        let _unused = h.dialer.expect_connection();
        server.hello(45_000);
        server.ready(1, "sess-1", "wss://resume.test");
        server.close(code, "go away");

        let result = h.task.await.unwrap();
        assert_eq!(
            result,
            Err(GatewayError::FatalClose {
                code,
                reason: "go away".to_string()
            })
        );
        assert_eq!(h.dialer.dialed().len(), 1, "close {code} must not resume");
        assert!(h.client.fatal().is_triggered());
        assert_eq!(h.client.session().phase(), ConnectionPhase::Fatal);
        assert_eq!(count_op(&server.drain(), OpCode::Resume), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_intents_close_is_fatal() {
        assert_close_is_fatal(close_code::INVALID_INTENTS).await;
    }

    #[tokio::test(start_paused = true)]
    async fn authentication_failure_close_is_fatal() {
        assert_close_is_fatal(close_code::AUTHENTICATION_FAILED).await;
    }

    #[tokio::test(start_paused = true)]
    async fn other_close_codes_resume() {
        for code in [close_code::UNKNOWN_ERROR, close_code::SESSION_TIMED_OUT, 1001] {
            let (h, server) = start(quiet_config());
            let mut resumed = h.dialer.expect_connection();
            server.hello(45_000);
            server.ready(3, "sess-9", "wss://resume.test");
            server.close(code, "bye");

            let resume = resumed.next_op(OpCode::Resume).await;
            assert_eq!(resume.payload::<ResumePayload>().unwrap().seq, Some(3));
            assert!(!h.client.fatal().is_triggered(), "close {code} is resumable");
            h.cancel.cancel();
            assert_eq!(h.task.await.unwrap(), Ok(()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_opcode_resumes() {
        let (h, server) = start(quiet_config());
        let mut resumed = h.dialer.expect_connection();
        server.hello(45_000);
        server.ready(1, "sess-1", "wss://resume.test");
        server.send_frame(&GatewayFrame::new(OpCode::Reconnect, serde_json::Value::Null));

        resumed.next_op(OpCode::Resume).await;
        assert_eq!(h.dialer.dialed()[1], RESUME);
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn resumable_invalid_session_resumes() {
        let (h, server) = start(quiet_config());
        let mut resumed = h.dialer.expect_connection();
        server.hello(45_000);
        server.ready(6, "sess-1", "wss://resume.test");
        server.send_frame(&GatewayFrame::new(OpCode::InvalidSession, serde_json::json!(true)));

        let resume = resumed.next_op(OpCode::Resume).await;
        let payload: ResumePayload = resume.payload().unwrap();
        assert_eq!(payload.session_id, "sess-1");
        assert_eq!(payload.seq, Some(6));
        assert_eq!(h.dialer.dialed(), vec![PRIMARY.to_string(), RESUME.to_string()]);
        assert_eq!(h.client.session().snapshot().session_id.as_deref(), Some("sess-1"));
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_identify_write_is_reported_and_the_loop_continues() {
        let (mut h, mut server) = start(quiet_config());
        server.hello(45_000);
        settle().await;
        server.fail_next_writes(1);
        server.ack();

        assert!(matches!(h.errors.recv().await, Some(GatewayError::Write(_))));
        server.ready(1, "sess-1", "wss://resume.test");
        server.message(2, "after the failure", false);
        assert_eq!(h.messages.recv().await.unwrap().content, "after the failure");
        assert_eq!(h.client.session().sequence(), Some(2));
        assert_eq!(h.dialer.dialed().len(), 1, "a write failure never redials");
        assert!(!h.task.is_finished());
        assert!(!h.client.fatal().is_triggered());

        // Later writes on the same stream go through.
        server.send_frame(&GatewayFrame::new(OpCode::Heartbeat, serde_json::Value::Null));
        let beat = server.next_op(OpCode::Heartbeat).await;
        assert_eq!(beat.d, 2);
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_heartbeat_write_is_reported_and_the_loop_continues() {
        let (mut h, mut server) = start(quiet_config());
        server.hello(30_000);
        server.ready(1, "sess-1", "wss://resume.test");
        settle().await;
        server.fail_next_writes(1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(matches!(h.errors.recv().await, Some(GatewayError::Write(_))));

        server.message(2, "still reading", false);
        assert_eq!(h.messages.recv().await.unwrap().content, "still reading");
        assert!(!h.task.is_finished());
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn non_resumable_invalid_session_starts_a_new_session() {
        let (h, mut first) = start(quiet_config());
        let mut second = h.dialer.expect_connection();
        first.hello(45_000);
        first.ack();
        first.next_op(OpCode::Identify).await;
        first.ready(4, "sess-1", "wss://resume.test");
        first.send_frame(&GatewayFrame::new(OpCode::InvalidSession, serde_json::json!(false)));

        second.hello(45_000);
        settle().await;
        let snapshot = h.client.session().snapshot();
        assert_eq!(snapshot.sequence, None);
        assert_eq!(snapshot.session_id, None);
        assert!(!snapshot.handshake_complete);

        second.ack();
        second.next_op(OpCode::Identify).await;
        assert_eq!(h.dialer.dialed(), vec![PRIMARY.to_string(), PRIMARY.to_string()]);
        assert_eq!(h.discovery.calls(), 1, "primary endpoint stays cached");
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn resume_without_a_session_reconnects() {
        let (h, server) = start(quiet_config());
        let mut second = h.dialer.expect_connection();
        server.hello(45_000);
        server.close(close_code::UNKNOWN_ERROR, "early");

        second.hello(45_000);
        second.ack();
        second.next_op(OpCode::Identify).await;
        assert_eq!(h.dialer.dialed(), vec![PRIMARY.to_string(), PRIMARY.to_string()]);
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn bad_frames_are_reported_and_skipped() {
        let (mut h, server) = start(quiet_config());
        server.hello(45_000);
        server.send_raw("{not json");
        server.send_incoming(Incoming::Binary(12));
        server.message(1, "still here", false);

        assert!(matches!(h.errors.recv().await, Some(GatewayError::Decode(_))));
        assert!(matches!(h.errors.recv().await, Some(GatewayError::Decode(_))));
        assert_eq!(h.messages.recv().await.unwrap().content, "still here");
        assert!(!h.task.is_finished());
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn silent_stream_is_resumed_after_the_read_deadline() {
        let config = GatewayConfig {
            read_timeout: Duration::from_secs(45),
            ..GatewayConfig::default()
        };
        let (mut h, server) = start(config);
        let mut resumed = h.dialer.expect_connection();
        server.hello(3_600_000);
        server.ready(1, "sess-1", "wss://resume.test");

        resumed.next_op(OpCode::Resume).await;
        let mut saw_read_error = false;
        while let Ok(err) = h.errors.try_recv() {
            saw_read_error |= matches!(err, GatewayError::Read(_));
        }
        assert!(saw_read_error);
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn resume_retries_with_backoff_then_succeeds() {
        let config = GatewayConfig {
            resume: ResumePolicy {
                max_attempts: 3,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(10),
            },
            ..quiet_config()
        };
        let (h, server) = start(config);
        h.dialer.refuse_next("connection refused");
        let mut resumed = h.dialer.expect_connection();
        server.hello(45_000);
        server.ready(1, "sess-1", "wss://resume.test");

        let before = tokio::time::Instant::now();
        server.close(close_code::UNKNOWN_ERROR, "blip");
        resumed.next_op(OpCode::Resume).await;
        assert!(before.elapsed() >= Duration::from_secs(1));
        assert_eq!(
            h.dialer.dialed(),
            vec![PRIMARY.to_string(), RESUME.to_string(), RESUME.to_string()]
        );
        assert!(!h.client.fatal().is_triggered());
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_resume_is_fatal() {
        let config = GatewayConfig {
            resume: ResumePolicy {
                max_attempts: 1,
                ..ResumePolicy::default()
            },
            ..quiet_config()
        };
        let (h, server) = start(config);
        server.hello(45_000);
        server.ready(1, "sess-1", "wss://resume.test");
        server.close(close_code::UNKNOWN_ERROR, "blip");

        let result = h.task.await.unwrap();
        assert!(matches!(result, Err(GatewayError::Session(_))));
        assert!(matches!(h.client.fatal().wait().await, GatewayError::Session(_)));

        // Once fatal, the client refuses to run again.
        let (msg_tx, _msg_rx) = mpsc::channel(1);
        let (err_tx, _err_rx) = mpsc::channel(1);
        let again = h.client.run(CancellationToken::new(), msg_tx, err_tx).await;
        assert!(matches!(again, Err(GatewayError::Session(_))));
        assert_eq!(h.dialer.dialed().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_is_skipped_when_the_endpoint_is_configured() {
        let dialer = ScriptedDialer::new();
        let server = dialer.expect_connection();
        let discovery = ScriptedDiscovery::new("wss://unused.test");
        let client = Arc::new(
            GatewayClient::new(
                SecretString::from("tok".to_string()),
                dialer.clone(),
                discovery.clone(),
                quiet_config(),
            )
            .with_gateway_url("wss://gateway.test"),
        );
        let cancel = CancellationToken::new();
        let (msg_tx, _msg_rx) = mpsc::channel(1);
        let (err_tx, _err_rx) = mpsc::channel(1);
        let task = {
            let client = Arc::clone(&client);
            let cancel = cancel.clone();
            tokio::spawn(async move { client.run(cancel, msg_tx, err_tx).await })
        };

        server.hello(45_000);
        settle().await;
        assert_eq!(discovery.calls(), 0);
        assert_eq!(dialer.dialed(), vec![PRIMARY.to_string()]);
        cancel.cancel();
        assert_eq!(task.await.unwrap(), Ok(()));
    }
}
