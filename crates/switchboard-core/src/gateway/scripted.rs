//! In-memory transport for driving the gateway client from tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use switchboard_types::error::GatewayError;
use switchboard_types::gateway::{GatewayFrame, OpCode};
use tokio::sync::mpsc;

use super::transport::{CloseInfo, Dialer, Discovery, FrameSink, FrameStream, Incoming};

type Connection = Result<(ScriptedSink, ScriptedStream), GatewayError>;

/// Hands out pre-arranged connections in order and records every URL dialed.
#[derive(Clone, Default)]
pub struct ScriptedDialer {
    pending: Arc<Mutex<VecDeque<Connection>>>,
    dialed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arrange the next successful dial and return the server's end of it.
    pub fn expect_connection(&self) -> ServerEnd {
        let (to_client, client_rx) = mpsc::unbounded_channel();
        let (client_tx, from_client) = mpsc::unbounded_channel();
        let failing_writes = Arc::new(AtomicUsize::new(0));
        self.pending.lock().unwrap().push_back(Ok((
            ScriptedSink {
                tx: client_tx,
                failing_writes: Arc::clone(&failing_writes),
            },
            ScriptedStream { rx: client_rx },
        )));
        ServerEnd {
            to_client,
            from_client,
            failing_writes,
        }
    }

    /// Arrange the next dial to fail.
    pub fn refuse_next(&self, reason: &str) {
        self.pending
            .lock()
            .unwrap()
            .push_back(Err(GatewayError::Connect(reason.to_string())));
    }

    pub fn dialed(&self) -> Vec<String> {
        self.dialed.lock().unwrap().clone()
    }
}

impl Dialer for ScriptedDialer {
    type Sink = ScriptedSink;
    type Stream = ScriptedStream;

    async fn dial(&self, url: &str) -> Result<(ScriptedSink, ScriptedStream), GatewayError> {
        self.dialed.lock().unwrap().push(url.to_string());
        let next = self.pending.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(GatewayError::Connect(format!("no connection scripted for {url}"))))
    }
}

pub struct ScriptedSink {
    tx: mpsc::UnboundedSender<String>,
    failing_writes: Arc<AtomicUsize>,
}

impl FrameSink for ScriptedSink {
    async fn send_text(&mut self, text: String) -> Result<(), GatewayError> {
        let failed = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(GatewayError::Write("scripted write failure".to_string()));
        }
        self.tx
            .send(text)
            .map_err(|_| GatewayError::Write("server end dropped".to_string()))
    }

    async fn close(&mut self) {}
}

pub struct ScriptedStream {
    rx: mpsc::UnboundedReceiver<Result<Incoming, GatewayError>>,
}

impl FrameStream for ScriptedStream {
    async fn next_frame(&mut self) -> Option<Result<Incoming, GatewayError>> {
        self.rx.recv().await
    }
}

/// The server side of one scripted connection.
pub struct ServerEnd {
    to_client: mpsc::UnboundedSender<Result<Incoming, GatewayError>>,
    from_client: mpsc::UnboundedReceiver<String>,
    failing_writes: Arc<AtomicUsize>,
}

impl ServerEnd {
    /// Make the client's next `n` writes on this connection fail.
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self.to_client.send(Ok(Incoming::Text(text.to_string())));
    }

    pub fn send_frame(&self, frame: &GatewayFrame) {
        self.send_raw(&frame.encode().unwrap());
    }

    pub fn send_incoming(&self, incoming: Incoming) {
        let _ = self.to_client.send(Ok(incoming));
    }

    pub fn hello(&self, interval_ms: u64) {
        self.send_frame(&GatewayFrame::new(
            OpCode::Hello,
            json!({ "heartbeat_interval": interval_ms }),
        ));
    }

    pub fn ack(&self) {
        self.send_frame(&GatewayFrame::new(OpCode::HeartbeatAck, Value::Null));
    }

    pub fn dispatch(&self, event_type: &str, seq: u64, data: Value) {
        let mut frame = GatewayFrame::new(OpCode::Dispatch, data);
        frame.s = Some(seq);
        frame.t = Some(event_type.to_string());
        self.send_frame(&frame);
    }

    pub fn ready(&self, seq: u64, session_id: &str, resume_url: &str) {
        self.dispatch(
            "READY",
            seq,
            json!({
                "v": 10,
                "user": { "id": "1", "username": "switchboard", "bot": true },
                "session_id": session_id,
                "resume_gateway_url": resume_url,
            }),
        );
    }

    pub fn message(&self, seq: u64, content: &str, bot_author: bool) {
        self.dispatch(
            "MESSAGE_CREATE",
            seq,
            json!({
                "id": format!("m{seq}"),
                "channel_id": "chan-1",
                "author": { "id": "42", "username": "someone", "bot": bot_author },
                "content": content,
            }),
        );
    }

    pub fn close(&self, code: u16, reason: &str) {
        self.send_incoming(Incoming::Close(Some(CloseInfo::new(code, reason))));
    }

    /// Next frame the client wrote.
    pub async fn next_frame(&mut self) -> GatewayFrame {
        let text = self.from_client.recv().await.expect("client hung up");
        GatewayFrame::decode(&text).expect("client sent invalid json")
    }

    /// Next frame with opcode `op`, skipping anything else (heartbeats
    /// interleave freely with handshake frames).
    pub async fn next_op(&mut self, op: OpCode) -> GatewayFrame {
        loop {
            let frame = self.next_frame().await;
            if frame.opcode() == Some(op) {
                return frame;
            }
        }
    }

    pub fn try_next_frame(&mut self) -> Option<GatewayFrame> {
        let text = self.from_client.try_recv().ok()?;
        GatewayFrame::decode(&text).ok()
    }

    /// Drain every frame written so far.
    pub fn drain(&mut self) -> Vec<GatewayFrame> {
        std::iter::from_fn(|| self.try_next_frame()).collect()
    }
}

/// Fixed discovery answer that counts how often it was asked.
#[derive(Clone)]
pub struct ScriptedDiscovery {
    url: String,
    calls: Arc<AtomicUsize>,
}

impl ScriptedDiscovery {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Discovery for ScriptedDiscovery {
    async fn gateway_url(&self) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.url.clone())
    }
}
