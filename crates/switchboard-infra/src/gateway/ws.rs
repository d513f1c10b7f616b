//! WebSocket transport for the gateway client, over tokio-tungstenite.
//!
//! `WsDialer` opens a TLS-capable connection and splits it into a write half
//! ([`WsSink`]) and a read half ([`WsFrames`]). Control frames (ping/pong)
//! are answered by tungstenite itself and never surface to the client.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use switchboard_core::gateway::{CloseInfo, Dialer, FrameSink, FrameStream, Incoming};
use switchboard_types::error::GatewayError;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct WsDialer;

impl WsDialer {
    pub fn new() -> Self {
        Self
    }
}

impl Dialer for WsDialer {
    type Sink = WsSink;
    type Stream = WsFrames;

    async fn dial(&self, url: &str) -> Result<(WsSink, WsFrames), GatewayError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| GatewayError::Connect(format!("{url}: {e}")))?;
        debug!(url, status = %response.status(), "websocket connected");

        let (write, read) = stream.split();
        Ok((WsSink(write), WsFrames(read)))
    }
}

pub struct WsSink(SplitSink<WsStream, Message>);

impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), GatewayError> {
        self.0
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| GatewayError::Write(e.to_string()))
    }

    /// Close without a status code. Normal-closure codes (1000/1001) would
    /// invalidate the session on the server and make it unresumable.
    async fn close(&mut self) {
        if let Err(err) = self.0.close().await {
            trace!(error = %err, "websocket close failed");
        }
    }
}

pub struct WsFrames(SplitStream<WsStream>);

impl FrameStream for WsFrames {
    async fn next_frame(&mut self) -> Option<Result<Incoming, GatewayError>> {
        loop {
            let message = match self.0.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(GatewayError::Read(err.to_string()))),
            };

            let incoming = match message {
                Message::Text(text) => Incoming::Text(text.as_str().to_owned()),
                Message::Binary(data) => Incoming::Binary(data.len()),
                Message::Close(frame) => Incoming::Close(
                    frame.map(|f| CloseInfo::new(u16::from(f.code), f.reason.as_str())),
                ),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };
            return Some(Ok(incoming));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use secrecy::SecretString;
    use serde_json::{Value, json};
    use switchboard_core::gateway::{GatewayClient, GatewayConfig};
    use switchboard_types::gateway::{GatewayFrame, OpCode};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_util::sync::CancellationToken;

    use crate::gateway::rest::DiscordRest;

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn send_frame(ws: &mut WebSocketStream<TcpStream>, frame: &GatewayFrame) {
        ws.send(Message::Text(frame.encode().unwrap().into())).await.unwrap();
    }

    async fn next_op(ws: &mut WebSocketStream<TcpStream>, op: OpCode) -> GatewayFrame {
        loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => {
                    let frame = GatewayFrame::decode(text.as_str()).unwrap();
                    if frame.opcode() == Some(op) {
                        return frame;
                    }
                }
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn maps_text_binary_and_close_frames() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();

            let echoed = ws.next().await.unwrap().unwrap();
            assert_eq!(echoed, Message::Text("hi".into()));

            ws.send(Message::Text("hello".into())).await.unwrap();
            ws.send(Message::Ping(vec![1, 2].into())).await.unwrap();
            ws.send(Message::Binary(vec![0u8; 3].into())).await.unwrap();
            ws.close(Some(CloseFrame {
                code: CloseCode::from(4004),
                reason: "Authentication failed.".into(),
            }))
            .await
            .unwrap();
        });

        let (mut sink, mut frames) = WsDialer::new().dial(&url).await.unwrap();
        sink.send_text("hi".to_string()).await.unwrap();

        assert_eq!(frames.next_frame().await.unwrap().unwrap(), Incoming::Text("hello".into()));
        assert_eq!(frames.next_frame().await.unwrap().unwrap(), Incoming::Binary(3));
        assert_eq!(
            frames.next_frame().await.unwrap().unwrap(),
            Incoming::Close(Some(CloseInfo::new(4004, "Authentication failed.")))
        );

        server.await.unwrap();
    }

    #[tokio::test]
    async fn dial_failure_is_a_connect_error() {
        let (listener, url) = listener().await;
        drop(listener);

        let err = WsDialer::new().dial(&url).await.err().unwrap();
        assert!(matches!(err, GatewayError::Connect(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn client_handshakes_over_websocket_and_stops_on_fatal_close() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();

            send_frame(&mut ws, &GatewayFrame::new(OpCode::Hello, json!({ "heartbeat_interval": 1000 }))).await;
            next_op(&mut ws, OpCode::Heartbeat).await;
            send_frame(&mut ws, &GatewayFrame::new(OpCode::HeartbeatAck, Value::Null)).await;

            let identify = next_op(&mut ws, OpCode::Identify).await;
            assert_eq!(identify.d["token"], "test-token");

            let mut ready = GatewayFrame::new(
                OpCode::Dispatch,
                json!({
                    "v": 10,
                    "user": { "id": "1", "username": "switchboard", "bot": true },
                    "session_id": "abc",
                    "resume_gateway_url": "ws://127.0.0.1:1",
                }),
            );
            ready.s = Some(1);
            ready.t = Some("READY".into());
            send_frame(&mut ws, &ready).await;

            let mut message = GatewayFrame::new(
                OpCode::Dispatch,
                json!({
                    "id": "m2",
                    "channel_id": "chan-1",
                    "author": { "id": "42", "username": "someone" },
                    "content": "ping",
                }),
            );
            message.s = Some(2);
            message.t = Some("MESSAGE_CREATE".into());
            send_frame(&mut ws, &message).await;

            ws.close(Some(CloseFrame {
                code: CloseCode::from(4004),
                reason: "Authentication failed.".into(),
            }))
            .await
            .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let rest = DiscordRest::new(SecretString::from("test-token")).unwrap();
        let client = GatewayClient::new(
            SecretString::from("test-token"),
            WsDialer::new(),
            rest,
            GatewayConfig::default(),
        )
        .with_gateway_url(url);

        let (msg_tx, mut msg_rx) = mpsc::channel(8);
        let (err_tx, _err_rx) = mpsc::channel(8);
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            client.run(CancellationToken::new(), msg_tx, err_tx),
        )
        .await
        .unwrap();

        assert!(
            matches!(result, Err(GatewayError::FatalClose { code: 4004, .. })),
            "got {result:?}"
        );
        let message = msg_rx.recv().await.unwrap();
        assert_eq!(message.content, "ping");
        assert_eq!(message.channel_id, "chan-1");
        assert_eq!(client.session().sequence(), Some(2));

        server.await.unwrap();
    }
}
