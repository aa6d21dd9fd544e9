//! Raw websocket client
//!
//! Speaks the frame protocol directly so tests can observe exactly what the
//! server pushes to one connection.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use teamsync::shared::{ClientFrame, RoomRef, ServerEvent, ServerFrame};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const EVENT_WAIT: Duration = Duration::from_secs(3);
pub const QUIET_WAIT: Duration = Duration::from_millis(300);

pub struct TestSocket {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestSocket {
    pub async fn connect(ws_url: &str, token: &str) -> Self {
        let (ws, _) = connect_async(format!("{}?token={}", ws_url, token)).await.unwrap();
        Self { ws }
    }

    pub async fn send(&mut self, frame: &ClientFrame) {
        let text = serde_json::to_string(frame).unwrap();
        self.ws.send(Message::Text(text.into())).await.unwrap();
    }

    /// Next text frame within `wait`, skipping pings
    pub async fn next_frame(&mut self, wait: Duration) -> Option<ServerFrame> {
        loop {
            let message = timeout(wait, self.ws.next()).await.ok()??.ok()?;
            if let Message::Text(text) = message {
                return Some(serde_json::from_str(text.as_str()).unwrap());
            }
        }
    }

    /// Join `room` and return the server's answer (`Joined` or `Denied`)
    pub async fn join(&mut self, room: RoomRef) -> ServerFrame {
        self.send(&ClientFrame::JoinRoom { room }).await;
        loop {
            match self.next_frame(EVENT_WAIT).await {
                Some(ServerFrame::Joined { room: r }) if r == room => return ServerFrame::Joined { room },
                Some(ServerFrame::Denied { room: r }) if r == room => return ServerFrame::Denied { room },
                Some(_) => continue,
                None => panic!("no answer to join of {}", room),
            }
        }
    }

    /// Next event frame, ignoring acknowledgements
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.next_event_within(EVENT_WAIT).await
    }

    pub async fn next_event_within(&mut self, wait: Duration) -> Option<ServerEvent> {
        loop {
            match self.next_frame(wait).await? {
                ServerFrame::Event { event } => return Some(event),
                _ => continue,
            }
        }
    }

    /// Wait for `Left` on `room`, skipping events
    pub async fn expect_left(&mut self, room: RoomRef) -> bool {
        loop {
            match self.next_frame(EVENT_WAIT).await {
                Some(ServerFrame::Left { room: r }) if r == room => return true,
                Some(_) => continue,
                None => return false,
            }
        }
    }
}
