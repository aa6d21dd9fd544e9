//! Per-connection session
//!
//! A `ConnectionSession` is created once the handshake has established an
//! identity and is closed when the socket goes away. Its room memberships live
//! only in the topology and are dropped with it, so a reconnecting client
//! starts from no rooms and has to join again.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::backend::realtime::topology::{
    Delivery, JoinOutcome, Outbound, RoomTopology, SessionHandle, SessionId,
};
use crate::shared::ids::UserId;
use crate::shared::protocol::{ClientFrame, ServerFrame};
use crate::shared::room::RoomRef;

pub struct ConnectionSession {
    handle: SessionHandle,
    topology: Arc<RoomTopology>,
}

impl ConnectionSession {
    /// Register with the topology; the receiver feeds the socket writer
    pub async fn open(
        topology: Arc<RoomTopology>,
        user: UserId,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = topology.register(user, tx).await;
        (Self { handle, topology }, rx)
    }

    pub fn id(&self) -> SessionId {
        self.handle.id
    }

    pub fn user(&self) -> UserId {
        self.handle.user
    }

    /// Apply a client frame and return the acknowledgement to send back
    pub async fn handle(&self, frame: ClientFrame) -> ServerFrame {
        match frame {
            ClientFrame::JoinRoom { room } => match self.topology.join(&self.handle, room).await {
                JoinOutcome::Joined => ServerFrame::Joined { room },
                JoinOutcome::Denied => ServerFrame::Denied { room },
            },
            ClientFrame::LeaveRoom { room } => {
                self.topology.leave(self.handle.id, &room).await;
                ServerFrame::Left { room }
            }
        }
    }

    pub async fn handle_text(&self, text: &str) -> ServerFrame {
        match ClientFrame::parse(text) {
            Ok(frame) => self.handle(frame).await,
            Err(e) => {
                tracing::debug!("[Realtime] Unparseable frame from {}: {}", self.handle.id, e);
                ServerFrame::Error { message: e.to_string() }
            }
        }
    }

    /// Queue a frame for this session only
    pub fn reply(&self, frame: &ServerFrame) -> Delivery {
        match serde_json::to_string(frame) {
            Ok(json) => self.handle.try_deliver(Outbound::from(json)),
            Err(e) => {
                tracing::error!("[Realtime] Failed to serialize reply: {}", e);
                Delivery::Closed
            }
        }
    }

    pub async fn rooms(&self) -> Vec<RoomRef> {
        self.topology.rooms_of(self.handle.id).await
    }

    pub async fn close(self) {
        let rooms = self.topology.unregister(self.handle.id).await;
        tracing::info!(
            "[Realtime] Session {} for {} closed ({} room(s) released)",
            self.handle.id,
            self.handle.user,
            rooms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::store::{Directory, MemoryDirectory};

    async fn setup() -> (Arc<MemoryDirectory>, Arc<RoomTopology>, UserId) {
        let directory = Arc::new(MemoryDirectory::new());
        let topology = Arc::new(RoomTopology::new(directory.clone()));
        let user = directory
            .create_user("Alice", "alice@example.com", "hash")
            .await
            .unwrap()
            .summary
            .id;
        (directory, topology, user)
    }

    #[tokio::test]
    async fn test_join_leave_acknowledgements() {
        let (_directory, topology, alice) = setup().await;
        let (session, _rx) = ConnectionSession::open(topology, alice, 8).await;
        let room = RoomRef::user(alice);

        assert_eq!(session.handle(ClientFrame::JoinRoom { room }).await, ServerFrame::Joined { room });
        assert_eq!(session.rooms().await, vec![room]);
        assert_eq!(session.handle(ClientFrame::LeaveRoom { room }).await, ServerFrame::Left { room });
        assert!(session.rooms().await.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_text_yields_error_frame() {
        let (_directory, topology, alice) = setup().await;
        let (session, _rx) = ConnectionSession::open(topology, alice, 8).await;
        let reply = session.handle_text(r#"{"type":"join_room","room":"user:1"}"#).await;
        match reply {
            ServerFrame::Error { message } => assert!(message.starts_with("Protocol error: invalid client frame")),
            other => panic!("expected an error frame, got {:?}", other),
        }
        assert!(session.rooms().await.is_empty());
    }

    #[tokio::test]
    async fn test_close_releases_rooms() {
        let (_directory, topology, alice) = setup().await;
        let (session, _rx) = ConnectionSession::open(topology.clone(), alice, 8).await;
        session.handle(ClientFrame::JoinRoom { room: RoomRef::user(alice) }).await;

        session.close().await;
        assert_eq!(topology.session_count().await, 0);
        assert_eq!(topology.room_size(&RoomRef::user(alice)).await, 0);
    }

    #[tokio::test]
    async fn test_reply_goes_to_own_queue() {
        let (_directory, topology, alice) = setup().await;
        let (session, mut rx) = ConnectionSession::open(topology, alice, 8).await;
        let frame = ServerFrame::Error { message: "x".to_string() };

        assert_eq!(session.reply(&frame), Delivery::Delivered);
        let received: ServerFrame = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(received, frame);
    }
}
