/**
 * Room Topology
 *
 * Tracks which connection sessions are joined to which rooms and fans
 * serialized frames out to them.
 *
 * # Concurrency
 *
 * All membership lives behind one `RwLock`. Joins, leaves and evictions take
 * the write lock; a broadcast resolves its full recipient set under a single
 * read lock, releases it, and only then pushes into the per-session queues.
 * Pushing never awaits: a full queue drops the frame for that session only,
 * a closed queue marks the session stale and it is unregistered afterwards.
 *
 * Rooms are implicit. A room exists while at least one session is joined to
 * it and its index entry is removed with the last member.
 *
 * Every eviction or close bumps a revocation counter. A join authorizes
 * without holding the lock; if the counter moved in the meantime the
 * membership check is repeated under the write lock before inserting.
 */

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::backend::realtime::authz::{authorize_join, JoinDenied};
use crate::backend::store::Membership;
use crate::shared::ids::UserId;
use crate::shared::protocol::ServerFrame;
use crate::shared::room::RoomRef;

/// A serialized frame shared between every recipient of one publish
pub type Outbound = Arc<str>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The session's queue is at capacity; the frame was dropped
    Full,
    Closed,
}

/// Sending half of one connection's outbound queue
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub user: UserId,
    outbound: mpsc::Sender<Outbound>,
}

impl SessionHandle {
    pub fn try_deliver(&self, payload: Outbound) -> Delivery {
        match self.outbound.try_send(payload) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    Denied,
}

/// Counters for one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Distinct sessions joined to at least one target room
    pub recipients: usize,
    pub delivered: usize,
    pub dropped: usize,
    pub stale: usize,
}

#[derive(Default)]
struct TopologyState {
    sessions: HashMap<SessionId, SessionHandle>,
    session_rooms: HashMap<SessionId, HashSet<RoomRef>>,
    room_index: HashMap<RoomRef, HashSet<SessionId>>,
    revocations: u64,
}

impl TopologyState {
    fn insert_membership(&mut self, session: SessionId, room: RoomRef) -> bool {
        let added = self.session_rooms.entry(session).or_default().insert(room);
        self.room_index.entry(room).or_default().insert(session);
        added
    }

    fn remove_membership(&mut self, session: SessionId, room: &RoomRef) -> bool {
        let removed = self
            .session_rooms
            .get_mut(&session)
            .map(|rooms| rooms.remove(room))
            .unwrap_or(false);
        if let Some(members) = self.room_index.get_mut(room) {
            members.remove(&session);
            if members.is_empty() {
                self.room_index.remove(room);
            }
        }
        removed
    }

    fn remove_session(&mut self, session: SessionId) -> usize {
        self.sessions.remove(&session);
        let rooms = self.session_rooms.remove(&session).unwrap_or_default();
        for room in &rooms {
            if let Some(members) = self.room_index.get_mut(room) {
                members.remove(&session);
                if members.is_empty() {
                    self.room_index.remove(room);
                }
            }
        }
        rooms.len()
    }
}

pub struct RoomTopology {
    membership: Arc<dyn Membership>,
    next_session_id: AtomicU64,
    state: RwLock<TopologyState>,
}

impl RoomTopology {
    pub fn new(membership: Arc<dyn Membership>) -> Self {
        Self {
            membership,
            next_session_id: AtomicU64::new(1),
            state: RwLock::new(TopologyState::default()),
        }
    }

    /// Register a connection; it starts in no rooms
    pub async fn register(&self, user: UserId, outbound: mpsc::Sender<Outbound>) -> SessionHandle {
        let id = SessionId(self.next_session_id.fetch_add(1, Ordering::Relaxed));
        let handle = SessionHandle { id, user, outbound };
        let mut state = self.state.write().await;
        state.sessions.insert(id, handle.clone());
        state.session_rooms.insert(id, HashSet::new());
        handle
    }

    /// Drop a session and every room membership it held
    pub async fn unregister(&self, session: SessionId) -> usize {
        let mut state = self.state.write().await;
        state.remove_session(session)
    }

    /// Join after checking membership. A denial leaves the topology untouched.
    pub async fn join(&self, session: &SessionHandle, room: RoomRef) -> JoinOutcome {
        let seen = self.state.read().await.revocations;
        if !self.permitted(session, &room).await {
            return JoinOutcome::Denied;
        }

        let mut state = self.state.write().await;
        if !state.sessions.contains_key(&session.id) {
            return JoinOutcome::Denied;
        }
        // An eviction ran while we were checking; it may have been ours
        if state.revocations != seen && !self.permitted(session, &room).await {
            return JoinOutcome::Denied;
        }
        if state.insert_membership(session.id, room) {
            tracing::debug!("[Rooms] {} joined {}", session.id, room);
        }
        JoinOutcome::Joined
    }

    async fn permitted(&self, session: &SessionHandle, room: &RoomRef) -> bool {
        match authorize_join(self.membership.as_ref(), session.user, room).await {
            Ok(()) => true,
            Err(JoinDenied::NotPermitted) => {
                tracing::debug!("[Rooms] Join denied: {} ({}) -> {}", session.id, session.user, room);
                false
            }
            Err(JoinDenied::Lookup(e)) => {
                tracing::warn!("[Rooms] Membership lookup failed for {}: {}", room, e);
                false
            }
        }
    }

    /// Leaving a room the session is not in is a no-op
    pub async fn leave(&self, session: SessionId, room: &RoomRef) -> bool {
        let mut state = self.state.write().await;
        let left = state.remove_membership(session, room);
        if left {
            tracing::debug!("[Rooms] {} left {}", session, room);
        }
        left
    }

    /// Push one payload to every session joined to any of `rooms`, once per session
    pub async fn broadcast(&self, rooms: &[RoomRef], payload: Outbound) -> PublishReport {
        let recipients: Vec<SessionHandle> = {
            let state = self.state.read().await;
            let ids: BTreeSet<SessionId> = rooms
                .iter()
                .filter_map(|room| state.room_index.get(room))
                .flat_map(|members| members.iter().copied())
                .collect();
            ids.into_iter()
                .filter_map(|id| state.sessions.get(&id).cloned())
                .collect()
        };

        let mut report = PublishReport {
            recipients: recipients.len(),
            ..PublishReport::default()
        };
        if recipients.is_empty() {
            return report;
        }

        let mut stale = Vec::new();
        for session in recipients {
            match session.try_deliver(Arc::clone(&payload)) {
                Delivery::Delivered => report.delivered += 1,
                Delivery::Full => {
                    tracing::warn!("[Realtime] Outbound queue full, dropping frame for {}", session.id);
                    report.dropped += 1;
                }
                Delivery::Closed => {
                    tracing::warn!("[Realtime] Session {} closed during delivery", session.id);
                    stale.push(session.id);
                }
            }
        }

        report.stale = stale.len();
        if !stale.is_empty() {
            let mut state = self.state.write().await;
            for id in stale {
                state.remove_session(id);
            }
        }
        report
    }

    /// Remove a user's sessions from `rooms`, telling each session it left
    pub async fn evict(&self, user: UserId, rooms: &[RoomRef]) -> usize {
        let removed: Vec<(SessionHandle, RoomRef)> = {
            let mut state = self.state.write().await;
            state.revocations += 1;
            let sessions: Vec<SessionHandle> = state
                .sessions
                .values()
                .filter(|session| session.user == user)
                .cloned()
                .collect();
            let mut removed = Vec::new();
            for session in sessions {
                for room in rooms {
                    if state.remove_membership(session.id, room) {
                        removed.push((session.clone(), *room));
                    }
                }
            }
            removed
        };

        notify_left(&removed);
        if !removed.is_empty() {
            tracing::info!("[Rooms] Evicted {} from {} room membership(s)", user, removed.len());
        }
        removed.len()
    }

    /// Empty `rooms` entirely, telling each member it left
    pub async fn close(&self, rooms: &[RoomRef]) -> usize {
        let removed: Vec<(SessionHandle, RoomRef)> = {
            let mut state = self.state.write().await;
            state.revocations += 1;
            let mut removed = Vec::new();
            for room in rooms {
                let Some(members) = state.room_index.remove(room) else {
                    continue;
                };
                for id in members {
                    if let Some(rooms) = state.session_rooms.get_mut(&id) {
                        rooms.remove(room);
                    }
                    if let Some(session) = state.sessions.get(&id) {
                        removed.push((session.clone(), *room));
                    }
                }
            }
            removed
        };

        notify_left(&removed);
        removed.len()
    }

    /// Unregister sessions whose connection task has gone away
    pub async fn sweep_closed(&self) -> usize {
        let mut state = self.state.write().await;
        let closed: Vec<SessionId> = state
            .sessions
            .values()
            .filter(|session| session.is_closed())
            .map(|session| session.id)
            .collect();
        for id in &closed {
            state.remove_session(*id);
        }
        closed.len()
    }

    pub async fn room_size(&self, room: &RoomRef) -> usize {
        let state = self.state.read().await;
        state.room_index.get(room).map(HashSet::len).unwrap_or(0)
    }

    /// Rooms a session is joined to, in a stable order
    pub async fn rooms_of(&self, session: SessionId) -> Vec<RoomRef> {
        let state = self.state.read().await;
        let mut rooms: Vec<RoomRef> = state
            .session_rooms
            .get(&session)
            .map(|rooms| rooms.iter().copied().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }
}

fn notify_left(removed: &[(SessionHandle, RoomRef)]) {
    for (session, room) in removed {
        match serde_json::to_string(&ServerFrame::Left { room: *room }) {
            Ok(json) => {
                session.try_deliver(Outbound::from(json));
            }
            Err(e) => tracing::error!("[Rooms] Failed to serialize left frame: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::store::{Directory, MemoryDirectory};
    use crate::shared::ids::TeamId;

    struct Fixture {
        directory: Arc<MemoryDirectory>,
        topology: RoomTopology,
    }

    fn fixture() -> Fixture {
        let directory = Arc::new(MemoryDirectory::new());
        let topology = RoomTopology::new(directory.clone());
        Fixture { directory, topology }
    }

    async fn user(directory: &MemoryDirectory, email: &str) -> UserId {
        directory.create_user("user", email, "hash").await.unwrap().summary.id
    }

    fn payload(text: &str) -> Outbound {
        Outbound::from(text)
    }

    #[tokio::test]
    async fn test_join_and_broadcast() {
        let f = fixture();
        let alice = user(&f.directory, "alice@example.com").await;
        let (tx, mut rx) = mpsc::channel(8);
        let session = f.topology.register(alice, tx).await;

        assert_eq!(f.topology.join(&session, RoomRef::user(alice)).await, JoinOutcome::Joined);
        let report = f.topology.broadcast(&[RoomRef::user(alice)], payload("hello")).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_denied_join_receives_nothing() {
        let f = fixture();
        let alice = user(&f.directory, "alice@example.com").await;
        let mallory = user(&f.directory, "mallory@example.com").await;
        let team = f.directory.create_team("Foo", alice).await.unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let session = f.topology.register(mallory, tx).await;
        assert_eq!(f.topology.join(&session, RoomRef::team(team.id)).await, JoinOutcome::Denied);
        assert_eq!(f.topology.join(&session, RoomRef::user(alice)).await, JoinOutcome::Denied);

        let report = f.topology.broadcast(&[RoomRef::team(team.id), RoomRef::user(alice)], payload("x")).await;
        assert_eq!(report.recipients, 0);
        assert!(rx.try_recv().is_err());
        assert!(f.topology.rooms_of(session.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_rooms_deliver_once() {
        let f = fixture();
        let alice = user(&f.directory, "alice@example.com").await;
        let team = f.directory.create_team("Foo", alice).await.unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let session = f.topology.register(alice, tx).await;
        f.topology.join(&session, RoomRef::user(alice)).await;
        f.topology.join(&session, RoomRef::team(team.id)).await;

        let report = f
            .topology
            .broadcast(&[RoomRef::team(team.id), RoomRef::user(alice)], payload("once"))
            .await;
        assert_eq!(report.recipients, 1);
        assert_eq!(rx.recv().await.as_deref(), Some("once"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let f = fixture();
        let alice = user(&f.directory, "alice@example.com").await;
        let (tx, mut rx) = mpsc::channel(1);
        let session = f.topology.register(alice, tx).await;
        f.topology.join(&session, RoomRef::user(alice)).await;

        f.topology.broadcast(&[RoomRef::user(alice)], payload("first")).await;
        let report = f.topology.broadcast(&[RoomRef::user(alice)], payload("second")).await;

        assert_eq!(report.dropped, 1);
        assert_eq!(rx.recv().await.as_deref(), Some("first"));
        // Still registered; only the frame was lost
        assert_eq!(f.topology.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_closed_session_is_removed_on_broadcast() {
        let f = fixture();
        let alice = user(&f.directory, "alice@example.com").await;
        let (tx, rx) = mpsc::channel(4);
        let session = f.topology.register(alice, tx).await;
        f.topology.join(&session, RoomRef::user(alice)).await;
        drop(rx);

        let report = f.topology.broadcast(&[RoomRef::user(alice)], payload("x")).await;
        assert_eq!(report.stale, 1);
        assert_eq!(f.topology.session_count().await, 0);
        assert_eq!(f.topology.room_size(&RoomRef::user(alice)).await, 0);
    }

    #[tokio::test]
    async fn test_leave_and_implicit_room_removal() {
        let f = fixture();
        let alice = user(&f.directory, "alice@example.com").await;
        let (tx, _rx) = mpsc::channel(4);
        let session = f.topology.register(alice, tx).await;
        let room = RoomRef::user(alice);

        f.topology.join(&session, room).await;
        assert_eq!(f.topology.room_size(&room).await, 1);
        assert!(f.topology.leave(session.id, &room).await);
        assert!(!f.topology.leave(session.id, &room).await);
        assert_eq!(f.topology.room_size(&room).await, 0);
    }

    #[tokio::test]
    async fn test_evict_sends_left_frame() {
        let f = fixture();
        let alice = user(&f.directory, "alice@example.com").await;
        let team = f.directory.create_team("Foo", alice).await.unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let session = f.topology.register(alice, tx).await;
        f.topology.join(&session, RoomRef::team(team.id)).await;

        assert_eq!(f.topology.evict(alice, &[RoomRef::team(team.id)]).await, 1);
        let frame: ServerFrame = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame, ServerFrame::Left { room: RoomRef::team(team.id) });
        assert!(f.topology.rooms_of(session.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_close_empties_room() {
        let f = fixture();
        let alice = user(&f.directory, "alice@example.com").await;
        let team = f.directory.create_team("Foo", alice).await.unwrap();
        let room = RoomRef::team(team.id);
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);
        let first = f.topology.register(alice, tx1).await;
        let second = f.topology.register(alice, tx2).await;
        f.topology.join(&first, room).await;
        f.topology.join(&second, room).await;

        assert_eq!(f.topology.close(&[room, RoomRef::team(TeamId::new())]).await, 2);
        assert_eq!(f.topology.room_size(&room).await, 0);
    }

    #[tokio::test]
    async fn test_unregister_and_sweep() {
        let f = fixture();
        let alice = user(&f.directory, "alice@example.com").await;
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, rx2) = mpsc::channel(4);
        let first = f.topology.register(alice, tx1).await;
        f.topology.join(&first, RoomRef::user(alice)).await;
        f.topology.register(alice, tx2).await;

        assert_eq!(f.topology.unregister(first.id).await, 1);
        drop(rx2);
        assert_eq!(f.topology.sweep_closed().await, 1);
        assert_eq!(f.topology.session_count().await, 0);
    }

    /// Membership that stalls after answering, so a removal can land mid-join
    struct SlowMembership {
        inner: Arc<MemoryDirectory>,
        delay: std::time::Duration,
    }

    #[async_trait::async_trait]
    impl Membership for SlowMembership {
        async fn is_team_member(&self, team: TeamId, user: UserId) -> crate::backend::store::StoreResult<bool> {
            let answer = self.inner.is_team_member(team, user).await;
            tokio::time::sleep(self.delay).await;
            answer
        }

        async fn is_project_member(
            &self,
            project: crate::shared::ids::ProjectId,
            user: UserId,
        ) -> crate::backend::store::StoreResult<bool> {
            self.inner.is_project_member(project, user).await
        }

        async fn is_conversation_member(
            &self,
            conversation: crate::shared::ids::ConversationId,
            user: UserId,
        ) -> crate::backend::store::StoreResult<bool> {
            self.inner.is_conversation_member(conversation, user).await
        }
    }

    #[tokio::test]
    async fn test_removal_during_join_keeps_user_out() {
        let directory = Arc::new(MemoryDirectory::new());
        let alice = user(&directory, "alice@example.com").await;
        let bob = user(&directory, "bob@example.com").await;
        let team = directory.create_team("Foo", alice).await.unwrap();
        directory.add_member(team.id, bob).await.unwrap();

        let topology = Arc::new(RoomTopology::new(Arc::new(SlowMembership {
            inner: directory.clone(),
            delay: std::time::Duration::from_millis(100),
        })));
        let room = RoomRef::team(team.id);
        let (tx, mut rx) = mpsc::channel(8);
        let session = topology.register(bob, tx).await;

        let joining = {
            let topology = topology.clone();
            let session = session.clone();
            tokio::spawn(async move { topology.join(&session, room).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        directory.remove_member(team.id, bob).await.unwrap();
        topology.evict(bob, &[room]).await;

        assert_eq!(joining.await.unwrap(), JoinOutcome::Denied);
        assert!(topology.rooms_of(session.id).await.is_empty());
        let report = topology.broadcast(&[room], payload("secret")).await;
        assert_eq!(report.recipients, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unrelated_eviction_does_not_block_join() {
        let f = fixture();
        let alice = user(&f.directory, "alice@example.com").await;
        let bob = user(&f.directory, "bob@example.com").await;
        let team = f.directory.create_team("Foo", alice).await.unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let session = f.topology.register(alice, tx).await;

        f.topology.evict(bob, &[RoomRef::team(team.id)]).await;
        assert_eq!(f.topology.join(&session, RoomRef::team(team.id)).await, JoinOutcome::Joined);
    }
}
