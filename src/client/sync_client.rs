/**
 * Sync Client
 *
 * Ties the pieces of the client together:
 *
 * - `SyncApi` for snapshots and mutations
 * - a `FrameSink` (normally the websocket `Transport`) for room joins
 * - the `ReconciliationEngine` for local state
 * - the `UnreadTracker` and the `OptimisticController`
 *
 * Every engine call returns effects; `perform` carries them out, so room
 * joins and notices always follow the state change that caused them.
 */

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::client::api::{HttpApi, SyncApi};
use crate::client::config::ClientConfig;
use crate::client::engine::{Effect, ReconciliationEngine, View};
use crate::client::error::{ClientError, ClientResult};
use crate::client::notice::{self, Notice, Notices};
use crate::client::optimistic::OptimisticController;
use crate::client::store::{SqliteUnreadStore, UnreadStore};
use crate::client::transport::{Transport, TransportEvent};
use crate::client::unread::UnreadTracker;
use crate::shared::event::ServerEvent;
use crate::shared::ids::{ConversationId, ProjectId, TaskId, TeamId};
use crate::shared::model::{Message, TaskStatus, UserSummary};
use crate::shared::protocol::{ClientFrame, ServerFrame};
use crate::shared::requests::TaskPatch;
use crate::shared::room::RoomRef;

/// Outbound half of the event channel
pub trait FrameSink: Send + Sync {
    fn send_frame(&self, frame: ClientFrame) -> ClientResult<()>;
}

impl FrameSink for Transport {
    fn send_frame(&self, frame: ClientFrame) -> ClientResult<()> {
        self.send(frame)
    }
}

pub struct SyncClient {
    me: UserSummary,
    api: Arc<dyn SyncApi>,
    link: Arc<dyn FrameSink>,
    engine: ReconciliationEngine,
    unread: UnreadTracker,
    optimistic: OptimisticController,
    notices: Notices,
    degraded: bool,
}

impl SyncClient {
    pub fn new(
        me: UserSummary,
        api: Arc<dyn SyncApi>,
        link: Arc<dyn FrameSink>,
        unread: UnreadTracker,
    ) -> Self {
        Self {
            engine: ReconciliationEngine::new(me.id),
            me,
            api,
            link,
            unread,
            optimistic: OptimisticController::new(),
            notices: Notices::default(),
            degraded: false,
        }
    }

    /// Connect both channels with an authenticated config and load snapshots
    ///
    /// The returned receiver must be fed back through
    /// `handle_transport_event`.
    pub async fn connect(config: ClientConfig) -> ClientResult<(Self, mpsc::Receiver<TransportEvent>)> {
        if config.token().is_none() {
            return Err(ClientError::AuthorizationDenied {
                message: "no session token".to_string(),
            });
        }

        let api = Arc::new(HttpApi::new(config.clone()));
        let me = api.me().await?;
        let store: Arc<dyn UnreadStore> = Arc::new(SqliteUnreadStore::open(config.store_path()).await?);
        let unread = UnreadTracker::load(me.id, store).await;
        let (transport, events) = Transport::spawn(config);

        let mut client = Self::new(me, api, Arc::new(transport), unread);
        client.bootstrap().await?;
        Ok((client, events))
    }

    pub fn me(&self) -> &UserSummary {
        &self.me
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    pub fn unread(&self) -> &UnreadTracker {
        &self.unread
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut Notices {
        &mut self.notices
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Startup snapshots: teams, conversations and unread counts
    pub async fn bootstrap(&mut self) -> ClientResult<()> {
        self.join(RoomRef::user(self.me.id));

        let teams = self.api.list_teams().await?;
        let effects = self.engine.load_teams(teams);
        self.perform(effects);

        let conversations = self.api.list_conversations().await?;
        self.unread.merge_snapshot(&conversations).await;
        self.engine.load_conversations(conversations);

        tracing::info!(
            "[Sync] Bootstrapped {} team(s), {} conversation(s), {} unread",
            self.engine.teams().len(),
            self.engine.conversations().len(),
            self.unread.total()
        );
        Ok(())
    }

    pub async fn select_team(&mut self, team: TeamId) -> ClientResult<()> {
        let (ticket, effects) = self.engine.select_team(team);
        self.perform(effects);

        match self.api.list_projects(team).await {
            Ok(projects) => {
                self.engine.apply_projects_snapshot(&ticket, projects);
                Ok(())
            }
            Err(e) => Err(self.prune_on_not_found(e, |engine| engine.prune_team(team))),
        }
    }

    pub async fn select_project(&mut self, project: ProjectId) -> ClientResult<()> {
        let (ticket, effects) = self.engine.select_project(project);
        self.perform(effects);

        match self.api.list_tasks(project).await {
            Ok(tasks) => {
                self.engine.apply_tasks_snapshot(&ticket, tasks);
                Ok(())
            }
            Err(e) => Err(self.prune_on_not_found(e, |engine| engine.prune_project(project))),
        }
    }

    /// Open a conversation, reset its unread count and load its history
    pub async fn open_conversation(&mut self, conversation: ConversationId) -> ClientResult<()> {
        let (ticket, effects) = self.engine.open_conversation_view(conversation);
        self.perform(effects);
        self.unread.mark_read(conversation).await;

        let history = self.api.list_messages(conversation).await?;
        self.engine.apply_messages_snapshot(&ticket, history);
        Ok(())
    }

    pub fn close_conversation(&mut self) {
        let effects = self.engine.close_conversation();
        self.perform(effects);
    }

    pub fn navigate(&mut self, view: View) {
        let effects = self.engine.navigate(view);
        self.perform(effects);
    }

    /// Send a message; it shows up locally when the event comes back
    pub async fn send_message(&mut self, conversation: ConversationId, content: &str) -> ClientResult<Message> {
        self.api.send_message(conversation, content).await
    }

    /// Move a task to `status` optimistically
    ///
    /// On rejection the project's tasks are refetched and replace local state,
    /// a notice is queued and `OptimisticMismatch` is returned.
    pub async fn move_task(&mut self, task: TaskId, status: TaskStatus) -> ClientResult<()> {
        let Some(change) = self.optimistic.apply(&mut self.engine, task, status) else {
            return Ok(());
        };

        match self.api.update_task(task, &TaskPatch::status(status)).await {
            Ok(updated) => {
                self.optimistic.confirm(task);
                let effects = self.engine.apply(&ServerEvent::TaskUpdated { task: updated });
                self.perform(effects);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[Sync] Status change for task {} rejected: {}", task, e);
                let authoritative = match self.api.list_tasks(change.project_id).await {
                    Ok(tasks) => Some(tasks),
                    Err(refetch) => {
                        tracing::warn!("[Sync] Refetch after rejection failed: {}", refetch);
                        None
                    }
                };
                let rollback = self.optimistic.reject(&mut self.engine, task, authoritative);
                self.notices.push(rollback);
                Err(ClientError::OptimisticMismatch { message: e.to_string() })
            }
        }
    }

    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                if self.degraded {
                    self.notices.push(Notice::success("Live updates restored"));
                }
                self.degraded = false;
                let rooms = self.engine.required_rooms();
                tracing::debug!("[Sync] Re-joining {} room(s)", rooms.len());
                for room in rooms {
                    self.join(room);
                }
            }
            TransportEvent::Frame(frame) => self.handle_frame(frame).await,
            TransportEvent::Disconnected => {
                tracing::debug!("[Sync] Event channel disconnected, waiting for reconnect");
            }
            TransportEvent::Degraded => {
                if !self.degraded {
                    self.degraded = true;
                    self.notices.push(Notice::error(notice::LIVE_UPDATES_UNAVAILABLE));
                }
            }
        }
    }

    pub async fn handle_frame(&mut self, frame: ServerFrame) {
        match frame {
            ServerFrame::Event { event } => self.handle_event(&event).await,
            ServerFrame::Joined { room } => tracing::debug!("[Sync] Joined {}", room),
            ServerFrame::Left { room } => tracing::debug!("[Sync] Left {}", room),
            ServerFrame::Denied { room } => tracing::debug!("[Sync] Join of {} denied", room),
            ServerFrame::Error { message } => tracing::warn!("[Sync] Server rejected a frame: {}", message),
        }
    }

    pub async fn handle_event(&mut self, event: &ServerEvent) {
        if let ServerEvent::MessageSent { message, .. } = event {
            let counted = self
                .unread
                .record(message, self.engine.open_conversation())
                .await;
            if counted && self.engine.view() != View::Inbox {
                self.notices.push(Notice::new_message(&message.sender.name));
            }
        }

        let effects = self.engine.apply(event);
        self.perform(effects);
    }

    /// Drain transport events until the transport stops
    pub async fn run(&mut self, events: &mut mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_transport_event(event).await;
        }
    }

    fn prune_on_not_found<F>(&mut self, error: ClientError, prune: F) -> ClientError
    where
        F: FnOnce(&mut ReconciliationEngine) -> Vec<Effect>,
    {
        if error.is_not_found() {
            let effects = prune(&mut self.engine);
            self.perform(effects);
        }
        error
    }

    fn join(&self, room: RoomRef) {
        self.send(ClientFrame::JoinRoom { room });
    }

    fn send(&self, frame: ClientFrame) {
        if let Err(e) = self.link.send_frame(frame) {
            tracing::warn!("[Sync] Could not queue frame: {}", e);
        }
    }

    fn perform(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::JoinRoom(room) => self.join(room),
                Effect::LeaveRoom(room) => self.send(ClientFrame::LeaveRoom { room }),
                Effect::Navigate(view) => tracing::debug!("[Sync] Navigated to {:?}", view),
                Effect::Notice(notice) => self.notices.push(notice),
            }
        }
    }
}
