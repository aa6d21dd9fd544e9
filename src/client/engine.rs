/**
 * Reconciliation Engine
 *
 * Client-side caches and the rules for merging server events into them.
 *
 * # Collections
 *
 * - global: teams, projects, tasks, conversations
 * - focused: projects of the selected team, tasks of the selected project,
 *   messages of the open conversation
 *
 * # Merge Rules
 *
 * - created: upsert into the global collection, and into the focused one when
 *   the parent is the focused scope
 * - updated: replace by id wherever present; absent ids are ignored
 * - deleted: remove everywhere, cascade to dependents, and re-navigate when the
 *   focused entity disappears
 *
 * Deleted ids are remembered, so a late or repeated create for an entity that
 * is already gone cannot bring it back. Only the most recent
 * `TOMBSTONE_LIMIT` deletions per kind are kept. Together with keyed upserts this makes
 * every event idempotent and order-insensitive with respect to deletion.
 *
 * # Scoped Fetches
 *
 * Selecting a scope returns a `FetchTicket`. A snapshot is only applied when
 * its ticket still matches the current selection and generation; results for
 * a scope the user has since left are discarded.
 *
 * Event handling is synchronous. Side effects the caller must perform (room
 * joins and leaves, navigation, notices) are returned as `Effect`s.
 */

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

use crate::client::collection::KeyedCollection;
use crate::client::notice::{self, Notice};
use crate::shared::event::ServerEvent;
use crate::shared::ids::{ConversationId, ProjectId, TaskId, TeamId, UserId};
use crate::shared::model::{Conversation, Message, Project, Task, TaskStatus, Team};
use crate::shared::room::RoomRef;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum View {
    #[default]
    Dashboard,
    Teams,
    Projects,
    Tasks,
    Inbox,
    Profile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    JoinRoom(RoomRef),
    LeaveRoom(RoomRef),
    Navigate(View),
    Notice(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    TeamProjects(TeamId),
    ProjectTasks(ProjectId),
    ConversationMessages(ConversationId),
}

/// Tag for an in-flight fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    scope: Scope,
    generation: u64,
}

impl FetchTicket {
    pub fn scope(&self) -> Scope {
        self.scope
    }
}

/// Deleted ids remembered per entity kind
pub const TOMBSTONE_LIMIT: usize = 4096;

/// Insertion-ordered id set that forgets its oldest entries past a limit
#[derive(Debug)]
struct Graveyard<K> {
    ids: HashSet<K>,
    order: VecDeque<K>,
    limit: usize,
}

impl<K: Copy + Eq + Hash> Graveyard<K> {
    fn new(limit: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            limit,
        }
    }

    fn insert(&mut self, id: K) {
        if !self.ids.insert(id) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.limit {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    fn extend(&mut self, ids: impl IntoIterator<Item = K>) {
        for id in ids {
            self.insert(id);
        }
    }

    fn contains(&self, id: &K) -> bool {
        self.ids.contains(id)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.ids.len()
    }
}

#[derive(Debug)]
struct Tombstones {
    teams: Graveyard<TeamId>,
    projects: Graveyard<ProjectId>,
    tasks: Graveyard<TaskId>,
}

impl Default for Tombstones {
    fn default() -> Self {
        Self {
            teams: Graveyard::new(TOMBSTONE_LIMIT),
            projects: Graveyard::new(TOMBSTONE_LIMIT),
            tasks: Graveyard::new(TOMBSTONE_LIMIT),
        }
    }
}

#[derive(Debug, Default)]
struct Generations {
    team: u64,
    project: u64,
    conversation: u64,
}

#[derive(Debug)]
pub struct ReconciliationEngine {
    me: UserId,
    teams: KeyedCollection<Team>,
    projects: KeyedCollection<Project>,
    tasks: KeyedCollection<Task>,
    conversations: KeyedCollection<Conversation>,
    focused_projects: KeyedCollection<Project>,
    focused_tasks: KeyedCollection<Task>,
    open_messages: KeyedCollection<Message>,
    view: View,
    selected_team: Option<TeamId>,
    selected_project: Option<ProjectId>,
    open_conversation: Option<ConversationId>,
    deleted: Tombstones,
    generations: Generations,
}

impl ReconciliationEngine {
    pub fn new(me: UserId) -> Self {
        Self {
            me,
            teams: KeyedCollection::new(),
            projects: KeyedCollection::new(),
            tasks: KeyedCollection::new(),
            conversations: KeyedCollection::new(),
            focused_projects: KeyedCollection::new(),
            focused_tasks: KeyedCollection::new(),
            open_messages: KeyedCollection::new(),
            view: View::default(),
            selected_team: None,
            selected_project: None,
            open_conversation: None,
            deleted: Tombstones::default(),
            generations: Generations::default(),
        }
    }

    pub fn me(&self) -> UserId {
        self.me
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn selected_team(&self) -> Option<TeamId> {
        self.selected_team
    }

    pub fn selected_project(&self) -> Option<ProjectId> {
        self.selected_project
    }

    pub fn open_conversation(&self) -> Option<ConversationId> {
        self.open_conversation
    }

    pub fn teams(&self) -> &KeyedCollection<Team> {
        &self.teams
    }

    pub fn projects(&self) -> &KeyedCollection<Project> {
        &self.projects
    }

    pub fn tasks(&self) -> &KeyedCollection<Task> {
        &self.tasks
    }

    pub fn conversations(&self) -> &KeyedCollection<Conversation> {
        &self.conversations
    }

    pub fn focused_projects(&self) -> &KeyedCollection<Project> {
        &self.focused_projects
    }

    pub fn focused_tasks(&self) -> &KeyedCollection<Task> {
        &self.focused_tasks
    }

    pub fn open_messages(&self) -> &KeyedCollection<Message> {
        &self.open_messages
    }

    /// Rooms this client should be joined to right now
    pub fn required_rooms(&self) -> Vec<RoomRef> {
        let mut rooms = vec![RoomRef::user(self.me)];
        rooms.extend(self.teams.keys().map(RoomRef::team));
        rooms.extend(self.selected_project.map(RoomRef::project));
        rooms.extend(self.open_conversation.map(RoomRef::conversation));
        rooms
    }

    // ---- startup snapshots -------------------------------------------------

    /// Load the caller's teams; returns joins for every team room
    pub fn load_teams(&mut self, teams: Vec<Team>) -> Vec<Effect> {
        let me = self.me;
        let deleted = &self.deleted.teams;
        self.teams.replace_all(
            teams
                .into_iter()
                .filter(|team| team.has_member(me) && !deleted.contains(&team.id)),
        );
        self.teams.keys().map(|id| Effect::JoinRoom(RoomRef::team(id))).collect()
    }

    pub fn load_conversations(&mut self, conversations: Vec<Conversation>) {
        let me = self.me;
        self.conversations
            .replace_all(conversations.into_iter().filter(|c| c.has_member(me)));
    }

    // ---- events ------------------------------------------------------------

    pub fn apply(&mut self, event: &ServerEvent) -> Vec<Effect> {
        match event {
            ServerEvent::TeamCreated { team } => self.team_created(team),
            ServerEvent::TeamUpdated { team } => {
                if team.has_member(self.me) {
                    self.teams.replace(team.clone());
                    Vec::new()
                } else if self.teams.contains(&team.id) {
                    self.purge_team(team.id, false, notice::REMOVED_FROM_TEAM)
                } else {
                    Vec::new()
                }
            }
            ServerEvent::MemberAdded { team, member } => {
                if *member == self.me {
                    self.team_created(team)
                } else {
                    self.teams.replace(team.clone());
                    Vec::new()
                }
            }
            ServerEvent::MemberRemoved { team, member } => {
                if *member == self.me {
                    self.purge_team(team.id, false, notice::REMOVED_FROM_TEAM)
                } else {
                    self.teams.replace(team.clone());
                    Vec::new()
                }
            }
            ServerEvent::TeamDeleted { team_id } => self.purge_team(*team_id, true, notice::TEAM_DELETED),
            ServerEvent::ProjectCreated { project } => {
                self.project_created(project);
                Vec::new()
            }
            ServerEvent::ProjectUpdated { project } => {
                self.projects.replace(project.clone());
                self.focused_projects.replace(project.clone());
                Vec::new()
            }
            ServerEvent::ProjectDeleted { project_id, .. } => self.purge_project(*project_id),
            ServerEvent::TaskCreated { task } => {
                self.task_created(task);
                Vec::new()
            }
            ServerEvent::TaskUpdated { task } => {
                self.tasks.replace(task.clone());
                self.focused_tasks.replace(task.clone());
                Vec::new()
            }
            ServerEvent::TaskDeleted { task_id, .. } => {
                self.deleted.tasks.insert(*task_id);
                self.tasks.remove(task_id);
                self.focused_tasks.remove(task_id);
                Vec::new()
            }
            ServerEvent::MessageSent { message, conversation } => {
                self.message_received(message, conversation);
                Vec::new()
            }
        }
    }

    fn team_created(&mut self, team: &Team) -> Vec<Effect> {
        if self.deleted.teams.contains(&team.id) || !team.has_member(self.me) {
            return Vec::new();
        }
        if self.teams.upsert(team.clone()) {
            vec![Effect::JoinRoom(RoomRef::team(team.id))]
        } else {
            Vec::new()
        }
    }

    fn project_created(&mut self, project: &Project) {
        if self.deleted.projects.contains(&project.id) || self.deleted.teams.contains(&project.team_id) {
            return;
        }
        self.projects.upsert(project.clone());
        if self.selected_team == Some(project.team_id) {
            self.focused_projects.upsert(project.clone());
        }
    }

    fn task_created(&mut self, task: &Task) {
        if self.deleted.tasks.contains(&task.id) || self.deleted.projects.contains(&task.project_id) {
            return;
        }
        self.tasks.upsert(task.clone());
        if self.selected_project == Some(task.project_id) {
            self.focused_tasks.upsert(task.clone());
        }
    }

    fn message_received(&mut self, message: &Message, conversation: &Conversation) {
        if !conversation.has_member(self.me) {
            return;
        }
        // Both delivery paths carry the same conversation state; keep the newest
        let newer = self
            .conversations
            .get(&conversation.id)
            .map(|existing| existing.updated_at <= conversation.updated_at)
            .unwrap_or(true);
        if newer {
            self.conversations.upsert(conversation.clone());
        }
        if self.open_conversation == Some(message.conversation_id) {
            self.open_messages.upsert(message.clone());
        }
    }

    /// Remove a team and everything under it from every cache
    ///
    /// `tombstone` is set for deletions; a removed membership may be granted
    /// again later.
    fn purge_team(&mut self, team_id: TeamId, tombstone: bool, reason: &str) -> Vec<Effect> {
        let mut effects = vec![Effect::LeaveRoom(RoomRef::team(team_id))];

        self.teams.remove(&team_id);
        let removed_projects: HashSet<ProjectId> = self
            .projects
            .retain(|project| project.team_id != team_id)
            .into_iter()
            .chain(self.focused_projects.retain(|project| project.team_id != team_id))
            .collect();
        let removed_tasks: Vec<TaskId> = self
            .tasks
            .retain(|task| !removed_projects.contains(&task.project_id))
            .into_iter()
            .chain(
                self.focused_tasks
                    .retain(|task| !removed_projects.contains(&task.project_id)),
            )
            .collect();

        if tombstone {
            self.deleted.teams.insert(team_id);
            self.deleted.projects.extend(removed_projects.iter().copied());
            self.deleted.tasks.extend(removed_tasks);
        }

        if self.selected_team == Some(team_id) {
            if let Some(project) = self.selected_project.take() {
                effects.push(Effect::LeaveRoom(RoomRef::project(project)));
            }
            self.selected_team = None;
            self.focused_projects.clear();
            self.focused_tasks.clear();
            self.generations.team += 1;
            self.generations.project += 1;

            if matches!(self.view, View::Projects | View::Tasks) {
                self.view = View::Teams;
                effects.push(Effect::Navigate(View::Teams));
                effects.push(Effect::Notice(Notice::error(reason)));
            }
        } else if let Some(project) = self.selected_project {
            // Project selected without its team being the selected one
            if removed_projects.contains(&project) {
                effects.extend(self.drop_selected_project(reason));
            }
        }

        tracing::debug!(
            "[Sync] Purged team {} ({} project(s), deleted: {})",
            team_id,
            removed_projects.len(),
            tombstone
        );
        effects
    }

    fn purge_project(&mut self, project_id: ProjectId) -> Vec<Effect> {
        self.deleted.projects.insert(project_id);
        self.projects.remove(&project_id);
        self.focused_projects.remove(&project_id);
        let removed_tasks: Vec<TaskId> = self
            .tasks
            .retain(|task| task.project_id != project_id)
            .into_iter()
            .chain(self.focused_tasks.retain(|task| task.project_id != project_id))
            .collect();
        self.deleted.tasks.extend(removed_tasks);

        if self.selected_project == Some(project_id) {
            self.drop_selected_project(notice::PROJECT_DELETED)
        } else {
            Vec::new()
        }
    }

    fn drop_selected_project(&mut self, reason: &str) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(project) = self.selected_project.take() {
            effects.push(Effect::LeaveRoom(RoomRef::project(project)));
        }
        self.focused_tasks.clear();
        self.generations.project += 1;

        if self.view == View::Tasks {
            let target = if self.selected_team.is_some() {
                View::Projects
            } else {
                View::Teams
            };
            self.view = target;
            effects.push(Effect::Navigate(target));
            effects.push(Effect::Notice(Notice::error(reason)));
        }
        effects
    }

    /// Prune an id the server reported as gone
    pub fn prune_team(&mut self, team_id: TeamId) -> Vec<Effect> {
        self.purge_team(team_id, true, notice::TEAM_DELETED)
    }

    pub fn prune_project(&mut self, project_id: ProjectId) -> Vec<Effect> {
        self.purge_project(project_id)
    }

    // ---- scope transitions -------------------------------------------------

    /// Focus a team; the caller fetches its projects with the returned ticket
    pub fn select_team(&mut self, team_id: TeamId) -> (FetchTicket, Vec<Effect>) {
        let mut effects = self.close_conversation();
        if let Some(project) = self.selected_project.take() {
            effects.push(Effect::LeaveRoom(RoomRef::project(project)));
            self.focused_tasks.clear();
            self.generations.project += 1;
        }

        self.selected_team = Some(team_id);
        self.focused_projects.clear();
        self.view = View::Projects;
        self.generations.team += 1;

        let ticket = FetchTicket {
            scope: Scope::TeamProjects(team_id),
            generation: self.generations.team,
        };
        (ticket, effects)
    }

    /// Focus a project; joins its room
    pub fn select_project(&mut self, project_id: ProjectId) -> (FetchTicket, Vec<Effect>) {
        let mut effects = self.close_conversation();
        match self.selected_project {
            Some(current) if current == project_id => {}
            Some(current) => {
                effects.push(Effect::LeaveRoom(RoomRef::project(current)));
                effects.push(Effect::JoinRoom(RoomRef::project(project_id)));
            }
            None => effects.push(Effect::JoinRoom(RoomRef::project(project_id))),
        }

        if let Some(project) = self.projects.get(&project_id) {
            if self.selected_team != Some(project.team_id) {
                self.selected_team = Some(project.team_id);
                self.focused_projects.clear();
                self.generations.team += 1;
            }
        }

        self.selected_project = Some(project_id);
        self.focused_tasks.clear();
        self.view = View::Tasks;
        self.generations.project += 1;

        let ticket = FetchTicket {
            scope: Scope::ProjectTasks(project_id),
            generation: self.generations.project,
        };
        (ticket, effects)
    }

    /// Open a conversation in the chat view and reset nothing else
    pub fn open_conversation_view(&mut self, conversation_id: ConversationId) -> (FetchTicket, Vec<Effect>) {
        let mut effects = Vec::new();
        match self.open_conversation {
            Some(current) if current == conversation_id => {}
            Some(current) => {
                effects.push(Effect::LeaveRoom(RoomRef::conversation(current)));
                effects.push(Effect::JoinRoom(RoomRef::conversation(conversation_id)));
            }
            None => effects.push(Effect::JoinRoom(RoomRef::conversation(conversation_id))),
        }
        if self.open_conversation != Some(conversation_id) {
            self.open_messages.clear();
        }

        self.open_conversation = Some(conversation_id);
        self.view = View::Inbox;
        self.generations.conversation += 1;

        let ticket = FetchTicket {
            scope: Scope::ConversationMessages(conversation_id),
            generation: self.generations.conversation,
        };
        (ticket, effects)
    }

    pub fn close_conversation(&mut self) -> Vec<Effect> {
        self.open_messages.clear();
        self.generations.conversation += 1;
        match self.open_conversation.take() {
            Some(current) => vec![Effect::LeaveRoom(RoomRef::conversation(current))],
            None => Vec::new(),
        }
    }

    /// Whether a snapshot for `ticket` may still be applied
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        match ticket.scope {
            Scope::TeamProjects(team) => {
                self.selected_team == Some(team) && self.generations.team == ticket.generation
            }
            Scope::ProjectTasks(project) => {
                self.selected_project == Some(project) && self.generations.project == ticket.generation
            }
            Scope::ConversationMessages(conversation) => {
                self.open_conversation == Some(conversation)
                    && self.generations.conversation == ticket.generation
            }
        }
    }

    /// Replace focused projects wholesale; `false` when the ticket is stale
    pub fn apply_projects_snapshot(&mut self, ticket: &FetchTicket, projects: Vec<Project>) -> bool {
        let Scope::TeamProjects(team_id) = ticket.scope else {
            return false;
        };
        if !self.is_current(ticket) {
            tracing::debug!("[Sync] Discarding stale project snapshot for team {}", team_id);
            return false;
        }

        let live: Vec<Project> = projects
            .into_iter()
            .filter(|project| project.team_id == team_id && !self.deleted.projects.contains(&project.id))
            .collect();
        for project in &live {
            self.projects.upsert(project.clone());
        }
        self.focused_projects.replace_all(live);
        true
    }

    /// Replace focused tasks wholesale; `false` when the ticket is stale
    pub fn apply_tasks_snapshot(&mut self, ticket: &FetchTicket, tasks: Vec<Task>) -> bool {
        let Scope::ProjectTasks(project_id) = ticket.scope else {
            return false;
        };
        if !self.is_current(ticket) {
            tracing::debug!("[Sync] Discarding stale task snapshot for project {}", project_id);
            return false;
        }
        self.install_project_tasks(project_id, tasks);
        true
    }

    /// Merge fetched history with anything delivered while the fetch ran
    pub fn apply_messages_snapshot(&mut self, ticket: &FetchTicket, messages: Vec<Message>) -> bool {
        let Scope::ConversationMessages(conversation_id) = ticket.scope else {
            return false;
        };
        if !self.is_current(ticket) {
            tracing::debug!("[Sync] Discarding stale history for conversation {}", conversation_id);
            return false;
        }

        let mut merged: Vec<Message> = messages
            .into_iter()
            .filter(|message| message.conversation_id == conversation_id)
            .collect();
        merged.extend(self.open_messages.iter().cloned());
        merged.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        self.open_messages.replace_all(merged);
        true
    }

    /// Authoritative task list for one project, e.g. after a rejected update
    ///
    /// The global cache is always refreshed; the focused list only when that
    /// project is still selected.
    pub fn replace_project_tasks(&mut self, project_id: ProjectId, tasks: Vec<Task>) {
        if self.selected_project == Some(project_id) {
            self.install_project_tasks(project_id, tasks);
        } else {
            self.tasks.retain(|task| task.project_id != project_id);
            for task in tasks.into_iter().filter(|task| task.project_id == project_id) {
                if !self.deleted.tasks.contains(&task.id) {
                    self.tasks.upsert(task);
                }
            }
        }
    }

    fn install_project_tasks(&mut self, project_id: ProjectId, tasks: Vec<Task>) {
        let live: Vec<Task> = tasks
            .into_iter()
            .filter(|task| task.project_id == project_id && !self.deleted.tasks.contains(&task.id))
            .collect();
        self.tasks.retain(|task| task.project_id != project_id);
        for task in &live {
            self.tasks.upsert(task.clone());
        }
        self.focused_tasks.replace_all(live);
    }

    /// Optimistically set a task's status; returns the task as it was
    pub fn set_task_status(&mut self, task_id: TaskId, status: TaskStatus) -> Option<Task> {
        let previous = self
            .focused_tasks
            .get(&task_id)
            .or_else(|| self.tasks.get(&task_id))
            .cloned()?;
        if let Some(task) = self.focused_tasks.get_mut(&task_id) {
            task.status = status;
        }
        if let Some(task) = self.tasks.get_mut(&task_id) {
            task.status = status;
        }
        Some(previous)
    }

    // ---- navigation --------------------------------------------------------

    /// Switch view, clearing state that belongs only to the view being left
    pub fn navigate(&mut self, target: View) -> Vec<Effect> {
        let mut effects = Vec::new();

        let target = match target {
            View::Tasks if self.selected_project.is_none() => {
                if self.selected_team.is_some() {
                    View::Projects
                } else {
                    View::Teams
                }
            }
            View::Projects if self.selected_team.is_none() => View::Teams,
            other => other,
        };

        if target != View::Tasks {
            if let Some(project) = self.selected_project.take() {
                effects.push(Effect::LeaveRoom(RoomRef::project(project)));
                self.focused_tasks.clear();
                self.generations.project += 1;
            }
        }
        if !matches!(target, View::Projects | View::Tasks) && self.selected_team.take().is_some() {
            self.focused_projects.clear();
            self.generations.team += 1;
        }
        if target != View::Inbox {
            effects.extend(self.close_conversation());
        }

        self.view = target;
        effects.push(Effect::Navigate(target));
        effects
    }
}
