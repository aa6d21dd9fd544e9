//! # SQLite Directory
//!
//! The durable [`Directory`] the server binary runs on. Ids are stored as
//! UUID blobs and timestamps as microseconds since the epoch, so values read
//! back compare equal to the ones handed out on create.
//!
//! Multi-statement mutations run inside one transaction. Team deletion relies
//! on `ON DELETE CASCADE` for members, projects and tasks, which needs
//! foreign keys switched on for every pooled connection.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use uuid::Uuid;

use crate::backend::store::{Directory, Membership, StoreError, StoreResult, TeamRemoval, UserRecord};
use crate::shared::error::require_non_empty;
use crate::shared::ids::{ConversationId, MessageId, ProjectId, TaskId, TeamId, UserId};
use crate::shared::model::{Conversation, Message, Project, Task, TaskStatus, Team, UserSummary};
use crate::shared::requests::{NewTask, ProjectPatch, TaskPatch};

const SCHEMA: &str = include_str!("schema.sql");

const MESSAGE_SELECT: &str = "SELECT m.id, m.conversation_id, m.content, m.created_at,
        u.id AS sender_id, u.name AS sender_name, u.email AS sender_email, u.avatar_url AS sender_avatar
    FROM messages m JOIN users u ON u.id = m.sender_id";

#[derive(Debug, Clone)]
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    /// Open or create the database at `path`
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let directory = Self { pool };
        directory.init_schema().await?;
        tracing::info!("[Store] Opened {}", path.display());
        Ok(directory)
    }

    /// Private in-memory database
    pub async fn in_memory() -> StoreResult<Self> {
        // Every connection to :memory: is a separate database
        let options = SqliteConnectOptions::new().in_memory(true).foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let directory = Self { pool };
        directory.init_schema().await?;
        Ok(directory)
    }

    async fn init_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_empty(field: &str, value: &str) -> StoreResult<String> {
    require_non_empty(field, value).map_err(|e| StoreError::invalid(e.to_string()))
}

/// Current time at the precision the database keeps
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn instant(micros: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| StoreError::backend("timestamp out of range"))
}

fn status_name(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "todo",
        TaskStatus::Doing => "doing",
        TaskStatus::Done => "done",
    }
}

fn parse_status(raw: &str) -> StoreResult<TaskStatus> {
    match raw {
        "todo" => Ok(TaskStatus::Todo),
        "doing" => Ok(TaskStatus::Doing),
        "done" => Ok(TaskStatus::Done),
        other => Err(StoreError::backend(format!("unknown task status {:?}", other))),
    }
}

fn summary_from(row: &SqliteRow) -> StoreResult<UserSummary> {
    Ok(UserSummary {
        id: UserId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        avatar_url: row.try_get("avatar_url")?,
    })
}

fn project_from(row: &SqliteRow) -> StoreResult<Project> {
    Ok(Project {
        id: ProjectId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        team_id: TeamId(row.try_get("team_id")?),
        created_at: instant(row.try_get("created_at")?)?,
    })
}

fn task_from(row: &SqliteRow) -> StoreResult<Task> {
    let assignees: String = row.try_get("assignees")?;
    let status: String = row.try_get("status")?;
    let due_date = match row.try_get::<Option<i64>, _>("due_date")? {
        Some(micros) => Some(instant(micros)?),
        None => None,
    };
    Ok(Task {
        id: TaskId(row.try_get("id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: parse_status(&status)?,
        project_id: ProjectId(row.try_get("project_id")?),
        assignees: serde_json::from_str(&assignees).map_err(|e| StoreError::backend(e.to_string()))?,
        due_date,
        created_at: instant(row.try_get("created_at")?)?,
    })
}

fn message_from(row: &SqliteRow) -> StoreResult<Message> {
    Ok(Message {
        id: MessageId(row.try_get("id")?),
        conversation_id: ConversationId(row.try_get("conversation_id")?),
        sender: UserSummary {
            id: UserId(row.try_get("sender_id")?),
            name: row.try_get("sender_name")?,
            email: row.try_get("sender_email")?,
            avatar_url: row.try_get("sender_avatar")?,
        },
        content: row.try_get("content")?,
        created_at: instant(row.try_get("created_at")?)?,
    })
}

async fn load_user(conn: &mut SqliteConnection, id: UserId) -> StoreResult<UserSummary> {
    let row = sqlx::query("SELECT id, name, email, avatar_url FROM users WHERE id = ?")
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::not_found("user"))?;
    summary_from(&row)
}

async fn team_exists(conn: &mut SqliteConnection, id: TeamId) -> StoreResult<()> {
    sqlx::query("SELECT 1 FROM teams WHERE id = ?")
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?
        .map(|_| ())
        .ok_or(StoreError::not_found("team"))
}

async fn project_exists(conn: &mut SqliteConnection, id: ProjectId) -> StoreResult<()> {
    sqlx::query("SELECT 1 FROM projects WHERE id = ?")
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?
        .map(|_| ())
        .ok_or(StoreError::not_found("project"))
}

async fn load_team(conn: &mut SqliteConnection, id: TeamId) -> StoreResult<Team> {
    let row = sqlx::query("SELECT name, created_by, created_at FROM teams WHERE id = ?")
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::not_found("team"))?;
    let members = sqlx::query(
        "SELECT u.id, u.name, u.email, u.avatar_url
         FROM team_members m JOIN users u ON u.id = m.user_id
         WHERE m.team_id = ? ORDER BY m.rowid",
    )
    .bind(id.0)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(summary_from)
    .collect::<StoreResult<Vec<_>>>()?;

    Ok(Team {
        id,
        name: row.try_get("name")?,
        members,
        created_by: UserId(row.try_get("created_by")?),
        created_at: instant(row.try_get("created_at")?)?,
    })
}

async fn load_project(conn: &mut SqliteConnection, id: ProjectId) -> StoreResult<Project> {
    let row = sqlx::query("SELECT id, team_id, name, description, created_at FROM projects WHERE id = ?")
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::not_found("project"))?;
    project_from(&row)
}

async fn load_task(conn: &mut SqliteConnection, id: TaskId) -> StoreResult<Task> {
    let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::not_found("task"))?;
    task_from(&row)
}

async fn load_message(conn: &mut SqliteConnection, id: MessageId) -> StoreResult<Message> {
    let sql = format!("{} WHERE m.id = ?", MESSAGE_SELECT);
    let row = sqlx::query(&sql)
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::not_found("message"))?;
    message_from(&row)
}

async fn hydrate_conversation(conn: &mut SqliteConnection, row: &SqliteRow) -> StoreResult<Conversation> {
    let mut members = Vec::with_capacity(2);
    for column in ["member_a", "member_b"] {
        let id = UserId(row.try_get(column)?);
        members.push(load_user(&mut *conn, id).await?);
    }
    let last_message = match row.try_get::<Option<Uuid>, _>("last_message_id")? {
        Some(id) => Some(load_message(&mut *conn, MessageId(id)).await?),
        None => None,
    };
    Ok(Conversation {
        id: ConversationId(row.try_get("id")?),
        members,
        last_message,
        updated_at: instant(row.try_get("updated_at")?)?,
    })
}

async fn load_conversation(conn: &mut SqliteConnection, id: ConversationId) -> StoreResult<Conversation> {
    let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::not_found("conversation"))?;
    hydrate_conversation(conn, &row).await
}

#[async_trait]
impl Membership for SqliteDirectory {
    async fn is_team_member(&self, team: TeamId, user: UserId) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM team_members WHERE team_id = ? AND user_id = ?")
            .bind(team.0)
            .bind(user.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn is_project_member(&self, project: ProjectId, user: UserId) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM projects p JOIN team_members m ON m.team_id = p.team_id
             WHERE p.id = ? AND m.user_id = ?",
        )
        .bind(project.0)
        .bind(user.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn is_conversation_member(
        &self,
        conversation: ConversationId,
        user: UserId,
    ) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM conversations WHERE id = ? AND (member_a = ? OR member_b = ?)")
            .bind(conversation.0)
            .bind(user.0)
            .bind(user.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl Directory for SqliteDirectory {
    async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> StoreResult<UserRecord> {
        let email = normalize_email(email);
        let name = non_empty("name", name)?;
        let id = UserId::new();
        let inserted = sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, avatar_url, created_at)
             VALUES (?, ?, ?, ?, NULL, ?)",
        )
        .bind(id.0)
        .bind(&name)
        .bind(&email)
        .bind(password_hash)
        .bind(now().timestamp_micros())
        .execute(&self.pool)
        .await;
        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(StoreError::conflict("email already registered"));
            }
            Err(e) => return Err(e.into()),
        }
        Ok(UserRecord {
            summary: UserSummary { id, name, email, avatar_url: None },
            password_hash: password_hash.to_string(),
        })
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query("SELECT id, name, email, avatar_url, password_hash FROM users WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(UserRecord {
                summary: summary_from(&row)?,
                password_hash: row.try_get("password_hash")?,
            })),
            None => Ok(None),
        }
    }

    async fn user(&self, id: UserId) -> StoreResult<UserSummary> {
        let mut conn = self.pool.acquire().await?;
        load_user(&mut conn, id).await
    }

    async fn set_avatar(&self, id: UserId, avatar_url: Option<String>) -> StoreResult<UserSummary> {
        let mut conn = self.pool.acquire().await?;
        let updated = sqlx::query("UPDATE users SET avatar_url = ? WHERE id = ?")
            .bind(avatar_url)
            .bind(id.0)
            .execute(&mut *conn)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::not_found("user"));
        }
        load_user(&mut conn, id).await
    }

    async fn create_team(&self, name: &str, creator: UserId) -> StoreResult<Team> {
        let name = non_empty("name", name)?;
        let id = TeamId::new();
        let mut tx = self.pool.begin().await?;
        load_user(&mut tx, creator).await?;
        sqlx::query("INSERT INTO teams (id, name, created_by, created_at) VALUES (?, ?, ?, ?)")
            .bind(id.0)
            .bind(&name)
            .bind(creator.0)
            .bind(now().timestamp_micros())
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO team_members (team_id, user_id) VALUES (?, ?)")
            .bind(id.0)
            .bind(creator.0)
            .execute(&mut *tx)
            .await?;
        let team = load_team(&mut tx, id).await?;
        tx.commit().await?;
        Ok(team)
    }

    async fn teams_for_member(&self, user: UserId) -> StoreResult<Vec<Team>> {
        let mut conn = self.pool.acquire().await?;
        let ids: Vec<Uuid> = sqlx::query(
            "SELECT t.id FROM teams t JOIN team_members m ON m.team_id = t.id
             WHERE m.user_id = ? ORDER BY t.created_at, t.rowid",
        )
        .bind(user.0)
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(|row| row.try_get("id"))
        .collect::<Result<_, _>>()?;

        let mut teams = Vec::with_capacity(ids.len());
        for id in ids {
            teams.push(load_team(&mut conn, TeamId(id)).await?);
        }
        Ok(teams)
    }

    async fn team(&self, id: TeamId) -> StoreResult<Team> {
        let mut conn = self.pool.acquire().await?;
        load_team(&mut conn, id).await
    }

    async fn rename_team(&self, id: TeamId, name: &str) -> StoreResult<Team> {
        let name = non_empty("name", name)?;
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("UPDATE teams SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::not_found("team"));
        }
        let team = load_team(&mut tx, id).await?;
        tx.commit().await?;
        Ok(team)
    }

    async fn add_member(&self, id: TeamId, user: UserId) -> StoreResult<Team> {
        let mut tx = self.pool.begin().await?;
        load_user(&mut tx, user).await?;
        team_exists(&mut tx, id).await?;
        let inserted = sqlx::query("INSERT OR IGNORE INTO team_members (team_id, user_id) VALUES (?, ?)")
            .bind(id.0)
            .bind(user.0)
            .execute(&mut *tx)
            .await?;
        if inserted.rows_affected() == 0 {
            return Err(StoreError::invalid("user is already a member of this team"));
        }
        let team = load_team(&mut tx, id).await?;
        tx.commit().await?;
        Ok(team)
    }

    async fn remove_member(&self, id: TeamId, user: UserId) -> StoreResult<Team> {
        let mut tx = self.pool.begin().await?;
        team_exists(&mut tx, id).await?;
        let removed = sqlx::query("DELETE FROM team_members WHERE team_id = ? AND user_id = ?")
            .bind(id.0)
            .bind(user.0)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(StoreError::not_found("member"));
        }
        let team = load_team(&mut tx, id).await?;
        tx.commit().await?;
        Ok(team)
    }

    async fn delete_team(&self, id: TeamId) -> StoreResult<TeamRemoval> {
        let mut tx = self.pool.begin().await?;
        let team = load_team(&mut tx, id).await?;
        let projects: Vec<ProjectId> = sqlx::query("SELECT id FROM projects WHERE team_id = ? ORDER BY created_at, rowid")
            .bind(id.0)
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(|row| row.try_get("id").map(ProjectId))
            .collect::<Result<_, _>>()?;
        let tasks: i64 = sqlx::query(
            "SELECT COUNT(*) AS count FROM tasks
             WHERE project_id IN (SELECT id FROM projects WHERE team_id = ?)",
        )
        .bind(id.0)
        .fetch_one(&mut *tx)
        .await?
        .try_get("count")?;
        sqlx::query("DELETE FROM teams WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(TeamRemoval {
            team,
            projects,
            tasks: usize::try_from(tasks).unwrap_or_default(),
        })
    }

    async fn create_project(&self, team: TeamId, name: &str, description: Option<String>) -> StoreResult<Project> {
        let name = non_empty("name", name)?;
        let project = Project {
            id: ProjectId::new(),
            name,
            description,
            team_id: team,
            created_at: now(),
        };
        let mut tx = self.pool.begin().await?;
        team_exists(&mut tx, team).await?;
        sqlx::query("INSERT INTO projects (id, team_id, name, description, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(project.id.0)
            .bind(team.0)
            .bind(&project.name)
            .bind(&project.description)
            .bind(project.created_at.timestamp_micros())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(project)
    }

    async fn projects_for_team(&self, team: TeamId) -> StoreResult<Vec<Project>> {
        let mut conn = self.pool.acquire().await?;
        team_exists(&mut conn, team).await?;
        let rows = sqlx::query(
            "SELECT id, team_id, name, description, created_at FROM projects
             WHERE team_id = ? ORDER BY created_at, rowid",
        )
        .bind(team.0)
        .fetch_all(&mut *conn)
        .await?;
        rows.iter().map(project_from).collect()
    }

    async fn project(&self, id: ProjectId) -> StoreResult<Project> {
        let mut conn = self.pool.acquire().await?;
        load_project(&mut conn, id).await
    }

    async fn update_project(&self, id: ProjectId, patch: ProjectPatch) -> StoreResult<Project> {
        let name = match patch.name.as_deref() {
            Some(name) => Some(non_empty("name", name)?),
            None => None,
        };
        let mut tx = self.pool.begin().await?;
        let mut project = load_project(&mut tx, id).await?;
        if let Some(name) = name {
            project.name = name;
        }
        if let Some(description) = patch.description {
            project.description = Some(description);
        }
        sqlx::query("UPDATE projects SET name = ?, description = ? WHERE id = ?")
            .bind(&project.name)
            .bind(&project.description)
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(project)
    }

    async fn delete_project(&self, id: ProjectId) -> StoreResult<Project> {
        let mut tx = self.pool.begin().await?;
        let project = load_project(&mut tx, id).await?;
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(project)
    }

    async fn create_task(&self, task: NewTask) -> StoreResult<Task> {
        let title = non_empty("title", &task.title)?;
        let task = Task {
            id: TaskId::new(),
            title,
            description: task.description,
            status: task.status,
            project_id: task.project_id,
            assignees: task.assignees,
            due_date: task.due_date.map(|at| at.trunc_subsecs(6)),
            created_at: now(),
        };
        let assignees = serde_json::to_string(&task.assignees).map_err(|e| StoreError::backend(e.to_string()))?;
        let mut tx = self.pool.begin().await?;
        project_exists(&mut tx, task.project_id).await?;
        sqlx::query(
            "INSERT INTO tasks (id, project_id, title, description, status, assignees, due_date, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.id.0)
        .bind(task.project_id.0)
        .bind(&task.title)
        .bind(&task.description)
        .bind(status_name(task.status))
        .bind(assignees)
        .bind(task.due_date.map(|at| at.timestamp_micros()))
        .bind(task.created_at.timestamp_micros())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(task)
    }

    async fn tasks_for_project(&self, project: ProjectId) -> StoreResult<Vec<Task>> {
        let mut conn = self.pool.acquire().await?;
        project_exists(&mut conn, project).await?;
        let rows = sqlx::query("SELECT * FROM tasks WHERE project_id = ? ORDER BY created_at DESC, rowid DESC")
            .bind(project.0)
            .fetch_all(&mut *conn)
            .await?;
        rows.iter().map(task_from).collect()
    }

    async fn task(&self, id: TaskId) -> StoreResult<Task> {
        let mut conn = self.pool.acquire().await?;
        load_task(&mut conn, id).await
    }

    async fn update_task(&self, id: TaskId, patch: TaskPatch) -> StoreResult<Task> {
        let title = match patch.title.as_deref() {
            Some(title) => Some(non_empty("title", title)?),
            None => None,
        };
        let mut tx = self.pool.begin().await?;
        let mut task = load_task(&mut tx, id).await?;
        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = Some(description);
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(assignees) = patch.assignees {
            task.assignees = assignees;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = Some(due_date.trunc_subsecs(6));
        }
        let assignees = serde_json::to_string(&task.assignees).map_err(|e| StoreError::backend(e.to_string()))?;
        sqlx::query(
            "UPDATE tasks SET title = ?, description = ?, status = ?, assignees = ?, due_date = ?
             WHERE id = ?",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(status_name(task.status))
        .bind(assignees)
        .bind(task.due_date.map(|at| at.timestamp_micros()))
        .bind(id.0)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(task)
    }

    async fn delete_task(&self, id: TaskId) -> StoreResult<Task> {
        let mut tx = self.pool.begin().await?;
        let task = load_task(&mut tx, id).await?;
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(task)
    }

    async fn find_or_create_conversation(&self, a: UserId, b: UserId) -> StoreResult<(Conversation, bool)> {
        if a == b {
            return Err(StoreError::invalid("cannot start a conversation with yourself"));
        }
        let mut tx = self.pool.begin().await?;
        load_user(&mut tx, a).await?;
        load_user(&mut tx, b).await?;
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO conversations (id, member_a, member_b, last_message_id, updated_at)
             VALUES (?, ?, ?, NULL, ?)",
        )
        .bind(ConversationId::new().0)
        .bind(a.0)
        .bind(b.0)
        .bind(now().timestamp_micros())
        .execute(&mut *tx)
        .await?;
        let row = sqlx::query(
            "SELECT * FROM conversations
             WHERE (member_a = ? AND member_b = ?) OR (member_a = ? AND member_b = ?)",
        )
        .bind(a.0)
        .bind(b.0)
        .bind(b.0)
        .bind(a.0)
        .fetch_one(&mut *tx)
        .await?;
        let conversation = hydrate_conversation(&mut tx, &row).await?;
        tx.commit().await?;
        Ok((conversation, inserted.rows_affected() == 1))
    }

    async fn conversations_for_member(&self, user: UserId) -> StoreResult<Vec<Conversation>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(
            "SELECT * FROM conversations WHERE member_a = ? OR member_b = ?
             ORDER BY updated_at DESC, rowid DESC",
        )
        .bind(user.0)
        .bind(user.0)
        .fetch_all(&mut *conn)
        .await?;
        let mut conversations = Vec::with_capacity(rows.len());
        for row in &rows {
            conversations.push(hydrate_conversation(&mut conn, row).await?);
        }
        Ok(conversations)
    }

    async fn conversation(&self, id: ConversationId) -> StoreResult<Conversation> {
        let mut conn = self.pool.acquire().await?;
        load_conversation(&mut conn, id).await
    }

    async fn append_message(
        &self,
        conversation: ConversationId,
        sender: UserId,
        content: &str,
    ) -> StoreResult<(Message, Conversation)> {
        let content = non_empty("content", content)?;
        let mut tx = self.pool.begin().await?;
        let sender = load_user(&mut tx, sender).await?;
        let message = Message {
            id: MessageId::new(),
            conversation_id: conversation,
            sender,
            content,
            created_at: now(),
        };
        let updated = sqlx::query("UPDATE conversations SET last_message_id = ?, updated_at = ? WHERE id = ?")
            .bind(message.id.0)
            .bind(message.created_at.timestamp_micros())
            .bind(conversation.0)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::not_found("conversation"));
        }
        sqlx::query("INSERT INTO messages (id, conversation_id, sender_id, content, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(message.id.0)
            .bind(conversation.0)
            .bind(message.sender.id.0)
            .bind(&message.content)
            .bind(message.created_at.timestamp_micros())
            .execute(&mut *tx)
            .await?;
        let updated = load_conversation(&mut tx, conversation).await?;
        tx.commit().await?;
        Ok((message, updated))
    }

    async fn messages(&self, conversation: ConversationId) -> StoreResult<Vec<Message>> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("SELECT 1 FROM conversations WHERE id = ?")
            .bind(conversation.0)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(StoreError::not_found("conversation"))?;
        let sql = format!("{} WHERE m.conversation_id = ? ORDER BY m.created_at, m.rowid", MESSAGE_SELECT);
        let rows = sqlx::query(&sql)
            .bind(conversation.0)
            .fetch_all(&mut *conn)
            .await?;
        rows.iter().map(message_from).collect()
    }
}
