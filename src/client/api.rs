/**
 * REST Client
 *
 * Typed calls against the request/response channel. `SyncApi` is the seam
 * the sync client depends on; `HttpApi` implements it with reqwest and a
 * bearer token.
 *
 * Non-success responses carry `{"error": ..., "status": ...}`; the message is
 * extracted and mapped through `ClientError::from_status`.
 */

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::config::ClientConfig;
use crate::client::error::{ClientError, ClientResult};
use crate::shared::ids::{ConversationId, ProjectId, TaskId, TeamId, UserId};
use crate::shared::model::{Conversation, Message, Project, Task, Team, UserSummary};
use crate::shared::requests::{
    AuthResponse, Credentials, MemberInvite, NewMessage, NewProject, NewTask, ProjectPatch,
    Registration, StartConversation, TaskPatch, TeamName,
};

#[async_trait]
pub trait SyncApi: Send + Sync {
    async fn me(&self) -> ClientResult<UserSummary>;

    async fn list_teams(&self) -> ClientResult<Vec<Team>>;
    async fn create_team(&self, name: &str) -> ClientResult<Team>;
    async fn rename_team(&self, team: TeamId, name: &str) -> ClientResult<Team>;
    async fn add_member(&self, team: TeamId, email: &str) -> ClientResult<Team>;
    async fn remove_member(&self, team: TeamId, member: UserId) -> ClientResult<Team>;
    async fn delete_team(&self, team: TeamId) -> ClientResult<()>;

    async fn list_projects(&self, team: TeamId) -> ClientResult<Vec<Project>>;
    async fn create_project(&self, project: &NewProject) -> ClientResult<Project>;
    async fn update_project(&self, project: ProjectId, patch: &ProjectPatch) -> ClientResult<Project>;
    async fn delete_project(&self, project: ProjectId) -> ClientResult<()>;

    async fn list_tasks(&self, project: ProjectId) -> ClientResult<Vec<Task>>;
    async fn create_task(&self, task: &NewTask) -> ClientResult<Task>;
    async fn update_task(&self, task: TaskId, patch: &TaskPatch) -> ClientResult<Task>;
    async fn delete_task(&self, task: TaskId) -> ClientResult<()>;

    async fn start_conversation(&self, email: &str) -> ClientResult<Conversation>;
    async fn list_conversations(&self) -> ClientResult<Vec<Conversation>>;
    async fn list_messages(&self, conversation: ConversationId) -> ClientResult<Vec<Message>>;
    async fn send_message(&self, conversation: ConversationId, content: &str) -> ClientResult<Message>;
}

#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    config: ClientConfig,
}

impl HttpApi {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Register and keep the returned token for later calls
    pub async fn register(&mut self, registration: &Registration) -> ClientResult<AuthResponse> {
        let url = self.config.api_url("/api/auth/register");
        let auth: AuthResponse = decode(self.client.post(&url).json(registration).send().await?).await?;
        self.config = self.config.clone().with_token(auth.token.clone());
        Ok(auth)
    }

    /// Log in and keep the returned token for later calls
    pub async fn login(&mut self, credentials: &Credentials) -> ClientResult<AuthResponse> {
        let url = self.config.api_url("/api/auth/login");
        let auth: AuthResponse = decode(self.client.post(&url).json(credentials).send().await?).await?;
        self.config = self.config.clone().with_token(auth.token.clone());
        Ok(auth)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.config.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let url = self.config.api_url(path);
        let response = self.authorized(self.client.get(&url)).send().await?;
        decode(response).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        let url = self.config.api_url(path);
        let response = self.authorized(self.client.post(&url)).json(body).send().await?;
        decode(response).await
    }

    async fn patch<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        let url = self.config.api_url(path);
        let response = self.authorized(self.client.patch(&url)).json(body).send().await?;
        decode(response).await
    }

    async fn delete_path<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let url = self.config.api_url(path);
        let response = self.authorized(self.client.delete(&url)).send().await?;
        decode(response).await
    }

    async fn delete_empty(&self, path: &str) -> ClientResult<()> {
        let url = self.config.api_url(path);
        let response = self.authorized(self.client.delete(&url)).send().await?;
        check(response).await.map(|_| ())
    }
}

/// Turn a non-success response into the matching `ClientError`
async fn check(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| value.get("error").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body
            }
        });
    tracing::debug!("[Api] {} {}", status.as_u16(), message);
    Err(ClientError::from_status(status.as_u16(), message))
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let response = check(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl SyncApi for HttpApi {
    async fn me(&self) -> ClientResult<UserSummary> {
        self.get("/api/auth/me").await
    }

    async fn list_teams(&self) -> ClientResult<Vec<Team>> {
        self.get("/api/teams").await
    }

    async fn create_team(&self, name: &str) -> ClientResult<Team> {
        self.post("/api/teams", &TeamName { name: name.to_string() }).await
    }

    async fn rename_team(&self, team: TeamId, name: &str) -> ClientResult<Team> {
        self.patch(&format!("/api/teams/{}", team), &TeamName { name: name.to_string() })
            .await
    }

    async fn add_member(&self, team: TeamId, email: &str) -> ClientResult<Team> {
        self.post(
            &format!("/api/teams/{}/add", team),
            &MemberInvite { email: email.to_string() },
        )
        .await
    }

    async fn remove_member(&self, team: TeamId, member: UserId) -> ClientResult<Team> {
        self.delete_path(&format!("/api/teams/{}/members/{}", team, member)).await
    }

    async fn delete_team(&self, team: TeamId) -> ClientResult<()> {
        self.delete_empty(&format!("/api/teams/{}", team)).await
    }

    async fn list_projects(&self, team: TeamId) -> ClientResult<Vec<Project>> {
        self.get(&format!("/api/projects/team/{}", team)).await
    }

    async fn create_project(&self, project: &NewProject) -> ClientResult<Project> {
        self.post("/api/projects", project).await
    }

    async fn update_project(&self, project: ProjectId, patch: &ProjectPatch) -> ClientResult<Project> {
        self.patch(&format!("/api/projects/{}", project), patch).await
    }

    async fn delete_project(&self, project: ProjectId) -> ClientResult<()> {
        self.delete_empty(&format!("/api/projects/{}", project)).await
    }

    async fn list_tasks(&self, project: ProjectId) -> ClientResult<Vec<Task>> {
        self.get(&format!("/api/tasks/project/{}", project)).await
    }

    async fn create_task(&self, task: &NewTask) -> ClientResult<Task> {
        self.post("/api/tasks", task).await
    }

    async fn update_task(&self, task: TaskId, patch: &TaskPatch) -> ClientResult<Task> {
        self.patch(&format!("/api/tasks/{}", task), patch).await
    }

    async fn delete_task(&self, task: TaskId) -> ClientResult<()> {
        self.delete_empty(&format!("/api/tasks/{}", task)).await
    }

    async fn start_conversation(&self, email: &str) -> ClientResult<Conversation> {
        self.post("/api/chat/start", &StartConversation { email: email.to_string() })
            .await
    }

    async fn list_conversations(&self) -> ClientResult<Vec<Conversation>> {
        self.get("/api/chat/conversations").await
    }

    async fn list_messages(&self, conversation: ConversationId) -> ClientResult<Vec<Message>> {
        self.get(&format!("/api/chat/messages/{}", conversation)).await
    }

    async fn send_message(&self, conversation: ConversationId, content: &str) -> ClientResult<Message> {
        self.post(
            "/api/chat/messages",
            &NewMessage {
                conversation_id: conversation,
                content: content.to_string(),
            },
        )
        .await
    }
}
