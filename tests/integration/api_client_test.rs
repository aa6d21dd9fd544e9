//! REST client and optimistic rollback against a mocked server

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Utc;
use serde_json::json;
use teamsync::client::notice::TASK_STATUS_ROLLBACK;
use teamsync::client::{
    ClientConfig, ClientError, ClientResult, FrameSink, HttpApi, MemoryUnreadStore, SyncApi, SyncClient,
    UnreadTracker,
};
use teamsync::shared::config::AppConfig;
use teamsync::shared::{ClientFrame, ProjectId, Task, TaskId, TaskStatus, TeamId, UserId, UserSummary};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct NullSink;

impl FrameSink for NullSink {
    fn send_frame(&self, _frame: ClientFrame) -> ClientResult<()> {
        Ok(())
    }
}

fn api_for(server: &MockServer) -> HttpApi {
    let app = AppConfig::builder().server_url(server.uri()).build().unwrap();
    HttpApi::new(ClientConfig::new(app).with_token("test-token"))
}

fn task(project_id: ProjectId) -> Task {
    Task {
        id: TaskId::new(),
        title: "Write docs".to_string(),
        description: None,
        status: TaskStatus::Todo,
        project_id,
        assignees: vec![],
        due_date: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/teams"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let teams = api_for(&server).list_teams().await.unwrap();
    assert!(teams.is_empty());
}

#[tokio::test]
async fn test_forbidden_maps_to_authorization_denied() {
    let server = MockServer::start().await;
    let team = TeamId::new();
    Mock::given(method("DELETE"))
        .and(path(format!("/api/teams/{}", team)))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"error": "only the team creator can do this", "status": 403})),
        )
        .mount(&server)
        .await;

    let result = api_for(&server).delete_team(team).await;
    assert_matches!(result, Err(ClientError::AuthorizationDenied { message }) => {
        assert_eq!(message, "only the team creator can do this");
    });
}

#[tokio::test]
async fn test_not_found_and_other_statuses() {
    let server = MockServer::start().await;
    let project = ProjectId::new();
    Mock::given(method("GET"))
        .and(path(format!("/api/tasks/project/{}", project)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "project not found", "status": 404})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/teams"))
        .respond_with(ResponseTemplate::new(400).set_body_string("plain failure"))
        .mount(&server)
        .await;

    let api = api_for(&server);
    assert!(api.list_tasks(project).await.unwrap_err().is_not_found());
    assert_matches!(
        api.create_team("").await,
        Err(ClientError::Api { status: 400, message }) if message == "plain failure"
    );
}

#[tokio::test]
async fn test_status_patch_body() {
    let server = MockServer::start().await;
    let mut updated = task(ProjectId::new());
    updated.status = TaskStatus::Done;
    Mock::given(method("PATCH"))
        .and(path(format!("/api/tasks/{}", updated.id)))
        .and(body_json(json!({"status": "done"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(&updated))
        .expect(1)
        .mount(&server)
        .await;

    let result = api_for(&server)
        .update_task(updated.id, &teamsync::shared::requests::TaskPatch::status(TaskStatus::Done))
        .await
        .unwrap();
    assert_eq!(result.status, TaskStatus::Done);
}

#[tokio::test]
async fn test_failed_drag_restores_original_status() {
    let server = MockServer::start().await;
    let project = ProjectId::new();
    let original = task(project);

    Mock::given(method("GET"))
        .and(path(format!("/api/tasks/project/{}", project)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([original.clone()])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("/api/tasks/{}", original.id)))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom", "status": 500})))
        .mount(&server)
        .await;

    let me = UserSummary {
        id: UserId::new(),
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        avatar_url: None,
    };
    let unread = UnreadTracker::load(me.id, Arc::new(MemoryUnreadStore::new())).await;
    let mut client = SyncClient::new(me, Arc::new(api_for(&server)), Arc::new(NullSink), unread);

    client.select_project(project).await.unwrap();
    let result = client.move_task(original.id, TaskStatus::Doing).await;

    assert_matches!(result, Err(ClientError::OptimisticMismatch { .. }));
    let restored = client.engine().focused_tasks().get(&original.id).unwrap();
    assert_eq!(restored.status, TaskStatus::Todo);
    assert!(client.notices().contains(TASK_STATUS_ROLLBACK));
}
