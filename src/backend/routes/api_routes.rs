/**
 * API Routes
 *
 * ## Authentication
 * - `POST /api/auth/register`, `POST /api/auth/login`, `GET /api/auth/me`
 *
 * ## Teams
 * - `GET/POST /api/teams`, `PATCH/DELETE /api/teams/{id}`
 * - `POST /api/teams/{id}/add`, `DELETE /api/teams/{id}/members/{member}`
 *
 * ## Projects
 * - `GET /api/projects/team/{team}`, `POST /api/projects`,
 *   `PATCH/DELETE /api/projects/{id}`
 *
 * ## Tasks
 * - `GET /api/tasks/project/{project}`, `POST /api/tasks`,
 *   `PATCH/DELETE /api/tasks/{id}`
 *
 * ## Chat
 * - `POST /api/chat/start`, `GET /api/chat/conversations`,
 *   `GET /api/chat/messages/{id}`, `POST /api/chat/messages`
 *
 * ## Users
 * - `PATCH /api/users/{id}/avatar`
 *
 * All routes except register, login and health require a bearer token; the
 * `AuthUser` extractor enforces it per handler.
 */

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::backend::auth::{login, me, register};
use crate::backend::routes::{chat, projects, tasks, teams, users};
use crate::backend::server::state::AppState;

pub fn configure_api_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/teams", get(teams::list_teams).post(teams::create_team))
        .route("/api/teams/{id}", patch(teams::rename_team).delete(teams::delete_team))
        .route("/api/teams/{id}/add", post(teams::add_member))
        .route(
            "/api/teams/{id}/members/{member}",
            axum::routing::delete(teams::remove_member),
        )
        .route("/api/projects", post(projects::create_project))
        .route("/api/projects/team/{team}", get(projects::list_team_projects))
        .route(
            "/api/projects/{id}",
            patch(projects::update_project).delete(projects::delete_project),
        )
        .route("/api/tasks", post(tasks::create_task))
        .route("/api/tasks/project/{project}", get(tasks::list_project_tasks))
        .route("/api/tasks/{id}", patch(tasks::update_task).delete(tasks::delete_task))
        .route("/api/chat/start", post(chat::start_conversation))
        .route("/api/chat/conversations", get(chat::list_conversations))
        .route(
            "/api/chat/messages",
            post(chat::send_message),
        )
        .route("/api/chat/messages/{id}", get(chat::list_messages))
        .route("/api/users/{id}/avatar", patch(users::update_avatar))
}
