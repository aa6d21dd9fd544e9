/**
 * Direct Message Handlers
 *
 * - `POST /api/chat/start`               - find or create the conversation with a user;
 *                                          201 when created, 200 when it already existed
 * - `GET  /api/chat/conversations`       - caller's conversations, most recent first
 * - `GET  /api/chat/messages/{id}`       - history, oldest first
 * - `POST /api/chat/messages`            - send; fans out to the conversation room and
 *                                          every member's user room
 */

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::middleware::AuthUser;
use crate::backend::routes::access::conversation_for_member;
use crate::backend::server::state::AppState;
use crate::shared::error::require_non_empty;
use crate::shared::event::ServerEvent;
use crate::shared::ids::ConversationId;
use crate::shared::model::{Conversation, Message};
use crate::shared::requests::{NewMessage, StartConversation};

pub async fn start_conversation(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<StartConversation>,
) -> BackendResult<(StatusCode, Json<Conversation>)> {
    let other = state
        .directory
        .find_user_by_email(&request.email)
        .await?
        .ok_or_else(|| BackendError::not_found("user not found"))?;

    let (conversation, created) = state
        .directory
        .find_or_create_conversation(user, other.summary.id)
        .await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(conversation)))
}

pub async fn list_conversations(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> BackendResult<Json<Vec<Conversation>>> {
    Ok(Json(state.directory.conversations_for_member(user).await?))
}

pub async fn list_messages(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
) -> BackendResult<Json<Vec<Message>>> {
    conversation_for_member(state.directory.as_ref(), conversation_id, user).await?;
    Ok(Json(state.directory.messages(conversation_id).await?))
}

pub async fn send_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<NewMessage>,
) -> BackendResult<(StatusCode, Json<Message>)> {
    let content = require_non_empty("content", &request.content)?;
    conversation_for_member(state.directory.as_ref(), request.conversation_id, user).await?;

    let (message, conversation) = state
        .directory
        .append_message(request.conversation_id, user, &content)
        .await?;

    state
        .dispatcher
        .dispatch(&ServerEvent::MessageSent {
            message: message.clone(),
            conversation,
        })
        .await;
    Ok((StatusCode::CREATED, Json(message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::server::config::ServerConfig;
    use crate::shared::ids::UserId;

    async fn user(state: &AppState, name: &str) -> UserId {
        state
            .directory
            .create_user(name, &format!("{}@example.com", name), "hash")
            .await
            .unwrap()
            .summary
            .id
    }

    fn start(email: &str) -> Json<StartConversation> {
        Json(StartConversation { email: email.to_string() })
    }

    #[tokio::test]
    async fn test_start_conversation_reports_creation() {
        let state = AppState::new(ServerConfig::default());
        let alice = user(&state, "alice").await;
        let bob = user(&state, "bob").await;

        let (status, Json(first)) = start_conversation(AuthUser(alice), State(state.clone()), start("bob@example.com"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let (status, Json(again)) = start_conversation(AuthUser(bob), State(state), start("ALICE@example.com"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again.id, first.id);
    }

    #[tokio::test]
    async fn test_start_conversation_with_unknown_email() {
        let state = AppState::new(ServerConfig::default());
        let alice = user(&state, "alice").await;
        let result = start_conversation(AuthUser(alice), State(state), start("nobody@example.com")).await;
        assert!(matches!(result, Err(BackendError::NotFound { .. })));
    }
}
