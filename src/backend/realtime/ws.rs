/**
 * Websocket Endpoint
 *
 * GET /ws?token=<jwt> (or `Authorization: Bearer`)
 *
 * The token is verified before the upgrade; a missing or invalid credential
 * gets a 401 and no session is created. After the upgrade the connection runs
 * two halves:
 *
 * - a writer task draining the session's outbound queue into the socket and
 *   sending keepalive pings
 * - the reader loop parsing `ClientFrame`s and answering each with an
 *   acknowledgement through the same queue
 *
 * When either half stops, the session is closed and its rooms released.
 */

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::middleware::bearer_token;
use crate::backend::realtime::session::ConnectionSession;
use crate::backend::realtime::topology::RoomTopology;
use crate::backend::server::state::AppState;
use crate::shared::ids::UserId;

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> BackendResult<Response> {
    let token = params
        .token
        .as_deref()
        .or_else(|| bearer_token(&headers))
        .ok_or_else(|| BackendError::unauthorized("missing token"))?;

    let user = state.tokens.verify(token)?;
    if state.directory.user(user).await.is_err() {
        return Err(BackendError::unauthorized("unknown user"));
    }

    let topology = state.topology.clone();
    let capacity = state.config.session_queue_capacity;
    let keepalive = Duration::from_secs(state.config.keepalive_secs);

    Ok(ws.on_upgrade(move |socket| run_connection(socket, topology, user, capacity, keepalive)))
}

async fn run_connection(
    socket: WebSocket,
    topology: Arc<RoomTopology>,
    user: UserId,
    capacity: usize,
    keepalive: Duration,
) {
    let (session, mut outbound) = ConnectionSession::open(topology, user, capacity).await;
    let session_id = session.id();
    tracing::info!("[Realtime] Session {} opened for {}", session_id, user);

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(keepalive);
        // The first tick completes immediately
        ping.tick().await;
        loop {
            tokio::select! {
                payload = outbound.recv() => {
                    let Some(payload) = payload else { break };
                    if sink.send(Message::Text(payload.to_string().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if sink.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let reply = session.handle_text(text.as_str()).await;
                    session.reply(&reply);
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!("[Realtime] Socket error on {}: {}", session_id, e);
                    break;
                }
            },
            _ = &mut writer => {
                tracing::debug!("[Realtime] Writer for {} stopped", session_id);
                break;
            }
        }
    }

    session.close().await;
    writer.abort();
}
