/**
 * Mutation-to-Event Dispatcher
 *
 * Handlers call `Dispatcher::dispatch` after a mutation has been persisted.
 * The dispatcher computes the target rooms and hands the event to its sink in
 * one call, so every target room is enumerated before `dispatch` returns.
 * Delivery problems are logged and never reach the caller.
 *
 * The sink is injected at construction (`AppState` wires in the
 * `RoomTopology`), which keeps the fan-out dependency visible in every
 * component that publishes.
 */

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::realtime::fanout::target_rooms;
use crate::backend::realtime::topology::{Outbound, PublishReport, RoomTopology};
use crate::shared::event::ServerEvent;
use crate::shared::ids::UserId;
use crate::shared::protocol::ServerFrame;
use crate::shared::room::RoomRef;

/// Where dispatched events go
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &ServerEvent, rooms: &[RoomRef]) -> PublishReport;

    /// Remove a user's live sessions from rooms they may no longer join
    async fn evict_user(&self, user: UserId, rooms: &[RoomRef]) -> usize;

    /// Remove every session from rooms whose entity no longer exists
    async fn close_rooms(&self, rooms: &[RoomRef]) -> usize;
}

#[async_trait]
impl EventSink for RoomTopology {
    async fn publish(&self, event: &ServerEvent, rooms: &[RoomRef]) -> PublishReport {
        let json = match serde_json::to_string(&ServerFrame::event(event.clone())) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("[Realtime] Failed to serialize {}: {}", event.name(), e);
                return PublishReport::default();
            }
        };
        self.broadcast(rooms, Outbound::from(json)).await
    }

    async fn evict_user(&self, user: UserId, rooms: &[RoomRef]) -> usize {
        self.evict(user, rooms).await
    }

    async fn close_rooms(&self, rooms: &[RoomRef]) -> usize {
        self.close(rooms).await
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn EventSink>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub async fn dispatch(&self, event: &ServerEvent) -> PublishReport {
        let rooms = target_rooms(event);
        let report = self.sink.publish(event, &rooms).await;

        if report.dropped > 0 || report.stale > 0 {
            tracing::warn!(
                "[Realtime] {} partially delivered: {} ok, {} dropped, {} stale",
                event.name(),
                report.delivered,
                report.dropped,
                report.stale
            );
        } else {
            tracing::debug!(
                "[Realtime] {} -> {} room(s), {} session(s)",
                event.name(),
                rooms.len(),
                report.delivered
            );
        }
        report
    }

    pub async fn evict_user(&self, user: UserId, rooms: &[RoomRef]) -> usize {
        self.sink.evict_user(user, rooms).await
    }

    pub async fn close_rooms(&self, rooms: &[RoomRef]) -> usize {
        self.sink.close_rooms(rooms).await
    }
}
