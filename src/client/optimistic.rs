//! # Optimistic Task Status
//!
//! Task status changes are applied to local state before the server confirms
//! them. On rejection the caller refetches the project's tasks and the
//! controller replaces local state with that authoritative list. If the
//! refetch fails too, the recorded previous status is restored instead.
//!
//! ```rust,no_run
//! # use teamsync::client::{OptimisticController, ReconciliationEngine};
//! # use teamsync::shared::{TaskId, TaskStatus, UserId};
//! let mut engine = ReconciliationEngine::new(UserId::new());
//! let mut controller = OptimisticController::new();
//! let task_id = TaskId::new();
//!
//! if let Some(change) = controller.apply(&mut engine, task_id, TaskStatus::Done) {
//!     // send the PATCH, then confirm or reject
//!     controller.confirm(change.task_id);
//! }
//! ```

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::client::engine::ReconciliationEngine;
use crate::client::notice::{self, Notice};
use crate::shared::ids::{ProjectId, TaskId};
use crate::shared::model::{Task, TaskStatus};

/// A status change shown locally but not yet confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStatusChange {
    pub task_id: TaskId,
    pub project_id: ProjectId,
    pub previous: TaskStatus,
    pub requested: TaskStatus,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct OptimisticController {
    pending: HashMap<TaskId, PendingStatusChange>,
}

impl OptimisticController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `status` locally
    ///
    /// Returns `None` when the task is not cached or already has that status;
    /// nothing needs to be sent in either case.
    pub fn apply(
        &mut self,
        engine: &mut ReconciliationEngine,
        task_id: TaskId,
        status: TaskStatus,
    ) -> Option<PendingStatusChange> {
        let current = engine
            .focused_tasks()
            .get(&task_id)
            .or_else(|| engine.tasks().get(&task_id))?;
        if current.status == status {
            return None;
        }

        let previous = engine.set_task_status(task_id, status)?;
        // A second move before the first settles keeps the oldest known-good status
        let original = self
            .pending
            .get(&task_id)
            .map(|pending| pending.previous)
            .unwrap_or(previous.status);

        let change = PendingStatusChange {
            task_id,
            project_id: previous.project_id,
            previous: original,
            requested: status,
            applied_at: Utc::now(),
        };
        self.pending.insert(task_id, change.clone());
        tracing::debug!(
            "[Optimistic] Task {} {:?} -> {:?}",
            task_id,
            previous.status,
            status
        );
        Some(change)
    }

    /// The server accepted the change
    pub fn confirm(&mut self, task_id: TaskId) -> Option<PendingStatusChange> {
        self.pending.remove(&task_id)
    }

    /// The server rejected the change
    ///
    /// `authoritative` is the refetched task list for the project, or `None`
    /// when that fetch failed as well.
    pub fn reject(
        &mut self,
        engine: &mut ReconciliationEngine,
        task_id: TaskId,
        authoritative: Option<Vec<Task>>,
    ) -> Notice {
        let pending = self.pending.remove(&task_id);
        match (authoritative, pending) {
            (Some(tasks), Some(change)) => {
                tracing::warn!(
                    "[Optimistic] Task {} rejected, replacing {} task(s) of project {}",
                    task_id,
                    tasks.len(),
                    change.project_id
                );
                engine.replace_project_tasks(change.project_id, tasks);
            }
            (None, Some(change)) => {
                tracing::warn!(
                    "[Optimistic] Task {} rejected and refetch failed, restoring {:?}",
                    task_id,
                    change.previous
                );
                engine.set_task_status(task_id, change.previous);
            }
            (_, None) => {
                tracing::debug!("[Optimistic] No pending change for task {}", task_id);
            }
        }
        Notice::error(notice::TASK_STATUS_ROLLBACK)
    }

    pub fn is_pending(&self, task_id: TaskId) -> bool {
        self.pending.contains_key(&task_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
