//! User-facing notices (toasts)
//!
//! A bounded queue; the oldest notice is dropped when it is full.

use std::collections::VecDeque;

pub const LIVE_UPDATES_UNAVAILABLE: &str = "Live updates unavailable";
pub const TASK_STATUS_ROLLBACK: &str = "Failed to update task status. Restoring tasks.";
pub const TEAM_DELETED: &str = "This team was deleted";
pub const PROJECT_DELETED: &str = "This project was deleted";
pub const REMOVED_FROM_TEAM: &str = "You were removed from this team";

const DEFAULT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, text: text.into() }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, text: text.into() }
    }

    pub fn new_message(sender: &str) -> Self {
        Self::info(format!("New message from {}", sender))
    }
}

#[derive(Debug, Clone)]
pub struct Notices {
    queue: VecDeque<Notice>,
    capacity: usize,
}

impl Default for Notices {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl Notices {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, notice: Notice) {
        if self.queue.len() == self.capacity {
            self.queue.pop_front();
        }
        tracing::debug!("[Sync] Notice ({:?}): {}", notice.level, notice.text);
        self.queue.push_back(notice);
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.queue.back()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.queue.iter().any(|notice| notice.text == text)
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
