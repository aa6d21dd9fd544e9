//! Keyed collection
//!
//! Dense storage plus an id index. Lookups and upserts are O(1) and
//! idempotent: upserting an id that is already present replaces the entry in
//! place, so repeated delivery of the same event cannot create duplicates.
//! Removal keeps the remaining entries in their original order.

use std::collections::HashMap;
use std::hash::Hash;

use crate::shared::ids::{ConversationId, MessageId, ProjectId, TaskId, TeamId};
use crate::shared::model::{Conversation, Message, Project, Task, Team};

/// Entities that can live in a `KeyedCollection`
pub trait Keyed {
    type Key: Copy + Eq + Hash;

    fn key(&self) -> Self::Key;
}

impl Keyed for Team {
    type Key = TeamId;
    fn key(&self) -> TeamId {
        self.id
    }
}

impl Keyed for Project {
    type Key = ProjectId;
    fn key(&self) -> ProjectId {
        self.id
    }
}

impl Keyed for Task {
    type Key = TaskId;
    fn key(&self) -> TaskId {
        self.id
    }
}

impl Keyed for Conversation {
    type Key = ConversationId;
    fn key(&self) -> ConversationId {
        self.id
    }
}

impl Keyed for Message {
    type Key = MessageId;
    fn key(&self) -> MessageId {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct KeyedCollection<T: Keyed> {
    items: Vec<T>,
    index: HashMap<T::Key, usize>,
}

impl<T: Keyed> Default for KeyedCollection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Keyed> KeyedCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        let mut collection = Self::new();
        collection.replace_all(items);
        collection
    }

    /// Insert, or replace in place when the key is already present
    ///
    /// Returns `true` when the key was new.
    pub fn upsert(&mut self, item: T) -> bool {
        match self.index.get(&item.key()) {
            Some(&position) => {
                self.items[position] = item;
                false
            }
            None => {
                self.index.insert(item.key(), self.items.len());
                self.items.push(item);
                true
            }
        }
    }

    /// Replace only if present; absent keys are ignored
    pub fn replace(&mut self, item: T) -> bool {
        match self.index.get(&item.key()) {
            Some(&position) => {
                self.items[position] = item;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        let position = self.index.remove(key)?;
        let removed = self.items.remove(position);
        for (offset, item) in self.items[position..].iter().enumerate() {
            self.index.insert(item.key(), position + offset);
        }
        Some(removed)
    }

    /// Keep only the entries matching `keep`; returns the removed keys
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<T::Key>
    where
        F: FnMut(&T) -> bool,
    {
        let mut removed = Vec::new();
        self.items.retain(|item| {
            let kept = keep(item);
            if !kept {
                removed.push(item.key());
            }
            kept
        });
        if !removed.is_empty() {
            self.reindex();
        }
        removed
    }

    /// Discard everything and load `items`; later duplicates win
    pub fn replace_all(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.clear();
        self.index.clear();
        for item in items {
            self.upsert(item);
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(position, item)| (item.key(), position))
            .collect();
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.index.get(key).map(|&position| &self.items[position])
    }

    pub fn get_mut(&mut self, key: &T::Key) -> Option<&mut T> {
        match self.index.get(key) {
            Some(&position) => self.items.get_mut(position),
            None => None,
        }
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = T::Key> + '_ {
        self.items.iter().map(T::key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
