// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::roadmap::Roadmap;
use crate::store::KeyValueStore;

/// The two values progress is persisted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKey {
    /// Per-item completion, a JSON array of booleans.
    Items,
    /// Per-topic completion, a JSON object of item id → array of booleans.
    Topics,
}

impl ProgressKey {
    pub const ALL: [ProgressKey; 2] = [ProgressKey::Items, ProgressKey::Topics];

    pub fn as_str(self) -> &'static str {
        match self {
            ProgressKey::Items => "completedMonths",
            ProgressKey::Topics => "completedTopics",
        }
    }
}

/// Checkbox state for a roadmap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    /// Completion flag per roadmap item, by position.
    pub completed: Vec<bool>,
    /// Completion flags per topic, keyed by roadmap item id.
    pub topics: BTreeMap<u32, Vec<bool>>,
}

impl Progress {
    /// Everything unchecked: one flag per item, and one per topic for every
    /// item that has topics.
    pub fn for_roadmap(roadmap: &Roadmap) -> Self {
        Self {
            completed: default_items(roadmap),
            topics: default_topics(roadmap),
        }
    }

    /// Read both keys from `store`.
    ///
    /// Each key is independent: a missing, unreadable or corrupt value falls
    /// back to its unchecked default and is logged.  Never fails.
    pub fn load(store: &dyn KeyValueStore, roadmap: &Roadmap) -> Self {
        let completed = load_key::<Vec<Option<bool>>>(store, ProgressKey::Items)
            .map(flatten_flags)
            .unwrap_or_else(|| default_items(roadmap));
        let topics = load_key::<BTreeMap<u32, Vec<Option<bool>>>>(store, ProgressKey::Topics)
            .map(|map| map.into_iter().map(|(id, flags)| (id, flatten_flags(flags))).collect())
            .unwrap_or_else(|| default_topics(roadmap));
        Self { completed, topics }
    }

    /// Serialize the value stored under `key`.
    pub fn serialize(&self, key: ProgressKey) -> anyhow::Result<String> {
        let text = match key {
            ProgressKey::Items => serde_json::to_string(&self.completed),
            ProgressKey::Topics => serde_json::to_string(&self.topics),
        };
        text.with_context(|| format!("serializing {}", key.as_str()))
    }

    /// Write the value of `key` to `store`.
    pub fn save(&self, store: &dyn KeyValueStore, key: ProgressKey) -> anyhow::Result<()> {
        store.set(key.as_str(), &self.serialize(key)?)
    }

    pub fn is_item_completed(&self, index: usize) -> bool {
        self.completed.get(index).copied().unwrap_or(false)
    }

    pub fn is_topic_completed(&self, item_id: u32, topic: usize) -> bool {
        self.topics
            .get(&item_id)
            .and_then(|flags| flags.get(topic).copied())
            .unwrap_or(false)
    }

    /// Number of checked topics of one item.
    pub fn completed_topics(&self, item_id: u32) -> usize {
        self.topics
            .get(&item_id)
            .map_or(0, |flags| flags.iter().filter(|&&done| done).count())
    }

    fn toggle_item(&mut self, index: usize) -> bool {
        flip(&mut self.completed, index)
    }

    fn toggle_topic(&mut self, item_id: u32, topic: usize) -> bool {
        flip(self.topics.entry(item_id).or_default(), topic)
    }
}

/// Flip `flags[index]`, growing the vector with `false` when needed.
fn flip(flags: &mut Vec<bool>, index: usize) -> bool {
    if flags.len() <= index {
        flags.resize(index + 1, false);
    }
    flags[index] = !flags[index];
    flags[index]
}

/// Stored arrays may contain `null` holes; they read as unchecked.
fn flatten_flags(flags: Vec<Option<bool>>) -> Vec<bool> {
    flags.into_iter().map(|f| f.unwrap_or(false)).collect()
}

fn default_items(roadmap: &Roadmap) -> Vec<bool> {
    vec![false; roadmap.len()]
}

fn default_topics(roadmap: &Roadmap) -> BTreeMap<u32, Vec<bool>> {
    roadmap
        .items
        .iter()
        .filter(|item| !item.topics.is_empty())
        .map(|item| (item.id, vec![false; item.topics.len()]))
        .collect()
}

fn load_key<T: DeserializeOwned>(store: &dyn KeyValueStore, key: ProgressKey) -> Option<T> {
    let raw = match store.get(key.as_str()) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key = key.as_str(), "no saved progress, starting fresh");
            return None;
        }
        Err(e) => {
            warn!(key = key.as_str(), error = %format!("{e:#}"), "failed to read saved progress");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key = key.as_str(), error = %e, "failed to parse saved progress");
            None
        }
    }
}

// ─── Tracker ─────────────────────────────────────────────────────────────────

/// Called after every change with the key that changed.
pub type ChangeObserver = Box<dyn FnMut(ProgressKey, &Progress) + Send>;

/// Owns the progress state and notifies an observer after each mutation.
pub struct ProgressTracker {
    progress: Progress,
    observer: Option<ChangeObserver>,
}

impl ProgressTracker {
    pub fn new(progress: Progress) -> Self {
        Self { progress, observer: None }
    }

    pub fn with_observer(progress: Progress, observer: ChangeObserver) -> Self {
        Self { progress, observer: Some(observer) }
    }

    /// Tracker that writes each changed key back to `store`.  Write failures
    /// are logged; the in-memory state stays authoritative.
    pub fn persisting(progress: Progress, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_observer(
            progress,
            Box::new(move |key, progress| {
                if let Err(e) = progress.save(store.as_ref(), key) {
                    warn!(key = key.as_str(), error = %format!("{e:#}"), "failed to save progress");
                }
            }),
        )
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Flip the completion flag of the item at `index`; returns the new value.
    pub fn toggle_item(&mut self, index: usize) -> bool {
        let done = self.progress.toggle_item(index);
        self.notify(ProgressKey::Items);
        done
    }

    /// Flip one topic flag of item `item_id`; returns the new value.
    pub fn toggle_topic(&mut self, item_id: u32, topic: usize) -> bool {
        let done = self.progress.toggle_topic(item_id, topic);
        self.notify(ProgressKey::Topics);
        done
    }

    fn notify(&mut self, key: ProgressKey) {
        if let Some(observer) = self.observer.as_mut() {
            observer(key, &self.progress);
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
