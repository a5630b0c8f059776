// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

const BUILTIN_ROADMAP: &str = include_str!("../assets/roadmap.json");

/// The ordered list of roadmap items (one per month, plus extras).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roadmap {
    pub items: Vec<RoadmapItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapItem {
    /// Stable identifier; topic progress is keyed by it.
    pub id: u32,
    pub title: String,
    pub goal: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub projects: Projects,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projects {
    pub title: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub text: String,
    pub url: String,
    pub kind: ResourceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Video,
    Book,
    Course,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Video => write!(f, "video"),
            ResourceKind::Book => write!(f, "book"),
            ResourceKind::Course => write!(f, "course"),
        }
    }
}

impl Roadmap {
    /// The roadmap shipped with the binary.
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_json(BUILTIN_ROADMAP).context("parsing built-in roadmap")
    }

    /// Load a roadmap from a JSON file with the same shape as the built-in one.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Use `path` when given, otherwise the built-in roadmap.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Self::builtin(),
        }
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let roadmap: Roadmap = serde_json::from_str(text)?;
        roadmap.check_ids()?;
        Ok(roadmap)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, id: u32) -> Option<&RoadmapItem> {
        self.items.iter().find(|i| i.id == id)
    }

    fn check_ids(&self) -> anyhow::Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for item in &self.items {
            if !seen.insert(item.id) {
                anyhow::bail!("duplicate roadmap item id {}", item.id);
            }
        }
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
