// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Terminal rendering of chat text and roadmap progress.

use std::fmt::Write as _;

use roadmap_core::{roadmap::Roadmap, segment, ChatMessage, ChatRole, Progress, Segment};

/// Render chat text for a terminal.  With `hyperlinks` every detected URL is
/// wrapped in an OSC 8 escape so it is clickable; the trailing characters
/// peeled off the URL stay outside the link.
pub fn linkify(text: &str, hyperlinks: bool) -> String {
    if !hyperlinks {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for seg in segment(text) {
        match seg {
            Segment::Literal(lit) => out.push_str(lit),
            Segment::Link { url, trailing } => {
                let _ = write!(out, "\x1b]8;;{url}\x1b\\{url}\x1b]8;;\x1b\\{trailing}");
            }
        }
    }
    out
}

/// One transcript entry as shown in the REPL.
pub fn chat_line(msg: &ChatMessage, hyperlinks: bool) -> String {
    let who = match msg.role {
        ChatRole::User => "you",
        ChatRole::Assistant => "assistant",
    };
    format!("{who}> {}", linkify(&msg.text, hyperlinks))
}

/// Debug listing of the segments `text` splits into.
pub fn segments_listing(text: &str) -> String {
    let mut out = String::new();
    for seg in segment(text) {
        let _ = match seg {
            Segment::Literal(lit) => writeln!(out, "text  {lit:?}"),
            Segment::Link { url, trailing } if trailing.is_empty() => writeln!(out, "link  {url:?}"),
            Segment::Link { url, trailing } => {
                writeln!(out, "link  {url:?} + {trailing:?}")
            }
        };
    }
    out
}

/// Roadmap overview with `[x]`/`[ ]` marks and topic counts.
pub fn roadmap_overview(roadmap: &Roadmap, progress: &Progress) -> String {
    let mut out = String::new();
    let done = (0..roadmap.len()).filter(|&i| progress.is_item_completed(i)).count();
    let _ = writeln!(out, "Progress: {done}/{} completed\n", roadmap.len());

    for (index, item) in roadmap.items.iter().enumerate() {
        let mark = if progress.is_item_completed(index) { "x" } else { " " };
        let _ = write!(out, "{index:>2}. [{mark}] {}", item.title);
        if !item.topics.is_empty() {
            let _ = write!(
                out,
                "  ({}/{} topics)",
                progress.completed_topics(item.id),
                item.topics.len()
            );
        }
        out.push('\n');
        for (t, topic) in item.topics.iter().enumerate() {
            let mark = if progress.is_topic_completed(item.id, t) { "x" } else { " " };
            let _ = writeln!(out, "      {t}. [{mark}] {topic}");
        }
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
