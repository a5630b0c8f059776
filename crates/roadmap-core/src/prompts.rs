// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use anyhow::Context;

use crate::roadmap::Roadmap;

/// Build the instruction block that primes every chat session.
///
/// The roadmap is embedded as pretty-printed JSON after the instructions so
/// the model can quote titles and resource URLs exactly.
pub fn context_prompt(roadmap: &Roadmap) -> anyhow::Result<String> {
    let months = roadmap.items.iter().filter(|i| !i.topics.is_empty()).count();
    let data = serde_json::to_string_pretty(roadmap).context("serializing roadmap for context")?;

    Ok(format!(
        "You are a helpful and encouraging assistant for a learner following a {months}-month \
         AI & ML developer roadmap.  Answer questions using only the roadmap data below.  \
         Be supportive and clear.\n\n\
         ## Responsibilities\n\n\
         1. Navigate the roadmap: when asked about a month, summarise its goal, topics and \
         projects.\n\
         2. Give exact resources: when asked for a named resource, reply with its URL from the \
         `resources` list, written out in full.\n\
         3. Topic requests: when asked where to learn a topic, find the month that covers it \
         and list all of that month's resources.\n\
         4. Vague requests: when a request is too vague to pick one resource (for example \
         \"give me the video\"), do not guess; ask which one is meant and name a few \
         candidates.\n\
         5. Stay in scope: if a question falls outside the roadmap, say so politely and steer \
         back to what the roadmap offers.\n\
         6. Never provide links or facts that are not present in the roadmap data.\n\n\
         ## Roadmap data (JSON)\n\n\
         {data}\n"
    ))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
