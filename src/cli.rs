// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "roadmap",
    about = "Track a learning roadmap and chat with an AI study assistant",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file (overrides auto-discovery)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Model to use, e.g. "gemini-2.5-pro" or "mock/echo"
    #[arg(long, short = 'M', env = "ROADMAP_MODEL", global = true)]
    pub model: Option<String>,

    /// Progress file (overrides `progress.file` from the config)
    #[arg(long, value_name = "PATH", env = "ROADMAP_PROGRESS_FILE", global = true)]
    pub progress_file: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with the assistant (default when no command is given)
    Chat {
        /// Print URLs as plain text instead of terminal hyperlinks
        #[arg(long)]
        no_links: bool,
    },
    /// Ask a single question and print the reply
    Ask {
        /// The question to send
        #[arg(value_name = "QUESTION", required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Print the roadmap with completion marks
    Show,
    /// Flip the completion mark of a roadmap item
    Toggle {
        /// Zero-based position of the item in the roadmap
        index: usize,
    },
    /// Flip the completion mark of one topic
    ToggleTopic {
        /// Id of the roadmap item the topic belongs to
        item_id: u32,
        /// Zero-based position of the topic within the item
        topic_index: usize,
    },
    /// Print how a piece of text is split into literal and link segments
    Links {
        #[arg(value_name = "TEXT", required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Print the effective configuration and exit
    ShowConfig,
    /// Generate shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Split a `--model` value into an optional provider and a model name.
///
/// `"mock/echo"` → `(Some("mock"), "echo")`, `"gemini-2.5-pro"` → `(None, "gemini-2.5-pro")`.
pub fn parse_model_flag(value: &str) -> (Option<&str>, &str) {
    match value.split_once('/') {
        Some((provider, name)) if !provider.is_empty() && !name.is_empty() => {
            (Some(provider), name)
        }
        _ => (None, value),
    }
}

/// `/quit` or `/exit`, surrounding whitespace allowed.  Everything else
/// typed in the REPL is submitted as is.
pub fn is_exit_command(line: &str) -> bool {
    matches!(line.trim(), "/quit" | "/exit")
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "roadmap", &mut std::io::stdout());
}
