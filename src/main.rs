// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;
mod render;

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use clap::Parser;
use cli::{Cli, Commands};
use roadmap_config::Config;
use roadmap_core::{
    roadmap::Roadmap, Chat, ChatEvent, JsonFileStore, KeyValueStore, Progress, ProgressTracker,
    SubmitOutcome,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    // Subcommands that need no configuration
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            cli::print_completions(*shell);
            return Ok(());
        }
        Some(Commands::Links { text }) => {
            print!("{}", render::segments_listing(&text.join(" ")));
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(&cli)?;

    match cli.command {
        Some(Commands::ShowConfig) => {
            println!("{}", serde_yaml::to_string(&config).context("serializing config")?);
            Ok(())
        }
        Some(Commands::Show) => show(&config),
        Some(Commands::Toggle { index }) => toggle_item(&config, index),
        Some(Commands::ToggleTopic { item_id, topic_index }) => {
            toggle_topic(&config, item_id, topic_index)
        }
        Some(Commands::Ask { question }) => ask(&config, &question.join(" ")).await,
        Some(Commands::Chat { no_links }) => run_chat(&config, !no_links).await,
        None => run_chat(&config, true).await,
        Some(Commands::Completions { .. }) | Some(Commands::Links { .. }) => Ok(()),
    }
}

/// Load layered configuration and apply command-line overrides on top.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = roadmap_config::load(cli.config.as_deref())?;
    if let Some(model) = &cli.model {
        let (provider, name) = cli::parse_model_flag(model);
        if let Some(provider) = provider {
            config.model.provider = provider.to_string();
        }
        config.model.name = name.to_string();
    }
    if let Some(path) = &cli.progress_file {
        config.progress.file = Some(path.clone());
    }
    Ok(config)
}

fn load_roadmap(config: &Config) -> anyhow::Result<Roadmap> {
    Roadmap::load(config.roadmap.path.as_deref())
}

fn open_store(config: &Config) -> Arc<dyn KeyValueStore> {
    Arc::new(JsonFileStore::open(config.progress.effective_file()))
}

fn build_chat(config: &Config, roadmap: &Roadmap) -> anyhow::Result<Chat> {
    let model: Arc<dyn roadmap_model::ModelProvider> =
        Arc::from(roadmap_model::from_config(&config.model)?);
    info!(provider = model.name(), model = model.model_name(), "using completion service");
    Chat::for_roadmap(model, roadmap, config.chat.clone())
}

// ─── Progress commands ───────────────────────────────────────────────────────

fn show(config: &Config) -> anyhow::Result<()> {
    let roadmap = load_roadmap(config)?;
    let progress = Progress::load(open_store(config).as_ref(), &roadmap);
    print!("{}", render::roadmap_overview(&roadmap, &progress));
    Ok(())
}

fn toggle_item(config: &Config, index: usize) -> anyhow::Result<()> {
    let roadmap = load_roadmap(config)?;
    let Some(item) = roadmap.items.get(index) else {
        bail!("no roadmap item at index {index} (roadmap has {} items)", roadmap.len());
    };
    let store = open_store(config);
    let mut tracker = ProgressTracker::persisting(Progress::load(store.as_ref(), &roadmap), store);
    let done = tracker.toggle_item(index);
    println!("[{}] {}", if done { "x" } else { " " }, item.title);
    Ok(())
}

fn toggle_topic(config: &Config, item_id: u32, topic_index: usize) -> anyhow::Result<()> {
    let roadmap = load_roadmap(config)?;
    let item = roadmap
        .item(item_id)
        .with_context(|| format!("no roadmap item with id {item_id}"))?;
    let Some(topic) = item.topics.get(topic_index) else {
        bail!("item {item_id} has no topic {topic_index} ({} topics)", item.topics.len());
    };
    let store = open_store(config);
    let mut tracker = ProgressTracker::persisting(Progress::load(store.as_ref(), &roadmap), store);
    let done = tracker.toggle_topic(item_id, topic_index);
    println!("[{}] {topic}", if done { "x" } else { " " });
    Ok(())
}

// ─── Chat commands ───────────────────────────────────────────────────────────

async fn ask(config: &Config, question: &str) -> anyhow::Result<()> {
    let roadmap = load_roadmap(config)?;
    let chat = build_chat(config, &roadmap)?;
    let outcome = chat.submit(question).await;
    let transcript = chat.transcript();
    match outcome {
        SubmitOutcome::Replied => {
            if let Some(reply) = transcript.last() {
                println!("{}", reply.text);
            }
            Ok(())
        }
        SubmitOutcome::Failed => {
            let notice = transcript.last().map(|m| m.text.as_str()).unwrap_or_default();
            bail!("{notice}")
        }
        SubmitOutcome::Ignored(_) => bail!("question is empty"),
    }
}

/// Interactive session: one line of stdin per submission.
async fn run_chat(config: &Config, links: bool) -> anyhow::Result<()> {
    let roadmap = load_roadmap(config)?;
    let hyperlinks = links && io::stdout().is_terminal();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let chat = build_chat(config, &roadmap)?.with_events(tx);

    let mut print_pending = move || {
        while let Ok(event) = rx.try_recv() {
            // The user's own line is already on screen.
            if matches!(event, ChatEvent::UserMessage(_)) {
                continue;
            }
            println!("{}\n", render::chat_line(event.message(), hyperlinks));
        }
    };

    chat.greet();
    print_pending();
    debug!(session = chat.transcript().id(), "chat session started");

    let interactive = io::stdin().is_terminal();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if interactive {
            print!("> ");
            io::stdout().flush().ok();
        }
        let Some(line) = lines.next_line().await.context("reading stdin")? else {
            break;
        };
        if cli::is_exit_command(&line) {
            break;
        }
        chat.submit(&line).await;
        print_pending();
    }
    Ok(())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
