// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! aibar - AI chat panel backend for your editor
//!
//! Entry point for the aibar CLI application.

use std::sync::Arc;

use clap::Parser;

use aibar::cli::{Cli, Commands};
use aibar::config::{ConfigSource, Settings};
use aibar::error::Result;
use aibar::llm::registry::{ProviderFactory, ProviderRegistry};
use aibar::session::{ChatController, JsonFileStorage, SessionStore};

#[path = "main/cli_commands.rs"]
mod cli_commands;

use cli_commands::{
    run_ask, run_bridge, run_clear, run_commands, run_history, run_models, run_new,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing. stdout carries the bridge protocol, so logs go to stderr.
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` enables crate diagnostics; `RUST_LOG` still takes precedence.
    if cli.verbose > 0 {
        let directive = if cli.verbose > 1 { "aibar=trace" } else { "aibar=debug" };
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Load settings
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(state) = cli.state {
        settings.state_file = Some(state);
    }
    settings.ensure_directories()?;

    // Commands that never touch the session store
    match &cli.command {
        Some(Commands::Models) => return run_models(),
        Some(Commands::Commands) => return run_commands(),
        _ => {}
    }

    let chat = build_controller(&settings)?;

    let verbose = cli.verbose;
    let result = match cli.command {
        None | Some(Commands::Bridge) => run_bridge(chat.clone()).await,
        Some(Commands::Ask(args)) => run_ask(args, &chat, verbose).await,
        Some(Commands::History(args)) => run_history(args, &chat),
        Some(Commands::New) => run_new(&chat),
        Some(Commands::Clear(args)) => run_clear(args, &chat).await,
        Some(Commands::Models) | Some(Commands::Commands) => Ok(()),
    };

    chat.registry().dispose();
    result
}

fn build_controller(settings: &Settings) -> Result<ChatController> {
    let source = ConfigSource::new(settings.ai_settings());
    let registry = ProviderRegistry::with_factory(source, ProviderFactory::from_settings(settings));
    let storage = JsonFileStorage::new(settings.state_path());
    tracing::debug!(path = %storage.path().display(), "Opening session state");
    let store = SessionStore::open(Box::new(storage), &settings.default_model)?;
    Ok(ChatController::new(store, Arc::new(registry)))
}
