// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use aibar::attachments::AttachedFile;
use aibar::bridge::{run_jsonl, JsonLinesSink, PanelBridge};
use aibar::chat::prompts::AiCommand;
use aibar::cli::{AskArgs, ClearArgs, HistoryArgs};
use aibar::error::Result;
use aibar::llm::models::all_models;
use aibar::session::{relative_time, ChatController, ChatRequest, SessionStore, TurnOutcome};

/// Serve the panel protocol over stdin/stdout
pub(super) async fn run_bridge(chat: ChatController) -> Result<()> {
    let sink = Arc::new(JsonLinesSink::new(io::stdout()));
    let bridge = PanelBridge::new(chat, sink);
    let reader = tokio::io::BufReader::new(tokio::io::stdin());
    run_jsonl(&bridge, reader).await
}

/// Message text from the positional argument or stdin
fn read_prompt(prompt: Option<String>, from_stdin: bool, mut input: impl Read) -> Result<String> {
    match prompt {
        Some(prompt) if !from_stdin => Ok(prompt),
        prompt => {
            let mut piped = String::new();
            input.read_to_string(&mut piped)?;
            Ok(match prompt {
                Some(prompt) => format!("{}\n\n{}", prompt, piped.trim_end()),
                None => piped,
            })
        }
    }
}

fn attach_files(store: &mut SessionStore, files: &[std::path::PathBuf]) {
    for path in files {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("file")
                    .to_string();
                store.attachments_mut().attach(AttachedFile::file(
                    name,
                    path.display().to_string(),
                    content,
                ));
            }
            Err(e) => eprintln!("Warning: could not read '{}': {}", path.display(), e),
        }
    }
}

/// Send one message into the current session and print the reply
pub(super) async fn run_ask(args: AskArgs, chat: &ChatController, verbose: u8) -> Result<()> {
    let text = read_prompt(args.prompt, args.stdin, io::stdin())?;
    let command = args.command.unwrap_or(AiCommand::Chat);

    let (model, history) = {
        let mut store = chat.store();
        attach_files(&mut store, &args.file);
        let model = args
            .model
            .unwrap_or_else(|| store.selected_model().to_string());
        let history = store
            .current_session()
            .map(|s| s.provider_messages())
            .unwrap_or_default();
        (model, history)
    };

    if verbose > 0 {
        eprintln!(
            "[verbose] Sending {} with model {} ({} earlier messages)",
            command,
            model,
            history.len()
        );
    }

    // Resume the adapter from the stored conversation
    if let Ok(adapter) = chat.registry().get_model(&model) {
        adapter.seed_history(history).await;
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let stream = !args.no_stream;
    let print_chunk = |chunk: &str| {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(chunk.as_bytes());
        let _ = stdout.flush();
    };
    let on_chunk: Option<&aibar::llm::provider::ChunkCallback<'_>> =
        if stream { Some(&print_chunk) } else { None };

    let request = ChatRequest::new(text, model).with_command(command);
    match chat.chat_with_ai(request, on_chunk, &cancel).await? {
        TurnOutcome::Replied(message) => {
            if stream {
                println!();
            } else {
                println!("{}", message.text);
            }
        }
        TurnOutcome::Failed(message) => {
            if stream {
                println!();
            }
            eprintln!("Error: {}", message.text);
        }
        TurnOutcome::Skipped => eprintln!("Nothing to send."),
        TurnOutcome::Discarded => eprintln!("The session was deleted before the reply arrived."),
    }
    Ok(())
}

/// History listing, one band heading followed by its sessions
fn history_lines(store: &SessionStore, query: &str, now: DateTime<Utc>) -> Vec<String> {
    let current = store.current_session_id();
    let mut lines = Vec::new();
    for group in store.grouped_sessions_at(query, now) {
        if group.is_empty() {
            continue;
        }
        lines.push(format!("{}:", group.label));
        for session in group.sessions {
            let id_string = session.id.to_string();
            let marker = if Some(session.id) == current { "*" } else { " " };
            lines.push(format!(
                " {} {} | {} | {} messages | {}",
                marker,
                &id_string[..8],
                session.title,
                session.messages.len(),
                relative_time(session.last_updated_at, now)
            ));
        }
    }
    lines
}

/// List stored sessions grouped by recency
pub(super) fn run_history(args: HistoryArgs, chat: &ChatController) -> Result<()> {
    let query = args.search.unwrap_or_default();
    let lines = history_lines(&chat.store(), &query, Utc::now());

    if lines.is_empty() {
        if query.is_empty() {
            println!("\nNo sessions in history.\n");
        } else {
            println!("\nNo sessions matching '{}'.\n", query);
        }
        return Ok(());
    }

    println!();
    for line in lines {
        println!("{}", line);
    }
    println!();
    Ok(())
}

pub(super) fn run_new(chat: &ChatController) -> Result<()> {
    let id = chat.store().create_new_chat()?;
    println!("Started new chat {}", id);
    Ok(())
}

fn confirm(prompt: &str, input: &mut impl BufRead) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Delete every stored session
pub(super) async fn run_clear(args: ClearArgs, chat: &ChatController) -> Result<()> {
    let count = chat.store().sessions().len();
    if !args.force {
        let prompt = format!("Delete all {} sessions?", count);
        if !confirm(&prompt, &mut io::stdin().lock())? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    chat.store().clear_all()?;
    chat.registry().clear_histories().await;
    println!("History cleared.");
    Ok(())
}

pub(super) fn run_models() -> Result<()> {
    println!("\nSupported models:\n");
    for model in all_models() {
        println!("  {:<24} {}", model.id, model.family.provider_name());
    }
    println!();
    Ok(())
}

pub(super) fn run_commands() -> Result<()> {
    println!("\nAI commands:\n");
    for command in AiCommand::ALL {
        println!(
            "  {:<22} {} - {}",
            command.id(),
            command.display_name(),
            command.description()
        );
    }
    println!();
    Ok(())
}
