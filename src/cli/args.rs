// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for aibar.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::chat::prompts::AiCommand;

/// aibar - AI chat panel backend for your editor
#[derive(Parser, Debug)]
#[command(name = "aibar")]
#[command(version, about = "AI chat panel backend for your editor")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Session state file (overrides the settings file)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the panel protocol as JSON lines on stdin/stdout (default when no command given)
    Bridge,

    /// Send one message into the current session
    Ask(AskArgs),

    /// List stored sessions grouped by recency
    History(HistoryArgs),

    /// Start a new session and make it current
    New,

    /// Delete every stored session
    Clear(ClearArgs),

    /// List supported models
    Models,

    /// List the built-in AI commands
    Commands,
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The message to send (read from stdin if omitted)
    pub prompt: Option<String>,

    /// Model to use (defaults to the selected model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// AI command shaping the prompt, e.g. explain_code
    #[arg(short, long)]
    pub command: Option<AiCommand>,

    /// Files to attach
    #[arg(short, long)]
    pub file: Vec<PathBuf>,

    /// Read the message from stdin
    #[arg(long)]
    pub stdin: bool,

    /// Wait for the whole reply instead of streaming it
    #[arg(long)]
    pub no_stream: bool,
}

/// Arguments for the history subcommand
#[derive(clap::Args, Debug, Default)]
pub struct HistoryArgs {
    /// Only show sessions whose title or messages contain this text
    #[arg(short, long)]
    pub search: Option<String>,
}

/// Arguments for the clear subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ClearArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_default_no_command() {
        let cli = Cli::parse_from(["aibar"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
        assert!(cli.state.is_none());
    }

    #[test]
    fn test_cli_verbose_multiple() {
        let cli = Cli::parse_from(["aibar", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_global_paths_after_subcommand() {
        let cli = Cli::parse_from([
            "aibar",
            "history",
            "--config",
            "/tmp/settings.json",
            "--state",
            "/tmp/state.json",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/settings.json")));
        assert_eq!(cli.state, Some(PathBuf::from("/tmp/state.json")));
        assert!(matches!(cli.command, Some(Commands::History(_))));
    }

    #[test]
    fn test_ask_with_everything() {
        let cli = Cli::parse_from([
            "aibar",
            "ask",
            "why is this slow?",
            "-m",
            "claude-3-opus",
            "-c",
            "optimize_code",
            "-f",
            "src/lib.rs",
            "-f",
            "src/main.rs",
            "--no-stream",
        ]);
        let Some(Commands::Ask(args)) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(args.prompt.as_deref(), Some("why is this slow?"));
        assert_eq!(args.model.as_deref(), Some("claude-3-opus"));
        assert_eq!(args.command, Some(AiCommand::OptimizeCode));
        assert_eq!(
            args.file,
            vec![PathBuf::from("src/lib.rs"), PathBuf::from("src/main.rs")]
        );
        assert!(args.no_stream);
        assert!(!args.stdin);
    }

    #[test]
    fn test_ask_prompt_is_optional() {
        let cli = Cli::parse_from(["aibar", "ask", "--stdin"]);
        let Some(Commands::Ask(args)) = cli.command else {
            panic!("expected ask");
        };
        assert!(args.prompt.is_none());
        assert!(args.stdin);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_ask_rejects_unknown_command() {
        let result = Cli::try_parse_from(["aibar", "ask", "hi", "-c", "make_it_faster"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_history_search() {
        let cli = Cli::parse_from(["aibar", "history", "-s", "tokio"]);
        let Some(Commands::History(args)) = cli.command else {
            panic!("expected history");
        };
        assert_eq!(args.search.as_deref(), Some("tokio"));
    }

    #[test]
    fn test_clear_force() {
        let cli = Cli::parse_from(["aibar", "clear", "--force"]);
        assert!(matches!(cli.command, Some(Commands::Clear(ClearArgs { force: true }))));
    }

    #[test]
    fn test_simple_subcommands() {
        assert!(matches!(
            Cli::parse_from(["aibar", "bridge"]).command,
            Some(Commands::Bridge)
        ));
        assert!(matches!(
            Cli::parse_from(["aibar", "new"]).command,
            Some(Commands::New)
        ));
        assert!(matches!(
            Cli::parse_from(["aibar", "models"]).command,
            Some(Commands::Models)
        ));
        assert!(matches!(
            Cli::parse_from(["aibar", "commands"]).command,
            Some(Commands::Commands)
        ));
    }
}
