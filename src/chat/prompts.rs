// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Command and prompt catalog
//!
//! Every command maps to a system prompt (the shared base prompt plus an
//! optional role block) and a user-message template. Templates use
//! `{placeholder}` tokens filled from [`CommandParams`]. Expansion is best
//! effort: a token with no matching parameter is left in the output as is.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::AibarError;
use crate::llm::message::ProviderMessage;

/// Base system prompt shared by every command
pub const BASE_SYSTEM_PROMPT: &str = "You are an expert programming assistant embedded in a code editor. \
Give accurate, concise answers grounded in the code and files the user shares. \
Prefer complete, working code in fenced blocks with the language named, \
keep explanations short and practical, and point out risks or assumptions when they matter.";

/// Template used by every built-in command
pub const DEFAULT_USER_TEMPLATE: &str = "{message}";

/// Symbolic commands offered by the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiCommand {
    Chat,
    OptimizeCode,
    SecurityCheck,
    TestCoverage,
    ExplainCode,
    RefactorCode,
    AddTypes,
    AddDocumentation,
    FixBugs,
    SuggestImprovements,
}

impl AiCommand {
    /// All commands in menu order
    pub const ALL: [AiCommand; 10] = [
        AiCommand::Chat,
        AiCommand::OptimizeCode,
        AiCommand::SecurityCheck,
        AiCommand::TestCoverage,
        AiCommand::ExplainCode,
        AiCommand::RefactorCode,
        AiCommand::AddTypes,
        AiCommand::AddDocumentation,
        AiCommand::FixBugs,
        AiCommand::SuggestImprovements,
    ];

    /// Stable snake_case identifier
    pub fn id(&self) -> &'static str {
        match self {
            AiCommand::Chat => "chat",
            AiCommand::OptimizeCode => "optimize_code",
            AiCommand::SecurityCheck => "security_check",
            AiCommand::TestCoverage => "test_coverage",
            AiCommand::ExplainCode => "explain_code",
            AiCommand::RefactorCode => "refactor_code",
            AiCommand::AddTypes => "add_types",
            AiCommand::AddDocumentation => "add_documentation",
            AiCommand::FixBugs => "fix_bugs",
            AiCommand::SuggestImprovements => "suggest_improvements",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AiCommand::Chat => "Chat",
            AiCommand::OptimizeCode => "Optimize Code",
            AiCommand::SecurityCheck => "Security Check",
            AiCommand::TestCoverage => "Test Coverage Analysis",
            AiCommand::ExplainCode => "Explain Code",
            AiCommand::RefactorCode => "Refactor Code",
            AiCommand::AddTypes => "Add Types",
            AiCommand::AddDocumentation => "Add Documentation",
            AiCommand::FixBugs => "Fix Bugs",
            AiCommand::SuggestImprovements => "Suggest Improvements",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AiCommand::Chat => "General chat with the AI assistant about code and programming",
            AiCommand::OptimizeCode => "Analyze and optimize code for better performance and efficiency",
            AiCommand::SecurityCheck => "Analyze code for security vulnerabilities",
            AiCommand::TestCoverage => "Analyze test coverage and suggest improvements",
            AiCommand::ExplainCode => "Get a detailed explanation of code functionality",
            AiCommand::RefactorCode => "Suggest code refactoring improvements",
            AiCommand::AddTypes => "Add TypeScript type annotations",
            AiCommand::AddDocumentation => "Add comprehensive code documentation",
            AiCommand::FixBugs => "Identify and fix potential bugs",
            AiCommand::SuggestImprovements => "Get suggestions for code improvements",
        }
    }

    /// Role block appended to the base prompt; empty for plain chat.
    pub fn role_prefix(&self) -> &'static str {
        match self {
            AiCommand::Chat => "",
            AiCommand::OptimizeCode => "Act as a code optimization expert. Focus on improving performance, readability, and maintainability.",
            AiCommand::SecurityCheck => "Act as a security expert. Focus on identifying and fixing security vulnerabilities.",
            AiCommand::TestCoverage => "Act as a testing expert. Focus on improving test coverage and test quality.",
            AiCommand::ExplainCode => "Act as a code explanation expert. Break down and explain the code in detail.",
            AiCommand::RefactorCode => "Act as a refactoring expert. Focus on improving code structure while maintaining functionality.",
            AiCommand::AddTypes => "Act as a TypeScript expert. Focus on adding appropriate type annotations.",
            AiCommand::AddDocumentation => "Act as a documentation expert. Focus on adding clear and comprehensive documentation.",
            AiCommand::FixBugs => "Act as a debugging expert. Focus on identifying and fixing potential bugs.",
            AiCommand::SuggestImprovements => "Act as a code improvement expert. Focus on enhancing code quality and user experience.",
        }
    }
}

impl fmt::Display for AiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AiCommand {
    type Err = AibarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AiCommand::ALL
            .into_iter()
            .find(|c| c.id() == s.trim())
            .ok_or_else(|| AibarError::Config(format!("Unknown command: {}", s)))
    }
}

/// System prompt and user template for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPrompt {
    pub system_prompt: String,
    pub user_prompt_template: String,
}

impl CommandPrompt {
    fn for_command(command: AiCommand) -> Self {
        let prefix = command.role_prefix();
        let system_prompt = if prefix.is_empty() {
            BASE_SYSTEM_PROMPT.to_string()
        } else {
            format!("{}\n\n{}", BASE_SYSTEM_PROMPT, prefix)
        };
        Self {
            system_prompt,
            user_prompt_template: DEFAULT_USER_TEMPLATE.to_string(),
        }
    }
}

/// A file attached to a turn
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileContext {
    pub name: String,
    pub content: String,
}

/// Parameters for one command invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandParams {
    pub message: String,
    /// Selected code sent ahead of the message
    pub code: Option<String>,
    pub focus: Option<String>,
    pub test_files: Vec<String>,
    pub files: Vec<FileContext>,
    /// Image references, one per line in the request
    pub images: Vec<String>,
}

impl CommandParams {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Value for a template placeholder, if this parameter set has one.
    fn placeholder(&self, key: &str) -> Option<String> {
        match key {
            "message" => Some(self.message.clone()),
            "code" => self.code.clone(),
            "focus" => self.focus.clone(),
            "testFiles" | "test_files" if !self.test_files.is_empty() => {
                Some(self.test_files.join(", "))
            }
            _ => None,
        }
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern is valid"))
}

/// Substitute `{placeholder}` tokens; unknown tokens stay verbatim.
pub fn expand_template(template: &str, params: &CommandParams) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            params
                .placeholder(&caps[1])
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Commands a provider understands, with their prompts
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    prompts: HashMap<AiCommand, CommandPrompt>,
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self::with_commands(&AiCommand::ALL)
    }
}

impl PromptCatalog {
    /// Catalog limited to the given commands
    pub fn with_commands(commands: &[AiCommand]) -> Self {
        Self {
            prompts: commands
                .iter()
                .map(|c| (*c, CommandPrompt::for_command(*c)))
                .collect(),
        }
    }

    pub fn get(&self, command: AiCommand) -> Option<&CommandPrompt> {
        self.prompts.get(&command)
    }

    /// Supported commands in menu order
    pub fn commands(&self) -> Vec<AiCommand> {
        AiCommand::ALL
            .into_iter()
            .filter(|c| self.prompts.contains_key(c))
            .collect()
    }

    /// Build the candidate system message and the user message for a turn.
    pub fn format_turn(
        &self,
        command: AiCommand,
        params: &CommandParams,
        provider: &str,
    ) -> crate::error::Result<(ProviderMessage, ProviderMessage)> {
        let prompt = self.get(command).ok_or_else(|| AibarError::UnknownCommand {
            command: command.id().to_string(),
            provider: provider.to_string(),
        })?;

        let mut content = String::new();
        if let Some(code) = params.code.as_deref().filter(|c| !c.trim().is_empty()) {
            content.push_str("Here's the code:\n\n");
            content.push_str(code);
            content.push_str("\n\n");
        }
        content.push_str(&expand_template(&prompt.user_prompt_template, params));

        if !params.files.is_empty() {
            let files = params
                .files
                .iter()
                .map(|f| format!("[{}]:\n{}", f.name, f.content))
                .collect::<Vec<_>>()
                .join("\n\n");
            content.push_str("\n\nAttached files:\n");
            content.push_str(&files);
        }
        if !params.images.is_empty() {
            content.push_str("\n\nAttached images:\n");
            content.push_str(&params.images.join("\n"));
        }

        Ok((
            ProviderMessage::system(prompt.system_prompt.clone()),
            ProviderMessage::user(content.trim()),
        ))
    }
}
