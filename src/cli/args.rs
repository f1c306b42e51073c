// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Model used when `--model` is not given
pub const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-V3";

/// chatline - resilient chat client for AI completions and realtime sessions
#[derive(Parser, Debug)]
#[command(name = "chatline")]
#[command(version, about = "Resilient chat client for AI completions and realtime sessions")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path (defaults to ~/.chatline/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a single question through the completion API
    Ask(AskArgs),

    /// Open the realtime session and print inbound messages until Ctrl-C
    Listen(ListenArgs),

    /// Show or initialise settings
    #[command(alias = "config")]
    Settings(SettingsArgs),
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Question text (words are joined with spaces)
    #[arg(required = true)]
    pub text: Vec<String>,

    /// Model id
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// JSON file with prior turns: [{"sender":"user","content":"..."}, ...]
    #[arg(long)]
    pub history: Option<PathBuf>,
}

impl AskArgs {
    pub fn prompt(&self) -> String {
        self.text.join(" ")
    }
}

#[derive(Args, Debug, Default)]
pub struct ListenArgs {
    /// Chat message to send once connected (repeatable)
    #[arg(short, long = "send")]
    pub send: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// Write default settings to the settings file
    #[arg(long)]
    pub init: bool,

    /// Overwrite an existing file when used with --init
    #[arg(long, requires = "init")]
    pub force: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Text,

    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_defaults() {
        let cli = Cli::parse_from(["chatline", "ask", "what", "is", "rust"]);
        match cli.command {
            Commands::Ask(args) => {
                assert_eq!(args.prompt(), "what is rust");
                assert_eq!(args.model, DEFAULT_MODEL);
                assert!(args.history.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn test_ask_with_model_and_history() {
        let cli = Cli::parse_from([
            "chatline",
            "ask",
            "hi",
            "--model",
            "qwen/qwen-14b-chat",
            "--history",
            "/tmp/h.json",
        ]);
        let Commands::Ask(args) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(args.model, "qwen/qwen-14b-chat");
        assert_eq!(args.history, Some(PathBuf::from("/tmp/h.json")));
    }

    #[test]
    fn test_ask_requires_text() {
        assert!(Cli::try_parse_from(["chatline", "ask"]).is_err());
    }

    #[test]
    fn test_listen_repeated_send() {
        let cli = Cli::parse_from(["chatline", "-vv", "listen", "-s", "one", "--send", "two"]);
        let Commands::Listen(args) = cli.command else {
            panic!("expected listen");
        };
        assert_eq!(args.send, vec!["one", "two"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_settings_alias_and_global_flags() {
        let cli = Cli::parse_from([
            "chatline",
            "config",
            "--init",
            "--config",
            "/tmp/s.json",
            "--format",
            "json",
        ]);
        let Commands::Settings(args) = cli.command else {
            panic!("expected settings");
        };
        assert!(args.init);
        assert!(!args.force);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.json")));
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_force_requires_init() {
        assert!(Cli::try_parse_from(["chatline", "settings", "--force"]).is_err());
    }
}
