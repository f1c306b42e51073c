// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! chatline - command-line front end
//!
//! Entry point for the chatline CLI application.

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use serde_json::json;

use chatline::cli::{AskArgs, Cli, Commands, ListenArgs, OutputFormat, SettingsArgs};
use chatline::config::Settings;
use chatline::llm::{CompletionResult, HistoryTurn};
use chatline::realtime::{ConnectionState, InboundMessage};
use chatline::ChatClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);

    match cli.command {
        Commands::Settings(args) => run_settings(&settings_path, &args, cli.format),
        Commands::Ask(args) => {
            let settings = Settings::load_from(&settings_path)?;
            run_ask(settings, &args, cli.format).await
        }
        Commands::Listen(args) => {
            let settings = Settings::load_from(&settings_path)?;
            run_listen(settings, &args, cli.format).await
        }
    }
}

fn init_tracing(verbose: u8) {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on chatline diagnostics; `-vv` adds per-frame tracing.
    // `RUST_LOG` still takes precedence for anything it names.
    let directive = match verbose {
        0 => None,
        1 => Some("chatline=debug"),
        _ => Some("chatline=trace"),
    };
    if let Some(parsed) = directive.and_then(|d| d.parse().ok()) {
        env_filter = env_filter.add_directive(parsed);
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_settings(path: &Path, args: &SettingsArgs, format: OutputFormat) -> anyhow::Result<()> {
    if args.init {
        if path.exists() && !args.force {
            anyhow::bail!(
                "{} already exists (use --force to overwrite)",
                path.display()
            );
        }
        Settings::default().save_to(path)?;
        eprintln!("Wrote default settings to {}", path.display());
        return Ok(());
    }

    let settings = Settings::load_from(path)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&settings)?),
        OutputFormat::Text => {
            println!("settings file : {}", path.display());
            println!("api base url  : {}", settings.api.base_url);
            println!(
                "api key       : {}",
                if settings.get_api_key().is_some() {
                    "set"
                } else {
                    "missing"
                }
            );
            println!("websocket url : {}", settings.realtime.ws_url);
            println!(
                "reconnect     : {} attempts, {}..{} ms",
                settings.realtime.reconnect.max_attempts,
                settings.realtime.reconnect.base_delay_ms,
                settings.realtime.reconnect.max_delay_ms
            );
            println!(
                "queue         : {} messages, {} ms retention",
                settings.realtime.queue.capacity, settings.realtime.queue.max_age_ms
            );
            println!(
                "retry         : {} retries from {} ms",
                settings.completion.retry.max_retries, settings.completion.retry.base_delay_ms
            );
            println!("cache ttl     : {} ms", settings.completion.cache_ttl_ms);
            if let Err(e) = settings.validate() {
                println!("validation    : {e}");
            }
        }
    }
    Ok(())
}

fn load_history(path: &Path) -> anyhow::Result<Vec<HistoryTurn>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading history file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing history file {}", path.display()))
}

async fn run_ask(settings: Settings, args: &AskArgs, format: OutputFormat) -> anyhow::Result<()> {
    let history = match &args.history {
        Some(path) => load_history(path)?,
        None => Vec::new(),
    };
    let client = ChatClient::init(settings)?;

    let outcome = match client.ask(&args.prompt(), &args.model, &history).await {
        Ok(result) => print_result(&result, format),
        Err(e) => {
            if format == OutputFormat::Json {
                println!(
                    "{}",
                    json!({"error": e.kind, "message": e.message, "attempts": e.attempts})
                );
            }
            Err(anyhow::anyhow!(
                "{} (after {} attempt(s))",
                e.message,
                e.attempts
            ))
        }
    };

    client.shutdown().await;
    outcome
}

fn print_result(result: &CompletionResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Text => {
            println!("{}", result.text);
            let meta = &result.metadata;
            let cost = meta
                .estimated_cost
                .map(|c| format!(", ~${c:.4}"))
                .unwrap_or_default();
            eprintln!(
                "[{} ({}), {} attempt(s), {} tokens{}{}]",
                result.model,
                meta.family,
                meta.attempts,
                meta.tokens_used,
                cost,
                if meta.cached { ", cached" } else { "" }
            );
        }
    }
    Ok(())
}

async fn run_listen(
    settings: Settings,
    args: &ListenArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let client = ChatClient::init(settings)?;
    let session = client.session();

    session.subscribe(move |message: &InboundMessage| {
        match format {
            OutputFormat::Json => println!("{}", message.payload),
            OutputFormat::Text => match message.content() {
                Some(content) => println!("[{}] {}", message.kind, content),
                None => println!("[{}] {}", message.kind, message.payload),
            },
        }
        Ok(())
    });

    session.connect();
    for text in &args.send {
        session.send(json!({ "type": "chat", "content": text }));
    }

    let mut status = session.status();
    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            changed = status.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = status.borrow_and_update().clone();
                eprintln!("-- {} (attempt {})", current.state, current.attempt);
                if current.state == ConnectionState::Closed {
                    if let Some(kind) = current.degraded {
                        break Err(anyhow::anyhow!(kind.user_message()));
                    }
                }
            }
        }
    };

    client.shutdown().await;
    outcome
}
