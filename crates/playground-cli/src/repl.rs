use anyhow::Result;
use crossterm::style::Stylize;
use playground_core::errors::RunRejection;
use playground_core::{
    LanguageId, Playground, Registry, RuntimeState, StrategyKind, TerminalAdapter,
};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::terminal::StdoutWidget;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Lang(String),
    Run,
    Show,
    Reset,
    Clear,
    History,
    Retry,
    Languages,
    Help,
    Quit,
    Unknown(String),
    Text(String),
}

fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix(':') else {
        return Command::Text(line.to_string());
    };
    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let argument = parts.next().map(str::trim).unwrap_or_default();
    match name {
        "lang" | "language" => Command::Lang(argument.to_string()),
        "run" => Command::Run,
        "show" => Command::Show,
        "reset" => Command::Reset,
        "clear" => Command::Clear,
        "history" => Command::History,
        "retry" => Command::Retry,
        "languages" => Command::Languages,
        "help" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

pub fn print_languages(registry: &Registry) {
    println!("{:<12} {:<12} {:<6} {}", "ID", "NAME", "EXT", "STRATEGY");
    for descriptor in registry.all() {
        println!(
            "{:<12} {:<12} {:<6} {}",
            descriptor.id.as_str(),
            descriptor.display_name,
            descriptor.file_extension,
            descriptor.strategy.kind()
        );
    }
}

fn print_help() {
    println!("Type code to append it to the buffer. Commands:");
    println!("  :lang <id>    switch language (see :languages)");
    println!("  :run          run the buffer");
    println!("  :show         print the buffer");
    println!("  :reset        restore the language template");
    println!("  :clear        clear the output");
    println!("  :history      recent runs");
    println!("  :retry        retry a failed runtime load");
    println!("  :quit         save and exit");
}

fn print_error(message: &str) {
    println!("{}", message.red());
}

fn print_notice(message: &str) {
    println!("{}", message.yellow());
}

async fn select(playground: &Playground, language: LanguageId) {
    let descriptor = playground.registry().describe(language);
    if descriptor.strategy.kind() == StrategyKind::Wasm
        && playground.runtime_state(language) != RuntimeState::Ready
    {
        print_notice(&format!("Loading the {} runtime...", descriptor.display_name));
    }
    match playground.select_language(language).await {
        Ok(_) => println!("Language: {}", descriptor.display_name),
        Err(e) => print_error(&format!("{} (use :retry to try again)", e)),
    }
}

fn show_source(playground: &Playground) {
    let descriptor = playground.active_descriptor();
    println!("{}", format!("--- main.{} ---", descriptor.file_extension).dim());
    for (number, line) in playground.source().lines().enumerate() {
        println!("{:>4} | {}", number + 1, line);
    }
}

fn show_history(playground: &Playground) {
    let history = playground.history();
    if history.is_empty() {
        println!("No runs yet.");
        return;
    }
    for entry in history {
        let outcome = if entry.succeeded { "ok".green() } else { "failed".red() };
        println!(
            "{}  {:<12} {:<6} {} ms",
            entry.timestamp.format("%H:%M:%S"),
            entry.language,
            outcome,
            entry.duration_ms
        );
    }
}

fn describe_rejection(rejection: &RunRejection) -> String {
    match rejection {
        RunRejection::AlreadyRunning => "A run is already in progress".to_string(),
        RunRejection::RuntimeNotReady(language) => {
            format!("The {} runtime is still loading, try again shortly", language)
        }
        RunRejection::RuntimeLoadFailed { .. } => format!("{} (use :retry)", rejection),
    }
}

pub async fn run_repl(playground: Playground, adapter: Arc<Mutex<TerminalAdapter>>) -> Result<()> {
    println!("{}", "Polyglot playground".bold());
    println!("Type :help for commands.");

    match playground.restore().await {
        Some(record) => println!("Restored your {} session.", record.language),
        None => log::debug!("No saved session to restore"),
    }

    // Anything the core wrote during startup is replayed here
    adapter
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .attach(Box::new(StdoutWidget::interactive()));

    select(&playground, playground.active_language()).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout
            .write_all(format!("{}> ", playground.active_language()).as_bytes())
            .await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_command(&line) {
            Command::Text(text) => playground.append_line(&text),
            Command::Lang(argument) => match argument.parse::<LanguageId>() {
                Ok(language) => select(&playground, language).await,
                Err(e) => print_error(&e.to_string()),
            },
            Command::Run => {
                if let Err(rejection) = playground.run().await {
                    print_notice(&describe_rejection(&rejection));
                }
            }
            Command::Show => show_source(&playground),
            Command::Reset => {
                playground.reset_source();
                show_source(&playground);
            }
            Command::Clear => playground.clear_output(),
            Command::History => show_history(&playground),
            Command::Retry => match playground.retry_runtime().await {
                Ok(Some(_)) => println!("Runtime ready."),
                Ok(None) => println!("{} needs no runtime.", playground.active_descriptor().display_name),
                Err(e) => print_error(&e.to_string()),
            },
            Command::Languages => print_languages(playground.registry()),
            Command::Help => print_help(),
            Command::Quit => break,
            Command::Unknown(name) => print_error(&format!("Unknown command ':{}', try :help", name)),
        }
    }

    playground.shutdown().await;
    println!("Bye.");
    Ok(())
}
