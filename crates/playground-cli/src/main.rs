use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use playground_core::session::{FileSessionStorage, SessionStore};
use playground_core::{
    config::ConfigLoader, LanguageId, Playground, PlaygroundConfig, Registry, RunResult,
    SinkHandle, TerminalAdapter,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;

mod repl;
mod terminal;

#[derive(Parser, Debug)]
#[clap(name = "playground", author, version = "0.1.0", about = "Polyglot code playground")]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(long, short, default_value = "playground.yaml", help = "Path to the YAML configuration file")]
    config: PathBuf,

    #[clap(long, short, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the supported languages and how each one runs
    Languages,
    /// Run a program once and print its output
    Run {
        #[clap(long, short, help = "Language id, e.g. javascript, python, rust")]
        language: String,

        #[clap(long, short, conflicts_with = "code", help = "Read the program from a file")]
        file: Option<PathBuf>,

        #[clap(long, help = "Program text; read from stdin when neither --file nor --code is given")]
        code: Option<String>,
    },
    /// Inspect or delete the saved editor session
    Session {
        #[clap(subcommand)]
        action: SessionCommands,
    },
    /// Interactive editing session (default command)
    Repl,
}

#[derive(Subcommand, Debug)]
enum SessionCommands {
    /// Print the saved session
    Show,
    /// Delete the saved session
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);

    match cli.command {
        None | Some(Commands::Repl) => {
            // Keep the interactive terminal free of log lines
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open("playground.log")
                .context("Failed to create playground.log file")?;

            env_logger::Builder::new()
                .filter_level(log_level_filter)
                .target(env_logger::Target::Pipe(Box::new(log_file)))
                .init();
        }
        _ => {
            env_logger::Builder::new()
                .filter_level(log_level_filter)
                .init();
        }
    }

    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    match cli.command {
        Some(Commands::Languages) => {
            repl::print_languages(&Registry::new());
            Ok(())
        }
        Some(Commands::Run { language, file, code }) => {
            let config = ConfigLoader::from_file_or_default(&cli.config).await?;
            run_once(config, &language, file, code).await
        }
        Some(Commands::Session { action }) => {
            let config = ConfigLoader::from_file_or_default(&cli.config).await?;
            handle_session_command(config, action).await
        }
        None | Some(Commands::Repl) => {
            let config = ConfigLoader::from_file_or_default(&cli.config).await?;
            let adapter = Arc::new(Mutex::new(TerminalAdapter::new()));
            let playground = Playground::builder(config)
                .sink(SinkHandle::from_shared(adapter.clone()))
                .build()?;
            repl::run_repl(playground, adapter).await
        }
    }
}

async fn read_program(file: Option<PathBuf>, code: Option<String>) -> Result<String> {
    if let Some(code) = code {
        return Ok(code);
    }
    if let Some(path) = file {
        return tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    let mut source = String::new();
    tokio::io::stdin()
        .read_to_string(&mut source)
        .await
        .context("Failed to read program from stdin")?;
    Ok(source)
}

async fn run_once(
    config: PlaygroundConfig,
    language: &str,
    file: Option<PathBuf>,
    code: Option<String>,
) -> Result<()> {
    let language: LanguageId = language.parse()?;
    let source = read_program(file, code).await?;

    let mut adapter = TerminalAdapter::new();
    adapter.attach(Box::new(terminal::StdoutWidget::plain()));
    let playground = Playground::builder(config)
        .sink(SinkHandle::new(adapter))
        .build()?;

    playground.select_language(language).await?;
    let result = playground.run_source(language, &source).await?;
    log::info!(
        "{} run finished in {} ms (succeeded: {})",
        language,
        result.duration_ms,
        result.succeeded
    );

    ensure_succeeded(language, &result)
}

/// Turns a failed run into an error so `main` exits nonzero after cleanup.
fn ensure_succeeded(language: LanguageId, result: &RunResult) -> Result<()> {
    if result.succeeded {
        return Ok(());
    }
    match result.exit_code {
        Some(code) => anyhow::bail!("{} program exited with code {}", language, code),
        None => anyhow::bail!("{} program failed", language),
    }
}

async fn handle_session_command(config: PlaygroundConfig, action: SessionCommands) -> Result<()> {
    let storage_dir = config.session.resolved_storage_dir()?;
    let store = SessionStore::new(Arc::new(FileSessionStorage::new(&storage_dir)));

    match action {
        SessionCommands::Show => match store.load().await {
            Some(record) => {
                let saved_at = chrono::DateTime::from_timestamp_millis(record.timestamp)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| record.timestamp.to_string());
                println!("Language: {}", record.language);
                println!("Saved at: {}", saved_at);
                println!();
                println!("{}", record.code);
            }
            None => println!("No saved session in {}.", storage_dir.display()),
        },
        SessionCommands::Clear => {
            store.clear().await;
            println!("Saved session cleared.");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use playground_core::FailureKind;

    fn result(succeeded: bool, exit_code: Option<i32>) -> RunResult {
        RunResult {
            language: LanguageId::Python,
            started_at: chrono::Utc::now(),
            duration_ms: 5,
            succeeded,
            stdout: String::new(),
            stderr: String::new(),
            exit_code,
            failure: if exit_code.is_none() && !succeeded {
                Some(FailureKind::InterpreterFault)
            } else {
                None
            },
            artifact: None,
        }
    }

    #[test]
    fn test_successful_run_is_ok() {
        assert!(ensure_succeeded(LanguageId::Python, &result(true, Some(0))).is_ok());
    }

    #[test]
    fn test_failed_run_becomes_an_error() {
        let err = ensure_succeeded(LanguageId::Python, &result(false, Some(2))).unwrap_err();
        assert!(err.to_string().contains("exited with code 2"));

        let err = ensure_succeeded(LanguageId::Python, &result(false, None)).unwrap_err();
        assert!(err.to_string().contains("failed"));
    }
}
