//! Procflow - Conversational Business-Process Diagram Generator
//!
//! CLI entry point for interactive sessions and local diagram tooling.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use procflow::cli::{Cli, Command, generate_after_help};
use procflow::config::Config;
use procflow::encoding;
use procflow::orchestrator::Orchestrator;
use procflow::render::Renderer;
use procflow::validation::Validator;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("procflow")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level_str = cli_log_level.or(config_log_level);
    let level = if let Some(s) = level_str {
        debug!(level_str = %s, "setup_logging: level_str is Some");
        match s.to_uppercase().as_str() {
            "TRACE" => {
                debug!("setup_logging: matched TRACE level");
                tracing::Level::TRACE
            }
            "DEBUG" => {
                debug!("setup_logging: matched DEBUG level");
                tracing::Level::DEBUG
            }
            "INFO" => {
                debug!("setup_logging: matched INFO level");
                tracing::Level::INFO
            }
            "WARN" | "WARNING" => {
                debug!("setup_logging: matched WARN level");
                tracing::Level::WARN
            }
            "ERROR" => {
                debug!("setup_logging: matched ERROR level");
                tracing::Level::ERROR
            }
            _ => {
                debug!(level = %s, "setup_logging: unknown level, defaulting to INFO");
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        }
    } else {
        debug!("setup_logging: level_str is None, defaulting to INFO");
        tracing::Level::INFO
    };

    let log_file = fs::File::create(log_dir.join("procflow.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Log level comes from the config file before the full load
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Procflow loaded config: renderer={}", config.renderer.base_url);

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Chat { output_dir, session } => {
            debug!(?output_dir, ?session, "main: matched Chat command");
            cmd_chat(&config, &output_dir, session).await
        }
        Command::Encode { file } => {
            debug!(?file, "main: matched Encode command");
            cmd_encode(&file)
        }
        Command::Decode { token } => {
            debug!(token_len = token.len(), "main: matched Decode command");
            cmd_decode(&token)
        }
        Command::Render { file, output } => {
            debug!(?file, ?output, "main: matched Render command");
            cmd_render(&config, &file, &output).await
        }
    }
}

/// Interactive session over stdin
async fn cmd_chat(config: &Config, output_dir: &Path, session: Option<String>) -> Result<()> {
    debug!(?output_dir, "cmd_chat: called");
    config.validate()?;
    fs::create_dir_all(output_dir).context("Failed to create output directory")?;

    let orchestrator = Arc::new(Orchestrator::from_config(config)?);
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    let housekeeper = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run(shutdown_rx).await })
    };

    let session_id = match session {
        Some(id) => id,
        None => orchestrator.init_session().await,
    };
    println!("{} {}", "Procflow session".bright_cyan().bold(), session_id.cyan());
    println!("Describe a process; /end to quit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut turn = 0usize;
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                debug!("cmd_chat: ctrl-c received");
                None
            }
        };
        let Some(line) = line else {
            debug!("cmd_chat: input closed");
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            let mut parts = command.split_whitespace();
            match parts.next() {
                Some("end") => {
                    debug!("cmd_chat: matched /end");
                    if let Err(e) = orchestrator.end_session(&session_id).await {
                        warn!(%session_id, error = %e, "cmd_chat: end_session failed");
                    }
                    break;
                }
                Some("report") => {
                    debug!("cmd_chat: matched /report");
                    match orchestrator.email_report(&session_id).await {
                        Ok(()) => println!("{} Report sent", "✓".green()),
                        Err(e) => eprintln!("{} {}", "Error:".red(), e),
                    }
                }
                Some("contact") => {
                    debug!("cmd_chat: matched /contact");
                    let rest: Vec<&str> = parts.collect();
                    let Some((email, name)) = rest.split_last() else {
                        eprintln!("{} usage: /contact <name> <email>", "Error:".red());
                        continue;
                    };
                    let name = name.join(" ");
                    match orchestrator.set_contact(&session_id, &name, email).await {
                        Ok(()) => println!("{} Reports go to {}", "✓".green(), email),
                        Err(e) => eprintln!("{} {}", "Error:".red(), e),
                    }
                }
                _ => eprintln!("{} unknown command: /{}", "Error:".red(), command),
            }
            continue;
        }

        println!("{}", "Generating...".dimmed());
        match orchestrator.converse(&session_id, line).await {
            Ok(diagram) => {
                turn += 1;
                let path = output_dir.join(format!("turn-{}.png", turn));
                fs::write(&path, &diagram.png).context("Failed to write diagram")?;
                println!(
                    "{} {} ({} attempt{})",
                    "✓".green(),
                    path.display(),
                    diagram.attempts,
                    if diagram.attempts == 1 { "" } else { "s" }
                );
            }
            Err(e) => eprintln!("{} {}", "Error:".red(), e),
        }
    }

    let _ = shutdown_tx.send(()).await;
    housekeeper.await.context("Housekeeper task panicked")??;
    info!("Chat session finished");
    Ok(())
}

fn cmd_encode(file: &Path) -> Result<()> {
    debug!(?file, "cmd_encode: called");
    let source = fs::read(file).context(format!("Failed to read {}", file.display()))?;
    println!("{}", encoding::encode(source));
    Ok(())
}

fn cmd_decode(token: &str) -> Result<()> {
    debug!("cmd_decode: called");
    let bytes = encoding::decode(token)?;
    let source = String::from_utf8(bytes).context("Decoded source is not UTF-8")?;
    println!("{}", source);
    Ok(())
}

/// Clean, encode and render a local source file
async fn cmd_render(config: &Config, file: &Path, output: &Path) -> Result<()> {
    debug!(?file, ?output, "cmd_render: called");
    let raw = fs::read_to_string(file).context(format!("Failed to read {}", file.display()))?;
    let source = Validator::from_config(&config.generation).validate(&raw)?;
    let token = encoding::encode(&source);

    let renderer = Renderer::from_config(&config.renderer)?;
    let png = renderer.render(&token).await?;
    fs::write(output, &png).context(format!("Failed to write {}", output.display()))?;
    println!("{} {}", "✓".green(), output.display());
    Ok(())
}
