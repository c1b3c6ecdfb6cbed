//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Procflow - conversational process diagram generator
#[derive(Parser)]
#[command(
    name = "pf",
    about = "Describe a business process, get a rendered activity diagram",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive session: each line is a prompt, each diagram is written as a PNG
    Chat {
        /// Directory the rendered diagrams are written to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Reuse a session id instead of minting one
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Encode a diagram source file into a rendering token
    Encode {
        /// Diagram source file
        file: PathBuf,
    },

    /// Decode a rendering token back into diagram source
    Decode {
        /// Token as it appears in the rendering URL (without `~1`)
        token: String,
    },

    /// Clean a local diagram source file and render it to PNG
    Render {
        /// Diagram source file
        file: PathBuf,

        /// Output PNG path
        #[arg(short, long, default_value = "diagram.png")]
        output: PathBuf,
    },
}

/// Get the path to the log file
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("procflow")
        .join("logs")
        .join("procflow.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Generate the after_help text
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    format!(
        "Chat commands:\n  /contact <name> <email>  set the report recipient\n  /report                  mail the session report now\n  /end                     end the session and quit\n\nLogs are written to: {}\n",
        get_log_path().display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render_with_globals() {
        let cli = Cli::parse_from(["pf", "render", "flow.puml", "-o", "out.png", "--log-level", "debug"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Render { file, output } => {
                assert_eq!(file, PathBuf::from("flow.puml"));
                assert_eq!(output, PathBuf::from("out.png"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_log_path_under_procflow() {
        assert!(get_log_path().ends_with("procflow/logs/procflow.log"));
    }
}
