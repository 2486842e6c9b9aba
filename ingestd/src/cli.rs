//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::domain::Priority;

/// ingestd - priority-ordered, rate-limited batch ingestion
#[derive(Parser)]
#[command(
    name = "ingestd",
    about = "Priority-ordered, rate-limited batch ingestion scheduler",
    version = env!("GIT_DESCRIBE"),
    after_help = after_help()
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
    /// Run the scheduler and listen for requests
    Serve,

    /// Submit item IDs to a running server
    Submit {
        /// Request priority (HIGH, MEDIUM, LOW)
        #[arg(short, long, default_value = "MEDIUM")]
        priority: Priority,

        /// Item IDs to ingest
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
    },

    /// Show the status of an ingestion request
    Status {
        /// Ingestion id returned by `submit`
        id: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show scheduler counters of a running server
    Stats {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Ping a running server
    Ping,

    /// Process item IDs in-process and wait until done
    Run {
        /// Request priority (HIGH, MEDIUM, LOW)
        #[arg(short, long, default_value = "MEDIUM")]
        priority: Priority,

        /// Output format for the final status
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Item IDs to ingest
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ingestd")
        .join("logs")
        .join("ingestd.log")
}

fn after_help() -> String {
    format!("Logs are written to: {}", get_log_path().display())
}

/// Output format for status/stats commands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
