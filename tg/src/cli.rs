//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

use crate::tools::ErrorKind;

/// toolguard - retry, circuit breaker and timeout policies for agent tools
#[derive(Parser)]
#[command(
    name = "tg",
    about = "Drive tools through retry, circuit-breaker and timeout policies",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/toolguard/logs/toolguard.log"
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
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a scripted flaky tool through the configured policy
    Simulate {
        /// Number of leading calls that fail
        #[arg(short, long, default_value = "2")]
        fail: usize,

        /// Kind of the scripted failures
        #[arg(short, long, value_enum, default_value = "network")]
        kind: KindArg,

        /// Number of executions to run
        #[arg(short = 'n', long, default_value = "1")]
        calls: usize,

        /// Run all executions at once instead of one after another
        #[arg(long)]
        concurrent: bool,

        /// Server-directed delay attached to every scripted failure
        #[arg(long)]
        retry_after_ms: Option<u64>,

        /// Latency of every scripted call
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Override the retry attempts from config
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Override the initial backoff from config
        #[arg(long)]
        initial_delay_ms: Option<u64>,

        /// Override the per-attempt timeout from config
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config,
}

/// Failure kinds accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Network,
    Timeout,
    Transient,
    RateLimit,
    Validation,
    Authentication,
    NotFound,
    Unknown,
}

impl From<KindArg> for ErrorKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Network => ErrorKind::Network,
            KindArg::Timeout => ErrorKind::Timeout,
            KindArg::Transient => ErrorKind::Transient,
            KindArg::RateLimit => ErrorKind::RateLimit,
            KindArg::Validation => ErrorKind::Validation,
            KindArg::Authentication => ErrorKind::Authentication,
            KindArg::NotFound => ErrorKind::NotFound,
            KindArg::Unknown => ErrorKind::Unknown,
        }
    }
}

/// Output format for simulation results
#[derive(Clone, Debug, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
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

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toolguard")
        .join("logs")
        .join("toolguard.log");
    debug!(?path, "get_log_path: returning path");
    path
}
