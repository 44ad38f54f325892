//! Command-line arguments for `peri`.

use clap::{Parser, ValueEnum};

use crate::history::DEFAULT_CAPACITY;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "peri",
    version,
    about = "Interactive command interpreter with pipes, redirection and background jobs.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PERI_LOG` or a default of `warn` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Number of lines kept by the `history` builtin.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CAPACITY, value_parser = parse_capacity)]
    pub history_size: usize,

    /// Poll finished background jobs before each prompt and print `[pid] Done`.
    ///
    /// Off by default: background processes are never reaped.
    #[arg(long)]
    pub reap_background: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_capacity(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("history size must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
