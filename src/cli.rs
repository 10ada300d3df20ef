// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! NOTE: this expects `clap` to be built with the `derive` feature, e.g.:
//! `clap = { version = "4.5.53", features = ["derive"] }` in `Cargo.toml`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `dirq`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dirq",
    version,
    about = "Run a command once per file in a directory, up to N at a time.",
    long_about = "Runs a command on all files in a directory, appending each file path \
        as the final argument. Up to N instances of the command run at the same time. \
        Files created while the run is in progress are picked up too."
)]
pub struct CliArgs {
    /// The directory whose files will be passed to the command.
    pub directory: PathBuf,

    /// The command to which each file path will be appended, as one
    /// shell-quoted string (e.g. "gzip -k9").
    pub command: String,

    /// Up to this number of instances of the command will be running at the
    /// same time.
    #[arg(short = 'n', long, value_name = "N", default_value_t = 4)]
    pub max_concurrent: usize,

    /// Load and save the set of already-processed files in a snapshot file
    /// inside the directory, so a relaunch skips them.
    #[arg(short = 'p', long)]
    pub persist: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DIRQ_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
