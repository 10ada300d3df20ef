// src/exec.rs

//! Command template parsing and child-process execution.
//!
//! The user supplies the command either as one shell-quoted string (`dirq`)
//! or as trailing arguments (`dirq-lines`); `shlex` handles the quoting
//! rules. The work item is appended as the final argument at spawn time.

use std::path::Path;
use std::process::ExitStatus;

use anyhow::{Result, bail};
use tokio::process::Command;
use tracing::debug;

/// A parsed external command: a program plus its leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
}

impl CommandTemplate {
    /// Parse a single shell-quoted command string, e.g. `"gzip -k9"`.
    pub fn parse(raw: &str) -> Result<Self> {
        let Some(tokens) = shlex::split(raw) else {
            bail!("command has unbalanced quotes: {raw}");
        };
        Self::from_parts(&tokens)
    }

    /// Build a template from already-tokenized parts.
    pub fn from_parts(parts: &[String]) -> Result<Self> {
        let Some((program, args)) = parts.split_first() else {
            bail!("command is empty");
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the command with `path` appended as the final argument and wait
    /// for it to exit. Stdio is inherited from the parent; the child is never
    /// killed early, even during shutdown.
    ///
    /// An [`std::io::ErrorKind::NotFound`] error here means the program
    /// itself does not exist, which callers treat as fatal.
    pub async fn run_with_path(&self, path: &Path) -> std::io::Result<ExitStatus> {
        debug!(program = %self.program, path = %path.display(), "spawning command");
        Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .status()
            .await
    }

    /// Run the command with extra string arguments appended.
    pub async fn run_with_args(&self, extra: &[String]) -> std::io::Result<ExitStatus> {
        debug!(program = %self.program, ?extra, "spawning command");
        Command::new(&self.program)
            .args(&self.args)
            .args(extra)
            .status()
            .await
    }
}
