// src/tally.rs

//! Line-driven runner for `dirq-lines`.
//!
//! Reads one argument string per input line, appends each (shell-split) to a
//! fixed command prefix, runs them with bounded concurrency, and tallies the
//! exit status of every spawned command. There is no directory rescanning
//! and no persisted state here; the result is a JSON histogram printed once
//! the input stream is exhausted.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::exec::CommandTemplate;

/// Exit status used for commands that could not be spawned at all, and for
/// children terminated by a signal (no exit code on the platform).
const SPAWN_FAILURE_STATUS: i32 = -1;

/// Default concurrency for `dirq-lines`: the platform core count, or 4 when
/// it cannot be determined.
pub fn default_num_processes() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Run the command once per line of `input`, at most `num_processes` at a
/// time, and count how often each exit status occurred.
///
/// Each line is shell-split and appended to the template's arguments; a line
/// with unbalanced quotes is skipped with a warning. The returned map is
/// ordered by exit status.
pub async fn run_lines<R>(
    input: R,
    template: Arc<CommandTemplate>,
    num_processes: usize,
) -> Result<BTreeMap<i32, u64>>
where
    R: AsyncBufRead + Unpin,
{
    let semaphore = Arc::new(Semaphore::new(num_processes));
    let mut children = JoinSet::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await.context("reading input line")? {
        let Some(extra) = shlex::split(&line) else {
            warn!(line = %line, "skipping line with unbalanced quotes");
            continue;
        };

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("acquiring concurrency permit")?;
        let template = template.clone();

        children.spawn(async move {
            let _permit = permit;
            match template.run_with_args(&extra).await {
                Ok(status) => {
                    let code = status.code().unwrap_or(SPAWN_FAILURE_STATUS);
                    debug!(?extra, code, "command finished");
                    code
                }
                Err(err) => {
                    error!(?extra, error = %err, "failed to spawn command");
                    SPAWN_FAILURE_STATUS
                }
            }
        });
    }

    let mut counts: BTreeMap<i32, u64> = BTreeMap::new();
    while let Some(joined) = children.join_next().await {
        let code = joined.unwrap_or_else(|err| {
            error!(error = %err, "command task failed");
            SPAWN_FAILURE_STATUS
        });
        *counts.entry(code).or_insert(0) += 1;
    }

    Ok(counts)
}

/// Pretty-printed JSON object mapping each observed exit status to its
/// occurrence count, keys in numeric order.
pub fn render_histogram(counts: &BTreeMap<i32, u64>) -> Result<String> {
    serde_json::to_string_pretty(counts).context("serializing exit-status histogram")
}
