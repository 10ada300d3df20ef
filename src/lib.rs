// src/lib.rs

pub mod cli;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod pool;
pub mod store;
pub mod tally;
pub mod work;

use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::CliArgs;
use crate::exec::CommandTemplate;
use crate::pool::{PoolEvent, PoolOptions, ShutdownController, Supervisor};
use crate::store::SnapshotStore;
use crate::work::WorkState;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - argument validation (directory, concurrency, command template)
/// - the shared work state
/// - the optional snapshot store (`--persist`)
/// - the worker-pool supervisor
/// - Ctrl-C / SIGTERM handling
pub async fn run(args: CliArgs) -> Result<()> {
    if args.max_concurrent < 1 {
        bail!("for --max-concurrent, the value must be at least 1");
    }
    if !args.directory.is_dir() {
        bail!("{} is not a directory", args.directory.display());
    }
    let template = Arc::new(CommandTemplate::parse(&args.command)?);

    let (events_tx, events_rx) = mpsc::unbounded_channel::<PoolEvent>();
    let state = Arc::new(WorkState::new(events_tx.clone()));

    let store = if args.persist {
        let store = SnapshotStore::new(&args.directory);

        info!("reading done-set snapshot");
        state.seed_done(store.load());

        // The snapshot and its backup live inside the target directory; they
        // must never be handed to the command as work items.
        state.seed_done(
            SnapshotStore::reserved_filenames()
                .into_iter()
                .map(str::to_string),
        );

        Some(store)
    } else {
        None
    };

    let shutdown = Arc::new(ShutdownController::new());
    spawn_signal_listener(shutdown.clone(), state.clone());

    let options = PoolOptions {
        target: args.max_concurrent,
        directory: args.directory.clone(),
    };

    let supervisor = Supervisor::new(
        options,
        template,
        state,
        shutdown,
        store,
        events_tx,
        events_rx,
    );
    supervisor.run().await
}

/// Interrupt/terminate → cooperative shutdown.
///
/// The first signal raises the flag and wakes the supervisor; later signals
/// are ignored. Nothing is killed: workers stop claiming, in-flight commands
/// run to completion.
fn spawn_signal_listener(shutdown: Arc<ShutdownController>, state: Arc<WorkState>) {
    tokio::spawn(async move {
        loop {
            if !wait_for_signal().await {
                return;
            }
            if shutdown.raise() {
                println!(
                    "<Caught termination signal. Will exit when all currently running commands exit.>"
                );
                state.notify_changed();
            }
        }
    });
}

/// Wait for Ctrl-C or (on Unix) SIGTERM. Returns false if signal listening
/// itself failed, in which case the caller gives up on signal handling.
#[cfg(unix)]
async fn wait_for_signal() -> bool {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(err) => {
            eprintln!("failed to listen for SIGTERM: {err}");
            return tokio::signal::ctrl_c().await.is_ok();
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(err) = res {
                eprintln!("failed to listen for Ctrl+C: {err}");
                return false;
            }
            true
        }
        _ = term.recv() => true,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
    match tokio::signal::ctrl_c().await {
        Ok(()) => true,
        Err(err) => {
            eprintln!("failed to listen for Ctrl+C: {err}");
            false
        }
    }
}
