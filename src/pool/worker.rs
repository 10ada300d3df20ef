// src/pool/worker.rs

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::exec::CommandTemplate;
use crate::pool::shutdown::ShutdownController;
use crate::pool::{PoolEvent, WorkerId};
use crate::work::{Claim, WorkState};

/// One unit of execution in the pool.
///
/// A worker loops between fetching and executing: claim a filename (which
/// may rescan the directory), run the command against it, repeat. When a
/// claim comes back empty the worker retires silently; it never resurrects
/// itself, so a single fresh scan per dry spell is guaranteed and it is the
/// supervisor's job to start a replacement if work reappears.
///
/// The shared lock is only held inside `claim_or_scan`, never across command
/// execution, so up to N commands genuinely run in parallel.
pub struct Worker {
    id: WorkerId,
    directory: PathBuf,
    template: Arc<CommandTemplate>,
    state: Arc<WorkState>,
    shutdown: Arc<ShutdownController>,
    events: mpsc::UnboundedSender<PoolEvent>,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        directory: PathBuf,
        template: Arc<CommandTemplate>,
        state: Arc<WorkState>,
        shutdown: Arc<ShutdownController>,
        events: mpsc::UnboundedSender<PoolEvent>,
    ) -> Self {
        Self {
            id,
            directory,
            template,
            state,
            shutdown,
            events,
        }
    }

    /// Spawn the worker loop as a Tokio task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        debug!(worker = self.id, "worker started");

        loop {
            // Checkpoint: a raised shutdown flag stops new claims, but the
            // command we already spawned this iteration has been awaited.
            if self.shutdown.is_raised() {
                debug!(worker = self.id, "shutdown raised; worker retiring");
                break;
            }

            let (name, rescanned) = match self.state.claim_or_scan(&self.directory) {
                Claim::Claimed { name, rescanned } => (name, rescanned),
                Claim::Empty => {
                    debug!(worker = self.id, "no work left; worker retiring");
                    break;
                }
            };

            if rescanned {
                info!(worker = self.id, "scanned for new files");
            }
            info!(worker = self.id, file = %name, "processing file");

            let path = self.directory.join(&name);
            match self.template.run_with_path(&path).await {
                Ok(status) => {
                    debug!(worker = self.id, file = %name, ?status, "command finished");
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    // The command executable itself is missing. Nothing else
                    // can be processed either, so drain the queue and raise
                    // shutdown; in-flight commands on other workers finish.
                    error!(
                        program = %self.template.program(),
                        "command executable not found; shutting down"
                    );
                    self.state.drain_pending();
                    self.shutdown.raise();
                    break;
                }
                Err(err) => {
                    error!(worker = self.id, file = %name, error = %err, "failed to run command");
                }
            }
        }

        let _ = self.events.send(PoolEvent::WorkerExited { id: self.id });
    }
}
