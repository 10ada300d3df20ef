// src/pool/supervisor.rs

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::exec::CommandTemplate;
use crate::pool::shutdown::ShutdownController;
use crate::pool::worker::Worker;
use crate::pool::{PoolEvent, WorkerId};
use crate::store::SnapshotStore;
use crate::work::WorkState;

/// Static parameters of a pool run.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Target concurrency: the pool is held at this many live workers while
    /// pending work remains. Validated to be at least 1 before the pool is
    /// built.
    pub target: usize,
    /// Directory whose files are the units of work.
    pub directory: PathBuf,
}

/// Orchestrates the worker pool.
///
/// Responsibilities:
/// - start the initial worker cohort
/// - wake on every [`PoolEvent`], reap exited workers from the handle table
/// - persist the done set after each change (when persistence is enabled)
/// - top the pool back up to the target while work remains and shutdown has
///   not been requested
/// - detect completion: nothing pending and nobody running
pub struct Supervisor {
    options: PoolOptions,
    template: Arc<CommandTemplate>,
    state: Arc<WorkState>,
    shutdown: Arc<ShutdownController>,
    store: Option<SnapshotStore>,

    events_tx: mpsc::UnboundedSender<PoolEvent>,
    events_rx: mpsc::UnboundedReceiver<PoolEvent>,

    /// Live workers by id. Entries are removed (and their handles awaited)
    /// when the worker announces its own exit, so reaping never relies on
    /// polling task liveness.
    workers: HashMap<WorkerId, JoinHandle<()>>,
    next_id: WorkerId,
}

impl Supervisor {
    pub fn new(
        options: PoolOptions,
        template: Arc<CommandTemplate>,
        state: Arc<WorkState>,
        shutdown: Arc<ShutdownController>,
        store: Option<SnapshotStore>,
        events_tx: mpsc::UnboundedSender<PoolEvent>,
        events_rx: mpsc::UnboundedReceiver<PoolEvent>,
    ) -> Self {
        Self {
            options,
            template,
            state,
            shutdown,
            store,
            events_tx,
            events_rx,
            workers: HashMap::new(),
            next_id: 0,
        }
    }

    /// Run the pool to completion.
    ///
    /// Returns when the pending set is empty and no workers remain, or when
    /// shutdown was requested and the last in-flight command has finished.
    pub async fn run(mut self) -> Result<()> {
        info!(workers = self.options.target, "starting worker pool");
        for _ in 0..self.options.target {
            self.start_worker();
        }

        while let Some(event) = self.events_rx.recv().await {
            debug!(?event, "supervisor received event");

            if let PoolEvent::WorkerExited { id } = event {
                self.reap_worker(id).await;
            }

            self.save_snapshot();

            let pending = self.state.pending_len();
            if pending > 0 && !self.shutdown.is_raised() {
                while self.workers.len() < self.options.target {
                    self.start_worker();
                }
            }

            // Normal completion: nothing queued and nobody running. After a
            // shutdown request the pending set no longer matters; we only
            // wait for in-flight commands.
            if self.workers.is_empty() && (pending == 0 || self.shutdown.is_raised()) {
                break;
            }
        }

        info!("worker pool finished");
        Ok(())
    }

    fn start_worker(&mut self) {
        let id = self.next_id;
        self.next_id += 1;

        debug!(worker = id, "starting worker");
        let worker = Worker::new(
            id,
            self.options.directory.clone(),
            self.template.clone(),
            self.state.clone(),
            self.shutdown.clone(),
            self.events_tx.clone(),
        );
        self.workers.insert(id, worker.spawn());
    }

    /// Remove a worker from the handle table and await its task. The worker
    /// announces its exit just before returning, so this join is near-instant.
    async fn reap_worker(&mut self, id: WorkerId) {
        let Some(handle) = self.workers.remove(&id) else {
            return;
        };
        if let Err(err) = handle.await {
            error!(worker = id, error = %err, "worker task failed");
        }
        debug!(worker = id, live = self.workers.len(), "reaped worker");
    }

    /// Snapshot the done set to disk, if persistence is enabled. Failure is
    /// a warning: the run continues, it just will not resume after a crash.
    fn save_snapshot(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.save(&self.state.snapshot_done()) {
            warn!(error = %err, "cannot write snapshot file");
        }
    }
}
