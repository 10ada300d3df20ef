// src/work.rs

//! Shared work-state: the pending and done filename sets.
//!
//! Both sets live behind a single mutex. There is deliberately one lock for
//! the pair, never per-set locks, so "pending is empty, rescan" and "move a
//! name from pending to done" are each a single critical section and the two
//! sets can never be observed overlapping.
//!
//! Every call that touches the sets publishes a [`PoolEvent::StateChanged`]
//! so the supervisor wakes up, persists the done set, and tops the worker
//! pool back up if work reappeared.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::pool::PoolEvent;

/// Outcome of a claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// A filename was moved from pending to done and now belongs to the
    /// caller. `rescanned` is true when the claim required a fresh directory
    /// scan because the pending set had run dry.
    Claimed { name: String, rescanned: bool },
    /// No pending work, and a fresh directory scan found nothing new. The
    /// calling worker should retire; the supervisor starts a replacement if
    /// work appears later.
    Empty,
}

struct Sets {
    pending: BTreeSet<String>,
    done: BTreeSet<String>,
}

/// The shared context passed to every worker and to the supervisor.
pub struct WorkState {
    sets: Mutex<Sets>,
    events: mpsc::UnboundedSender<PoolEvent>,
}

impl WorkState {
    pub fn new(events: mpsc::UnboundedSender<PoolEvent>) -> Self {
        Self {
            sets: Mutex::new(Sets {
                pending: BTreeSet::new(),
                done: BTreeSet::new(),
            }),
            events,
        }
    }

    /// Pre-insert names into the done set so they are never treated as work.
    ///
    /// Used at startup for a loaded snapshot and for the snapshot file's own
    /// name (and its backup's), which live inside the target directory.
    pub fn seed_done(&self, names: impl IntoIterator<Item = String>) {
        let mut sets = self.lock();
        sets.done.extend(names);
    }

    /// Claim one unit of work, rescanning the directory if necessary.
    ///
    /// Under the lock: pop an arbitrary pending name and insert it into the
    /// done set in the same critical section, so no two workers can claim the
    /// same name and the sets never overlap. If the pending set is empty,
    /// scan `dir` for regular files, subtract the done set, and install the
    /// remainder as the new pending set before popping. No ordering guarantee
    /// is made on which name comes back.
    ///
    /// The scan runs with the lock held. That briefly blocks other claimants
    /// on large directories, but it keeps "check empty" and "refill" atomic;
    /// see DESIGN.md.
    pub fn claim_or_scan(&self, dir: &Path) -> Claim {
        let claim = {
            let mut sets = self.lock();

            let mut rescanned = false;
            if sets.pending.is_empty() {
                rescanned = true;
                let found = scan_directory(dir);
                let fresh: BTreeSet<String> = found.difference(&sets.done).cloned().collect();
                sets.pending = fresh;
            }

            match sets.pending.iter().next().cloned() {
                Some(name) => {
                    sets.pending.remove(&name);
                    sets.done.insert(name.clone());
                    Claim::Claimed { name, rescanned }
                }
                None => Claim::Empty,
            }
        };

        self.notify_changed();
        claim
    }

    /// Throw away all pending work. Used when the command executable turns
    /// out not to exist: nothing further can be processed, so the pending set
    /// is cleared before shutdown is raised.
    pub fn drain_pending(&self) {
        {
            let mut sets = self.lock();
            let dropped = sets.pending.len();
            sets.pending.clear();
            debug!(dropped, "drained pending set");
        }
        self.notify_changed();
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Copy of the done set, taken under the lock to avoid torn reads.
    pub fn snapshot_done(&self) -> BTreeSet<String> {
        self.lock().done.clone()
    }

    /// Wake the supervisor. Send failure means the supervisor is already
    /// gone, which only happens during teardown.
    pub fn notify_changed(&self) {
        let _ = self.events.send(PoolEvent::StateChanged);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sets> {
        self.sets.lock().expect("work-state lock poisoned")
    }
}

/// List the regular files in `dir` by base name.
///
/// A failed scan degrades to "nothing found": the run winds down instead of
/// crashing if the directory vanishes mid-run. Non-UTF-8 names are skipped
/// with a warning since work items are exchanged as strings.
fn scan_directory(dir: &Path) -> BTreeSet<String> {
    let mut found = BTreeSet::new();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "directory scan failed");
            return found;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.path().is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => {
                found.insert(name);
            }
            Err(name) => warn!(name = ?name, "skipping file with non-UTF-8 name"),
        }
    }

    found
}
