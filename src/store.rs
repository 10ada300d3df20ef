// src/store.rs

//! Durable snapshots of the done set, for resuming across restarts.
//!
//! The snapshot is a small line-oriented text file inside the target
//! directory: a versioned header followed by one filename per line. Before
//! the first load the current snapshot is rotated to a `.bak` sibling, so a
//! crash mid-write still leaves the last-known-good copy behind.
//!
//! Storage failures are never fatal. A missing or corrupt snapshot degrades
//! to "start fresh"; a failed save degrades to "changes not durably saved".

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use tracing::{debug, warn};

use crate::errors::Result;

/// Name of the snapshot file, relative to the target directory.
pub const SNAPSHOT_FILE_NAME: &str = ".dirq-done";

/// Name of the rotated backup, next to the snapshot.
pub const BACKUP_FILE_NAME: &str = ".dirq-done.bak";

/// First line of every snapshot. An unknown header is treated as corruption.
const SNAPSHOT_HEADER: &str = "dirq-snapshot v1";

/// Load/save of the done set under a fixed path inside the target directory.
pub struct SnapshotStore {
    path: PathBuf,
    backup_path: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(SNAPSHOT_FILE_NAME),
            backup_path: dir.join(BACKUP_FILE_NAME),
        }
    }

    /// Filenames the engine must never treat as work items: the snapshot and
    /// its backup live inside the directory being processed.
    pub fn reserved_filenames() -> [&'static str; 2] {
        [SNAPSHOT_FILE_NAME, BACKUP_FILE_NAME]
    }

    /// Read a prior snapshot, then rotate it to the backup path.
    ///
    /// A missing file yields an empty set. Unreadable or corrupt content
    /// yields an empty set with a warning; a corrupt resume file degrades to
    /// "start fresh", never to a crash.
    pub fn load(&self) -> BTreeSet<String> {
        if !self.path.is_file() {
            debug!(path = %self.path.display(), "no snapshot file; starting fresh");
            return BTreeSet::new();
        }

        let done = match fs::read_to_string(&self.path) {
            Ok(contents) => match parse_snapshot(&contents) {
                Ok(done) => done,
                Err(err) => {
                    warn!(
                        path = %self.path.display(),
                        error = %err,
                        "snapshot file is corrupted; starting fresh"
                    );
                    BTreeSet::new()
                }
            },
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "cannot read snapshot file; starting fresh"
                );
                BTreeSet::new()
            }
        };

        // Rotate even when the content was unusable: the raw bytes may still
        // be worth inspecting, and the next save must not clobber them.
        if let Err(err) = self.rotate_backup() {
            warn!(
                path = %self.path.display(),
                error = %err,
                "unable to keep a backup of the snapshot file"
            );
        }

        done
    }

    /// Move the current snapshot aside as the backup, replacing any stale
    /// backup first. Runs once per load, before the first save can touch the
    /// snapshot path, so a crash mid-write still leaves this copy behind.
    fn rotate_backup(&self) -> Result<()> {
        if self.backup_path.is_file() {
            fs::remove_file(&self.backup_path)
                .with_context(|| format!("removing stale backup at {:?}", self.backup_path))?;
        }
        fs::rename(&self.path, &self.backup_path).with_context(|| {
            format!(
                "renaming snapshot {:?} to backup {:?}",
                self.path, self.backup_path
            )
        })?;
        Ok(())
    }

    /// Serialize the full done set and overwrite the snapshot path.
    ///
    /// The caller treats failure as a warning; the run continues with an
    /// in-memory done set that simply will not survive a restart.
    pub fn save(&self, done: &BTreeSet<String>) -> Result<()> {
        let mut out = String::with_capacity(done.len() * 16 + SNAPSHOT_HEADER.len() + 1);
        out.push_str(SNAPSHOT_HEADER);
        out.push('\n');
        for name in done {
            out.push_str(name);
            out.push('\n');
        }

        fs::write(&self.path, out)
            .with_context(|| format!("writing snapshot file at {:?}", self.path))?;

        debug!(path = %self.path.display(), entries = done.len(), "saved done-set snapshot");
        Ok(())
    }
}

fn parse_snapshot(contents: &str) -> Result<BTreeSet<String>> {
    let mut lines = contents.lines();

    match lines.next() {
        Some(header) if header.trim_end() == SNAPSHOT_HEADER => {}
        Some(other) => bail!("unknown snapshot header: {other:?}"),
        None => bail!("snapshot file is empty"),
    }

    Ok(lines
        .map(str::to_string)
        .filter(|name| !name.is_empty())
        .collect())
}
