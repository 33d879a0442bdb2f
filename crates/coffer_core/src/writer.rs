//! Atomic, verified file replacement.
//!
//! Saving a database never touches the existing file until a complete,
//! re-read-verified copy exists next to it. The sequence is: write to a
//! randomly suffixed temp file and fsync it, read it back and compare
//! digests, optionally copy the old file to `.bak`, then rename over the
//! destination. Every failure before the rename leaves the original
//! byte-identical; the temp file is removed on all error paths.

use crate::control::CancelToken;
use crate::error::{CoreError, CoreResult};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Options controlling a transactional write.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Keep a `.bak` copy of the previous file contents.
    pub backup: bool,
}

/// Completed milestones of a transactional write, reported in order.
///
/// The observer of [`TransactionalWriter::write_atomic_observed`] is
/// invoked after each milestone; returning an error there aborts the
/// write at that point, which is how crash behavior is simulated in
/// tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStep {
    /// The temp file is fully written and fsynced.
    TempWritten,
    /// The temp file was read back and its digest matched.
    Verified,
    /// The previous file was copied to `.bak`.
    BackupCopied,
    /// The temp file was renamed over the destination.
    Renamed,
}

/// Observer callback for [`TransactionalWriter::write_atomic_observed`].
pub type StepObserver<'a> = &'a mut dyn FnMut(SaveStep) -> CoreResult<()>;

/// Removes the temp file unless the rename consumed it.
struct TempGuard {
    path: PathBuf,
    armed: bool,
}

impl TempGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best effort; a leftover temp file is inert.
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Writes files via the temp-write / verify / backup / rename sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionalWriter;

impl TransactionalWriter {
    /// Atomically replaces `path` with `bytes`.
    pub fn write_atomic(
        path: &Path,
        bytes: &[u8],
        options: WriteOptions,
        cancel: &CancelToken,
    ) -> CoreResult<()> {
        Self::write_atomic_observed(path, bytes, options, cancel, &mut |_| Ok(()))
    }

    /// Like [`write_atomic`](Self::write_atomic), reporting each completed
    /// [`SaveStep`] to `observer`. An observer error aborts the write;
    /// before [`SaveStep::Renamed`] the original file is untouched.
    pub fn write_atomic_observed(
        path: &Path,
        bytes: &[u8],
        options: WriteOptions,
        cancel: &CancelToken,
        observer: StepObserver<'_>,
    ) -> CoreResult<()> {
        let tmp_path = temp_sibling(path);
        let mut guard = TempGuard {
            path: tmp_path.clone(),
            armed: true,
        };

        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.sync_all()?;
        drop(tmp);
        observer(SaveStep::TempWritten)?;

        // Catch silent truncation or bit rot between write and rename.
        let written = fs::read(&tmp_path)?;
        if Sha256::digest(&written) != Sha256::digest(bytes) {
            return Err(CoreError::integrity("temp file verification failed"));
        }
        observer(SaveStep::Verified)?;

        if options.backup && path.exists() {
            let bak_path = backup_sibling(path);
            // A transient copy failure gets one retry; the backup is the
            // only step that does, since it touches a second file.
            if let Err(first) = fs::copy(path, &bak_path) {
                debug!(error = %first, "backup copy failed, retrying once");
                fs::copy(path, &bak_path)?;
            }
            observer(SaveStep::BackupCopied)?;
        }

        // Last chance to abandon the save with the original intact.
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        fs::rename(&tmp_path, path)?;
        guard.disarm();
        observer(SaveStep::Renamed)?;

        // Persist the rename in the directory entry. The data is already
        // durable, so a failure here is only worth a warning.
        if let Some(parent) = path.parent() {
            match File::open(parent) {
                Ok(dir) => {
                    if let Err(err) = dir.sync_all() {
                        warn!(error = %err, "directory fsync failed after rename");
                    }
                }
                Err(err) => warn!(error = %err, "could not open directory for fsync"),
            }
        }

        debug!(bytes = bytes.len(), "database file replaced atomically");
        Ok(())
    }
}

/// A sibling path with a random suffix, guaranteed to be on the same
/// filesystem so the final rename is atomic.
fn temp_sibling(path: &Path) -> PathBuf {
    let mut suffix = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut suffix);
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "coffer".into());
    name.push(format!(".tmp-{}", hex::encode(suffix)));
    path.with_file_name(name)
}

fn backup_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "coffer".into());
    name.push(".bak");
    path.with_file_name(name)
}
