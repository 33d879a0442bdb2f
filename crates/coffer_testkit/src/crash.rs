//! Crash simulation for the save path.
//!
//! The transactional writer reports a milestone after each completed
//! step of a save. The harness here aborts the write at a chosen
//! milestone and then checks what a process restart would find on disk.
//!
//! ## Test strategy
//!
//! 1. **Crash before rename** - original file must be byte-identical
//! 2. **Crash after rename** - new contents must be fully in place
//! 3. **Any crash** - no temp files left behind
//!
//! ## Usage
//!
//! ```rust,ignore
//! use coffer_testkit::crash::{CrashHarness, CrashPoint};
//!
//! let report = CrashHarness::new().run(CrashPoint::AfterVerify);
//! assert!(report.original_intact);
//! ```

use crate::fixtures::TestVault;
use coffer_core::{
    CancelToken, CoreError, SaveStep, TransactionalWriter, TransformControl, WriteOptions,
};
use std::fs;

/// Milestones at which a simulated crash can be injected.
///
/// Each point aborts the save immediately after the corresponding
/// [`SaveStep`] completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashPoint {
    /// Crash after the temp file is written and fsynced.
    AfterTempWrite,
    /// Crash after the temp file's read-back verification.
    AfterVerify,
    /// Crash after the previous file is copied to `.bak`.
    AfterBackup,
    /// Crash after the rename over the destination.
    AfterRename,
}

impl CrashPoint {
    /// The save milestone this point aborts after.
    #[must_use]
    pub fn step(self) -> SaveStep {
        match self {
            Self::AfterTempWrite => SaveStep::TempWritten,
            Self::AfterVerify => SaveStep::Verified,
            Self::AfterBackup => SaveStep::BackupCopied,
            Self::AfterRename => SaveStep::Renamed,
        }
    }

    /// Whether the destination file is expected to hold the new contents
    /// once this point is reached.
    #[must_use]
    pub fn replacement_durable(self) -> bool {
        matches!(self, Self::AfterRename)
    }
}

/// What the harness found on disk after a simulated crash.
#[derive(Debug, Clone)]
pub struct CrashReport {
    /// The injected crash point.
    pub point: CrashPoint,
    /// The save failed with the injected error.
    pub save_failed: bool,
    /// The destination file holds its pre-save contents.
    pub original_intact: bool,
    /// The destination file holds the attempted new contents.
    pub replacement_in_place: bool,
    /// No `.tmp-` files remain next to the destination.
    pub no_temp_leftovers: bool,
}

impl CrashReport {
    /// Whether the observed state matches the crash-safety contract for
    /// the injected point.
    #[must_use]
    pub fn passed(&self) -> bool {
        let durable = self.point.replacement_durable();
        self.no_temp_leftovers
            && self.original_intact != durable
            && self.replacement_in_place == durable
    }
}

/// Drives the transactional writer into simulated crashes against a
/// populated on-disk vault.
pub struct CrashHarness {
    vault: TestVault,
}

impl CrashHarness {
    /// Creates a harness over a fresh populated vault.
    #[must_use]
    pub fn new() -> Self {
        Self {
            vault: TestVault::populated(),
        }
    }

    /// Mutates the vault, attempts a save that crashes at `point`, and
    /// inspects the resulting on-disk state.
    pub fn run(&mut self, point: CrashPoint) -> CrashReport {
        let original = self.vault.disk_bytes();

        // Re-encrypt the mutated vault by hand so the crash can be
        // injected between writer milestones.
        let root = self.vault.db.root_id().expect("vault is unlocked");
        self.vault
            .db
            .add_group(root, "Added Before Crash")
            .expect("add group");
        let replacement = self.encode_current();

        let crash_step = point.step();
        let result = TransactionalWriter::write_atomic_observed(
            &self.vault.path,
            &replacement,
            WriteOptions { backup: true },
            &CancelToken::new(),
            &mut |step| {
                if step == crash_step {
                    Err(CoreError::invalid_operation("simulated crash"))
                } else {
                    Ok(())
                }
            },
        );

        let on_disk = self.vault.disk_bytes();
        let dir = self
            .vault
            .path
            .parent()
            .expect("vault path has a parent directory");
        let no_temp_leftovers = fs::read_dir(dir)
            .expect("read temp directory")
            .filter_map(|e| e.ok())
            .all(|e| !e.file_name().to_string_lossy().contains(".tmp-"));

        CrashReport {
            point,
            save_failed: result.is_err(),
            original_intact: on_disk == original,
            replacement_in_place: on_disk == replacement,
            no_temp_leftovers,
        }
    }

    /// Encrypts the current vault state into fresh container bytes
    /// without touching the disk.
    fn encode_current(&mut self) -> Vec<u8> {
        // A save to a scratch path produces exactly the bytes a real
        // save would write.
        let scratch = self.vault.path.with_extension("scratch");
        self.vault
            .db
            .save(&scratch, &TransformControl::new())
            .expect("scratch save");
        let bytes = fs::read(&scratch).expect("read scratch file");
        fs::remove_file(&scratch).expect("remove scratch file");
        bytes
    }
}

impl Default for CrashHarness {
    fn default() -> Self {
        Self::new()
    }
}
