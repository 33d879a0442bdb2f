//! The database handle and its lifecycle.
//!
//! A [`Database`] is either locked (no plaintext in memory) or unlocked
//! (metadata and tree resident, secrets zeroized on drop). Unlocking
//! reads and authenticates a container file; saving re-derives the key
//! under fresh parameters and replaces the file atomically. Every
//! mutation while unlocked marks the database dirty until the next
//! successful save.

use crate::config::DatabaseConfig;
use crate::control::TransformControl;
use crate::error::{CoreError, CoreResult};
use crate::keys::kdf;
use crate::keys::CompositeKey;
use crate::meta::Metadata;
use crate::payload;
use crate::tree::{Attribute, Entry, EntryTree, RemovalOutcome};
use crate::writer::{TransactionalWriter, WriteOptions};
use coffer_format::{decrypt_body, write_container, Header};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// Observable lifecycle state of a [`Database`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseState {
    /// No credentials loaded; no plaintext in memory.
    Locked,
    /// Unlocked with no unsaved changes.
    Unlocked,
    /// Unlocked with changes not yet written to disk.
    Modified,
    /// A save is in flight.
    Saving,
}

struct UnlockedState {
    key: CompositeKey,
    meta: Metadata,
    tree: EntryTree,
    dirty: bool,
}

enum Inner {
    Locked,
    Unlocked(Box<UnlockedState>),
}

/// An encrypted credential database.
pub struct Database {
    inner: Inner,
    config: DatabaseConfig,
    saving: bool,
}

impl Database {
    /// Creates a fresh, unlocked database with an empty tree. The new
    /// database is dirty until its first save.
    pub fn create(
        name: impl Into<String>,
        key: CompositeKey,
        config: DatabaseConfig,
    ) -> CoreResult<Self> {
        if key.factor_count() == 0 {
            return Err(CoreError::NoKeyFactors);
        }
        let name = name.into();
        let meta = Metadata::new(name.clone());
        let tree = EntryTree::new(name);
        Ok(Self {
            inner: Inner::Unlocked(Box::new(UnlockedState {
                key,
                meta,
                tree,
                dirty: true,
            })),
            config,
            saving: false,
        })
    }

    /// Opens and decrypts a container file.
    ///
    /// A wrong key and a tampered file both fail with
    /// [`CoreError::Integrity`]; a truncated file fails with
    /// [`CoreError::Io`]. Failures leave nothing resident in memory.
    pub fn unlock(
        path: impl AsRef<Path>,
        key: CompositeKey,
        control: &TransformControl,
    ) -> CoreResult<Self> {
        let bytes = fs::read(path.as_ref())?;
        let (header, body_offset) = Header::read(&bytes)?;

        let raw = key.raw_key_material()?;
        let transformed = kdf::derive(&raw, &header.kdf, control)?;
        control.check_cancelled()?;

        let plaintext = decrypt_body(&header, transformed.as_bytes(), &bytes[body_offset..])?;
        let (meta, tree) = payload::decode(&plaintext)?;

        // Future saves preserve the file's cipher, compression and KDF
        // costs unless the caller reconfigures them.
        let config = DatabaseConfig::new()
            .cipher(header.cipher)
            .compression(header.compression)
            .kdf_memory_kib(header.kdf.memory_kib)
            .kdf_time_cost(header.kdf.time_cost)
            .kdf_parallelism(header.kdf.parallelism);

        info!(
            groups = tree.group_count(),
            entries = tree.entry_count(),
            "database unlocked"
        );
        Ok(Self {
            inner: Inner::Unlocked(Box::new(UnlockedState {
                key,
                meta,
                tree,
                dirty: false,
            })),
            config,
            saving: false,
        })
    }

    /// Encrypts and atomically writes the database to `path`.
    ///
    /// Each save generates a fresh salt and nonce and re-derives the key,
    /// so two saves of identical content never produce related
    /// ciphertexts. On success the database is clean; on failure the file
    /// at `path` is untouched and the database stays dirty.
    pub fn save(&mut self, path: impl AsRef<Path>, control: &TransformControl) -> CoreResult<()> {
        self.saving = true;
        let result = self.save_inner(path.as_ref(), control);
        self.saving = false;
        result
    }

    fn save_inner(&mut self, path: &Path, control: &TransformControl) -> CoreResult<()> {
        let config = self.config;
        let state = self.unlocked_mut()?;

        let params = config.generate_kdf_params()?;
        let raw = state.key.raw_key_material()?;
        let transformed = kdf::derive(&raw, &params, control)?;
        control.check_cancelled()?;

        let plaintext = payload::encode(&state.meta, &state.tree)?;
        let header = Header::generate(config.cipher, config.compression, params);
        let container = write_container(&header, transformed.as_bytes(), &plaintext)?;

        TransactionalWriter::write_atomic(
            path,
            &container,
            WriteOptions {
                backup: config.backup_on_save,
            },
            control.cancel_token(),
        )?;

        state.dirty = false;
        info!(bytes = container.len(), "database saved");
        Ok(())
    }

    /// Discards all plaintext state. Secrets are zeroized as they drop.
    /// Unsaved changes are lost; locking an already locked database is a
    /// no-op.
    pub fn lock(&mut self) {
        if matches!(self.inner, Inner::Unlocked(_)) {
            debug!("database locked");
        }
        self.inner = Inner::Locked;
    }

    /// Replaces the composite key. Takes effect on the next save; the
    /// database becomes dirty immediately.
    pub fn change_key(&mut self, key: CompositeKey) -> CoreResult<()> {
        if key.factor_count() == 0 {
            return Err(CoreError::NoKeyFactors);
        }
        let state = self.unlocked_mut()?;
        state.key = key;
        state.dirty = true;
        info!("composite key replaced");
        Ok(())
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DatabaseState {
        if self.saving {
            return DatabaseState::Saving;
        }
        match &self.inner {
            Inner::Locked => DatabaseState::Locked,
            Inner::Unlocked(s) if s.dirty => DatabaseState::Modified,
            Inner::Unlocked(_) => DatabaseState::Unlocked,
        }
    }

    /// Whether there are unsaved changes.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        matches!(&self.inner, Inner::Unlocked(s) if s.dirty)
    }

    /// The configuration used for the next save.
    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Replaces the save configuration.
    pub fn set_config(&mut self, config: DatabaseConfig) {
        self.config = config;
    }

    /// The database metadata.
    pub fn meta(&self) -> CoreResult<&Metadata> {
        self.unlocked().map(|s| &s.meta)
    }

    /// The entry tree.
    pub fn tree(&self) -> CoreResult<&EntryTree> {
        self.unlocked().map(|s| &s.tree)
    }

    /// Resolves a slash-delimited path to an entry.
    pub fn find_by_path(&self, path: &str) -> CoreResult<&Entry> {
        self.unlocked()?
            .tree
            .find_by_path(path)
            .ok_or_else(|| CoreError::entry_not_found(path))
    }

    /// Creates a group under `parent` and marks the database dirty.
    pub fn add_group(&mut self, parent: Uuid, name: impl Into<String>) -> CoreResult<Uuid> {
        let state = self.unlocked_mut()?;
        let id = state.tree.add_group(parent, name)?;
        state.dirty = true;
        Ok(id)
    }

    /// Creates an entry under `parent` and marks the database dirty.
    pub fn add_entry(&mut self, parent: Uuid, title: impl Into<String>) -> CoreResult<Uuid> {
        let state = self.unlocked_mut()?;
        let id = state.tree.add_entry(parent, title)?;
        state.dirty = true;
        Ok(id)
    }

    /// The id of the root group.
    pub fn root_id(&self) -> CoreResult<Uuid> {
        self.unlocked().map(|s| s.tree.root_id())
    }

    /// Sets an entry attribute, pruning history per the database policy,
    /// and marks the database dirty.
    pub fn set_entry_attribute(
        &mut self,
        entry_id: Uuid,
        key: impl Into<String>,
        attribute: Attribute,
    ) -> CoreResult<()> {
        let state = self.unlocked_mut()?;
        let policy = state.meta.history;
        state.tree.set_entry_attribute(entry_id, key, attribute, &policy)?;
        state.dirty = true;
        Ok(())
    }

    /// Re-parents an entry and marks the database dirty.
    pub fn move_entry(&mut self, entry_id: Uuid, new_parent: Uuid) -> CoreResult<()> {
        let state = self.unlocked_mut()?;
        state.tree.move_entry(entry_id, new_parent)?;
        state.dirty = true;
        Ok(())
    }

    /// Re-parents a group and marks the database dirty.
    pub fn move_group(&mut self, group_id: Uuid, new_parent: Uuid) -> CoreResult<()> {
        let state = self.unlocked_mut()?;
        state.tree.move_group(group_id, new_parent)?;
        state.dirty = true;
        Ok(())
    }

    /// Recycles or permanently removes an entry; see
    /// [`EntryTree::recycle_or_remove`]. A cancelled removal does not
    /// mark the database dirty.
    pub fn recycle_or_remove(
        &mut self,
        entry_id: Uuid,
        confirm: impl FnOnce(&str) -> bool,
    ) -> CoreResult<RemovalOutcome> {
        let state = self.unlocked_mut()?;
        let outcome = state.tree.recycle_or_remove(&mut state.meta, entry_id, confirm)?;
        if outcome != RemovalOutcome::Cancelled {
            state.dirty = true;
        }
        Ok(outcome)
    }

    /// Recycles or permanently removes a group subtree; see
    /// [`EntryTree::remove_group`].
    pub fn remove_group(
        &mut self,
        group_id: Uuid,
        confirm: impl FnOnce(&str) -> bool,
    ) -> CoreResult<RemovalOutcome> {
        let state = self.unlocked_mut()?;
        let outcome = state.tree.remove_group(&mut state.meta, group_id, confirm)?;
        if outcome != RemovalOutcome::Cancelled {
            state.dirty = true;
        }
        Ok(outcome)
    }

    fn unlocked(&self) -> CoreResult<&UnlockedState> {
        match &self.inner {
            Inner::Unlocked(state) => Ok(state),
            Inner::Locked => Err(CoreError::DatabaseLocked),
        }
    }

    fn unlocked_mut(&mut self) -> CoreResult<&mut UnlockedState> {
        match &mut self.inner {
            Inner::Unlocked(state) => Ok(state),
            Inner::Locked => Err(CoreError::DatabaseLocked),
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.lock();
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod persistence_tests {
    use super::*;
    use crate::keys::{KeyFileFactor, PasswordFactor};
    use crate::tree::attr;

    fn key(password: &str) -> CompositeKey {
        CompositeKey::new().with_factor(PasswordFactor::new(password))
    }

    fn fast_config() -> DatabaseConfig {
        DatabaseConfig::new()
            .kdf_memory_kib(16)
            .kdf_time_cost(1)
            .kdf_parallelism(1)
    }

    #[test]
    fn save_unlock_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.cfdb");

        let mut db = Database::create("Vault", key("correct horse"), fast_config()).unwrap();
        let root = db.root_id().unwrap();
        let internet = db.add_group(root, "Internet").unwrap();
        let entry = db.add_entry(internet, "Example").unwrap();
        db.set_entry_attribute(entry, attr::USERNAME, Attribute::plain("alice"))
            .unwrap();
        db.set_entry_attribute(entry, attr::PASSWORD, Attribute::protected("hunter2"))
            .unwrap();
        db.save(&path, &TransformControl::new()).unwrap();
        assert!(!db.is_dirty());

        let db2 = Database::unlock(&path, key("correct horse"), &TransformControl::new()).unwrap();
        assert_eq!(db2.state(), DatabaseState::Unlocked);
        let found = db2.find_by_path("Internet/Example").unwrap();
        assert_eq!(found.username(), "alice");
        assert_eq!(found.password(), "hunter2");
        assert!(found.attribute_is_protected(attr::PASSWORD));
    }

    #[test]
    fn wrong_password_is_an_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.cfdb");
        let mut db = Database::create("Vault", key("right"), fast_config()).unwrap();
        db.save(&path, &TransformControl::new()).unwrap();

        let err = Database::unlock(&path, key("wrong"), &TransformControl::new()).unwrap_err();
        assert!(matches!(err, CoreError::Integrity { .. }));
    }

    #[test]
    fn multi_factor_key_roundtrip_and_order_matters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.cfdb");
        let keyfile = dir.path().join("vault.keyx");
        std::fs::write(&keyfile, [7u8; 32]).unwrap();

        let composite = || {
            CompositeKey::new()
                .with_factor(PasswordFactor::new("pw"))
                .with_factor(KeyFileFactor::from_path(&keyfile).unwrap())
        };
        let reversed = CompositeKey::new()
            .with_factor(KeyFileFactor::from_path(&keyfile).unwrap())
            .with_factor(PasswordFactor::new("pw"));

        let mut db = Database::create("Vault", composite(), fast_config()).unwrap();
        db.save(&path, &TransformControl::new()).unwrap();

        Database::unlock(&path, composite(), &TransformControl::new()).unwrap();
        let err = Database::unlock(&path, reversed, &TransformControl::new()).unwrap_err();
        assert!(matches!(err, CoreError::Integrity { .. }));
    }

    #[test]
    fn tampered_file_is_an_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.cfdb");
        let mut db = Database::create("Vault", key("pw"), fast_config()).unwrap();
        db.save(&path, &TransformControl::new()).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        std::fs::write(&path, &bytes).unwrap();

        let err = Database::unlock(&path, key("pw"), &TransformControl::new()).unwrap_err();
        assert!(matches!(err, CoreError::Integrity { .. }));
    }

    #[test]
    fn truncated_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.cfdb");
        let mut db = Database::create("Vault", key("pw"), fast_config()).unwrap();
        db.save(&path, &TransformControl::new()).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..20]).unwrap();

        let err = Database::unlock(&path, key("pw"), &TransformControl::new()).unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
    }

    #[test]
    fn saves_are_never_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.cfdb");
        let b = dir.path().join("b.cfdb");
        let mut db = Database::create("Vault", key("pw"), fast_config()).unwrap();
        db.save(&a, &TransformControl::new()).unwrap();
        db.save(&b, &TransformControl::new()).unwrap();
        assert_ne!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    }

    #[test]
    fn unlock_preserves_kdf_costs_for_next_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.cfdb");
        let config = fast_config().kdf_memory_kib(32).kdf_time_cost(2);
        let mut db = Database::create("Vault", key("pw"), config).unwrap();
        db.save(&path, &TransformControl::new()).unwrap();

        let db2 = Database::unlock(&path, key("pw"), &TransformControl::new()).unwrap();
        assert_eq!(db2.config().kdf_memory_kib, 32);
        assert_eq!(db2.config().kdf_time_cost, 2);
    }

    #[test]
    fn change_key_takes_effect_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.cfdb");
        let mut db = Database::create("Vault", key("old"), fast_config()).unwrap();
        db.save(&path, &TransformControl::new()).unwrap();

        db.change_key(key("new")).unwrap();
        db.save(&path, &TransformControl::new()).unwrap();

        assert!(Database::unlock(&path, key("old"), &TransformControl::new()).is_err());
        Database::unlock(&path, key("new"), &TransformControl::new()).unwrap();
    }

    #[test]
    fn failed_save_leaves_file_and_dirty_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.cfdb");
        let mut db = Database::create("Vault", key("pw"), fast_config()).unwrap();
        db.save(&path, &TransformControl::new()).unwrap();
        let original = std::fs::read(&path).unwrap();

        let root = db.root_id().unwrap();
        db.add_group(root, "Internet").unwrap();

        let cancel = crate::control::CancelToken::new();
        cancel.cancel();
        let control = TransformControl::with_cancel(cancel);
        let err = db.save(&path, &control).unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));

        assert!(db.is_dirty());
        assert_eq!(std::fs::read(&path).unwrap(), original);
    }

    /// Full workflow: unlock, navigate, recycle, save, reopen.
    #[test]
    fn recycle_survives_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.cfdb");

        let mut db = Database::create("Vault", key("pw"), fast_config()).unwrap();
        let root = db.root_id().unwrap();
        let internet = db.add_group(root, "Internet").unwrap();
        db.add_entry(internet, "Example").unwrap();
        db.save(&path, &TransformControl::new()).unwrap();

        let mut db = Database::unlock(&path, key("pw"), &TransformControl::new()).unwrap();
        let id = db
            .tree()
            .unwrap()
            .find_entry_id_by_path("Internet/Example")
            .unwrap();
        let outcome = db
            .recycle_or_remove(id, |_| panic!("recycling must not ask for confirmation"))
            .unwrap();
        assert_eq!(outcome, RemovalOutcome::Recycled);
        assert!(db.find_by_path("Recycle Bin/Example").is_ok());
        assert!(db.find_by_path("Internet/Example").is_err());
        db.save(&path, &TransformControl::new()).unwrap();

        let db = Database::unlock(&path, key("pw"), &TransformControl::new()).unwrap();
        let entry = db.find_by_path("Recycle Bin/Example").unwrap();
        assert_eq!(entry.id(), id);
    }
}
