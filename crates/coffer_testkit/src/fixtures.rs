//! Test fixtures and vault helpers.
//!
//! Provides convenience functions for setting up test vaults with fast
//! KDF settings and a small populated tree.

use coffer_core::{
    attr, Attribute, CompositeKey, Database, DatabaseConfig, PasswordFactor, TransformControl,
};
use std::path::PathBuf;
use tempfile::TempDir;

/// Password used by all fixture vaults.
pub const TEST_PASSWORD: &str = "test-password";

/// KDF settings weak enough for fast tests. Never use outside tests.
#[must_use]
pub fn fast_config() -> DatabaseConfig {
    DatabaseConfig::new()
        .kdf_memory_kib(16)
        .kdf_time_cost(1)
        .kdf_parallelism(1)
}

/// The fixture composite key.
#[must_use]
pub fn test_key() -> CompositeKey {
    CompositeKey::new().with_factor(PasswordFactor::new(TEST_PASSWORD))
}

/// A test vault with automatic cleanup.
pub struct TestVault {
    /// The unlocked database instance.
    pub db: Database,
    /// Path the vault saves to, inside the temp directory.
    pub path: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TestVault {
    /// Creates a fresh, empty vault (not yet saved).
    #[must_use]
    pub fn empty() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("vault.cfdb");
        let db = Database::create("Test Vault", test_key(), fast_config())
            .expect("failed to create database");
        Self {
            db,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Creates a vault with a small populated tree, saved to disk.
    ///
    /// Layout: `Internet/{Example, Forum}` and `Banking/Checking`, with
    /// `Internet/Example` carrying username and password attributes.
    #[must_use]
    pub fn populated() -> Self {
        let mut vault = Self::empty();
        let root = vault.db.root_id().expect("fresh vault is unlocked");
        let internet = vault.db.add_group(root, "Internet").expect("add group");
        let banking = vault.db.add_group(root, "Banking").expect("add group");
        let example = vault.db.add_entry(internet, "Example").expect("add entry");
        vault.db.add_entry(internet, "Forum").expect("add entry");
        vault.db.add_entry(banking, "Checking").expect("add entry");
        vault
            .db
            .set_entry_attribute(example, attr::USERNAME, Attribute::plain("alice"))
            .expect("set attribute");
        vault
            .db
            .set_entry_attribute(example, attr::PASSWORD, Attribute::protected("hunter2"))
            .expect("set attribute");
        vault.save();
        vault
    }

    /// Saves the vault to its path.
    pub fn save(&mut self) {
        self.db
            .save(&self.path, &TransformControl::new())
            .expect("failed to save vault");
    }

    /// Re-opens the on-disk file with the fixture key.
    #[must_use]
    pub fn reopen(&self) -> Database {
        Database::unlock(&self.path, test_key(), &TransformControl::new())
            .expect("failed to unlock vault")
    }

    /// The raw bytes currently on disk.
    #[must_use]
    pub fn disk_bytes(&self) -> Vec<u8> {
        std::fs::read(&self.path).expect("failed to read vault file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populated_vault_roundtrips() {
        let vault = TestVault::populated();
        let db = vault.reopen();
        let entry = db.find_by_path("Internet/Example").unwrap();
        assert_eq!(entry.username(), "alice");
        assert_eq!(entry.password(), "hunter2");
    }
}
