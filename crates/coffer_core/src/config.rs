//! Database configuration.

use coffer_format::{CipherId, CompressionId, FormatResult, KdfAlgorithmId, KdfParams};

/// Tunable settings for a database, applied at creation time and on every
/// save. All setters are chainable and usable in `const` context.
///
/// ```
/// use coffer_core::DatabaseConfig;
///
/// const CONFIG: DatabaseConfig = DatabaseConfig::new()
///     .kdf_memory_kib(128 * 1024)
///     .kdf_time_cost(4)
///     .backup_on_save(true);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Body cipher. Default: XChaCha20-Poly1305.
    pub cipher: CipherId,
    /// Body compression. Default: zstd.
    pub compression: CompressionId,
    /// Argon2id memory cost in KiB. Default: 64 MiB.
    pub kdf_memory_kib: u32,
    /// Argon2id passes. Default: 3.
    pub kdf_time_cost: u32,
    /// Argon2id lanes. Default: 4.
    pub kdf_parallelism: u32,
    /// Whether saves keep a `.bak` copy of the previous file. Default: off.
    pub backup_on_save: bool,
}

impl DatabaseConfig {
    /// Creates a configuration with the defaults above.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cipher: CipherId::XChaCha20Poly1305,
            compression: CompressionId::Zstd,
            kdf_memory_kib: 64 * 1024,
            kdf_time_cost: 3,
            kdf_parallelism: 4,
            backup_on_save: false,
        }
    }

    /// Sets the body cipher.
    #[must_use]
    pub const fn cipher(mut self, cipher: CipherId) -> Self {
        self.cipher = cipher;
        self
    }

    /// Sets the body compression.
    #[must_use]
    pub const fn compression(mut self, compression: CompressionId) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the Argon2id memory cost in KiB.
    #[must_use]
    pub const fn kdf_memory_kib(mut self, kib: u32) -> Self {
        self.kdf_memory_kib = kib;
        self
    }

    /// Sets the Argon2id pass count.
    #[must_use]
    pub const fn kdf_time_cost(mut self, passes: u32) -> Self {
        self.kdf_time_cost = passes;
        self
    }

    /// Sets the Argon2id lane count.
    #[must_use]
    pub const fn kdf_parallelism(mut self, lanes: u32) -> Self {
        self.kdf_parallelism = lanes;
        self
    }

    /// Enables or disables the `.bak` copy on save.
    #[must_use]
    pub const fn backup_on_save(mut self, enabled: bool) -> Self {
        self.backup_on_save = enabled;
        self
    }

    /// Produces KDF parameters with a fresh random salt, validated
    /// against the format's sanity bounds.
    pub fn generate_kdf_params(&self) -> FormatResult<KdfParams> {
        KdfParams::generate(
            KdfAlgorithmId::Argon2id,
            self.kdf_memory_kib,
            self.kdf_time_cost,
            self.kdf_parallelism,
        )
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new()
    }
}
