//! Plaintext container header.
//!
//! The header is stored in the clear (it must be readable before the key
//! can be derived) but every byte of it is authenticated: the encoded
//! header is the associated data of the body AEAD, so tampering with any
//! field that affects decryption fails the integrity check.

use crate::cipher::{CipherId, CompressionId};
use crate::error::{FormatError, FormatResult};
use rand::rngs::OsRng;
use rand::RngCore;

/// Magic bytes identifying a Coffer container.
pub const MAGIC: [u8; 4] = *b"CFDB";

/// Current container format version.
pub const FORMAT_VERSION: u16 = 1;

/// Size of the key derivation salt in bytes.
pub const SALT_LEN: usize = 32;

/// Size of the stream-start verification bytes.
pub const START_BYTES_LEN: usize = 32;

/// Identifies the key derivation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KdfAlgorithmId {
    /// Argon2id, version 0x13.
    Argon2id = 1,
}

impl KdfAlgorithmId {
    /// Converts a header byte to a KDF algorithm id.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Argon2id),
            _ => None,
        }
    }

    /// Converts the algorithm id to its header byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Key derivation parameters, stored in the clear so the same file always
/// re-derives the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    /// Derivation algorithm.
    pub algorithm: KdfAlgorithmId,
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
    /// Per-container random salt.
    pub salt: [u8; SALT_LEN],
}

impl KdfParams {
    /// Minimum memory cost in KiB per lane.
    pub const MIN_MEMORY_KIB: u32 = 8;
    /// Upper sanity bound on memory cost (4 GiB).
    pub const MAX_MEMORY_KIB: u32 = 4 * 1024 * 1024;
    /// Upper sanity bound on passes.
    pub const MAX_TIME_COST: u32 = 5000;
    /// Upper sanity bound on parallelism.
    pub const MAX_PARALLELISM: u32 = 64;

    /// Creates parameters with a freshly generated random salt.
    pub fn generate(
        algorithm: KdfAlgorithmId,
        memory_kib: u32,
        time_cost: u32,
        parallelism: u32,
    ) -> FormatResult<Self> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let params = Self {
            algorithm,
            memory_kib,
            time_cost,
            parallelism,
            salt,
        };
        params.validate()?;
        Ok(params)
    }

    /// Validates cost parameters against the enforced minimums and sanity
    /// bounds. Out-of-bounds values in a parsed header are treated as
    /// corruption.
    pub fn validate(&self) -> FormatResult<()> {
        if self.time_cost < 1 || self.time_cost > Self::MAX_TIME_COST {
            return Err(FormatError::integrity("KDF time cost out of bounds"));
        }
        if self.parallelism < 1 || self.parallelism > Self::MAX_PARALLELISM {
            return Err(FormatError::integrity("KDF parallelism out of bounds"));
        }
        if self.memory_kib > Self::MAX_MEMORY_KIB {
            return Err(FormatError::integrity("KDF memory cost out of bounds"));
        }
        if self.memory_kib < Self::MIN_MEMORY_KIB * self.parallelism {
            return Err(FormatError::integrity(
                "KDF memory cost below minimum for parallelism",
            ));
        }
        Ok(())
    }
}

/// Parsed container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Format version.
    pub version: u16,
    /// Body cipher.
    pub cipher: CipherId,
    /// Body compression.
    pub compression: CompressionId,
    /// Key derivation parameters.
    pub kdf: KdfParams,
    /// Body nonce; length matches `cipher.nonce_len()`.
    pub nonce: Vec<u8>,
    /// Random bytes repeated at the front of the plaintext body.
    pub start_bytes: [u8; START_BYTES_LEN],
}

impl Header {
    /// Creates a header for a full rewrite: fresh nonce and start bytes.
    ///
    /// Salts and nonces are never reused across encryptions; callers must
    /// pair this with freshly generated [`KdfParams`] when re-encrypting
    /// under the same credentials.
    #[must_use]
    pub fn generate(cipher: CipherId, compression: CompressionId, kdf: KdfParams) -> Self {
        let mut nonce = vec![0u8; cipher.nonce_len()];
        OsRng.fill_bytes(&mut nonce);
        let mut start_bytes = [0u8; START_BYTES_LEN];
        OsRng.fill_bytes(&mut start_bytes);
        Self {
            version: FORMAT_VERSION,
            cipher,
            compression,
            kdf,
            nonce,
            start_bytes,
        }
    }

    /// Encodes the header to its wire form.
    #[must_use]
    pub fn write(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.nonce.len());
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.push(self.cipher.as_byte());
        buf.push(self.compression.as_byte());
        buf.push(self.kdf.algorithm.as_byte());
        buf.extend_from_slice(&self.kdf.memory_kib.to_le_bytes());
        buf.extend_from_slice(&self.kdf.time_cost.to_le_bytes());
        buf.extend_from_slice(&self.kdf.parallelism.to_le_bytes());
        buf.extend_from_slice(&self.kdf.salt);
        buf.push(self.nonce.len() as u8);
        buf.extend_from_slice(&self.nonce);
        buf.extend_from_slice(&self.start_bytes);
        buf
    }

    /// Parses a header from the front of `data`.
    ///
    /// Returns the header and the offset at which the body begins.
    ///
    /// # Errors
    ///
    /// - Truncated input: [`FormatError::Io`] with `UnexpectedEof`.
    /// - Unknown version, cipher, compression, or KDF algorithm:
    ///   [`FormatError::UnsupportedVersion`] (fail closed).
    /// - Bad magic or out-of-bounds fields: [`FormatError::Integrity`].
    pub fn read(data: &[u8]) -> FormatResult<(Self, usize)> {
        let mut cursor = Cursor::new(data);

        let magic = cursor.take::<4>("magic")?;
        if magic != MAGIC {
            return Err(FormatError::integrity("bad magic bytes"));
        }

        let version = u16::from_le_bytes(cursor.take::<2>("version")?);
        if version != FORMAT_VERSION {
            return Err(FormatError::unsupported(
                format!("format version {version}"),
                format!("version {FORMAT_VERSION}"),
            ));
        }

        let cipher_byte = cursor.byte("cipher id")?;
        let cipher = CipherId::from_byte(cipher_byte).ok_or_else(|| {
            FormatError::unsupported(
                format!("cipher id {cipher_byte}"),
                "AES-256-GCM (1), XChaCha20-Poly1305 (2)",
            )
        })?;

        let compression_byte = cursor.byte("compression id")?;
        let compression = CompressionId::from_byte(compression_byte).ok_or_else(|| {
            FormatError::unsupported(
                format!("compression id {compression_byte}"),
                "none (0), zstd (1)",
            )
        })?;

        let kdf_byte = cursor.byte("KDF algorithm id")?;
        let algorithm = KdfAlgorithmId::from_byte(kdf_byte).ok_or_else(|| {
            FormatError::unsupported(format!("KDF algorithm id {kdf_byte}"), "Argon2id (1)")
        })?;

        let memory_kib = u32::from_le_bytes(cursor.take::<4>("KDF memory cost")?);
        let time_cost = u32::from_le_bytes(cursor.take::<4>("KDF time cost")?);
        let parallelism = u32::from_le_bytes(cursor.take::<4>("KDF parallelism")?);
        let salt = cursor.take::<SALT_LEN>("KDF salt")?;

        let kdf = KdfParams {
            algorithm,
            memory_kib,
            time_cost,
            parallelism,
            salt,
        };
        kdf.validate()?;

        let nonce_len = cursor.byte("nonce length")? as usize;
        if nonce_len != cipher.nonce_len() {
            return Err(FormatError::integrity("nonce length does not match cipher"));
        }
        let nonce = cursor.slice(nonce_len, "nonce")?.to_vec();
        let start_bytes = cursor.take::<START_BYTES_LEN>("start bytes")?;

        Ok((
            Self {
                version,
                cipher,
                compression,
                kdf,
                nonce,
                start_bytes,
            },
            cursor.position(),
        ))
    }
}

/// Bounds-checked sequential reader over the header bytes.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn slice(&mut self, len: usize, context: &str) -> FormatResult<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(FormatError::truncated(context));
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn take<const N: usize>(&mut self, context: &str) -> FormatResult<[u8; N]> {
        let slice = self.slice(N, context)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn byte(&mut self, context: &str) -> FormatResult<u8> {
        Ok(self.slice(1, context)?[0])
    }
}
