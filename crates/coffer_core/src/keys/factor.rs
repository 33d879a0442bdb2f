//! Individual credential factors.
//!
//! Each factor contributes a fixed 32-byte digest to the composite key.
//! Factors never appear in the serialized container; key files and
//! challenge responders stay outside the engine, only their digests are
//! held, and those are wiped on drop.

use crate::error::{CoreError, CoreResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use zeroize::Zeroizing;

/// Length of a factor's contribution in bytes.
pub const FACTOR_DIGEST_LEN: usize = 32;

/// The kind of a credential factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorKind {
    /// A user-supplied password.
    Password,
    /// A key file on disk.
    KeyFile,
    /// An external challenge-response device.
    Challenge,
}

/// One independent credential factor.
pub trait KeyFactor: Send + Sync {
    /// The kind of this factor.
    fn kind(&self) -> FactorKind;

    /// This factor's 32-byte contribution to the composite key.
    fn digest(&self) -> CoreResult<Zeroizing<[u8; FACTOR_DIGEST_LEN]>>;
}

/// A password factor. The password itself is wiped on drop.
pub struct PasswordFactor {
    password: Zeroizing<String>,
}

impl PasswordFactor {
    /// Creates a factor from a password.
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: Zeroizing::new(password.into()),
        }
    }
}

impl KeyFactor for PasswordFactor {
    fn kind(&self) -> FactorKind {
        FactorKind::Password
    }

    fn digest(&self) -> CoreResult<Zeroizing<[u8; FACTOR_DIGEST_LEN]>> {
        Ok(Zeroizing::new(
            Sha256::digest(self.password.as_bytes()).into(),
        ))
    }
}

impl std::fmt::Debug for PasswordFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordFactor")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A key file factor.
///
/// The file contents are interpreted as:
/// - exactly 32 raw bytes: used verbatim;
/// - exactly 64 hexadecimal characters: decoded to 32 bytes;
/// - anything else: SHA-256 of the contents.
///
/// Only the resulting digest is retained.
pub struct KeyFileFactor {
    digest: Zeroizing<[u8; FACTOR_DIGEST_LEN]>,
}

impl KeyFileFactor {
    /// Loads a key file from disk.
    pub fn from_path(path: &Path) -> CoreResult<Self> {
        let contents = Zeroizing::new(fs::read(path)?);
        Ok(Self::from_bytes(&contents))
    }

    /// Creates a factor from raw key file contents.
    #[must_use]
    pub fn from_bytes(contents: &[u8]) -> Self {
        let digest = if contents.len() == FACTOR_DIGEST_LEN {
            let mut out = [0u8; FACTOR_DIGEST_LEN];
            out.copy_from_slice(contents);
            out
        } else if let Some(decoded) = decode_hex_key(contents) {
            decoded
        } else {
            Sha256::digest(contents).into()
        };
        Self {
            digest: Zeroizing::new(digest),
        }
    }
}

impl KeyFactor for KeyFileFactor {
    fn kind(&self) -> FactorKind {
        FactorKind::KeyFile
    }

    fn digest(&self) -> CoreResult<Zeroizing<[u8; FACTOR_DIGEST_LEN]>> {
        Ok(self.digest.clone())
    }
}

impl std::fmt::Debug for KeyFileFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyFileFactor")
            .field("digest", &"[REDACTED]")
            .finish()
    }
}

/// Decodes a 64-character hex key file, tolerating a trailing newline.
fn decode_hex_key(contents: &[u8]) -> Option<[u8; FACTOR_DIGEST_LEN]> {
    let trimmed = std::str::from_utf8(contents).ok()?.trim();
    if trimmed.len() != FACTOR_DIGEST_LEN * 2 {
        return None;
    }
    let decoded = hex::decode(trimmed).ok()?;
    let mut out = [0u8; FACTOR_DIGEST_LEN];
    out.copy_from_slice(&decoded);
    Some(out)
}

/// Responder closure for challenge factors.
pub type ChallengeResponder =
    dyn Fn() -> CoreResult<Zeroizing<[u8; FACTOR_DIGEST_LEN]>> + Send + Sync;

/// An external challenge-response factor.
///
/// The engine never owns the device secret; it invokes the supplied
/// responder whenever the contribution is needed.
pub struct ChallengeFactor {
    responder: Box<ChallengeResponder>,
}

impl ChallengeFactor {
    /// Creates a factor backed by the given responder.
    pub fn new(
        responder: impl Fn() -> CoreResult<Zeroizing<[u8; FACTOR_DIGEST_LEN]>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
        }
    }
}

impl KeyFactor for ChallengeFactor {
    fn kind(&self) -> FactorKind {
        FactorKind::Challenge
    }

    fn digest(&self) -> CoreResult<Zeroizing<[u8; FACTOR_DIGEST_LEN]>> {
        (self.responder)().map_err(|e| {
            CoreError::key_derivation(format!("challenge responder failed: {e}"))
        })
    }
}

impl std::fmt::Debug for ChallengeFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeFactor").finish_non_exhaustive()
    }
}
