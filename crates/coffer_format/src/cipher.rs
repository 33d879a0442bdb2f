//! Body cipher selection and AEAD operations.

use crate::error::{FormatError, FormatResult};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::XChaCha20Poly1305;

/// Size of the body encryption key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of the AEAD authentication tag in bytes (both ciphers).
pub const TAG_SIZE: usize = 16;

/// Identifies the AEAD cipher protecting the container body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CipherId {
    /// AES-256 in GCM mode, 12-byte nonce.
    Aes256Gcm = 1,
    /// XChaCha20-Poly1305, 24-byte nonce.
    XChaCha20Poly1305 = 2,
}

impl CipherId {
    /// Converts a header byte to a cipher id.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Aes256Gcm),
            2 => Some(Self::XChaCha20Poly1305),
            _ => None,
        }
    }

    /// Converts the cipher id to its header byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Nonce size required by this cipher, in bytes.
    #[must_use]
    pub const fn nonce_len(self) -> usize {
        match self {
            Self::Aes256Gcm => 12,
            Self::XChaCha20Poly1305 => 24,
        }
    }

    /// Seals `plaintext` with this cipher, authenticating `aad` alongside it.
    pub(crate) fn seal(
        self,
        key: &[u8; KEY_SIZE],
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> FormatResult<Vec<u8>> {
        debug_assert_eq!(nonce.len(), self.nonce_len());
        let payload = Payload {
            msg: plaintext,
            aad,
        };
        let out = match self {
            Self::Aes256Gcm => Aes256Gcm::new(key.into())
                .encrypt(nonce.into(), payload)
                .map_err(|_| FormatError::integrity("body encryption failed"))?,
            Self::XChaCha20Poly1305 => XChaCha20Poly1305::new(key.into())
                .encrypt(nonce.into(), payload)
                .map_err(|_| FormatError::integrity("body encryption failed"))?,
        };
        Ok(out)
    }

    /// Opens `ciphertext`, verifying the tag and `aad` before any plaintext
    /// is returned.
    pub(crate) fn open(
        self,
        key: &[u8; KEY_SIZE],
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> FormatResult<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(FormatError::truncated("body shorter than AEAD tag"));
        }
        let payload = Payload {
            msg: ciphertext,
            aad,
        };
        // A wrong key and a corrupted body produce the same error on purpose.
        let out = match self {
            Self::Aes256Gcm => Aes256Gcm::new(key.into())
                .decrypt(nonce.into(), payload)
                .map_err(|_| FormatError::integrity("body authentication failed"))?,
            Self::XChaCha20Poly1305 => XChaCha20Poly1305::new(key.into())
                .decrypt(nonce.into(), payload)
                .map_err(|_| FormatError::integrity("body authentication failed"))?,
        };
        Ok(out)
    }
}

/// Identifies the compression applied to the body before encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionId {
    /// No compression.
    None = 0,
    /// Zstandard.
    Zstd = 1,
}

impl CompressionId {
    /// Converts a header byte to a compression id.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::None),
            1 => Some(Self::Zstd),
            _ => None,
        }
    }

    /// Converts the compression id to its header byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cipher_id_roundtrip() {
        for c in [CipherId::Aes256Gcm, CipherId::XChaCha20Poly1305] {
            assert_eq!(CipherId::from_byte(c.as_byte()), Some(c));
        }
        assert_eq!(CipherId::from_byte(0), None);
        assert_eq!(CipherId::from_byte(3), None);
    }

    #[test]
    fn compression_id_roundtrip() {
        for c in [CompressionId::None, CompressionId::Zstd] {
            assert_eq!(CompressionId::from_byte(c.as_byte()), Some(c));
        }
        assert_eq!(CompressionId::from_byte(7), None);
    }

    #[test]
    fn seal_open_roundtrip_both_ciphers() {
        let key = [0x42u8; KEY_SIZE];
        for cipher in [CipherId::Aes256Gcm, CipherId::XChaCha20Poly1305] {
            let nonce = vec![7u8; cipher.nonce_len()];
            let sealed = cipher.seal(&key, &nonce, b"aad", b"secret").unwrap();
            assert_ne!(&sealed[..6.min(sealed.len())], b"secret");
            let opened = cipher.open(&key, &nonce, b"aad", &sealed).unwrap();
            assert_eq!(opened, b"secret");
        }
    }

    #[test]
    fn open_rejects_wrong_aad() {
        let key = [1u8; KEY_SIZE];
        let cipher = CipherId::XChaCha20Poly1305;
        let nonce = vec![0u8; cipher.nonce_len()];
        let sealed = cipher.seal(&key, &nonce, b"right", b"data").unwrap();
        let err = cipher.open(&key, &nonce, b"wrong", &sealed).unwrap_err();
        assert!(matches!(err, FormatError::Integrity { .. }));
    }

    #[test]
    fn open_rejects_short_input() {
        let key = [1u8; KEY_SIZE];
        let cipher = CipherId::Aes256Gcm;
        let nonce = vec![0u8; cipher.nonce_len()];
        let err = cipher.open(&key, &nonce, b"", &[0u8; 4]).unwrap_err();
        assert!(matches!(err, FormatError::Io(_)));
    }
}
