//! # Coffer Format
//!
//! Versioned, authenticated container format for Coffer databases.
//!
//! A container is a plaintext header (magic, version, cipher id, key
//! derivation parameters, salt, nonce, stream start bytes) followed by an
//! AEAD-sealed, optionally zstd-compressed body holding the serialized
//! credential tree. The encoded header is the AEAD associated data, so
//! every header field that affects decryption is integrity-protected.
//!
//! ## Reading
//!
//! ```ignore
//! use coffer_format::{decrypt_body, Header};
//!
//! let (header, body_offset) = Header::read(&bytes)?;
//! // derive the 32-byte key from header.kdf ...
//! let plaintext = decrypt_body(&header, &key, &bytes[body_offset..])?;
//! ```
//!
//! Unknown versions or algorithm ids fail closed with
//! [`FormatError::UnsupportedVersion`]; a wrong key and a tampered body
//! are deliberately indistinguishable ([`FormatError::Integrity`]).

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod body;
mod cipher;
mod error;
mod header;

pub use body::{decrypt_body, encrypt_body, write_container};
pub use cipher::{CipherId, CompressionId, KEY_SIZE, TAG_SIZE};
pub use error::{FormatError, FormatResult};
pub use header::{
    Header, KdfAlgorithmId, KdfParams, FORMAT_VERSION, MAGIC, SALT_LEN, START_BYTES_LEN,
};
