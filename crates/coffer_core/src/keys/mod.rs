//! Credential factors, composite key, and key derivation.
//!
//! Unlock flow: factors → [`CompositeKey::raw_key_material`] →
//! [`kdf::derive`] with the parameters stored in the container header →
//! [`TransformedKey`] for the body cipher. All intermediate secrets are
//! wiped on drop; nothing here is ever serialized.

mod composite;
mod factor;
pub mod kdf;

pub use composite::{CompositeKey, RawKeyMaterial};
pub use factor::{
    ChallengeFactor, ChallengeResponder, FactorKind, KeyFactor, KeyFileFactor, PasswordFactor,
    FACTOR_DIGEST_LEN,
};
pub use kdf::{TransformedKey, TRANSFORMED_KEY_LEN};
