//! Key derivation: stretching raw key material into a transformed key.
//!
//! Argon2id is the sole deterrent against offline password guessing, so
//! derivation cost is read from the container header on unlock and chosen
//! by the caller (with enforced minimums) when creating or re-keying a
//! database.
//!
//! The `argon2` crate exposes no mid-derivation callback, so the time
//! cost is spent as that many chained single-pass invocations: the output
//! of pass N is the input material of pass N+1, with the same salt,
//! memory cost, and parallelism. The result is deterministic, and the
//! engine checks the cancel token and reports progress between passes.

use crate::control::TransformControl;
use crate::error::{CoreError, CoreResult};
use crate::keys::composite::RawKeyMaterial;
use argon2::{Algorithm, Argon2, Params, Version};
use coffer_format::{KdfAlgorithmId, KdfParams};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Size of the transformed key in bytes.
pub const TRANSFORMED_KEY_LEN: usize = 32;

/// The output of key derivation, used directly for body encryption.
///
/// Zeroed on drop; `Debug` never reveals the bytes.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct TransformedKey {
    bytes: [u8; TRANSFORMED_KEY_LEN],
}

impl TransformedKey {
    /// Returns the key bytes.
    ///
    /// # Security
    ///
    /// Never log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; TRANSFORMED_KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for TransformedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derives a transformed key from raw key material.
///
/// Deterministic: identical material and parameters always yield an
/// identical key.
///
/// # Errors
///
/// - [`CoreError::KeyDerivation`] for out-of-bounds parameters or Argon2
///   failure (e.g. memory exhaustion);
/// - [`CoreError::Cancelled`] if the control's token was cancelled; no
///   partial key is ever returned and intermediate buffers are wiped.
pub fn derive(
    raw: &RawKeyMaterial,
    params: &KdfParams,
    control: &TransformControl,
) -> CoreResult<TransformedKey> {
    params
        .validate()
        .map_err(|e| CoreError::key_derivation(e.to_string()))?;

    match params.algorithm {
        KdfAlgorithmId::Argon2id => derive_argon2id(raw, params, control),
    }
}

fn derive_argon2id(
    raw: &RawKeyMaterial,
    params: &KdfParams,
    control: &TransformControl,
) -> CoreResult<TransformedKey> {
    let argon_params = Params::new(
        params.memory_kib,
        1, // single pass per invocation; passes are chained below
        params.parallelism,
        Some(TRANSFORMED_KEY_LEN),
    )
    .map_err(|e| CoreError::key_derivation(format!("bad Argon2 parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let total = params.time_cost;
    let mut material = Zeroizing::new(**raw);

    for pass in 0..total {
        control.check_cancelled()?;

        let mut out = Zeroizing::new([0u8; TRANSFORMED_KEY_LEN]);
        argon2
            .hash_password_into(&material[..], &params.salt, &mut out[..])
            .map_err(|e| CoreError::key_derivation(format!("Argon2 failed: {e}")))?;
        material = out;

        control.report(pass + 1, total);
    }

    Ok(TransformedKey { bytes: *material })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::CancelToken;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn test_params(time_cost: u32) -> KdfParams {
        KdfParams {
            algorithm: KdfAlgorithmId::Argon2id,
            memory_kib: 16,
            time_cost,
            parallelism: 1,
            salt: [0x11; 32],
        }
    }

    fn material(byte: u8) -> RawKeyMaterial {
        Zeroizing::new([byte; 32])
    }

    #[test]
    fn derivation_is_deterministic() {
        let control = TransformControl::new();
        let a = derive(&material(1), &test_params(2), &control).unwrap();
        let b = derive(&material(1), &test_params(2), &control).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_material_different_key() {
        let control = TransformControl::new();
        let a = derive(&material(1), &test_params(2), &control).unwrap();
        let b = derive(&material(2), &test_params(2), &control).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn salt_affects_output() {
        let control = TransformControl::new();
        let mut p1 = test_params(1);
        let mut p2 = test_params(1);
        p1.salt = [1; 32];
        p2.salt = [2; 32];
        let a = derive(&material(1), &p1, &control).unwrap();
        let b = derive(&material(1), &p2, &control).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn time_cost_affects_output() {
        let control = TransformControl::new();
        let a = derive(&material(1), &test_params(1), &control).unwrap();
        let b = derive(&material(1), &test_params(3), &control).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn invalid_params_rejected() {
        let control = TransformControl::new();
        let mut params = test_params(1);
        params.time_cost = 0;
        assert!(matches!(
            derive(&material(1), &params, &control),
            Err(CoreError::KeyDerivation { .. })
        ));
    }

    #[test]
    fn cancellation_returns_no_key() {
        let token = CancelToken::new();
        token.cancel();
        let control = TransformControl::with_cancel(token);
        assert!(matches!(
            derive(&material(1), &test_params(3), &control),
            Err(CoreError::Cancelled)
        ));
    }

    #[test]
    fn cancellation_mid_derivation() {
        let token = CancelToken::new();
        let cancel_after = token.clone();
        let control = TransformControl::with_cancel(token).with_progress(move |done, _| {
            if done == 1 {
                cancel_after.cancel();
            }
        });
        assert!(matches!(
            derive(&material(1), &test_params(4), &control),
            Err(CoreError::Cancelled)
        ));
    }

    #[test]
    fn progress_reports_every_pass() {
        let count = Arc::new(AtomicU32::new(0));
        let sink = Arc::clone(&count);
        let control = TransformControl::new().with_progress(move |done, total| {
            assert_eq!(total, 3);
            sink.store(done, Ordering::SeqCst);
        });
        derive(&material(1), &test_params(3), &control).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn debug_redacts_key() {
        let control = TransformControl::new();
        let key = derive(&material(1), &test_params(1), &control).unwrap();
        assert!(format!("{key:?}").contains("REDACTED"));
    }
}
