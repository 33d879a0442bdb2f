//! Composite key: ordered combination of credential factors.

use crate::error::{CoreError, CoreResult};
use crate::keys::factor::{FactorKind, KeyFactor, FACTOR_DIGEST_LEN};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Raw key material produced by combining all factors.
pub type RawKeyMaterial = Zeroizing<[u8; FACTOR_DIGEST_LEN]>;

/// An ordered set of credential factors.
///
/// Order is significant: the same factors added in a different order
/// produce different key material, so unlock must add factors in the
/// order used at encryption time.
#[derive(Default)]
pub struct CompositeKey {
    factors: Vec<Box<dyn KeyFactor>>,
}

impl CompositeKey {
    /// Creates an empty composite key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one factor. Order is significant.
    pub fn add_factor(&mut self, factor: impl KeyFactor + 'static) {
        self.factors.push(Box::new(factor));
    }

    /// Builder-style variant of [`add_factor`](Self::add_factor).
    #[must_use]
    pub fn with_factor(mut self, factor: impl KeyFactor + 'static) -> Self {
        self.add_factor(factor);
        self
    }

    /// Returns the number of factors.
    #[must_use]
    pub fn factor_count(&self) -> usize {
        self.factors.len()
    }

    /// Returns the kinds of the factors, in order.
    #[must_use]
    pub fn factor_kinds(&self) -> Vec<FactorKind> {
        self.factors.iter().map(|f| f.kind()).collect()
    }

    /// Combines all factor contributions into raw key material.
    ///
    /// Deterministic: SHA-256 over the concatenation of each factor's
    /// digest, in insertion order.
    ///
    /// # Errors
    ///
    /// [`CoreError::NoKeyFactors`] if no factor has been added; factor
    /// errors (unreadable key file, failed challenge) are propagated.
    pub fn raw_key_material(&self) -> CoreResult<RawKeyMaterial> {
        if self.factors.is_empty() {
            return Err(CoreError::NoKeyFactors);
        }

        let mut hasher = Sha256::new();
        for factor in &self.factors {
            let digest = factor.digest()?;
            hasher.update(&digest[..]);
        }
        Ok(Zeroizing::new(hasher.finalize().into()))
    }
}

impl std::fmt::Debug for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeKey")
            .field("factors", &self.factor_kinds())
            .finish()
    }
}
