//! # Coffer Testkit
//!
//! Test utilities for Coffer.
//!
//! This crate provides:
//! - Test fixtures: temp-dir vaults with fast KDF settings
//! - Property-based generators for trees and attributes using proptest
//! - A crash harness that aborts saves at each milestone and checks the
//!   on-disk file afterwards
//!
//! ## Usage
//!
//! ```rust,ignore
//! use coffer_testkit::prelude::*;
//!
//! #[test]
//! fn survives_crash_before_rename() {
//!     let vault = TestVault::populated();
//!     // ... drive CrashHarness against it
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
