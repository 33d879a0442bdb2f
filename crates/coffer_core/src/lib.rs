//! # Coffer Core
//!
//! Engine for local, encrypted credential databases: composite keys,
//! memory-hard key derivation, a hierarchical entry tree with recycle
//! bin semantics, and crash-safe persistence on top of the
//! [`coffer_format`] container.
//!
//! ```no_run
//! use coffer_core::{
//!     Attribute, CompositeKey, Database, DatabaseConfig, PasswordFactor,
//!     TransformControl,
//! };
//!
//! # fn main() -> coffer_core::CoreResult<()> {
//! let key = CompositeKey::new().with_factor(PasswordFactor::new("correct horse"));
//! let mut db = Database::create("Personal", key, DatabaseConfig::new())?;
//! let root = db.root_id()?;
//! let internet = db.add_group(root, "Internet")?;
//! let entry = db.add_entry(internet, "Example")?;
//! db.set_entry_attribute(entry, "Password", Attribute::protected("hunter2"))?;
//! db.save("personal.cfdb", &TransformControl::new())?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod control;
mod database;
mod error;
pub mod keys;
mod meta;
mod payload;
mod times;
pub mod tree;
mod writer;

pub use config::DatabaseConfig;
pub use control::{CancelToken, TransformControl};
pub use database::{Database, DatabaseState};
pub use error::{CoreError, CoreResult};
pub use keys::kdf::{TransformedKey, TRANSFORMED_KEY_LEN};
pub use keys::{
    ChallengeFactor, CompositeKey, FactorKind, KeyFactor, KeyFileFactor, PasswordFactor,
    RawKeyMaterial,
};
pub use meta::{HistoryPolicy, Metadata};
pub use times::Times;
pub use tree::{
    attr, Attribute, Entry, EntrySnapshot, EntryTree, Group, RemovalOutcome, RECYCLE_BIN_NAME,
};
pub use writer::{SaveStep, StepObserver, TransactionalWriter, WriteOptions};
