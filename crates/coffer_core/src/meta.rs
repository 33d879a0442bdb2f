//! Database-wide settings.

use crate::times::now_millis;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retention policy for entry history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryPolicy {
    /// Maximum number of prior versions per entry; `None` = unlimited.
    pub max_items: Option<usize>,
    /// Maximum total size of an entry's history in bytes; `None` =
    /// unlimited.
    pub max_total_bytes: Option<usize>,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            max_items: Some(10),
            max_total_bytes: Some(6 * 1024 * 1024),
        }
    }
}

/// Database-wide metadata, stored inside the encrypted body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    /// Database name.
    pub name: String,
    /// Database description.
    pub description: String,
    /// Default user name for new entries.
    pub default_username: String,
    /// Whether deletions go to the recycle bin first.
    pub recycle_bin_enabled: bool,
    /// The recycle bin group, once it has been created.
    pub recycle_bin_group: Option<Uuid>,
    /// Entry history retention.
    pub history: HistoryPolicy,
    /// When the metadata was last changed (Unix millis).
    pub last_modified: u64,
}

impl Metadata {
    /// Creates metadata for a new database.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            default_username: String::new(),
            recycle_bin_enabled: true,
            recycle_bin_group: None,
            history: HistoryPolicy::default(),
            last_modified: now_millis(),
        }
    }

    /// Marks the metadata as changed.
    pub fn touch(&mut self) {
        self.last_modified = now_millis();
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new("")
    }
}
