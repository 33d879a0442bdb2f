//! Node timestamps.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time as Unix milliseconds.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Creation, modification, and access timestamps (Unix milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Times {
    /// When the node was created.
    pub created: u64,
    /// When the node was last modified.
    pub modified: u64,
    /// When the node was last accessed.
    pub accessed: u64,
}

impl Times {
    /// Creates timestamps set to now.
    #[must_use]
    pub fn now() -> Self {
        let t = now_millis();
        Self {
            created: t,
            modified: t,
            accessed: t,
        }
    }

    /// Updates the modification (and access) timestamp.
    pub fn touch_modified(&mut self) {
        let t = now_millis();
        self.modified = t;
        self.accessed = t;
    }

    /// Updates the access timestamp only.
    pub fn touch_accessed(&mut self) {
        self.accessed = now_millis();
    }
}

impl Default for Times {
    fn default() -> Self {
        Self::now()
    }
}
