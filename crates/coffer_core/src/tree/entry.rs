//! Entry nodes: attributes, attachments, and history.

use crate::meta::HistoryPolicy;
use crate::times::Times;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Well-known attribute keys.
pub mod attr {
    /// Entry title.
    pub const TITLE: &str = "Title";
    /// Account user name.
    pub const USERNAME: &str = "UserName";
    /// Account password.
    pub const PASSWORD: &str = "Password";
    /// Associated URL.
    pub const URL: &str = "URL";
    /// Free-form notes.
    pub const NOTES: &str = "Notes";
}

/// A single attribute value.
///
/// Protected attributes are wiped on drop and redacted from `Debug`
/// output; they are only ever plaintext inside an unlocked database.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Attribute {
    /// The attribute value.
    pub value: String,
    /// Whether the value is sensitive.
    #[zeroize(skip)]
    pub protected: bool,
}

impl Attribute {
    /// Creates a plain attribute.
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            protected: false,
        }
    }

    /// Creates a protected attribute.
    pub fn protected(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            protected: true,
        }
    }
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value: &dyn std::fmt::Debug = if self.protected {
            &"[PROTECTED]"
        } else {
            &self.value
        };
        f.debug_struct("Attribute")
            .field("value", value)
            .field("protected", &self.protected)
            .finish()
    }
}

/// A prior version of an entry, kept in its history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntrySnapshot {
    /// Attribute map at snapshot time.
    pub attributes: BTreeMap<String, Attribute>,
    /// Attachments at snapshot time.
    pub attachments: BTreeMap<String, Vec<u8>>,
    /// Timestamps at snapshot time.
    pub times: Times,
}

impl EntrySnapshot {
    fn approximate_size(&self) -> usize {
        let attrs: usize = self
            .attributes
            .iter()
            .map(|(k, v)| k.len() + v.value.len())
            .sum();
        let blobs: usize = self.attachments.iter().map(|(k, v)| k.len() + v.len()).sum();
        attrs + blobs
    }
}

/// An entry: a leaf credential record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    id: Uuid,
    parent: Uuid,
    attributes: BTreeMap<String, Attribute>,
    attachments: BTreeMap<String, Vec<u8>>,
    times: Times,
    history: Vec<EntrySnapshot>,
}

impl Entry {
    pub(crate) fn new(parent: Uuid, title: impl Into<String>) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(attr::TITLE.to_string(), Attribute::plain(title));
        Self {
            id: Uuid::new_v4(),
            parent,
            attributes,
            attachments: BTreeMap::new(),
            times: Times::now(),
            history: Vec::new(),
        }
    }

    /// Stable unique identifier; survives moves, including into the
    /// recycle bin.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Parent group id.
    #[must_use]
    pub fn parent(&self) -> Uuid {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Uuid) {
        self.parent = parent;
    }

    /// Entry title, or `""` if unset.
    #[must_use]
    pub fn title(&self) -> &str {
        self.attribute(attr::TITLE).unwrap_or("")
    }

    /// User name, or `""` if unset.
    #[must_use]
    pub fn username(&self) -> &str {
        self.attribute(attr::USERNAME).unwrap_or("")
    }

    /// Password, or `""` if unset.
    #[must_use]
    pub fn password(&self) -> &str {
        self.attribute(attr::PASSWORD).unwrap_or("")
    }

    /// URL, or `""` if unset.
    #[must_use]
    pub fn url(&self) -> &str {
        self.attribute(attr::URL).unwrap_or("")
    }

    /// Notes, or `""` if unset.
    #[must_use]
    pub fn notes(&self) -> &str {
        self.attribute(attr::NOTES).unwrap_or("")
    }

    /// Looks up an attribute value by key.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|a| a.value.as_str())
    }

    /// Whether the attribute exists and is marked protected.
    #[must_use]
    pub fn attribute_is_protected(&self, key: &str) -> bool {
        self.attributes.get(key).is_some_and(|a| a.protected)
    }

    /// The full attribute map.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, Attribute> {
        &self.attributes
    }

    /// Sets an attribute, snapshotting the prior version into history.
    ///
    /// A write that changes nothing is a no-op (no snapshot, no touch).
    pub fn set_attribute(&mut self, key: impl Into<String>, attribute: Attribute) {
        let key = key.into();
        if self.attributes.get(&key) == Some(&attribute) {
            return;
        }
        self.take_snapshot();
        self.attributes.insert(key, attribute);
        self.times.touch_modified();
    }

    /// Removes an attribute, snapshotting the prior version.
    pub fn remove_attribute(&mut self, key: &str) {
        if !self.attributes.contains_key(key) {
            return;
        }
        self.take_snapshot();
        self.attributes.remove(key);
        self.times.touch_modified();
    }

    /// Binary attachments by name.
    #[must_use]
    pub fn attachments(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.attachments
    }

    /// Adds or replaces an attachment, snapshotting the prior version.
    pub fn set_attachment(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let name = name.into();
        if self.attachments.get(&name) == Some(&data) {
            return;
        }
        self.take_snapshot();
        self.attachments.insert(name, data);
        self.times.touch_modified();
    }

    /// Removes an attachment, snapshotting the prior version.
    pub fn remove_attachment(&mut self, name: &str) {
        if !self.attachments.contains_key(name) {
            return;
        }
        self.take_snapshot();
        self.attachments.remove(name);
        self.times.touch_modified();
    }

    /// Timestamps.
    #[must_use]
    pub fn times(&self) -> &Times {
        &self.times
    }

    /// Marks the entry as accessed.
    pub fn touch_accessed(&mut self) {
        self.times.touch_accessed();
    }

    pub(crate) fn touch_modified(&mut self) {
        self.times.touch_modified();
    }

    /// Prior versions, oldest first.
    #[must_use]
    pub fn history(&self) -> &[EntrySnapshot] {
        &self.history
    }

    /// Discards all history.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Trims history to the given retention policy, dropping oldest
    /// versions first.
    pub fn prune_history(&mut self, policy: &HistoryPolicy) {
        if let Some(max_items) = policy.max_items {
            while self.history.len() > max_items {
                self.history.remove(0);
            }
        }
        if let Some(max_bytes) = policy.max_total_bytes {
            let mut total: usize = self.history.iter().map(EntrySnapshot::approximate_size).sum();
            while total > max_bytes && !self.history.is_empty() {
                total -= self.history.remove(0).approximate_size();
            }
        }
    }

    fn take_snapshot(&mut self) {
        self.history.push(EntrySnapshot {
            attributes: self.attributes.clone(),
            attachments: self.attachments.clone(),
            times: self.times,
        });
    }
}
