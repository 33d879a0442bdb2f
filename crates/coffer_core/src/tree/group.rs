//! Group nodes.

use crate::times::Times;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A group: an interior node of the credential tree.
///
/// Child links own the subtree (ids resolved through the arena); the
/// parent link is navigation only. The root group is the only group with
/// no parent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    id: Uuid,
    name: String,
    notes: String,
    parent: Option<Uuid>,
    groups: Vec<Uuid>,
    entries: Vec<Uuid>,
    times: Times,
}

impl Group {
    pub(crate) fn new(name: impl Into<String>, parent: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            notes: String::new(),
            parent,
            groups: Vec::new(),
            entries: Vec::new(),
            times: Times::now(),
        }
    }

    /// Stable unique identifier; survives moves.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the group.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.times.touch_modified();
    }

    /// Free-form notes.
    #[must_use]
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Sets the notes.
    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
        self.times.touch_modified();
    }

    /// Parent group id; `None` only for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Uuid> {
        self.parent
    }

    /// Child group ids, in order.
    #[must_use]
    pub fn group_ids(&self) -> &[Uuid] {
        &self.groups
    }

    /// Child entry ids, in order.
    #[must_use]
    pub fn entry_ids(&self) -> &[Uuid] {
        &self.entries
    }

    /// Timestamps.
    #[must_use]
    pub fn times(&self) -> &Times {
        &self.times
    }

    pub(crate) fn set_parent(&mut self, parent: Option<Uuid>) {
        self.parent = parent;
    }

    pub(crate) fn attach_group(&mut self, id: Uuid) {
        self.groups.push(id);
    }

    pub(crate) fn detach_group(&mut self, id: Uuid) {
        self.groups.retain(|g| *g != id);
    }

    pub(crate) fn attach_entry(&mut self, id: Uuid) {
        self.entries.push(id);
    }

    pub(crate) fn detach_entry(&mut self, id: Uuid) {
        self.entries.retain(|e| *e != id);
    }

    pub(crate) fn touch_modified(&mut self) {
        self.times.touch_modified();
    }
}
