//! The hierarchical credential store.
//!
//! Groups and entries live in an arena keyed by id; parent links are
//! plain id lookups, ownership is strictly root-to-leaf, so the tree is
//! acyclic by construction and every mutation re-checks the single-parent
//! invariant. Ids are stable for the life of a node, across moves and
//! through the recycle bin.

mod entry;
mod group;

pub use entry::{attr, Attribute, Entry, EntrySnapshot};
pub use group::Group;

use crate::error::{CoreError, CoreResult};
use crate::meta::{HistoryPolicy, Metadata};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;
use uuid::Uuid;

/// Name of the lazily created recycle bin group.
pub const RECYCLE_BIN_NAME: &str = "Recycle Bin";

/// Outcome of a removal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The node was moved into the recycle bin (reversible).
    Recycled,
    /// The node was permanently removed after confirmation.
    Removed,
    /// The caller declined confirmation; nothing changed.
    Cancelled,
}

/// The group/entry tree of one database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryTree {
    root: Uuid,
    groups: BTreeMap<Uuid, Group>,
    entries: BTreeMap<Uuid, Entry>,
}

impl EntryTree {
    /// Creates a tree containing only a root group.
    #[must_use]
    pub fn new(root_name: impl Into<String>) -> Self {
        let root = Group::new(root_name, None);
        let root_id = root.id();
        let mut groups = BTreeMap::new();
        groups.insert(root_id, root);
        Self {
            root: root_id,
            groups,
            entries: BTreeMap::new(),
        }
    }

    /// The root group id.
    #[must_use]
    pub fn root_id(&self) -> Uuid {
        self.root
    }

    /// The root group.
    #[must_use]
    pub fn root(&self) -> &Group {
        &self.groups[&self.root]
    }

    /// Looks up a group by id.
    #[must_use]
    pub fn group(&self, id: Uuid) -> Option<&Group> {
        self.groups.get(&id)
    }

    /// Looks up a group mutably. Structural links are not reachable
    /// through this; use the move/remove operations for those.
    #[must_use]
    pub fn group_mut(&mut self, id: Uuid) -> Option<&mut Group> {
        self.groups.get_mut(&id)
    }

    /// Looks up an entry by id.
    #[must_use]
    pub fn entry(&self, id: Uuid) -> Option<&Entry> {
        self.entries.get(&id)
    }

    /// Looks up an entry mutably.
    #[must_use]
    pub fn entry_mut(&mut self, id: Uuid) -> Option<&mut Entry> {
        self.entries.get_mut(&id)
    }

    /// Number of groups, including the root.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of entries, including any in the recycle bin.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over all entries in arbitrary order.
    pub fn iter_entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Creates a group under `parent`.
    pub fn add_group(&mut self, parent: Uuid, name: impl Into<String>) -> CoreResult<Uuid> {
        let parent_group = self
            .groups
            .get_mut(&parent)
            .ok_or_else(|| CoreError::group_not_found(parent.to_string()))?;
        let group = Group::new(name, Some(parent));
        let id = group.id();
        parent_group.attach_group(id);
        self.groups.insert(id, group);
        Ok(id)
    }

    /// Creates an entry under `parent`.
    pub fn add_entry(&mut self, parent: Uuid, title: impl Into<String>) -> CoreResult<Uuid> {
        let parent_group = self
            .groups
            .get_mut(&parent)
            .ok_or_else(|| CoreError::group_not_found(parent.to_string()))?;
        let entry = Entry::new(parent, title);
        let id = entry.id();
        parent_group.attach_entry(id);
        self.entries.insert(id, entry);
        Ok(id)
    }

    /// Sets an entry attribute and prunes its history per `policy`.
    pub fn set_entry_attribute(
        &mut self,
        entry_id: Uuid,
        key: impl Into<String>,
        attribute: Attribute,
        policy: &HistoryPolicy,
    ) -> CoreResult<()> {
        let entry = self
            .entries
            .get_mut(&entry_id)
            .ok_or_else(|| CoreError::entry_not_found(entry_id.to_string()))?;
        entry.set_attribute(key, attribute);
        entry.prune_history(policy);
        Ok(())
    }

    /// Resolves a slash-delimited path of group names ending in an entry
    /// title. Case-sensitive, first match at each level.
    #[must_use]
    pub fn find_by_path(&self, path: &str) -> Option<&Entry> {
        self.find_entry_id_by_path(path)
            .and_then(|id| self.entries.get(&id))
    }

    /// Like [`find_by_path`](Self::find_by_path), returning the id.
    #[must_use]
    pub fn find_entry_id_by_path(&self, path: &str) -> Option<Uuid> {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        let (title, group_path) = components.split_last()?;

        let mut current = self.root;
        for name in group_path {
            current = self.child_group_by_name(current, name)?;
        }

        self.groups[&current]
            .entry_ids()
            .iter()
            .copied()
            .find(|id| self.entries[id].title() == *title)
    }

    /// Resolves a slash-delimited path of group names. The empty path
    /// resolves to the root.
    #[must_use]
    pub fn find_group_by_path(&self, path: &str) -> Option<&Group> {
        let mut current = self.root;
        for name in path.split('/').filter(|c| !c.is_empty()) {
            current = self.child_group_by_name(current, name)?;
        }
        self.groups.get(&current)
    }

    fn child_group_by_name(&self, parent: Uuid, name: &str) -> Option<Uuid> {
        self.groups[&parent]
            .group_ids()
            .iter()
            .copied()
            .find(|id| self.groups[id].name() == name)
    }

    /// Whether `ancestor` is a proper ancestor of the group `id`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: Uuid, id: Uuid) -> bool {
        let mut current = self.groups.get(&id).and_then(Group::parent);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.groups.get(&p).and_then(Group::parent);
        }
        false
    }

    /// Re-parents an entry. The id is unchanged; modification timestamps
    /// of the entry and both groups are updated.
    pub fn move_entry(&mut self, entry_id: Uuid, new_parent: Uuid) -> CoreResult<()> {
        let old_parent = self
            .entries
            .get(&entry_id)
            .map(Entry::parent)
            .ok_or_else(|| CoreError::entry_not_found(entry_id.to_string()))?;
        if !self.groups.contains_key(&new_parent) {
            return Err(CoreError::group_not_found(new_parent.to_string()));
        }
        if old_parent == new_parent {
            return Ok(());
        }

        if let Some(old) = self.groups.get_mut(&old_parent) {
            old.detach_entry(entry_id);
            old.touch_modified();
        }
        if let Some(new) = self.groups.get_mut(&new_parent) {
            new.attach_entry(entry_id);
            new.touch_modified();
        }
        if let Some(entry) = self.entries.get_mut(&entry_id) {
            entry.set_parent(new_parent);
            entry.touch_modified();
        }
        Ok(())
    }

    /// Re-parents a group with its whole subtree.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidMove`] when the move would break the tree:
    /// moving the root, moving a group into itself, or into one of its
    /// own descendants.
    pub fn move_group(&mut self, group_id: Uuid, new_parent: Uuid) -> CoreResult<()> {
        if !self.groups.contains_key(&group_id) {
            return Err(CoreError::group_not_found(group_id.to_string()));
        }
        if !self.groups.contains_key(&new_parent) {
            return Err(CoreError::group_not_found(new_parent.to_string()));
        }
        if group_id == new_parent {
            return Err(CoreError::invalid_move("cannot move a group into itself"));
        }
        if self.is_ancestor(group_id, new_parent) {
            return Err(CoreError::invalid_move(
                "cannot move a group into its own subtree",
            ));
        }

        // Only the root has no parent.
        let old_parent = self.groups[&group_id]
            .parent()
            .ok_or_else(|| CoreError::invalid_move("cannot move the root group"))?;
        if old_parent == new_parent {
            return Ok(());
        }

        if let Some(old) = self.groups.get_mut(&old_parent) {
            old.detach_group(group_id);
            old.touch_modified();
        }
        if let Some(new) = self.groups.get_mut(&new_parent) {
            new.attach_group(group_id);
            new.touch_modified();
        }
        if let Some(group) = self.groups.get_mut(&group_id) {
            group.set_parent(Some(new_parent));
            group.touch_modified();
        }
        Ok(())
    }

    /// Returns the recycle bin group id, creating the group under the
    /// root on first use.
    pub fn ensure_recycle_bin(&mut self, meta: &mut Metadata) -> Uuid {
        if let Some(bin) = meta.recycle_bin_group {
            if self.groups.contains_key(&bin) {
                return bin;
            }
        }
        let group = Group::new(RECYCLE_BIN_NAME, Some(self.root));
        let bin = group.id();
        self.groups.insert(bin, group);
        if let Some(root) = self.groups.get_mut(&self.root) {
            root.attach_group(bin);
        }
        meta.recycle_bin_group = Some(bin);
        meta.touch();
        debug!("created recycle bin group");
        bin
    }

    /// Whether the entry currently lives inside the recycle bin.
    #[must_use]
    pub fn entry_in_recycle_bin(&self, meta: &Metadata, entry_id: Uuid) -> bool {
        let Some(bin) = meta.recycle_bin_group else {
            return false;
        };
        let Some(entry) = self.entries.get(&entry_id) else {
            return false;
        };
        entry.parent() == bin || self.is_ancestor(bin, entry.parent())
    }

    /// Recycles or permanently removes an entry.
    ///
    /// If the entry is already in the recycle bin, or the recycle bin is
    /// disabled, removal is irreversible: `confirm` is asked (with the
    /// entry title) and a decline leaves the tree untouched. Otherwise
    /// the entry is moved into the recycle bin — reversible, so no
    /// confirmation — with its modification timestamp updated.
    pub fn recycle_or_remove(
        &mut self,
        meta: &mut Metadata,
        entry_id: Uuid,
        confirm: impl FnOnce(&str) -> bool,
    ) -> CoreResult<RemovalOutcome> {
        let entry = self
            .entries
            .get(&entry_id)
            .ok_or_else(|| CoreError::entry_not_found(entry_id.to_string()))?;
        let title = entry.title().to_string();

        if self.entry_in_recycle_bin(meta, entry_id) || !meta.recycle_bin_enabled {
            if !confirm(&title) {
                return Ok(RemovalOutcome::Cancelled);
            }
            self.remove_entry_permanent(entry_id)?;
            debug!("permanently removed entry");
            Ok(RemovalOutcome::Removed)
        } else {
            let bin = self.ensure_recycle_bin(meta);
            self.move_entry(entry_id, bin)?;
            debug!("recycled entry");
            Ok(RemovalOutcome::Recycled)
        }
    }

    /// Recycles or permanently removes a group and its whole subtree, as
    /// one atomic mutation, following the same policy as single-entry
    /// removal. `confirm` is asked once, before anything is mutated.
    pub fn remove_group(
        &mut self,
        meta: &mut Metadata,
        group_id: Uuid,
        confirm: impl FnOnce(&str) -> bool,
    ) -> CoreResult<RemovalOutcome> {
        if group_id == self.root {
            return Err(CoreError::invalid_operation(
                "cannot remove the root group",
            ));
        }
        let group = self
            .groups
            .get(&group_id)
            .ok_or_else(|| CoreError::group_not_found(group_id.to_string()))?;
        let name = group.name().to_string();

        // Permanent removal applies when the subtree is (or contains) the
        // recycle bin, already lives inside it, or the bin is disabled.
        let bin = meta.recycle_bin_group;
        let is_bin_or_inside =
            bin.is_some_and(|b| group_id == b || self.is_ancestor(b, group_id));
        let contains_bin = bin.is_some_and(|b| self.is_ancestor(group_id, b));

        if is_bin_or_inside || contains_bin || !meta.recycle_bin_enabled {
            if !confirm(&name) {
                return Ok(RemovalOutcome::Cancelled);
            }
            let bin_removed = bin.is_some_and(|b| b == group_id || self.is_ancestor(group_id, b));
            self.remove_group_permanent(group_id)?;
            if bin_removed {
                meta.recycle_bin_group = None;
                meta.touch();
            }
            debug!("permanently removed group subtree");
            Ok(RemovalOutcome::Removed)
        } else {
            let bin = self.ensure_recycle_bin(meta);
            self.move_group(group_id, bin)?;
            debug!("recycled group subtree");
            Ok(RemovalOutcome::Recycled)
        }
    }

    /// Permanently detaches and destroys an entry, history included.
    pub fn remove_entry_permanent(&mut self, entry_id: Uuid) -> CoreResult<()> {
        let parent = self
            .entries
            .get(&entry_id)
            .map(Entry::parent)
            .ok_or_else(|| CoreError::entry_not_found(entry_id.to_string()))?;
        if let Some(group) = self.groups.get_mut(&parent) {
            group.detach_entry(entry_id);
            group.touch_modified();
        }
        self.entries.remove(&entry_id);
        Ok(())
    }

    /// Permanently destroys a group and every descendant group and entry.
    pub fn remove_group_permanent(&mut self, group_id: Uuid) -> CoreResult<()> {
        if group_id == self.root {
            return Err(CoreError::invalid_operation(
                "cannot remove the root group",
            ));
        }
        let parent = self
            .groups
            .get(&group_id)
            .and_then(Group::parent)
            .ok_or_else(|| CoreError::group_not_found(group_id.to_string()))?;

        let (doomed_groups, doomed_entries) = self.collect_subtree(group_id);

        if let Some(group) = self.groups.get_mut(&parent) {
            group.detach_group(group_id);
            group.touch_modified();
        }
        for id in doomed_entries {
            self.entries.remove(&id);
        }
        for id in doomed_groups {
            self.groups.remove(&id);
        }
        Ok(())
    }

    /// Collects the ids of `group_id` and all its descendants.
    fn collect_subtree(&self, group_id: Uuid) -> (Vec<Uuid>, Vec<Uuid>) {
        let mut groups = Vec::new();
        let mut entries = Vec::new();
        let mut stack = vec![group_id];
        while let Some(id) = stack.pop() {
            if let Some(group) = self.groups.get(&id) {
                groups.push(id);
                entries.extend_from_slice(group.entry_ids());
                stack.extend_from_slice(group.group_ids());
            }
        }
        (groups, entries)
    }

    /// Verifies the structural invariants: single root without a parent,
    /// consistent parent/child links, and no node unreachable from the
    /// root. Decoded payloads are validated with this before use.
    pub fn validate(&self) -> CoreResult<()> {
        let root = self
            .groups
            .get(&self.root)
            .ok_or_else(|| CoreError::integrity("root group missing"))?;
        if root.parent().is_some() {
            return Err(CoreError::integrity("root group has a parent"));
        }

        let mut seen_groups = HashSet::new();
        let mut seen_entries = HashSet::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if !seen_groups.insert(id) {
                return Err(CoreError::integrity("group referenced twice"));
            }
            let group = self
                .groups
                .get(&id)
                .ok_or_else(|| CoreError::integrity("dangling group reference"))?;
            for child in group.group_ids() {
                let child_group = self
                    .groups
                    .get(child)
                    .ok_or_else(|| CoreError::integrity("dangling group reference"))?;
                if child_group.parent() != Some(id) {
                    return Err(CoreError::integrity("group parent link mismatch"));
                }
                stack.push(*child);
            }
            for entry_id in group.entry_ids() {
                if !seen_entries.insert(*entry_id) {
                    return Err(CoreError::integrity("entry referenced twice"));
                }
                let entry = self
                    .entries
                    .get(entry_id)
                    .ok_or_else(|| CoreError::integrity("dangling entry reference"))?;
                if entry.parent() != id {
                    return Err(CoreError::integrity("entry parent link mismatch"));
                }
            }
        }

        if seen_groups.len() != self.groups.len() {
            return Err(CoreError::integrity("unreachable group in arena"));
        }
        if seen_entries.len() != self.entries.len() {
            return Err(CoreError::integrity("unreachable entry in arena"));
        }
        Ok(())
    }
}

impl Default for EntryTree {
    fn default() -> Self {
        Self::new("Root")
    }
}
