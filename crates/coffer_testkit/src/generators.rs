//! Property-based generators for trees and attributes.
//!
//! Strategies for building arbitrary vault contents, plus a small op
//! language for exercising tree mutations in property tests.

use coffer_core::{Attribute, EntryTree, Metadata};
use proptest::prelude::*;

/// Strategy for group and entry names: non-empty, printable, no `/`
/// (so generated names compose into unambiguous paths).
pub fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 _.-]{1,24}"
}

/// Strategy for attribute values, including empty and unicode.
pub fn value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[a-zA-Z0-9!@#$%^&*]{1,64}",
        "\\PC{1,32}",
    ]
}

/// Strategy for attributes, protected or plain.
pub fn attribute_strategy() -> impl Strategy<Value = Attribute> {
    (value_strategy(), any::<bool>()).prop_map(|(value, protected)| {
        if protected {
            Attribute::protected(value)
        } else {
            Attribute::plain(value)
        }
    })
}

/// One random mutation against a tree.
#[derive(Debug, Clone)]
pub enum TreeOp {
    /// Add a group under the group at `parent_index` (mod group count).
    AddGroup {
        /// Index into the current group list.
        parent_index: usize,
        /// Name for the new group.
        name: String,
    },
    /// Add an entry under the group at `parent_index` (mod group count).
    AddEntry {
        /// Index into the current group list.
        parent_index: usize,
        /// Title for the new entry.
        title: String,
    },
    /// Move the entry at `entry_index` under the group at `parent_index`.
    MoveEntry {
        /// Index into the current entry list.
        entry_index: usize,
        /// Index into the current group list.
        parent_index: usize,
    },
    /// Recycle the entry at `entry_index`.
    Recycle {
        /// Index into the current entry list.
        entry_index: usize,
    },
}

/// Strategy producing a sequence of tree mutations.
pub fn ops_strategy(max_ops: usize) -> impl Strategy<Value = Vec<TreeOp>> {
    let op = prop_oneof![
        (any::<usize>(), name_strategy())
            .prop_map(|(parent_index, name)| TreeOp::AddGroup { parent_index, name }),
        (any::<usize>(), name_strategy())
            .prop_map(|(parent_index, title)| TreeOp::AddEntry { parent_index, title }),
        (any::<usize>(), any::<usize>()).prop_map(|(entry_index, parent_index)| {
            TreeOp::MoveEntry {
                entry_index,
                parent_index,
            }
        }),
        any::<usize>().prop_map(|entry_index| TreeOp::Recycle { entry_index }),
    ];
    proptest::collection::vec(op, 0..max_ops)
}

/// Applies an op sequence to a fresh tree, resolving indices against the
/// live node lists. Ops that would be rejected (recycling a missing
/// entry, for example) are skipped.
#[must_use]
pub fn apply_ops(ops: &[TreeOp]) -> (Metadata, EntryTree) {
    let mut meta = Metadata::new("Generated");
    let mut tree = EntryTree::new("Root");
    let mut groups = vec![tree.root_id()];
    let mut entries = Vec::new();

    for op in ops {
        match op {
            TreeOp::AddGroup { parent_index, name } => {
                let parent = groups[parent_index % groups.len()];
                if let Ok(id) = tree.add_group(parent, name.clone()) {
                    groups.push(id);
                }
            }
            TreeOp::AddEntry {
                parent_index,
                title,
            } => {
                let parent = groups[parent_index % groups.len()];
                if let Ok(id) = tree.add_entry(parent, title.clone()) {
                    entries.push(id);
                }
            }
            TreeOp::MoveEntry {
                entry_index,
                parent_index,
            } => {
                if entries.is_empty() {
                    continue;
                }
                let entry = entries[entry_index % entries.len()];
                let parent = groups[parent_index % groups.len()];
                let _ = tree.move_entry(entry, parent);
            }
            TreeOp::Recycle { entry_index } => {
                if entries.is_empty() {
                    continue;
                }
                let entry = entries[entry_index % entries.len()];
                let _ = tree.recycle_or_remove(&mut meta, entry, |_| true);
                // May have been created lazily by the recycle.
                if let Some(bin) = meta.recycle_bin_group {
                    if !groups.contains(&bin) {
                        groups.push(bin);
                    }
                }
            }
        }
    }
    (meta, tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn arbitrary_op_sequences_keep_the_tree_valid(ops in ops_strategy(40)) {
            let (_meta, tree) = apply_ops(&ops);
            prop_assert!(tree.validate().is_ok());
        }

        #[test]
        fn node_counts_match_reachable_nodes(ops in ops_strategy(40)) {
            let (_meta, tree) = apply_ops(&ops);
            // validate() walks from the root; equal counts mean nothing
            // was orphaned by any op sequence.
            prop_assert!(tree.group_count() >= 1);
            prop_assert!(tree.validate().is_ok());
        }
    }
}
