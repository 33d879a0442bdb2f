//! Serialization of the decrypted document.
//!
//! The plaintext payload is a CBOR document holding the database
//! metadata and the whole entry tree. Encoded bytes are always handed
//! around in [`Zeroizing`] buffers since they contain every secret in
//! the database.

use crate::error::{CoreError, CoreResult};
use crate::meta::Metadata;
use crate::tree::EntryTree;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Current payload schema version, stored inside the document so the
/// schema can evolve independently of the container format.
const PAYLOAD_VERSION: u16 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    version: u16,
    meta: Metadata,
    tree: EntryTree,
}

/// Encodes metadata and tree into the plaintext payload.
pub fn encode(meta: &Metadata, tree: &EntryTree) -> CoreResult<Zeroizing<Vec<u8>>> {
    let document = Document {
        version: PAYLOAD_VERSION,
        meta: meta.clone(),
        tree: tree.clone(),
    };
    let mut buf = Zeroizing::new(Vec::new());
    ciborium::into_writer(&document, &mut *buf)
        .map_err(|err| CoreError::integrity(format!("payload encode: {err}")))?;
    Ok(buf)
}

/// Decodes a plaintext payload back into metadata and tree, validating
/// the tree's structural invariants before returning it.
pub fn decode(bytes: &[u8]) -> CoreResult<(Metadata, EntryTree)> {
    let document: Document = ciborium::from_reader(bytes)
        .map_err(|err| CoreError::integrity(format!("payload decode: {err}")))?;
    if document.version != PAYLOAD_VERSION {
        return Err(CoreError::UnsupportedVersion {
            found: format!("payload version {}", document.version),
            supported: format!("payload version {PAYLOAD_VERSION}"),
        });
    }
    document.tree.validate()?;
    Ok((document.meta, document.tree))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Attribute;

    fn sample() -> (Metadata, EntryTree) {
        let meta = Metadata::new("Vault");
        let mut tree = EntryTree::new("Root");
        let internet = tree.add_group(tree.root_id(), "Internet").unwrap();
        let id = tree.add_entry(internet, "Example").unwrap();
        let entry = tree.entry_mut(id).unwrap();
        entry.set_attribute("UserName", Attribute::plain("alice"));
        entry.set_attribute("Password", Attribute::protected("hunter2"));
        (meta, tree)
    }

    #[test]
    fn roundtrip_preserves_document() {
        let (meta, tree) = sample();
        let bytes = encode(&meta, &tree).unwrap();
        let (meta2, tree2) = decode(&bytes).unwrap();
        assert_eq!(meta2, meta);
        assert_eq!(tree2, tree);
        assert_eq!(
            tree2.find_by_path("Internet/Example").unwrap().password(),
            "hunter2",
        );
    }

    #[test]
    fn garbage_is_an_integrity_error() {
        let err = decode(b"not cbor at all").unwrap_err();
        assert!(matches!(err, CoreError::Integrity { .. }));
    }

    #[test]
    fn empty_is_an_integrity_error() {
        assert!(matches!(
            decode(&[]).unwrap_err(),
            CoreError::Integrity { .. }
        ));
    }

    #[test]
    fn truncated_document_is_an_integrity_error() {
        let (meta, tree) = sample();
        let bytes = encode(&meta, &tree).unwrap();
        let err = decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, CoreError::Integrity { .. }));
    }

    proptest::proptest! {
        #[test]
        fn arbitrary_attribute_values_roundtrip(
            value in "\\PC{0,64}",
            protected in proptest::prelude::any::<bool>(),
        ) {
            let meta = Metadata::new("Vault");
            let mut tree = EntryTree::new("Root");
            let id = tree.add_entry(tree.root_id(), "Entry").unwrap();
            let attribute = if protected {
                Attribute::protected(value.clone())
            } else {
                Attribute::plain(value.clone())
            };
            tree.entry_mut(id).unwrap().set_attribute("Custom", attribute);

            let bytes = encode(&meta, &tree).unwrap();
            let (_, tree2) = decode(&bytes).unwrap();
            let entry = tree2.entry(id).unwrap();
            proptest::prop_assert_eq!(entry.attribute("Custom"), Some(value.as_str()));
            proptest::prop_assert_eq!(entry.attribute_is_protected("Custom"), protected);
        }
    }
}
