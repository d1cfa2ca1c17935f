//! Flat export/import of the node table.
//!
//! A snapshot is a JSON object mapping each node identifier to its content,
//! plus the reserved `"root"` entry holding the root as a one-element list:
//!
//! ```text
//! {
//!   "root": ["<root>"],
//!   "<leaf id>": ["<key>", "<value>", "1"],
//!   "<internal id>": ["<left>", "<right>"]
//! }
//! ```
//!
//! Elements are written in the textual form of the tree's encoding (decimal
//! for big-number mode, hex digits for hexadecimal mode) and read back with
//! the same encoding, so a snapshot can only be imported into a tree of the
//! mode that exported it. There is no version or checksum field.

use std::collections::BTreeMap;

use tracing::debug;

use crate::encoding::Encoding;
use crate::error::{SmtError, SmtResult};
use crate::node::{Node, NodeStore};
use crate::sparse::SparseMerkleTree;

/// Reserved record key holding the root.
pub const ROOT_KEY: &str = "root";

/// Identifier to stringified content, including the reserved root entry.
pub type SnapshotRecord = BTreeMap<String, Vec<String>>;

fn parse<E: Encoding>(text: &str) -> SmtResult<E::Element> {
    E::from_text(text).ok_or_else(|| {
        SmtError::MalformedSnapshot(format!("{:?} is not a {} element", text, E::NAME))
    })
}

impl<E: Encoding> SparseMerkleTree<E> {
    /// The root and every stored node as a flat record.
    pub fn to_record(&self) -> SnapshotRecord {
        let mut record = SnapshotRecord::new();
        record.insert(ROOT_KEY.to_string(), vec![E::to_text(&self.root)]);

        for (id, node) in self.nodes.iter() {
            let content = match node {
                Node::Leaf { key, value } => {
                    vec![E::to_text(key), E::to_text(value), E::to_text(&E::leaf_marker())]
                }
                Node::Internal { left, right } => vec![E::to_text(left), E::to_text(right)],
            };
            record.insert(E::to_text(id), content);
        }
        record
    }

    /// Serialize the tree to a JSON snapshot.
    pub fn export(&self) -> SmtResult<String> {
        let json = serde_json::to_string(&self.to_record())?;
        debug!(nodes = self.nodes.len(), bytes = json.len(), "exported snapshot");
        Ok(json)
    }

    /// Replace the tree's contents with `record`.
    ///
    /// Hashes are taken as given: nothing is recomputed. Use
    /// [`SparseMerkleTree::import_verified`] for snapshots from an untrusted
    /// source.
    pub fn load_record(&mut self, mut record: SnapshotRecord) -> SmtResult<()> {
        let root = match record.remove(ROOT_KEY).as_deref() {
            Some([root]) => parse::<E>(root)?,
            Some(other) => {
                return Err(SmtError::MalformedSnapshot(format!(
                    "root entry has {} elements",
                    other.len()
                )))
            }
            None => return Err(SmtError::MalformedSnapshot("missing root entry".to_string())),
        };

        let mut nodes = NodeStore::new();
        let mut leaf_count = 0;
        for (id, content) in record {
            let node = match content.as_slice() {
                [key, value, marker] => {
                    if parse::<E>(marker)? != E::leaf_marker() {
                        return Err(SmtError::MalformedSnapshot(format!(
                            "node {} has leaf marker {}",
                            id, marker
                        )));
                    }
                    leaf_count += 1;
                    Node::Leaf { key: parse::<E>(key)?, value: parse::<E>(value)? }
                }
                [left, right] => Node::Internal { left: parse::<E>(left)?, right: parse::<E>(right)? },
                other => {
                    return Err(SmtError::MalformedSnapshot(format!(
                        "node {} has {} elements",
                        id,
                        other.len()
                    )))
                }
            };
            let parsed = parse::<E>(&id)?;
            if nodes.get(&parsed).is_some() {
                return Err(SmtError::MalformedSnapshot(format!("node {} is listed twice", id)));
            }
            nodes.insert(parsed, node);
        }

        if !E::is_zero(&root) && nodes.get(&root).is_none() {
            return Err(SmtError::MalformedSnapshot("root is not a stored node".to_string()));
        }

        self.root = root;
        self.nodes = nodes;
        self.leaf_count = leaf_count;
        debug!(nodes = self.nodes.len(), leaves = leaf_count, "imported snapshot");
        Ok(())
    }

    /// Replace the tree's contents with a JSON snapshot.
    ///
    /// On failure the tree is left unchanged.
    pub fn import(&mut self, snapshot: &str) -> SmtResult<()> {
        let record: SnapshotRecord = serde_json::from_str(snapshot)?;
        self.load_record(record)
    }

    /// Like [`SparseMerkleTree::import`], but also recomputes every node's
    /// hash and rejects the snapshot if any identifier does not match.
    pub fn import_verified(&mut self, snapshot: &str) -> SmtResult<()> {
        let mut staged = Self::with_hash_fn(self.hash.clone());
        staged.import(snapshot)?;

        for (id, node) in staged.nodes.iter() {
            if &node.hash(&self.hash) != id {
                return Err(SmtError::MalformedSnapshot(format!(
                    "node {} does not hash to its identifier",
                    E::to_text(id)
                )));
            }
        }

        *self = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{BigIntEncoding, HexEncoding};
    use crate::hash::sha256;
    use crate::sparse::{BigIntSparseMerkleTree, HexSparseMerkleTree};

    fn big_tree(keys: &[u64]) -> BigIntSparseMerkleTree {
        let mut tree = BigIntSparseMerkleTree::new(sha256::<BigIntEncoding>).unwrap();
        for key in keys {
            tree.add(*key, key * 2).unwrap();
        }
        tree
    }

    fn hex_tree(keys: &[&str]) -> HexSparseMerkleTree {
        let mut tree = HexSparseMerkleTree::new(sha256::<HexEncoding>).unwrap();
        for key in keys {
            tree.add(*key, "beef").unwrap();
        }
        tree
    }

    #[test]
    fn test_snapshot_restore() {
        let tree = big_tree(&[1, 2, 3, 9, 100]);
        let snapshot = tree.export().unwrap();

        let mut restored = big_tree(&[]);
        restored.import(&snapshot).unwrap();

        assert_eq!(restored.root(), tree.root());
        assert_eq!(restored.len(), tree.len());
        assert_eq!(restored.node_count(), tree.node_count());
        assert_eq!(restored.get(9u64).unwrap(), tree.get(9u64).unwrap());
    }

    #[test]
    fn test_restored_tree_stays_usable() {
        let tree = big_tree(&[1, 2, 3]);
        let mut restored = big_tree(&[]);
        restored.import(&tree.export().unwrap()).unwrap();

        restored.add(4u64, 8u64).unwrap();
        restored.delete(4u64).unwrap();
        assert_eq!(restored.root(), tree.root());

        let proof = restored.create_proof(2u64).unwrap();
        assert!(proof.membership);
        assert!(tree.verify_proof(&proof));
    }

    #[test]
    fn test_record_layout() {
        let tree = big_tree(&[5]);
        let record = tree.to_record();

        assert_eq!(record.len(), 2);
        let root = &record[ROOT_KEY];
        assert_eq!(root.len(), 1);
        assert_eq!(record[&root[0]], vec!["5".to_string(), "10".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_empty_snapshot() {
        let tree = big_tree(&[]);
        assert_eq!(tree.export().unwrap(), r#"{"root":["0"]}"#);

        let mut restored = big_tree(&[7]);
        restored.import(r#"{"root":["0"]}"#).unwrap();
        assert!(restored.is_empty());
        assert_eq!(restored.node_count(), 0);
        assert_eq!(restored.len(), 0);
    }

    #[test]
    fn test_hex_snapshot_restore() {
        let tree = hex_tree(&["a", "b", "ff01"]);
        let mut restored = hex_tree(&[]);
        restored.import_verified(&tree.export().unwrap()).unwrap();

        assert_eq!(restored.root(), tree.root());
        assert_eq!(restored.get("FF01").unwrap(), Some("beef".to_string()));
    }

    #[test]
    fn test_malformed_snapshots() {
        let mut tree = big_tree(&[1]);
        let root = tree.root().clone();

        for snapshot in [
            r#"{}"#,
            r#"{"root":[]}"#,
            r#"{"root":["1","2"]}"#,
            r#"{"root":["abc"]}"#,
            r#"{"root":["5"]}"#,
            r#"{"root":["5"],"5":["1"]}"#,
            r#"{"root":["5"],"5":["1","2","3"]}"#,
            r#"{"root":["5"],"5":["1","x"]}"#,
        ] {
            assert!(
                matches!(tree.import(snapshot), Err(SmtError::MalformedSnapshot(_))),
                "{}",
                snapshot
            );
        }
        assert!(matches!(tree.import("not json"), Err(SmtError::Json(_))));
        assert_eq!(tree.root(), &root);
    }

    #[test]
    fn test_duplicate_identifiers_rejected() {
        let tree = hex_tree(&["1"]);
        let mut record = tree.to_record();
        let root = record[ROOT_KEY][0].clone();
        let content = record[&root].clone();
        record.insert(root.to_uppercase(), content);
        let duplicated = serde_json::to_string(&record).unwrap();

        let mut restored = hex_tree(&["2"]);
        let before = restored.root().clone();
        assert!(matches!(
            restored.import(&duplicated),
            Err(SmtError::MalformedSnapshot(_))
        ));
        assert_eq!(restored.root(), &before);

        let mut spelled = hex_tree(&[]);
        assert!(spelled
            .import(r#"{"root":["5"],"05":["1","2","1"],"5":["1","2","1"]}"#)
            .is_err());
    }

    #[test]
    fn test_padded_hash_snapshot_round_trip() {
        // Zero-padded uppercase digests, as `hex::encode_upper` would produce
        let padded = |inputs: &[String]| format!("{:0>64}", sha256::<HexEncoding>(inputs)).to_uppercase();
        let keys: Vec<String> = (0..40u32).map(|i| format!("{:x}", i * 13 + 1)).collect();

        let mut tree = HexSparseMerkleTree::new(padded).unwrap();
        for key in &keys {
            tree.add(key.as_str(), "beef").unwrap();
        }
        assert!(tree.to_record().keys().all(|id| id == ROOT_KEY || !id.starts_with('0')));
        let snapshot = tree.export().unwrap();

        let mut restored = HexSparseMerkleTree::new(padded).unwrap();
        restored.import(&snapshot).unwrap();
        assert_eq!(restored.root(), tree.root());

        for key in keys.iter().map(String::as_str).chain(["abcd"]) {
            let proof = restored.create_proof(key).unwrap();
            assert!(restored.verify_proof(&proof), "key {}", key);
            assert!(tree.verify_proof(&proof), "key {}", key);
        }

        restored.update("1", "cafe").unwrap();
        tree.update("1", "cafe").unwrap();
        assert_eq!(restored.root(), tree.root());
        assert_eq!(restored.node_count(), tree.node_count());

        let mut verified = HexSparseMerkleTree::new(padded).unwrap();
        verified.import_verified(&snapshot).unwrap();
        assert_eq!(verified.len(), keys.len());
    }

    #[test]
    fn test_cross_mode_import_rejected() {
        let big = big_tree(&[1, 2, 3]);
        let hex = hex_tree(&["1", "2", "3"]);

        let mut into_hex = hex_tree(&[]);
        assert!(into_hex.import(&big.export().unwrap()).is_err());

        let mut into_big = big_tree(&[]);
        assert!(into_big.import(&hex.export().unwrap()).is_err());
    }

    #[test]
    fn test_import_trusts_hashes() {
        let tree = big_tree(&[1, 2]);
        let mut record = tree.to_record();
        let root = record[ROOT_KEY][0].clone();

        // Relabel the root node under a different identifier
        let content = record.remove(&root).unwrap();
        record.insert("12345".to_string(), content);
        record.insert(ROOT_KEY.to_string(), vec!["12345".to_string()]);
        let forged = serde_json::to_string(&record).unwrap();

        let mut trusting = big_tree(&[]);
        trusting.import(&forged).unwrap();
        assert_eq!(trusting.root().to_string(), "12345");

        let mut verifying = big_tree(&[9]);
        let before = verifying.root().clone();
        assert!(matches!(
            verifying.import_verified(&forged),
            Err(SmtError::MalformedSnapshot(_))
        ));
        assert_eq!(verifying.root(), &before);
    }
}
