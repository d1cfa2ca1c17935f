//! Membership and non-membership proofs.
//!
//! A proof carries the siblings collected while descending toward a key and
//! one of three endings:
//!
//! - the key's own leaf (membership)
//! - an empty slot (non-membership)
//! - a different leaf sitting where the key would be (non-membership with a
//!   matching entry)
//!
//! Verification recomputes the root from the ending and the siblings. For a
//! matching entry it also requires the target key to share at least
//! `siblings.len()` path bits with the matching key; otherwise the leaf could
//! be one sitting higher up beside a subtree that does contain the key.

use serde::{Deserialize, Serialize};

use crate::encoding::Encoding;
use crate::error::{SmtError, SmtResult};
use crate::hash::HashFn;
use crate::node::Entry;
use crate::path::Path;
use crate::sparse::{fold_path, Located, SparseMerkleTree};
use crate::TREE_DEPTH;

/// A proof of membership or non-membership in the sparse Merkle tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct MerkleProof<E: Encoding> {
    /// The proven key, with its value for membership proofs
    pub entry: Entry<E>,
    /// The leaf found in place of the key, if any
    pub matching_entry: Option<Entry<E>>,
    /// Sibling identifiers from the root level down
    pub siblings: Vec<E::Element>,
    /// The root the proof was created against
    pub root: E::Element,
    pub membership: bool,
}

impl<E: Encoding> MerkleProof<E> {
    /// Get the depth of this proof
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    /// Check this proof with `hash` alone, without a tree.
    pub fn verify(&self, hash: &HashFn<E>) -> bool {
        verify_with(hash, self).is_ok()
    }
}

fn invalid(reason: impl Into<String>) -> SmtError {
    SmtError::InvalidProof(reason.into())
}

fn key_path<E: Encoding>(key: &E::Element) -> SmtResult<Path> {
    Path::from_key::<E>(key).map_err(|_| invalid(format!("key {:?} is not a valid element", key)))
}

/// Check `proof` against its own root using `hash`.
///
/// Returns `Ok(())` for a valid proof and [`SmtError::InvalidProof`] with the
/// failed condition otherwise.
pub fn verify_with<E: Encoding>(hash: &HashFn<E>, proof: &MerkleProof<E>) -> SmtResult<()> {
    if proof.membership != proof.entry.has_value() {
        return Err(invalid("membership flag disagrees with the entry"));
    }
    if proof.siblings.len() > TREE_DEPTH {
        return Err(invalid(format!("{} siblings exceed the tree depth", proof.siblings.len())));
    }

    let path = key_path::<E>(&proof.entry.key)?;

    let computed = match &proof.matching_entry {
        None => fold_path::<E, _>(hash, proof.entry.node_hash(hash), &path, &proof.siblings, |_, _| {}),
        Some(matching) => {
            if proof.entry.has_value() {
                return Err(invalid("membership proof carries a matching entry"));
            }
            if !matching.has_value() {
                return Err(invalid("matching entry has no value"));
            }

            let matching_path = key_path::<E>(&matching.key)?;
            let shared = path.common_prefix_len(&matching_path);
            if shared == TREE_DEPTH {
                return Err(invalid("matching entry has the proven key"));
            }
            if shared < proof.siblings.len() {
                return Err(invalid(format!(
                    "matching entry diverges at depth {} above proof depth {}",
                    shared,
                    proof.siblings.len()
                )));
            }

            fold_path::<E, _>(hash, matching.node_hash(hash), &matching_path, &proof.siblings, |_, _| {})
        }
    };

    if computed == proof.root {
        Ok(())
    } else {
        Err(invalid(format!(
            "root mismatch: expected {:?}, computed {:?}",
            proof.root, computed
        )))
    }
}

impl<E: Encoding> SparseMerkleTree<E> {
    /// Build a membership or non-membership proof for `key` against the
    /// current root.
    pub fn create_proof(&self, key: impl Into<E::Element>) -> SmtResult<MerkleProof<E>> {
        let key = E::normalize(key.into())?;
        let path = Path::from_key::<E>(&key)?;
        let Located { entry, matching_entry, siblings } = self.locate(&key, &path)?;

        Ok(MerkleProof {
            membership: entry.has_value(),
            entry,
            matching_entry,
            siblings,
            root: self.root.clone(),
        })
    }

    /// Whether `proof` is valid for the root it carries.
    pub fn verify_proof(&self, proof: &MerkleProof<E>) -> bool {
        self.check_proof(proof).is_ok()
    }

    /// Like [`SparseMerkleTree::verify_proof`], reporting why a proof fails.
    pub fn check_proof(&self, proof: &MerkleProof<E>) -> SmtResult<()> {
        verify_with(&self.hash, proof)
    }
}
