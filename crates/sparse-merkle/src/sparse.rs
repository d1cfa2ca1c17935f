//! Sparse Merkle Tree implementation.
//!
//! A 256-bit sparse Merkle tree stored as a content-addressed node table.
//!
//! # Design
//!
//! - Every node is stored under its own hash; the root hash is the only
//!   trusted commitment
//! - Empty subtrees are the zero identifier and are never stored
//! - Leaf nodes store the full key-value pair
//! - Internal nodes have exactly 2 children (left=0, right=1), branching on
//!   key bits from the least significant bit up
//! - Path compression: a subtree holding a single leaf is that leaf, placed
//!   at the depth where it stops sharing a prefix with its neighbours
//!
//! Nodes are never modified in place. A mutation first drops the internal
//! nodes on the affected path, then hashes and stores the replacement path.
//!
//! The tree is not internally synchronized. Hosts sharing one tree across
//! threads must serialize mutations (e.g. behind a `RwLock`).
//!
//! # Example
//!
//! ```
//! use sparse_merkle::{hash, BigIntEncoding, BigIntSparseMerkleTree, BigUint};
//!
//! let mut tree = BigIntSparseMerkleTree::new(hash::sha256::<BigIntEncoding>).unwrap();
//!
//! tree.add(1u64, 100u64).unwrap();
//! assert_eq!(tree.get(1u64).unwrap(), Some(BigUint::from(100u64)));
//! ```

use std::fmt;

use tracing::{debug, trace};

use crate::encoding::{BigIntEncoding, Encoding, HexEncoding};
use crate::error::{SmtError, SmtResult};
use crate::hash::{checked_hash_fn, HashFn};
use crate::node::{Entry, Node, NodeStore};
use crate::path::Path;
use crate::TREE_DEPTH;

/// Sparse Merkle tree over hexadecimal string elements.
pub type HexSparseMerkleTree = SparseMerkleTree<HexEncoding>;

/// Sparse Merkle tree over big-number elements.
pub type BigIntSparseMerkleTree = SparseMerkleTree<BigIntEncoding>;

/// Result of descending the tree along a key's path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Located<E: Encoding> {
    /// The target key, with its value if the key is stored.
    pub entry: Entry<E>,
    /// A different leaf occupying the target's position, if any.
    pub matching_entry: Option<Entry<E>>,
    /// Siblings of the visited nodes, root level first.
    pub siblings: Vec<E::Element>,
}

/// Folds `node` up through `siblings` and returns the resulting root.
///
/// `siblings[i]` is hashed with the running node at level `i`, deepest level
/// first. Each produced internal node is passed to `visit`.
pub(crate) fn fold_path<E, F>(
    hash: &HashFn<E>,
    mut node: E::Element,
    path: &Path,
    siblings: &[E::Element],
    mut visit: F,
) -> E::Element
where
    E: Encoding,
    F: FnMut(&E::Element, Node<E>),
{
    for (level, sibling) in siblings.iter().enumerate().rev() {
        let parent = if path.direction(level) {
            Node::Internal { left: sibling.clone(), right: node }
        } else {
            Node::Internal { left: node, right: sibling.clone() }
        };
        node = parent.hash(hash);
        trace!(level, node = ?node, "folded level");
        visit(&node, parent);
    }
    node
}

/// A sparse Merkle tree for key-value storage.
///
/// Keys and values are elements of the encoding `E`; the tree is committed to
/// by a single root identifier.
#[derive(Clone)]
pub struct SparseMerkleTree<E: Encoding> {
    /// The root identifier of the tree
    pub(crate) root: E::Element,
    /// Content-addressed nodes reachable from the root
    pub(crate) nodes: NodeStore<E>,
    /// Number of stored leaves
    pub(crate) leaf_count: usize,
    pub(crate) hash: HashFn<E>,
}

impl<E: Encoding> fmt::Debug for SparseMerkleTree<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseMerkleTree")
            .field("mode", &E::NAME)
            .field("root", &self.root)
            .field("leaves", &self.leaf_count)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl<E: Encoding> SparseMerkleTree<E> {
    /// Create a new empty tree hashing with `hash`.
    ///
    /// Fails with [`SmtError::InvalidHashFunctionOutput`] if a sample output
    /// of `hash` is not a valid element of `E`.
    pub fn new<F>(hash: F) -> SmtResult<Self>
    where
        F: Fn(&[E::Element]) -> E::Element + Send + Sync + 'static,
    {
        Ok(Self::with_hash_fn(checked_hash_fn::<E, F>(hash)?))
    }

    /// Create a new empty tree from an already checked hash function.
    pub fn with_hash_fn(hash: HashFn<E>) -> Self {
        Self {
            root: E::zero(),
            nodes: NodeStore::new(),
            leaf_count: 0,
            hash,
        }
    }

    /// Get the root identifier of the tree.
    pub fn root(&self) -> &E::Element {
        &self.root
    }

    /// The hash function this tree was built with.
    pub fn hash_fn(&self) -> &HashFn<E> {
        &self.hash
    }

    /// Check if the tree is empty.
    pub fn is_empty(&self) -> bool {
        E::is_zero(&self.root)
    }

    /// Get the number of leaves in the tree.
    pub fn len(&self) -> usize {
        self.leaf_count
    }

    /// Number of stored nodes (leaves and internal).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All stored (key, value) pairs, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (&E::Element, &E::Element)> {
        self.nodes.iter().filter_map(|(_, node)| match node {
            Node::Leaf { key, value } => Some((key, value)),
            Node::Internal { .. } => None,
        })
    }

    /// Get a value by key.
    pub fn get(&self, key: impl Into<E::Element>) -> SmtResult<Option<E::Element>> {
        let key = E::normalize(key.into())?;
        let path = Path::from_key::<E>(&key)?;
        Ok(self.locate(&key, &path)?.entry.value)
    }

    /// Check if a key exists in the tree.
    pub fn contains(&self, key: impl Into<E::Element>) -> SmtResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Descends from the root along `path` until an empty slot or a leaf.
    pub(crate) fn locate(&self, key: &E::Element, path: &Path) -> SmtResult<Located<E>> {
        let mut siblings = Vec::new();
        let mut current = self.root.clone();

        loop {
            if E::is_zero(&current) {
                return Ok(Located {
                    entry: Entry::absent(key.clone()),
                    matching_entry: None,
                    siblings,
                });
            }

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| SmtError::MissingNode(E::to_text(&current)))?;

            match node {
                Node::Leaf { key: leaf_key, value } => {
                    let leaf = Entry::present(leaf_key.clone(), value.clone());
                    return Ok(if leaf_key == key {
                        Located { entry: leaf, matching_entry: None, siblings }
                    } else {
                        Located {
                            entry: Entry::absent(key.clone()),
                            matching_entry: Some(leaf),
                            siblings,
                        }
                    });
                }
                Node::Internal { left, right } => {
                    let depth = siblings.len();
                    if depth == TREE_DEPTH {
                        return Err(SmtError::DepthExceeded);
                    }
                    if path.direction(depth) {
                        siblings.push(left.clone());
                        current = right.clone();
                    } else {
                        siblings.push(right.clone());
                        current = left.clone();
                    }
                }
            }
        }
    }

    /// Insert a new key-value pair.
    ///
    /// Fails with [`SmtError::KeyAlreadyExists`] if the key is already stored.
    pub fn add(&mut self, key: impl Into<E::Element>, value: impl Into<E::Element>) -> SmtResult<()> {
        let key = E::normalize(key.into())?;
        let value = E::normalize(value.into())?;
        let path = Path::from_key::<E>(&key)?;

        let Located { entry, matching_entry, mut siblings } = self.locate(&key, &path)?;
        if entry.has_value() {
            return Err(SmtError::KeyAlreadyExists(E::to_text(&key)));
        }

        let matching = match matching_entry {
            Some(leaf) => Some((Path::from_key::<E>(&leaf.key)?, leaf.node_hash(&self.hash))),
            None => None,
        };

        if !siblings.is_empty() {
            let start = matching.as_ref().map_or_else(E::zero, |(_, id)| id.clone());
            self.remove_path(start, &path, &siblings);
        }

        // Expand the compressed levels shared with the displaced leaf, then
        // hang it as the sibling where the two paths diverge.
        if let Some((leaf_path, leaf_id)) = matching {
            let mut level = siblings.len();
            while level < TREE_DEPTH && leaf_path.direction(level) == path.direction(level) {
                siblings.push(E::zero());
                level += 1;
            }
            siblings.push(leaf_id);
        }

        let leaf = Node::<E>::Leaf { key: key.clone(), value };
        let leaf_id = leaf.hash(&self.hash);
        self.nodes.insert(leaf_id.clone(), leaf);
        self.root = self.store_path(leaf_id, &path, &siblings);
        self.leaf_count += 1;

        debug!(key = %E::to_text(&key), depth = siblings.len(), root = %E::to_text(&self.root), "added entry");
        Ok(())
    }

    /// Insert multiple key-value pairs in order, stopping at the first failure.
    pub fn batch_add<K, V>(&mut self, entries: impl IntoIterator<Item = (K, V)>) -> SmtResult<()>
    where
        K: Into<E::Element>,
        V: Into<E::Element>,
    {
        for (key, value) in entries {
            self.add(key, value)?;
        }
        Ok(())
    }

    /// Replace the value of an existing key, returning the old value.
    ///
    /// Fails with [`SmtError::KeyNotFound`] if the key is not stored.
    pub fn update(
        &mut self,
        key: impl Into<E::Element>,
        value: impl Into<E::Element>,
    ) -> SmtResult<E::Element> {
        let key = E::normalize(key.into())?;
        let value = E::normalize(value.into())?;
        let path = Path::from_key::<E>(&key)?;

        let Located { entry, siblings, .. } = self.locate(&key, &path)?;
        let old_id = entry.node_hash(&self.hash);
        let old_value = entry
            .value
            .ok_or_else(|| SmtError::KeyNotFound(E::to_text(&key)))?;

        self.nodes.remove(&old_id);
        self.remove_path(old_id, &path, &siblings);

        let leaf = Node::<E>::Leaf { key: key.clone(), value };
        let leaf_id = leaf.hash(&self.hash);
        self.nodes.insert(leaf_id.clone(), leaf);
        self.root = self.store_path(leaf_id, &path, &siblings);

        debug!(key = %E::to_text(&key), root = %E::to_text(&self.root), "updated entry");
        Ok(old_value)
    }

    /// Remove a key from the tree, returning its value.
    ///
    /// Fails with [`SmtError::KeyNotFound`] if the key is not stored.
    pub fn delete(&mut self, key: impl Into<E::Element>) -> SmtResult<E::Element> {
        let key = E::normalize(key.into())?;
        let path = Path::from_key::<E>(&key)?;

        let Located { entry, mut siblings, .. } = self.locate(&key, &path)?;
        let old_id = entry.node_hash(&self.hash);
        let old_value = entry
            .value
            .ok_or_else(|| SmtError::KeyNotFound(E::to_text(&key)))?;

        self.nodes.remove(&old_id);
        self.leaf_count = self.leaf_count.saturating_sub(1);

        if siblings.is_empty() {
            self.root = E::zero();
        } else {
            self.remove_path(old_id, &path, &siblings);

            let collapse = siblings
                .last()
                .map_or(false, |sibling| self.nodes.is_leaf(sibling));

            let neighbour = if collapse { siblings.pop() } else { None };

            self.root = match neighbour {
                // The neighbouring leaf is now alone in its subtree: lift it
                // to the deepest level that still has a non-empty sibling.
                Some(neighbour) => {
                    while siblings.last().map_or(false, E::is_zero) {
                        siblings.pop();
                    }
                    self.store_path(neighbour, &path, &siblings)
                }
                None => self.store_path(E::zero(), &path, &siblings),
            };
        }

        debug!(key = %E::to_text(&key), root = %E::to_text(&self.root), "deleted entry");
        Ok(old_value)
    }

    /// Hash and store the internal nodes from `start` up to the root.
    fn store_path(&mut self, start: E::Element, path: &Path, siblings: &[E::Element]) -> E::Element {
        let nodes = &mut self.nodes;
        fold_path::<E, _>(&self.hash, start, path, siblings, |id, node| {
            nodes.insert(id.clone(), node);
        })
    }

    /// Drop the internal nodes from `start` up to the root.
    fn remove_path(&mut self, start: E::Element, path: &Path, siblings: &[E::Element]) {
        let nodes = &mut self.nodes;
        fold_path::<E, _>(&self.hash, start, path, siblings, |id, _| {
            nodes.remove(id);
        });
    }
}
