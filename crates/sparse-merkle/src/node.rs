//! Node content and the content-addressed node store.

use im::HashMap as ImHashMap;
use serde::{Deserialize, Serialize};

use crate::encoding::Encoding;
use crate::hash::HashFn;

/// Content of a stored node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node<E: Encoding> {
    /// A leaf holding one entry; hashed as `hash(key, value, marker)`.
    Leaf { key: E::Element, value: E::Element },
    /// An internal node; hashed as `hash(left, right)`.
    Internal { left: E::Element, right: E::Element },
}

impl<E: Encoding> Node<E> {
    pub fn hash(&self, hash: &HashFn<E>) -> E::Element {
        match self {
            Node::Leaf { key, value } => hash(&[key.clone(), value.clone(), E::leaf_marker()]),
            Node::Internal { left, right } => hash(&[left.clone(), right.clone()]),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

/// A key with its value, or with no value when the key is absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Entry<E: Encoding> {
    pub key: E::Element,
    pub value: Option<E::Element>,
}

impl<E: Encoding> Entry<E> {
    pub fn present(key: E::Element, value: E::Element) -> Self {
        Self { key, value: Some(value) }
    }

    pub fn absent(key: E::Element) -> Self {
        Self { key, value: None }
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Leaf identifier of this entry, or the zero identifier if absent.
    pub fn node_hash(&self, hash: &HashFn<E>) -> E::Element {
        match &self.value {
            Some(value) => hash(&[self.key.clone(), value.clone(), E::leaf_marker()]),
            None => E::zero(),
        }
    }
}

/// Identifier to node table.
///
/// Backed by `im::HashMap` so cloning a tree is O(1) and forks share
/// structure until they diverge.
#[derive(Clone, Debug)]
pub struct NodeStore<E: Encoding> {
    nodes: ImHashMap<E::Element, Node<E>>,
}

impl<E: Encoding> Default for NodeStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Encoding> NodeStore<E> {
    pub fn new() -> Self {
        Self { nodes: ImHashMap::new() }
    }

    pub fn get(&self, id: &E::Element) -> Option<&Node<E>> {
        self.nodes.get(id)
    }

    pub fn insert(&mut self, id: E::Element, node: Node<E>) {
        self.nodes.insert(id, node);
    }

    pub fn remove(&mut self, id: &E::Element) -> Option<Node<E>> {
        self.nodes.remove(id)
    }

    /// Whether `id` names a stored leaf.
    pub fn is_leaf(&self, id: &E::Element) -> bool {
        self.nodes.get(id).map_or(false, Node::is_leaf)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes = ImHashMap::new();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&E::Element, &Node<E>)> {
        self.nodes.iter()
    }
}
