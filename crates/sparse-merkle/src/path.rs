//! Path codec: maps a key to the directions taken while descending the tree.
//!
//! Direction `i` is bit `i` of the key counted from the least significant
//! bit, so the root level branches on the lowest bit. `false` descends left,
//! `true` descends right.

use crate::encoding::Encoding;
use crate::error::{SmtError, SmtResult};
use crate::{KEY_BYTES, TREE_DEPTH};

/// The 256 directions derived from a key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Path([u8; KEY_BYTES]);

impl Path {
    /// Derives the path of `key`.
    pub fn from_key<E: Encoding>(key: &E::Element) -> SmtResult<Self> {
        E::to_be_bytes(key)
            .map(Path)
            .ok_or_else(|| SmtError::InvalidParameterType {
                mode: E::NAME,
                value: format!("{:?}", key),
            })
    }

    /// Direction at traversal step `index` (0-255).
    pub fn direction(&self, index: usize) -> bool {
        assert!(index < TREE_DEPTH, "path index out of bounds");
        let byte = self.0[KEY_BYTES - 1 - index / 8];
        (byte >> (index % 8)) & 1 == 1
    }

    /// All directions, root first.
    pub fn directions(&self) -> impl Iterator<Item = bool> + '_ {
        (0..TREE_DEPTH).map(move |i| self.direction(i))
    }

    /// Number of leading directions shared with `other`.
    pub fn common_prefix_len(&self, other: &Path) -> usize {
        for i in (0..KEY_BYTES).rev() {
            let xor = self.0[i] ^ other.0[i];
            if xor != 0 {
                return (KEY_BYTES - 1 - i) * 8 + xor.trailing_zeros() as usize;
            }
        }
        TREE_DEPTH
    }
}

impl std::fmt::Debug for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Path(0x{})", hex::encode(self.0))
    }
}
