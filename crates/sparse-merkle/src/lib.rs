//! # sparse-merkle
//!
//! A 256-bit sparse Merkle tree: an authenticated key/value map committed to
//! by a single root, with succinct membership and non-membership proofs.
//!
//! - [`sparse::SparseMerkleTree`]: the tree, generic over its representation mode
//! - [`proof::MerkleProof`]: proofs, checkable with nothing but the hash function
//! - [`snapshot`]: flat JSON export/import of the node table
//!
//! ## Representation modes
//!
//! Keys, values and node identifiers are either hexadecimal strings
//! ([`HexEncoding`]) or big integers ([`BigIntEncoding`]). The mode is fixed
//! when the tree is constructed, together with the hash function.
//!
//! ## Hashing
//!
//! The tree is hash-agnostic: callers inject a function over two or three
//! elements. [`hash::sha256`] and [`hash::blake3`] are provided.

pub mod encoding;
pub mod error;
pub mod hash;
pub mod node;
pub mod path;
pub mod proof;
pub mod snapshot;
pub mod sparse;

pub use encoding::{BigIntEncoding, Encoding, HexEncoding};
pub use error::{SmtError, SmtResult};
pub use hash::HashFn;
pub use node::Entry;
pub use num_bigint::BigUint;
pub use proof::{verify_with, MerkleProof};
pub use sparse::{BigIntSparseMerkleTree, HexSparseMerkleTree, SparseMerkleTree};

/// Number of levels below the root (one per key bit)
pub const TREE_DEPTH: usize = 256;

/// Byte length of keys and digests (32 bytes = 256 bits)
pub const KEY_BYTES: usize = 32;
