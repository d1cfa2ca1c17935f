//! Hash-function contract and built-in hashers.
//!
//! The tree never hashes on its own: it is handed a pure function at
//! construction that maps two elements (internal node) or three elements
//! (leaf: key, value, marker) to one element of the same encoding.
//!
//! # Caller obligation
//!
//! The zero identifier doubles as the "empty subtree" sentinel. The supplied
//! function must never return zero for real content. Only a single sample
//! invocation is checked at construction; nothing is checked afterwards.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::encoding::Encoding;
use crate::error::{SmtError, SmtResult};
use crate::KEY_BYTES;

/// Node hash function shared by a tree and the proofs it produces.
pub type HashFn<E> = Arc<dyn Fn(&[<E as Encoding>::Element]) -> <E as Encoding>::Element + Send + Sync>;

/// Wraps a closure as a [`HashFn`] after a one-time sample check.
///
/// The sample input is `[1, 1]`; the output must be a valid, nonzero element
/// of the encoding. Every output of the returned function is in canonical
/// form, so identifiers survive a snapshot round trip unchanged whatever
/// spelling `hash` uses (e.g. zero-padded or uppercase hex).
pub fn checked_hash_fn<E, F>(hash: F) -> SmtResult<HashFn<E>>
where
    E: Encoding,
    F: Fn(&[E::Element]) -> E::Element + Send + Sync + 'static,
{
    let sample = hash(&[E::leaf_marker(), E::leaf_marker()]);
    if !E::is_valid(&sample) || E::is_zero(&sample) {
        return Err(SmtError::InvalidHashFunctionOutput {
            mode: E::NAME,
            output: format!("{:?}", sample),
        });
    }
    let hash: HashFn<E> = Arc::new(move |inputs: &[E::Element]| E::canonicalize(hash(inputs)));
    Ok(hash)
}

fn input_bytes<E: Encoding>(input: &E::Element) -> [u8; KEY_BYTES] {
    let bytes = E::to_be_bytes(input);
    debug_assert!(bytes.is_some(), "hash input {:?} is not a valid {} element", input, E::NAME);
    bytes.unwrap_or_default()
}

/// Hashes `inputs` with SHA-256 over their 32-byte big-endian encodings.
pub fn sha256<E: Encoding>(inputs: &[E::Element]) -> E::Element {
    let mut hasher = Sha256::new();
    for input in inputs {
        hasher.update(input_bytes::<E>(input));
    }
    let result = hasher.finalize();
    let mut digest = [0u8; KEY_BYTES];
    digest.copy_from_slice(&result);
    E::from_digest(digest)
}

/// Hashes `inputs` with BLAKE3 over their 32-byte big-endian encodings.
pub fn blake3<E: Encoding>(inputs: &[E::Element]) -> E::Element {
    let mut hasher = ::blake3::Hasher::new();
    for input in inputs {
        hasher.update(&input_bytes::<E>(input));
    }
    E::from_digest(*hasher.finalize().as_bytes())
}
