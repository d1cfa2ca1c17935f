//! Representation modes for keys, values and node identifiers.
//!
//! A tree is configured once, at construction, with one [`Encoding`]. Every
//! key, value and node identifier it handles is an element of that encoding:
//!
//! - [`HexEncoding`]: hexadecimal strings of 1 to 64 digits
//! - [`BigIntEncoding`]: arbitrary-precision unsigned integers below 2^256
//!
//! Elements are normalized at the boundary of every public operation, so two
//! spellings of the same number (`"0A"` and `"a"`) always address the same key.

use std::fmt;
use std::hash::Hash;

use num_bigint::BigUint;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{SmtError, SmtResult};
use crate::{KEY_BYTES, TREE_DEPTH};

/// A representation family for keys, values and node identifiers.
pub trait Encoding: Clone + Copy + fmt::Debug + Default + PartialEq + Eq + Send + Sync + 'static {
    /// The concrete element type handled by the tree.
    type Element: Clone + Eq + Hash + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Human readable mode name, used in error messages.
    const NAME: &'static str;

    /// Whether this is the big-number mode.
    const BIG_NUMBER_MODE: bool;

    /// The reserved zero identifier (empty subtree).
    fn zero() -> Self::Element;

    /// The marker hashed as the third element of every leaf.
    fn leaf_marker() -> Self::Element;

    fn is_zero(element: &Self::Element) -> bool;

    /// Whether `element` is a member of this representation family.
    fn is_valid(element: &Self::Element) -> bool;

    /// Returns the canonical form of `element`.
    ///
    /// Callers must only pass elements accepted by [`Encoding::is_valid`].
    fn canonicalize(element: Self::Element) -> Self::Element;

    /// Big-endian 32-byte view of the element, `None` if it is out of range.
    fn to_be_bytes(element: &Self::Element) -> Option<[u8; KEY_BYTES]>;

    /// Builds an element from a 256-bit digest.
    fn from_digest(digest: [u8; KEY_BYTES]) -> Self::Element;

    /// Textual form used by snapshots.
    fn to_text(element: &Self::Element) -> String;

    /// Parses the textual form produced by [`Encoding::to_text`].
    fn from_text(text: &str) -> Option<Self::Element>;

    /// Validates and canonicalizes a caller-supplied element.
    fn normalize(element: Self::Element) -> SmtResult<Self::Element> {
        if Self::is_valid(&element) {
            Ok(Self::canonicalize(element))
        } else {
            Err(SmtError::InvalidParameterType {
                mode: Self::NAME,
                value: format!("{:?}", element),
            })
        }
    }
}

/// Hexadecimal string mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HexEncoding;

impl Encoding for HexEncoding {
    type Element = String;

    const NAME: &'static str = "hexadecimal";
    const BIG_NUMBER_MODE: bool = false;

    fn zero() -> String {
        "0".to_string()
    }

    fn leaf_marker() -> String {
        "1".to_string()
    }

    fn is_zero(element: &String) -> bool {
        element.bytes().all(|b| b == b'0')
    }

    fn is_valid(element: &String) -> bool {
        (1..=KEY_BYTES * 2).contains(&element.len())
            && element.bytes().all(|b| b.is_ascii_hexdigit())
    }

    fn canonicalize(element: String) -> String {
        let trimmed = element.trim_start_matches('0');
        if trimmed.is_empty() {
            Self::zero()
        } else {
            trimmed.to_ascii_lowercase()
        }
    }

    fn to_be_bytes(element: &String) -> Option<[u8; KEY_BYTES]> {
        if !Self::is_valid(element) {
            return None;
        }
        let padded = format!("{:0>width$}", element, width = KEY_BYTES * 2);
        let mut bytes = [0u8; KEY_BYTES];
        hex::decode_to_slice(padded, &mut bytes).ok()?;
        Some(bytes)
    }

    fn from_digest(digest: [u8; KEY_BYTES]) -> String {
        Self::canonicalize(hex::encode(digest))
    }

    fn to_text(element: &String) -> String {
        element.clone()
    }

    fn from_text(text: &str) -> Option<String> {
        let element = text.to_string();
        Self::is_valid(&element).then(|| Self::canonicalize(element))
    }
}

/// Big-number mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BigIntEncoding;

impl Encoding for BigIntEncoding {
    type Element = BigUint;

    const NAME: &'static str = "big-number";
    const BIG_NUMBER_MODE: bool = true;

    fn zero() -> BigUint {
        BigUint::default()
    }

    fn leaf_marker() -> BigUint {
        BigUint::from(1u8)
    }

    fn is_zero(element: &BigUint) -> bool {
        element.bits() == 0
    }

    fn is_valid(element: &BigUint) -> bool {
        element.bits() <= TREE_DEPTH as u64
    }

    fn canonicalize(element: BigUint) -> BigUint {
        element
    }

    fn to_be_bytes(element: &BigUint) -> Option<[u8; KEY_BYTES]> {
        if !Self::is_valid(element) {
            return None;
        }
        let raw = element.to_bytes_be();
        let mut bytes = [0u8; KEY_BYTES];
        bytes[KEY_BYTES - raw.len()..].copy_from_slice(&raw);
        Some(bytes)
    }

    fn from_digest(digest: [u8; KEY_BYTES]) -> BigUint {
        BigUint::from_bytes_be(&digest)
    }

    fn to_text(element: &BigUint) -> String {
        element.to_str_radix(10)
    }

    fn from_text(text: &str) -> Option<BigUint> {
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        BigUint::parse_bytes(text.as_bytes(), 10).filter(Self::is_valid)
    }
}
