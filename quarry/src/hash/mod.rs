//! Content hashes.
//!
//! A [`ContentHash`] names a blob by its bytes. The algorithm is carried
//! alongside the digest as a plain label because different storage backends
//! report different digests (an object store may hand back `md5` while the
//! local backend computes `sha256`), and both kinds live side by side in the
//! catalog.


use std::fmt;

use displaydoc::Display;
use serde::{de, ser, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::QuarryResult;

/// The algorithm of hashes that Quarry computes itself.
pub const DEFAULT_ALGORITHM: &str = "sha256";

/// A content hash.
///
/// The hash value may be empty, which means the content has not been
/// hashed yet (e.g., a draft version that was never uploaded).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash {
    value: String,
    algorithm: String,
}

/// A hashing error.
#[derive(Debug, Display)]
pub enum Error {
    /// The string lacks a colon separator.
    NoColonSeparator,

    /// The hash algorithm is empty.
    EmptyAlgorithm,

    /// Hash algorithm {0} is not supported.
    UnsupportedHashAlgorithm(String),
}

impl ContentHash {
    /// Creates a hash from a digest string and its algorithm.
    pub fn new(value: impl Into<String>, algorithm: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            algorithm: algorithm.into(),
        }
    }

    /// Creates a hash that has not been computed yet.
    pub fn empty(algorithm: impl Into<String>) -> Self {
        Self::new(String::new(), algorithm)
    }

    /// Convenience function to generate a SHA-256 hash from a slice.
    pub fn sha256_from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self::new(hex::encode(hasher.finalize()), DEFAULT_ALGORITHM)
    }

    /// Parses a typed representation of a hash (`algorithm:value`).
    ///
    /// The value part may be empty.
    pub fn from_typed(s: &str) -> QuarryResult<Self> {
        let (algorithm, value) = s.split_once(':').ok_or(Error::NoColonSeparator)?;

        if algorithm.is_empty() {
            return Err(Error::EmptyAlgorithm.into());
        }

        Ok(Self::new(value, algorithm))
    }

    /// Returns the hash with the algorithm prepended.
    ///
    /// This is the canonical representation of hashes in logs and APIs.
    pub fn to_typed(&self) -> String {
        format!("{}:{}", self.algorithm, self.value)
    }

    /// Returns the digest string.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the name of the hash algorithm.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Returns whether the hash has not been computed yet.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Returns whether the value is a well-formed hexadecimal digest of the given byte length.
    pub fn is_hex_digest(&self, bytes: usize) -> bool {
        self.value.len() == bytes * 2 && self.value.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Compares two hashes, ignoring the case of hexadecimal digits.
    pub fn matches(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && self.value.eq_ignore_ascii_case(&other.value)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    /// Deserializes a typed hash string.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        use de::Error;

        String::deserialize(deserializer)
            .and_then(|s| Self::from_typed(&s).map_err(|e| Error::custom(e.to_string())))
    }
}

impl Serialize for ContentHash {
    /// Serializes a hash into a typed hash string.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        serializer.serialize_str(&self.to_typed())
    }
}
