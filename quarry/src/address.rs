//! Storage addresses.
//!
//! A storage address is an opaque URI-like locator (`s3://bucket/key`,
//! `gs://bucket/key`, `/var/data/blob`). The catalog never interprets it
//! beyond extracting the scheme, which decides the storage backend kind
//! when none is given explicitly.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref SCHEME_REGEX: Regex = Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]+):").unwrap();
}

/// An opaque location of stored content.
///
/// An empty address means the location is not known yet.
#[derive(Serialize, Deserialize, Clone, Debug, Default, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct StorageAddress(String);

impl StorageAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the lowercased URI scheme, or an empty string.
    ///
    /// Single-letter prefixes are not treated as schemes so that Windows
    /// drive letters (`C:\data`) come out scheme-less.
    pub fn scheme(&self) -> String {
        SCHEME_REGEX
            .captures(&self.0)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default()
    }
}

impl fmt::Display for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StorageAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StorageAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme() {
        let cases = [
            ("s3://bucket/key", "s3"),
            ("S3A://bucket/key", "s3a"),
            ("gs://bucket/object", "gs"),
            ("abfss://container@account/path", "abfss"),
            ("file:///tmp/blob", "file"),
            ("/var/lib/data.csv", ""),
            ("C:\\data\\x.csv", ""),
            ("relative/path", ""),
            ("", ""),
            ("1abc://nope", ""),
        ];

        for (address, scheme) in cases {
            assert_eq!(scheme, StorageAddress::from(address).scheme(), "{}", address);
        }
    }

    #[test]
    fn test_empty() {
        assert!(StorageAddress::default().is_empty());
        assert!(!StorageAddress::new("s3://b/k").is_empty());
    }
}
