//! Record lifecycle operations.
//!
//! Operations are methods on the records themselves. They take the
//! [`CatalogStore`](crate::database::CatalogStore) and, when content has
//! to move, a [`StorageGateway`](crate::storage::StorageGateway)
//! explicitly. Every write goes through a transaction.

mod datafile;
mod dataset;
mod dataversion;


use crate::error::{CatalogError, CatalogResult};
use quarry::version::VersionOrdinal;

/// How to find a data file within its data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileLookup<'a> {
    Name(&'a str),
    Id(&'a str),
}

/// How to find a version within its data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionLookup<'a> {
    Ordinal(VersionOrdinal),
    Id(&'a str),
}

impl<'a> FileLookup<'a> {
    /// Builds a lookup from optional parts, exactly one of which must be set.
    pub fn from_parts(name: Option<&'a str>, id: Option<&'a str>) -> CatalogResult<Self> {
        match (name, id) {
            (Some(name), None) => Ok(Self::Name(name)),
            (None, Some(id)) => Ok(Self::Id(id)),
            _ => Err(CatalogError::invalid_argument(
                "Exactly one of a file name or ID must be given",
            )),
        }
    }

    fn identifier(&self) -> String {
        match self {
            Self::Name(name) => (*name).to_owned(),
            Self::Id(id) => (*id).to_owned(),
        }
    }
}

impl<'a> VersionLookup<'a> {
    /// Builds a lookup from optional parts, exactly one of which must be set.
    pub fn from_parts(ordinal: Option<i64>, id: Option<&'a str>) -> CatalogResult<Self> {
        match (ordinal, id) {
            (Some(ordinal), None) => Ok(Self::Ordinal(VersionOrdinal::new(ordinal)?)),
            (None, Some(id)) => Ok(Self::Id(id)),
            _ => Err(CatalogError::invalid_argument(
                "Exactly one of a version number or ID must be given",
            )),
        }
    }

    fn identifier(&self) -> String {
        match self {
            Self::Ordinal(ordinal) => ordinal.to_string(),
            Self::Id(id) => (*id).to_owned(),
        }
    }
}
