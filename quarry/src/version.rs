//! Version ordinals.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, QuarryResult};

/// The position of a version within its data file.
///
/// Ordinals start at 1 and are never reused, even after versions are
/// deleted. The upper bound matches a signed 32-bit database column.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(try_from = "i64", into = "i64")]
pub struct VersionOrdinal(u32);

impl VersionOrdinal {
    /// The ordinal of the first version of a data file.
    pub const FIRST: Self = Self(1);

    /// The largest representable ordinal.
    pub const MAX: Self = Self(i32::MAX as u32);

    pub fn new(value: i64) -> QuarryResult<Self> {
        if value < 1 || value > i64::from(i32::MAX) {
            return Err(QuarryError::InvalidVersionOrdinal { value });
        }

        Ok(Self(value as u32))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Returns the ordinal as stored in the database.
    pub fn as_i32(&self) -> i32 {
        self.0 as i32
    }

    /// Returns the ordinal that follows this one.
    pub fn next(&self) -> QuarryResult<Self> {
        Self::new(i64::from(self.0) + 1)
    }
}

impl fmt::Display for VersionOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl TryFrom<i64> for VersionOrdinal {
    type Error = QuarryError;

    fn try_from(value: i64) -> QuarryResult<Self> {
        Self::new(value)
    }
}

impl From<VersionOrdinal> for i64 {
    fn from(ordinal: VersionOrdinal) -> Self {
        i64::from(ordinal.0)
    }
}
