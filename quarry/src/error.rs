//! Error handling.

use std::error::Error as StdError;
use std::io;

use displaydoc::Display;

pub type QuarryResult<T> = Result<T, QuarryError>;

/// An error.
#[derive(Debug, Display)]
pub enum QuarryError {
    /// Invalid name "{name}": {reason}
    InvalidName { name: String, reason: &'static str },

    /// Invalid version ordinal {value}: Must be between 1 and 2147483647
    InvalidVersionOrdinal { value: i64 },

    /// Hashing error: {0}
    HashError(super::hash::Error),

    /// I/O error: {error}.
    IoError { error: io::Error },
}

impl QuarryError {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidName { .. } => "InvalidName",
            Self::InvalidVersionOrdinal { .. } => "InvalidVersionOrdinal",
            Self::HashError(_) => "HashError",
            Self::IoError { .. } => "IoError",
        }
    }
}

impl StdError for QuarryError {}

impl From<io::Error> for QuarryError {
    fn from(error: io::Error) -> Self {
        Self::IoError { error }
    }
}

impl From<super::hash::Error> for QuarryError {
    fn from(error: super::hash::Error) -> Self {
        Self::HashError(error)
    }
}
