//! Record names.
//!
//! Data set and data file names are free-form labels chosen by users.
//! They can be up to 255 characters long, must not contain control
//! characters, and must not start or end with whitespace.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{QuarryError, QuarryResult};

/// The maximum allowable length of a name, in characters.
pub const MAX_NAME_LENGTH: usize = 255;

lazy_static! {
    static ref NAME_REGEX: Regex = Regex::new(r"^[^\x00-\x1F\x7F]+$").unwrap();
}

/// Checks that a name is acceptable for a data set or data file.
pub fn validate_name(name: &str) -> QuarryResult<()> {
    let reason = if name.is_empty() {
        Some("Name must not be empty")
    } else if name.chars().count() > MAX_NAME_LENGTH {
        Some("Name must be at most 255 characters long")
    } else if !NAME_REGEX.is_match(name) {
        Some("Name must not contain control characters")
    } else if name.trim() != name {
        Some("Name must not start or end with whitespace")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(QuarryError::InvalidName {
            name: name.to_owned(),
            reason,
        }),
        None => Ok(()),
    }
}
