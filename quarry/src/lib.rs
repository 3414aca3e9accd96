//! The Quarry Library.
//!
//! Value types shared by every part of the Quarry data catalog.

#![deny(
    asm_sub_register,
    deprecated,
    missing_abi,
    unsafe_code,
    unused_macros,
    unused_must_use,
    unused_unsafe
)]
#![deny(clippy::from_over_into, clippy::needless_question_mark)]
#![cfg_attr(
    not(debug_assertions),
    deny(unused_imports, unused_mut, unused_variables,)
)]

pub mod address;
pub mod error;
pub mod hash;
pub mod name;
#[cfg(feature = "tokio")]
pub mod stream;
pub mod version;

pub use error::{QuarryError, QuarryResult};
