//! # hb-core
//!
//! Shared error and value types for histbook: the error taxonomy used by
//! every crate, event columns as supplied by callers, and the category keys
//! that label group levels of accumulated content.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Column, GroupKey, Symbols};
