//! Shared error definitions and helpers used across all skillreg crates.

pub mod error;
pub mod fs;

pub use error::{Error, FromMessage, Result};
