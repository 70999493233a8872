//! Domain layer for Evidex.
//!
//! Holds the versioned conversation model, the quotation locator, the
//! upstream reference contract and the shared error type. Nothing in this
//! crate performs I/O.

pub mod config;
pub mod conversation;
pub mod error;
pub mod evidence;
pub mod reference;

// Re-export common error type
pub use error::{EvidexError, Result};
