//! Common types, traits, and utilities shared across the pipeline.

// Submodule declarations
pub mod error;
pub mod id;
pub mod ready;
pub mod xml;

// Re-exports for convenience
pub use error::{Error, Result};
pub use ready::await_ready;
