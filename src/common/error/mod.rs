//! Unified error types for officeclip.
//!
//! This module provides a single error type covering selection capture, math
//! conversion, translation and clipboard delivery.

// Submodule declarations
pub mod types;
pub mod conversions;

// Re-exports
pub use types::{Error, Result};
