//! officeclip - copy web selections into Office with native equations
//!
//! This library turns a captured selection (HTML and/or plain text) into a
//! clipboard payload that Word, PowerPoint and OneNote paste with editable
//! equations, while every other consumer still gets readable text.
//!
//! # Features
//!
//! - **Math extraction**: TeX delimiters (`$…$`, `$$…$$`, `\(…\)`, `\[…\]`) in text nodes,
//!   with a currency guard and escaped-dollar handling
//! - **Conversion adapter**: ordered TeX → MathML backends (local, cross-context, embedded
//!   engine) with per-backend time budgets and a shared LRU cache
//! - **OMML transformer**: MathML → Office Math Markup Language
//! - **Anchored translation**: formulas and code are swapped for opaque tokens before
//!   translation and restored afterwards
//! - **CF_HTML**: byte-exact Windows clipboard HTML with offset headers, plus a validator
//! - **Delivery chain**: direct write, privileged context, helper document, legacy command
//! - **DOCX export**: the same Office HTML packaged as a Word document with native equations
//!
//! # Example - Copying a selection
//!
//! ```no_run
//! use std::sync::Arc;
//! use officeclip::clipboard::DeliveryChain;
//! use officeclip::config::{CopyConfig, MemoryConfigStore};
//! use officeclip::copy::{CopyMode, CopyOrchestrator, MathRenderer};
//! use officeclip::engine::BuiltinEngine;
//! use officeclip::math::Backend;
//! use officeclip::selection::SelectionSnapshot;
//!
//! # async fn run() -> officeclip::Result<()> {
//! let config = CopyConfig::default();
//! let renderer = MathRenderer::from_config(&config, vec![Backend::local()]);
//! let delivery = DeliveryChain::new(config.timeouts);
//! let copier = CopyOrchestrator::new(
//!     Arc::new(BuiltinEngine::new()),
//!     renderer,
//!     delivery,
//!     Arc::new(MemoryConfigStore::new(config)),
//! )?;
//!
//! let snapshot = SelectionSnapshot::new("", "Energy: $$E=mc^2$$");
//! let outcome = copier.copy_snapshot(snapshot, CopyMode::Office).await;
//! println!("copied: {} {:?}", outcome.ok, outcome.error);
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Building CF_HTML by hand
//!
//! ```
//! use officeclip::cfhtml;
//!
//! let payload = cfhtml::serialize("<b>bold</b>", None);
//! let offsets = payload.offsets();
//! assert_eq!(&payload.as_str()[offsets.start_fragment..offsets.end_fragment], "<b>bold</b>");
//! ```

/// Message bus between execution contexts
pub mod bus;

/// Windows clipboard HTML format
pub mod cfhtml;

/// Clipboard delivery strategies
pub mod clipboard;

/// Common types and utilities shared by the pipeline
pub mod common;

/// Pipeline configuration and its storage
pub mod config;

/// Copy orchestration and formula rendering
pub mod copy;

/// DOCX export
pub mod docx;

/// Normalization engine seam
pub mod engine;

/// HTML scanning, Office preparation and plain-text export
pub mod html;

/// HTML ↔ Markdown
pub mod markdown;

/// TeX extraction and TeX → MathML conversion
pub mod math;

/// MathML → OMML
pub mod omml;

/// Selection snapshots
pub mod selection;

/// Translation seam and anchoring
pub mod translate;

#[cfg(test)]
mod testing;

pub use common::{Error, Result};
pub use config::CopyConfig;
pub use copy::{CopyMode, CopyOrchestrator, CopyOutcome, CopyState};
