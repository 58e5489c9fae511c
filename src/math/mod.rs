//! Math in copied content.
//!
//! - [`extract`]: find TeX-delimited spans in text
//! - [`normalize`]: clean TeX before conversion
//! - [`local`]: in-process converter for the common TeX subset
//! - [`backend`] and [`adapter`]: ordered TeX → MathML conversion with fallback
//! - [`cache`]: the bounded conversion cache shared with the OMML transformer

pub mod adapter;
pub mod backend;
pub mod cache;
pub mod extract;
pub mod local;
pub mod normalize;

pub use adapter::ConversionAdapter;
pub use backend::{Backend, BackendKind, EngineBridge, EngineHandle, MathEngine};
pub use cache::{CacheKey, CacheMode, CacheStats, ConversionCache, DEFAULT_CACHE_CAPACITY, SharedCache};
pub use extract::{
    MathSegment, SegmentKind, extract, extract_with, is_excluded_container,
    segments_to_plain_text,
};
pub use local::{LocalConverter, LocalError, MATHML_NS};
pub use normalize::{normalize_for_backend, normalize_latex};
