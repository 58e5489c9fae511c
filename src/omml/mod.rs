//! MathML → Office Math (OMML) transformation.
//!
//! The transformer is stateless apart from the shared conversion cache:
//! the same MathML string always produces the same OMML, so results are cached
//! by the raw MathML. Malformed input returns an [`OmmlError`]; the renderer
//! then keeps the formula's source text instead.
//!
//! # Example
//!
//! ```
//! use officeclip::omml::OmmlTransformer;
//! use officeclip::math::SharedCache;
//!
//! let transformer = OmmlTransformer::new(SharedCache::new(16));
//! let omml = transformer
//!     .transform("<math><msup><mi>x</mi><mn>2</mn></msup></math>")
//!     .unwrap();
//! assert!(omml.starts_with("<m:oMath><m:sSup>"));
//! ```

mod error;
mod lookup;
mod tree;
mod writer;

pub use error::OmmlError;

use crate::math::{CacheKey, CacheMode, SharedCache};

/// OMML namespace bound to the `m:` prefix in clipboard HTML
pub const OMML_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/math";

/// MathML → OMML rewriter backed by the shared cache
#[derive(Debug, Clone, Default)]
pub struct OmmlTransformer {
    cache: SharedCache,
}

impl OmmlTransformer {
    pub fn new(cache: SharedCache) -> Self {
        Self { cache }
    }

    /// Rewrite one `<math>` element.
    pub fn transform(&self, mathml: &str) -> Result<String, OmmlError> {
        let key = CacheKey::new(CacheMode::Omml, mathml);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let root = tree::parse(mathml)?;
        let omml = writer::write_omml(&root)?;
        self.cache.put(key, omml.clone());
        Ok(omml)
    }
}

/// Whether OMML, or an Office math block wrapping it, is a display (paragraph) equation.
#[inline]
pub fn is_display(omml: &str) -> bool {
    omml.contains("<m:oMathPara")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_is_cached_by_mathml() {
        let cache = SharedCache::new(8);
        let transformer = OmmlTransformer::new(cache.clone());
        let mathml = "<math display=\"block\"><mi>x</mi></math>";
        let first = transformer.transform(mathml).unwrap();
        let second = transformer.transform(mathml).unwrap();
        assert_eq!(first, second);
        assert!(is_display(&first));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_malformed_is_an_error_and_not_cached() {
        let cache = SharedCache::new(8);
        let transformer = OmmlTransformer::new(cache.clone());
        let broken = "<math><mi>x</math>";
        assert!(transformer.transform(broken).is_err());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_display_detected_inside_office_block() {
        let inline = crate::html::office_math_html("<m:oMath><m:r><m:t>x</m:t></m:r></m:oMath>", "x");
        let display = crate::html::office_math_html("<m:oMathPara><m:oMath></m:oMath></m:oMathPara>", "x");
        assert!(!is_display(&inline));
        assert!(is_display(&display));
    }

    #[test]
    fn test_local_converter_output_round_trips() {
        let mathml = crate::math::LocalConverter::new()
            .convert("\\sum_{i=1}^{n} \\frac{1}{i}", true)
            .unwrap();
        let omml = OmmlTransformer::default().transform(&mathml).unwrap();
        assert!(omml.starts_with("<m:oMathPara><m:oMath>"));
        assert!(omml.contains("<m:nary>"));
        assert!(omml.contains("<m:e><m:f>"));
    }
}
