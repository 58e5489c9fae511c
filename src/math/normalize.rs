// LaTeX input normalization
//
// Copied math often carries zero-width characters and glyph-level Unicode
// that TeX backends reject. Normalization runs once per conversion, before the
// cache lookup, with a per-backend symbol table on top.

use super::backend::BackendKind;

/// Zero-width characters stripped from every input
const ZERO_WIDTH: [char; 5] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

/// Substitutions every backend needs
static COMMON_SUBSTITUTIONS: phf::Map<char, &'static str> = phf::phf_map! {
    // Private-use glyph some renderers emit for "not equals"
    '\u{E020}' => "\\neq ",
    // Double vertical bar (norm)
    '\u{2016}' => "\\|",
};

/// Unicode operators the TeX-grammar backends want as control sequences
static TEX_SUBSTITUTIONS: phf::Map<char, &'static str> = phf::phf_map! {
    '\u{2297}' => "\\otimes ",
    '\u{03F5}' => "\\epsilon ",
    '\u{03D5}' => "\\phi ",
    '\u{2192}' => "\\to ",
    '\u{2260}' => "\\neq ",
    '\u{27E8}' => "\\langle ",
    '\u{27E9}' => "\\rangle ",
    '\u{2264}' => "\\leq ",
    '\u{2265}' => "\\geq ",
    '\u{00D7}' => "\\times ",
    '\u{00B7}' => "\\cdot ",
    '\u{2212}' => "-",
    '\u{221E}' => "\\infty ",
};

/// Strip zero-width characters and apply the common substitutions.
///
/// # Example
/// ```
/// use officeclip::math::normalize_latex;
/// assert_eq!(normalize_latex("a\u{200B}b"), "ab");
/// ```
pub fn normalize_latex(latex: &str) -> String {
    let mut out = String::with_capacity(latex.len());
    for ch in latex.chars() {
        if ZERO_WIDTH.contains(&ch) {
            continue;
        }
        match COMMON_SUBSTITUTIONS.get(&ch) {
            Some(sub) => out.push_str(sub),
            None => out.push(ch),
        }
    }
    out.trim().to_string()
}

/// Apply the substitutions a specific backend expects.
///
/// The cross-context backend receives the commonly-normalized string as-is;
/// the engines on the other side apply their own tables.
pub fn normalize_for_backend(latex: &str, backend: BackendKind) -> String {
    match backend {
        BackendKind::CrossContext => latex.to_string(),
        BackendKind::Local | BackendKind::EmbeddedEngine => {
            let mut out = String::with_capacity(latex.len());
            for ch in latex.chars() {
                match TEX_SUBSTITUTIONS.get(&ch) {
                    Some(sub) => out.push_str(sub),
                    None => out.push(ch),
                }
            }
            out.trim_end().to_string()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_zero_width() {
        assert_eq!(normalize_latex("\u{FEFF}x\u{200D}^2\u{2060}"), "x^2");
    }

    #[test]
    fn test_private_use_not_equals() {
        assert_eq!(normalize_latex("a\u{E020}b"), "a\\neq b");
    }

    #[test]
    fn test_backend_specific_symbols() {
        assert_eq!(normalize_for_backend("a→b", BackendKind::Local), "a\\to b");
        assert_eq!(normalize_for_backend("a→b", BackendKind::CrossContext), "a→b");
        assert_eq!(normalize_for_backend("x≠y", BackendKind::EmbeddedEngine), "x\\neq y");
    }
}
