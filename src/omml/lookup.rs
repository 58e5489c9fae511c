use phf::{phf_map, phf_set};

/// How a MathML element is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Children are written in place
    Row,
    /// Only the first child is kept (`semantics`)
    FirstChild,
    /// Element and its content are dropped
    Strip,
    /// Identifier run
    Identifier,
    /// Number run
    Number,
    /// Operator run
    Operator,
    /// Upright text run
    Text,
    /// String literal run, quoted
    StringLiteral,
    /// Space run
    Space,
    Sup,
    Sub,
    SubSup,
    Multiscripts,
    Fraction,
    Sqrt,
    Root,
    Fenced,
    Under,
    Over,
    UnderOver,
    Table,
    TableRow,
    LabeledRow,
    Cell,
    Enclose,
    Phantom,
}

/// Rule table keyed by MathML local name
pub static ELEMENT_RULES: phf::Map<&'static str, Rule> = phf_map! {
    // Containers
    "math" => Rule::Row,
    "mrow" => Rule::Row,
    "mstyle" => Rule::Row,
    "mpadded" => Rule::Row,
    "merror" => Rule::Row,
    "maction" => Rule::FirstChild,
    "semantics" => Rule::FirstChild,
    "annotation" => Rule::Strip,
    "annotation-xml" => Rule::Strip,
    "none" => Rule::Strip,
    "mprescripts" => Rule::Strip,

    // Tokens
    "mi" => Rule::Identifier,
    "mn" => Rule::Number,
    "mo" => Rule::Operator,
    "mtext" => Rule::Text,
    "ms" => Rule::StringLiteral,
    "mspace" => Rule::Space,

    // Scripts
    "msup" => Rule::Sup,
    "msub" => Rule::Sub,
    "msubsup" => Rule::SubSup,
    "mmultiscripts" => Rule::Multiscripts,
    "munder" => Rule::Under,
    "mover" => Rule::Over,
    "munderover" => Rule::UnderOver,

    // Layout
    "mfrac" => Rule::Fraction,
    "msqrt" => Rule::Sqrt,
    "mroot" => Rule::Root,
    "mfenced" => Rule::Fenced,
    "menclose" => Rule::Enclose,
    "mphantom" => Rule::Phantom,

    // Tables
    "mtable" => Rule::Table,
    "mtr" => Rule::TableRow,
    "mlabeledtr" => Rule::LabeledRow,
    "mtd" => Rule::Cell,
};

/// Operators rendered as `m:nary`
pub static NARY_OPERATORS: phf::Set<&'static str> = phf_set! {
    "∑", "∏", "∐", "∫", "∬", "∭", "∮", "⋃", "⋂", "⋁", "⋀",
};

/// Integral-like n-ary operators put their limits beside the sign
pub static INTEGRALS: phf::Set<&'static str> = phf_set! {
    "∫", "∬", "∭", "∮",
};

/// Over-script characters that make `mover` an accent, mapped to the combining
/// mark Office expects in `m:chr`
pub static ACCENTS: phf::Map<&'static str, &'static str> = phf_map! {
    "^" => "\u{0302}",
    "ˆ" => "\u{0302}",
    "\u{0302}" => "\u{0302}",
    "~" => "\u{0303}",
    "˜" => "\u{0303}",
    "\u{0303}" => "\u{0303}",
    "˙" => "\u{0307}",
    "\u{0307}" => "\u{0307}",
    "¨" => "\u{0308}",
    "\u{0308}" => "\u{0308}",
    "˘" => "\u{0306}",
    "ˇ" => "\u{030C}",
    "´" => "\u{0301}",
    "`" => "\u{0300}",
    "→" => "\u{20D7}",
    "\u{20D7}" => "\u{20D7}",
};

/// Over/under characters rendered as `m:bar`
pub static BARS: phf::Set<&'static str> = phf_set! {
    "¯", "‾", "_", "\u{0305}", "\u{0332}", "―", "−",
};

/// Opening fence characters paired with their closing counterpart
pub static FENCE_PAIRS: phf::Map<&'static str, &'static str> = phf_map! {
    "(" => ")",
    "[" => "]",
    "{" => "}",
    "⟨" => "⟩",
    "〈" => "〉",
    "|" => "|",
    "‖" => "‖",
    "⌊" => "⌋",
    "⌈" => "⌉",
};

/// Closing fence characters
pub static CLOSING_FENCES: phf::Set<&'static str> = phf_set! {
    ")", "]", "}", "⟩", "〉", "|", "‖", "⌋", "⌉",
};

/// `mathvariant` values and their OMML run properties (`m:sty`, `m:scr`)
pub static VARIANTS: phf::Map<&'static str, (Option<&'static str>, Option<&'static str>)> = phf_map! {
    "normal" => (Some("p"), None),
    "bold" => (Some("b"), None),
    "italic" => (Some("i"), None),
    "bold-italic" => (Some("bi"), None),
    "double-struck" => (Some("p"), Some("double-struck")),
    "script" => (Some("p"), Some("script")),
    "bold-script" => (Some("b"), Some("script")),
    "fraktur" => (Some("p"), Some("fraktur")),
    "bold-fraktur" => (Some("b"), Some("fraktur")),
    "sans-serif" => (Some("p"), Some("sans-serif")),
    "bold-sans-serif" => (Some("b"), Some("sans-serif")),
    "monospace" => (Some("p"), Some("monospace")),
};

/// Invisible operators that carry no visible run
pub static INVISIBLE_OPERATORS: phf::Set<&'static str> = phf_set! {
    "\u{2061}", "\u{2062}", "\u{2063}", "\u{2064}",
};

#[inline]
pub fn rule_for(name: &str) -> Option<Rule> {
    ELEMENT_RULES.get(name).copied()
}

#[inline]
pub fn is_nary(op: &str) -> bool {
    NARY_OPERATORS.contains(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules() {
        assert_eq!(rule_for("mfrac"), Some(Rule::Fraction));
        assert_eq!(rule_for("annotation"), Some(Rule::Strip));
        assert_eq!(rule_for("blink"), None);
    }

    #[test]
    fn test_nary_set() {
        for op in ["∑", "∏", "∐", "∫", "∬", "∭", "∮", "⋃", "⋂", "⋁", "⋀"] {
            assert!(is_nary(op), "{} should be n-ary", op);
        }
        assert!(!is_nary("+"));
    }

    #[test]
    fn test_fences_close_what_they_open() {
        for (_, close) in FENCE_PAIRS.entries() {
            assert!(CLOSING_FENCES.contains(close));
        }
    }
}
