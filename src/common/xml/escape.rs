use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;

// Static initialization: automaton is built only once, thread-safe
static XML_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\"", "'"])
        .expect("Failed to build XML escaper")
});

static TEXT_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">"])
        .expect("Failed to build text escaper")
});

/// Named entities that show up in copied HTML and pre-rendered MathML.
static NAMED_ENTITIES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "amp" => "&",
    "lt" => "<",
    "gt" => ">",
    "quot" => "\"",
    "apos" => "'",
    "nbsp" => "\u{00A0}",
    "thinsp" => "\u{2009}",
    "ensp" => "\u{2002}",
    "emsp" => "\u{2003}",
    "minus" => "\u{2212}",
    "times" => "\u{00D7}",
    "divide" => "\u{00F7}",
    "plusmn" => "\u{00B1}",
    "middot" => "\u{00B7}",
    "le" => "\u{2264}",
    "ge" => "\u{2265}",
    "ne" => "\u{2260}",
    "infin" => "\u{221E}",
    "sum" => "\u{2211}",
    "prod" => "\u{220F}",
    "int" => "\u{222B}",
    "InvisibleTimes" => "\u{2062}",
    "ApplyFunction" => "\u{2061}",
    "af" => "\u{2061}",
    "it" => "\u{2062}",
    "InvisibleComma" => "\u{2063}",
    "ic" => "\u{2063}",
    "PlusMinus" => "\u{00B1}",
    "RightArrow" => "\u{2192}",
    "rarr" => "\u{2192}",
    "larr" => "\u{2190}",
    "hellip" => "\u{2026}",
};

/// Escape XML special characters, including quotes, for attribute values.
///
/// # Examples
///
/// ```
/// use officeclip::common::xml::escape_xml;
/// assert_eq!(escape_xml("a & b"), "a &amp; b");
/// assert_eq!(escape_xml("<tag>\"hello\"</tag>"), "&lt;tag&gt;&quot;hello&quot;&lt;/tag&gt;");
/// ```
#[inline]
pub fn escape_xml(s: &str) -> String {
    XML_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
}

/// Escape character data for element content (quotes stay literal).
///
/// # Examples
///
/// ```
/// use officeclip::common::xml::escape_text;
/// assert_eq!(escape_text("x < y & \"z\""), "x &lt; y &amp; \"z\"");
/// ```
#[inline]
pub fn escape_text(s: &str) -> String {
    TEXT_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;"])
}

/// Resolve a single entity name (without `&` and `;`).
///
/// Handles decimal (`#8722`) and hexadecimal (`#x2212`) references as well as
/// the named entities in the table above.
pub fn resolve_entity(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(|c| c.to_string());
    }
    NAMED_ENTITIES.get(name).map(|s| (*s).to_string())
}

/// Decode character and entity references.
///
/// Unknown or malformed entities are left unchanged.
///
/// # Examples
///
/// ```
/// use officeclip::common::xml::decode_entities;
/// assert_eq!(decode_entities("&lt;a &amp; b&gt;"), "<a & b>");
/// assert_eq!(decode_entities("&#x3B1;&#946;"), "αβ");
/// assert_eq!(decode_entities("&amp;lt;"), "&lt;");
/// assert_eq!(decode_entities("a & b"), "a & b");
/// assert_eq!(decode_entities("&invalid;"), "&invalid;");
/// ```
pub fn decode_entities(s: &str) -> String {
    if memchr::memchr(b'&', s.as_bytes()).is_none() {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        // Entity names are short; do not scan arbitrarily far for the semicolon
        let semi = tail
            .char_indices()
            .take(32)
            .find(|(_, c)| *c == ';' || *c == '&' || c.is_whitespace())
            .filter(|(_, c)| *c == ';')
            .map(|(i, _)| i);
        match semi.and_then(|i| resolve_entity(&tail[..i]).map(|v| (i, v))) {
            Some((i, value)) => {
                out.push_str(&value);
                rest = &tail[i + 1..];
            },
            None => {
                out.push('&');
                rest = tail;
            },
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_text_keeps_quotes() {
        assert_eq!(escape_text("say \"hi\" & 'bye'"), "say \"hi\" &amp; 'bye'");
    }

    #[test]
    fn test_resolve_mathml_entities() {
        assert_eq!(resolve_entity("InvisibleTimes").as_deref(), Some("\u{2062}"));
        assert_eq!(resolve_entity("#x2211").as_deref(), Some("∑"));
        assert_eq!(resolve_entity("bogus"), None);
    }

    #[test]
    fn test_decode_leaves_dangling_ampersand() {
        assert_eq!(decode_entities("R&D &amp co"), "R&D &amp co");
        assert_eq!(decode_entities("x&nbsp;y"), "x\u{00A0}y");
    }
}
