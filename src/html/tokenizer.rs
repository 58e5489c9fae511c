// Lenient HTML tokenizer
//
// Clipboard HTML is a fragment, frequently unbalanced, and full of Office
// conditional comments that must survive byte for byte. The tokenizer never
// builds a tree and never rewrites anything: every token is a byte span into
// the source, so callers can copy untouched spans verbatim.

use crate::common::xml::decode_entities;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    StartTag,
    EndTag,
    Comment,
    /// Doctype, processing instruction, or `<![if ...]>` downlevel conditional
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub raw: &'a str,
    /// Lowercase tag name, empty for non-tag tokens
    pub name: String,
    pub self_closing: bool,
}

impl<'a> Token<'a> {
    /// Attribute value from a start tag, entities decoded.
    pub fn attr(&self, name: &str) -> Option<String> {
        if self.kind != TokenKind::StartTag {
            return None;
        }
        attr_value(self.raw, name)
    }

    #[inline]
    pub fn is_start(&self, name: &str) -> bool {
        self.kind == TokenKind::StartTag && self.name == name
    }

    #[inline]
    pub fn is_end(&self, name: &str) -> bool {
        self.kind == TokenKind::EndTag && self.name == name
    }

    /// Whether this start tag opens an element that needs a matching end tag.
    pub fn opens_element(&self) -> bool {
        self.kind == TokenKind::StartTag && !self.self_closing && !is_void(&self.name)
    }
}

/// Elements whose content is raw text up to the matching end tag
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Elements that never have content or an end tag
pub fn is_void(name: &str) -> bool {
    matches!(
        name,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta" | "source" | "track" | "wbr"
    )
}

pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    raw_text_until: Option<String>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self::at(src, 0)
    }

    /// Start tokenizing at byte offset `pos`, which must be a char boundary.
    pub fn at(src: &'a str, pos: usize) -> Self {
        Self {
            src,
            pos: pos.min(src.len()),
            raw_text_until: None,
        }
    }

    fn token(&mut self, kind: TokenKind, end: usize, name: String, self_closing: bool) -> Token<'a> {
        let start = self.pos;
        self.pos = end;
        Token {
            kind,
            start,
            end,
            raw: &self.src[start..end],
            name,
            self_closing,
        }
    }

    fn find_from(&self, from: usize, needle: &str) -> Option<usize> {
        self.src.get(from..)?.find(needle).map(|p| from + p)
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let src = self.src;
        let bytes = src.as_bytes();
        if self.pos >= src.len() {
            return None;
        }

        if let Some(name) = self.raw_text_until.take() {
            let end = find_end_tag_ci(src, self.pos, &name).unwrap_or(src.len());
            if end > self.pos {
                return Some(self.token(TokenKind::Text, end, String::new(), false));
            }
        }

        if bytes[self.pos] != b'<' {
            let end = memchr::memchr(b'<', &bytes[self.pos..])
                .map(|p| self.pos + p)
                .unwrap_or(src.len());
            return Some(self.token(TokenKind::Text, end, String::new(), false));
        }

        let rest = &src[self.pos..];
        if rest.starts_with("<!--") {
            let end = self.find_from(self.pos + 4, "-->").map(|p| p + 3).unwrap_or(src.len());
            return Some(self.token(TokenKind::Comment, end, String::new(), false));
        }
        if rest.starts_with("<![") {
            let end = self.find_from(self.pos + 3, "]>").map(|p| p + 2).unwrap_or(src.len());
            return Some(self.token(TokenKind::Other, end, String::new(), false));
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            let end = memchr::memchr(b'>', &bytes[self.pos..])
                .map(|p| self.pos + p + 1)
                .unwrap_or(src.len());
            return Some(self.token(TokenKind::Other, end, String::new(), false));
        }

        let is_end = rest.starts_with("</");
        let name_start = self.pos + if is_end { 2 } else { 1 };
        let starts_name = bytes.get(name_start).is_some_and(|b| b.is_ascii_alphabetic());
        if !starts_name {
            // A lone '<' is text
            let end = memchr::memchr(b'<', &bytes[self.pos + 1..])
                .map(|p| self.pos + 1 + p)
                .unwrap_or(src.len());
            return Some(self.token(TokenKind::Text, end, String::new(), false));
        }

        let Some(gt) = find_tag_end(src, self.pos) else {
            return Some(self.token(TokenKind::Text, src.len(), String::new(), false));
        };
        let name = tag_name(&src[name_start..gt]);
        if is_end {
            return Some(self.token(TokenKind::EndTag, gt + 1, name, false));
        }
        let self_closing = src[..gt].ends_with('/');
        if !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            self.raw_text_until = Some(name.clone());
        }
        Some(self.token(TokenKind::StartTag, gt + 1, name, self_closing))
    }
}

/// Index of the `>` closing the tag that starts at `lt`, honouring quoted attribute values.
pub fn find_tag_end(src: &str, lt: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in src.as_bytes().iter().enumerate().skip(lt) {
        match (quote, b) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {},
            (None, b'"') | (None, b'\'') => quote = Some(b),
            (None, b'>') => return Some(i),
            _ => {},
        }
    }
    None
}

fn tag_name(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn find_end_tag_ci(src: &str, from: usize, name: &str) -> Option<usize> {
    let needle = format!("</{}", name);
    let hay = src.get(from..)?;
    let bytes = hay.as_bytes();
    memchr::memmem::find_iter(bytes, b"</")
        .find(|&p| {
            bytes
                .get(p..p + needle.len())
                .is_some_and(|s| s.eq_ignore_ascii_case(needle.as_bytes()))
        })
        .map(|p| from + p)
}

/// Attribute value from the raw text of a start tag, entities decoded.
pub fn attr_value(raw_tag: &str, name: &str) -> Option<String> {
    let inner = raw_tag.trim_start_matches('<').trim_end_matches('>').trim_end_matches('/');
    let bytes = inner.as_bytes();
    // Skip the tag name
    let mut i = inner.find(|c: char| c.is_whitespace())?;
    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let key_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' {
            i += 1;
        }
        let key = &inner[key_start..i];
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let value = if bytes.get(i) == Some(&b'=') {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            match bytes.get(i) {
                Some(&q) if q == b'"' || q == b'\'' => {
                    let value_start = i + 1;
                    let value_end = memchr::memchr(q, &bytes[value_start..])
                        .map(|p| value_start + p)
                        .unwrap_or(bytes.len());
                    i = (value_end + 1).min(bytes.len());
                    &inner[value_start..value_end]
                },
                _ => {
                    let value_start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    &inner[value_start..i]
                },
            }
        } else {
            ""
        };
        if !key.is_empty() && key.eq_ignore_ascii_case(name) {
            return Some(decode_entities(value));
        }
        if key.is_empty() {
            i += 1;
        }
    }
    None
}

/// Byte offset just past the end tag matching the element opened by `open`.
///
/// Nested elements of the same name are counted. Returns `None` when the
/// fragment ends before the element is closed.
pub fn find_matching_end(src: &str, open: &Token<'_>) -> Option<usize> {
    if !open.opens_element() {
        return Some(open.end);
    }
    let mut depth = 1usize;
    for token in Tokenizer::at(src, open.end) {
        if token.name != open.name {
            continue;
        }
        match token.kind {
            TokenKind::StartTag if token.opens_element() => depth += 1,
            TokenKind::EndTag => {
                depth -= 1;
                if depth == 0 {
                    return Some(token.end);
                }
            },
            _ => {},
        }
    }
    None
}
