// Math segment extraction
//
// Splits a text run into an ordered sequence of text and math segments.
// Delimiters are tried at every candidate position in a fixed order so that
// longer forms win over their prefixes:
//
// 1. `$$...$$`                (display)
// 2. `\[...\]` and `\(...\)`  (display / inline)
// 3. `\begin{env}...\end{env}` with a matching name (display)
// 4. `$...$`                  (inline), never on an escaped `\$`
//
// There is no lookbehind engine here; escaped delimiters are detected by
// counting the backslashes immediately before the candidate byte. That manual
// scan is an approximation of a lookbehind pattern and may differ on
// pathological runs of backslashes inside math.

use crate::common::xml::decode_entities;
use serde::Serialize;

/// HTML containers whose text must never be scanned for math.
pub const EXCLUDED_CONTAINERS: &[&str] = &[
    "code", "pre", "script", "style", "kbd", "samp", "textarea", "math", "noscript", "template",
];

/// Default skip predicate used by the HTML walker.
#[inline]
pub fn is_excluded_container(tag: &str) -> bool {
    EXCLUDED_CONTAINERS
        .iter()
        .any(|t| t.eq_ignore_ascii_case(tag))
}

/// Kind of an extracted segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SegmentKind {
    Text,
    Math,
}

/// One piece of an extracted text run.
///
/// For text segments `latex` is empty and `raw` is the literal text. For math
/// segments `raw` is the delimited source (delimiters included) and `latex`
/// the trimmed, entity-decoded content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MathSegment {
    pub kind: SegmentKind,
    pub raw: String,
    pub latex: String,
    pub display: bool,
}

impl MathSegment {
    pub fn text(raw: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Text,
            raw: raw.into(),
            latex: String::new(),
            display: false,
        }
    }

    pub fn math(raw: impl Into<String>, latex: impl Into<String>, display: bool) -> Self {
        Self {
            kind: SegmentKind::Math,
            raw: raw.into(),
            latex: latex.into(),
            display,
        }
    }

    #[inline]
    pub fn is_math(&self) -> bool {
        self.kind == SegmentKind::Math
    }
}

/// Outcome of trying the delimiter grammars at one position
enum Candidate {
    /// A math span ending at the given byte offset
    Math(MathSegment, usize),
    /// Well-formed delimiters around nothing; keep as literal text up to the offset
    Literal(usize),
}

/// Extract math segments from a text run.
///
/// The returned segments cover the input with no gaps, in input order.
/// Input without delimiters yields exactly one text segment equal to the input.
///
/// # Example
/// ```
/// use officeclip::math::extract;
///
/// let segments = extract("$$a$$ $b$");
/// assert_eq!(segments.len(), 3);
/// assert!(segments[0].display);
/// assert_eq!(segments[2].latex, "b");
/// ```
pub fn extract(text: &str) -> Vec<MathSegment> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut pending = 0;
    let mut i = 0;

    while let Some(off) = memchr::memchr2(b'$', b'\\', &bytes[i..]) {
        let pos = i + off;
        match candidate_at(text, pos) {
            Some(Candidate::Math(segment, end)) => {
                push_text(&mut segments, &text[pending..pos]);
                segments.push(segment);
                i = end;
                pending = end;
            },
            Some(Candidate::Literal(end)) => {
                i = end;
            },
            // Delimiter bytes are ASCII, so pos + 1 is always a char boundary
            None => i = pos + 1,
        }
        if i >= bytes.len() {
            break;
        }
    }

    push_text(&mut segments, &text[pending..]);
    if segments.is_empty() {
        segments.push(MathSegment::text(text));
    }
    segments
}

/// Extract with an ancestor-aware skip predicate.
///
/// When any of `ancestors` (innermost last) satisfies `skip`, the text is
/// returned verbatim as a single text segment.
pub fn extract_with<F>(text: &str, ancestors: &[&str], skip: F) -> Vec<MathSegment>
where
    F: Fn(&str) -> bool,
{
    if ancestors.iter().any(|tag| skip(tag)) {
        return vec![MathSegment::text(text)];
    }
    extract(text)
}

/// Plain-text rendering: literal text plus the bare LaTeX of each formula.
pub fn segments_to_plain_text(segments: &[MathSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment.kind {
            SegmentKind::Text => out.push_str(&segment.raw),
            SegmentKind::Math => out.push_str(&segment.latex),
        }
    }
    out
}

fn push_text(segments: &mut Vec<MathSegment>, text: &str) {
    if text.is_empty() {
        return;
    }
    match segments.last_mut() {
        Some(last) if last.kind == SegmentKind::Text => last.raw.push_str(text),
        _ => segments.push(MathSegment::text(text)),
    }
}

/// A byte is escaped when preceded by an odd number of backslashes.
fn is_escaped(bytes: &[u8], pos: usize) -> bool {
    let run = bytes[..pos].iter().rev().take_while(|b| **b == b'\\').count();
    run % 2 == 1
}

fn candidate_at(text: &str, pos: usize) -> Option<Candidate> {
    let bytes = text.as_bytes();
    if is_escaped(bytes, pos) {
        return None;
    }
    let rest = &text[pos..];

    // 1. Double-dollar display math
    if rest.starts_with("$$") {
        return delimited(text, pos, "$$", "$$", true);
    }

    // 2. Bracket display and paren inline math
    if rest.starts_with("\\[") {
        return delimited(text, pos, "\\[", "\\]", true);
    }
    if rest.starts_with("\\(") {
        return delimited(text, pos, "\\(", "\\)", false);
    }

    // 3. Environment blocks
    if rest.starts_with("\\begin{") {
        return environment(text, pos);
    }

    // 4. Single-dollar inline math
    if bytes[pos] == b'$' {
        return inline_dollar(text, pos);
    }

    None
}

/// Find `close` after `pos + open.len()`, skipping escaped occurrences.
fn find_unescaped(text: &str, from: usize, close: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut search = from;
    while let Some(rel) = text[search..].find(close) {
        let at = search + rel;
        // `\]` and `\)` carry their own backslash; only `$` can be escaped
        if close.starts_with('$') && is_escaped(bytes, at) {
            search = at + 1;
            continue;
        }
        return Some(at);
    }
    None
}

fn delimited(text: &str, pos: usize, open: &str, close: &str, display: bool) -> Option<Candidate> {
    let inner_start = pos + open.len();
    let close_at = find_unescaped(text, inner_start, close)?;
    let end = close_at + close.len();
    let inner = &text[inner_start..close_at];
    if inner.trim().is_empty() {
        return Some(Candidate::Literal(end));
    }
    let latex = decode_entities(inner.trim());
    Some(Candidate::Math(
        MathSegment::math(&text[pos..end], latex, display),
        end,
    ))
}

fn environment(text: &str, pos: usize) -> Option<Candidate> {
    let name_start = pos + "\\begin{".len();
    let name_len = text[name_start..].find('}')?;
    let name = &text[name_start..name_start + name_len];
    if name.is_empty()
        || !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'*')
    {
        return None;
    }

    let open = format!("\\begin{{{}}}", name);
    let close = format!("\\end{{{}}}", name);
    let mut depth = 1usize;
    let mut cursor = name_start + name_len + 1;

    // Same-name environments may nest; only the matching close ends the block
    loop {
        let next_open = text[cursor..].find(&open).map(|r| cursor + r);
        let next_close = text[cursor..].find(&close).map(|r| cursor + r)?;
        match next_open {
            Some(o) if o < next_close => {
                depth += 1;
                cursor = o + open.len();
            },
            _ => {
                depth -= 1;
                cursor = next_close + close.len();
                if depth == 0 {
                    break;
                }
            },
        }
    }

    let raw = &text[pos..cursor];
    Some(Candidate::Math(
        MathSegment::math(raw, decode_entities(raw.trim()), true),
        cursor,
    ))
}

/// Numeric-only spans such as `100` or `1,299.00` are prices, not math.
fn is_currency_like(inner: &str) -> bool {
    let t = inner.trim();
    t.is_empty()
        || t
            .bytes()
            .all(|b| b.is_ascii_digit() || b == b',' || b == b'.')
}

fn inline_dollar(text: &str, pos: usize) -> Option<Candidate> {
    let bytes = text.as_bytes();

    // Currency guard: "$100 and $200" must not pair the two dollars
    let word_end = bytes[pos + 1..]
        .iter()
        .position(|b| b.is_ascii_whitespace() || *b == b'$')
        .map(|r| pos + 1 + r)
        .unwrap_or(bytes.len());
    if word_end > pos + 1
        && word_end < bytes.len()
        && bytes[word_end].is_ascii_whitespace()
        && is_currency_like(&text[pos + 1..word_end])
    {
        return None;
    }

    let close_at = find_unescaped(text, pos + 1, "$")?;
    let inner = &text[pos + 1..close_at];
    if is_currency_like(inner) || inner.trim().is_empty() {
        return None;
    }
    let end = close_at + 1;
    Some(Candidate::Math(
        MathSegment::math(&text[pos..end], decode_entities(inner.trim()), false),
        end,
    ))
}
