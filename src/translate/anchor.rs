//! Formula and code anchoring around machine translation.
//!
//! Translation services rewrite anything that looks like prose, including
//! markup they do not understand. Before translation every protected span is
//! swapped for an opaque token; afterwards the tokens are swapped back.
//!
//! Tokens are made of uppercase ASCII letters and digits only, so services
//! treat them as an untranslatable proper noun:
//!
//! ```text
//! COFX 7KQ2M9XA F 0003 Z
//! │    │        │ │    └ terminator
//! │    │        │ └ index within the request
//! │    │        └ kind: F formula, C code
//! │    └ per-request nonce
//! └ prefix
//! ```
//!
//! Protected spans are Office math blocks (with their fallback), formula
//! placeholders, `<math>` elements, elements with a `data-math` attribute,
//! outermost `<pre>` elements and `<code>` elements.

use crate::common::id::generate_nonce;
use crate::html::{TokenKind, Tokenizer, find_matching_end, html_to_plain_text, office_math_block};
use aho_corasick::AhoCorasick;
use std::collections::HashMap;

pub const TOKEN_PREFIX: &str = "COFX";
const TOKEN_TERMINATOR: char = 'Z';
const NONCE_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorKind {
    Formula,
    Code,
}

impl AnchorKind {
    #[inline]
    pub fn letter(&self) -> char {
        match self {
            AnchorKind::Formula => 'F',
            AnchorKind::Code => 'C',
        }
    }
}

/// One protected span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorToken {
    pub id: String,
    pub original: String,
    pub kind: AnchorKind,
    /// TeX source of a formula, when known
    pub latex: Option<String>,
}

/// Anchored HTML plus the token table needed to restore it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchoredHtml {
    pub html: String,
    pub tokens: Vec<AnchorToken>,
}

impl AnchoredHtml {
    pub fn formulas(&self) -> impl Iterator<Item = &AnchorToken> {
        self.tokens.iter().filter(|t| t.kind == AnchorKind::Formula)
    }
}

/// Result of putting protected spans back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub html: String,
    pub restored: usize,
    pub anomalies: Vec<String>,
}

impl RestoreOutcome {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }
}

/// Replace protected spans with tokens using a fresh nonce.
///
/// # Example
/// ```
/// use officeclip::translate::{anchor, restore};
/// use std::collections::HashMap;
///
/// let html = "<p>See <code>x += 1</code> now</p>";
/// let anchored = anchor(html);
/// assert!(!anchored.html.contains("<code>"));
/// let restored = restore(&anchored.html, &anchored.tokens, false, &HashMap::new());
/// assert_eq!(restored.html, html);
/// ```
pub fn anchor(html: &str) -> AnchoredHtml {
    let upper = html.to_ascii_uppercase();
    let mut nonce = generate_nonce();
    for _ in 0..NONCE_ATTEMPTS {
        if !upper.contains(&format!("{}{}", TOKEN_PREFIX, nonce)) {
            break;
        }
        nonce = generate_nonce();
    }
    anchor_with_nonce(html, &nonce)
}

/// Replace protected spans with tokens built from `nonce`.
pub fn anchor_with_nonce(html: &str, nonce: &str) -> AnchoredHtml {
    let mut out = String::with_capacity(html.len());
    let mut tokens: Vec<AnchorToken> = Vec::new();
    let mut stream = Tokenizer::new(html);

    let mut protect = |out: &mut String, original: &str, kind: AnchorKind, latex: Option<String>| {
        let id = format!(
            "{}{}{}{:04}{}",
            TOKEN_PREFIX,
            nonce,
            kind.letter(),
            tokens.len(),
            TOKEN_TERMINATOR
        );
        out.push_str(&id);
        tokens.push(AnchorToken {
            id,
            original: original.to_string(),
            kind,
            latex,
        });
    };

    while let Some(token) = stream.next() {
        if let Some((end, latex)) = office_math_block(html, &token) {
            let latex = Some(latex).filter(|l| !l.is_empty());
            protect(&mut out, &html[token.start..end], AnchorKind::Formula, latex);
            stream = Tokenizer::at(html, end);
            continue;
        }
        let span_end = match token.kind {
            TokenKind::Comment if token.raw.starts_with("<!--COF_TEX_") => {
                protect(&mut out, token.raw, AnchorKind::Formula, None);
                Some(token.end)
            },
            TokenKind::StartTag if token.name == "math" => {
                let end = find_matching_end(html, &token).unwrap_or(html.len());
                let markup = &html[token.start..end];
                protect(&mut out, markup, AnchorKind::Formula, Some(html_to_plain_text(markup)));
                Some(end)
            },
            TokenKind::StartTag if token.attr("data-math").is_some() => {
                let end = find_matching_end(html, &token).unwrap_or(token.end);
                protect(&mut out, &html[token.start..end], AnchorKind::Formula, token.attr("data-math"));
                Some(end)
            },
            TokenKind::StartTag if token.name == "pre" || token.name == "code" => {
                let end = find_matching_end(html, &token).unwrap_or(html.len());
                protect(&mut out, &html[token.start..end], AnchorKind::Code, None);
                Some(end)
            },
            _ => {
                out.push_str(token.raw);
                None
            },
        };
        if let Some(end) = span_end {
            stream = Tokenizer::at(html, end);
        }
    }

    AnchoredHtml { html: out, tokens }
}

/// Put protected spans back into translated text.
///
/// Tokens are matched case-insensitively, since some services change case.
/// With `translate_formulas` set, formula tokens present in `translated` get
/// that markup instead of their original. Each token is consumed once: a
/// duplicated token is dropped and a missing one is appended at the end, both
/// recorded as anomalies.
pub fn restore(
    text: &str,
    tokens: &[AnchorToken],
    translate_formulas: bool,
    translated: &HashMap<String, String>,
) -> RestoreOutcome {
    if tokens.is_empty() {
        return RestoreOutcome {
            html: text.to_string(),
            ..Default::default()
        };
    }

    let matcher = match AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(tokens.iter().map(|t| t.id.as_str()))
    {
        Ok(matcher) => matcher,
        Err(e) => {
            return RestoreOutcome {
                html: text.to_string(),
                restored: 0,
                anomalies: vec![format!("token matcher could not be built: {}", e)],
            };
        },
    };

    let replacement = |token: &AnchorToken| -> String {
        if translate_formulas && token.kind == AnchorKind::Formula {
            if let Some(markup) = translated.get(&token.id) {
                return markup.clone();
            }
        }
        token.original.clone()
    };

    let mut out = String::with_capacity(text.len() + tokens.iter().map(|t| t.original.len()).sum::<usize>());
    let mut used = vec![false; tokens.len()];
    let mut anomalies = Vec::new();
    let mut last = 0;
    for found in matcher.find_iter(text) {
        out.push_str(&text[last..found.start()]);
        let index = found.pattern().as_usize();
        let token = &tokens[index];
        if used[index] {
            anomalies.push(format!("token {} appeared more than once", token.id));
        } else {
            used[index] = true;
            out.push_str(&replacement(token));
        }
        last = found.end();
    }
    out.push_str(&text[last..]);

    for (token, _) in tokens.iter().zip(&used).filter(|(_, used)| !**used) {
        anomalies.push(format!("token {} missing from translated text", token.id));
        out.push_str(&replacement(token));
    }

    for anomaly in &anomalies {
        tracing::warn!(%anomaly, "anchor restore anomaly");
    }

    RestoreOutcome {
        html: out,
        restored: used.iter().filter(|u| **u).count(),
        anomalies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NONCE: &str = "7KQ2M9XA";

    fn roundtrip(html: &str) -> String {
        let anchored = anchor(html);
        restore(&anchored.html, &anchored.tokens, false, &HashMap::new()).html
    }

    #[test]
    fn test_token_shape() {
        let anchored = anchor_with_nonce("<code>a</code><math><mi>x</mi></math>", NONCE);
        assert_eq!(anchored.tokens[0].id, "COFX7KQ2M9XAC0000Z");
        assert_eq!(anchored.tokens[1].id, "COFX7KQ2M9XAF0001Z");
        assert_eq!(anchored.html, "COFX7KQ2M9XAC0000ZCOFX7KQ2M9XAF0001Z");
        for token in &anchored.tokens {
            assert!(token.id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_office_math_block_is_one_span() {
        let html = "<p>E: <!--[if gte msEquation 12]><m:oMath/><![endif]--><![if !msEquation]><span>E=mc^2</span><![endif]> ok</p>";
        let anchored = anchor_with_nonce(html, NONCE);
        assert_eq!(anchored.html, "<p>E: COFX7KQ2M9XAF0000Z ok</p>");
        assert_eq!(anchored.tokens[0].latex.as_deref(), Some("E=mc^2"));
        assert_eq!(roundtrip(html), html);
    }

    #[test]
    fn test_outermost_pre_only() {
        let html = "<pre><code>x</code><pre>y</pre></pre>after <code>z</code>";
        let anchored = anchor_with_nonce(html, NONCE);
        assert_eq!(anchored.tokens.len(), 2);
        assert_eq!(anchored.tokens[0].original, "<pre><code>x</code><pre>y</pre></pre>");
        assert_eq!(anchored.tokens[1].kind, AnchorKind::Code);
    }

    #[test]
    fn test_data_math_and_placeholders() {
        let html = "<span data-math=\"x+1\">x+1</span> and <!--COF_TEX_0-->";
        let anchored = anchor_with_nonce(html, NONCE);
        assert_eq!(anchored.formulas().count(), 2);
        assert_eq!(anchored.tokens[0].latex.as_deref(), Some("x+1"));
    }

    #[test]
    fn test_restore_after_translation_reorders_and_changes_case() {
        let html = "<p>A <code>a</code> B <code>b</code></p>";
        let anchored = anchor_with_nonce(html, NONCE);
        let translated = format!(
            "<p>b {} a {}</p>",
            anchored.tokens[1].id.to_ascii_lowercase(),
            anchored.tokens[0].id
        );
        let outcome = restore(&translated, &anchored.tokens, false, &HashMap::new());
        assert!(outcome.is_clean());
        assert_eq!(outcome.html, "<p>b <code>b</code> a <code>a</code></p>");
        assert_eq!(outcome.restored, 2);
    }

    #[test]
    fn test_missing_and_duplicate_tokens_are_anomalies() {
        let anchored = anchor_with_nonce("<code>a</code> <code>b</code>", NONCE);
        let id0 = &anchored.tokens[0].id;
        let text = format!("{} x {}", id0, id0);
        let outcome = restore(&text, &anchored.tokens, false, &HashMap::new());
        assert_eq!(outcome.anomalies.len(), 2);
        assert_eq!(outcome.html, "<code>a</code> x <code>b</code>");
    }

    #[test]
    fn test_translated_formulas_replace_originals() {
        let anchored = anchor_with_nonce("<math><mtext>hello</mtext></math><code>c</code>", NONCE);
        let mut translated = HashMap::new();
        translated.insert(anchored.tokens[0].id.clone(), "<math><mtext>hola</mtext></math>".to_string());
        translated.insert(anchored.tokens[1].id.clone(), "ignored".to_string());

        let on = restore(&anchored.html, &anchored.tokens, true, &translated);
        assert_eq!(on.html, "<math><mtext>hola</mtext></math><code>c</code>");
        let off = restore(&anchored.html, &anchored.tokens, false, &translated);
        assert_eq!(off.html, "<math><mtext>hello</mtext></math><code>c</code>");
    }

    #[test]
    fn test_nonce_avoids_user_content() {
        let anchored = anchor("plain text without protected spans");
        assert!(anchored.tokens.is_empty());
        assert_eq!(anchored.html, "plain text without protected spans");
    }

    proptest! {
        #[test]
        fn prop_restore_inverts_anchor(parts in proptest::collection::vec(
            prop_oneof![
                Just("<p>text</p>"),
                Just("<code>let x = 1;</code>"),
                Just("<pre>block</pre>"),
                Just("<math><mi>x</mi></math>"),
                Just("<span data-math=\"a^2\">a²</span>"),
                Just("<!--COF_TEX_3-->"),
                Just("<!--[if gte msEquation 12]><m:oMath/><![endif]--><![if !msEquation]>t<![endif]>"),
                Just(" plain & prose "),
                Just("<b>bold</b>"),
            ],
            0..12,
        )) {
            let html: String = parts.concat();
            prop_assert_eq!(roundtrip(&html), html);
        }
    }
}
