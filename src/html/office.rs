// Office-oriented HTML preparation
//
// Preparation finds every formula in a fragment and swaps it for a numbered
// placeholder comment, recording a job per formula. Once each job has been
// rendered (TeX → MathML → OMML, or MathML → OMML), the placeholders are
// replaced by Office math blocks: the OMML inside an `msEquation` conditional
// comment that Office reads, plus a TeX fallback that every other consumer
// shows instead.

use super::dom;
use super::plain::html_to_plain_text;
use super::tokenizer::{Token, TokenKind, Tokenizer, find_matching_end};
use crate::common::xml::{escape_text, escape_xml};
use crate::common::{Error, Result};
use crate::math::{SegmentKind, extract_with, is_excluded_container};
use markup5ever_rcdom::{Handle, NodeData};

const PLACEHOLDER_PREFIX: &str = "<!--COF_TEX_";
const PLACEHOLDER_SUFFIX: &str = "-->";

/// Where a formula came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MathSource {
    /// TeX found in text or in a `data-math` attribute
    Tex { latex: String, display: bool },
    /// A `<math>` element already present in the page
    MathMl(String),
}

/// One formula awaiting conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathJob {
    pub id: usize,
    pub source: MathSource,
    /// Markup to put back when conversion fails
    pub fallback: String,
}

/// HTML with `<!--COF_TEX_n-->` placeholders and the jobs that fill them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparedOffice {
    pub html: String,
    pub jobs: Vec<MathJob>,
}

impl PreparedOffice {
    /// A fragment without formulas.
    pub fn plain(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            jobs: Vec::new(),
        }
    }

    #[inline]
    pub fn has_math(&self) -> bool {
        !self.jobs.is_empty()
    }
}

/// Placeholder comment for job `id`.
#[inline]
pub fn placeholder(id: usize) -> String {
    format!("{}{}{}", PLACEHOLDER_PREFIX, id, PLACEHOLDER_SUFFIX)
}

/// Whether an element carrying `data-math` is laid out as a block.
pub(crate) fn is_block_math(token: &Token<'_>) -> bool {
    if matches!(
        token.name.as_str(),
        "div" | "p" | "li" | "section" | "article" | "td" | "th"
    ) {
        return true;
    }
    token
        .attr("class")
        .is_some_and(|c| c.to_ascii_lowercase().contains("math-block") || c.contains("display"))
}

/// Replace every formula in `html` by a placeholder.
///
/// Formulas are TeX spans in text outside excluded containers, elements with
/// a `data-math` attribute, and `<math>` elements. Office math blocks already
/// in the fragment are copied through untouched.
///
/// # Example
/// ```
/// use officeclip::html::prepare_office;
/// let prepared = prepare_office("<p>Energy: $$E=mc^2$$</p>");
/// assert_eq!(prepared.html, "<p>Energy: <!--COF_TEX_0--></p>");
/// assert_eq!(prepared.jobs.len(), 1);
/// ```
pub fn prepare_office(html: &str) -> PreparedOffice {
    let mut out = String::with_capacity(html.len());
    let mut jobs: Vec<MathJob> = Vec::new();
    let mut ancestors: Vec<String> = Vec::new();
    let mut in_fallback = false;
    let mut tokens = Tokenizer::new(html);

    while let Some(token) = tokens.next() {
        match token.kind {
            TokenKind::Text if in_fallback => out.push_str(token.raw),
            TokenKind::Text => {
                let names: Vec<&str> = ancestors.iter().map(String::as_str).collect();
                let segments = extract_with(token.raw, &names, is_excluded_container);
                for segment in segments {
                    match segment.kind {
                        SegmentKind::Text => out.push_str(&segment.raw),
                        SegmentKind::Math => {
                            let id = jobs.len();
                            out.push_str(&placeholder(id));
                            jobs.push(MathJob {
                                id,
                                source: MathSource::Tex {
                                    latex: segment.latex,
                                    display: segment.display,
                                },
                                fallback: segment.raw,
                            });
                        },
                    }
                }
            },
            TokenKind::StartTag if token.name == "math" => {
                let end = find_matching_end(html, &token).unwrap_or(html.len());
                let markup = &html[token.start..end];
                let id = jobs.len();
                out.push_str(&placeholder(id));
                jobs.push(MathJob {
                    id,
                    source: MathSource::MathMl(markup.to_string()),
                    fallback: markup.to_string(),
                });
                tokens = Tokenizer::at(html, end);
            },
            TokenKind::StartTag => {
                if let Some(latex) = token.attr("data-math").filter(|l| !l.trim().is_empty()) {
                    let end = find_matching_end(html, &token).unwrap_or(token.end);
                    let id = jobs.len();
                    out.push_str(&placeholder(id));
                    jobs.push(MathJob {
                        id,
                        source: MathSource::Tex {
                            latex: latex.trim().to_string(),
                            display: is_block_math(&token),
                        },
                        fallback: html[token.start..end].to_string(),
                    });
                    tokens = Tokenizer::at(html, end);
                    continue;
                }
                if token.opens_element() {
                    ancestors.push(token.name.clone());
                }
                out.push_str(token.raw);
            },
            TokenKind::EndTag => {
                if let Some(at) = ancestors.iter().rposition(|n| *n == token.name) {
                    ancestors.truncate(at);
                }
                out.push_str(token.raw);
            },
            TokenKind::Other => {
                // Text of an existing Office math fallback is already a formula
                if token.raw.starts_with("<![if") {
                    in_fallback = true;
                } else if token.raw.starts_with("<![endif") {
                    in_fallback = false;
                }
                out.push_str(token.raw);
            },
            TokenKind::Comment => out.push_str(token.raw),
        }
    }

    PreparedOffice { html: out, jobs }
}

/// Office math block: OMML for Office plus a TeX fallback for everything else.
///
/// # Example
/// ```
/// use officeclip::html::office_math_html;
/// let block = office_math_html("<m:oMath></m:oMath>", "x<1");
/// assert_eq!(
///     block,
///     "<!--[if gte msEquation 12]><m:oMath></m:oMath><![endif]--><![if !msEquation]><span class=\"math-fallback\">x&lt;1</span><![endif]>"
/// );
/// ```
pub fn office_math_html(omml: &str, latex: &str) -> String {
    format!(
        "<!--[if gte msEquation 12]>{}<![endif]--><![if !msEquation]><span class=\"math-fallback\">{}</span><![endif]>",
        omml,
        escape_text(latex)
    )
}

const OFFICE_MATH_OPEN: &str = "<!--[if gte msEquation";
const OFFICE_FALLBACK_OPEN: &str = "<![if !msEquation]>";
const OFFICE_FALLBACK_CLOSE: &str = "<![endif]>";

/// An Office math block starting at `comment`.
///
/// Returns the offset just past the block (its fallback included) and the
/// fallback text, which is the formula's TeX. `None` when `comment` is not an
/// Office math conditional comment.
pub fn office_math_block(html: &str, comment: &Token<'_>) -> Option<(usize, String)> {
    if comment.kind != TokenKind::Comment || !comment.raw.starts_with(OFFICE_MATH_OPEN) {
        return None;
    }
    let mut end = comment.end;
    let mut latex = String::new();
    if html[end..].starts_with(OFFICE_FALLBACK_OPEN) {
        let body = end + OFFICE_FALLBACK_OPEN.len();
        if let Some(close) = html[body..].find(OFFICE_FALLBACK_CLOSE) {
            latex = html_to_plain_text(&html[body..body + close]);
            end = body + close + OFFICE_FALLBACK_CLOSE.len();
        }
    }
    Some((end, latex))
}

/// Fill placeholders with rendered markup, `rendered[i]` for job `i`.
///
/// A placeholder missing from the HTML is an error: the engine or a later
/// rewrite dropped it and the result would silently lose a formula.
pub fn apply_rendered(html: &str, rendered: &[String]) -> Result<String> {
    if rendered.is_empty() {
        return Ok(html.to_string());
    }

    let mut out = String::with_capacity(html.len() + rendered.iter().map(String::len).sum::<usize>());
    let mut rest = html;
    while let Some(at) = rest.find(PLACEHOLDER_PREFIX) {
        let after = &rest[at + PLACEHOLDER_PREFIX.len()..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        let id: Option<usize> = after[..digits].parse().ok();
        let is_placeholder = after[digits..].starts_with(PLACEHOLDER_SUFFIX);

        match id.filter(|_| is_placeholder).and_then(|id| rendered.get(id)) {
            Some(markup) => {
                out.push_str(&rest[..at]);
                out.push_str(markup);
                rest = &after[digits + PLACEHOLDER_SUFFIX.len()..];
            },
            None => {
                let keep = at + PLACEHOLDER_PREFIX.len();
                out.push_str(&rest[..keep]);
                rest = &rest[keep..];
            },
        }
    }
    out.push_str(rest);

    if let Some(missing) = (0..rendered.len()).find(|id| !html.contains(&placeholder(*id))) {
        return Err(Error::TransformationFailure(format!("missing placeholder for formula {}", missing)));
    }
    Ok(out)
}

/// Inline styles Word needs for predictable paste, added where the element
/// has none of its own.
fn office_style(name: &str) -> Option<&'static str> {
    match name {
        "code" => Some("font-family:Consolas, 'Courier New', monospace; background:#f5f5f5; padding:0 2px;"),
        "pre" => Some(
            "font-family:Consolas, 'Courier New', monospace; background:#f5f5f5; padding:8px; white-space:pre-wrap;",
        ),
        "a" => Some("color:#1155cc; text-decoration:underline;"),
        "blockquote" => Some("border-left:3px solid #ccc; margin:0; padding-left:12px; color:#555;"),
        "table" => Some("border-collapse:collapse;"),
        "th" | "td" => Some("border:1px solid #ddd; padding:4px 6px;"),
        "ul" | "ol" => Some("margin:0; padding-left:40px;"),
        "li" => Some("margin:0;"),
        "img" => Some("max-width:100%; height:auto; vertical-align:middle;"),
        _ => None,
    }
}

/// Built-in Office normalization used when no external engine is available.
///
/// The fragment is parsed with html5ever and written back out. Semantic tags
/// become the ones Word knows. Elements that have no style of their own get
/// minimal inline styles. Scripts and other active content are dropped, and so
/// are event handlers and script URLs. KaTeX and MathJax wrappers collapse to
/// the MathML they carry. Comments are kept, including Office's downlevel
/// conditionals.
///
/// # Example
/// ```
/// use officeclip::html::html_to_office;
/// assert_eq!(
///     html_to_office("<em onclick=\"x()\">a</em><script>bad()</script>"),
///     "<i>a</i>"
/// );
/// ```
pub fn html_to_office(html: &str) -> String {
    let mut out = String::with_capacity(html.len() + html.len() / 10);
    for node in dom::parse_body(html) {
        write_office_node(&node, &mut out, 0);
    }
    out
}

/// Elements dropped together with their content
fn is_dropped(name: &str) -> bool {
    matches!(
        name,
        "script" | "style" | "noscript" | "template" | "iframe" | "object" | "embed" | "frame" | "frameset" | "svg"
    )
}

fn is_void(name: &str) -> bool {
    matches!(
        name,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta" | "source" | "track" | "wbr"
    )
}

/// Rendered-math wrappers that also carry the formula as MathML
fn is_math_wrapper(node: &Handle, name: &str) -> bool {
    (name == "span" && dom::has_class(node, "katex")) || name == "mjx-container"
}

fn write_office_node(node: &Handle, out: &mut String, depth: usize) {
    match &node.data {
        NodeData::Text { contents } => out.push_str(&escape_text(&contents.borrow())),
        NodeData::Comment { contents } => dom::write_comment(contents, out),
        NodeData::Element { name, attrs, .. } => {
            let tag = (*name.local).to_ascii_lowercase();
            if is_dropped(&tag) || depth >= dom::MAX_DEPTH {
                return;
            }
            if is_math_wrapper(node, &tag) && dom::attr(node, "data-math").is_none() {
                if let Some(math) = dom::find_descendant(node, "math") {
                    write_office_node(&math, out, depth + 1);
                    return;
                }
            }

            let mapped = map_tag(&tag);
            let mut styled = false;
            out.push('<');
            out.push_str(mapped);
            for attr in attrs.borrow().iter() {
                let key = (*attr.name.local).to_ascii_lowercase();
                if !keep_attr(&tag, &key, &attr.value) {
                    continue;
                }
                styled |= key == "style";
                out.push(' ');
                if let Some(prefix) = &attr.name.prefix {
                    out.push_str(prefix);
                    out.push(':');
                }
                out.push_str(&attr.name.local);
                out.push_str("=\"");
                out.push_str(&escape_xml(&attr.value));
                out.push('"');
            }
            if let Some(style) = office_style(&tag).filter(|_| !styled) {
                out.push_str(" style=\"");
                out.push_str(style);
                out.push('"');
            }
            out.push('>');
            if is_void(&tag) {
                return;
            }

            for child in node.children.borrow().iter() {
                write_office_node(child, out, depth + 1);
            }
            out.push_str("</");
            out.push_str(mapped);
            out.push('>');
        },
        NodeData::Document | NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => {},
    }
}

/// Event handlers and script URLs never reach the clipboard.
fn keep_attr(tag: &str, key: &str, value: &str) -> bool {
    if key.starts_with("on") {
        return false;
    }
    if matches!(key, "href" | "src" | "action" | "formaction" | "xlink:href") {
        let lower = value.trim().to_ascii_lowercase();
        let image_data = tag == "img" && lower.starts_with("data:image/");
        return !(lower.starts_with("javascript:")
            || lower.starts_with("vbscript:")
            || (lower.starts_with("data:") && !image_data));
    }
    true
}

fn map_tag(name: &str) -> &str {
    match name {
        "strong" => "b",
        "em" => "i",
        "del" | "strike" => "s",
        other => other,
    }
}

/// Wrap plain text in paragraphs, one per line, escaped.
pub fn text_to_html(text: &str) -> String {
    text.lines()
        .map(|line| format!("<p>{}</p>", escape_text(line)))
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_math_becomes_placeholders() {
        let prepared = prepare_office("<p>$a$ and \\(b\\)</p>");
        assert_eq!(prepared.html, "<p><!--COF_TEX_0--> and <!--COF_TEX_1--></p>");
        assert_eq!(
            prepared.jobs[1].source,
            MathSource::Tex {
                latex: "b".into(),
                display: false
            }
        );
        assert_eq!(prepared.jobs[1].fallback, "\\(b\\)");
    }

    #[test]
    fn test_code_and_pre_are_not_scanned() {
        let html = "<pre><code>$not$</code></pre><code>$x$</code>";
        let prepared = prepare_office(html);
        assert_eq!(prepared.html, html);
        assert!(!prepared.has_math());
    }

    #[test]
    fn test_data_math_element() {
        let prepared = prepare_office("<div class=\"eq\" data-math=\"x^2\"><img src=\"r.png\"></div>tail");
        assert_eq!(prepared.html, "<!--COF_TEX_0-->tail");
        assert_eq!(
            prepared.jobs[0].source,
            MathSource::Tex {
                latex: "x^2".into(),
                display: true
            }
        );
    }

    #[test]
    fn test_math_element_job() {
        let prepared = prepare_office("a <math><mi>x</mi></math> b");
        assert_eq!(prepared.html, "a <!--COF_TEX_0--> b");
        assert_eq!(prepared.jobs[0].source, MathSource::MathMl("<math><mi>x</mi></math>".into()));
    }

    #[test]
    fn test_existing_office_math_passes_through() {
        let html = "<p><!--[if gte msEquation 12]><m:oMath/><![endif]--><![if !msEquation]>$x$<![endif]></p>";
        let prepared = prepare_office(html);
        assert_eq!(prepared.html, html);
        assert!(!prepared.has_math());
    }

    #[test]
    fn test_apply_rendered() {
        let html = "<p><!--COF_TEX_0--> + <!--COF_TEX_1--></p>";
        let out = apply_rendered(html, &["A".to_string(), "B".to_string()]).unwrap();
        assert_eq!(out, "<p>A + B</p>");
        assert!(apply_rendered("<p><!--COF_TEX_0--></p>", &["A".to_string(), "B".to_string()]).is_err());
        assert_eq!(apply_rendered("<p>x</p>", &[]).unwrap(), "<p>x</p>");
    }

    #[test]
    fn test_builtin_office_normalization() {
        let out = html_to_office("<strong>b</strong><a href=\"u\">l</a><code style=\"x\">c</code><script>bad()</script>");
        assert_eq!(
            out,
            "<b>b</b><a href=\"u\" style=\"color:#1155cc; text-decoration:underline;\">l</a><code style=\"x\">c</code>"
        );
    }

    #[test]
    fn test_normalization_drops_active_content() {
        let out = html_to_office(
            "<p onclick=\"x()\">a <a href=\" JavaScript:alert(1)\" title=\"t\">l</a>\
             <img src=\"data:image/png;base64,AA\" alt=\"i\"><iframe src=\"u\"></iframe></p>",
        );
        assert_eq!(
            out,
            "<p>a <a title=\"t\" style=\"color:#1155cc; text-decoration:underline;\">l</a>\
             <img src=\"data:image/png;base64,AA\" alt=\"i\" style=\"max-width:100%; height:auto; vertical-align:middle;\"></p>"
        );
    }

    #[test]
    fn test_normalization_keeps_comments_and_office_math() {
        let block = office_math_html("<m:oMath><m:r><m:t>x</m:t></m:r></m:oMath>", "x");
        let html = format!("<!--StartFragment--><p>{} and $y$</p>", block);
        assert_eq!(html_to_office(&html), html);
    }

    #[test]
    fn test_rendered_math_wrappers_collapse_to_mathml() {
        let katex = "<span class=\"katex\"><span class=\"katex-mathml\"><math><semantics><mi>x</mi>\
                     <annotation encoding=\"application/x-tex\">x</annotation></semantics></math></span>\
                     <span class=\"katex-html\" aria-hidden=\"true\"><span>x</span></span></span>";
        let out = html_to_office(katex);
        assert!(out.starts_with("<math><semantics><mi>x</mi>"));
        assert!(!out.contains("katex-html"));

        let prepared = prepare_office(&out);
        assert_eq!(prepared.html, "<!--COF_TEX_0-->");
        assert!(matches!(prepared.jobs[0].source, MathSource::MathMl(_)));
    }

    #[test]
    fn test_normalization_repairs_and_bounds_markup() {
        assert_eq!(html_to_office("<p>a<b>b</p>c"), "<p>a<b>b</b></p><b>c</b>");
        let deep = format!("{}x{}", "<span>".repeat(1_000), "</span>".repeat(1_000));
        let out = html_to_office(&deep);
        assert!(out.len() < deep.len());
    }

    #[test]
    fn test_text_to_html() {
        assert_eq!(text_to_html("a<b\nc"), "<p>a&lt;b</p><p>c</p>");
    }
}
