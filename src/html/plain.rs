// HTML → plain text for the text/plain clipboard flavour
//
// Tags are dropped, block boundaries become line breaks and entities are
// decoded. Office math blocks contribute their TeX fallback; the OMML inside
// the conditional comment is never visible as text.

use super::tokenizer::{TokenKind, Tokenizer, find_matching_end};
use crate::common::xml::decode_entities;

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "blockquote"
            | "pre"
            | "ul"
            | "ol"
            | "li"
            | "table"
            | "tr"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "hr"
            | "figure"
            | "figcaption"
            | "dl"
            | "dt"
            | "dd"
    )
}

/// Render an HTML fragment as plain text.
///
/// # Example
/// ```
/// use officeclip::html::html_to_plain_text;
/// assert_eq!(html_to_plain_text("<p>a &amp; b</p><p>c</p>"), "a & b\nc");
/// ```
pub fn html_to_plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut pre_depth = 0usize;
    let mut tokens = Tokenizer::new(html);

    while let Some(token) = tokens.next() {
        match token.kind {
            TokenKind::Text => {
                let text = decode_entities(token.raw);
                if pre_depth > 0 {
                    out.push_str(&text);
                } else {
                    push_collapsed(&mut out, &text);
                }
            },
            TokenKind::StartTag => match token.name.as_str() {
                "br" => out.push('\n'),
                "script" | "style" | "head" | "title" | "template" => {
                    let end = find_matching_end(html, &token).unwrap_or(html.len());
                    tokens = Tokenizer::at(html, end);
                },
                "math" => {
                    let end = find_matching_end(html, &token).unwrap_or(html.len());
                    push_collapsed(&mut out, &math_text(&html[token.start..end], &token.attr("alttext")));
                    tokens = Tokenizer::at(html, end);
                },
                "td" | "th" => {
                    if !out.ends_with('\n') && !out.is_empty() {
                        out.push('\t');
                    }
                },
                name => {
                    if let Some(latex) = token.attr("data-math") {
                        let end = find_matching_end(html, &token).unwrap_or(token.end);
                        push_collapsed(&mut out, &latex);
                        tokens = Tokenizer::at(html, end);
                        continue;
                    }
                    if name == "pre" {
                        pre_depth += 1;
                    }
                    if is_block(name) {
                        break_line(&mut out);
                    }
                },
            },
            TokenKind::EndTag => {
                if token.name == "pre" {
                    pre_depth = pre_depth.saturating_sub(1);
                }
                if is_block(&token.name) {
                    break_line(&mut out);
                }
            },
            TokenKind::Comment | TokenKind::Other => {},
        }
    }

    tidy_lines(&out)
}

/// Text of a `<math>` element: TeX annotation, then `alttext`, then token text.
fn math_text(markup: &str, alttext: &Option<String>) -> String {
    let mut tokens = Tokenizer::new(markup).peekable();
    let mut tex = None;
    let mut content = String::new();
    while let Some(token) = tokens.next() {
        match token.kind {
            TokenKind::StartTag if token.name == "annotation" => {
                let is_tex = token
                    .attr("encoding")
                    .is_some_and(|e| e.eq_ignore_ascii_case("application/x-tex"));
                if let Some(next) = tokens.peek().filter(|t| t.kind == TokenKind::Text) {
                    if is_tex {
                        tex = Some(decode_entities(next.raw).trim().to_string());
                    }
                }
                // Skip annotation content
                for t in tokens.by_ref() {
                    if t.is_end("annotation") {
                        break;
                    }
                }
            },
            TokenKind::Text => content.push_str(&decode_entities(token.raw)),
            _ => {},
        }
    }
    tex.or_else(|| alttext.clone())
        .unwrap_or_else(|| content.split_whitespace().collect::<Vec<_>>().join(""))
}

fn push_collapsed(out: &mut String, text: &str) {
    for (i, word) in text.split(char::is_whitespace).enumerate() {
        if i > 0 && !out.ends_with([' ', '\n', '\t']) && !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
}

fn break_line(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Trim trailing spaces on each line, drop leading/trailing blank lines and
/// collapse runs of blank lines.
fn tidy_lines(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end_matches([' ', '\t', '\u{00A0}']);
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 || lines.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_office_math_block_contributes_fallback() {
        let html = "<p>Energy: <!--[if gte msEquation 12]><m:oMathPara><m:oMath><m:r><m:t>E</m:t></m:r></m:oMath></m:oMathPara><![endif]--><![if !msEquation]><span>E=mc^2</span><![endif]></p>";
        assert_eq!(html_to_plain_text(html), "Energy: E=mc^2");
    }

    #[test]
    fn test_blocks_and_breaks() {
        assert_eq!(html_to_plain_text("<div>one<br>two</div><ul><li>a</li><li>b</li></ul>"), "one\ntwo\na\nb");
    }

    #[test]
    fn test_pre_keeps_whitespace() {
        assert_eq!(html_to_plain_text("<pre>a  b\n  c</pre>"), "a  b\n  c");
    }

    #[test]
    fn test_math_prefers_tex_annotation() {
        let html = "x <math><semantics><mi>y</mi><annotation encoding=\"application/x-tex\">y^2</annotation></semantics></math>";
        assert_eq!(html_to_plain_text(html), "x y^2");
        assert_eq!(html_to_plain_text("<math alttext=\"a+b\"><mi>a</mi></math>"), "a+b");
        assert_eq!(html_to_plain_text("<math><mi>a</mi><mo>+</mo><mi>b</mi></math>"), "a+b");
    }

    #[test]
    fn test_data_math_and_script() {
        assert_eq!(
            html_to_plain_text("<span data-math=\"x+1\">rendered</span><script>var a;</script>!"),
            "x+1!"
        );
    }
}
