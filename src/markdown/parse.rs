// Markdown → HTML for Markdown-sourced Office copies
//
// Rendering is CommonMark with tables, strikethrough, task lists and
// footnotes. TeX is lifted out before parsing so emphasis and backslash
// escapes never touch it, then put back verbatim for the Office preparation
// step. Fenced code is left alone.

use crate::common::xml::escape_text;
use crate::math::{SegmentKind, extract};
use pulldown_cmark::{Options, Parser, html};

/// Private-use markers around lifted math spans
const MATH_OPEN: char = '\u{E000}';
const MATH_CLOSE: char = '\u{E001}';

/// Render Markdown as an HTML fragment.
///
/// # Example
/// ```
/// use officeclip::markdown::markdown_to_html;
/// assert_eq!(
///     markdown_to_html("# Hi\n\nA *b* $c*d$"),
///     "<h1>Hi</h1>\n<p>A <em>b</em> $c*d$</p>\n"
/// );
/// ```
pub fn markdown_to_html(markdown: &str) -> String {
    let (masked, lifted) = lift_math(markdown);

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    let parser = Parser::new_ext(&masked, options);

    let mut out = String::with_capacity(markdown.len() + markdown.len() / 2);
    html::push_html(&mut out, parser);
    if lifted.is_empty() {
        return out;
    }
    restore_math(&out, &lifted)
}

/// Replace every math span outside fenced code with a numbered marker.
fn lift_math(markdown: &str) -> (String, Vec<String>) {
    let mut masked = String::with_capacity(markdown.len());
    let mut lifted = Vec::new();
    let mut prose_start = 0;
    let mut offset = 0;
    let mut fence: Option<&'static str> = None;

    for line in markdown.split_inclusive('\n') {
        let marker = fence_marker(line);
        match (fence, marker) {
            (None, Some(open)) => {
                mask_prose(&markdown[prose_start..offset], &mut masked, &mut lifted);
                fence = Some(open);
                masked.push_str(line);
                prose_start = offset + line.len();
            },
            (Some(open), Some(close)) if open == close => {
                fence = None;
                masked.push_str(line);
                prose_start = offset + line.len();
            },
            (Some(_), _) => {
                masked.push_str(line);
                prose_start = offset + line.len();
            },
            (None, None) => {},
        }
        offset += line.len();
    }
    mask_prose(&markdown[prose_start..], &mut masked, &mut lifted);
    (masked, lifted)
}

fn mask_prose(prose: &str, masked: &mut String, lifted: &mut Vec<String>) {
    if prose.is_empty() {
        return;
    }
    for segment in extract(prose) {
        match segment.kind {
            SegmentKind::Math => {
                masked.push(MATH_OPEN);
                masked.push_str(&lifted.len().to_string());
                masked.push(MATH_CLOSE);
                lifted.push(segment.raw);
            },
            SegmentKind::Text => masked.push_str(&segment.raw),
        }
    }
}

fn fence_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

fn restore_math(html: &str, lifted: &[String]) -> String {
    let mut out = String::with_capacity(html.len() + lifted.iter().map(|m| m.len()).sum::<usize>());
    let mut rest = html;
    while let Some(open) = rest.find(MATH_OPEN) {
        out.push_str(&rest[..open]);
        let after = &rest[open + MATH_OPEN.len_utf8()..];
        let Some(close) = after.find(MATH_CLOSE) else {
            rest = after;
            continue;
        };
        if let Some(raw) = after[..close].parse::<usize>().ok().and_then(|n| lifted.get(n)) {
            out.push_str(&escape_text(raw));
        }
        rest = &after[close + MATH_CLOSE.len_utf8()..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks() {
        let md = "# Title\n\nPara one\ncontinues.\n\n---\n\n> quoted *text*\n\n```rust\nlet a = 1 < 2;\n```";
        assert_eq!(
            markdown_to_html(md),
            "<h1>Title</h1>\n<p>Para one\ncontinues.</p>\n<hr />\n<blockquote>\n<p>quoted <em>text</em></p>\n</blockquote>\n\
             <pre><code class=\"language-rust\">let a = 1 &lt; 2;\n</code></pre>\n"
        );
    }

    #[test]
    fn test_setext_heading_and_indented_code() {
        assert_eq!(markdown_to_html("Title\n====="), "<h1>Title</h1>\n");
        assert_eq!(
            markdown_to_html("text\n\n    let x = 1;\n"),
            "<p>text</p>\n<pre><code>let x = 1;\n</code></pre>\n"
        );
    }

    #[test]
    fn test_nested_emphasis() {
        assert_eq!(markdown_to_html("*a **b** c*"), "<p><em>a <strong>b</strong> c</em></p>\n");
        assert_eq!(markdown_to_html("***x***"), "<p><em><strong>x</strong></em></p>\n");
        assert_eq!(markdown_to_html("~~gone~~ snake_case"), "<p><del>gone</del> snake_case</p>\n");
    }

    #[test]
    fn test_link_with_parentheses() {
        assert_eq!(
            markdown_to_html("[x](http://e.com/a_(b))"),
            "<p><a href=\"http://e.com/a_(b)\">x</a></p>\n"
        );
    }

    #[test]
    fn test_hard_break() {
        assert_eq!(markdown_to_html("a  \nb"), "<p>a<br />\nb</p>\n");
    }

    #[test]
    fn test_nested_lists() {
        let html = markdown_to_html("- a\n  1. b\n  2. c\n- d");
        assert!(html.starts_with("<ul>\n<li>a\n<ol>\n<li>b</li>\n<li>c</li>\n</ol>\n</li>"));
        assert!(markdown_to_html("3. x\n4. y").starts_with("<ol start=\"3\">"));
    }

    #[test]
    fn test_math_is_left_for_the_extractor() {
        assert_eq!(
            markdown_to_html("Energy: $$E=mc^2$$ and *$a_1*b_2$*"),
            "<p>Energy: $$E=mc^2$$ and <em>$a_1*b_2$</em></p>\n"
        );
        assert_eq!(markdown_to_html("see \\(x_1\\) here"), "<p>see \\(x_1\\) here</p>\n");
        assert_eq!(markdown_to_html("$a<b$"), "<p>$a&lt;b$</p>\n");
    }

    #[test]
    fn test_fenced_code_is_not_lifted() {
        let (masked, lifted) = lift_math("```\n$x$\n```\n$y$");
        assert_eq!(masked, "```\n$x$\n```\n\u{E000}0\u{E001}");
        assert_eq!(lifted, vec!["$y$"]);
    }

    #[test]
    fn test_table() {
        let html = markdown_to_html("| a | b |\n|---|:-:|\n| 1 | **2** |");
        assert!(html.starts_with("<table>"));
        assert!(html.contains("<th>a</th>"));
        assert!(html.contains("<td>1</td>"));
        assert!(html.contains("<strong>2</strong></td>"));
    }
}
