/// Markdown conversion for the export and Markdown-sourced copy modes.
///
/// Two directions are supported:
///
/// - [`html_to_markdown`]: a copied HTML fragment as Markdown, with formulas
///   written back as TeX between the configured delimiters
/// - [`markdown_to_html`]: Markdown as an HTML fragment whose TeX is left in
///   place for the Office math pipeline
///
/// # Quick Start
///
/// ```rust
/// use officeclip::markdown::{MarkdownOptions, html_to_markdown};
///
/// let html = "<p>Energy: <span data-math=\"E=mc^2\">E=mc²</span></p>";
/// let markdown = html_to_markdown(html, &MarkdownOptions::default());
/// assert_eq!(markdown, "Energy: $E=mc^2$");
/// ```
///
/// # Architecture
///
/// - [`MarkdownOptions`]: configuration for export behavior
/// - `writer`: token-driven HTML → Markdown writer
/// - `parse`: CommonMark → HTML through pulldown-cmark, with TeX lifted out first
mod config;
mod parse;
mod writer;

pub use config::{FormulaStyle, MarkdownOptions};
pub use parse::markdown_to_html;

use writer::MarkdownWriter;

/// Convert an HTML fragment to Markdown.
pub fn html_to_markdown(html: &str, options: &MarkdownOptions) -> String {
    let mut writer = MarkdownWriter::new(options.clone());
    writer.write_html(html);
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_round_trip_keeps_formulas() {
        let markdown = "## Notes\n\n- inline $x^2$\n- display:\n\n$$\\frac{a}{b}$$";
        let html = markdown_to_html(markdown);
        let back = html_to_markdown(&html, &MarkdownOptions::default());
        assert_eq!(back, "## Notes\n\n- inline $x^2$\n- display:\n\n$$\\frac{a}{b}$$");
    }
}
