/// Configuration types for Markdown export.
///
/// # Examples
///
/// ```rust
/// use officeclip::markdown::{FormulaStyle, MarkdownOptions};
///
/// let options = MarkdownOptions::new()
///     .with_styles(true)
///     .with_formula_style(FormulaStyle::LaTeX)
///     .with_list_indent(4);
/// assert_eq!(options.list_indent, 4);
/// ```
#[derive(Debug, Clone)]
pub struct MarkdownOptions {
    /// Whether to keep bold, italic and strikethrough
    pub include_styles: bool,
    /// Delimiters used for formulas
    pub formula_style: FormulaStyle,
    /// Spaces per nesting level of lists
    pub list_indent: usize,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            include_styles: true,
            formula_style: FormulaStyle::Dollar,
            list_indent: 2,
        }
    }
}

impl MarkdownOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to include text styles.
    ///
    /// When enabled, **bold**, *italic* and ~~strikethrough~~ are preserved.
    #[inline]
    pub fn with_styles(mut self, include: bool) -> Self {
        self.include_styles = include;
        self
    }

    /// Set the formula delimiter style.
    #[inline]
    pub fn with_formula_style(mut self, style: FormulaStyle) -> Self {
        self.formula_style = style;
        self
    }

    /// Set the indentation of nested lists (clamped to at least one space).
    #[inline]
    pub fn with_list_indent(mut self, indent: usize) -> Self {
        self.list_indent = indent.max(1);
        self
    }
}

/// Formula delimiters in Markdown output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaStyle {
    /// `\(...\)` inline, `\[...\]` display
    LaTeX,
    /// `$...$` inline, `$$...$$` display
    Dollar,
}

impl FormulaStyle {
    pub fn wrap(&self, formula: &str, display: bool) -> String {
        match (self, display) {
            (FormulaStyle::LaTeX, false) => format!("\\({}\\)", formula),
            (FormulaStyle::Dollar, false) => format!("${}$", formula),
            (FormulaStyle::LaTeX, true) => format!("\\[{}\\]", formula),
            (FormulaStyle::Dollar, true) => format!("$${}$$", formula),
        }
    }
}
