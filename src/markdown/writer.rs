/// Low-level writer for Markdown generation.
///
/// The writer walks an HTML fragment token by token and appends Markdown to
/// one buffer. Constructs whose content is rewritten when they close (link
/// text, blockquotes, table cells) remember where they started in the buffer
/// and split their content off at the end tag.
use super::config::MarkdownOptions;
use crate::common::xml::decode_entities;
use crate::html::office::is_block_math;
use crate::html::{Token, TokenKind, Tokenizer, find_matching_end, html_to_plain_text, office_math_block};

/// State of one open list.
#[derive(Debug, Clone, Copy)]
struct ListState {
    ordered: bool,
    next: usize,
}

/// A construct rewritten when it closes.
#[derive(Debug, Clone)]
enum Pending {
    Link { start: usize, href: Option<String> },
    Quote { start: usize },
}

#[derive(Debug, Default)]
struct TableState {
    start: usize,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell_start: Option<usize>,
}

/// Low-level writer for efficient Markdown generation.
pub(crate) struct MarkdownWriter {
    /// The output buffer
    buffer: String,
    options: MarkdownOptions,
    lists: Vec<ListState>,
    pending: Vec<Pending>,
    tables: Vec<TableState>,
    pre_depth: usize,
}

impl MarkdownWriter {
    pub fn new(options: MarkdownOptions) -> Self {
        Self {
            buffer: String::with_capacity(4096),
            options,
            lists: Vec::new(),
            pending: Vec::new(),
            tables: Vec::new(),
            pre_depth: 0,
        }
    }

    /// Write an HTML fragment to the buffer.
    pub fn write_html(&mut self, html: &str) {
        let mut tokens = Tokenizer::new(html);
        while let Some(token) = tokens.next() {
            if let Some((end, latex)) = office_math_block(html, &token) {
                if !latex.is_empty() {
                    self.write_formula(&latex, token.raw.contains("<m:oMathPara"));
                }
                tokens = Tokenizer::at(html, end);
                continue;
            }
            match token.kind {
                TokenKind::Text => self.write_text(token.raw),
                TokenKind::StartTag => {
                    if let Some(end) = self.start_tag(html, &token) {
                        tokens = Tokenizer::at(html, end);
                    }
                },
                TokenKind::EndTag => self.end_tag(&token.name),
                TokenKind::Comment | TokenKind::Other => {},
            }
        }
    }

    /// Get the final markdown output.
    pub fn finish(self) -> String {
        tidy(&self.buffer)
    }

    fn write_text(&mut self, raw: &str) {
        let text = decode_entities(raw);
        if self.pre_depth > 0 {
            self.buffer.push_str(&text);
            return;
        }
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !self.buffer.is_empty() && !self.buffer.ends_with([' ', '\n']) {
                    self.buffer.push(' ');
                }
            } else {
                self.buffer.push(ch);
            }
        }
    }

    /// Format a formula with the configured delimiters.
    fn write_formula(&mut self, latex: &str, display: bool) {
        let formula = self.options.formula_style.wrap(latex.trim(), display);
        if display {
            self.block_break();
            self.buffer.push_str(&formula);
            self.block_break();
        } else {
            self.buffer.push_str(&formula);
        }
    }

    /// Returns the offset to resume at when the element's content was consumed.
    fn start_tag(&mut self, html: &str, token: &Token<'_>) -> Option<usize> {
        let name = token.name.as_str();
        if name != "math" {
            if let Some(latex) = token.attr("data-math") {
                self.write_formula(&latex, is_block_math(token));
                return Some(find_matching_end(html, token).unwrap_or(token.end));
            }
        }

        match name {
            "script" | "style" | "head" | "title" | "template" | "noscript" => {
                return Some(find_matching_end(html, token).unwrap_or(html.len()));
            },
            "math" => {
                let end = find_matching_end(html, token).unwrap_or(html.len());
                let latex = html_to_plain_text(&html[token.start..end]);
                let display = token.attr("display").is_some_and(|d| d.eq_ignore_ascii_case("block"));
                self.write_formula(&latex, display);
                return Some(end);
            },
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                self.block_break();
                self.buffer.push_str(&"#".repeat(level));
                self.buffer.push(' ');
            },
            "p" | "div" | "section" | "article" | "header" | "footer" | "figure" => self.paragraph_break(),
            "br" => self.line_break(),
            "hr" => {
                self.block_break();
                self.buffer.push_str("---");
                self.block_break();
            },
            "b" | "strong" => self.style("**"),
            "i" | "em" => self.style("*"),
            "s" | "del" | "strike" => self.style("~~"),
            "code" if self.pre_depth == 0 => self.buffer.push('`'),
            "pre" => {
                let language = Tokenizer::at(html, token.end)
                    .next()
                    .filter(|next| next.is_start("code"))
                    .and_then(|code| code.attr("class"))
                    .and_then(|class| {
                        class
                            .split_whitespace()
                            .find_map(|c| c.strip_prefix("language-").map(str::to_string))
                    })
                    .unwrap_or_default();
                self.block_break();
                self.buffer.push_str("```");
                self.buffer.push_str(&language);
                self.buffer.push('\n');
                self.pre_depth += 1;
            },
            "a" => self.pending.push(Pending::Link {
                start: self.buffer.len(),
                href: token.attr("href").and_then(|h| sanitize_href(&h)),
            }),
            "img" => {
                if let Some(src) = token.attr("src").and_then(|s| sanitize_href(&s)) {
                    let alt = token.attr("alt").unwrap_or_default();
                    self.buffer.push('!');
                    self.buffer.push_str(&format_link(&alt, &src));
                }
            },
            "blockquote" => {
                self.block_break();
                self.pending.push(Pending::Quote {
                    start: self.buffer.len(),
                });
            },
            "ul" | "ol" => {
                if self.lists.is_empty() {
                    self.block_break();
                } else {
                    self.line_break();
                }
                let next = token.attr("start").and_then(|s| s.trim().parse().ok()).unwrap_or(1);
                self.lists.push(ListState {
                    ordered: name == "ol",
                    next,
                });
            },
            "li" => self.write_list_marker(),
            "table" => {
                self.block_break();
                self.tables.push(TableState {
                    start: self.buffer.len(),
                    ..Default::default()
                });
            },
            "td" | "th" => {
                let start = self.buffer.len();
                if let Some(table) = self.tables.last_mut() {
                    table.cell_start = Some(start);
                }
            },
            _ => {},
        }
        None
    }

    fn end_tag(&mut self, name: &str) {
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => self.block_break(),
            "p" | "div" | "section" | "article" | "header" | "footer" | "figure" => self.paragraph_break(),
            "b" | "strong" => self.style("**"),
            "i" | "em" => self.style("*"),
            "s" | "del" | "strike" => self.style("~~"),
            "code" if self.pre_depth == 0 => self.buffer.push('`'),
            "pre" if self.pre_depth > 0 => {
                self.pre_depth -= 1;
                if !self.buffer.ends_with('\n') {
                    self.buffer.push('\n');
                }
                self.buffer.push_str("```");
                self.block_break();
            },
            "a" => {
                if let Some(Pending::Link { start, href }) = self.pop_pending(|p| matches!(p, Pending::Link { .. })) {
                    let text = self.buffer.split_off(start.min(self.buffer.len()));
                    match href {
                        Some(href) => self.buffer.push_str(&format_link(text.trim(), &href)),
                        None => self.buffer.push_str(text.trim()),
                    }
                }
            },
            "blockquote" => {
                if let Some(Pending::Quote { start }) = self.pop_pending(|p| matches!(p, Pending::Quote { .. })) {
                    let content = self.buffer.split_off(start.min(self.buffer.len()));
                    for line in content.trim().lines() {
                        let line = line.trim_end();
                        if line.is_empty() {
                            self.buffer.push_str(">\n");
                        } else {
                            self.buffer.push_str("> ");
                            self.buffer.push_str(line);
                            self.buffer.push('\n');
                        }
                    }
                    self.block_break();
                }
            },
            "ul" | "ol" => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.block_break();
                } else {
                    self.line_break();
                }
            },
            "li" => self.line_break(),
            "td" | "th" => {
                if let Some(table) = self.tables.last_mut() {
                    if let Some(start) = table.cell_start.take() {
                        let cell = self.buffer.split_off(start.min(self.buffer.len()));
                        table.row.push(clean_cell(&cell));
                    }
                }
            },
            "tr" => {
                if let Some(table) = self.tables.last_mut() {
                    if !table.row.is_empty() {
                        let row = std::mem::take(&mut table.row);
                        table.rows.push(row);
                    }
                }
            },
            "table" => {
                if let Some(table) = self.tables.pop() {
                    self.write_table(table);
                }
            },
            _ => {},
        }
    }

    fn pop_pending(&mut self, is_kind: impl Fn(&Pending) -> bool) -> Option<Pending> {
        if self.pending.last().is_some_and(is_kind) {
            self.pending.pop()
        } else {
            None
        }
    }

    fn style(&mut self, marker: &str) {
        if self.options.include_styles {
            self.buffer.push_str(marker);
        }
    }

    fn write_list_marker(&mut self) {
        self.line_break();
        let depth = self.lists.len().saturating_sub(1);
        let indent = " ".repeat(depth * self.options.list_indent);
        let marker = match self.lists.last_mut() {
            Some(list) if list.ordered => {
                let marker = format!("{}.", list.next);
                list.next += 1;
                marker
            },
            _ => "-".to_string(),
        };
        self.buffer.push_str(&indent);
        self.buffer.push_str(&marker);
        self.buffer.push(' ');
    }

    /// Write a collected table as a pipe table; the first row is the header.
    fn write_table(&mut self, table: TableState) {
        self.buffer.truncate(table.start.min(self.buffer.len()));
        let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }
        self.block_break();
        for (i, row) in table.rows.iter().enumerate() {
            self.buffer.push('|');
            for column in 0..columns {
                self.buffer.push(' ');
                self.buffer.push_str(row.get(column).map(String::as_str).unwrap_or(""));
                self.buffer.push_str(" |");
            }
            self.buffer.push('\n');
            if i == 0 {
                self.buffer.push('|');
                self.buffer.push_str(&" --- |".repeat(columns));
                self.buffer.push('\n');
            }
        }
        self.block_break();
    }

    fn line_break(&mut self) {
        let trimmed = self.buffer.trim_end_matches(' ').len();
        self.buffer.truncate(trimmed);
        if !self.buffer.is_empty() && !self.buffer.ends_with('\n') {
            self.buffer.push('\n');
        }
    }

    fn block_break(&mut self) {
        self.line_break();
        if !self.buffer.is_empty() && !self.buffer.ends_with("\n\n") {
            self.buffer.push('\n');
        }
    }

    /// Paragraphs inside list items stay on the item's lines.
    fn paragraph_break(&mut self) {
        if self.lists.is_empty() {
            self.block_break();
        } else {
            self.line_break();
        }
    }
}

fn sanitize_href(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if ["javascript:", "data:", "vbscript:"].iter().any(|p| lower.starts_with(p)) {
        return None;
    }
    Some(href.to_string())
}

fn format_link(text: &str, href: &str) -> String {
    let text = text.replace('[', "\\[").replace(']', "\\]");
    if href.chars().any(|c| c.is_whitespace() || c == '(' || c == ')') {
        format!("[{}](<{}>)", text, href)
    } else {
        format!("[{}]({})", text, href)
    }
}

fn clean_cell(cell: &str) -> String {
    cell.split_whitespace().collect::<Vec<_>>().join(" ").replace('|', "\\|")
}

/// Trim trailing whitespace and collapse blank runs outside fenced code.
fn tidy(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut in_fence = false;
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        let line = if in_fence { line } else { line.trim_end() };
        if !in_fence && line.is_empty() && lines.last().is_none_or(|l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
