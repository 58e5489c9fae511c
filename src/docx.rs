//! DOCX export of Office-prepared HTML.
//!
//! Writes a minimal WordprocessingML package: content types, package and
//! document relationships, `word/document.xml` and a numbering part for
//! lists. Office math blocks are embedded as native OMML and their TeX
//! fallback is skipped, so equations open in Word as editable equations.
//!
//! Paragraphs, headings, lists, block quotes, preformatted text, tables,
//! hyperlinks and the usual run formatting are mapped. Images are not
//! embedded.
//!
//! # Example
//!
//! ```
//! use officeclip::docx::html_with_omml_to_docx;
//! use officeclip::html::office_math_html;
//!
//! let html = format!("<p>Energy: {}</p>", office_math_html("<m:oMath><m:r><m:t>E</m:t></m:r></m:oMath>", "E"));
//! let package = html_with_omml_to_docx(&html).unwrap();
//! assert_eq!(&package[..2], b"PK");
//! ```

use crate::common::Result;
use crate::common::xml::escape_xml;
use crate::html::dom;
use markup5ever_rcdom::{Handle, NodeData};
use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_M: &str = "http://schemas.openxmlformats.org/officeDocument/2006/math";
const NS_CT: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const NS_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const REL_OFFICE_DOCUMENT: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_NUMBERING: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";
const REL_HYPERLINK: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

/// `w:numId` shared by every bullet list; ordered lists get their own ids after it
const BULLET_NUM_ID: u32 = 1;
/// Deepest list level Word numbering defines
const MAX_LIST_LEVEL: usize = 8;
/// Half-point run sizes for h1..h6
const HEADING_SIZES: [u32; 6] = [32, 28, 26, 24, 22, 22];

/// Package `html` (normally the output of the Office pipeline) as a `.docx`.
pub fn html_with_omml_to_docx(html: &str) -> Result<Vec<u8>> {
    let document = DocumentBuilder::build(html);
    let parts = [
        ("[Content_Types].xml", content_types_xml()),
        ("_rels/.rels", package_rels_xml()),
        ("word/document.xml", document.document_xml()),
        ("word/_rels/document.xml.rels", document.rels_xml()),
        ("word/numbering.xml", document.numbering_xml()),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, xml) in parts {
        zip.start_file(name, options)?;
        zip.write_all(xml.as_bytes())?;
    }
    let package = zip.finish()?.into_inner();
    tracing::debug!(
        bytes = package.len(),
        links = document.links.len(),
        "docx package written"
    );
    Ok(package)
}

/// `word/document.xml` for `html`, without packaging it.
pub fn html_to_document_xml(html: &str) -> String {
    DocumentBuilder::build(html).document_xml()
}

fn content_types_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="{NS_CT}"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/></Types>"#
    )
}

fn package_rels_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{NS_RELS}"><Relationship Id="rId1" Type="{REL_OFFICE_DOCUMENT}" Target="word/document.xml"/></Relationships>"#
    )
}

/// Formatting inherited by the runs inside an element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RunStyle {
    bold: bool,
    italic: bool,
    underline: bool,
    strike: bool,
    code: bool,
    link: bool,
    vert: Option<&'static str>,
    size: Option<u32>,
}

impl RunStyle {
    /// `w:rPr`, children in schema order.
    fn write_props(&self, out: &mut String) {
        if *self == RunStyle::default() {
            return;
        }
        out.push_str("<w:rPr>");
        if self.code {
            out.push_str("<w:rFonts w:ascii=\"Consolas\" w:hAnsi=\"Consolas\" w:cs=\"Consolas\"/>");
        }
        if self.bold {
            out.push_str("<w:b/>");
        }
        if self.italic {
            out.push_str("<w:i/>");
        }
        if self.strike {
            out.push_str("<w:strike/>");
        }
        if self.link {
            out.push_str("<w:color w:val=\"1155CC\"/>");
        }
        if let Some(size) = self.size {
            out.push_str(&format!("<w:sz w:val=\"{size}\"/>"));
        }
        if self.underline || self.link {
            out.push_str("<w:u w:val=\"single\"/>");
        }
        if let Some(vert) = self.vert {
            out.push_str(&format!("<w:vertAlign w:val=\"{vert}\"/>"));
        }
        out.push_str("</w:rPr>");
    }
}

/// An open `w:p`
#[derive(Debug, Default)]
struct Paragraph {
    props: String,
    content: String,
    has_text: bool,
    pending_space: bool,
}

/// An ordered list's numbering instance
#[derive(Debug, Clone, Copy)]
struct OrderedList {
    num_id: u32,
    level: usize,
    start: u32,
}

#[derive(Debug, Default)]
struct DocumentBuilder {
    body: String,
    paragraph: Option<Paragraph>,
    /// Hyperlink targets; target `i` is relationship `rId{i + 2}`
    links: Vec<String>,
    /// `w:numId` of every open list, innermost last
    lists: Vec<u32>,
    ordered: Vec<OrderedList>,
    quote_depth: usize,
    pre_depth: usize,
    item_depth: usize,
    link_depth: usize,
    in_fallback: bool,
}

impl DocumentBuilder {
    fn build(html: &str) -> Self {
        let mut builder = Self::default();
        for node in dom::parse_body(html) {
            builder.walk(&node, RunStyle::default(), 0);
        }
        builder.flush();
        builder
    }

    fn document_xml(&self) -> String {
        let body = if self.body.is_empty() { "<w:p/>" } else { self.body.as_str() };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{NS_W}" xmlns:m="{NS_M}" xmlns:r="{NS_R}"><w:body>{body}</w:body></w:document>"#
        )
    }

    fn rels_xml(&self) -> String {
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{NS_RELS}"><Relationship Id="rId1" Type="{REL_NUMBERING}" Target="numbering.xml"/>"#
        );
        for (i, target) in self.links.iter().enumerate() {
            xml.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="{REL_HYPERLINK}" Target="{}" TargetMode="External"/>"#,
                i + 2,
                escape_xml(target)
            ));
        }
        xml.push_str("</Relationships>");
        xml
    }

    fn numbering_xml(&self) -> String {
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="{NS_W}">"#
        );
        for (abstract_id, ordered) in [(0, false), (1, true)] {
            xml.push_str(&format!(
                r#"<w:abstractNum w:abstractNumId="{abstract_id}"><w:multiLevelType w:val="hybridMultilevel"/>"#
            ));
            for level in 0..=MAX_LIST_LEVEL {
                let (format, text) = if ordered {
                    ("decimal", format!("%{}.", level + 1))
                } else {
                    ("bullet", "\u{2022}".to_string())
                };
                xml.push_str(&format!(
                    r#"<w:lvl w:ilvl="{level}"><w:start w:val="1"/><w:numFmt w:val="{format}"/><w:lvlText w:val="{text}"/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="{}" w:hanging="360"/></w:pPr></w:lvl>"#,
                    720 * (level + 1)
                ));
            }
            xml.push_str("</w:abstractNum>");
        }
        xml.push_str(&format!(
            r#"<w:num w:numId="{BULLET_NUM_ID}"><w:abstractNumId w:val="0"/></w:num>"#
        ));
        for list in &self.ordered {
            xml.push_str(&format!(
                r#"<w:num w:numId="{}"><w:abstractNumId w:val="1"/><w:lvlOverride w:ilvl="{}"><w:startOverride w:val="{}"/></w:lvlOverride></w:num>"#,
                list.num_id, list.level, list.start
            ));
        }
        xml.push_str("</w:numbering>");
        xml
    }

    fn walk(&mut self, node: &Handle, style: RunStyle, depth: usize) {
        match &node.data {
            NodeData::Comment { contents } => self.comment(contents),
            _ if self.in_fallback => {},
            NodeData::Text { contents } => self.text(&contents.borrow(), style),
            NodeData::Element { .. } if depth < dom::MAX_DEPTH => self.element(node, style, depth),
            _ => {},
        }
    }

    fn walk_children(&mut self, node: &Handle, style: RunStyle, depth: usize) {
        for child in node.children.borrow().iter() {
            self.walk(child, style, depth + 1);
        }
    }

    fn comment(&mut self, contents: &str) {
        if let Some(omml) = dom::office_math_omml(contents) {
            self.inline_markup(omml);
        } else if contents.starts_with("[if !msEquation") {
            self.in_fallback = true;
        } else if contents == "[endif]" {
            self.in_fallback = false;
        }
    }

    fn element(&mut self, node: &Handle, style: RunStyle, depth: usize) {
        let Some(name) = dom::element_name(node) else {
            return;
        };
        let inline_only = self.link_depth > 0;
        match name.as_str() {
            "script" | "style" | "noscript" | "template" | "head" | "title" | "svg" | "annotation"
            | "annotation-xml" | "img" => {},
            "p" | "div" | "section" | "article" | "header" | "footer" | "figure" | "figcaption" | "dt" | "dd"
                if !inline_only && self.item_depth == 0 =>
            {
                self.open_paragraph(String::new());
                self.walk_children(node, style, depth);
                self.flush();
            },
            "p" | "div" | "section" | "article" | "header" | "footer" | "figure" | "figcaption" | "dt" | "dd" => {
                // Flattened into the surrounding item or link text
                self.walk_children(node, style, depth);
                if let Some(paragraph) = self.paragraph.as_mut() {
                    paragraph.pending_space |= paragraph.has_text;
                }
            },
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" if !inline_only => {
                let level = usize::from(name.as_bytes()[1] - b'1');
                self.open_paragraph(format!("<w:outlineLvl w:val=\"{level}\"/>"));
                let heading = RunStyle {
                    bold: true,
                    size: Some(HEADING_SIZES[level]),
                    ..style
                };
                self.walk_children(node, heading, depth);
                self.flush();
            },
            "blockquote" if !inline_only => {
                self.flush();
                self.quote_depth += 1;
                self.walk_children(node, style, depth);
                self.flush();
                self.quote_depth -= 1;
            },
            "pre" if !inline_only => {
                self.open_paragraph(String::new());
                self.pre_depth += 1;
                self.walk_children(node, RunStyle { code: true, ..style }, depth);
                self.pre_depth -= 1;
                self.flush();
            },
            "ul" | "ol" if !inline_only => self.list(node, name == "ol", style, depth),
            "li" if !inline_only => {
                let level = self.lists.len().saturating_sub(1).min(MAX_LIST_LEVEL);
                let num_id = self.lists.last().copied().unwrap_or(BULLET_NUM_ID);
                self.open_paragraph(format!(
                    "<w:numPr><w:ilvl w:val=\"{level}\"/><w:numId w:val=\"{num_id}\"/></w:numPr>"
                ));
                self.item_depth += 1;
                self.walk_children(node, style, depth);
                self.item_depth -= 1;
                self.flush();
            },
            "table" if !inline_only => self.table(node, style, depth),
            "hr" if !inline_only => {
                self.flush();
                self.body.push_str(
                    "<w:p><w:pPr><w:pBdr><w:bottom w:val=\"single\" w:sz=\"6\" w:space=\"1\" w:color=\"auto\"/></w:pBdr></w:pPr></w:p>",
                );
            },
            "br" => self.inline_markup("<w:r><w:br/></w:r>"),
            "b" | "strong" => self.walk_children(node, RunStyle { bold: true, ..style }, depth),
            "i" | "em" | "cite" | "var" => self.walk_children(node, RunStyle { italic: true, ..style }, depth),
            "u" | "ins" => self.walk_children(node, RunStyle { underline: true, ..style }, depth),
            "s" | "del" | "strike" => self.walk_children(node, RunStyle { strike: true, ..style }, depth),
            "code" | "kbd" | "samp" | "tt" => self.walk_children(node, RunStyle { code: true, ..style }, depth),
            "sup" => self.walk_children(node, RunStyle { vert: Some("superscript"), ..style }, depth),
            "sub" => self.walk_children(node, RunStyle { vert: Some("subscript"), ..style }, depth),
            "a" => self.link(node, style, depth),
            _ => self.walk_children(node, style, depth),
        }
    }

    fn list(&mut self, node: &Handle, ordered: bool, style: RunStyle, depth: usize) {
        self.flush();
        let num_id = if ordered {
            let num_id = BULLET_NUM_ID + 1 + self.ordered.len() as u32;
            self.ordered.push(OrderedList {
                num_id,
                level: self.lists.len().min(MAX_LIST_LEVEL),
                start: dom::attr(node, "start")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(1),
            });
            num_id
        } else {
            BULLET_NUM_ID
        };
        self.lists.push(num_id);
        // A nested list is a sibling paragraph of its item's text
        let item_depth = std::mem::take(&mut self.item_depth);
        self.walk_children(node, style, depth);
        self.item_depth = item_depth;
        self.lists.pop();
        self.flush();
    }

    fn table(&mut self, node: &Handle, style: RunStyle, depth: usize) {
        self.flush();
        let rows = table_rows(node);
        let columns = rows.iter().map(|row| row_cells(row).len()).max().unwrap_or(0);
        if columns == 0 {
            return;
        }

        self.body.push_str(
            "<w:tbl><w:tblPr><w:tblW w:w=\"0\" w:type=\"auto\"/><w:tblBorders>\
             <w:top w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"DDDDDD\"/>\
             <w:left w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"DDDDDD\"/>\
             <w:bottom w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"DDDDDD\"/>\
             <w:right w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"DDDDDD\"/>\
             <w:insideH w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"DDDDDD\"/>\
             <w:insideV w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"DDDDDD\"/>\
             </w:tblBorders></w:tblPr><w:tblGrid>",
        );
        for _ in 0..columns {
            self.body.push_str(&format!("<w:gridCol w:w=\"{}\"/>", 9000 / columns));
        }
        self.body.push_str("</w:tblGrid>");

        let item_depth = std::mem::take(&mut self.item_depth);
        for row in &rows {
            self.body.push_str("<w:tr>");
            let cells = row_cells(row);
            for cell in &cells {
                self.body.push_str("<w:tc><w:tcPr><w:tcW w:w=\"0\" w:type=\"auto\"/></w:tcPr>");
                let header = dom::element_name(cell).as_deref() == Some("th");
                let cell_style = RunStyle {
                    bold: style.bold || header,
                    ..style
                };
                self.walk_children(cell, cell_style, depth + 1);
                self.flush();
                // A cell must end with a paragraph
                if !self.body.ends_with("</w:p>") && !self.body.ends_with("<w:p/>") {
                    self.body.push_str("<w:p/>");
                }
                self.body.push_str("</w:tc>");
            }
            for _ in cells.len()..columns {
                self.body.push_str("<w:tc><w:p/></w:tc>");
            }
            self.body.push_str("</w:tr>");
        }
        self.item_depth = item_depth;
        self.body.push_str("</w:tbl>");
    }

    fn link(&mut self, node: &Handle, style: RunStyle, depth: usize) {
        let target = dom::attr(node, "href").filter(|href| is_external_target(href));
        let Some(target) = target.filter(|_| self.link_depth == 0) else {
            self.walk_children(node, style, depth);
            return;
        };

        let index = match self.links.iter().position(|t| *t == target) {
            Some(i) => i,
            None => {
                self.links.push(target);
                self.links.len() - 1
            },
        };
        self.inline_markup(&format!("<w:hyperlink r:id=\"rId{}\">", index + 2));
        self.link_depth += 1;
        self.walk_children(node, RunStyle { link: true, ..style }, depth);
        self.link_depth -= 1;
        self.paragraph_mut().content.push_str("</w:hyperlink>");
    }

    fn text(&mut self, text: &str, style: RunStyle) {
        let pre = self.pre_depth > 0;
        let paragraph = self.paragraph_mut();
        let mut runs = String::new();

        if pre {
            for (i, line) in text.split('\n').enumerate() {
                if i > 0 {
                    runs.push_str("<w:r><w:br/></w:r>");
                }
                if !line.is_empty() {
                    push_run(&mut runs, line, style);
                }
            }
            paragraph.has_text = true;
        } else {
            let mut collapsed = String::with_capacity(text.len());
            for c in text.chars() {
                if c.is_whitespace() {
                    paragraph.pending_space |= paragraph.has_text;
                    continue;
                }
                if paragraph.pending_space {
                    collapsed.push(' ');
                    paragraph.pending_space = false;
                }
                collapsed.push(c);
                paragraph.has_text = true;
            }
            if !collapsed.is_empty() {
                push_run(&mut runs, &collapsed, style);
            }
        }
        paragraph.content.push_str(&runs);
    }

    /// Non-text inline content (OMML, breaks, hyperlink starts).
    fn inline_markup(&mut self, markup: &str) {
        let paragraph = self.paragraph_mut();
        if paragraph.pending_space {
            push_run(&mut paragraph.content, " ", RunStyle::default());
            paragraph.pending_space = false;
        }
        paragraph.content.push_str(markup);
        paragraph.has_text = !markup.contains("<w:br/>");
    }

    fn paragraph_mut(&mut self) -> &mut Paragraph {
        if self.paragraph.is_none() {
            self.open_paragraph(String::new());
        }
        self.paragraph.get_or_insert_with(Paragraph::default)
    }

    fn open_paragraph(&mut self, props: String) {
        self.flush();
        let props = if self.quote_depth > 0 {
            format!("{props}<w:ind w:left=\"{}\"/>", 720 * self.quote_depth)
        } else {
            props
        };
        self.paragraph = Some(Paragraph {
            props,
            ..Paragraph::default()
        });
    }

    fn flush(&mut self) {
        let Some(paragraph) = self.paragraph.take() else {
            return;
        };
        if paragraph.content.is_empty() {
            return;
        }
        self.body.push_str("<w:p>");
        if !paragraph.props.is_empty() {
            self.body.push_str("<w:pPr>");
            self.body.push_str(&paragraph.props);
            self.body.push_str("</w:pPr>");
        }
        self.body.push_str(&paragraph.content);
        self.body.push_str("</w:p>");
    }
}

fn push_run(out: &mut String, text: &str, style: RunStyle) {
    out.push_str("<w:r>");
    style.write_props(out);
    out.push_str("<w:t xml:space=\"preserve\">");
    out.push_str(&escape_xml(text));
    out.push_str("</w:t></w:r>");
}

/// Absolute links only; in-page anchors and script URLs are dropped.
fn is_external_target(href: &str) -> bool {
    let lower = href.trim().to_ascii_lowercase();
    ["http://", "https://", "mailto:", "ftp://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// Rows of `table`, not descending into nested tables.
fn table_rows(table: &Handle) -> Vec<Handle> {
    let mut rows = Vec::new();
    let mut stack: Vec<Handle> = table.children.borrow().iter().rev().cloned().collect();
    while let Some(node) = stack.pop() {
        match dom::element_name(&node).as_deref() {
            Some("tr") => rows.push(node),
            Some("thead" | "tbody" | "tfoot") => stack.extend(node.children.borrow().iter().rev().cloned()),
            _ => {},
        }
    }
    rows
}

fn row_cells(row: &Handle) -> Vec<Handle> {
    row.children
        .borrow()
        .iter()
        .filter(|c| matches!(dom::element_name(c).as_deref(), Some("td" | "th")))
        .cloned()
        .collect()
}
