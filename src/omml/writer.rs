// OMML writer
//
// Walks a MathML tree and emits Office Math markup element by element, driven
// by the rule table in `lookup`. Sibling lookahead handles the constructs that
// MathML spreads over several elements: n-ary operators take the following
// sibling as their body, function names take the argument after U+2061, and
// rows that open and close with matching fences become delimiters.

use super::error::OmmlError;
use super::lookup::{
    ACCENTS, BARS, CLOSING_FENCES, FENCE_PAIRS, INTEGRALS, INVISIBLE_OPERATORS, Rule, VARIANTS, is_nary,
    rule_for,
};
use super::tree::{MathElement, MathNode};
use crate::common::xml::{escape_text, escape_xml};

const FUNCTION_APPLICATION: &str = "\u{2061}";

/// Rewrite a parsed `<math>` element into `m:oMath` (inline) or
/// `m:oMathPara` (display) markup.
pub fn write_omml(root: &MathElement) -> Result<String, OmmlError> {
    let display = root.attr("display") == Some("block") || root.attr("mode") == Some("display");

    let mut writer = OmmlWriter::default();
    if display {
        writer.out.push_str("<m:oMathPara>");
    }
    writer.out.push_str("<m:oMath>");
    writer.write_sequence(&root.children)?;
    writer.out.push_str("</m:oMath>");
    if display {
        writer.out.push_str("</m:oMathPara>");
    }
    Ok(writer.out)
}

/// Parts of an n-ary construct
struct Nary<'a> {
    op: String,
    sub: Option<&'a MathElement>,
    sup: Option<&'a MathElement>,
    under_over: bool,
}

#[derive(Default)]
struct OmmlWriter {
    out: String,
}

impl OmmlWriter {
    fn write_sequence(&mut self, nodes: &[MathNode]) -> Result<(), OmmlError> {
        let mut i = 0;
        while i < nodes.len() {
            let element = match &nodes[i] {
                MathNode::Text(text) => {
                    if !text.trim().is_empty() {
                        self.run(text.trim(), None, None, false);
                    }
                    i += 1;
                    continue;
                },
                MathNode::Element(e) => e,
            };
            let next = nodes.get(i + 1).and_then(MathNode::as_element);

            if let Some(nary) = nary_parts(element)? {
                self.write_nary(&nary, next)?;
                i += if next.is_some() { 2 } else { 1 };
                continue;
            }

            if is_function_name(element) && next.is_some_and(is_function_application) {
                let argument = nodes.get(i + 2).and_then(MathNode::as_element);
                self.write_function(element, argument)?;
                i += if argument.is_some() { 3 } else { 2 };
                continue;
            }

            self.write_element(element)?;
            i += 1;
        }
        Ok(())
    }

    fn write_element(&mut self, element: &MathElement) -> Result<(), OmmlError> {
        let Some(rule) = rule_for(&element.name) else {
            tracing::debug!(element = %element.name, "no OMML rule, writing children");
            return self.write_sequence(&element.children);
        };

        match rule {
            Rule::Row => self.write_row(element),
            Rule::FirstChild => match element.element_children().next() {
                Some(first) => self.write_element(first),
                None => Ok(()),
            },
            Rule::Strip => Ok(()),
            Rule::Identifier => {
                let text = element.text();
                let variant = match element.attr("mathvariant") {
                    Some(v) => Some(v),
                    None if text.chars().count() > 1 => Some("normal"),
                    None => None,
                };
                let (sty, scr) = variant.and_then(|v| VARIANTS.get(v).copied()).unwrap_or((None, None));
                self.run(&text, sty, scr, false);
                Ok(())
            },
            Rule::Number => {
                self.run(&element.text(), None, None, false);
                Ok(())
            },
            Rule::Operator => {
                let text = element.text();
                if !text.is_empty() && !INVISIBLE_OPERATORS.contains(text.as_str()) {
                    self.run(&text, None, None, false);
                }
                Ok(())
            },
            Rule::Text => {
                let text = element.raw_text();
                if !text.is_empty() {
                    self.run(&text, None, None, true);
                }
                Ok(())
            },
            Rule::StringLiteral => {
                let lquote = element.attr("lquote").unwrap_or("\"");
                let rquote = element.attr("rquote").unwrap_or("\"");
                self.run(&format!("{}{}{}", lquote, element.raw_text(), rquote), None, None, true);
                Ok(())
            },
            Rule::Space => {
                if let Some(space) = space_for_width(element.attr("width")) {
                    self.run(space, None, None, false);
                }
                Ok(())
            },
            Rule::Sup => {
                let [base, sup] = exact_children::<2>(element)?;
                self.open("m:sSup");
                self.wrap("m:e", base)?;
                self.wrap("m:sup", sup)?;
                self.close("m:sSup");
                Ok(())
            },
            Rule::Sub => {
                let [base, sub] = exact_children::<2>(element)?;
                self.open("m:sSub");
                self.wrap("m:e", base)?;
                self.wrap("m:sub", sub)?;
                self.close("m:sSub");
                Ok(())
            },
            Rule::SubSup => {
                let [base, sub, sup] = exact_children::<3>(element)?;
                self.write_sub_sup(base, sub, sup)
            },
            Rule::Multiscripts => self.write_multiscripts(element),
            Rule::Fraction => self.write_fraction(element),
            Rule::Sqrt => {
                self.out.push_str("<m:rad><m:radPr><m:degHide m:val=\"1\"/></m:radPr><m:deg/>");
                self.open("m:e");
                self.write_sequence(&element.children)?;
                self.close("m:e");
                self.close("m:rad");
                Ok(())
            },
            Rule::Root => {
                let [base, index] = exact_children::<2>(element)?;
                self.open("m:rad");
                self.wrap("m:deg", index)?;
                self.wrap("m:e", base)?;
                self.close("m:rad");
                Ok(())
            },
            Rule::Fenced => self.write_fenced(element),
            Rule::Under => {
                let [base, under] = exact_children::<2>(element)?;
                self.write_under(base, under)
            },
            Rule::Over => {
                let [base, over] = exact_children::<2>(element)?;
                self.write_over(element, base, over)
            },
            Rule::UnderOver => {
                let [base, under, over] = exact_children::<3>(element)?;
                self.open("m:limUpp");
                self.open("m:e");
                self.write_under(base, under)?;
                self.close("m:e");
                self.wrap("m:lim", over)?;
                self.close("m:limUpp");
                Ok(())
            },
            Rule::Table => self.write_table(element),
            // Stray table parts outside mtable: keep the content
            Rule::TableRow | Rule::LabeledRow | Rule::Cell => self.write_sequence(&element.children),
            Rule::Enclose => self.write_enclose(element),
            Rule::Phantom => {
                self.out.push_str("<m:phant><m:phantPr><m:show m:val=\"0\"/></m:phantPr>");
                self.open("m:e");
                self.write_sequence(&element.children)?;
                self.close("m:e");
                self.close("m:phant");
                Ok(())
            },
        }
    }

    /// Rows that open and close with a matching fence pair become `m:d`.
    fn write_row(&mut self, row: &MathElement) -> Result<(), OmmlError> {
        let elements: Vec<&MathElement> = row.element_children().collect();
        if elements.len() >= 2 {
            let first = elements[0];
            let last = elements[elements.len() - 1];
            if let Some((open, close)) = fence_pair(first, last) {
                // Children between the fences, as nodes, so lookahead still works
                let inner: Vec<MathNode> = elements[1..elements.len() - 1]
                    .iter()
                    .map(|e| MathNode::Element((*e).clone()))
                    .collect();
                self.out.push_str("<m:d><m:dPr>");
                self.val("m:begChr", &open);
                self.val("m:endChr", &close);
                self.out.push_str("</m:dPr>");
                self.open("m:e");
                self.write_sequence(&inner)?;
                self.close("m:e");
                self.close("m:d");
                return Ok(());
            }
        }
        self.write_sequence(&row.children)
    }

    fn write_sub_sup(&mut self, base: &MathElement, sub: &MathElement, sup: &MathElement) -> Result<(), OmmlError> {
        self.open("m:sSubSup");
        self.wrap("m:e", base)?;
        self.wrap("m:sub", sub)?;
        self.wrap("m:sup", sup)?;
        self.close("m:sSubSup");
        Ok(())
    }

    fn write_nary(&mut self, nary: &Nary<'_>, body: Option<&MathElement>) -> Result<(), OmmlError> {
        let under_over = nary.under_over && !INTEGRALS.contains(nary.op.as_str());
        self.out.push_str("<m:nary><m:naryPr>");
        self.val("m:chr", &nary.op);
        self.val("m:limLoc", if under_over { "undOvr" } else { "subSup" });
        if nary.sub.is_none() {
            self.val("m:subHide", "1");
        }
        if nary.sup.is_none() {
            self.val("m:supHide", "1");
        }
        self.out.push_str("</m:naryPr>");
        self.optional("m:sub", nary.sub)?;
        self.optional("m:sup", nary.sup)?;
        self.optional("m:e", body)?;
        self.close("m:nary");
        Ok(())
    }

    fn write_function(&mut self, name: &MathElement, argument: Option<&MathElement>) -> Result<(), OmmlError> {
        self.open("m:func");
        self.wrap("m:fName", name)?;
        self.optional("m:e", argument)?;
        self.close("m:func");
        Ok(())
    }

    fn write_fraction(&mut self, element: &MathElement) -> Result<(), OmmlError> {
        let [num, den] = exact_children::<2>(element)?;
        let no_bar = element
            .attr("linethickness")
            .is_some_and(|t| t.trim_end_matches(|c: char| c.is_ascii_alphabetic()).trim() == "0");
        let skewed = element.attr("bevelled") == Some("true");

        self.open("m:f");
        if no_bar {
            self.out.push_str("<m:fPr>");
            self.val("m:type", "noBar");
            self.out.push_str("</m:fPr>");
        } else if skewed {
            self.out.push_str("<m:fPr>");
            self.val("m:type", "skw");
            self.out.push_str("</m:fPr>");
        }
        self.wrap("m:num", num)?;
        self.wrap("m:den", den)?;
        self.close("m:f");
        Ok(())
    }

    fn write_fenced(&mut self, element: &MathElement) -> Result<(), OmmlError> {
        let open = element.attr("open").unwrap_or("(");
        let close = element.attr("close").unwrap_or(")");
        let separators: String = element
            .attr("separators")
            .unwrap_or(",")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        self.out.push_str("<m:d><m:dPr>");
        self.val("m:begChr", open);
        if let Some(sep) = separators.chars().next() {
            self.val("m:sepChr", &sep.to_string());
        }
        self.val("m:endChr", close);
        self.out.push_str("</m:dPr>");
        let mut any = false;
        for child in element.element_children() {
            self.wrap("m:e", child)?;
            any = true;
        }
        if !any {
            self.out.push_str("<m:e/>");
        }
        self.close("m:d");
        Ok(())
    }

    fn write_under(&mut self, base: &MathElement, under: &MathElement) -> Result<(), OmmlError> {
        let script = token_text(under);
        if script.as_deref().is_some_and(|s| BARS.contains(s)) {
            return self.write_bar(base, "bot");
        }
        if script.as_deref() == Some("⏟") {
            return self.write_group_char(base, "⏟", "bot");
        }
        self.open("m:limLow");
        self.wrap("m:e", base)?;
        self.wrap("m:lim", under)?;
        self.close("m:limLow");
        Ok(())
    }

    fn write_over(&mut self, element: &MathElement, base: &MathElement, over: &MathElement) -> Result<(), OmmlError> {
        let script = token_text(over);
        if let Some(s) = script.as_deref() {
            if BARS.contains(s) {
                return self.write_bar(base, "top");
            }
            if s == "⏞" {
                return self.write_group_char(base, "⏞", "top");
            }
            let accent: Option<&str> = match ACCENTS.get(s) {
                Some(chr) => Some(*chr),
                None if element.attr("accent") == Some("true") => Some(s),
                None => None,
            };
            if let Some(chr) = accent {
                self.out.push_str("<m:acc><m:accPr>");
                self.val("m:chr", chr);
                self.out.push_str("</m:accPr>");
                self.wrap("m:e", base)?;
                self.close("m:acc");
                return Ok(());
            }
        }
        self.open("m:limUpp");
        self.wrap("m:e", base)?;
        self.wrap("m:lim", over)?;
        self.close("m:limUpp");
        Ok(())
    }

    fn write_bar(&mut self, base: &MathElement, pos: &str) -> Result<(), OmmlError> {
        self.out.push_str("<m:bar><m:barPr>");
        self.val("m:pos", pos);
        self.out.push_str("</m:barPr>");
        self.wrap("m:e", base)?;
        self.close("m:bar");
        Ok(())
    }

    fn write_group_char(&mut self, base: &MathElement, chr: &str, pos: &str) -> Result<(), OmmlError> {
        self.out.push_str("<m:groupChr><m:groupChrPr>");
        self.val("m:chr", chr);
        self.val("m:pos", pos);
        self.out.push_str("</m:groupChrPr>");
        self.wrap("m:e", base)?;
        self.close("m:groupChr");
        Ok(())
    }

    fn write_multiscripts(&mut self, element: &MathElement) -> Result<(), OmmlError> {
        let children: Vec<&MathElement> = element.element_children().collect();
        let Some((&base, rest)) = children.split_first() else {
            return Err(OmmlError::InvalidStructure("mmultiscripts without base".to_string()));
        };
        let split = rest.iter().position(|e| e.name == "mprescripts");
        let (post, pre) = match split {
            Some(at) => (&rest[..at], &rest[at + 1..]),
            None => (rest, &rest[rest.len()..]),
        };

        let has_pre = pre.len() >= 2;
        if has_pre {
            self.open("m:sPre");
            self.wrap("m:sub", pre[0])?;
            self.wrap("m:sup", pre[1])?;
            self.open("m:e");
        }
        if post.len() >= 2 {
            self.write_sub_sup(base, post[0], post[1])?;
        } else {
            self.write_element(base)?;
        }
        if has_pre {
            self.close("m:e");
            self.close("m:sPre");
        }
        Ok(())
    }

    fn write_table(&mut self, table: &MathElement) -> Result<(), OmmlError> {
        let rows: Vec<Vec<&MathElement>> = table
            .element_children()
            .filter(|row| matches!(row.name.as_str(), "mtr" | "mlabeledtr"))
            .map(|row| {
                let skip = usize::from(row.name == "mlabeledtr");
                row.element_children().skip(skip).collect()
            })
            .collect();
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);

        self.out.push_str("<m:m><m:mPr><m:mcs><m:mc><m:mcPr>");
        self.val("m:count", &columns.to_string());
        self.val("m:mcJc", "center");
        self.out.push_str("</m:mcPr></m:mc></m:mcs></m:mPr>");
        for row in &rows {
            self.open("m:mr");
            for cell in row {
                self.open("m:e");
                self.write_sequence(&cell.children)?;
                self.close("m:e");
            }
            for _ in row.len()..columns {
                self.out.push_str("<m:e/>");
            }
            self.close("m:mr");
        }
        self.close("m:m");
        Ok(())
    }

    fn write_enclose(&mut self, element: &MathElement) -> Result<(), OmmlError> {
        let notation = element.attr("notation").unwrap_or("longdiv");
        let notations: Vec<&str> = notation.split_whitespace().collect();
        let has = |n: &str| notations.contains(&n);

        if notations == ["top"] || notations == ["bottom"] {
            self.out.push_str("<m:bar><m:barPr>");
            self.val("m:pos", if has("top") { "top" } else { "bot" });
            self.out.push_str("</m:barPr>");
            self.open("m:e");
            self.write_sequence(&element.children)?;
            self.close("m:e");
            self.close("m:bar");
            return Ok(());
        }

        let strikes = [
            ("horizontalstrike", "m:strikeH"),
            ("verticalstrike", "m:strikeV"),
            ("updiagonalstrike", "m:strikeBLTR"),
            ("downdiagonalstrike", "m:strikeTLBR"),
        ];
        let boxed = notations
            .iter()
            .any(|n| matches!(*n, "box" | "roundedbox" | "circle" | "longdiv" | "left" | "right" | "top" | "bottom"));

        self.open("m:borderBox");
        if !boxed || strikes.iter().any(|(n, _)| has(n)) {
            self.out.push_str("<m:borderBoxPr>");
            if !boxed {
                for side in ["m:hideTop", "m:hideBot", "m:hideLeft", "m:hideRight"] {
                    self.val(side, "1");
                }
            }
            for (name, tag) in strikes {
                if has(name) {
                    self.val(tag, "1");
                }
            }
            self.out.push_str("</m:borderBoxPr>");
        }
        self.open("m:e");
        self.write_sequence(&element.children)?;
        self.close("m:e");
        self.close("m:borderBox");
        Ok(())
    }

    fn run(&mut self, text: &str, sty: Option<&str>, scr: Option<&str>, normal_text: bool) {
        self.out.push_str("<m:r>");
        if normal_text {
            self.out.push_str("<m:rPr><m:nor/></m:rPr>");
        } else if sty.is_some() || scr.is_some() {
            self.out.push_str("<m:rPr>");
            if let Some(scr) = scr {
                self.val("m:scr", scr);
            }
            if let Some(sty) = sty {
                self.val("m:sty", sty);
            }
            self.out.push_str("</m:rPr>");
        }
        if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
            self.out.push_str("<m:t xml:space=\"preserve\">");
        } else {
            self.out.push_str("<m:t>");
        }
        self.out.push_str(&escape_text(text));
        self.out.push_str("</m:t></m:r>");
    }

    fn wrap(&mut self, tag: &str, element: &MathElement) -> Result<(), OmmlError> {
        self.open(tag);
        self.write_element(element)?;
        self.close(tag);
        Ok(())
    }

    fn optional(&mut self, tag: &str, element: Option<&MathElement>) -> Result<(), OmmlError> {
        match element {
            Some(element) => self.wrap(tag, element),
            None => {
                self.out.push('<');
                self.out.push_str(tag);
                self.out.push_str("/>");
                Ok(())
            },
        }
    }

    fn val(&mut self, tag: &str, value: &str) {
        self.out.push('<');
        self.out.push_str(tag);
        self.out.push_str(" m:val=\"");
        self.out.push_str(&escape_xml(value));
        self.out.push_str("\"/>");
    }

    #[inline]
    fn open(&mut self, tag: &str) {
        self.out.push('<');
        self.out.push_str(tag);
        self.out.push('>');
    }

    #[inline]
    fn close(&mut self, tag: &str) {
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
    }
}

fn exact_children<const N: usize>(element: &MathElement) -> Result<[&MathElement; N], OmmlError> {
    let children: Vec<&MathElement> = element.element_children().collect();
    let count = children.len();
    children.try_into().map_err(|_| {
        OmmlError::InvalidStructure(format!("<{}> needs {} children, found {}", element.name, N, count))
    })
}

/// Text of a lone operator-like token, looking through single-child rows.
fn token_text(element: &MathElement) -> Option<String> {
    match element.name.as_str() {
        "mo" | "mi" | "mtext" => Some(element.text()),
        "mrow" | "mstyle" => {
            let mut children = element.element_children();
            match (children.next(), children.next()) {
                (Some(only), None) => token_text(only),
                _ => None,
            }
        },
        _ => None,
    }
}

fn nary_parts(element: &MathElement) -> Result<Option<Nary<'_>>, OmmlError> {
    let (under_over, arity) = match element.name.as_str() {
        "mo" => {
            let op = element.text();
            return Ok(is_nary(&op).then_some(Nary {
                op,
                sub: None,
                sup: None,
                under_over: false,
            }));
        },
        "msub" | "msup" => (false, 2),
        "msubsup" => (false, 3),
        "munder" | "mover" => (true, 2),
        "munderover" => (true, 3),
        _ => return Ok(None),
    };

    let Some(base) = element.element_children().next() else {
        return Ok(None);
    };
    let op = match token_text(base) {
        Some(op) if base.name != "mi" && is_nary(&op) => op,
        _ => return Ok(None),
    };

    let (sub, sup) = if arity == 3 {
        let [_, sub, sup] = exact_children::<3>(element)?;
        (Some(sub), Some(sup))
    } else {
        let [_, script] = exact_children::<2>(element)?;
        match element.name.as_str() {
            "msub" | "munder" => (Some(script), None),
            _ => (None, Some(script)),
        }
    };
    Ok(Some(Nary {
        op,
        sub,
        sup,
        under_over,
    }))
}

fn is_function_name(element: &MathElement) -> bool {
    match element.name.as_str() {
        "mi" => element.text().chars().count() > 1 || element.attr("mathvariant") == Some("normal"),
        "msub" | "msup" | "msubsup" | "munder" | "mover" | "munderover" => {
            element.element_children().next().is_some_and(is_function_name)
        },
        _ => false,
    }
}

fn is_function_application(element: &MathElement) -> bool {
    element.name == "mo" && element.text() == FUNCTION_APPLICATION
}

fn fence_pair(first: &MathElement, last: &MathElement) -> Option<(String, String)> {
    if first.name != "mo" || last.name != "mo" {
        return None;
    }
    let open = first.text();
    let close = last.text();
    let explicit = first.attr("fence") == Some("true") && last.attr("fence") == Some("true");
    let matching = FENCE_PAIRS.get(open.as_str()).is_some_and(|c| *c == close);
    if matching || (explicit && (FENCE_PAIRS.contains_key(open.as_str()) || CLOSING_FENCES.contains(close.as_str()))) {
        Some((open, close))
    } else {
        None
    }
}

fn space_for_width(width: Option<&str>) -> Option<&'static str> {
    let width = width?.trim();
    let em: f32 = width.strip_suffix("em").unwrap_or(width).trim().parse().ok()?;
    match em {
        w if w <= 0.0 => None,
        w if w < 0.5 => Some("\u{2009}"),
        w if w < 1.5 => Some("\u{2003}"),
        _ => Some("\u{2003}\u{2003}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::omml::tree::parse;

    fn omml(mathml: &str) -> String {
        write_omml(&parse(mathml).unwrap()).unwrap()
    }

    #[test]
    fn test_inline_and_display_roots() {
        assert_eq!(omml("<math><mi>x</mi></math>"), "<m:oMath><m:r><m:t>x</m:t></m:r></m:oMath>");
        assert!(omml("<math display=\"block\"><mi>x</mi></math>").starts_with("<m:oMathPara><m:oMath>"));
    }

    #[test]
    fn test_superscript() {
        assert_eq!(
            omml("<math><msup><mi>c</mi><mn>2</mn></msup></math>"),
            "<m:oMath><m:sSup><m:e><m:r><m:t>c</m:t></m:r></m:e><m:sup><m:r><m:t>2</m:t></m:r></m:sup></m:sSup></m:oMath>"
        );
    }

    #[test]
    fn test_fraction_without_bar() {
        let out = omml("<math><mfrac linethickness=\"0\"><mi>n</mi><mi>k</mi></mfrac></math>");
        assert!(out.contains("<m:f><m:fPr><m:type m:val=\"noBar\"/></m:fPr><m:num>"));
    }

    #[test]
    fn test_sqrt_and_root() {
        assert!(omml("<math><msqrt><mi>x</mi></msqrt></math>").contains("<m:degHide m:val=\"1\"/>"));
        let root = omml("<math><mroot><mi>x</mi><mn>3</mn></mroot></math>");
        assert!(root.contains("<m:rad><m:deg><m:r><m:t>3</m:t></m:r></m:deg><m:e><m:r><m:t>x</m:t></m:r></m:e></m:rad>"));
    }

    #[test]
    fn test_nary_absorbs_next_sibling() {
        let out = omml(
            "<math><munderover><mo>∑</mo><mrow><mi>i</mi><mo>=</mo><mn>1</mn></mrow><mi>n</mi></munderover><msub><mi>a</mi><mi>i</mi></msub></math>",
        );
        assert!(out.contains("<m:nary><m:naryPr><m:chr m:val=\"∑\"/><m:limLoc m:val=\"undOvr\"/></m:naryPr>"));
        assert!(out.contains("<m:e><m:sSub>"));
        assert!(!out.contains("</m:nary><m:sSub>"));
    }

    #[test]
    fn test_integral_limits_stay_beside() {
        let out = omml("<math><munderover><mo>∫</mo><mn>0</mn><mn>1</mn></munderover><mi>f</mi></math>");
        assert!(out.contains("<m:limLoc m:val=\"subSup\"/>"));
    }

    #[test]
    fn test_bare_nary_hides_limits() {
        let out = omml("<math><mo>∮</mo><mi>F</mi></math>");
        assert!(out.contains("<m:subHide m:val=\"1\"/><m:supHide m:val=\"1\"/>"));
        assert!(out.contains("<m:sub/><m:sup/><m:e>"));
    }

    #[test]
    fn test_fence_pair_in_row_becomes_delimiter() {
        let out = omml("<math><mrow><mo>(</mo><mi>a</mi><mo>+</mo><mi>b</mi><mo>)</mo></mrow></math>");
        assert!(out.starts_with("<m:oMath><m:d><m:dPr><m:begChr m:val=\"(\"/><m:endChr m:val=\")\"/></m:dPr><m:e>"));
    }

    #[test]
    fn test_mfenced_separators() {
        let out = omml("<math><mfenced open=\"[\" close=\"]\"><mi>a</mi><mi>b</mi></mfenced></math>");
        assert!(out.contains("<m:begChr m:val=\"[\"/><m:sepChr m:val=\",\"/><m:endChr m:val=\"]\"/>"));
        assert_eq!(out.matches("<m:e>").count(), 2);
    }

    #[test]
    fn test_accent_and_bar() {
        let hat = omml("<math><mover accent=\"true\"><mi>x</mi><mo>^</mo></mover></math>");
        assert!(hat.contains("<m:acc><m:accPr><m:chr m:val=\"\u{0302}\"/></m:accPr>"));
        let bar = omml("<math><mover><mi>x</mi><mo>¯</mo></mover></math>");
        assert!(bar.contains("<m:bar><m:barPr><m:pos m:val=\"top\"/></m:barPr>"));
    }

    #[test]
    fn test_limit_function() {
        let out = omml(
            "<math><munder><mi>lim</mi><mrow><mi>x</mi><mo>→</mo><mn>0</mn></mrow></munder><mo>\u{2061}</mo><mi>f</mi></math>",
        );
        assert!(out.starts_with("<m:oMath><m:func><m:fName><m:limLow>"));
        assert!(out.contains("<m:sty m:val=\"p\"/>"));
        assert!(out.contains("</m:fName><m:e><m:r><m:t>f</m:t></m:r></m:e></m:func>"));
    }

    #[test]
    fn test_matrix_pads_short_rows() {
        let out = omml("<math><mtable><mtr><mtd><mn>1</mn></mtd><mtd><mn>2</mn></mtd></mtr><mtr><mtd><mn>3</mn></mtd></mtr></mtable></math>");
        assert!(out.contains("<m:count m:val=\"2\"/>"));
        assert!(out.contains("<m:mr><m:e><m:r><m:t>3</m:t></m:r></m:e><m:e/></m:mr>"));
    }

    #[test]
    fn test_annotation_stripped() {
        let out = omml(
            "<math><semantics><mi>x</mi><annotation encoding=\"application/x-tex\">x</annotation></semantics></math>",
        );
        assert_eq!(out, "<m:oMath><m:r><m:t>x</m:t></m:r></m:oMath>");
    }

    #[test]
    fn test_text_runs() {
        let out = omml("<math><mtext> if </mtext><mi mathvariant=\"double-struck\">R</mi></math>");
        assert!(out.contains("<m:r><m:rPr><m:nor/></m:rPr><m:t xml:space=\"preserve\"> if </m:t></m:r>"));
        assert!(out.contains("<m:scr m:val=\"double-struck\"/><m:sty m:val=\"p\"/>"));
    }

    #[test]
    fn test_enclose_box() {
        let out = omml("<math><menclose notation=\"box\"><mi>x</mi></menclose></math>");
        assert!(out.contains("<m:borderBox><m:e>"));
    }

    #[test]
    fn test_wrong_arity_is_an_error() {
        let root = parse("<math><mfrac><mi>x</mi></mfrac></math>").unwrap();
        assert!(matches!(write_omml(&root), Err(OmmlError::InvalidStructure(_))));
    }
}
