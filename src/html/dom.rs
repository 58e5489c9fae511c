// html5ever DOM access shared by Office normalization and DOCX export
//
// Fragments are parsed in a `<body>` context, so leading comments and bare
// inline content stay where they were instead of moving into a synthesized
// document head.

use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, QualName, local_name, namespace_url, ns, parse_fragment};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Deepest element nesting walked; anything below is dropped.
pub(crate) const MAX_DEPTH: usize = 256;

/// Top-level nodes of an HTML fragment.
pub(crate) fn parse_body(html: &str) -> Vec<Handle> {
    let context = QualName::new(None, ns!(html), local_name!("body"));
    let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new()).one(html);
    // document > html (fragment root) > nodes
    let root = dom.document.children.borrow().first().cloned();
    root.map(|root| root.children.borrow().clone()).unwrap_or_default()
}

/// Lower-case local name of an element node.
pub(crate) fn element_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some((*name.local).to_ascii_lowercase()),
        _ => None,
    }
}

pub(crate) fn attr(node: &Handle, key: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| (*a.name.local).eq_ignore_ascii_case(key))
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

pub(crate) fn has_class(node: &Handle, class: &str) -> bool {
    attr(node, "class").is_some_and(|c| c.split_whitespace().any(|c| c == class))
}

/// First descendant element named `name`, searched depth first.
pub(crate) fn find_descendant(node: &Handle, name: &str) -> Option<Handle> {
    let mut stack: Vec<Handle> = node.children.borrow().iter().rev().cloned().collect();
    while let Some(next) = stack.pop() {
        if element_name(&next).as_deref() == Some(name) {
            return Some(next);
        }
        stack.extend(next.children.borrow().iter().rev().cloned());
    }
    None
}

/// Comment markup as it appeared in the source.
///
/// The parser turns Office's downlevel-revealed markers (`<![if !msEquation]>`,
/// `<![endif]>`) into bogus comments; they are written back in their
/// original form so the fallback around Office math stays intact.
pub(crate) fn write_comment(contents: &str, out: &mut String) {
    if is_downlevel_marker(contents) {
        out.push_str("<!");
        out.push_str(contents);
        out.push('>');
    } else {
        out.push_str("<!--");
        out.push_str(contents);
        out.push_str("-->");
    }
}

/// `[if …]` or `[endif]` with nothing else inside.
fn is_downlevel_marker(contents: &str) -> bool {
    (contents.starts_with("[if ") && contents.ends_with(']') && !contents.contains('>')) || contents == "[endif]"
}

/// OMML carried by an `msEquation` conditional comment.
pub(crate) fn office_math_omml(contents: &str) -> Option<&str> {
    let rest = contents.strip_prefix("[if gte msEquation")?;
    let body = &rest[rest.find('>')? + 1..];
    let end = body.rfind("<![endif]").unwrap_or(body.len());
    let omml = body[..end].trim();
    omml.starts_with("<m:oMath").then_some(omml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_comment_stays_in_fragment() {
        let nodes = parse_body("<!--COF_TEX_0--> tail");
        assert_eq!(nodes.len(), 2);
        assert!(matches!(&nodes[0].data, NodeData::Comment { contents } if &**contents == "COF_TEX_0"));
    }

    #[test]
    fn test_downlevel_markers_survive() {
        let nodes = parse_body("<![if !msEquation]>x<![endif]>");
        let mut out = String::new();
        for node in &nodes {
            match &node.data {
                NodeData::Comment { contents } => write_comment(contents, &mut out),
                NodeData::Text { contents } => out.push_str(&contents.borrow()),
                _ => {},
            }
        }
        assert_eq!(out, "<![if !msEquation]>x<![endif]>");
    }

    #[test]
    fn test_office_math_omml() {
        assert_eq!(
            office_math_omml("[if gte msEquation 12]><m:oMath><m:r/></m:oMath><![endif]"),
            Some("<m:oMath><m:r/></m:oMath>")
        );
        assert_eq!(office_math_omml("[if mso]><p/><![endif]"), None);
        assert_eq!(office_math_omml("COF_TEX_1"), None);
    }

    #[test]
    fn test_find_descendant() {
        let nodes = parse_body("<span class=\"katex\"><span><math><mi>x</mi></math></span></span>");
        assert!(has_class(&nodes[0], "katex"));
        let math = find_descendant(&nodes[0], "math").unwrap();
        assert_eq!(element_name(&math).as_deref(), Some("math"));
    }
}
