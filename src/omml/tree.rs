// MathML element tree
//
// MathML fragments are small, so the whole fragment is read into an owned tree
// before rewriting. Rewriting needs sibling lookahead (n-ary bodies, function
// arguments, fence pairs), which a purely streaming writer cannot give.

use super::error::OmmlError;
use crate::common::xml::{decode_entities, resolve_entity};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use smallvec::SmallVec;

const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MathNode {
    Element(MathElement),
    Text(String),
}

impl MathNode {
    pub fn as_element(&self) -> Option<&MathElement> {
        match self {
            MathNode::Element(e) => Some(e),
            MathNode::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathElement {
    /// Local name, namespace prefix removed
    pub name: String,
    pub attrs: SmallVec<[(String, String); 4]>,
    pub children: Vec<MathNode>,
}

impl MathElement {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, OmmlError> {
        let name = std::str::from_utf8(start.local_name().as_ref())?.to_string();
        let mut attrs = SmallVec::new();
        for attr in start.attributes().flatten() {
            let key = std::str::from_utf8(attr.key.local_name().as_ref())?.to_string();
            let value = decode_entities(std::str::from_utf8(&attr.value)?);
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            children: Vec::new(),
        })
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Child elements, skipping whitespace-only text between them.
    pub fn element_children(&self) -> impl Iterator<Item = &MathElement> {
        self.children.iter().filter_map(MathNode::as_element)
    }

    /// Text content of a token element, whitespace-trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out.trim().to_string()
    }

    /// Text content with surrounding whitespace kept, for `mtext`.
    pub fn raw_text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[MathNode], out: &mut String) {
    for node in nodes {
        match node {
            MathNode::Text(t) => out.push_str(t),
            MathNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

/// Parse a MathML fragment whose root is `<math>`.
pub fn parse(mathml: &str) -> Result<MathElement, OmmlError> {
    if mathml.trim().is_empty() {
        return Err(OmmlError::InvalidStructure("empty input".to_string()));
    }

    let mut reader = Reader::from_str(mathml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<MathElement> = Vec::with_capacity(16);
    let mut root: Option<MathElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(OmmlError::DepthLimitExceeded(MAX_DEPTH));
                }
                stack.push(MathElement::from_start(e)?);
            },
            Event::Empty(ref e) => {
                let element = MathElement::from_start(e)?;
                attach(&mut stack, &mut root, element)?;
            },
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| OmmlError::InvalidStructure("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            },
            Event::Text(ref e) => push_text(&mut stack, std::str::from_utf8(e)?),
            Event::CData(ref e) => push_text(&mut stack, std::str::from_utf8(e)?),
            Event::GeneralRef(ref e) => {
                let name = std::str::from_utf8(e)?;
                let resolved = resolve_entity(name)
                    .ok_or_else(|| OmmlError::Xml(format!("unknown entity &{};", name)))?;
                push_text(&mut stack, &resolved);
            },
            Event::Eof => break,
            _ => {},
        }
    }

    if !stack.is_empty() {
        return Err(OmmlError::InvalidStructure(format!("{} unclosed element(s)", stack.len())));
    }
    let root = root.ok_or_else(|| OmmlError::InvalidStructure("no root element".to_string()))?;
    if root.name != "math" {
        return Err(OmmlError::InvalidStructure(format!("root is <{}>, expected <math>", root.name)));
    }
    Ok(root)
}

fn attach(stack: &mut [MathElement], root: &mut Option<MathElement>, element: MathElement) -> Result<(), OmmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(MathNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(OmmlError::InvalidStructure("multiple root elements".to_string())),
    }
    Ok(())
}

fn push_text(stack: &mut [MathElement], text: &str) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    // Entity references split text into several events; merge them back
    if let Some(MathNode::Text(prev)) = parent.children.last_mut() {
        prev.push_str(text);
        return;
    }
    if text.trim().is_empty() && !is_token(&parent.name) {
        return;
    }
    parent.children.push(MathNode::Text(text.to_string()));
}

fn is_token(name: &str) -> bool {
    matches!(name, "mi" | "mn" | "mo" | "mtext" | "ms")
}
