//! XML and HTML text helpers shared by the MathML reader, the Office HTML writer
//! and the plain-text renderer.

mod escape;

pub use escape::{decode_entities, escape_text, escape_xml, resolve_entity};
