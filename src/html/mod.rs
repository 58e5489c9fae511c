//! HTML handling for clipboard fragments.
//!
//! - [`tokenizer`]: lenient span-preserving tokenizer, used where byte spans
//!   must survive (placeholders, anchors, plain text)
//! - `dom`: html5ever parsing for passes that rewrite whole fragments
//! - [`office`]: formula placeholders, Office math blocks and Word-friendly
//!   normalization
//! - [`plain`]: the text/plain rendering of a fragment

pub(crate) mod dom;
pub mod office;
pub mod plain;
pub mod tokenizer;

pub use office::{
    MathJob, MathSource, PreparedOffice, apply_rendered, html_to_office, office_math_block, office_math_html,
    placeholder, prepare_office, text_to_html,
};
pub use plain::html_to_plain_text;
pub use tokenizer::{Token, TokenKind, Tokenizer, attr_value, find_matching_end};
