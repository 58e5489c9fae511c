// Local TeX → MathML converter
//
// A small, deterministic recursive-descent converter for the everyday subset
// of TeX: identifiers, numbers, operators, scripts, fractions, radicals,
// \left/\right fences, large operators, functions, text and style commands.
// It never guesses: any control sequence outside its tables, any environment
// and any alignment character makes it refuse the input up front so the
// adapter can move on to a full-grammar backend.

mod symbols;

use crate::common::xml::escape_text;
use symbols::{STRUCTURAL, SYMBOLS, Symbol, is_supported, math_variant};

pub const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";

/// Deepest group/argument nesting the parser descends into
const MAX_DEPTH: usize = 256;

/// Errors from the local converter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalError {
    /// Input uses a construct outside the local grammar
    Unsupported(String),
    /// Input is malformed (unbalanced braces, missing arguments)
    Syntax(String),
    /// Groups or arguments nest deeper than the parser allows
    DepthLimitExceeded(usize),
}

impl std::fmt::Display for LocalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocalError::Unsupported(what) => write!(f, "unsupported construct: {}", what),
            LocalError::Syntax(msg) => write!(f, "syntax error: {}", msg),
            LocalError::DepthLimitExceeded(max) => write!(f, "nesting deeper than {} levels", max),
        }
    }
}

impl std::error::Error for LocalError {}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Ident(String, Option<&'static str>),
    Number(String),
    Op(String),
    LargeOp(&'static str),
    Func(String, bool),
    Text(String),
    Space(&'static str),
    Row(Vec<Node>),
    Frac(Box<Node>, Box<Node>),
    Sqrt(Box<Node>, Option<Box<Node>>),
    Scripts {
        base: Box<Node>,
        sub: Option<Box<Node>>,
        sup: Option<Box<Node>>,
    },
    Fenced {
        open: String,
        close: String,
        body: Vec<Node>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowEnd {
    Eof,
    Brace,
    Bracket,
    Right,
}

/// Deterministic converter for the restricted TeX grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalConverter;

impl LocalConverter {
    pub fn new() -> Self {
        Self
    }

    /// First construct in `latex` the local grammar cannot handle, if any.
    ///
    /// # Example
    /// ```
    /// use officeclip::math::LocalConverter;
    /// let local = LocalConverter::new();
    /// assert_eq!(local.unsupported_construct("\\frac{a}{b}"), None);
    /// assert_eq!(local.unsupported_construct("\\overbrace{a}").as_deref(), Some("\\overbrace"));
    /// ```
    pub fn unsupported_construct(&self, latex: &str) -> Option<String> {
        let chars: Vec<char> = latex.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '&' => return Some("&".to_string()),
                '\\' => {
                    let (name, next) = read_command_name(&chars, i + 1);
                    if name.is_empty() || name == "\\" || !is_supported(&name) {
                        return Some(format!("\\{}", name));
                    }
                    i = next;
                },
                _ => i += 1,
            }
        }
        None
    }

    /// Whether the whole input is inside the local grammar.
    #[inline]
    pub fn supports(&self, latex: &str) -> bool {
        self.unsupported_construct(latex).is_none()
    }

    /// Convert TeX to a complete `<math>` element.
    ///
    /// # Example
    /// ```
    /// use officeclip::math::LocalConverter;
    /// let mathml = LocalConverter::new().convert("x^2", false).unwrap();
    /// assert!(mathml.contains("<msup><mi>x</mi><mn>2</mn></msup>"));
    /// ```
    pub fn convert(&self, latex: &str, display: bool) -> Result<String, LocalError> {
        if let Some(construct) = self.unsupported_construct(latex) {
            return Err(LocalError::Unsupported(construct));
        }

        let mut parser = Parser {
            chars: latex.chars().collect(),
            pos: 0,
            depth: 0,
        };
        let nodes = parser.parse_row(RowEnd::Eof)?;
        if nodes.is_empty() {
            return Err(LocalError::Syntax("empty formula".to_string()));
        }

        let mut out = String::with_capacity(latex.len() * 8 + 96);
        out.push_str("<math xmlns=\"");
        out.push_str(MATHML_NS);
        out.push_str("\" display=\"");
        out.push_str(if display { "block" } else { "inline" });
        out.push_str("\">");
        write_row(&nodes, &mut out, display, nodes.len() > 1);
        out.push_str("</math>");
        Ok(out)
    }
}

/// Read a control-sequence name starting right after the backslash.
fn read_command_name(chars: &[char], start: usize) -> (String, usize) {
    match chars.get(start) {
        None => (String::new(), start),
        Some(c) if c.is_ascii_alphabetic() => {
            let end = chars[start..]
                .iter()
                .position(|c| !c.is_ascii_alphabetic())
                .map(|p| start + p)
                .unwrap_or(chars.len());
            (chars[start..end].iter().collect(), end)
        },
        Some(c) => (c.to_string(), start + 1),
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek_command(&self) -> Option<String> {
        if self.peek() != Some('\\') {
            return None;
        }
        let (name, _) = read_command_name(&self.chars, self.pos + 1);
        Some(name)
    }

    fn descend(&mut self) -> Result<(), LocalError> {
        if self.depth >= MAX_DEPTH {
            return Err(LocalError::DepthLimitExceeded(MAX_DEPTH));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_row(&mut self, end: RowEnd) -> Result<Vec<Node>, LocalError> {
        self.descend()?;
        let row = self.parse_row_items(end);
        self.depth -= 1;
        row
    }

    fn parse_row_items(&mut self, end: RowEnd) -> Result<Vec<Node>, LocalError> {
        let mut nodes = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else {
                return match end {
                    RowEnd::Eof => Ok(nodes),
                    RowEnd::Brace => Err(LocalError::Syntax("missing '}'".to_string())),
                    RowEnd::Bracket => Err(LocalError::Syntax("missing ']'".to_string())),
                    RowEnd::Right => Err(LocalError::Syntax("\\left without \\right".to_string())),
                };
            };

            match (c, end) {
                ('}', RowEnd::Brace) | (']', RowEnd::Bracket) => {
                    self.pos += 1;
                    return Ok(nodes);
                },
                ('}', _) => return Err(LocalError::Syntax("unexpected '}'".to_string())),
                _ => {},
            }
            if end == RowEnd::Right && self.peek_command().as_deref() == Some("right") {
                return Ok(nodes);
            }

            let base = if matches!(c, '^' | '_') {
                Some(Node::Row(Vec::new()))
            } else {
                self.parse_atom()?
            };
            let Some(base) = base else {
                continue;
            };
            nodes.push(self.parse_scripts(base)?);
        }
    }

    fn parse_scripts(&mut self, base: Node) -> Result<Node, LocalError> {
        let mut sub = None;
        let mut sup = None;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('_') if sub.is_none() => {
                    self.pos += 1;
                    sub = Some(Box::new(self.parse_argument()?));
                },
                Some('^') if sup.is_none() => {
                    self.pos += 1;
                    sup = Some(Box::new(self.parse_argument()?));
                },
                Some('\'') if sup.is_none() => {
                    let mut primes = String::new();
                    while self.peek() == Some('\'') {
                        primes.push('′');
                        self.pos += 1;
                    }
                    sup = Some(Box::new(Node::Op(primes)));
                },
                _ => break,
            }
        }
        if sub.is_none() && sup.is_none() {
            return Ok(base);
        }
        Ok(Node::Scripts {
            base: Box::new(base),
            sub,
            sup,
        })
    }

    /// One TeX argument: a braced group, a command, or a single character.
    fn parse_argument(&mut self) -> Result<Node, LocalError> {
        self.descend()?;
        let arg = self.parse_argument_inner();
        self.depth -= 1;
        arg
    }

    fn parse_argument_inner(&mut self) -> Result<Node, LocalError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(LocalError::Syntax("missing argument".to_string())),
            Some('{') => {
                self.pos += 1;
                Ok(row_node(self.parse_row(RowEnd::Brace)?))
            },
            Some('\\') => self
                .parse_atom()?
                .ok_or_else(|| LocalError::Syntax("missing argument".to_string())),
            Some(c) => {
                self.pos += 1;
                Ok(single_char_node(c))
            },
        }
    }

    /// Raw text of a braced argument, for \text and friends.
    fn read_raw_group(&mut self) -> Result<String, LocalError> {
        self.skip_whitespace();
        if self.peek() != Some('{') {
            return Err(LocalError::Syntax("expected '{'".to_string()));
        }
        self.pos += 1;
        let mut depth = 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let raw: String = self.chars[start..self.pos].iter().collect();
                        self.pos += 1;
                        return Ok(raw);
                    }
                },
                _ => {},
            }
            self.pos += 1;
        }
        Err(LocalError::Syntax("missing '}'".to_string()))
    }

    /// Delimiter after \left or \right: a character, `.`, or a delimiter command.
    fn read_delimiter(&mut self) -> Result<String, LocalError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(LocalError::Syntax("missing delimiter".to_string())),
            Some('.') => {
                self.pos += 1;
                Ok(String::new())
            },
            Some('\\') => {
                let (name, next) = read_command_name(&self.chars, self.pos + 1);
                self.pos = next;
                match SYMBOLS.get(name.as_str()) {
                    Some(Symbol::Op(s)) | Some(Symbol::Ident(s)) => Ok((*s).to_string()),
                    _ => Err(LocalError::Unsupported(format!("\\{}", name))),
                }
            },
            Some(c) => {
                self.pos += 1;
                Ok(c.to_string())
            },
        }
    }

    fn parse_atom(&mut self) -> Result<Option<Node>, LocalError> {
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        match c {
            '{' => {
                self.pos += 1;
                Ok(Some(row_node(self.parse_row(RowEnd::Brace)?)))
            },
            '\\' => self.parse_command(),
            '0'..='9' | '.' => {
                let start = self.pos;
                while matches!(self.peek(), Some(d) if d.is_ascii_digit() || d == '.') {
                    self.pos += 1;
                }
                let number: String = self.chars[start..self.pos].iter().collect();
                if number == "." {
                    return Ok(Some(Node::Op(number)));
                }
                Ok(Some(Node::Number(number)))
            },
            _ => {
                self.pos += 1;
                Ok(Some(single_char_node(c)))
            },
        }
    }

    fn parse_command(&mut self) -> Result<Option<Node>, LocalError> {
        let (name, next) = read_command_name(&self.chars, self.pos + 1);
        self.pos = next;

        if STRUCTURAL.contains(name.as_str()) {
            return self.parse_structural(&name);
        }
        let node = match SYMBOLS.get(name.as_str()) {
            Some(Symbol::Ident(s)) => Node::Ident((*s).to_string(), None),
            Some(Symbol::Op(s)) => Node::Op((*s).to_string()),
            Some(Symbol::LargeOp(s)) => Node::LargeOp(s),
            Some(Symbol::Func(s)) => Node::Func((*s).to_string(), false),
            Some(Symbol::LimitFunc(s)) => Node::Func((*s).to_string(), true),
            Some(Symbol::Space(w)) => Node::Space(w),
            None => return Err(LocalError::Unsupported(format!("\\{}", name))),
        };
        Ok(Some(node))
    }

    fn parse_structural(&mut self, name: &str) -> Result<Option<Node>, LocalError> {
        match name {
            "frac" | "dfrac" | "tfrac" => {
                let num = self.parse_argument()?;
                let den = self.parse_argument()?;
                Ok(Some(Node::Frac(Box::new(num), Box::new(den))))
            },
            "sqrt" => {
                self.skip_whitespace();
                let index = if self.peek() == Some('[') {
                    self.pos += 1;
                    Some(Box::new(row_node(self.parse_row(RowEnd::Bracket)?)))
                } else {
                    None
                };
                let radicand = self.parse_argument()?;
                Ok(Some(Node::Sqrt(Box::new(radicand), index)))
            },
            "left" => {
                let open = self.read_delimiter()?;
                let body = self.parse_row(RowEnd::Right)?;
                // parse_row stopped in front of \right
                let (_, next) = read_command_name(&self.chars, self.pos + 1);
                self.pos = next;
                let close = self.read_delimiter()?;
                Ok(Some(Node::Fenced { open, close, body }))
            },
            "right" => Err(LocalError::Syntax("\\right without \\left".to_string())),
            "text" | "textrm" => Ok(Some(Node::Text(self.read_raw_group()?))),
            "operatorname" => Ok(Some(Node::Func(self.read_raw_group()?, false))),
            "displaystyle" | "textstyle" | "limits" | "nolimits" => Ok(None),
            style => {
                let variant = math_variant(style);
                let raw = self.read_raw_group()?;
                if raw.chars().all(|c| c.is_alphanumeric() || c.is_whitespace()) {
                    let text: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
                    return Ok(Some(Node::Ident(text, variant)));
                }
                let mut inner = Parser {
                    chars: raw.chars().collect(),
                    pos: 0,
                    depth: self.depth,
                };
                Ok(Some(row_node(inner.parse_row(RowEnd::Eof)?)))
            },
        }
    }
}

fn row_node(mut nodes: Vec<Node>) -> Node {
    if nodes.len() == 1 {
        return nodes.remove(0);
    }
    Node::Row(nodes)
}

fn single_char_node(c: char) -> Node {
    match c {
        '-' => Node::Op("\u{2212}".to_string()),
        '~' => Node::Space("0.3333em"),
        '*' => Node::Op("\u{2217}".to_string()),
        '\'' => Node::Op("′".to_string()),
        c if c.is_ascii_digit() => Node::Number(c.to_string()),
        c if c.is_alphabetic() => Node::Ident(c.to_string(), None),
        c => Node::Op(c.to_string()),
    }
}

fn write_row(nodes: &[Node], out: &mut String, display: bool, wrap: bool) {
    if wrap {
        out.push_str("<mrow>");
    }
    for node in nodes {
        write_node(node, out, display);
    }
    if wrap {
        out.push_str("</mrow>");
    }
}

fn write_token(out: &mut String, tag: &str, text: &str, attrs: &str) {
    out.push('<');
    out.push_str(tag);
    out.push_str(attrs);
    out.push('>');
    out.push_str(&escape_text(text));
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn write_node(node: &Node, out: &mut String, display: bool) {
    match node {
        Node::Ident(text, variant) => {
            let attrs = match variant {
                Some(v) => format!(" mathvariant=\"{}\"", v),
                None if text.chars().count() > 1 => " mathvariant=\"normal\"".to_string(),
                None => String::new(),
            };
            write_token(out, "mi", text, &attrs);
        },
        Node::Number(n) => write_token(out, "mn", n, ""),
        Node::Op(op) => write_token(out, "mo", op, ""),
        Node::LargeOp(op) => write_token(out, "mo", op, " largeop=\"true\""),
        Node::Func(name, _) => {
            write_token(out, "mi", name, " mathvariant=\"normal\"");
            out.push_str("<mo>\u{2061}</mo>");
        },
        Node::Text(text) => write_token(out, "mtext", text, ""),
        Node::Space(width) => {
            out.push_str("<mspace width=\"");
            out.push_str(width);
            out.push_str("\"/>");
        },
        Node::Row(children) => write_row(children, out, display, true),
        Node::Frac(num, den) => {
            out.push_str("<mfrac>");
            write_node(num, out, display);
            write_node(den, out, display);
            out.push_str("</mfrac>");
        },
        Node::Sqrt(radicand, None) => {
            out.push_str("<msqrt>");
            write_node(radicand, out, display);
            out.push_str("</msqrt>");
        },
        Node::Sqrt(radicand, Some(index)) => {
            out.push_str("<mroot>");
            write_node(radicand, out, display);
            write_node(index, out, display);
            out.push_str("</mroot>");
        },
        Node::Scripts { base, sub, sup } => write_scripts(base, sub.as_deref(), sup.as_deref(), out, display),
        Node::Fenced { open, close, body } => {
            out.push_str("<mrow>");
            if !open.is_empty() {
                write_token(out, "mo", open, " fence=\"true\" stretchy=\"true\"");
            }
            write_row(body, out, display, body.len() > 1);
            if !close.is_empty() {
                write_token(out, "mo", close, " fence=\"true\" stretchy=\"true\"");
            }
            out.push_str("</mrow>");
        },
    }
}

fn write_scripts(base: &Node, sub: Option<&Node>, sup: Option<&Node>, out: &mut String, display: bool) {
    // Limits go under/over sums and lim-like functions in display style;
    // integrals keep side scripts in TeX even in display style
    let limits = display
        && match base {
            Node::LargeOp(op) => !matches!(*op, "∫" | "∬" | "∭" | "∮"),
            Node::Func(_, takes_limits) => *takes_limits,
            _ => false,
        };
    let tag = match (limits, sub.is_some(), sup.is_some()) {
        (true, true, true) => "munderover",
        (true, true, false) => "munder",
        (true, false, _) => "mover",
        (false, true, true) => "msubsup",
        (false, true, false) => "msub",
        (false, false, _) => "msup",
    };

    out.push('<');
    out.push_str(tag);
    out.push('>');
    match base {
        // The apply-function mark belongs after the scripted name
        Node::Func(name, _) => write_token(out, "mi", name, " mathvariant=\"normal\""),
        other => write_node(other, out, display),
    }
    if let Some(sub) = sub {
        write_node(sub, out, display);
    }
    if let Some(sup) = sup {
        write_node(sup, out, display);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(latex: &str) -> String {
        let mathml = LocalConverter::new().convert(latex, false).unwrap();
        let start = mathml.find('>').unwrap() + 1;
        mathml[start..mathml.len() - "</math>".len()].to_string()
    }

    #[test]
    fn test_envelope() {
        let mathml = LocalConverter::new().convert("x", true).unwrap();
        assert_eq!(
            mathml,
            "<math xmlns=\"http://www.w3.org/1998/Math/MathML\" display=\"block\"><mi>x</mi></math>"
        );
    }

    #[test]
    fn test_mass_energy() {
        assert_eq!(
            body("E=mc^2"),
            "<mrow><mi>E</mi><mo>=</mo><mi>m</mi><msup><mi>c</mi><mn>2</mn></msup></mrow>"
        );
    }

    #[test]
    fn test_fraction_and_sqrt() {
        assert_eq!(
            body("\\frac{1}{\\sqrt[3]{x}}"),
            "<mfrac><mn>1</mn><mroot><mi>x</mi><mn>3</mn></mroot></mfrac>"
        );
    }

    #[test]
    fn test_subsup_single_token_arguments() {
        assert_eq!(
            body("a_i^23"),
            "<mrow><msubsup><mi>a</mi><mi>i</mi><mn>2</mn></msubsup><mn>3</mn></mrow>"
        );
    }

    #[test]
    fn test_sum_limits_depend_on_display() {
        let inline = LocalConverter::new().convert("\\sum_{i=1}^n i", false).unwrap();
        assert!(inline.contains("<msubsup><mo largeop=\"true\">∑</mo>"));
        let display = LocalConverter::new().convert("\\sum_{i=1}^n i", true).unwrap();
        assert!(display.contains("<munderover><mo largeop=\"true\">∑</mo>"));
        let integral = LocalConverter::new().convert("\\int_0^1 f", true).unwrap();
        assert!(integral.contains("<msubsup><mo largeop=\"true\">∫</mo>"));
    }

    #[test]
    fn test_left_right_fence() {
        assert_eq!(
            body("\\left( a+b \\right)"),
            "<mrow><mo fence=\"true\" stretchy=\"true\">(</mo><mrow><mi>a</mi><mo>+</mo><mi>b</mi></mrow><mo fence=\"true\" stretchy=\"true\">)</mo></mrow>"
        );
    }

    #[test]
    fn test_text_and_style() {
        assert_eq!(body("\\text{if } x"), "<mrow><mtext>if </mtext><mi>x</mi></mrow>");
        assert_eq!(body("\\mathbb{R}"), "<mi mathvariant=\"double-struck\">R</mi>");
    }

    #[test]
    fn test_minus_and_prime() {
        assert_eq!(
            body("f'-1"),
            "<mrow><msup><mi>f</mi><mo>′</mo></msup><mo>\u{2212}</mo><mn>1</mn></mrow>"
        );
    }

    #[test]
    fn test_escaping_in_tokens() {
        assert_eq!(body("a<b"), "<mrow><mi>a</mi><mo>&lt;</mo><mi>b</mi></mrow>");
    }

    #[test]
    fn test_unsupported_is_refused_up_front() {
        let local = LocalConverter::new();
        assert_eq!(
            local.convert("\\begin{matrix}1\\end{matrix}", true),
            Err(LocalError::Unsupported("\\begin".to_string()))
        );
        assert!(matches!(local.convert("a & b", false), Err(LocalError::Unsupported(_))));
        assert!(matches!(local.convert("a \\\\ b", false), Err(LocalError::Unsupported(_))));
        assert!(!local.supports("\\mathscr{L}"));
    }

    #[test]
    fn test_syntax_errors() {
        let local = LocalConverter::new();
        assert!(matches!(local.convert("{a", false), Err(LocalError::Syntax(_))));
        assert!(matches!(local.convert("a}", false), Err(LocalError::Syntax(_))));
        assert!(matches!(local.convert("\\frac{a}", false), Err(LocalError::Syntax(_))));
        assert!(matches!(local.convert("\\left( a", false), Err(LocalError::Syntax(_))));
    }

    #[test]
    fn test_deep_nesting_is_refused() {
        let local = LocalConverter::new();
        let braces = format!("{}x{}", "{".repeat(3_000), "}".repeat(3_000));
        assert_eq!(local.convert(&braces, false), Err(LocalError::DepthLimitExceeded(MAX_DEPTH)));

        let fractions = format!("{}x{}", "\\frac".repeat(3_000), "1".repeat(3_000));
        assert!(matches!(local.convert(&fractions, false), Err(LocalError::DepthLimitExceeded(_))));

        let shallow = format!("{}x{}", "{".repeat(50), "}".repeat(50));
        assert!(local.convert(&shallow, false).is_ok());
    }
}
