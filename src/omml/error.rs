/// Errors that can occur while rewriting MathML into OMML
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OmmlError {
    Xml(String),
    InvalidStructure(String),
    Encoding(String),
    DepthLimitExceeded(usize),
}

impl std::fmt::Display for OmmlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OmmlError::Xml(msg) => write!(f, "MathML parsing error: {}", msg),
            OmmlError::InvalidStructure(msg) => write!(f, "Invalid MathML structure: {}", msg),
            OmmlError::Encoding(msg) => write!(f, "Text encoding error: {}", msg),
            OmmlError::DepthLimitExceeded(limit) => write!(f, "MathML depth limit exceeded: {}", limit),
        }
    }
}

impl std::error::Error for OmmlError {}

impl From<std::str::Utf8Error> for OmmlError {
    fn from(err: std::str::Utf8Error) -> Self {
        OmmlError::Encoding(format!("UTF-8 decoding error: {}", err))
    }
}

impl From<quick_xml::Error> for OmmlError {
    fn from(err: quick_xml::Error) -> Self {
        OmmlError::Xml(err.to_string())
    }
}
