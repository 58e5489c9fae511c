//! CF_HTML ("HTML Format") clipboard payloads.
//!
//! Office reads rich clipboard content from a byte-exact envelope: an ASCII
//! header listing byte offsets into the payload, followed by an HTML document
//! whose fragment is bracketed by `<!--StartFragment-->` and
//! `<!--EndFragment-->`. Offsets count UTF-8 bytes of the whole payload,
//! header included, so they are written as fixed-width numbers and the header
//! length is known before the values are.
//!
//! ```text
//! Version:0.9
//! StartHTML:0000000105
//! EndHTML:0000000311
//! StartFragment:0000000241
//! EndFragment:0000000273
//! <html ...><body>
//! <!--StartFragment-->...<!--EndFragment-->
//! </body>
//! </html>
//! ```

use crate::omml::OMML_NS;
use memchr::memmem;

const VERSION: &str = "0.9";
const OFFSET_WIDTH: usize = 10;
const CRLF: &str = "\r\n";

pub const START_MARKER: &str = "<!--StartFragment-->";
pub const END_MARKER: &str = "<!--EndFragment-->";

/// Marker spellings accepted when reading payloads written by other producers
const START_MARKERS: &[&str] = &[START_MARKER, "<!--StartFragment -->"];
const END_MARKERS: &[&str] = &[END_MARKER, "<!--EndFragment -->"];

const DOCUMENT_OPEN: &str = "<html xmlns:o=\"urn:schemas-microsoft-com:office:office\" xmlns:m=\"";
const DOCUMENT_HEAD: &str = "\"><head><meta charset=\"utf-8\"></head><body>\r\n";
const DOCUMENT_CLOSE: &str = "\r\n</body>\r\n</html>";

/// Byte offsets of a CF_HTML payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfHtmlOffsets {
    pub start_html: usize,
    pub end_html: usize,
    pub start_fragment: usize,
    pub end_fragment: usize,
}

/// A serialized CF_HTML payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfHtmlPayload {
    text: String,
    offsets: CfHtmlOffsets,
}

impl CfHtmlPayload {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.text
    }

    #[inline]
    pub fn offsets(&self) -> CfHtmlOffsets {
        self.offsets
    }

    /// The ASCII header block
    pub fn header(&self) -> &str {
        &self.text[..self.offsets.start_html]
    }

    /// The HTML document following the header
    pub fn html(&self) -> &str {
        &self.text[self.offsets.start_html..self.offsets.end_html]
    }

    /// The fragment between the markers
    pub fn fragment(&self) -> &str {
        &self.text[self.offsets.start_fragment..self.offsets.end_fragment]
    }
}

fn header(offsets: &CfHtmlOffsets, source_url: Option<&str>) -> String {
    let mut out = String::with_capacity(128);
    out.push_str("Version:");
    out.push_str(VERSION);
    out.push_str(CRLF);
    for (key, value) in [
        ("StartHTML", offsets.start_html),
        ("EndHTML", offsets.end_html),
        ("StartFragment", offsets.start_fragment),
        ("EndFragment", offsets.end_fragment),
    ] {
        out.push_str(&format!("{}:{:0width$}{}", key, value, CRLF, width = OFFSET_WIDTH));
    }
    if let Some(url) = source_url {
        out.push_str("SourceURL:");
        out.push_str(url);
        out.push_str(CRLF);
    }
    out
}

/// Wrap an HTML fragment in a CF_HTML envelope.
///
/// Fragment markers already present in `fragment` are removed so the payload
/// carries exactly one marker pair. Line breaks in `source_url` are dropped.
///
/// # Example
/// ```
/// use officeclip::cfhtml::serialize;
///
/// let payload = serialize("<b>Hi</b>", None);
/// assert!(payload.as_str().starts_with("Version:0.9\r\n"));
/// assert_eq!(payload.fragment(), "<b>Hi</b>");
/// ```
pub fn serialize(fragment: &str, source_url: Option<&str>) -> CfHtmlPayload {
    let mut fragment = fragment.to_string();
    for marker in START_MARKERS.iter().chain(END_MARKERS) {
        if fragment.contains(marker) {
            fragment = fragment.replace(marker, "");
        }
    }
    let source_url = source_url
        .map(|url| url.chars().filter(|c| *c != '\r' && *c != '\n').collect::<String>())
        .filter(|url| !url.is_empty());

    let placeholder = CfHtmlOffsets {
        start_html: 0,
        end_html: 0,
        start_fragment: 0,
        end_fragment: 0,
    };
    let header_len = header(&placeholder, source_url.as_deref()).len();

    let mut document = String::with_capacity(fragment.len() + 256);
    document.push_str(DOCUMENT_OPEN);
    document.push_str(OMML_NS);
    document.push_str(DOCUMENT_HEAD);
    document.push_str(START_MARKER);
    let start_fragment = header_len + document.len();
    document.push_str(&fragment);
    let end_fragment = header_len + document.len();
    document.push_str(END_MARKER);
    document.push_str(DOCUMENT_CLOSE);

    let offsets = CfHtmlOffsets {
        start_html: header_len,
        end_html: header_len + document.len(),
        start_fragment,
        end_fragment,
    };
    let mut text = header(&offsets, source_url.as_deref());
    debug_assert_eq!(text.len(), header_len);
    text.push_str(&document);

    CfHtmlPayload { text, offsets }
}

/// Header fields read back from a payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CfHtmlHeader {
    pub version: Option<String>,
    pub start_html: Option<usize>,
    pub end_html: Option<usize>,
    pub start_fragment: Option<usize>,
    pub end_fragment: Option<usize>,
    pub start_selection: Option<usize>,
    pub end_selection: Option<usize>,
    pub source_url: Option<String>,
}

impl CfHtmlHeader {
    /// The four mandatory offsets, when all are present
    pub fn offsets(&self) -> Option<CfHtmlOffsets> {
        Some(CfHtmlOffsets {
            start_html: self.start_html?,
            end_html: self.end_html?,
            start_fragment: self.start_fragment?,
            end_fragment: self.end_fragment?,
        })
    }
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    match memchr::memchr(0, bytes) {
        Some(nul) => &bytes[..nul],
        None => bytes,
    }
}

/// Parse the header of a CF_HTML payload.
///
/// The header ends at the first `<`. Offset values must have at least eight
/// digits; unknown keys are ignored.
pub fn parse_offsets(bytes: &[u8]) -> CfHtmlHeader {
    let bytes = trim_nul(bytes);
    let head_end = memchr::memchr(b'<', bytes).unwrap_or(bytes.len());
    let head = String::from_utf8_lossy(&bytes[..head_end]);

    let mut parsed = CfHtmlHeader::default();
    for line in head.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        let offset = || {
            if value.len() >= 8 && value.bytes().all(|b| b.is_ascii_digit()) {
                value.parse::<usize>().ok()
            } else {
                None
            }
        };
        match key.trim() {
            "Version" => parsed.version = Some(value.to_string()),
            "StartHTML" => parsed.start_html = offset(),
            "EndHTML" => parsed.end_html = offset(),
            "StartFragment" => parsed.start_fragment = offset(),
            "EndFragment" => parsed.end_fragment = offset(),
            "StartSelection" => parsed.start_selection = offset(),
            "EndSelection" => parsed.end_selection = offset(),
            "SourceURL" => parsed.source_url = Some(value.to_string()),
            _ => {},
        }
    }
    parsed
}

/// Outcome of [`validate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CfHtmlReport {
    pub header: CfHtmlHeader,
    pub errors: Vec<String>,
    pub start_markers: Vec<usize>,
    pub end_markers: Vec<usize>,
}

impl CfHtmlReport {
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

fn find_markers(data: &[u8], markers: &[&str], start: usize, end: usize) -> Vec<(usize, usize)> {
    let hay = &data[start..end];
    let mut hits: Vec<(usize, usize)> = markers
        .iter()
        .flat_map(|&marker| memmem::find_iter(hay, marker.as_bytes()).map(move |p| (start + p, marker.len())))
        .collect();
    hits.sort_unstable();
    hits.dedup_by_key(|(pos, _)| *pos);
    hits
}

/// Check a CF_HTML payload for structural problems.
///
/// A trailing NUL is ignored. Offsets must be in range and ordered,
/// `StartHTML` must point at markup, and when fragment markers are present
/// there must be exactly one pair whose positions agree with the fragment
/// offsets (with or without the markers themselves).
pub fn validate(bytes: &[u8]) -> CfHtmlReport {
    let data = trim_nul(bytes);
    let len = data.len();
    let header = parse_offsets(data);
    let mut report = CfHtmlReport {
        header: header.clone(),
        ..Default::default()
    };
    let errors = &mut report.errors;

    let (Some(start_html), Some(end_html)) = (header.start_html, header.end_html) else {
        errors.push("missing StartHTML/EndHTML".to_string());
        return report;
    };
    if start_html > len {
        errors.push(format!("StartHTML out of range: {} (len={})", start_html, len));
    }
    if end_html > len {
        errors.push(format!("EndHTML out of range: {} (len={})", end_html, len));
    }
    if start_html >= end_html {
        errors.push(format!("StartHTML >= EndHTML ({} >= {})", start_html, end_html));
    }
    if start_html < len {
        let points_at_markup = data[start_html..]
            .iter()
            .take(64)
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'<');
        if !points_at_markup {
            errors.push("StartHTML does not point to '<'".to_string());
        }
    }

    if let (Some(start_fragment), Some(end_fragment)) = (header.start_fragment, header.end_fragment) {
        if start_fragment > len {
            errors.push(format!("StartFragment out of range: {} (len={})", start_fragment, len));
        }
        if end_fragment > len {
            errors.push(format!("EndFragment out of range: {} (len={})", end_fragment, len));
        }
        if start_fragment > end_fragment {
            errors.push(format!("StartFragment > EndFragment ({} > {})", start_fragment, end_fragment));
        }
        if start_fragment < start_html || end_fragment > end_html {
            errors.push(format!(
                "fragment not within html bounds (StartHTML={}, EndHTML={}, StartFragment={}, EndFragment={})",
                start_html, end_html, start_fragment, end_fragment
            ));
        }
    }

    if start_html < end_html && end_html <= len {
        let starts = find_markers(data, START_MARKERS, start_html, end_html);
        let ends = find_markers(data, END_MARKERS, start_html, end_html);
        report.start_markers = starts.iter().map(|(pos, _)| *pos).collect();
        report.end_markers = ends.iter().map(|(pos, _)| *pos).collect();

        if !starts.is_empty() || !ends.is_empty() {
            if starts.len() != 1 {
                report
                    .errors
                    .push(format!("expected exactly 1 StartFragment marker, found {}", starts.len()));
            }
            if ends.len() != 1 {
                report
                    .errors
                    .push(format!("expected exactly 1 EndFragment marker, found {}", ends.len()));
            }
        }

        if let ([(start_pos, start_len)], [(end_pos, end_len)], Some(sf), Some(ef)) =
            (starts.as_slice(), ends.as_slice(), header.start_fragment, header.end_fragment)
        {
            let schemes = [
                (*start_pos, end_pos + end_len),
                (start_pos + start_len, *end_pos),
                (start_pos + start_len, end_pos + end_len),
            ];
            if !schemes.contains(&(sf, ef)) {
                report.errors.push(format!(
                    "StartFragment/EndFragment do not match the fragment markers (got {}..{})",
                    sf, ef
                ));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_offsets_slice_back_to_markers_and_body() {
        let payload = serialize("<p>Énergie: <b>E</b></p>", Some("https://example.com/a"));
        let bytes = payload.as_bytes();
        let o = payload.offsets();
        assert_eq!(&bytes[o.start_fragment - START_MARKER.len()..o.start_fragment], START_MARKER.as_bytes());
        assert_eq!(&bytes[o.end_fragment..o.end_fragment + END_MARKER.len()], END_MARKER.as_bytes());
        assert_eq!(&bytes[o.start_fragment..o.end_fragment], "<p>Énergie: <b>E</b></p>".as_bytes());
        assert_eq!(o.end_html, bytes.len());
        assert!(payload.html().starts_with("<html"));
        assert!(payload.header().ends_with("SourceURL:https://example.com/a\r\n"));
    }

    #[test]
    fn test_header_uses_crlf_and_fixed_width() {
        let payload = serialize("x", None);
        let lines: Vec<&str> = payload.header().split("\r\n").collect();
        assert_eq!(lines[0], "Version:0.9");
        assert_eq!(lines[1].len(), "StartHTML:".len() + OFFSET_WIDTH);
        assert!(!payload.header().contains("SourceURL"));
    }

    #[test]
    fn test_existing_markers_are_stripped() {
        let payload = serialize("<!--StartFragment-->a<!--EndFragment -->", None);
        assert_eq!(payload.fragment(), "a");
        assert!(validate(payload.as_bytes()).is_ok());
    }

    #[test]
    fn test_parse_reads_header_and_ignores_trailing_nul() {
        let payload = serialize("abc", Some("file:///x\r\ny"));
        let mut bytes = payload.as_bytes().to_vec();
        bytes.push(0);
        let header = parse_offsets(&bytes);
        assert_eq!(header.offsets(), Some(payload.offsets()));
        assert_eq!(header.version.as_deref(), Some("0.9"));
        assert_eq!(header.source_url.as_deref(), Some("file:///xy"));
    }

    #[test]
    fn test_validate_reports_broken_offsets() {
        let payload = serialize("abc", None);
        let broken = payload.as_str().replacen("StartHTML:0", "StartHTML:1", 1);
        let report = validate(broken.as_bytes());
        assert!(!report.is_ok());

        let report = validate(b"Version:0.9\r\n<html></html>");
        assert_eq!(report.errors, vec!["missing StartHTML/EndHTML".to_string()]);
    }

    #[test]
    fn test_validate_rejects_duplicate_markers() {
        let payload = serialize("abc", None);
        let text = payload.as_str();
        let doubled = text.replacen("</body>", "<!--EndFragment--></body>", 1);
        // Same byte count is not preserved, so only the marker error is of interest here
        let report = validate(doubled.as_bytes());
        assert!(report.errors.iter().any(|e| e.contains("EndFragment marker")));
    }

    proptest! {
        #[test]
        fn prop_offsets_round_trip(fragment in "\\PC{0,64}", url in proptest::option::of("[a-z]{1,12}")) {
            let fragment = fragment.replace("<!--", "");
            let payload = serialize(&fragment, url.as_deref());
            let header = parse_offsets(payload.as_bytes());
            prop_assert_eq!(header.offsets(), Some(payload.offsets()));
            let o = payload.offsets();
            prop_assert_eq!(&payload.as_bytes()[o.start_fragment..o.end_fragment], fragment.as_bytes());
            prop_assert!(validate(payload.as_bytes()).is_ok());
        }
    }
}
