//! Insignificant-whitespace canonicalization
//!
//! All digest and signature computation in this crate runs over this
//! canonical form, so signed bytes are deterministic regardless of how a
//! template was indented.

use crate::error::{SloError, SloResult};
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

/// Remove whitespace-only text nodes from an XML document, recursively.
///
/// Text nodes with any non-whitespace content are preserved verbatim,
/// including their surrounding whitespace.
pub fn strip_insignificant_whitespace(xml: &str) -> SloResult<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());

    loop {
        match reader
            .read_event()
            .map_err(|e| SloError::ParseError(format!("XML parse error: {e}")))?
        {
            Event::Eof => break,
            Event::Text(ref t) if t.iter().all(u8::is_ascii_whitespace) => {}
            event => writer
                .write_event(event)
                .map_err(|e| SloError::ParseError(format!("XML write error: {e}")))?,
        }
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| SloError::ParseError(format!("Invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_whitespace_only_nodes() {
        let xml = "<a>\n    <b>\n        <c/>\n    </b>\n</a>";
        let out = strip_insignificant_whitespace(xml).unwrap();
        assert_eq!(out, "<a><b><c/></b></a>");
    }

    #[test]
    fn test_preserves_meaningful_text() {
        let xml = "<a>\n    <b>  hello  </b>\n</a>";
        let out = strip_insignificant_whitespace(xml).unwrap();
        assert_eq!(out, "<a><b>  hello  </b></a>");
    }

    #[test]
    fn test_preserves_attributes() {
        let xml = "<a x=\"1  2\">\n  <b/>\n</a>";
        let out = strip_insignificant_whitespace(xml).unwrap();
        assert_eq!(out, "<a x=\"1  2\"><b/></a>");
    }

    #[test]
    fn test_idempotent() {
        let xml = "<a>\n  <b>v</b>\n</a>";
        let once = strip_insignificant_whitespace(xml).unwrap();
        let twice = strip_insignificant_whitespace(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_rejects_malformed_xml() {
        assert!(strip_insignificant_whitespace("<a><b></a>").is_err());
    }
}
