//! Parse inbound SAML LogoutRequest and LogoutResponse XML
//!
//! Each message kind has its own parse function and its own typed result;
//! the orchestrator matches on the kind it expects. Field requirements
//! differ: a LogoutRequest identifies its session from its own body, a
//! LogoutResponse is correlated through RelayState and prior state.

use crate::error::{SloError, SloResult};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

const MAX_ID_LENGTH: usize = 256;
const MAX_ISSUER_LENGTH: usize = 1024;
const MAX_NAME_ID_LENGTH: usize = 4096;
const MAX_SESSION_INDEX_LENGTH: usize = 256;

/// Parsed LogoutRequest data
#[derive(Debug, Clone)]
pub struct ParsedLogoutRequest {
    pub id: String,
    /// Mandatory per the protocol, but enforced by the orchestrator so the
    /// failure surfaces as its own error rather than a parse error.
    pub issuer: Option<String>,
    pub session_index: Option<String>,
    pub name_id: Option<String>,
    pub name_id_format: Option<String>,
    pub destination: Option<String>,
    pub has_embedded_signature: bool,
}

/// Parsed LogoutResponse data
#[derive(Debug, Clone, Default)]
pub struct ParsedLogoutResponse {
    /// Top-level StatusCode value
    pub status: Option<String>,
    /// Nested (second-level) StatusCode value
    pub sub_code: Option<String>,
    pub status_message: Option<String>,
    pub status_detail: Option<String>,
    pub issuer: Option<String>,
    pub in_response_to: Option<String>,
    pub has_embedded_signature: bool,
}

/// Parse a LogoutRequest from raw XML.
pub fn parse_logout_request(xml: &str) -> SloResult<ParsedLogoutRequest> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut id = None;
    let mut issuer = None;
    let mut session_index = None;
    let mut name_id = None;
    let mut name_id_format = None;
    let mut destination = None;
    let mut has_signature = false;
    let mut saw_root = false;
    let mut current_element = String::new();

    loop {
        match reader
            .read_event()
            .map_err(|e| SloError::ParseError(format!("XML parse error: {e}")))?
        {
            Event::Start(ref e) | Event::Empty(ref e) => {
                saw_root = true;
                let local = String::from_utf8_lossy(e.local_name().into_inner()).to_string();
                current_element = local.clone();

                match local.as_str() {
                    "LogoutRequest" => {
                        for attr in e.attributes().flatten() {
                            let key = String::from_utf8_lossy(attr.key.local_name().into_inner())
                                .to_string();
                            let value = attr.unescape_value().unwrap_or_default().to_string();
                            match key.as_str() {
                                "ID" => id = Some(value),
                                "Destination" => destination = Some(value),
                                _ => {}
                            }
                        }
                    }
                    "NameID" => {
                        for attr in e.attributes().flatten() {
                            let key = String::from_utf8_lossy(attr.key.local_name().into_inner())
                                .to_string();
                            if key == "Format" {
                                name_id_format =
                                    Some(attr.unescape_value().unwrap_or_default().to_string());
                            }
                        }
                    }
                    "Signature" => has_signature = true,
                    _ => {}
                }
            }
            Event::Text(ref e) => {
                let text = e.unescape().unwrap_or_default().to_string();
                match current_element.as_str() {
                    "Issuer" => issuer = Some(text),
                    "NameID" => name_id = Some(text),
                    "SessionIndex" => session_index = Some(text),
                    _ => {}
                }
            }
            Event::End(_) => current_element.clear(),
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(SloError::ParseError(
            "Document has no root element".to_string(),
        ));
    }

    let id = id.ok_or_else(|| SloError::ParseError("Missing LogoutRequest ID".to_string()))?;

    if id.len() > MAX_ID_LENGTH {
        return Err(SloError::ParseError("ID too long (max 256)".to_string()));
    }
    if issuer.as_ref().is_some_and(|i| i.len() > MAX_ISSUER_LENGTH) {
        return Err(SloError::ParseError(
            "Issuer too long (max 1024)".to_string(),
        ));
    }
    if name_id
        .as_ref()
        .is_some_and(|n| n.len() > MAX_NAME_ID_LENGTH)
    {
        return Err(SloError::ParseError(
            "NameID too long (max 4096)".to_string(),
        ));
    }
    if session_index
        .as_ref()
        .is_some_and(|s| s.len() > MAX_SESSION_INDEX_LENGTH)
    {
        return Err(SloError::ParseError(
            "SessionIndex too long (max 256)".to_string(),
        ));
    }

    Ok(ParsedLogoutRequest {
        id,
        issuer,
        session_index,
        name_id,
        name_id_format,
        destination,
        has_embedded_signature: has_signature,
    })
}

/// Parse a LogoutResponse from raw XML.
pub fn parse_logout_response(xml: &str) -> SloResult<ParsedLogoutResponse> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parsed = ParsedLogoutResponse::default();
    let mut status_codes_seen = 0usize;
    let mut saw_root = false;
    let mut current_element = String::new();

    loop {
        match reader
            .read_event()
            .map_err(|e| SloError::ParseError(format!("XML parse error: {e}")))?
        {
            Event::Start(ref e) | Event::Empty(ref e) => {
                saw_root = true;
                let local = String::from_utf8_lossy(e.local_name().into_inner()).to_string();
                current_element = local.clone();

                match local.as_str() {
                    "LogoutResponse" => {
                        for attr in e.attributes().flatten() {
                            let key = String::from_utf8_lossy(attr.key.local_name().into_inner())
                                .to_string();
                            if key == "InResponseTo" {
                                parsed.in_response_to =
                                    Some(attr.unescape_value().unwrap_or_default().to_string());
                            }
                        }
                    }
                    "StatusCode" => {
                        for attr in e.attributes().flatten() {
                            let key = String::from_utf8_lossy(attr.key.local_name().into_inner())
                                .to_string();
                            if key == "Value" {
                                let value =
                                    attr.unescape_value().unwrap_or_default().to_string();
                                match status_codes_seen {
                                    0 => parsed.status = Some(value),
                                    1 => parsed.sub_code = Some(value),
                                    _ => {}
                                }
                            }
                        }
                        status_codes_seen += 1;
                    }
                    "Signature" => parsed.has_embedded_signature = true,
                    _ => {}
                }
            }
            Event::Text(ref e) => {
                let text = e.unescape().unwrap_or_default().to_string();
                match current_element.as_str() {
                    "Issuer" => parsed.issuer = Some(text),
                    "StatusMessage" => parsed.status_message = Some(text),
                    "StatusDetail" => parsed.status_detail = Some(text),
                    _ => {}
                }
            }
            Event::End(_) => current_element.clear(),
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(SloError::ParseError(
            "Document has no root element".to_string(),
        ));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_logout_request() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
    xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
    ID="_lr_test123" Version="2.0" IssueInstant="2026-08-07T10:00:00.000Z"
    Destination="https://idp.example.com/saml/slo">
    <saml:Issuer>https://sp.example.com</saml:Issuer>
    <saml:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress">user@example.com</saml:NameID>
    <samlp:SessionIndex>_session_abc123</samlp:SessionIndex>
</samlp:LogoutRequest>"#;

        let result = parse_logout_request(xml).unwrap();
        assert_eq!(result.id, "_lr_test123");
        assert_eq!(result.issuer.as_deref(), Some("https://sp.example.com"));
        assert_eq!(result.name_id.as_deref(), Some("user@example.com"));
        assert_eq!(
            result.name_id_format.as_deref(),
            Some("urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress")
        );
        assert_eq!(result.session_index.as_deref(), Some("_session_abc123"));
        assert_eq!(
            result.destination.as_deref(),
            Some("https://idp.example.com/saml/slo")
        );
        assert!(!result.has_embedded_signature);
    }

    #[test]
    fn test_parse_logout_request_without_issuer() {
        let xml = r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
    xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_lr_1" Version="2.0">
    <saml:NameID>user@example.com</saml:NameID>
</samlp:LogoutRequest>"#;

        // Missing issuer is the orchestrator's problem, not the parser's
        let result = parse_logout_request(xml).unwrap();
        assert!(result.issuer.is_none());
        assert_eq!(result.name_id.as_deref(), Some("user@example.com"));
    }

    #[test]
    fn test_parse_logout_request_missing_id() {
        let xml = r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" Version="2.0">
    <saml:Issuer xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">https://sp.example.com</saml:Issuer>
</samlp:LogoutRequest>"#;

        assert!(parse_logout_request(xml).is_err());
    }

    #[test]
    fn test_parse_logout_request_detects_signature() {
        let xml = r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_lr_1">
    <saml:Issuer xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">https://sp.example.com</saml:Issuer>
    <ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo/></ds:Signature>
</samlp:LogoutRequest>"#;

        let result = parse_logout_request(xml).unwrap();
        assert!(result.has_embedded_signature);
    }

    #[test]
    fn test_parse_logout_request_rejects_oversized_name_id() {
        let long_name = "x".repeat(5000);
        let xml = format!(
            r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_lr_1">
    <saml:NameID xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">{long_name}</saml:NameID>
</samlp:LogoutRequest>"#
        );

        assert!(parse_logout_request(&xml).is_err());
    }

    #[test]
    fn test_parse_logout_response_with_status() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
    xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
    ID="_lresp_1" Version="2.0" InResponseTo="_lr_test123">
    <saml:Issuer>https://sp.example.com</saml:Issuer>
    <samlp:Status>
        <samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Responder">
            <samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:PartialLogout"/>
        </samlp:StatusCode>
        <samlp:StatusMessage>Something went wrong</samlp:StatusMessage>
    </samlp:Status>
</samlp:LogoutResponse>"#;

        let result = parse_logout_response(xml).unwrap();
        assert_eq!(
            result.status.as_deref(),
            Some("urn:oasis:names:tc:SAML:2.0:status:Responder")
        );
        assert_eq!(
            result.sub_code.as_deref(),
            Some("urn:oasis:names:tc:SAML:2.0:status:PartialLogout")
        );
        assert_eq!(result.status_message.as_deref(), Some("Something went wrong"));
        assert_eq!(result.issuer.as_deref(), Some("https://sp.example.com"));
        assert_eq!(result.in_response_to.as_deref(), Some("_lr_test123"));
    }

    #[test]
    fn test_parse_rejects_empty_document() {
        assert!(parse_logout_response("").is_err());
        assert!(parse_logout_request("not xml at all").is_err());
    }
}
