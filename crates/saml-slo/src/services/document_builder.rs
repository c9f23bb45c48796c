//! SAML LogoutRequest/LogoutResponse XML and auto-submit form construction

/// Fields for an outbound LogoutRequest
#[derive(Debug)]
pub struct LogoutRequestFields<'a> {
    pub id: &'a str,
    pub issue_instant: &'a str,
    /// IdP entity ID
    pub issuer: &'a str,
    pub destination: &'a str,
    pub name_id: &'a str,
    pub name_id_format: Option<&'a str>,
    pub session_index: &'a str,
}

/// Fields for an outbound LogoutResponse
#[derive(Debug)]
pub struct LogoutResponseFields<'a> {
    pub id: &'a str,
    pub issue_instant: &'a str,
    pub issuer: &'a str,
    pub destination: &'a str,
    pub in_response_to: Option<&'a str>,
    pub status_code: &'a str,
    pub status_message: Option<&'a str>,
}

/// Fields for the auto-submitting HTML form (HTTP-POST binding)
#[derive(Debug)]
pub struct AutoSubmitFormFields<'a> {
    /// `SAMLRequest` or `SAMLResponse`
    pub param_name: &'a str,
    /// Base64-encoded message
    pub message: &'a str,
    pub destination: &'a str,
    pub relay_state: Option<&'a str>,
    /// CSP nonce for the submitting script, when the host page sets one
    pub nonce: Option<&'a str>,
}

/// Build a LogoutRequest document addressed to one session participant.
#[must_use]
pub fn build_logout_request(fields: &LogoutRequestFields<'_>) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<samlp:LogoutRequest xmlns:samlp=\"urn:oasis:names:tc:SAML:2.0:protocol\"\n");
    xml.push_str("    xmlns:saml=\"urn:oasis:names:tc:SAML:2.0:assertion\"\n");
    xml.push_str("    ID=\"");
    xml.push_str(&xml_escape(fields.id));
    xml.push_str("\"\n    Version=\"2.0\"\n    IssueInstant=\"");
    xml.push_str(&xml_escape(fields.issue_instant));
    xml.push_str("\"\n    Destination=\"");
    xml.push_str(&xml_escape(fields.destination));
    xml.push_str("\">\n    <saml:Issuer>");
    xml.push_str(&xml_escape(fields.issuer));
    xml.push_str("</saml:Issuer>\n    <saml:NameID");
    if let Some(format) = fields.name_id_format {
        xml.push_str(" Format=\"");
        xml.push_str(&xml_escape(format));
        xml.push('"');
    }
    xml.push('>');
    xml.push_str(&xml_escape(fields.name_id));
    xml.push_str("</saml:NameID>\n    <samlp:SessionIndex>");
    xml.push_str(&xml_escape(fields.session_index));
    xml.push_str("</samlp:SessionIndex>\n</samlp:LogoutRequest>");
    xml
}

/// Build a LogoutResponse document.
#[must_use]
pub fn build_logout_response(fields: &LogoutResponseFields<'_>) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<samlp:LogoutResponse xmlns:samlp=\"urn:oasis:names:tc:SAML:2.0:protocol\"\n");
    xml.push_str("    xmlns:saml=\"urn:oasis:names:tc:SAML:2.0:assertion\"\n");
    xml.push_str("    ID=\"");
    xml.push_str(&xml_escape(fields.id));
    xml.push_str("\"\n    Version=\"2.0\"\n    IssueInstant=\"");
    xml.push_str(&xml_escape(fields.issue_instant));
    xml.push_str("\"\n    Destination=\"");
    xml.push_str(&xml_escape(fields.destination));
    xml.push('"');
    if let Some(in_response_to) = fields.in_response_to {
        xml.push_str("\n    InResponseTo=\"");
        xml.push_str(&xml_escape(in_response_to));
        xml.push('"');
    }
    xml.push_str(">\n    <saml:Issuer>");
    xml.push_str(&xml_escape(fields.issuer));
    xml.push_str("</saml:Issuer>\n    <samlp:Status>\n        <samlp:StatusCode Value=\"");
    xml.push_str(&xml_escape(fields.status_code));
    xml.push_str("\"/>");
    if let Some(message) = fields.status_message {
        xml.push_str("\n        <samlp:StatusMessage>");
        xml.push_str(&xml_escape(message));
        xml.push_str("</samlp:StatusMessage>");
    }
    xml.push_str("\n    </samlp:Status>\n</samlp:LogoutResponse>");
    xml
}

/// Build the auto-submitting HTML form that delivers a message over the
/// HTTP-POST binding.
#[must_use]
pub fn build_auto_submit_form(fields: &AutoSubmitFormFields<'_>) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("    <title>Working...</title>\n</head>\n<body>\n");
    html.push_str("    <form method=\"post\" name=\"hiddenform\" action=\"");
    html.push_str(&xml_escape(fields.destination));
    html.push_str("\">\n        <input type=\"hidden\" name=\"");
    html.push_str(&xml_escape(fields.param_name));
    html.push_str("\" value=\"");
    html.push_str(&xml_escape(fields.message));
    html.push_str("\"/>\n");
    if let Some(relay_state) = fields.relay_state {
        html.push_str("        <input type=\"hidden\" name=\"RelayState\" value=\"");
        html.push_str(&xml_escape(relay_state));
        html.push_str("\"/>\n");
    }
    html.push_str("        <noscript>\n            <p>Script is disabled. Click Submit to continue.</p>\n");
    html.push_str("            <input type=\"submit\" value=\"Submit\"/>\n        </noscript>\n");
    html.push_str("    </form>\n    <script");
    if let Some(nonce) = fields.nonce {
        html.push_str(" nonce=\"");
        html.push_str(&xml_escape(nonce));
        html.push('"');
    }
    html.push_str(">window.setTimeout(function(){document.forms[0].submit();}, 0);</script>\n");
    html.push_str("</body>\n</html>\n");
    html
}

/// Escape a value for use in XML/HTML text or attribute position.
fn xml_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(c),
        }
    }
    result
}
