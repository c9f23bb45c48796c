//! SAML message signature validation
//!
//! Handles both signature placements: the enveloped `ds:Signature` element
//! (HTTP-POST and undeflated Redirect) and the detached query string
//! signature (Redirect with deflate).

use crate::error::SloResult;
use crate::saml::canonicalize::strip_insignificant_whitespace;
use crate::saml::{signing, SignatureAlgorithm};
use base64::{engine::general_purpose::STANDARD, Engine};
use openssl::hash::MessageDigest;
use openssl::x509::X509;

/// Credential set to authenticate an inbound message against: a certificate,
/// a list of acceptable certificate thumbprints, or both.
#[derive(Debug, Clone, Default)]
pub struct InboundCredentials {
    /// PEM or bare base64 certificate
    pub cert: Option<String>,
    /// SHA-1 thumbprints, uppercase hex. When no certificate is pinned, the
    /// message's `KeyInfo` certificate is used if its thumbprint matches.
    pub thumbprints: Vec<String>,
}

impl InboundCredentials {
    #[must_use]
    pub fn from_cert(cert: impl Into<String>) -> Self {
        Self {
            cert: Some(cert.into()),
            thumbprints: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cert.is_none() && self.thumbprints.is_empty()
    }
}

/// Service for validating SAML message signatures
pub struct SignatureValidator;

impl SignatureValidator {
    /// Verify an enveloped XML-DSig signature.
    ///
    /// Returns the list of validation errors; an empty list means the
    /// signature verified.
    #[must_use]
    pub fn verify_embedded(xml: &str, credentials: &InboundCredentials) -> Vec<String> {
        let info = match extract_signature_info(xml) {
            Ok(info) => info,
            Err(e) => return vec![e],
        };

        let certificate = match resolve_certificate(credentials, &info) {
            Ok(cert) => cert,
            Err(e) => return vec![e],
        };

        let mut errors = Vec::new();
        if let Err(e) = verify_reference_digest(xml, &info) {
            errors.push(e);
        }
        if let Err(e) = verify_signed_info(&info, &certificate) {
            errors.push(e);
        }
        errors
    }

    /// Verify a detached signature over the URL-encoded parameter
    /// serialization of a Redirect-binding message.
    pub fn verify_detached(
        signed_content: &str,
        signature_b64: &str,
        certificate: &X509,
        algorithm: SignatureAlgorithm,
    ) -> SloResult<bool> {
        let signature = match STANDARD.decode(signature_b64) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(false),
        };
        signing::verify_with_certificate(
            certificate,
            signed_content.as_bytes(),
            &signature,
            algorithm,
        )
    }
}

/// Signature components extracted from a signed document
struct SignatureInfo {
    signed_info: String,
    signature_value: String,
    reference_uri: String,
    digest_value: String,
    signature_algorithm: Option<String>,
    digest_algorithm: Option<String>,
    key_info_certificate: Option<String>,
}

/// Extract signature components, re-serializing `SignedInfo` exactly as it
/// appears in the document so its canonical form matches the signed bytes.
fn extract_signature_info(xml: &str) -> Result<SignatureInfo, String> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);

    let mut in_signed_info = false;
    let mut in_signature_value = false;
    let mut in_digest_value = false;
    let mut in_x509_certificate = false;
    let mut signed_info = String::new();
    let mut signature_value = String::new();
    let mut digest_value = String::new();
    let mut reference_uri = String::new();
    let mut signature_algorithm = None;
    let mut digest_algorithm = None;
    let mut key_info_certificate: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                if name == "SignedInfo" {
                    in_signed_info = true;
                }
                if in_signed_info {
                    let raw = std::str::from_utf8(&e).unwrap_or("");
                    signed_info.push('<');
                    signed_info.push_str(raw);
                    signed_info.push('>');
                }
                match name.as_str() {
                    "SignatureValue" => in_signature_value = true,
                    "DigestValue" => in_digest_value = true,
                    "X509Certificate" => in_x509_certificate = true,
                    "Reference" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.local_name().as_ref() == b"URI" {
                                reference_uri =
                                    attr.unescape_value().unwrap_or_default().to_string();
                            }
                        }
                    }
                    "SignatureMethod" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.local_name().as_ref() == b"Algorithm" {
                                signature_algorithm =
                                    Some(attr.unescape_value().unwrap_or_default().to_string());
                            }
                        }
                    }
                    "DigestMethod" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.local_name().as_ref() == b"Algorithm" {
                                digest_algorithm =
                                    Some(attr.unescape_value().unwrap_or_default().to_string());
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if in_signed_info {
                    let raw = std::str::from_utf8(&e).unwrap_or("");
                    signed_info.push('<');
                    signed_info.push_str(raw);
                    signed_info.push_str("/>");
                }
                match name.as_str() {
                    "SignatureMethod" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.local_name().as_ref() == b"Algorithm" {
                                signature_algorithm =
                                    Some(attr.unescape_value().unwrap_or_default().to_string());
                            }
                        }
                    }
                    "DigestMethod" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.local_name().as_ref() == b"Algorithm" {
                                digest_algorithm =
                                    Some(attr.unescape_value().unwrap_or_default().to_string());
                            }
                        }
                    }
                    "Reference" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.local_name().as_ref() == b"URI" {
                                reference_uri =
                                    attr.unescape_value().unwrap_or_default().to_string();
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if in_signed_info {
                    let qualified = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    signed_info.push_str("</");
                    signed_info.push_str(&qualified);
                    signed_info.push('>');
                }
                match name.as_str() {
                    "SignedInfo" => in_signed_info = false,
                    "SignatureValue" => in_signature_value = false,
                    "DigestValue" => in_digest_value = false,
                    "X509Certificate" => in_x509_certificate = false,
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().unwrap_or_default();
                if in_signed_info {
                    signed_info.push_str(&text);
                }
                if in_signature_value {
                    signature_value.push_str(&text);
                }
                if in_digest_value {
                    digest_value.push_str(&text);
                }
                if in_x509_certificate {
                    key_info_certificate
                        .get_or_insert_with(String::new)
                        .push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {e}")),
            _ => {}
        }
    }

    if signed_info.is_empty() {
        return Err("No SignedInfo element found".to_string());
    }
    if signature_value.is_empty() {
        return Err("No SignatureValue element found".to_string());
    }

    Ok(SignatureInfo {
        signed_info,
        signature_value,
        reference_uri,
        digest_value,
        signature_algorithm,
        digest_algorithm,
        key_info_certificate,
    })
}

/// Pick the certificate to verify against: the pinned one when configured,
/// otherwise the message's `KeyInfo` certificate if its thumbprint is in the
/// allowed set.
fn resolve_certificate(
    credentials: &InboundCredentials,
    info: &SignatureInfo,
) -> Result<X509, String> {
    if let Some(pem) = &credentials.cert {
        return signing::parse_certificate(pem).map_err(|e| e.to_string());
    }

    if credentials.thumbprints.is_empty() {
        return Err("No certificate or thumbprint configured".to_string());
    }

    let embedded = info.key_info_certificate.as_deref().ok_or_else(|| {
        "Thumbprints are configured but the message carries no KeyInfo certificate".to_string()
    })?;
    let certificate = signing::parse_certificate(embedded).map_err(|e| e.to_string())?;
    let thumbprint = signing::certificate_thumbprint(&certificate).map_err(|e| e.to_string())?;

    if credentials
        .thumbprints
        .iter()
        .any(|t| t.eq_ignore_ascii_case(&thumbprint))
    {
        Ok(certificate)
    } else {
        Err(format!(
            "Certificate thumbprint {thumbprint} does not match any allowed thumbprint"
        ))
    }
}

/// Recompute the reference digest over the canonicalized document with the
/// signature removed (enveloped signature transform).
fn verify_reference_digest(xml: &str, info: &SignatureInfo) -> Result<(), String> {
    let doc = signing::document_element(xml).ok_or("Document has no root element")?;

    let reference = info.reference_uri.trim_start_matches('#');
    if !reference.is_empty() {
        if let Some(id) = signing::document_id(xml) {
            if id != reference {
                return Err(format!(
                    "Reference URI #{reference} does not match document element ID {id}"
                ));
            }
        }
    }

    let digest_method = match info.digest_algorithm.as_deref() {
        Some("http://www.w3.org/2000/09/xmldsig#sha1") => MessageDigest::sha1(),
        Some("http://www.w3.org/2001/04/xmlenc#sha256") | None => MessageDigest::sha256(),
        Some(other) => return Err(format!("Unsupported digest method: {other}")),
    };

    let without_signature = remove_signature_element(doc);
    let canonical = strip_insignificant_whitespace(&without_signature).map_err(|e| e.to_string())?;
    let digest =
        openssl::hash::hash(digest_method, canonical.as_bytes()).map_err(|e| e.to_string())?;
    let computed = STANDARD.encode(digest);

    let expected = info.digest_value.replace(['\n', '\r', ' '], "");
    if computed != expected {
        return Err("Digest mismatch".to_string());
    }

    Ok(())
}

/// Verify the signature over the canonicalized `SignedInfo`.
fn verify_signed_info(info: &SignatureInfo, certificate: &X509) -> Result<(), String> {
    let algorithm = info
        .signature_algorithm
        .as_deref()
        .and_then(SignatureAlgorithm::from_urn)
        .ok_or_else(|| {
            format!(
                "Unsupported signature method: {}",
                info.signature_algorithm.as_deref().unwrap_or("(none)")
            )
        })?;

    let canonical = strip_insignificant_whitespace(&info.signed_info).map_err(|e| e.to_string())?;
    let signature = STANDARD
        .decode(info.signature_value.replace(['\n', '\r', ' '], ""))
        .map_err(|e| format!("Invalid signature encoding: {e}"))?;

    match signing::verify_with_certificate(
        certificate,
        canonical.as_bytes(),
        &signature,
        algorithm,
    ) {
        Ok(true) => Ok(()),
        Ok(false) => Err("SignatureValue does not verify against the certificate".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Remove the `ds:Signature` element (enveloped signature transform).
fn remove_signature_element(xml: &str) -> String {
    for (open, close) in [
        ("<ds:Signature", "</ds:Signature>"),
        ("<Signature", "</Signature>"),
    ] {
        if let (Some(start), Some(end)) = (xml.find(open), xml.find(close)) {
            let mut result = String::with_capacity(xml.len());
            result.push_str(&xml[..start]);
            result.push_str(&xml[end + close.len()..]);
            return result;
        }
    }
    xml.to_string()
}
