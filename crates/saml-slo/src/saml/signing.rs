//! XML-DSig signing primitives
//!
//! Holds the IdP signing key material and produces enveloped signatures
//! over canonicalized SAML documents, plus the raw RSA operations the
//! detached (query string) signature scheme needs.

use crate::error::{SloError, SloResult};
use crate::saml::{canonicalize, SignatureAlgorithm};
use base64::{engine::general_purpose::STANDARD, Engine};
use openssl::pkey::{PKey, Private};
use openssl::sign::{Signer, Verifier};
use openssl::x509::X509;

/// IdP signing credentials: private key plus the certificate published to SPs.
pub struct SigningCredentials {
    certificate: X509,
    key: PKey<Private>,
}

impl SigningCredentials {
    /// Load credentials from PEM-encoded certificate and private key.
    pub fn from_pem(certificate_pem: &str, key_pem: &str) -> SloResult<Self> {
        let certificate = parse_certificate(certificate_pem)?;
        let key = PKey::private_key_from_pem(key_pem.as_bytes())
            .map_err(|e| SloError::PrivateKey(format!("Failed to parse private key: {e}")))?;
        Ok(Self { certificate, key })
    }

    /// Sign raw bytes with the given algorithm, returning the raw signature.
    pub fn sign(&self, data: &[u8], algorithm: SignatureAlgorithm) -> SloResult<Vec<u8>> {
        let mut signer = Signer::new(algorithm.message_digest(), &self.key)
            .map_err(|e| SloError::PrivateKey(format!("Signer creation failed: {e}")))?;
        signer
            .update(data)
            .map_err(|e| SloError::PrivateKey(format!("Signing failed: {e}")))?;
        signer
            .sign_to_vec()
            .map_err(|e| SloError::PrivateKey(format!("Signing failed: {e}")))
    }

    /// The certificate as base64 DER, for embedding in a `KeyInfo` element.
    pub fn certificate_base64_der(&self) -> SloResult<String> {
        let der = self
            .certificate
            .to_der()
            .map_err(|e| SloError::CertificateParse(format!("DER encoding failed: {e}")))?;
        Ok(STANDARD.encode(der))
    }

    /// SHA-1 thumbprint of the certificate, uppercase hex.
    pub fn thumbprint(&self) -> SloResult<String> {
        certificate_thumbprint(&self.certificate)
    }
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials").finish_non_exhaustive()
    }
}

/// Parse an X.509 certificate from PEM, with or without the PEM armor.
///
/// Bare base64 (as found in config values or a `KeyInfo` element) is
/// normalized and re-wrapped before parsing.
pub fn parse_certificate(pem: &str) -> SloResult<X509> {
    let pem_data = if pem.contains("-----BEGIN CERTIFICATE-----") {
        pem.to_string()
    } else {
        let body: String = pem.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let wrapped = body
            .as_bytes()
            .chunks(64)
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        format!("-----BEGIN CERTIFICATE-----\n{wrapped}\n-----END CERTIFICATE-----")
    };

    X509::from_pem(pem_data.as_bytes())
        .map_err(|e| SloError::CertificateParse(format!("Invalid certificate: {e}")))
}

/// SHA-1 thumbprint of a certificate's DER encoding, uppercase hex.
pub fn certificate_thumbprint(certificate: &X509) -> SloResult<String> {
    let digest = certificate
        .digest(openssl::hash::MessageDigest::sha1())
        .map_err(|e| SloError::CertificateParse(format!("Thumbprint failed: {e}")))?;
    Ok(digest.iter().map(|b| format!("{b:02X}")).collect())
}

/// Verify a raw signature over `data` against a certificate's public key.
pub fn verify_with_certificate(
    certificate: &X509,
    data: &[u8],
    signature: &[u8],
    algorithm: SignatureAlgorithm,
) -> SloResult<bool> {
    let public_key = certificate
        .public_key()
        .map_err(|e| SloError::CertificateParse(format!("Invalid certificate: {e}")))?;
    let mut verifier = Verifier::new(algorithm.message_digest(), &public_key)
        .map_err(|e| SloError::Internal(format!("Verifier creation failed: {e}")))?;
    verifier
        .update(data)
        .map_err(|e| SloError::Internal(format!("Signature update failed: {e}")))?;
    verifier
        .verify(signature)
        .map_err(|e| SloError::Internal(format!("Signature verification failed: {e}")))
}

/// Slice of `xml` starting at the document element (past any declaration,
/// comments, or processing instructions).
#[must_use]
pub fn document_element(xml: &str) -> Option<&str> {
    let bytes = xml.as_bytes();
    let mut pos = 0;
    while let Some(offset) = xml[pos..].find('<') {
        let start = pos + offset;
        match bytes.get(start + 1) {
            Some(b'?') | Some(b'!') => {
                pos = start + 1;
            }
            Some(_) => return Some(&xml[start..]),
            None => return None,
        }
    }
    None
}

/// The `ID` attribute of the document element, if any.
#[must_use]
pub fn document_id(xml: &str) -> Option<&str> {
    let doc = document_element(xml)?;
    let tag_end = doc.find('>')?;
    let tag = &doc[..tag_end];
    let id_start = tag.find(" ID=\"")? + " ID=\"".len();
    let id_end = tag[id_start..].find('"')?;
    Some(&tag[id_start..id_start + id_end])
}

/// Sign a SAML message by injecting an enveloped `ds:Signature` after the
/// `Issuer` element.
///
/// The digest is computed over the canonicalized document element with the
/// signature absent; the signature over the canonicalized `SignedInfo`.
pub fn sign_enveloped(
    xml: &str,
    credentials: &SigningCredentials,
    algorithm: SignatureAlgorithm,
) -> SloResult<String> {
    let issuer_end = xml
        .find("</saml:Issuer>")
        .ok_or_else(|| SloError::Internal("Cannot find Issuer element to sign".to_string()))?;
    let after_issuer = issuer_end + "</saml:Issuer>".len();

    let doc = document_element(xml)
        .ok_or_else(|| SloError::ParseError("Document has no root element".to_string()))?;
    let element_id = document_id(xml)
        .ok_or_else(|| SloError::Internal("Document element has no ID".to_string()))?;

    let canonical = canonicalize::strip_insignificant_whitespace(doc)?;
    let digest = openssl::hash::hash(algorithm.message_digest(), canonical.as_bytes())
        .map_err(|e| SloError::Internal(format!("Digest failed: {e}")))?;
    let digest_b64 = STANDARD.encode(digest);

    let mut signed_info = String::new();
    signed_info.push_str("<ds:SignedInfo xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\">");
    signed_info.push_str(
        "<ds:CanonicalizationMethod Algorithm=\"http://www.w3.org/2001/10/xml-exc-c14n#\"/>",
    );
    signed_info.push_str("<ds:SignatureMethod Algorithm=\"");
    signed_info.push_str(algorithm.urn());
    signed_info.push_str("\"/>");
    signed_info.push_str("<ds:Reference URI=\"#");
    signed_info.push_str(element_id);
    signed_info.push_str("\">");
    signed_info.push_str("<ds:Transforms>");
    signed_info.push_str(
        "<ds:Transform Algorithm=\"http://www.w3.org/2000/09/xmldsig#enveloped-signature\"/>",
    );
    signed_info.push_str("<ds:Transform Algorithm=\"http://www.w3.org/2001/10/xml-exc-c14n#\"/>");
    signed_info.push_str("</ds:Transforms>");
    signed_info.push_str("<ds:DigestMethod Algorithm=\"");
    signed_info.push_str(algorithm.digest_urn());
    signed_info.push_str("\"/>");
    signed_info.push_str("<ds:DigestValue>");
    signed_info.push_str(&digest_b64);
    signed_info.push_str("</ds:DigestValue>");
    signed_info.push_str("</ds:Reference>");
    signed_info.push_str("</ds:SignedInfo>");

    let canonical_signed_info = canonicalize::strip_insignificant_whitespace(&signed_info)?;
    let signature = credentials.sign(canonical_signed_info.as_bytes(), algorithm)?;
    let signature_b64 = STANDARD.encode(&signature);
    let certificate_b64 = credentials.certificate_base64_der()?;

    // No whitespace inside the Signature element: it must survive
    // canonicalization byte-identical on the verifying side.
    let mut sig_xml = String::new();
    sig_xml.push_str("<ds:Signature xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\">");
    sig_xml.push_str(&signed_info);
    sig_xml.push_str("<ds:SignatureValue>");
    sig_xml.push_str(&signature_b64);
    sig_xml.push_str("</ds:SignatureValue><ds:KeyInfo><ds:X509Data><ds:X509Certificate>");
    sig_xml.push_str(&certificate_b64);
    sig_xml.push_str("</ds:X509Certificate></ds:X509Data></ds:KeyInfo></ds:Signature>");

    let mut result = String::with_capacity(xml.len() + sig_xml.len());
    result.push_str(&xml[..after_issuer]);
    result.push_str(&sig_xml);
    result.push_str(&xml[after_issuer..]);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_element_skips_declaration() {
        let xml = "<?xml version=\"1.0\"?>\n<!-- hi -->\n<a ID=\"x\"/>";
        assert_eq!(document_element(xml), Some("<a ID=\"x\"/>"));
    }

    #[test]
    fn test_document_id() {
        let xml = "<?xml version=\"1.0\"?><samlp:LogoutRequest ID=\"_abc\" Version=\"2.0\"/>";
        assert_eq!(document_id(xml), Some("_abc"));
        assert_eq!(document_id("<a x=\"1\"/>"), None);
    }

    #[test]
    fn test_sign_and_raw_verify_round_trip() {
        let keys = crate::test_keys::generate("test-idp");
        let data = b"SAMLRequest=abc&SigAlg=alg";
        let signature = keys
            .credentials
            .sign(data, SignatureAlgorithm::RsaSha256)
            .unwrap();
        let cert = parse_certificate(&keys.certificate_pem).unwrap();
        assert!(
            verify_with_certificate(&cert, data, &signature, SignatureAlgorithm::RsaSha256)
                .unwrap()
        );
        assert!(
            !verify_with_certificate(&cert, b"tampered", &signature, SignatureAlgorithm::RsaSha256)
                .unwrap()
        );
    }

    #[test]
    fn test_parse_certificate_without_headers() {
        let keys = crate::test_keys::generate("test-idp");
        let bare = keys
            .certificate_pem
            .replace("-----BEGIN CERTIFICATE-----", "")
            .replace("-----END CERTIFICATE-----", "");
        assert!(parse_certificate(&bare).is_ok());
    }

    #[test]
    fn test_thumbprint_is_uppercase_hex() {
        let keys = crate::test_keys::generate("test-idp");
        let thumbprint = keys.credentials.thumbprint().unwrap();
        assert_eq!(thumbprint.len(), 40);
        assert!(thumbprint
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
