//! SAML protocol vocabulary and signing utilities

pub mod canonicalize;
pub mod signing;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use canonicalize::strip_insignificant_whitespace;
pub use signing::{parse_certificate, sign_enveloped, SigningCredentials};

/// SAML 2.0 protocol namespace
pub const SAML_PROTOCOL_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";
/// SAML 2.0 assertion namespace
pub const SAML_ASSERTION_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// Top-level status: every session participant logged out
pub const STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";
/// Top-level status: at least one participant could not be logged out
pub const STATUS_PARTIAL_LOGOUT: &str = "urn:oasis:names:tc:SAML:2.0:status:PartialLogout";
/// Top-level status: the responder could not process the request
pub const STATUS_RESPONDER: &str = "urn:oasis:names:tc:SAML:2.0:status:Responder";
/// Top-level status: the request itself was at fault
pub const STATUS_REQUESTER: &str = "urn:oasis:names:tc:SAML:2.0:status:Requester";

/// Wire binding for a SAML protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Binding {
    /// Auto-submitting HTML form carrying the message as a hidden field
    HttpPost,
    /// 302 redirect carrying the message in the query string
    HttpRedirect,
}

impl Binding {
    pub const HTTP_POST_URN: &'static str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST";
    pub const HTTP_REDIRECT_URN: &'static str =
        "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect";

    #[must_use]
    pub fn as_urn(self) -> &'static str {
        match self {
            Binding::HttpPost => Self::HTTP_POST_URN,
            Binding::HttpRedirect => Self::HTTP_REDIRECT_URN,
        }
    }

    #[must_use]
    pub fn from_urn(urn: &str) -> Option<Self> {
        match urn {
            Self::HTTP_POST_URN => Some(Binding::HttpPost),
            Self::HTTP_REDIRECT_URN => Some(Binding::HttpRedirect),
            _ => None,
        }
    }
}

/// Signature algorithm for detached (query string) and enveloped signatures.
///
/// Only the two algorithms the SAML 2.0 deployment profile actually sees in
/// the wild are supported; everything else is rejected before verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    RsaSha1,
    RsaSha256,
}

impl SignatureAlgorithm {
    pub const RSA_SHA1_URN: &'static str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
    pub const RSA_SHA256_URN: &'static str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

    #[must_use]
    pub fn urn(self) -> &'static str {
        match self {
            SignatureAlgorithm::RsaSha1 => Self::RSA_SHA1_URN,
            SignatureAlgorithm::RsaSha256 => Self::RSA_SHA256_URN,
        }
    }

    #[must_use]
    pub fn from_urn(urn: &str) -> Option<Self> {
        match urn {
            Self::RSA_SHA1_URN => Some(SignatureAlgorithm::RsaSha1),
            Self::RSA_SHA256_URN => Some(SignatureAlgorithm::RsaSha256),
            _ => None,
        }
    }

    /// URN of the digest method paired with this signature algorithm.
    #[must_use]
    pub fn digest_urn(self) -> &'static str {
        match self {
            SignatureAlgorithm::RsaSha1 => "http://www.w3.org/2000/09/xmldsig#sha1",
            SignatureAlgorithm::RsaSha256 => "http://www.w3.org/2001/04/xmlenc#sha256",
        }
    }

    pub(crate) fn message_digest(self) -> openssl::hash::MessageDigest {
        match self {
            SignatureAlgorithm::RsaSha1 => openssl::hash::MessageDigest::sha1(),
            SignatureAlgorithm::RsaSha256 => openssl::hash::MessageDigest::sha256(),
        }
    }
}

/// The two protocol messages this engine exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    LogoutRequest,
    LogoutResponse,
}

impl MessageKind {
    /// Query/form parameter the message travels under.
    #[must_use]
    pub fn param_name(self) -> &'static str {
        match self {
            MessageKind::LogoutRequest => "SAMLRequest",
            MessageKind::LogoutResponse => "SAMLResponse",
        }
    }

    /// Local name of the message's document element.
    #[must_use]
    pub fn element_name(self) -> &'static str {
        match self {
            MessageKind::LogoutRequest => "LogoutRequest",
            MessageKind::LogoutResponse => "LogoutResponse",
        }
    }
}

/// Generate a message ID for an outbound LogoutRequest.
#[must_use]
pub fn generate_request_id() -> String {
    format!("_lr_{}", Uuid::new_v4())
}

/// Generate a message ID for an outbound LogoutResponse.
#[must_use]
pub fn generate_response_id() -> String {
    format!("_lresp_{}", Uuid::new_v4())
}

/// Current instant in `xs:dateTime` format, UTC, millisecond precision,
/// as SAML Core 1.3.3 requires.
#[must_use]
pub fn generate_instant() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
