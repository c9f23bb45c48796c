//! Single Logout error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type for SLO operations
pub type SloResult<T> = Result<T, SloError>;

/// Signature validation failures, by cause.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// A credential is configured for the sender, so signing is mandatory
    #[error("{0} message MUST be signed when using an asynchronous binding (POST or Redirect)")]
    MissingSignature(&'static str),

    /// `SigAlg` is missing or names an algorithm outside the supported set
    #[error(
        "Invalid signature algorithm: {0}. Supported algorithms are \
         http://www.w3.org/2000/09/xmldsig#rsa-sha1 and \
         http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"
    )]
    UnsupportedAlgorithm(String),

    /// The signature does not verify against the resolved credential
    #[error("Signature check errors: {0}")]
    Mismatch(String),
}

/// Transaction store failures
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// No state persisted under the given key
    #[error("State not found: {0}")]
    NotFound(String),

    /// Backend failure
    #[error("Storage error: {0}")]
    Backend(String),
}

/// SLO-specific errors
#[derive(Debug, Error)]
pub enum SloError {
    /// Message could not be decoded, inflated, or parsed as XML
    #[error("Invalid SAML message: {0}")]
    ParseError(String),

    /// Inbound LogoutRequest carried no Issuer element
    #[error("SAML Request with no issuer. Issuer is a mandatory element")]
    MissingIssuer,

    /// No session participant matches the message and no default destination applies
    #[error("Invalid Session Participant")]
    UnknownParticipant,

    /// RelayState token does not resolve to outstanding dispatch state
    #[error("Invalid RelayState")]
    InvalidRelayState,

    /// No destination configured for the reply
    #[error("Destination not specified")]
    MissingDestination,

    /// Signature validation failed
    #[error("Signature validation failed: {0}")]
    Signature(#[from] SignatureError),

    /// Transaction store failure
    #[error("Transaction store error: {0}")]
    Store(#[from] StoreError),

    /// Certificate parsing error
    #[error("Certificate parsing error: {0}")]
    CertificateParse(String),

    /// Private key error
    #[error("Private key error: {0}")]
    PrivateKey(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saml_status: Option<String>,
}

impl IntoResponse for SloError {
    fn into_response(self) -> Response {
        let (status, error_code, saml_status) = match &self {
            SloError::ParseError(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request",
                Some("urn:oasis:names:tc:SAML:2.0:status:Requester"),
            ),
            SloError::MissingIssuer => (
                StatusCode::BAD_REQUEST,
                "missing_issuer",
                Some("urn:oasis:names:tc:SAML:2.0:status:Requester"),
            ),
            SloError::UnknownParticipant => (
                StatusCode::BAD_REQUEST,
                "unknown_session_participant",
                Some("urn:oasis:names:tc:SAML:2.0:status:Requester"),
            ),
            SloError::InvalidRelayState => (
                StatusCode::BAD_REQUEST,
                "invalid_relay_state",
                Some("urn:oasis:names:tc:SAML:2.0:status:Requester"),
            ),
            SloError::MissingDestination => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "missing_destination",
                Some("urn:oasis:names:tc:SAML:2.0:status:Responder"),
            ),
            SloError::Signature(_) => (
                StatusCode::BAD_REQUEST,
                "signature_validation_failed",
                Some("urn:oasis:names:tc:SAML:2.0:status:Requester"),
            ),
            SloError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "transaction_store_error",
                Some("urn:oasis:names:tc:SAML:2.0:status:Responder"),
            ),
            SloError::CertificateParse(_) => {
                (StatusCode::BAD_REQUEST, "certificate_parse_error", None)
            }
            SloError::PrivateKey(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "private_key_error", None)
            }
            SloError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
        };

        let message = match &self {
            SloError::Store(e) => {
                tracing::error!("SLO transaction store error: {e}");
                "A transaction store error occurred".to_string()
            }
            SloError::PrivateKey(_) => {
                tracing::error!("SLO private key error");
                "A private key error occurred".to_string()
            }
            SloError::Internal(msg) => {
                tracing::error!("SLO internal error: {msg}");
                "An internal error occurred".to_string()
            }
            SloError::CertificateParse(_) => "Certificate parsing error".to_string(),
            // Safe user-facing messages (contain only client-provided values)
            SloError::ParseError(_)
            | SloError::MissingIssuer
            | SloError::UnknownParticipant
            | SloError::InvalidRelayState
            | SloError::MissingDestination
            | SloError::Signature(_) => self.to_string(),
        };

        let body = ErrorResponse {
            error: error_code.to_string(),
            message,
            saml_status: saml_status.map(String::from),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_error_wraps_into_slo_error() {
        let err: SloError = SignatureError::UnsupportedAlgorithm("rot13".to_string()).into();
        assert!(matches!(
            err,
            SloError::Signature(SignatureError::UnsupportedAlgorithm(_))
        ));
        assert!(err.to_string().contains("rot13"));
    }

    #[test]
    fn test_requester_errors_map_to_bad_request() {
        for err in [
            SloError::MissingIssuer,
            SloError::InvalidRelayState,
            SloError::UnknownParticipant,
            SloError::ParseError("junk".to_string()),
        ] {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_store_errors_map_to_server_error() {
        let response = SloError::Store(StoreError::Backend("down".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
