//! Binding codec: decode, authenticate, and encode SAML messages per binding
//!
//! Inbound, a message is base64 (HTTP-POST, undeflated Redirect) or
//! base64-over-raw-deflate (Redirect with deflate); the first decoded byte
//! tells them apart. Outbound, the codec canonicalizes, signs, and wraps the
//! message in an auto-submit form or a signed redirect query.

use crate::config::SloConfig;
use crate::error::{SignatureError, SloError, SloResult};
use crate::saml::{canonicalize, signing, Binding, MessageKind, SignatureAlgorithm};
use crate::services::document_builder::{self, AutoSubmitFormFields};
use crate::services::message_parser::{ParsedLogoutRequest, ParsedLogoutResponse};
use crate::services::signature_validator::{InboundCredentials, SignatureValidator};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use std::io::{Read, Write};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

/// Maximum encoded message size (pre-decode guard)
const MAX_ENCODED_SIZE: usize = 512 * 1024;
/// Maximum decompressed size, to stop deflate bombs
const MAX_INFLATED_SIZE: u64 = 64 * 1024;

/// SAML protocol parameters, as they appear in a query string or POST body.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct SloParams {
    #[serde(rename = "SAMLRequest")]
    pub saml_request: Option<String>,
    #[serde(rename = "SAMLResponse")]
    pub saml_response: Option<String>,
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
    #[serde(rename = "SigAlg")]
    pub sig_alg: Option<String>,
    #[serde(rename = "Signature")]
    pub signature: Option<String>,
}

/// One inbound HTTP exchange, keeping query and body parameters apart: the
/// detached signature scheme is defined over query parameters only.
#[derive(Debug, Clone, Default)]
pub struct SloRequest {
    pub query: SloParams,
    pub body: SloParams,
}

impl SloRequest {
    #[must_use]
    pub fn from_query(query: SloParams) -> Self {
        Self {
            query,
            body: SloParams::default(),
        }
    }

    #[must_use]
    pub fn from_body(body: SloParams) -> Self {
        Self {
            query: SloParams::default(),
            body,
        }
    }

    #[must_use]
    pub fn saml_request(&self) -> Option<&str> {
        self.query
            .saml_request
            .as_deref()
            .or(self.body.saml_request.as_deref())
    }

    #[must_use]
    pub fn saml_response(&self) -> Option<&str> {
        self.query
            .saml_response
            .as_deref()
            .or(self.body.saml_response.as_deref())
    }

    #[must_use]
    pub fn relay_state(&self) -> Option<&str> {
        self.query
            .relay_state
            .as_deref()
            .or(self.body.relay_state.as_deref())
    }

    fn query_message(&self, kind: MessageKind) -> Option<&str> {
        match kind {
            MessageKind::LogoutRequest => self.query.saml_request.as_deref(),
            MessageKind::LogoutResponse => self.query.saml_response.as_deref(),
        }
    }

    fn body_has_message(&self, kind: MessageKind) -> bool {
        match kind {
            MessageKind::LogoutRequest => self.body.saml_request.is_some(),
            MessageKind::LogoutResponse => self.body.saml_response.is_some(),
        }
    }
}

/// Outbound HTTP action the engine answers an exchange with.
#[derive(Debug)]
pub enum SloResponse {
    /// 200 with an auto-submitting HTML form (HTTP-POST binding)
    Form { html: String },
    /// 302 to the destination with message and signature as query parameters
    Redirect { location: String },
    /// Bare success acknowledgment (IdP-initiated flow with nothing to answer)
    Ack,
}

impl IntoResponse for SloResponse {
    fn into_response(self) -> Response {
        match self {
            SloResponse::Form { html } => (
                StatusCode::OK,
                [("content-type", "text/html; charset=utf-8")],
                html,
            )
                .into_response(),
            SloResponse::Redirect { location } => {
                (StatusCode::FOUND, [("location", location)]).into_response()
            }
            SloResponse::Ack => StatusCode::OK.into_response(),
        }
    }
}

/// Resolves signing credentials for an inbound message from whatever state
/// the caller keeps (here: the session participant registry).
pub type CredentialResolver<'a> =
    dyn Fn(Option<&str>, Option<&str>, Option<&str>) -> Option<InboundCredentials> + 'a;

/// Codec for one engine instance.
pub struct BindingCodec {
    config: Arc<SloConfig>,
}

impl BindingCodec {
    #[must_use]
    pub fn new(config: Arc<SloConfig>) -> Self {
        Self { config }
    }

    /// Decode an inbound message parameter to XML text.
    pub fn decode(&self, encoded: &str) -> SloResult<String> {
        if encoded.len() > MAX_ENCODED_SIZE {
            return Err(SloError::ParseError(format!(
                "Encoded message exceeds maximum size ({} > {MAX_ENCODED_SIZE} bytes)",
                encoded.len()
            )));
        }

        let decoded = STANDARD
            .decode(encoded)
            .map_err(|e| SloError::ParseError(format!("Base64 decode failed: {e}")))?;

        if decoded.first() == Some(&b'<') {
            // Just encoded, not compressed
            return String::from_utf8(decoded)
                .map_err(|e| SloError::ParseError(format!("Invalid UTF-8: {e}")));
        }

        let decoder = flate2::read::DeflateDecoder::new(&decoded[..]);
        let mut xml = String::new();
        decoder
            .take(MAX_INFLATED_SIZE)
            .read_to_string(&mut xml)
            .map_err(|e| SloError::ParseError(format!("Deflate decode failed: {e}")))?;

        if xml.len() as u64 >= MAX_INFLATED_SIZE {
            return Err(SloError::ParseError(
                "Decompressed message exceeds maximum size limit (64 KB)".to_string(),
            ));
        }

        Ok(xml)
    }

    /// Authenticate an inbound LogoutRequest.
    ///
    /// Credentials come from the static configuration when present,
    /// otherwise from the resolver, keyed by the identity fields the
    /// message itself carries. No resolvable credential means the message
    /// is accepted unsigned.
    pub fn authenticate_request(
        &self,
        xml: &str,
        parsed: &ParsedLogoutRequest,
        request: &SloRequest,
        resolver: Option<&CredentialResolver<'_>>,
    ) -> SloResult<()> {
        let credentials = if let Some(static_credentials) = &self.config.inbound_credentials {
            Some(static_credentials.clone())
        } else if let Some(resolve) = resolver {
            let issuer = parsed.issuer.as_deref();
            let session_index = parsed.session_index.as_deref();
            let name_id = parsed.name_id.as_deref();
            if issuer.is_none() && session_index.is_none() && name_id.is_none() {
                // Nothing to resolve credentials by
                None
            } else {
                resolve(issuer, session_index, name_id)
            }
        } else {
            None
        };

        let Some(credentials) = credentials.filter(|c| !c.is_empty()) else {
            tracing::debug!("No signing credentials apply, accepting LogoutRequest unsigned");
            return Ok(());
        };

        self.verify_inbound(
            MessageKind::LogoutRequest,
            xml,
            parsed.has_embedded_signature,
            request,
            &credentials,
        )
    }

    /// Authenticate an inbound LogoutResponse against the participant it is
    /// correlated to. A participant without a certificate is trusted as-is.
    pub fn authenticate_response(
        &self,
        xml: &str,
        parsed: &ParsedLogoutResponse,
        request: &SloRequest,
        participant_credentials: Option<&InboundCredentials>,
    ) -> SloResult<()> {
        let credentials = self
            .config
            .inbound_credentials
            .clone()
            .or_else(|| participant_credentials.cloned());

        let Some(credentials) = credentials.filter(|c| !c.is_empty()) else {
            tracing::debug!("No signing credentials apply, accepting LogoutResponse unsigned");
            return Ok(());
        };

        self.verify_inbound(
            MessageKind::LogoutResponse,
            xml,
            parsed.has_embedded_signature,
            request,
            &credentials,
        )
    }

    /// Verify a signature once a credential has been resolved. The binding
    /// determines where the signature lives; a resolved credential makes
    /// signing mandatory.
    fn verify_inbound(
        &self,
        kind: MessageKind,
        xml: &str,
        has_embedded_signature: bool,
        request: &SloRequest,
        credentials: &InboundCredentials,
    ) -> SloResult<()> {
        // A message in the body travelled over POST regardless of the
        // configured Redirect deflate mode.
        let embedded_location = request.body_has_message(kind) || !self.config.deflate;

        let is_signed = if embedded_location {
            has_embedded_signature
        } else {
            request.query.signature.is_some()
        };

        if !is_signed {
            return Err(SignatureError::MissingSignature(kind.param_name()).into());
        }

        if embedded_location {
            let errors = SignatureValidator::verify_embedded(xml, credentials);
            if !errors.is_empty() {
                return Err(SignatureError::Mismatch(errors.join("; ")).into());
            }
            return Ok(());
        }

        self.verify_detached(kind, request, credentials)
    }

    fn verify_detached(
        &self,
        kind: MessageKind,
        request: &SloRequest,
        credentials: &InboundCredentials,
    ) -> SloResult<()> {
        let sig_alg = request
            .query
            .sig_alg
            .as_deref()
            .ok_or_else(|| SignatureError::UnsupportedAlgorithm("(none provided)".to_string()))?;
        let algorithm = SignatureAlgorithm::from_urn(sig_alg)
            .ok_or_else(|| SignatureError::UnsupportedAlgorithm(sig_alg.to_string()))?;

        let message = request.query_message(kind).ok_or_else(|| {
            SloError::ParseError(format!(
                "{} missing from query for detached signature validation",
                kind.param_name()
            ))
        })?;

        let mut pairs: Vec<(&str, &str)> = vec![(kind.param_name(), message)];
        let relay_state = request
            .query
            .relay_state
            .as_deref()
            .or(request.body.relay_state.as_deref());
        if let Some(relay_state) = relay_state.filter(|r| !r.is_empty()) {
            pairs.push(("RelayState", relay_state));
        }
        pairs.push(("SigAlg", sig_alg));
        let signed_content = serialize_query(&pairs);

        // Checked by the caller: detached location implies a Signature param
        let signature = request.query.signature.as_deref().unwrap_or_default();

        let cert_pem = credentials.cert.as_deref().ok_or_else(|| {
            SignatureError::Mismatch(
                "No certificate configured for detached signature validation".to_string(),
            )
        })?;
        let certificate = signing::parse_certificate(cert_pem)?;

        let valid =
            SignatureValidator::verify_detached(&signed_content, signature, &certificate, algorithm)?;
        if valid {
            Ok(())
        } else {
            Err(SignatureError::Mismatch(format!(
                "The signature provided ({signature}) does not match the one calculated"
            ))
            .into())
        }
    }

    /// Canonicalize, sign, and wrap an outbound message per binding.
    pub fn encode(
        &self,
        kind: MessageKind,
        xml: &str,
        destination: &str,
        binding: Binding,
        relay_state: Option<&str>,
    ) -> SloResult<SloResponse> {
        let canonical = canonicalize::strip_insignificant_whitespace(xml)?;

        if binding != Binding::HttpRedirect || !self.config.deflate {
            // HTTP-POST or HTTP-Redirect without deflate: enveloped signature
            let signed = signing::sign_enveloped(
                &canonical,
                &self.config.signing,
                self.config.signature_algorithm,
            )?;
            let message = STANDARD.encode(signed.as_bytes());

            let html = document_builder::build_auto_submit_form(&AutoSubmitFormFields {
                param_name: kind.param_name(),
                message: &message,
                destination,
                relay_state,
                nonce: self.config.form_nonce.as_deref(),
            });

            return Ok(SloResponse::Form { html });
        }

        // HTTP-Redirect with deflate: detached signature over the query
        // serialization (SAML bindings spec, section 3.4.4.1)
        let mut encoder =
            flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(canonical.as_bytes())
            .map_err(|e| SloError::Internal(format!("Deflate failed: {e}")))?;
        let compressed = encoder
            .finish()
            .map_err(|e| SloError::Internal(format!("Deflate failed: {e}")))?;
        let message = STANDARD.encode(compressed);

        let algorithm = self.config.signature_algorithm;
        let mut pairs: Vec<(&str, &str)> = vec![(kind.param_name(), &message)];
        // An empty RelayState is omitted from both the query and the
        // signature computation
        if let Some(relay_state) = relay_state.filter(|r| !r.is_empty()) {
            pairs.push(("RelayState", relay_state));
        }
        pairs.push(("SigAlg", algorithm.urn()));

        let signed_content = serialize_query(&pairs);
        let signature = self
            .config
            .signing
            .sign(signed_content.as_bytes(), algorithm)?;
        let signature_b64 = STANDARD.encode(signature);
        pairs.push(("Signature", &signature_b64));

        let location = append_query_string(destination, &serialize_query(&pairs));
        Ok(SloResponse::Redirect { location })
    }
}

/// URL-encoded serialization of query parameters, in the given order.
fn serialize_query(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn append_query_string(destination: &str, query: &str) -> String {
    let separator = if destination.contains('?') { '&' } else { '?' };
    format!("{destination}{separator}{query}")
}
