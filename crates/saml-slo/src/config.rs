//! Single Logout engine configuration
//!
//! One value per orchestrator instance; there is no process-wide state.

use crate::saml::{Binding, SignatureAlgorithm, SigningCredentials};
use crate::services::signature_validator::InboundCredentials;

/// Configuration for one logout engine instance.
#[derive(Debug)]
pub struct SloConfig {
    /// IdP entity ID, used as Issuer on every outbound message
    pub issuer: String,
    /// Default reply destination when the originating participant is not in
    /// the registry
    pub destination: Option<String>,
    /// Default outbound binding; participants may override per SP
    pub protocol_binding: Binding,
    /// Raw-deflate Redirect-binding messages (detached signatures)
    pub deflate: bool,
    /// Algorithm for outbound signatures
    pub signature_algorithm: SignatureAlgorithm,
    /// IdP signing key material
    pub signing: SigningCredentials,
    /// Static credentials for inbound validation. When set, every inbound
    /// message must be signed; when unset, credentials are resolved per
    /// message from the participant registry.
    pub inbound_credentials: Option<InboundCredentials>,
    /// Optional StatusMessage on the final LogoutResponse
    pub status_message: Option<String>,
    /// CSP nonce applied to the auto-submit form's script
    pub form_nonce: Option<String>,
}

impl SloConfig {
    /// Configuration with required fields; everything else takes the
    /// protocol defaults (HTTP-POST, no deflate, RSA-SHA256).
    #[must_use]
    pub fn new(issuer: impl Into<String>, signing: SigningCredentials) -> Self {
        Self {
            issuer: issuer.into(),
            destination: None,
            protocol_binding: Binding::HttpPost,
            deflate: false,
            signature_algorithm: SignatureAlgorithm::RsaSha256,
            signing,
            inbound_credentials: None,
            status_message: None,
            form_nonce: None,
        }
    }
}
