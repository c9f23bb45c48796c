//! SAML 2.0 Single Logout engine for an Identity Provider
//!
//! This crate orchestrates logout across the Service Providers sharing a
//! browser session:
//! - sequential LogoutRequest dispatch to each session participant, with
//!   partial-failure tracking across the multi-party exchange
//! - inbound message authentication (enveloped XML-DSig and detached
//!   query string signatures) over HTTP-POST and HTTP-Redirect bindings,
//!   with optional raw-deflate encoding
//! - an ordered session-participant registry and a keyed transaction store
//!   for the state spanning the exchange

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod saml;
pub mod services;
pub mod session;

#[cfg(test)]
pub(crate) mod test_keys;

pub use config::SloConfig;
pub use error::{SignatureError, SloError, SloResult, StoreError};
pub use handlers::slo::{slo_post, slo_redirect, SharedSessionParticipants, SloState};
pub use router::{create_slo_state, slo_router};
pub use saml::{Binding, MessageKind, SignatureAlgorithm, SigningCredentials};
pub use services::codec::{BindingCodec, SloParams, SloRequest, SloResponse};
pub use services::orchestrator::{
    IdpSessionCleaner, LogoutErrorDescriptor, LogoutOrchestrator, NoopSessionCleaner,
};
pub use services::signature_validator::{InboundCredentials, SignatureValidator};
pub use session::{
    DispatchState, GlobalTransaction, InMemoryTransactionStore, RequestEcho, SessionParticipant,
    SessionParticipants, StoredState, TransactionStore,
};
