//! Business logic services for Single Logout

pub mod codec;
pub mod document_builder;
pub mod message_parser;
pub mod orchestrator;
pub mod signature_validator;

pub use codec::{BindingCodec, SloParams, SloRequest, SloResponse};
pub use orchestrator::{
    IdpSessionCleaner, LogoutErrorDescriptor, LogoutOrchestrator, NoopSessionCleaner,
};
pub use signature_validator::{InboundCredentials, SignatureValidator};
