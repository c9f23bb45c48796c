//! Single Logout orchestration
//!
//! Drives the multi-party logout sequence: decides the entry flow from the
//! inbound parameters, dispatches one LogoutRequest at a time to the
//! remaining session participants, consumes their LogoutResponses, tracks
//! partial-failure status, and finalizes by answering the originator (or
//! acknowledging, when the IdP started the flow itself).
//!
//! Every HTTP exchange performs exactly one transition. Distinct
//! transactions are isolated through key-scoped store access; within a
//! transaction the steps are strictly sequential, so at most one dispatch
//! token is outstanding at any time.

use crate::config::SloConfig;
use crate::error::{SloError, SloResult, StoreError};
use crate::saml::{self, MessageKind};
use crate::services::codec::{BindingCodec, SloRequest, SloResponse};
use crate::services::document_builder::{
    self, LogoutRequestFields, LogoutResponseFields,
};
use crate::services::message_parser;
use crate::services::signature_validator::InboundCredentials;
use crate::session::participants::SessionParticipants;
use crate::session::store::TransactionStore;
use crate::session::types::{DispatchState, GlobalTransaction, RequestEcho, StoredState};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Clears the IdP's own session for the browser principal at finalize.
///
/// Best effort: a failure downgrades the outcome to partial logout but
/// never aborts finalization.
#[async_trait]
pub trait IdpSessionCleaner: Send + Sync {
    async fn clear_session(&self) -> SloResult<()>;
}

/// Cleaner that does nothing, for hosts that clear their session elsewhere.
#[derive(Debug, Default)]
pub struct NoopSessionCleaner;

#[async_trait]
impl IdpSessionCleaner for NoopSessionCleaner {
    async fn clear_session(&self) -> SloResult<()> {
        Ok(())
    }
}

/// Status and description for an explicit logout error response.
#[derive(Debug, Default)]
pub struct LogoutErrorDescriptor {
    /// Second-level status URN; defaults to `Responder`
    pub code: Option<String>,
    pub description: Option<String>,
    pub in_response_to: Option<String>,
    pub relay_state: Option<String>,
}

/// Single Logout state machine for one browser principal.
pub struct LogoutOrchestrator {
    config: Arc<SloConfig>,
    codec: BindingCodec,
    participants: Arc<Mutex<SessionParticipants>>,
    store: Arc<dyn TransactionStore>,
    cleaner: Arc<dyn IdpSessionCleaner>,
}

impl LogoutOrchestrator {
    #[must_use]
    pub fn new(
        config: Arc<SloConfig>,
        participants: Arc<Mutex<SessionParticipants>>,
        store: Arc<dyn TransactionStore>,
        cleaner: Arc<dyn IdpSessionCleaner>,
    ) -> Self {
        let codec = BindingCodec::new(config.clone());
        Self {
            config,
            codec,
            participants,
            store,
            cleaner,
        }
    }

    /// Perform one state transition for an inbound exchange.
    ///
    /// An inbound LogoutRequest starts an SP-initiated flow; an inbound
    /// LogoutResponse continues a flow already in progress; neither starts
    /// an IdP-initiated flow.
    pub async fn handle(&self, request: &SloRequest) -> SloResult<SloResponse> {
        if request.saml_request().is_some() {
            self.handle_sp_initiated(request).await
        } else if request.saml_response().is_some() {
            self.handle_continuation(request).await
        } else {
            self.handle_idp_initiated().await
        }
    }

    /// IdP-initiated flow: nothing inbound to validate or answer.
    async fn handle_idp_initiated(&self) -> SloResult<SloResponse> {
        let transaction_id = self
            .store
            .save(StoredState::Transaction(GlobalTransaction::default()))
            .await?;

        tracing::info!(transaction_id = %transaction_id, "IdP-initiated logout started");

        let participants = self.participants.lock().await;
        self.dispatch_next(&participants, &transaction_id).await
    }

    /// SP-initiated flow: authenticate the inbound LogoutRequest, record who
    /// to answer, remove the originator, start dispatching.
    async fn handle_sp_initiated(&self, request: &SloRequest) -> SloResult<SloResponse> {
        let encoded = request.saml_request().unwrap_or_default();
        let xml = self.codec.decode(encoded)?;
        let parsed = message_parser::parse_logout_request(&xml)?;

        let mut participants = self.participants.lock().await;

        {
            // Resolve the originator's certificate for signature validation.
            // An unknown participant is not fatal here: it only means there
            // is no credential to check against.
            let resolver = |issuer: Option<&str>,
                            session_index: Option<&str>,
                            name_id: Option<&str>|
             -> Option<InboundCredentials> {
                let participant = participants.get(
                    issuer,
                    session_index.unwrap_or_default(),
                    name_id.unwrap_or_default(),
                )?;
                let cert = participant.cert.clone()?;
                Some(InboundCredentials {
                    cert: Some(cert),
                    thumbprints: participant.thumbprint.iter().cloned().collect(),
                })
            };
            self.codec
                .authenticate_request(&xml, &parsed, request, Some(&resolver))?;
        }

        let issuer = parsed
            .issuer
            .as_deref()
            .filter(|i| !i.is_empty())
            .ok_or(SloError::MissingIssuer)?;
        let session_index = parsed.session_index.as_deref().unwrap_or_default();
        let name_id = parsed.name_id.as_deref().unwrap_or_default();

        let originator = participants.get(Some(issuer), session_index, name_id);
        if originator.is_none() && self.config.destination.is_none() {
            tracing::warn!(issuer = %issuer, "LogoutRequest from unknown participant and no default destination");
            return Err(SloError::UnknownParticipant);
        }

        let reply_url = originator
            .map(|p| p.service_provider_logout_url.clone())
            .or_else(|| self.config.destination.clone())
            .unwrap_or_default();

        let transaction = GlobalTransaction {
            parsed_request: Some(RequestEcho {
                id: parsed.id.clone(),
                service_provider_logout_url: reply_url,
            }),
            relay_state: request.relay_state().map(str::to_string),
            failed: false,
        };
        let transaction_id = self
            .store
            .save(StoredState::Transaction(transaction))
            .await?;

        // The originator never receives a LogoutRequest, only the final
        // LogoutResponse; its reply address is already recorded.
        participants.remove(Some(issuer), session_index, name_id);

        tracing::info!(
            transaction_id = %transaction_id,
            issuer = %issuer,
            request_id = %parsed.id,
            "SP-initiated logout started"
        );

        self.dispatch_next(&participants, &transaction_id).await
    }

    /// Continuation: one participant answered; consume its dispatch token,
    /// account for its status, and move to the next participant.
    async fn handle_continuation(&self, request: &SloRequest) -> SloResult<SloResponse> {
        let token = request.relay_state().ok_or(SloError::InvalidRelayState)?;

        let state = self
            .store
            .load(token, true)
            .await?
            .and_then(StoredState::into_dispatch)
            .ok_or(SloError::InvalidRelayState)?;

        let mut participants = self.participants.lock().await;
        let participant = participants
            .get(state.issuer.as_deref(), &state.session_index, &state.name_id)
            .cloned()
            .ok_or(SloError::UnknownParticipant)?;

        let encoded = request.saml_response().unwrap_or_default();
        let xml = self.codec.decode(encoded)?;
        let parsed = message_parser::parse_logout_response(&xml)?;

        let credentials = participant.cert.as_ref().map(|cert| InboundCredentials {
            cert: Some(cert.clone()),
            thumbprints: participant.thumbprint.iter().cloned().collect(),
        });
        self.codec
            .authenticate_response(&xml, &parsed, request, credentials.as_ref())?;

        let transaction_id = state.transaction_id.clone();

        if parsed.status.as_deref() == Some(saml::STATUS_SUCCESS) {
            tracing::info!(
                transaction_id = %transaction_id,
                issuer = ?state.issuer,
                "Participant logged out"
            );
        } else {
            // One participant failing must not keep the others from being
            // notified: record the failure and continue. No retry.
            tracing::warn!(
                transaction_id = %transaction_id,
                issuer = ?state.issuer,
                status = ?parsed.status,
                sub_code = ?parsed.sub_code,
                status_message = ?parsed.status_message,
                "Participant reported logout failure"
            );

            let mut transaction = self
                .store
                .load(&transaction_id, false)
                .await?
                .and_then(StoredState::into_transaction)
                .ok_or_else(|| StoreError::NotFound(transaction_id.clone()))?;
            transaction.mark_failed();
            self.store
                .update(&transaction_id, StoredState::Transaction(transaction))
                .await?;
        }

        // TODO: the responding participant is removed even when it reported
        // failure, and the final response still goes to the original
        // requester; which party should be answered when several logouts
        // fail is unresolved.
        participants.remove(state.issuer.as_deref(), &state.session_index, &state.name_id);

        self.dispatch_next(&participants, &transaction_id).await
    }

    /// DISPATCH: send a LogoutRequest to the earliest remaining participant,
    /// or finalize when none remain. FIFO keeps the ordering deterministic
    /// and bounds outstanding signed requests to one.
    async fn dispatch_next(
        &self,
        participants: &SessionParticipants,
        transaction_id: &str,
    ) -> SloResult<SloResponse> {
        let Some(participant) = participants.get_first().cloned() else {
            tracing::debug!(transaction_id = %transaction_id, "No more session participants, finishing logout");
            return self.finalize(transaction_id).await;
        };

        let dispatch = DispatchState {
            transaction_id: transaction_id.to_string(),
            session_index: participant.session_index.clone(),
            issuer: participant.service_provider_id.clone(),
            name_id: participant.name_id.clone(),
        };
        let token = self.store.save(StoredState::Dispatch(dispatch)).await?;

        let xml = document_builder::build_logout_request(&LogoutRequestFields {
            id: &saml::generate_request_id(),
            issue_instant: &saml::generate_instant(),
            issuer: &self.config.issuer,
            destination: &participant.service_provider_logout_url,
            name_id: &participant.name_id,
            name_id_format: participant.name_id_format.as_deref(),
            session_index: &participant.session_index,
        });

        let binding = participant
            .service_provider_logout_binding
            .unwrap_or(self.config.protocol_binding);

        tracing::info!(
            transaction_id = %transaction_id,
            service_provider_id = ?participant.service_provider_id,
            destination = %participant.service_provider_logout_url,
            binding = %binding.as_urn(),
            "Dispatching LogoutRequest"
        );

        self.codec.encode(
            MessageKind::LogoutRequest,
            &xml,
            &participant.service_provider_logout_url,
            binding,
            Some(&token),
        )
    }

    /// FINALIZE: destroy the transaction, clear the local session, and
    /// answer the originator (or acknowledge when the IdP started the flow).
    async fn finalize(&self, transaction_id: &str) -> SloResult<SloResponse> {
        let transaction = self
            .store
            .load(transaction_id, true)
            .await?
            .and_then(StoredState::into_transaction);

        let mut partial_logout = transaction.as_ref().is_some_and(|t| t.failed);

        if let Err(e) = self.cleaner.clear_session().await {
            tracing::warn!(
                transaction_id = %transaction_id,
                error = %e,
                "Failed to clear IdP session, replying with partial logout"
            );
            partial_logout = true;
        }

        let echo = transaction.as_ref().and_then(|t| t.parsed_request.clone());
        let Some(echo) = echo else {
            // IdP-initiated: nothing to answer
            tracing::info!(transaction_id = %transaction_id, "Logout complete, nothing to answer");
            return Ok(SloResponse::Ack);
        };

        let destination = if echo.service_provider_logout_url.is_empty() {
            self.config
                .destination
                .clone()
                .ok_or(SloError::MissingDestination)?
        } else {
            echo.service_provider_logout_url.clone()
        };

        let status_code = if partial_logout {
            saml::STATUS_PARTIAL_LOGOUT
        } else {
            saml::STATUS_SUCCESS
        };

        let xml = document_builder::build_logout_response(&LogoutResponseFields {
            id: &saml::generate_response_id(),
            issue_instant: &saml::generate_instant(),
            issuer: &self.config.issuer,
            destination: &destination,
            in_response_to: Some(&echo.id),
            status_code,
            status_message: self.config.status_message.as_deref(),
        });

        tracing::info!(
            transaction_id = %transaction_id,
            destination = %destination,
            status_code = %status_code,
            "Sending final LogoutResponse"
        );

        let relay_state = transaction.as_ref().and_then(|t| t.relay_state.as_deref());
        self.codec.encode(
            MessageKind::LogoutResponse,
            &xml,
            &destination,
            self.config.protocol_binding,
            relay_state,
        )
    }

    /// Answer an exchange with an explicit logout error, outside any
    /// transaction. The configured default destination is required: with no
    /// transaction there is no recorded reply address.
    pub fn send_logout_error(
        &self,
        request: &SloRequest,
        error: &LogoutErrorDescriptor,
    ) -> SloResult<SloResponse> {
        let destination = self
            .config
            .destination
            .as_deref()
            .ok_or(SloError::MissingDestination)?;

        let xml = document_builder::build_logout_response(&LogoutResponseFields {
            id: &saml::generate_response_id(),
            issue_instant: &saml::generate_instant(),
            issuer: &self.config.issuer,
            destination,
            in_response_to: error.in_response_to.as_deref(),
            status_code: error.code.as_deref().unwrap_or(saml::STATUS_RESPONDER),
            status_message: error.description.as_deref(),
        });

        let relay_state = error.relay_state.as_deref().or_else(|| request.relay_state());

        self.codec.encode(
            MessageKind::LogoutResponse,
            &xml,
            destination,
            self.config.protocol_binding,
            relay_state,
        )
    }
}
