//! HTTP handlers for the Single Logout endpoint

use crate::config::SloConfig;
use crate::services::codec::{SloParams, SloRequest};
use crate::services::orchestrator::{IdpSessionCleaner, LogoutOrchestrator};
use crate::session::participants::SessionParticipants;
use crate::session::store::TransactionStore;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Extension, Form,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared handle to the browser principal's participant registry. The host
/// application's session layer installs this as a request extension.
pub type SharedSessionParticipants = Arc<Mutex<SessionParticipants>>;

/// Application state for SLO handlers
#[derive(Clone)]
pub struct SloState {
    pub config: Arc<SloConfig>,
    pub store: Arc<dyn TransactionStore>,
    pub cleaner: Arc<dyn IdpSessionCleaner>,
}

/// Single Logout over the HTTP-Redirect binding
///
/// GET /saml/slo
#[utoipa::path(
    get,
    path = "/saml/slo",
    params(SloParams),
    responses(
        (status = 200, description = "Auto-submit form or acknowledgment"),
        (status = 302, description = "Redirect carrying the next message"),
        (status = 400, description = "Invalid or unauthenticated message"),
    ),
    tag = "SAML SLO"
)]
pub async fn slo_redirect(
    State(state): State<SloState>,
    Extension(participants): Extension<SharedSessionParticipants>,
    Query(params): Query<SloParams>,
) -> Response {
    run(&state, participants, SloRequest::from_query(params)).await
}

/// Single Logout over the HTTP-POST binding
///
/// POST /saml/slo
#[utoipa::path(
    post,
    path = "/saml/slo",
    request_body = SloParams,
    responses(
        (status = 200, description = "Auto-submit form or acknowledgment"),
        (status = 302, description = "Redirect carrying the next message"),
        (status = 400, description = "Invalid or unauthenticated message"),
    ),
    tag = "SAML SLO"
)]
pub async fn slo_post(
    State(state): State<SloState>,
    Extension(participants): Extension<SharedSessionParticipants>,
    Form(params): Form<SloParams>,
) -> Response {
    run(&state, participants, SloRequest::from_body(params)).await
}

async fn run(
    state: &SloState,
    participants: SharedSessionParticipants,
    request: SloRequest,
) -> Response {
    let orchestrator = LogoutOrchestrator::new(
        state.config.clone(),
        participants,
        state.store.clone(),
        state.cleaner.clone(),
    );

    match orchestrator.handle(&request).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Single logout exchange failed");
            e.into_response()
        }
    }
}
