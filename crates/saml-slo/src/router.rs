//! SLO route definitions

use crate::config::SloConfig;
use crate::handlers::slo::SloState;
use crate::handlers::{slo_post, slo_redirect};
use crate::services::orchestrator::IdpSessionCleaner;
use crate::session::store::TransactionStore;
use axum::{
    routing::get,
    Router,
};
use std::sync::Arc;

/// Create the Single Logout router.
///
/// The host application must install a [`SharedSessionParticipants`]
/// extension per request (its session layer knows which SPs share the
/// browser session).
///
/// [`SharedSessionParticipants`]: crate::handlers::SharedSessionParticipants
pub fn slo_router(state: SloState) -> Router {
    Router::new()
        .route("/saml/slo", get(slo_redirect).post(slo_post))
        .with_state(state)
}

/// Create SLO state from configuration and collaborators.
#[must_use]
pub fn create_slo_state(
    config: SloConfig,
    store: Arc<dyn TransactionStore>,
    cleaner: Arc<dyn IdpSessionCleaner>,
) -> SloState {
    SloState {
        config: Arc::new(config),
        store,
        cleaner,
    }
}
