//! Durable state for an in-flight logout transaction

use serde::{Deserialize, Serialize};

/// Echo data from an inbound SP-initiated LogoutRequest, kept so the final
/// LogoutResponse can answer the originator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEcho {
    /// ID of the inbound LogoutRequest (echoed as `InResponseTo`)
    pub id: String,
    /// Where the final LogoutResponse goes
    pub service_provider_logout_url: String,
}

/// State spanning a whole multi-participant logout transaction.
///
/// Created at flow start, read and updated across every dispatch, destroyed
/// exactly once at finalize.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalTransaction {
    /// Absent on the IdP-initiated path: there is nothing to answer
    pub parsed_request: Option<RequestEcho>,
    /// RelayState of the inbound request, echoed on the final response
    pub relay_state: Option<String>,
    /// Whether any participant failed to log out. Monotonic: set once,
    /// never cleared within the transaction's lifetime.
    #[serde(default)]
    pub failed: bool,
}

impl GlobalTransaction {
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }
}

/// State for one outstanding LogoutRequest, keyed by the opaque token sent
/// to the participant as RelayState. Consumed exactly once when that
/// participant's LogoutResponse arrives. At most one is live per
/// transaction: dispatch is strictly sequential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchState {
    pub transaction_id: String,
    pub session_index: String,
    pub issuer: Option<String>,
    pub name_id: String,
}

/// Everything the transaction store holds, as one tagged union so both
/// record kinds share a single keyed namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredState {
    Transaction(GlobalTransaction),
    Dispatch(DispatchState),
}

impl StoredState {
    #[must_use]
    pub fn into_transaction(self) -> Option<GlobalTransaction> {
        match self {
            StoredState::Transaction(t) => Some(t),
            StoredState::Dispatch(_) => None,
        }
    }

    #[must_use]
    pub fn into_dispatch(self) -> Option<DispatchState> {
        match self {
            StoredState::Dispatch(d) => Some(d),
            StoredState::Transaction(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_failed_is_monotonic() {
        let mut tx = GlobalTransaction::default();
        assert!(!tx.failed);
        tx.mark_failed();
        tx.mark_failed();
        assert!(tx.failed);
    }

    #[test]
    fn test_stored_state_serde_round_trip() {
        let state = StoredState::Dispatch(DispatchState {
            transaction_id: "tx1".to_string(),
            session_index: "i1".to_string(),
            issuer: Some("sp1".to_string()),
            name_id: "u1".to_string(),
        });
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"kind\":\"dispatch\""));
        let back: StoredState = serde_json::from_str(&json).unwrap();
        let dispatch = back.into_dispatch().unwrap();
        assert_eq!(dispatch.transaction_id, "tx1");
    }

    #[test]
    fn test_failed_flag_defaults_for_older_records() {
        let json = r#"{"kind":"transaction","parsed_request":null,"relay_state":null}"#;
        let state: StoredState = serde_json::from_str(json).unwrap();
        assert!(!state.into_transaction().unwrap().failed);
    }
}
