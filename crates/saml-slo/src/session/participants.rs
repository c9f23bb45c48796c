//! Session participant registry
//!
//! Tracks which Service Providers share the browser session being logged
//! out, in insertion order. The orchestrator drains this collection one
//! participant at a time during a logout transaction.

use crate::saml::Binding;
use serde::{Deserialize, Serialize};

/// An active session between the browser principal and one Service Provider.
///
/// Created at session establishment time by the host application; consumed
/// by the logout orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionParticipant {
    /// SP entity ID (issuer). Optional: older integrations may not record it.
    pub service_provider_id: Option<String>,
    pub session_index: String,
    pub name_id: String,
    pub name_id_format: Option<String>,
    /// Where this SP receives LogoutRequests
    pub service_provider_logout_url: String,
    /// Binding to use for this SP, falling back to the configured default
    pub service_provider_logout_binding: Option<Binding>,
    /// SP signing certificate (PEM or bare base64). Without one, this SP's
    /// messages are accepted unsigned.
    pub cert: Option<String>,
    /// SHA-1 certificate thumbprint, uppercase hex
    pub thumbprint: Option<String>,
}

/// Ordered collection of the active SP sessions for one browser principal.
///
/// Not internally synchronized; the orchestrator serializes access per
/// transaction.
#[derive(Debug, Default)]
pub struct SessionParticipants {
    participants: Vec<SessionParticipant>,
}

/// Match by (SessionIndex, NameID); issuer is an additional filter only when
/// both the query and the stored participant carry one.
fn matches(
    participant: &SessionParticipant,
    issuer: Option<&str>,
    session_index: &str,
    name_id: &str,
) -> bool {
    if let (Some(stored), Some(queried)) = (participant.service_provider_id.as_deref(), issuer) {
        if stored != queried {
            tracing::debug!(
                service_provider_id = %stored,
                issuer = %queried,
                "Service provider id does not match issuer"
            );
            return false;
        }
    }

    participant.session_index == session_index && participant.name_id == name_id
}

impl SessionParticipants {
    #[must_use]
    pub fn new(participants: Vec<SessionParticipant>) -> Self {
        Self { participants }
    }

    /// First participant (insertion order) matching the given identity.
    #[must_use]
    pub fn get(
        &self,
        issuer: Option<&str>,
        session_index: &str,
        name_id: &str,
    ) -> Option<&SessionParticipant> {
        self.participants
            .iter()
            .find(|p| matches(p, issuer, session_index, name_id))
    }

    /// Whether any participants remain.
    #[must_use]
    pub fn has_elements(&self) -> bool {
        !self.participants.is_empty()
    }

    /// Earliest remaining participant, without removing it.
    #[must_use]
    pub fn get_first(&self) -> Option<&SessionParticipant> {
        self.participants.first()
    }

    /// Remove and return the first participant matching the given identity.
    ///
    /// A missing or empty issuer is a no-op: removal without an issuer would
    /// be ambiguous, and this guards against mass deletion.
    pub fn remove(
        &mut self,
        issuer: Option<&str>,
        session_index: &str,
        name_id: &str,
    ) -> Option<SessionParticipant> {
        let issuer = issuer.filter(|i| !i.is_empty())?;
        if self.participants.is_empty() {
            return None;
        }

        let position = self
            .participants
            .iter()
            .position(|p| matches(p, Some(issuer), session_index, name_id))?;

        Some(self.participants.remove(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(sp: Option<&str>, index: &str, name: &str) -> SessionParticipant {
        SessionParticipant {
            service_provider_id: sp.map(String::from),
            session_index: index.to_string(),
            name_id: name.to_string(),
            name_id_format: None,
            service_provider_logout_url: "https://sp.example.com/logout".to_string(),
            service_provider_logout_binding: None,
            cert: None,
            thumbprint: None,
        }
    }

    #[test]
    fn test_get_matches_on_index_and_name_id() {
        let registry = SessionParticipants::new(vec![participant(Some("sp1"), "i1", "u1")]);

        assert!(registry.get(Some("sp1"), "i1", "u1").is_some());
        assert!(registry.get(Some("sp2"), "i1", "u1").is_none());
        // Issuer absent from the query: (SessionIndex, NameID) is enough
        assert!(registry.get(None, "i1", "u1").is_some());
        assert!(registry.get(Some("sp1"), "i2", "u1").is_none());
        assert!(registry.get(Some("sp1"), "i1", "u2").is_none());
    }

    #[test]
    fn test_get_ignores_issuer_when_participant_has_none() {
        let registry = SessionParticipants::new(vec![participant(None, "i1", "u1")]);
        assert!(registry.get(Some("anything"), "i1", "u1").is_some());
    }

    #[test]
    fn test_get_returns_first_match_in_insertion_order() {
        let mut first = participant(Some("sp1"), "i1", "u1");
        first.service_provider_logout_url = "https://first.example.com".to_string();
        let mut second = participant(Some("sp1"), "i1", "u1");
        second.service_provider_logout_url = "https://second.example.com".to_string();
        let registry = SessionParticipants::new(vec![first, second]);

        let found = registry.get(Some("sp1"), "i1", "u1").unwrap();
        assert_eq!(found.service_provider_logout_url, "https://first.example.com");
    }

    #[test]
    fn test_remove_without_issuer_is_noop() {
        let mut registry = SessionParticipants::new(vec![participant(Some("sp1"), "i1", "u1")]);

        assert!(registry.remove(None, "i1", "u1").is_none());
        assert!(registry.remove(Some(""), "i1", "u1").is_none());
        assert!(registry.has_elements());
    }

    #[test]
    fn test_remove_by_identity() {
        let mut registry = SessionParticipants::new(vec![participant(Some("sp1"), "i1", "u1")]);

        let removed = registry.remove(Some("sp1"), "i1", "u1").unwrap();
        assert_eq!(removed.session_index, "i1");
        assert!(!registry.has_elements());
    }

    #[test]
    fn test_remove_on_empty_registry() {
        let mut registry = SessionParticipants::default();
        assert!(registry.remove(Some("sp1"), "i1", "u1").is_none());
    }

    #[test]
    fn test_get_first_is_non_destructive() {
        let registry = SessionParticipants::new(vec![
            participant(Some("sp1"), "i1", "u1"),
            participant(Some("sp2"), "i2", "u1"),
        ]);

        let first = registry.get_first().unwrap();
        assert_eq!(first.service_provider_id.as_deref(), Some("sp1"));
        assert!(registry.get_first().is_some());
        assert!(registry.has_elements());
    }
}
