//! Per-session client identity and consent.
//!
//! The identity is created once per browser session and persisted in the
//! external key-value store. Consent gates every camera and channel resource;
//! observers subscribe to a `watch` channel so that a revocation reaches the
//! mounted page as soon as it is committed.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::traits::{ClientRegistration, KeyValueStore, SessionApi};

/// Store key holding the client id.
pub const CLIENT_ID_KEY: &str = "clientId";
/// Store key holding the consent flag (`"true"` / `"false"`).
pub const CONSENT_KEY: &str = "consentAccepted";

/// Stable, collision-resistant client identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    /// Random 128-bit identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps a persisted identifier, rejecting blank values.
    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tri-state consent flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Consent {
    #[default]
    Unset,
    Accepted,
    Declined,
}

impl Consent {
    pub fn is_accepted(self) -> bool {
        matches!(self, Consent::Accepted)
    }

    pub fn as_flag(self) -> Option<bool> {
        match self {
            Consent::Unset => None,
            Consent::Accepted => Some(true),
            Consent::Declined => Some(false),
        }
    }

    fn from_stored(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("true") => Consent::Accepted,
            Some("false") => Consent::Declined,
            _ => Consent::Unset,
        }
    }
}

/// Snapshot of the session as seen by observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub client_id: ClientId,
    pub consent: Consent,
}

impl Session {
    pub fn registration(&self) -> ClientRegistration {
        ClientRegistration {
            client_id: self.client_id.to_string(),
            consent_accepted: self.consent.as_flag(),
        }
    }
}

/// Outcome of a consent operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsentChange {
    Granted,
    Declined,
    Revoked,
    Reset,
    Unchanged,
}

/// Issues and persists the client identity and consent flag.
pub struct SessionIdentity {
    store: Arc<dyn KeyValueStore>,
    api: Arc<dyn SessionApi>,
    session_tx: watch::Sender<Session>,
}

impl SessionIdentity {
    /// Load the persisted identity, generating and persisting a new one if absent.
    pub fn activate(store: Arc<dyn KeyValueStore>, api: Arc<dyn SessionApi>) -> Self {
        let client_id = match store.get(CLIENT_ID_KEY).and_then(ClientId::parse) {
            Some(id) => {
                debug!(client_id = %id, "Reusing persisted client id");
                id
            }
            None => {
                let id = ClientId::generate();
                if let Err(e) = store.set(CLIENT_ID_KEY, id.as_str()) {
                    warn!("Failed to persist client id: {}", e);
                }
                info!(client_id = %id, "Generated new client id");
                id
            }
        };

        let consent = Consent::from_stored(store.get(CONSENT_KEY).as_deref());
        let (session_tx, _) = watch::channel(Session { client_id, consent });

        Self {
            store,
            api,
            session_tx,
        }
    }

    pub fn session(&self) -> Session {
        self.session_tx.borrow().clone()
    }

    pub fn client_id(&self) -> ClientId {
        self.session_tx.borrow().client_id.clone()
    }

    pub fn consent(&self) -> Consent {
        self.session_tx.borrow().consent
    }

    /// Receiver that observes every committed consent change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session_tx.subscribe()
    }

    /// Notify the server of `{clientId, consentAccepted}`.
    ///
    /// Returns `false` when the notification failed; the failure is logged and
    /// otherwise ignored.
    pub async fn register(&self) -> bool {
        let registration = self.session().registration();
        match self.api.register_client(&registration).await {
            Ok(()) => {
                debug!(client_id = %registration.client_id, "Client registered");
                true
            }
            Err(e) => {
                warn!("Client registration failed: {}", e);
                false
            }
        }
    }

    /// Record the answer to the consent prompt. Only effective while unset.
    pub async fn set_consent(&self, accepted: bool) -> ConsentChange {
        if self.consent() != Consent::Unset {
            debug!("Consent already answered; ignoring");
            return ConsentChange::Unchanged;
        }

        if accepted {
            self.commit(Consent::Accepted).await;
            ConsentChange::Granted
        } else {
            self.commit(Consent::Declined).await;
            ConsentChange::Declined
        }
    }

    /// Withdraw previously granted consent.
    pub async fn revoke_consent(&self) -> ConsentChange {
        if self.consent() != Consent::Accepted {
            return ConsentChange::Unchanged;
        }
        self.commit(Consent::Declined).await;
        ConsentChange::Revoked
    }

    /// Return to the unanswered state so the prompt can be shown again.
    pub async fn reset_consent(&self) -> ConsentChange {
        if self.consent() == Consent::Unset {
            return ConsentChange::Unchanged;
        }
        self.store.remove(CONSENT_KEY);
        self.session_tx.send_modify(|session| session.consent = Consent::Unset);
        info!("Consent reset");
        self.notify_consent().await;
        ConsentChange::Reset
    }

    async fn commit(&self, consent: Consent) {
        let flag = if consent.is_accepted() { "true" } else { "false" };
        if let Err(e) = self.store.set(CONSENT_KEY, flag) {
            warn!("Failed to persist consent: {}", e);
        }
        self.session_tx.send_modify(|session| session.consent = consent);
        info!(?consent, "Consent updated");
        self.notify_consent().await;
    }

    async fn notify_consent(&self) {
        let registration = self.session().registration();
        if let Err(e) = self.api.client_consent(&registration).await {
            warn!("Consent notification failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MemoryStore, MockSessionApi};

    fn identity(store: &Arc<MemoryStore>, api: &Arc<MockSessionApi>) -> SessionIdentity {
        SessionIdentity::activate(store.clone(), api.clone())
    }

    #[test]
    fn generates_and_persists_client_id_once() {
        let store = Arc::new(MemoryStore::new());
        let api = Arc::new(MockSessionApi::new());

        let first = identity(&store, &api).client_id();
        assert_eq!(store.get(CLIENT_ID_KEY).as_deref(), Some(first.as_str()));

        let second = identity(&store, &api).client_id();
        assert_eq!(first, second);
    }

    #[test]
    fn restores_persisted_consent() {
        let store = Arc::new(MemoryStore::new());
        store.set(CONSENT_KEY, "true").unwrap();
        let api = Arc::new(MockSessionApi::new());

        assert_eq!(identity(&store, &api).consent(), Consent::Accepted);
    }

    #[tokio::test]
    async fn consent_is_answered_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let api = Arc::new(MockSessionApi::new());
        let identity = identity(&store, &api);

        assert_eq!(identity.set_consent(true).await, ConsentChange::Granted);
        assert_eq!(identity.set_consent(false).await, ConsentChange::Unchanged);
        assert_eq!(identity.consent(), Consent::Accepted);
        assert_eq!(store.get(CONSENT_KEY).as_deref(), Some("true"));
        assert_eq!(api.consent_calls().len(), 1);
    }

    #[tokio::test]
    async fn revocation_is_observed_by_subscribers() {
        let store = Arc::new(MemoryStore::new());
        let api = Arc::new(MockSessionApi::new());
        let identity = identity(&store, &api);
        let mut rx = identity.subscribe();

        identity.set_consent(true).await;
        assert_eq!(identity.revoke_consent().await, ConsentChange::Revoked);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().consent, Consent::Declined);

        // Revoking twice is a no-op.
        assert_eq!(identity.revoke_consent().await, ConsentChange::Unchanged);
    }

    #[tokio::test]
    async fn reset_allows_answering_again() {
        let store = Arc::new(MemoryStore::new());
        let api = Arc::new(MockSessionApi::new());
        let identity = identity(&store, &api);

        identity.set_consent(false).await;
        assert_eq!(identity.reset_consent().await, ConsentChange::Reset);
        assert!(store.get(CONSENT_KEY).is_none());
        assert_eq!(identity.set_consent(true).await, ConsentChange::Granted);
    }

    #[tokio::test]
    async fn registration_failure_is_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        let api = Arc::new(MockSessionApi::failing());
        let identity = identity(&store, &api);

        assert!(!identity.register().await);
        assert_eq!(identity.set_consent(true).await, ConsentChange::Granted);
        assert_eq!(identity.consent(), Consent::Accepted);
    }

    #[tokio::test]
    async fn registration_carries_tri_state_consent() {
        let store = Arc::new(MemoryStore::new());
        let api = Arc::new(MockSessionApi::new());
        let identity = identity(&store, &api);

        assert!(identity.register().await);
        identity.set_consent(true).await;
        assert!(identity.register().await);

        let calls = api.register_calls();
        assert_eq!(calls[0].consent_accepted, None);
        assert_eq!(calls[1].consent_accepted, Some(true));
        assert_eq!(calls[0].client_id, identity.client_id().to_string());
    }
}
