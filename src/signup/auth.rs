//! Process-wide authentication context. One writer (the flow that finishes a
//! signup, or the federated redirect handler) and any number of readers. All
//! clones share the same channel, so every reader observes the same session.
//! Only the session itself is kept in memory; nothing is persisted.

use super::types::AuthSession;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[derive(Clone, Debug, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticated(AuthSession),
}

impl AuthState {
    #[must_use]
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(session) => Some(session),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthContext {
    state: Arc<watch::Sender<AuthState>>,
}

impl AuthContext {
    /// Starts anonymous.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(AuthState::Anonymous);
        Self {
            state: Arc::new(sender),
        }
    }

    /// Establishes the session, replacing any previous one.
    pub fn login(&self, session: AuthSession) {
        info!(user_id = %session.user.id, "session established");
        self.state.send_replace(AuthState::Authenticated(session));
    }

    pub fn logout(&self) {
        if self.is_authenticated() {
            info!("session cleared");
        }
        self.state.send_replace(AuthState::Anonymous);
    }

    #[must_use]
    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn session(&self) -> Option<AuthSession> {
        self.state.borrow().session().cloned()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.borrow(), AuthState::Authenticated(_))
    }

    /// Receiver notified on every login and logout.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::new()
    }
}
