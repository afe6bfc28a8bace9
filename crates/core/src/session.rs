//! Session store.
//!
//! The session is owned by one [`SessionStore`] created at startup. It subscribes once to the
//! auth provider and republishes every change on a `tokio::sync::watch` channel. Components
//! receive a [`SessionHandle`] and only ever read from it; the provider's notification channel
//! is the single writer.
//!
//! ```text
//! AuthProvider ──(mpsc)──> forwarder task ──(watch)──> SessionHandle (guard, upload, listing)
//! ```

use crate::ports::AuthProvider;
use healthrec_types::{EmailAddress, NonEmptyText};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The authenticated user's stable reference.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Identity {
    pub id: NonEmptyText,
    #[serde(default)]
    pub display_name: Option<String>,
    pub email: EmailAddress,
}

impl Identity {
    /// Display name, falling back to the email address.
    pub fn label(&self) -> &str {
        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => self.email.as_str(),
        }
    }
}

/// Snapshot of the session: who is signed in, and whether the provider has reported yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    identity: Option<Identity>,
    loading: bool,
}

/// The three states the rest of the client distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState<'a> {
    Loading,
    Unauthenticated,
    Authenticated(&'a Identity),
}

impl Session {
    /// The state at process start, before the provider has reported.
    pub fn loading() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }

    /// A settled session as reported by the provider.
    pub fn settled(identity: Option<Identity>) -> Self {
        Self {
            identity,
            loading: false,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn state(&self) -> SessionState<'_> {
        match (&self.identity, self.loading) {
            (_, true) => SessionState::Loading,
            (None, false) => SessionState::Unauthenticated,
            (Some(identity), false) => SessionState::Authenticated(identity),
        }
    }
}

/// Read side of the session, cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<Session>,
}

impl SessionHandle {
    /// Returns the latest session snapshot.
    pub fn current(&self) -> Session {
        self.rx.borrow().clone()
    }

    /// Waits for the next change and returns it. Returns `None` once the store has shut down.
    pub async fn changed(&mut self) -> Option<Session> {
        match self.rx.changed().await {
            Ok(()) => Some(self.rx.borrow_and_update().clone()),
            Err(_) => None,
        }
    }

    /// Waits until the provider has reported at least once.
    ///
    /// If the store shuts down first, the last known snapshot is returned.
    pub async fn wait_until_loaded(&mut self) -> Session {
        if let Ok(session) = self.rx.wait_for(|s| !s.loading).await {
            return session.clone();
        }
        self.rx.borrow().clone()
    }
}

/// Owner of the single provider subscription.
///
/// Created once at startup with [`SessionStore::start`] and torn down with
/// [`SessionStore::shutdown`]. Dropping the store also ends the subscription.
#[derive(Debug)]
pub struct SessionStore {
    rx: watch::Receiver<Session>,
    forwarder: Option<JoinHandle<()>>,
}

impl SessionStore {
    /// Subscribes to `provider` and starts republishing its notifications.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(provider: &dyn AuthProvider) -> Self {
        let mut notifications = provider.subscribe();
        let (tx, rx) = watch::channel(Session::loading());

        let forwarder = tokio::spawn(async move {
            while let Some(identity) = notifications.recv().await {
                let next = Session::settled(identity);
                let changed = tx.send_if_modified(|current| {
                    if *current == next {
                        return false;
                    }
                    *current = next.clone();
                    true
                });
                if changed {
                    match next.identity() {
                        Some(identity) => {
                            tracing::info!(user = %identity.id, "session signed in")
                        }
                        None => tracing::info!("session signed out"),
                    }
                }
            }
            tracing::debug!("auth provider closed the session channel");
        });

        Self {
            rx,
            forwarder: Some(forwarder),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            rx: self.rx.clone(),
        }
    }

    /// Ends the provider subscription. Calling it again does nothing.
    pub async fn shutdown(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
            // A cancelled join is the expected outcome here.
            let _ = forwarder.await;
            tracing::debug!("session store shut down");
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}
