//! Session store: the single owner of the authenticated identity.
//!
//! The store mirrors the identity provider's notification stream into a
//! [`SessionState`] and exposes the sign-up / sign-in / sign-out operations.
//! All mutations go through [`SessionStore::apply`], which drops transitions
//! that would not change the observable state, so a sign-in reported both by
//! the operation and by the provider's stream is seen once.

use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::Identity,
    error::{ProviderError, ProviderErrorCode},
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::error::{AuthenticationError, CredentialError};

/// What the identity provider currently reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderAuthState {
    /// Still restoring a persisted session.
    Initializing,
    Resolved(Option<Identity>),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_account(&self, email: &str, password: &str)
        -> Result<Identity, ProviderError>;
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, ProviderError>;
    /// Interactive federated sign-in. Fails with `PopupBlocked` when no
    /// interactive window can be opened.
    async fn sign_in_with_popup(&self) -> Result<Identity, ProviderError>;
    /// Starts a full-page redirect flow; completion is reported later through
    /// [`IdentityProvider::redirect_result`].
    async fn sign_in_with_redirect(&self) -> Result<(), ProviderError>;
    async fn redirect_result(&self) -> Result<Option<Identity>, ProviderError>;
    async fn sign_out(&self) -> Result<(), ProviderError>;
    fn subscribe_identity_changes(&self) -> watch::Receiver<ProviderAuthState>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    Authenticated(Identity),
    Unauthenticated,
}

impl SessionState {
    fn from_identity(identity: Option<Identity>) -> Self {
        match identity {
            Some(identity) => Self::Authenticated(identity),
            None => Self::Unauthenticated,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Authenticated(_) => "authenticated",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FederatedSignIn {
    SignedIn(Identity),
    /// The pop-up was blocked and a redirect flow has been started.
    Redirecting,
    /// Superseded by a concurrent attempt; nothing changed.
    Cancelled,
}

pub struct SessionStore {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Sender<SessionState>,
}

/// Handle on the store's provider subscription. Dropping it unsubscribes.
pub struct SessionSubscription {
    task: Option<JoinHandle<()>>,
}

impl SessionSubscription {
    pub fn unsubscribe(mut self) {
        self.abort();
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("session store unsubscribed from identity changes");
        }
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.abort();
    }
}

impl SessionStore {
    /// Creates the store and subscribes it to the provider. Must be called
    /// from within a tokio runtime.
    pub fn start(provider: Arc<dyn IdentityProvider>) -> (Arc<Self>, SessionSubscription) {
        let (state, _) = watch::channel(SessionState::Unknown);
        let store = Arc::new(Self { provider, state });
        let changes = store.provider.subscribe_identity_changes();
        let task = tokio::spawn(Arc::clone(&store).listen(changes));
        (store, SessionSubscription { task: Some(task) })
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    /// Waits for the initial determination and returns the resolved state.
    pub async fn resolved(&self) -> SessionState {
        let mut rx = self.subscribe();
        let resolved = match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        resolved
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, CredentialError> {
        match self.provider.create_account(email, password).await {
            Ok(identity) => {
                info!(uid = %identity.uid, "account created");
                self.apply(SessionState::Authenticated(identity.clone()), "sign_up");
                Ok(identity)
            }
            Err(err) => {
                let err = CredentialError::from(err);
                warn!(error = %err, "sign-up rejected by identity provider");
                Err(err)
            }
        }
    }

    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthenticationError> {
        match self.provider.sign_in_with_password(email, password).await {
            Ok(identity) => {
                info!(uid = %identity.uid, "signed in with password");
                self.apply(SessionState::Authenticated(identity.clone()), "sign_in");
                Ok(identity)
            }
            Err(err) => {
                let err = AuthenticationError::from(err);
                warn!(error = %err, "password sign-in failed");
                Err(err)
            }
        }
    }

    /// Pop-up sign-in with redirect fallback. Racing attempts resolve
    /// last-writer-wins: whichever provider call completes last sets the
    /// identity, and a superseded attempt returns `Cancelled` without touching
    /// state.
    pub async fn sign_in_with_federated_provider(
        &self,
    ) -> Result<FederatedSignIn, AuthenticationError> {
        let popup_err = match self.provider.sign_in_with_popup().await {
            Ok(identity) => {
                info!(uid = %identity.uid, "signed in with federated provider");
                self.apply(
                    SessionState::Authenticated(identity.clone()),
                    "federated_popup",
                );
                return Ok(FederatedSignIn::SignedIn(identity));
            }
            Err(err) => err,
        };

        let err = if popup_err.is(&ProviderErrorCode::PopupBlocked) {
            info!("sign-in popup blocked; falling back to redirect flow");
            match self.provider.sign_in_with_redirect().await {
                Ok(()) => return Ok(FederatedSignIn::Redirecting),
                Err(err) => err,
            }
        } else {
            popup_err
        };

        let err = AuthenticationError::from(err);
        if err.is_silent() {
            debug!("federated sign-in superseded by a concurrent attempt");
            return Ok(FederatedSignIn::Cancelled);
        }
        error!(error = %err, "federated sign-in failed");
        Err(err)
    }

    /// Collects the result of a redirect flow started after the store was
    /// created.
    pub async fn resume_redirect(&self) -> Result<Option<Identity>, AuthenticationError> {
        match self.provider.redirect_result().await {
            Ok(Some(identity)) => {
                info!(uid = %identity.uid, "completed redirect sign-in");
                self.apply(
                    SessionState::Authenticated(identity.clone()),
                    "redirect_result",
                );
                Ok(Some(identity))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                let err = AuthenticationError::from(err);
                if err.is_silent() {
                    return Ok(None);
                }
                error!(error = %err, "redirect sign-in failed");
                Err(err)
            }
        }
    }

    pub async fn sign_out(&self) -> Result<(), AuthenticationError> {
        if let Err(err) = self.provider.sign_out().await {
            let err = AuthenticationError::from(err);
            error!(error = %err, "sign-out failed");
            return Err(err);
        }
        self.apply(SessionState::Unauthenticated, "sign_out");
        Ok(())
    }

    fn apply(&self, next: SessionState, source: &'static str) -> bool {
        let label = next.label();
        let uid = next.identity().map(|identity| identity.uid.to_string());
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            info!(source, state = label, uid = uid.as_deref(), "session state changed");
        } else {
            debug!(source, state = label, "duplicate session transition ignored");
        }
        changed
    }

    /// Mirrors provider notifications into the session state.
    ///
    /// Until the first determination, a signed-out notification is held while
    /// a redirect result is still pending, so a user resuming from a redirect
    /// goes straight from loading to authenticated.
    async fn listen(self: Arc<Self>, mut changes: watch::Receiver<ProviderAuthState>) {
        let redirect = self.provider.redirect_result();
        tokio::pin!(redirect);
        let mut redirect_pending = true;
        let mut determined = false;
        let mut held: Option<SessionState> = None;

        let initial = changes.borrow_and_update().clone();
        if let ProviderAuthState::Resolved(identity) = initial {
            self.offer(
                SessionState::from_identity(identity),
                redirect_pending,
                &mut determined,
                &mut held,
            );
        }

        loop {
            tokio::select! {
                outcome = &mut redirect, if redirect_pending => {
                    redirect_pending = false;
                    match outcome {
                        Ok(Some(identity)) => {
                            info!(uid = %identity.uid, "completed pending redirect sign-in");
                            determined = true;
                            held = None;
                            self.apply(SessionState::Authenticated(identity), "redirect_result");
                        }
                        Ok(None) => debug!("no pending redirect result"),
                        Err(err) => error!(error = %err, "redirect result error"),
                    }
                    if !determined {
                        if let Some(next) = held.take() {
                            determined = true;
                            self.apply(next, "identity_change");
                        }
                    }
                }
                changed = changes.changed() => {
                    if changed.is_err() {
                        debug!("identity provider closed its notification stream");
                        break;
                    }
                    let current = changes.borrow_and_update().clone();
                    if let ProviderAuthState::Resolved(identity) = current {
                        self.offer(
                            SessionState::from_identity(identity),
                            redirect_pending,
                            &mut determined,
                            &mut held,
                        );
                    }
                }
            }
        }
    }

    fn offer(
        &self,
        next: SessionState,
        redirect_pending: bool,
        determined: &mut bool,
        held: &mut Option<SessionState>,
    ) {
        if !*determined && redirect_pending && next.identity().is_none() {
            *held = Some(next);
            return;
        }
        *determined = true;
        *held = None;
        self.apply(next, "identity_change");
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
