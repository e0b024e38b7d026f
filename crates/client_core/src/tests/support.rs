use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::Router;
use shared::{
    domain::{Identity, SignInMethod},
    error::{ProviderError, ProviderErrorCode},
};
use tokio::{
    net::TcpListener,
    sync::{oneshot, watch, Mutex},
};

use crate::{
    config::Settings,
    session::{IdentityProvider, ProviderAuthState, SessionStore, SessionSubscription},
};

pub(crate) const CORRECT_PASSWORD: &str = "correct-horse";

pub(crate) fn identity(uid: &str) -> Identity {
    Identity::new(uid, SignInMethod::Password).with_email(format!("{uid}@example.com"))
}

type RedirectOutcome = Result<Option<Identity>, ProviderError>;

/// Scriptable identity provider. Password sign-in accepts
/// [`CORRECT_PASSWORD`]. Federated sign-in answers from `popup_results`
/// first, then fails with `popup_error` when set, then signs in
/// `google-user`.
pub(crate) struct FakeIdentityProvider {
    changes: watch::Sender<ProviderAuthState>,
    popup_results: Mutex<VecDeque<Result<Identity, ProviderError>>>,
    redirect_outcome: Mutex<Option<oneshot::Receiver<RedirectOutcome>>>,
    pub popup_error: Mutex<Option<ProviderError>>,
    pub fail_sign_out: AtomicBool,
    pub create_calls: AtomicUsize,
    pub redirect_starts: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
}

impl FakeIdentityProvider {
    pub fn starting(initial: ProviderAuthState) -> Self {
        let (changes, _) = watch::channel(initial);
        Self {
            changes,
            popup_results: Mutex::new(VecDeque::new()),
            redirect_outcome: Mutex::new(None),
            popup_error: Mutex::new(None),
            fail_sign_out: AtomicBool::new(false),
            create_calls: AtomicUsize::new(0),
            redirect_starts: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    pub fn new(initial: Option<Identity>) -> Arc<Self> {
        Arc::new(Self::starting(ProviderAuthState::Resolved(initial)))
    }

    pub fn signed_in(uid: &str) -> Arc<Self> {
        Self::new(Some(identity(uid)))
    }

    pub fn signed_out() -> Arc<Self> {
        Self::new(None)
    }

    pub fn with_popup_results(self, results: Vec<Result<Identity, ProviderError>>) -> Self {
        *self.popup_results.try_lock().expect("unlocked") = results.into();
        self
    }

    pub fn with_popup_error(self, err: ProviderError) -> Self {
        *self.popup_error.try_lock().expect("unlocked") = Some(err);
        self
    }

    /// Holds `redirect_result` open until the returned sender answers.
    pub fn with_pending_redirect(self) -> (Self, oneshot::Sender<RedirectOutcome>) {
        let (tx, rx) = oneshot::channel();
        *self.redirect_outcome.try_lock().expect("unlocked") = Some(rx);
        (self, tx)
    }

    pub fn notify(&self, identity: Option<Identity>) {
        self.changes
            .send_replace(ProviderAuthState::Resolved(identity));
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, ProviderError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if email == "taken@example.com" {
            return Err(ProviderError::from_wire("EMAIL_EXISTS"));
        }
        if password.len() < 6 {
            return Err(ProviderError::from_wire(
                "WEAK_PASSWORD : Password should be at least 6 characters",
            ));
        }
        let created = Identity::new("new-user", SignInMethod::Password).with_email(email);
        self.notify(Some(created.clone()));
        Ok(created)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, ProviderError> {
        if password != CORRECT_PASSWORD {
            return Err(ProviderError::from_wire("INVALID_LOGIN_CREDENTIALS"));
        }
        let signed_in = identity(email.split('@').next().unwrap_or(email));
        self.notify(Some(signed_in.clone()));
        Ok(signed_in)
    }

    async fn sign_in_with_popup(&self) -> Result<Identity, ProviderError> {
        let scripted = self.popup_results.lock().await.pop_front();
        let outcome = match scripted {
            Some(outcome) => outcome,
            None => match self.popup_error.lock().await.clone() {
                Some(err) => Err(err),
                None => Ok(Identity::new("google-user", SignInMethod::Google)),
            },
        };
        if let Ok(identity) = &outcome {
            self.notify(Some(identity.clone()));
        }
        outcome
    }

    async fn sign_in_with_redirect(&self) -> Result<(), ProviderError> {
        self.redirect_starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn redirect_result(&self) -> Result<Option<Identity>, ProviderError> {
        let pending = self.redirect_outcome.lock().await.take();
        match pending {
            Some(rx) => rx.await.unwrap_or(Ok(None)),
            None => Ok(None),
        }
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(ProviderError::network("connection reset"));
        }
        self.notify(None);
        Ok(())
    }

    fn subscribe_identity_changes(&self) -> watch::Receiver<ProviderAuthState> {
        self.changes.subscribe()
    }
}

/// A pop-up failure the way a blocked window reports it.
pub(crate) fn popup_blocked() -> ProviderError {
    ProviderError::new(ProviderErrorCode::PopupBlocked, "auth/popup-blocked")
}

/// Starts a store over `provider` and waits for its first determination.
pub(crate) async fn started_session(
    provider: Arc<FakeIdentityProvider>,
) -> (Arc<SessionStore>, SessionSubscription) {
    let (store, subscription) = SessionStore::start(provider);
    tokio::time::timeout(Duration::from_secs(2), store.resolved())
        .await
        .expect("session resolved in time");
    (store, subscription)
}

/// Serves `app` on an ephemeral loopback port and returns its base URL.
pub(crate) async fn spawn_server(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

/// Settings with every hosted service pointed at `base_url`.
pub(crate) fn test_settings(base_url: &str) -> Settings {
    Settings {
        api_key: "test-key".into(),
        project_id: "demo".into(),
        storage_bucket: "demo.appspot.com".into(),
        identity_base_url: base_url.into(),
        token_base_url: base_url.into(),
        storage_base_url: base_url.into(),
        functions_base_url: Some(base_url.into()),
        request_timeout_secs: 5,
        session_file: None,
        ..Settings::default()
    }
}
