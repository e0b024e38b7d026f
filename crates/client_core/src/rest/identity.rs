use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared::{
    domain::{Identity, SignInMethod, UserId},
    error::{ProviderError, ProviderErrorCode},
};
use tokio::{
    fs,
    sync::{watch, Mutex, RwLock},
};
use tracing::{debug, info, warn};

use super::{http_client, provider_error_from_response, transport_error, TokenSource};
use crate::{
    config::Settings,
    session::{IdentityProvider, ProviderAuthState},
};

/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Interactive surface for federated sign-in.
#[async_trait]
pub trait FederatedPrompt: Send + Sync {
    /// Shows `auth_uri` in a sign-in window and returns the callback URL the
    /// provider sent the user back to.
    async fn popup(&self, auth_uri: &str) -> Result<String, ProviderError>;
    /// Leaves for `auth_uri`; the callback arrives later through
    /// [`FederatedPrompt::take_redirect_callback`].
    async fn redirect(&self, auth_uri: &str) -> Result<(), ProviderError>;
    async fn take_redirect_callback(&self) -> Option<String>;
}

pub struct MissingFederatedPrompt;

#[async_trait]
impl FederatedPrompt for MissingFederatedPrompt {
    async fn popup(&self, _auth_uri: &str) -> Result<String, ProviderError> {
        Err(ProviderError::new(
            ProviderErrorCode::PopupBlocked,
            "no interactive sign-in window available",
        ))
    }

    async fn redirect(&self, _auth_uri: &str) -> Result<(), ProviderError> {
        Err(ProviderError::new(
            ProviderErrorCode::Other("OPERATION_NOT_SUPPORTED".into()),
            "federated redirect sign-in is unavailable",
        ))
    }

    async fn take_redirect_callback(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone)]
struct AuthSession {
    identity: Identity,
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    identity: Identity,
    refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAuthUriRequest<'a> {
    provider_id: &'a str,
    continue_uri: &'a str,
    custom_parameter: HashMap<&'a str, &'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAuthUriResponse {
    auth_uri: String,
    session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpRequest<'a> {
    request_uri: &'a str,
    session_id: &'a str,
    return_secure_token: bool,
    return_idp_credential: bool,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

/// Identity provider backed by the hosted identity REST API. Keeps the
/// current session in memory and, when a session file is configured,
/// persists the refresh token so the next start resumes the session.
pub struct RestIdentityProvider {
    http: Client,
    api_key: String,
    identity_base_url: String,
    token_base_url: String,
    continue_uri: String,
    session_file: Option<PathBuf>,
    prompt: Arc<dyn FederatedPrompt>,
    session: RwLock<Option<AuthSession>>,
    pending_redirect: Mutex<Option<String>>,
    popup_open: AtomicBool,
    changes: watch::Sender<ProviderAuthState>,
}

impl RestIdentityProvider {
    pub fn new(settings: &Settings, prompt: Arc<dyn FederatedPrompt>) -> reqwest::Result<Self> {
        let (changes, _) = watch::channel(ProviderAuthState::Initializing);
        Ok(Self {
            http: http_client(settings)?,
            api_key: settings.api_key.clone(),
            identity_base_url: settings.identity_base_url.trim_end_matches('/').to_string(),
            token_base_url: settings.token_base_url.trim_end_matches('/').to_string(),
            continue_uri: settings.auth_handler_url(),
            session_file: settings.session_file.clone(),
            prompt,
            session: RwLock::new(None),
            pending_redirect: Mutex::new(None),
            popup_open: AtomicBool::new(false),
            changes,
        })
    }

    /// Resolves the initial identity notification, from the persisted
    /// session when one exists and can still be refreshed.
    pub async fn restore_persisted_session(&self) {
        let restored = match self.load_persisted().await {
            Some(persisted) => match self.refresh(&persisted.refresh_token).await {
                Ok(refreshed) => {
                    let session = AuthSession {
                        identity: persisted.identity,
                        id_token: refreshed.id_token,
                        refresh_token: refreshed.refresh_token,
                        expires_at: expiry_from(&refreshed.expires_in),
                    };
                    info!(uid = %session.identity.uid, "restored persisted session");
                    self.persist(&session).await;
                    let identity = session.identity.clone();
                    *self.session.write().await = Some(session);
                    Some(identity)
                }
                Err(err) => {
                    warn!(error = %err, "persisted session could not be refreshed");
                    self.forget_persisted().await;
                    None
                }
            },
            None => None,
        };
        self.changes
            .send_replace(ProviderAuthState::Resolved(restored));
    }

    fn accounts_url(&self, method: &str) -> String {
        format!(
            "{}/accounts:{method}?key={}",
            self.identity_base_url, self.api_key
        )
    }

    async fn post_json<B, R>(&self, url: String, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(provider_error_from_response(response).await);
        }
        response.json().await.map_err(transport_error)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ProviderError> {
        let response = self
            .http
            .post(format!("{}/token?key={}", self.token_base_url, self.api_key))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(provider_error_from_response(response).await);
        }
        response.json().await.map_err(transport_error)
    }

    async fn establish(&self, response: AuthResponse, method: SignInMethod) -> Identity {
        let identity = Identity {
            uid: UserId(response.local_id),
            email: response.email,
            display_name: response.display_name,
            photo_url: response.photo_url,
            method,
        };
        let session = AuthSession {
            identity: identity.clone(),
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_at: expiry_from(&response.expires_in),
        };
        self.persist(&session).await;
        *self.session.write().await = Some(session);
        self.changes
            .send_replace(ProviderAuthState::Resolved(Some(identity.clone())));
        identity
    }

    async fn federated_auth_uri(&self) -> Result<CreateAuthUriResponse, ProviderError> {
        let request = CreateAuthUriRequest {
            provider_id: SignInMethod::Google.provider_id(),
            continue_uri: &self.continue_uri,
            custom_parameter: HashMap::from([("prompt", "select_account")]),
        };
        self.post_json(self.accounts_url("createAuthUri"), &request)
            .await
    }

    async fn complete_federated(
        &self,
        callback_url: &str,
        session_id: &str,
    ) -> Result<Identity, ProviderError> {
        let request = SignInWithIdpRequest {
            request_uri: callback_url,
            session_id,
            return_secure_token: true,
            return_idp_credential: true,
        };
        let response: AuthResponse = self
            .post_json(self.accounts_url("signInWithIdp"), &request)
            .await?;
        Ok(self.establish(response, SignInMethod::Google).await)
    }

    async fn popup_flow(&self) -> Result<Identity, ProviderError> {
        let auth = self.federated_auth_uri().await?;
        let callback = self.prompt.popup(&auth.auth_uri).await?;
        self.complete_federated(&callback, &auth.session_id).await
    }

    async fn load_persisted(&self) -> Option<PersistedSession> {
        let path = self.session_file.as_ref()?;
        let raw = fs::read_to_string(path).await.ok()?;
        match serde_json::from_str(&raw) {
            Ok(persisted) => Some(persisted),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "discarding unreadable session file");
                None
            }
        }
    }

    async fn persist(&self, session: &AuthSession) {
        let Some(path) = &self.session_file else {
            return;
        };
        let persisted = PersistedSession {
            identity: session.identity.clone(),
            refresh_token: session.refresh_token.clone(),
        };
        let write = async {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(path, serde_json::to_vec(&persisted)?).await?;
            Ok::<_, anyhow::Error>(())
        };
        if let Err(err) = write.await {
            warn!(path = %path.display(), error = %err, "failed to persist session");
        }
    }

    async fn forget_persisted(&self) {
        let Some(path) = &self.session_file else {
            return;
        };
        match fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "removed session file"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to remove session file")
            }
        }
    }

    async fn clear_session(&self) {
        *self.session.write().await = None;
        self.pending_redirect.lock().await.take();
        self.forget_persisted().await;
        self.changes.send_replace(ProviderAuthState::Resolved(None));
    }
}

/// An unreadable lifetime counts as already expired, so the next token
/// request refreshes it.
fn expiry_from(expires_in: &str) -> DateTime<Utc> {
    match expires_in.trim().parse::<i64>() {
        Ok(seconds) => Utc::now() + Duration::seconds(seconds),
        Err(err) => {
            warn!(expires_in, error = %err, "unparseable token lifetime; treating token as expired");
            Utc::now()
        }
    }
}

/// Marks the sign-in window open for as long as it lives, including when the
/// sign-in future is dropped mid-flow.
struct PopupWindow<'a>(&'a AtomicBool);

impl<'a> PopupWindow<'a> {
    fn open(flag: &'a AtomicBool) -> Option<Self> {
        (!flag.swap(true, Ordering::AcqRel)).then_some(Self(flag))
    }
}

impl Drop for PopupWindow<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, ProviderError> {
        let request = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let response: AuthResponse = self
            .post_json(self.accounts_url("signUp"), &request)
            .await?;
        Ok(self.establish(response, SignInMethod::Password).await)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, ProviderError> {
        let request = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let response: AuthResponse = self
            .post_json(self.accounts_url("signInWithPassword"), &request)
            .await?;
        Ok(self.establish(response, SignInMethod::Password).await)
    }

    /// Only one sign-in window may be open; a concurrent request is rejected
    /// as cancelled.
    async fn sign_in_with_popup(&self) -> Result<Identity, ProviderError> {
        let Some(_window) = PopupWindow::open(&self.popup_open) else {
            return Err(ProviderError::new(
                ProviderErrorCode::CancelledPopupRequest,
                "another sign-in window is already open",
            ));
        };
        self.popup_flow().await
    }

    async fn sign_in_with_redirect(&self) -> Result<(), ProviderError> {
        let auth = self.federated_auth_uri().await?;
        *self.pending_redirect.lock().await = Some(auth.session_id);
        self.prompt.redirect(&auth.auth_uri).await
    }

    async fn redirect_result(&self) -> Result<Option<Identity>, ProviderError> {
        let Some(session_id) = self.pending_redirect.lock().await.take() else {
            return Ok(None);
        };
        let Some(callback) = self.prompt.take_redirect_callback().await else {
            debug!("redirect sign-in started but no callback received yet");
            *self.pending_redirect.lock().await = Some(session_id);
            return Ok(None);
        };
        self.complete_federated(&callback, &session_id)
            .await
            .map(Some)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.clear_session().await;
        Ok(())
    }

    fn subscribe_identity_changes(&self) -> watch::Receiver<ProviderAuthState> {
        self.changes.subscribe()
    }
}

#[async_trait]
impl TokenSource for RestIdentityProvider {
    async fn id_token(&self) -> Result<String> {
        let current = self
            .session
            .read()
            .await
            .clone()
            .ok_or_else(|| anyhow!("no signed-in identity"))?;
        if current.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) > Utc::now() {
            return Ok(current.id_token);
        }

        debug!(uid = %current.identity.uid, "refreshing expired id token");
        let refreshed = match self.refresh(&current.refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(err) if err.is(&ProviderErrorCode::TokenExpired) => {
                warn!(uid = %current.identity.uid, "refresh token rejected; signing out");
                self.clear_session().await;
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };
        let session = AuthSession {
            identity: current.identity,
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            expires_at: expiry_from(&refreshed.expires_in),
        };
        self.persist(&session).await;
        let token = session.id_token.clone();
        *self.session.write().await = Some(session);
        Ok(token)
    }
}

#[cfg(test)]
#[path = "../tests/rest_identity_tests.rs"]
mod tests;
