//! Form controllers behind the sign-in, sign-up and home views. Each handler
//! calls the session store and converts any failure into the message the view
//! shows.

use tracing::{error, warn};

use crate::{
    error::{AuthenticationError, ValidationError},
    routing::{HOME_PATH, SIGN_IN_PATH},
    session::{FederatedSignIn, SessionStore},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewOutcome {
    Navigate(&'static str),
    Stay,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPurpose {
    SignIn,
    SignUp,
}

impl FormPurpose {
    fn federated_failure(self) -> &'static str {
        match self {
            FormPurpose::SignIn => "Failed to sign in with Google",
            FormPurpose::SignUp => "Failed to sign up with Google",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    error: Option<String>,
}

impl AuthForm {
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn sign_in(&mut self, session: &SessionStore) -> ViewOutcome {
        self.error = None;
        match session.sign_in(&self.email, &self.password).await {
            Ok(_) => ViewOutcome::Navigate(HOME_PATH),
            Err(_) => self.fail("Failed to sign in"),
        }
    }

    pub async fn sign_up(&mut self, session: &SessionStore) -> ViewOutcome {
        if self.password != self.confirm_password {
            return self.fail(ValidationError::PasswordMismatch.user_message());
        }
        self.error = None;
        match session.sign_up(&self.email, &self.password).await {
            Ok(_) => ViewOutcome::Navigate(HOME_PATH),
            Err(err) => self.fail(err.user_message()),
        }
    }

    pub async fn federated(&mut self, session: &SessionStore, purpose: FormPurpose) -> ViewOutcome {
        self.error = None;
        match session.sign_in_with_federated_provider().await {
            Ok(FederatedSignIn::SignedIn(_)) => ViewOutcome::Navigate(HOME_PATH),
            Ok(FederatedSignIn::Redirecting | FederatedSignIn::Cancelled) => ViewOutcome::Stay,
            Err(err @ (AuthenticationError::PopupClosed | AuthenticationError::Network(_))) => {
                self.fail(err.user_message())
            }
            Err(_) => self.fail(purpose.federated_failure()),
        }
    }

    fn fail(&mut self, message: &str) -> ViewOutcome {
        warn!(message, "auth form error");
        self.error = Some(message.to_string());
        ViewOutcome::Error(message.to_string())
    }
}

pub async fn sign_out(session: &SessionStore) -> ViewOutcome {
    match session.sign_out().await {
        Ok(()) => ViewOutcome::Navigate(SIGN_IN_PATH),
        Err(err) => {
            error!(error = %err, "failed to log out");
            ViewOutcome::Error("Failed to log out".to_string())
        }
    }
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
