use super::*;
use std::sync::atomic::Ordering;

use shared::error::{ProviderError, ProviderErrorCode};

use crate::test_support::{started_session, FakeIdentityProvider, CORRECT_PASSWORD};

fn form(email: &str, password: &str) -> AuthForm {
    AuthForm {
        email: email.to_string(),
        password: password.to_string(),
        confirm_password: password.to_string(),
        ..AuthForm::default()
    }
}

#[tokio::test]
async fn sign_in_navigates_home() {
    let (session, _subscription) = started_session(FakeIdentityProvider::signed_out()).await;
    let mut form = form("alice@example.com", CORRECT_PASSWORD);

    assert_eq!(form.sign_in(&session).await, ViewOutcome::Navigate(HOME_PATH));
    assert!(form.error().is_none());
    assert!(session.current_identity().is_some());
}

#[tokio::test]
async fn failed_sign_in_shows_fixed_message() {
    let (session, _subscription) = started_session(FakeIdentityProvider::signed_out()).await;
    let mut form = form("alice@example.com", "wrong");

    let outcome = form.sign_in(&session).await;

    assert_eq!(outcome, ViewOutcome::Error("Failed to sign in".to_string()));
    assert_eq!(form.error(), Some("Failed to sign in"));
}

#[tokio::test]
async fn mismatched_confirmation_never_reaches_the_provider() {
    let provider = FakeIdentityProvider::signed_out();
    let (session, _subscription) = started_session(provider.clone()).await;
    let mut form = form("new@example.com", "long-enough");
    form.confirm_password = "different".to_string();

    let outcome = form.sign_up(&session).await;

    assert_eq!(
        outcome,
        ViewOutcome::Error("Passwords do not match".to_string())
    );
    assert_eq!(provider.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sign_up_failure_and_success() {
    let (session, _subscription) = started_session(FakeIdentityProvider::signed_out()).await;

    let mut weak = form("new@example.com", "123");
    assert_eq!(
        weak.sign_up(&session).await,
        ViewOutcome::Error("Failed to create an account".to_string())
    );

    let mut ok = form("new@example.com", "long-enough");
    assert_eq!(ok.sign_up(&session).await, ViewOutcome::Navigate(HOME_PATH));
    assert!(ok.error().is_none());
}

#[tokio::test]
async fn federated_failures_map_to_view_messages() {
    let provider = FakeIdentityProvider::signed_out();
    let (session, _subscription) = started_session(provider.clone()).await;
    let mut form = AuthForm::default();

    *provider.popup_error.lock().await = Some(ProviderError::from_wire("auth/popup-closed-by-user"));
    assert_eq!(
        form.federated(&session, FormPurpose::SignIn).await,
        ViewOutcome::Error("Sign-in cancelled - please try again".to_string())
    );

    *provider.popup_error.lock().await = Some(ProviderError::new(
        ProviderErrorCode::Internal,
        "backend exploded",
    ));
    assert_eq!(
        form.federated(&session, FormPurpose::SignUp).await,
        ViewOutcome::Error("Failed to sign up with Google".to_string())
    );
    assert_eq!(
        form.federated(&session, FormPurpose::SignIn).await,
        ViewOutcome::Error("Failed to sign in with Google".to_string())
    );

    *provider.popup_error.lock().await =
        Some(ProviderError::from_wire("auth/cancelled-popup-request"));
    assert_eq!(
        form.federated(&session, FormPurpose::SignIn).await,
        ViewOutcome::Stay
    );
    assert!(form.error().is_none());
}

#[tokio::test]
async fn federated_success_navigates_home() {
    let (session, _subscription) = started_session(FakeIdentityProvider::signed_out()).await;
    let mut form = AuthForm::default();

    assert_eq!(
        form.federated(&session, FormPurpose::SignUp).await,
        ViewOutcome::Navigate(HOME_PATH)
    );
    assert_eq!(
        session.current_identity().map(|identity| identity.uid.0),
        Some("google-user".to_string())
    );
}

#[tokio::test]
async fn sign_out_goes_to_sign_in_or_reports_failure() {
    let provider = FakeIdentityProvider::signed_in("u123");
    let (session, _subscription) = started_session(provider.clone()).await;

    provider.fail_sign_out.store(true, Ordering::SeqCst);
    assert_eq!(
        sign_out(&session).await,
        ViewOutcome::Error("Failed to log out".to_string())
    );
    assert!(session.current_identity().is_some());

    provider.fail_sign_out.store(false, Ordering::SeqCst);
    assert_eq!(sign_out(&session).await, ViewOutcome::Navigate(SIGN_IN_PATH));
    assert!(session.current_identity().is_none());
}
