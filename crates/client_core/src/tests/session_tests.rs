use super::*;
use std::{sync::atomic::Ordering, time::Duration};

use crate::test_support::{identity, popup_blocked, FakeIdentityProvider, CORRECT_PASSWORD};

async fn resolved(store: &SessionStore) -> SessionState {
    tokio::time::timeout(Duration::from_secs(2), store.resolved())
        .await
        .expect("session resolved in time")
}

fn signed_out_with_popups(results: Vec<Result<Identity, ProviderError>>) -> FakeIdentityProvider {
    FakeIdentityProvider::starting(ProviderAuthState::Resolved(None)).with_popup_results(results)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

#[tokio::test]
async fn stays_loading_until_first_notification() {
    let provider = Arc::new(FakeIdentityProvider::starting(ProviderAuthState::Initializing));
    let (store, _subscription) = SessionStore::start(provider.clone());

    settle().await;
    assert!(store.is_loading());
    assert_eq!(store.state(), SessionState::Unknown);

    provider.notify(None);
    assert_eq!(resolved(&store).await, SessionState::Unauthenticated);
}

#[tokio::test]
async fn notification_with_identity_authenticates() {
    let provider = Arc::new(FakeIdentityProvider::starting(ProviderAuthState::Initializing));
    let (store, _subscription) = SessionStore::start(provider.clone());

    provider.notify(Some(identity("u123")));

    assert_eq!(
        resolved(&store).await,
        SessionState::Authenticated(identity("u123"))
    );
    assert_eq!(
        store.current_identity().map(|identity| identity.uid.0),
        Some("u123".to_string())
    );
}

#[tokio::test]
async fn sign_in_reported_by_operation_and_stream_is_applied_once() {
    let provider = FakeIdentityProvider::signed_out();
    let (store, _subscription) = SessionStore::start(provider.clone());
    resolved(&store).await;

    let signed_in = store
        .sign_in("alice@example.com", CORRECT_PASSWORD)
        .await
        .expect("sign in");
    settle().await;

    assert_eq!(store.state(), SessionState::Authenticated(signed_in.clone()));
    assert!(!store.apply(SessionState::Authenticated(signed_in), "replay"));
}

#[tokio::test]
async fn wrong_password_fails_with_authentication_error() {
    let provider = FakeIdentityProvider::signed_out();
    let (store, _subscription) = SessionStore::start(provider);
    resolved(&store).await;

    let err = store
        .sign_in("alice@example.com", "nope")
        .await
        .expect_err("invalid credentials");

    assert_eq!(err, AuthenticationError::InvalidCredentials);
    assert_eq!(store.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn sign_up_propagates_provider_rejections() {
    let provider = FakeIdentityProvider::signed_out();
    let (store, _subscription) = SessionStore::start(provider);
    resolved(&store).await;

    assert_eq!(
        store
            .sign_up("taken@example.com", "long-enough")
            .await
            .expect_err("duplicate"),
        CredentialError::EmailInUse
    );
    assert_eq!(
        store
            .sign_up("fresh@example.com", "123")
            .await
            .expect_err("weak"),
        CredentialError::WeakPassword
    );

    let created = store
        .sign_up("fresh@example.com", "long-enough")
        .await
        .expect("sign up");
    assert_eq!(store.state(), SessionState::Authenticated(created));
}

#[tokio::test]
async fn pending_redirect_result_is_merged_with_signed_out_notification() {
    let (provider, redirect_tx) =
        FakeIdentityProvider::starting(ProviderAuthState::Resolved(None)).with_pending_redirect();
    let provider = Arc::new(provider);
    let (store, _subscription) = SessionStore::start(provider.clone());

    settle().await;
    assert!(
        store.is_loading(),
        "signed-out notification must wait for the pending redirect"
    );

    redirect_tx
        .send(Ok(Some(identity("u123"))))
        .expect("redirect receiver alive");
    assert_eq!(
        resolved(&store).await,
        SessionState::Authenticated(identity("u123"))
    );

    provider.notify(Some(identity("u123")));
    settle().await;
    assert_eq!(store.state(), SessionState::Authenticated(identity("u123")));
}

#[tokio::test]
async fn failed_redirect_result_falls_back_to_notification() {
    let (provider, redirect_tx) =
        FakeIdentityProvider::starting(ProviderAuthState::Resolved(None)).with_pending_redirect();
    let (store, _subscription) = SessionStore::start(Arc::new(provider));

    redirect_tx
        .send(Err(ProviderError::network("offline")))
        .expect("redirect receiver alive");

    assert_eq!(resolved(&store).await, SessionState::Unauthenticated);
}

#[tokio::test]
async fn blocked_popup_falls_back_to_redirect() {
    let provider = Arc::new(
        FakeIdentityProvider::starting(ProviderAuthState::Resolved(None))
            .with_popup_error(popup_blocked()),
    );
    let (store, _subscription) = SessionStore::start(provider.clone());
    resolved(&store).await;

    let outcome = store
        .sign_in_with_federated_provider()
        .await
        .expect("fallback succeeds");

    assert_eq!(outcome, FederatedSignIn::Redirecting);
    assert_eq!(provider.redirect_starts.load(Ordering::SeqCst), 1);
    assert_eq!(store.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn cancelled_popup_request_is_a_silent_no_op() {
    let provider = Arc::new(signed_out_with_popups(vec![Err(
        ProviderError::from_wire("auth/cancelled-popup-request"),
    )]));
    let (store, _subscription) = SessionStore::start(provider.clone());
    resolved(&store).await;

    let outcome = store
        .sign_in_with_federated_provider()
        .await
        .expect("cancellation is not an error");

    assert_eq!(outcome, FederatedSignIn::Cancelled);
    assert_eq!(provider.redirect_starts.load(Ordering::SeqCst), 0);
    assert_eq!(store.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn federated_network_failure_is_surfaced() {
    let provider = Arc::new(signed_out_with_popups(vec![Err(
        ProviderError::from_wire("auth/network-request-failed"),
    )]));
    let (store, _subscription) = SessionStore::start(provider);
    resolved(&store).await;

    let err = store
        .sign_in_with_federated_provider()
        .await
        .expect_err("network failure");

    assert!(matches!(err, AuthenticationError::Network(_)));
    assert_eq!(
        err.user_message(),
        "Network error - please check your connection"
    );
}

#[tokio::test]
async fn later_federated_completion_wins() {
    let provider = Arc::new(signed_out_with_popups(vec![
        Ok(identity("first")),
        Ok(identity("second")),
    ]));
    let (store, _subscription) = SessionStore::start(provider);
    resolved(&store).await;

    let (a, b) = tokio::join!(
        store.sign_in_with_federated_provider(),
        store.sign_in_with_federated_provider()
    );
    assert!(a.is_ok() && b.is_ok());
    settle().await;

    assert_eq!(store.state(), SessionState::Authenticated(identity("second")));
}

#[tokio::test]
async fn sign_out_twice_stays_unauthenticated() {
    let provider = FakeIdentityProvider::signed_in("u123");
    let (store, _subscription) = SessionStore::start(provider.clone());
    assert!(resolved(&store).await.identity().is_some());

    store.sign_out().await.expect("first sign out");
    store.sign_out().await.expect("second sign out");
    settle().await;

    assert_eq!(store.state(), SessionState::Unauthenticated);
    assert_eq!(provider.sign_out_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unsubscribe_stops_mirroring_notifications() {
    let provider = FakeIdentityProvider::signed_out();
    let (store, subscription) = SessionStore::start(provider.clone());
    resolved(&store).await;
    assert!(subscription.is_active());

    subscription.unsubscribe();
    settle().await;
    provider.notify(Some(identity("late")));
    settle().await;

    assert_eq!(store.state(), SessionState::Unauthenticated);
}
