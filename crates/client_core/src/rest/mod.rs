//! REST adapters for the hosted identity, storage and callable-function
//! services.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use shared::error::{ProviderError, ProviderErrorCode};

use crate::config::Settings;

pub mod functions;
pub mod identity;
pub mod storage;

pub use functions::CallableScoringFunction;
pub use identity::{FederatedPrompt, MissingFederatedPrompt, RestIdentityProvider};
pub use storage::RestObjectStorage;

/// Supplies a fresh ID token for authenticated storage and function calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn id_token(&self) -> Result<String>;
}

pub(crate) fn http_client(settings: &Settings) -> reqwest::Result<Client> {
    Client::builder().timeout(settings.request_timeout()).build()
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    #[serde(default)]
    message: String,
}

/// Turns a non-success response into a [`ProviderError`]. The identity
/// service puts its error code in `error.message`.
pub(crate) async fn provider_error_from_response(response: Response) -> ProviderError {
    let status = response.status();
    match response.json::<GoogleErrorEnvelope>().await {
        Ok(envelope) if !envelope.error.message.is_empty() => {
            ProviderError::from_wire(&envelope.error.message)
        }
        _ => ProviderError::new(
            ProviderErrorCode::Other(format!("HTTP_{}", status.as_u16())),
            status.to_string(),
        ),
    }
}

pub(crate) fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::network(err.to_string())
}
