//! Federated sign-in through the user's browser. The provider's consent
//! page is printed; the user pastes back the address it redirected to.

use std::{io::IsTerminal, sync::Arc};

use async_trait::async_trait;
use client_core::rest::FederatedPrompt;
use shared::error::{ProviderError, ProviderErrorCode};
use tokio::{
    io::{BufReader, Lines, Stdin},
    sync::Mutex,
};
use tracing::debug;

pub type InputLines = Arc<Mutex<Lines<BufReader<Stdin>>>>;

pub struct TerminalPrompt {
    input: InputLines,
    redirect_callback: Mutex<Option<String>>,
}

impl TerminalPrompt {
    pub fn new(input: InputLines) -> Self {
        Self {
            input,
            redirect_callback: Mutex::new(None),
        }
    }

    pub async fn deliver_redirect_callback(&self, callback_url: String) {
        *self.redirect_callback.lock().await = Some(callback_url);
    }
}

#[async_trait]
impl FederatedPrompt for TerminalPrompt {
    /// Without an interactive terminal there is nobody to paste the callback,
    /// so the request is reported as blocked and the redirect flow takes over.
    async fn popup(&self, auth_uri: &str) -> Result<String, ProviderError> {
        if !std::io::stdin().is_terminal() {
            return Err(ProviderError::new(
                ProviderErrorCode::PopupBlocked,
                "standard input is not a terminal",
            ));
        }
        println!("Open this address in your browser and choose an account:\n  {auth_uri}");
        println!("Paste the address you were sent back to (empty line cancels):");

        let line = self
            .input
            .lock()
            .await
            .next_line()
            .await
            .map_err(|err| ProviderError::new(ProviderErrorCode::Internal, err.to_string()))?;
        match line.as_deref().map(str::trim) {
            Some(callback) if !callback.is_empty() => Ok(callback.to_string()),
            _ => {
                debug!("federated sign-in abandoned at the terminal");
                Err(ProviderError::new(
                    ProviderErrorCode::PopupClosedByUser,
                    "sign-in window closed",
                ))
            }
        }
    }

    async fn redirect(&self, auth_uri: &str) -> Result<(), ProviderError> {
        println!("Continue signing in with Google at:\n  {auth_uri}");
        println!("When you are sent back, run: callback <address>");
        Ok(())
    }

    async fn take_redirect_callback(&self) -> Option<String> {
        self.redirect_callback.lock().await.take()
    }
}
