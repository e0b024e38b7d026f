use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::{
    error::{ProviderError, ProviderErrorCode},
    protocol::{AnalyzeResumeRequest, AnalyzeResumeResponse, CallableRequest, CallableResponse},
};

use super::{http_client, TokenSource};
use crate::{config::Settings, workflow::ScoringFunction};

/// Invokes a named callable function over HTTPS: `POST <endpoint>/<name>`
/// with `{"data": ...}`, answered by `{"result": ...}` or `{"error": ...}`.
pub struct CallableScoringFunction {
    http: Client,
    endpoint: String,
    tokens: Arc<dyn TokenSource>,
}

impl CallableScoringFunction {
    pub fn new(settings: &Settings, tokens: Arc<dyn TokenSource>) -> reqwest::Result<Self> {
        Ok(Self {
            http: http_client(settings)?,
            endpoint: settings.functions_endpoint(),
            tokens,
        })
    }
}

#[async_trait]
impl ScoringFunction for CallableScoringFunction {
    async fn invoke(
        &self,
        function_name: &str,
        request: &AnalyzeResumeRequest,
    ) -> Result<AnalyzeResumeResponse> {
        let token = self
            .tokens
            .id_token()
            .await
            .context("no credentials available for scoring call")?;
        let response = self
            .http
            .post(format!("{}/{function_name}", self.endpoint))
            .bearer_auth(token)
            .json(&CallableRequest { data: request })
            .send()
            .await
            .with_context(|| format!("calling '{function_name}'"))?;
        let status = response.status();
        let body: CallableResponse<AnalyzeResumeResponse> = response
            .json()
            .await
            .with_context(|| format!("malformed response from '{function_name}' (HTTP {status})"))?;

        if let Some(err) = body.error {
            let code = ProviderErrorCode::from_wire(err.status.as_deref().unwrap_or("INTERNAL"));
            return Err(ProviderError::new(code, err.message).into());
        }
        body.result
            .ok_or_else(|| anyhow!("'{function_name}' returned no result (HTTP {status})"))
    }
}

#[cfg(test)]
#[path = "../tests/rest_functions_tests.rs"]
mod tests;
