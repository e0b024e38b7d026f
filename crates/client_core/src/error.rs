//! Error taxonomy for the session store, the forms and the upload workflow.
//!
//! Every error is caught at the boundary of the operation that produced it and
//! turned into a short message via `user_message()`.

use shared::error::{ProviderError, ProviderErrorCode};
use thiserror::Error;

pub const GENERIC_WORKFLOW_FAILURE: &str =
    "Error analyzing resume. Please make sure your file is a valid PDF and try again.";

/// Sign-up input rejected by the identity provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("email address is malformed")]
    InvalidEmail,
    #[error("password is too weak")]
    WeakPassword,
    #[error("an account already exists for this email")]
    EmailInUse,
    #[error("network failure while creating account: {0}")]
    Network(String),
    #[error("identity provider rejected sign-up: {0}")]
    Provider(ProviderError),
}

impl CredentialError {
    pub fn user_message(&self) -> &'static str {
        "Failed to create an account"
    }
}

impl From<ProviderError> for CredentialError {
    fn from(err: ProviderError) -> Self {
        match err.code {
            ProviderErrorCode::InvalidEmail => Self::InvalidEmail,
            ProviderErrorCode::WeakPassword => Self::WeakPassword,
            ProviderErrorCode::EmailExists => Self::EmailInUse,
            ProviderErrorCode::NetworkRequestFailed => Self::Network(err.message),
            _ => Self::Provider(err),
        }
    }
}

/// Sign-in, federated sign-in and sign-out failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthenticationError {
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Superseded by a concurrent attempt. Never surfaced to the user.
    #[error("sign-in request cancelled by a newer attempt")]
    Cancelled,
    #[error("sign-in window closed before completion")]
    PopupClosed,
    #[error("network failure: {0}")]
    Network(String),
    #[error("identity provider failure: {0}")]
    Provider(ProviderError),
}

impl AuthenticationError {
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Failed to sign in",
            Self::Cancelled => "",
            Self::PopupClosed => "Sign-in cancelled - please try again",
            Self::Network(_) => "Network error - please check your connection",
            Self::Provider(_) => "Authentication failed. Please try again later.",
        }
    }
}

impl From<ProviderError> for AuthenticationError {
    fn from(err: ProviderError) -> Self {
        match err.code {
            ProviderErrorCode::InvalidCredential | ProviderErrorCode::UserDisabled => {
                Self::InvalidCredentials
            }
            ProviderErrorCode::CancelledPopupRequest => Self::Cancelled,
            ProviderErrorCode::PopupClosedByUser => Self::PopupClosed,
            ProviderErrorCode::NetworkRequestFailed => Self::Network(err.message),
            _ => Self::Provider(err),
        }
    }
}

/// Input problems caught before any network call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no resume selected")]
    MissingFile,
    #[error("job description is empty")]
    MissingJobDescription,
    #[error("unsupported media type {media_type:?}")]
    NotPdf { media_type: Option<String> },
    #[error("password confirmation does not match")]
    PasswordMismatch,
}

impl ValidationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingFile | Self::MissingJobDescription => {
                "Please upload a resume and enter a job description"
            }
            Self::NotPdf { .. } => "Please upload a PDF file",
            Self::PasswordMismatch => "Passwords do not match",
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to upload resume to '{path}': {source}")]
pub struct UploadError {
    pub path: String,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Debug, Error)]
#[error("remote scoring of '{path}' failed: {source}")]
pub struct AnalysisError {
    pub path: String,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no signed-in identity to scope the upload")]
    Unauthenticated,
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl WorkflowError {
    /// Upload and analysis failures share one retry prompt; only logs tell
    /// them apart.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(err) => err.user_message(),
            Self::Unauthenticated => "Please sign in again to analyze your resume",
            Self::Upload(_) | Self::Analysis(_) => GENERIC_WORKFLOW_FAILURE,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthenticated => "unauthenticated",
            Self::Upload(_) => "upload",
            Self::Analysis(_) => "analysis",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting '{0}'")]
    Missing(&'static str),
    #[error("invalid value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}
